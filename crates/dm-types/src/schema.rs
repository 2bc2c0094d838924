//! Static schema registry.
//!
//! Enumerates, per entity type, the property fields the reaction map
//! may key on. The legacy implementation discovered these at runtime
//! by iterating property descriptors; here the set is closed and
//! checked by tests, so a reaction-map entry can never reference a
//! field that does not exist.

use crate::entity::EntityType;

/// Fields of one entity type that change events may name.
#[derive(Debug, Clone, Copy)]
pub struct TypeSchema {
    pub entity_type: EntityType,
    pub fields: &'static [&'static str],
}

/// The full registry, one row per type with reaction-relevant fields.
/// Types absent here only react on `*` (any-field) entries.
pub const REGISTRY: &[TypeSchema] = &[
    TypeSchema {
        entity_type: EntityType::PhysicalRouter,
        fields: &[
            "physical_role",
            "rb_roles",
            "management_ip",
            "loopback_ip",
            "product_name",
            "vnc_managed",
        ],
    },
    TypeSchema {
        entity_type: EntityType::PhysicalInterface,
        fields: &["interface_kind", "mac"],
    },
    TypeSchema {
        entity_type: EntityType::LogicalInterface,
        fields: &["unit", "vlan_tag"],
    },
    TypeSchema {
        entity_type: EntityType::VirtualNetwork,
        fields: &[
            "forwarding_mode",
            "vxlan_id",
            "route_targets",
            "subnets",
            "router_external",
            "routed_properties",
            "category",
        ],
    },
    TypeSchema {
        entity_type: EntityType::LogicalRouter,
        fields: &[
            "logical_router_type",
            "gateway_external",
            "vxlan_network_identifier",
        ],
    },
    TypeSchema {
        entity_type: EntityType::VirtualMachineInterface,
        fields: &["bindings", "sub_interface_vlan_tag", "service_interface_type"],
    },
    TypeSchema {
        entity_type: EntityType::BgpRouter,
        fields: &[
            "autonomous_system",
            "local_asn",
            "address",
            "address_families",
            "authentication_key",
            "hold_time",
        ],
    },
    TypeSchema {
        entity_type: EntityType::StormControlProfile,
        fields: &[
            "bandwidth_percent",
            "traffic_types",
            "actions",
            "recovery_timeout",
        ],
    },
    TypeSchema {
        entity_type: EntityType::PortProfile,
        fields: &["flow_control", "bpdu_loop_protection", "port_params", "lacp_params"],
    },
    TypeSchema {
        entity_type: EntityType::SflowProfile,
        fields: &[
            "sample_rate",
            "polling_interval",
            "adaptive_sample_rate",
            "enabled_interface_type",
            "enabled_interface_params",
        ],
    },
    TypeSchema {
        entity_type: EntityType::ServiceInstance,
        fields: &[
            "left_svc_vlan",
            "right_svc_vlan",
            "left_svc_asns",
            "right_svc_asns",
            "left_svc_unit",
            "right_svc_unit",
        ],
    },
    TypeSchema {
        entity_type: EntityType::RoutingPolicy,
        fields: &["terms"],
    },
    TypeSchema {
        entity_type: EntityType::DataCenterInterconnect,
        fields: &["dci_type", "destinations"],
    },
    TypeSchema {
        entity_type: EntityType::FloatingIp,
        fields: &["address", "fixed_ip"],
    },
    TypeSchema {
        entity_type: EntityType::SecurityGroup,
        fields: &["rules"],
    },
    TypeSchema {
        entity_type: EntityType::NodeProfile,
        fields: &["role_mappings"],
    },
    TypeSchema {
        entity_type: EntityType::RoleDefinition,
        fields: &["features", "physical_role", "overlay_role"],
    },
];

/// Fields registered for a type; empty when only `*` entries apply.
pub fn fields_of(entity_type: EntityType) -> &'static [&'static str] {
    REGISTRY
        .iter()
        .find(|s| s.entity_type == entity_type)
        .map(|s| s.fields)
        .unwrap_or(&[])
}

/// True when `field` is either `*` or registered for the type.
pub fn is_known_field(entity_type: EntityType, field: &str) -> bool {
    field == "*" || fields_of(entity_type).contains(&field)
}
