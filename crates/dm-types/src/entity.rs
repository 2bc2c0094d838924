//! The generic entity wrapper and the type registry.

use crate::entities::*;
use crate::ids::{FqName, Uuid};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Declares every entity kind in one place, generating [`EntityType`],
/// [`EntityData`], and the typed payload accessors together so the
/// three can never drift apart.
macro_rules! entity_model {
    ($( $variant:ident ($name:literal) => $payload:ty, $as_fn:ident; )+) => {
        /// Entity kind. Wire names are dashed; the underscored form is
        /// accepted on parse, matching the fq-name-to-id contract.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum EntityType {
            $($variant,)+
        }

        impl EntityType {
            /// Every known entity type.
            pub const ALL: &'static [EntityType] = &[$(EntityType::$variant,)+];

            /// Dashed wire name, e.g. `physical-router`.
            pub fn name(&self) -> &'static str {
                match self {
                    $(EntityType::$variant => $name,)+
                }
            }

            /// Parses either the dashed or the underscored form.
            pub fn parse(s: &str) -> Option<EntityType> {
                let dashed = s.replace('_', "-");
                match dashed.as_str() {
                    $($name => Some(EntityType::$variant),)+
                    _ => None,
                }
            }
        }

        /// Typed entity payload.
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        pub enum EntityData {
            $($variant($payload),)+
        }

        impl EntityData {
            pub fn entity_type(&self) -> EntityType {
                match self {
                    $(EntityData::$variant(_) => EntityType::$variant,)+
                }
            }

            $(
                pub fn $as_fn(&self) -> Option<&$payload> {
                    match self {
                        EntityData::$variant(data) => Some(data),
                        _ => None,
                    }
                }
            )+
        }
    };
}

entity_model! {
    PhysicalRouter("physical-router") => PhysicalRouter, as_physical_router;
    PhysicalInterface("physical-interface") => PhysicalInterface, as_physical_interface;
    LogicalInterface("logical-interface") => LogicalInterface, as_logical_interface;
    VirtualNetwork("virtual-network") => VirtualNetwork, as_virtual_network;
    LogicalRouter("logical-router") => LogicalRouter, as_logical_router;
    VirtualMachineInterface("virtual-machine-interface") => VirtualMachineInterface, as_virtual_machine_interface;
    VirtualPortGroup("virtual-port-group") => VirtualPortGroup, as_virtual_port_group;
    Fabric("fabric") => Fabric, as_fabric;
    FabricNamespace("fabric-namespace") => FabricNamespace, as_fabric_namespace;
    NodeProfile("node-profile") => NodeProfile, as_node_profile;
    RoleDefinition("role-definition") => RoleDefinition, as_role_definition;
    BgpRouter("bgp-router") => BgpRouter, as_bgp_router;
    RoutingPolicy("routing-policy") => RoutingPolicy, as_routing_policy;
    RoutingInstance("routing-instance") => RoutingInstance, as_routing_instance;
    FloatingIpPool("floating-ip-pool") => FloatingIpPool, as_floating_ip_pool;
    FloatingIp("floating-ip") => FloatingIp, as_floating_ip;
    InstanceIp("instance-ip") => InstanceIp, as_instance_ip;
    DataCenterInterconnect("data-center-interconnect") => DataCenterInterconnect, as_data_center_interconnect;
    ServiceApplianceSet("service-appliance-set") => ServiceApplianceSet, as_service_appliance_set;
    ServiceAppliance("service-appliance") => ServiceAppliance, as_service_appliance;
    ServiceTemplate("service-template") => ServiceTemplate, as_service_template;
    ServiceInstance("service-instance") => ServiceInstance, as_service_instance;
    PortTuple("port-tuple") => PortTuple, as_port_tuple;
    PortProfile("port-profile") => PortProfile, as_port_profile;
    StormControlProfile("storm-control-profile") => StormControlProfile, as_storm_control_profile;
    TelemetryProfile("telemetry-profile") => TelemetryProfile, as_telemetry_profile;
    SflowProfile("sflow-profile") => SflowProfile, as_sflow_profile;
    SecurityGroup("security-group") => SecurityGroup, as_security_group;
    Bgpvpn("bgpvpn") => Bgpvpn, as_bgpvpn;
    Tag("tag") => Tag, as_tag;
    Port("port") => Port, as_port;
    Node("node") => Node, as_node;
    FlowNode("flow-node") => FlowNode, as_flow_node;
    InterfaceRouteTable("interface-route-table") => InterfaceRouteTable, as_interface_route_table;
    NetworkIpam("network-ipam") => NetworkIpam, as_network_ipam;
    Project("project") => Project, as_project;
    SubCluster("sub-cluster") => SubCluster, as_sub_cluster;
    BgpAsAService("bgp-as-a-service") => BgpAsAService, as_bgp_as_a_service;
    GlobalSystemConfig("global-system-config") => GlobalSystemConfig, as_global_system_config;
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Typed attribute carried on a reference edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefAttr {
    /// Which side of a service chain a ServiceAppliance interface
    /// serves (`left` / `right`).
    InterfaceSide(String),
    /// DCI logical-router role (`source` / `destination`).
    LrDirection(String),
}

/// A reference edge to another entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ref {
    pub entity_type: EntityType,
    pub uuid: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attr: Option<RefAttr>,
}

impl Ref {
    pub fn new(entity_type: EntityType, uuid: Uuid) -> Self {
        Self {
            entity_type,
            uuid,
            attr: None,
        }
    }

    pub fn with_attr(mut self, attr: RefAttr) -> Self {
        self.attr = Some(attr);
        self
    }

    /// The `InterfaceSide` attr value, if present.
    pub fn interface_side(&self) -> Option<&str> {
        match &self.attr {
            Some(RefAttr::InterfaceSide(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// The `LrDirection` attr value, if present.
    pub fn lr_direction(&self) -> Option<&str> {
        match &self.attr {
            Some(RefAttr::LrDirection(s)) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// An entity snapshot: identity, payload, and relation edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub uuid: Uuid,
    pub fq_name: FqName,
    /// Owning parent, if the type is parented.
    pub parent: Option<(EntityType, Uuid)>,
    pub data: EntityData,
    pub refs: Vec<Ref>,
    pub back_refs: Vec<Ref>,
}

impl Entity {
    pub fn new(uuid: Uuid, fq_name: FqName, data: EntityData) -> Self {
        Self {
            uuid,
            fq_name,
            parent: None,
            data,
            refs: Vec::new(),
            back_refs: Vec::new(),
        }
    }

    pub fn entity_type(&self) -> EntityType {
        self.data.entity_type()
    }

    /// Leaf name from the fq-name.
    pub fn name(&self) -> &str {
        self.fq_name.name()
    }

    /// Forward refs to entities of the given type.
    pub fn refs_to(&self, entity_type: EntityType) -> impl Iterator<Item = &Ref> {
        self.refs
            .iter()
            .filter(move |r| r.entity_type == entity_type)
    }

    /// Back refs from entities of the given type.
    pub fn back_refs_from(&self, entity_type: EntityType) -> impl Iterator<Item = &Ref> {
        self.back_refs
            .iter()
            .filter(move |r| r.entity_type == entity_type)
    }

    /// First forward ref to the given type, if any.
    pub fn ref_to(&self, entity_type: EntityType) -> Option<Uuid> {
        self.refs_to(entity_type).next().map(|r| r.uuid)
    }

    /// First back ref from the given type, if any.
    pub fn back_ref_from(&self, entity_type: EntityType) -> Option<Uuid> {
        self.back_refs_from(entity_type).next().map(|r| r.uuid)
    }
}
