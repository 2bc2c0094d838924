//! Feature config builders.
//!
//! One module per builder family. Each builder walks the entity graph
//! from the device and emits a [`FeatureFragment`]; the assembler
//! merges fragments per feature key.

use crate::error::ConfigResult;
use crate::feature::Feature;
use crate::model::FeatureFragment;
use dm_entity_store::EntityStore;
use dm_types::{Entity, EntityType, PhysicalRouter, Uuid};
use itertools::Itertools;

pub mod dc_gateway;
pub mod dci;
pub mod firewall;
pub mod gateway;
pub mod infra_bms;
pub mod overlay_bgp;
pub mod pnf;
pub mod routed_vn;
pub mod storm_control;
pub mod telemetry;
pub mod underlay;

/// Everything a builder may consult while generating for one device.
pub struct BuilderContext<'a> {
    pub store: &'a EntityStore,
    pub device: &'a Entity,
    pub device_data: &'a PhysicalRouter,
    /// The device's full enabled-feature list, for builders whose
    /// output depends on sibling features.
    pub features: &'a [Feature],
}

impl BuilderContext<'_> {
    /// The device's physical interfaces.
    pub fn device_interfaces(&self) -> Vec<Entity> {
        self.store
            .children(EntityType::PhysicalInterface, &self.device.uuid)
    }

    /// Logical routers the device is a member of.
    pub fn member_logical_routers(&self) -> Vec<Entity> {
        self.device
            .back_refs_from(EntityType::LogicalRouter)
            .filter_map(|r| self.store.read(EntityType::LogicalRouter, &r.uuid).ok())
            .collect()
    }

    /// VPGs anchored on any of the device's physical interfaces.
    pub fn device_vpgs(&self) -> Vec<Entity> {
        self.device_interfaces()
            .into_iter()
            .flat_map(|pi| {
                pi.back_refs_from(EntityType::VirtualPortGroup)
                    .map(|r| r.uuid)
                    .collect::<Vec<_>>()
            })
            .unique()
            .filter_map(|uuid| self.store.read(EntityType::VirtualPortGroup, &uuid).ok())
            .collect()
    }

    /// VMIs landing on the device through its VPGs.
    pub fn device_vmis(&self) -> Vec<Entity> {
        self.device_vpgs()
            .into_iter()
            .flat_map(|vpg| {
                vpg.refs_to(EntityType::VirtualMachineInterface)
                    .map(|r| r.uuid)
                    .collect::<Vec<_>>()
            })
            .unique()
            .filter_map(|uuid| {
                self.store
                    .read(EntityType::VirtualMachineInterface, &uuid)
                    .ok()
            })
            .collect()
    }

    /// VNs connected to the device: direct refs, VMI-carried, and
    /// LR-membership VNs.
    pub fn connected_vns(&self) -> Vec<Entity> {
        let mut out: Vec<Entity> = Vec::new();
        let mut push = |vn: Entity| {
            if !out.iter().any(|v| v.uuid == vn.uuid) {
                out.push(vn);
            }
        };
        for r in self.device.refs_to(EntityType::VirtualNetwork) {
            if let Ok(vn) = self.store.read(EntityType::VirtualNetwork, &r.uuid) {
                push(vn);
            }
        }
        for vmi in self.device_vmis() {
            if let Some(vn_uuid) = vmi.ref_to(EntityType::VirtualNetwork) {
                if let Ok(vn) = self.store.read(EntityType::VirtualNetwork, &vn_uuid) {
                    push(vn);
                }
            }
        }
        for lr in self.member_logical_routers() {
            for vn in self.lr_tenant_vns(&lr) {
                push(vn);
            }
        }
        out
    }

    /// Tenant VNs attached to an LR through its VMIs.
    pub fn lr_tenant_vns(&self, lr: &Entity) -> Vec<Entity> {
        let mut out: Vec<Entity> = Vec::new();
        for vmi_ref in lr.refs_to(EntityType::VirtualMachineInterface) {
            let Ok(vmi) = self
                .store
                .read(EntityType::VirtualMachineInterface, &vmi_ref.uuid)
            else {
                continue;
            };
            let Some(vn_uuid) = vmi.ref_to(EntityType::VirtualNetwork) else {
                continue;
            };
            if out.iter().any(|v| v.uuid == vn_uuid) {
                continue;
            }
            if let Ok(vn) = self.store.read(EntityType::VirtualNetwork, &vn_uuid) {
                if vn.data.as_virtual_network().map_or(false, |d| d.is_internal) {
                    continue;
                }
                out.push(vn);
            }
        }
        out
    }

    /// The internal VN auto-created for a vxlan-routing LR, if present.
    pub fn lr_internal_vn(&self, lr: &Entity) -> Option<Entity> {
        lr.refs_to(EntityType::VirtualNetwork)
            .filter_map(|r| self.store.read(EntityType::VirtualNetwork, &r.uuid).ok())
            .find(|vn| {
                vn.data
                    .as_virtual_network()
                    .map_or(false, |d| d.is_internal)
            })
    }

    /// True when the device holds the overlay role.
    pub fn has_rb_role(&self, role: &str) -> bool {
        self.device_data.rb_roles.iter().any(|r| r == role)
    }

    /// Logical interfaces on the device carrying the given VN (via
    /// their VMI ref).
    pub fn logical_interfaces_for_vn(&self, vn_uuid: &Uuid) -> Vec<(Entity, Entity)> {
        let mut out = Vec::new();
        for pi in self.device_interfaces() {
            for li in self.store.children(EntityType::LogicalInterface, &pi.uuid) {
                let Some(vmi_uuid) = li.ref_to(EntityType::VirtualMachineInterface) else {
                    continue;
                };
                let Ok(vmi) = self
                    .store
                    .read(EntityType::VirtualMachineInterface, &vmi_uuid)
                else {
                    continue;
                };
                if vmi.ref_to(EntityType::VirtualNetwork) == Some(*vn_uuid) {
                    out.push((pi.clone(), li));
                }
            }
        }
        out
    }
}

impl BuilderContext<'_> {
    /// The device's autonomous system: its BgpRouter's ASN, falling
    /// back to the global config.
    pub fn local_asn(&self) -> u32 {
        if let Some(uuid) = self.device.ref_to(EntityType::BgpRouter) {
            if let Ok(bgp) = self.store.read(EntityType::BgpRouter, &uuid) {
                if let Some(data) = bgp.data.as_bgp_router() {
                    return data.local_asn.unwrap_or(data.autonomous_system);
                }
            }
        }
        self.store
            .list(EntityType::GlobalSystemConfig, &Default::default())
            .first()
            .and_then(|gsc| gsc.data.as_global_system_config())
            .and_then(|d| d.autonomous_system)
            .unwrap_or(64512)
    }
}

/// Origin annotation attached to every emitted object.
pub fn origin_comment(kind: &str, entity: &Entity) -> String {
    format!("{} {} ({})", kind, entity.name(), entity.uuid)
}

/// A feature config builder.
pub trait FeatureBuilder {
    fn feature(&self) -> Feature;

    fn build(&self, ctx: &BuilderContext<'_>) -> ConfigResult<FeatureFragment>;
}

/// All builders, in feature dependency order.
pub fn all_builders() -> Vec<Box<dyn FeatureBuilder>> {
    vec![
        Box::new(underlay::UnderlayIpClosBuilder),
        Box::new(overlay_bgp::OverlayBgpBuilder),
        Box::new(gateway::L2GatewayBuilder),
        Box::new(gateway::L3GatewayBuilder),
        Box::new(gateway::VnInterconnectBuilder),
        Box::new(routed_vn::RoutedVnBuilder),
        Box::new(storm_control::StormControlBuilder),
        Box::new(storm_control::PortProfileBuilder),
        Box::new(telemetry::TelemetryBuilder),
        Box::new(firewall::FirewallBuilder),
        Box::new(infra_bms::InfraBmsAccessBuilder),
        Box::new(pnf::PnfServiceChainingBuilder),
        Box::new(dci::DciBuilder),
        Box::new(dc_gateway::DcGatewayBuilder),
    ]
}
