//! infra-bms-access: fabric-infra connectivity for bare-metal nodes.
//!
//! A BMS node's ports are cabled to device interfaces; a port and an
//! infra VN sharing a label tag bind that interface into the VN.

use super::{origin_comment, BuilderContext, FeatureBuilder};
use crate::error::ConfigResult;
use crate::feature::Feature;
use crate::model::{
    FeatureFragment, LogicalInterfaceConfig, PhysicalInterfaceConfig, VlanConfig,
};
use crate::names::{bd_name, irb_interface};
use dm_types::{Entity, EntityType, VnCategory};

pub struct InfraBmsAccessBuilder;

impl InfraBmsAccessBuilder {
    /// Infra VNs sharing a tag with the given port.
    fn infra_vns_for_port(ctx: &BuilderContext<'_>, port: &Entity) -> Vec<Entity> {
        let mut out: Vec<Entity> = Vec::new();
        for tag_ref in port.refs_to(EntityType::Tag) {
            let Ok(tag) = ctx.store.read(EntityType::Tag, &tag_ref.uuid) else {
                continue;
            };
            for vn_ref in tag.back_refs_from(EntityType::VirtualNetwork) {
                if out.iter().any(|v| v.uuid == vn_ref.uuid) {
                    continue;
                }
                let Ok(vn) = ctx.store.read(EntityType::VirtualNetwork, &vn_ref.uuid) else {
                    continue;
                };
                let infra = vn
                    .data
                    .as_virtual_network()
                    .map_or(false, |d| d.category == Some(VnCategory::Infra));
                if infra {
                    out.push(vn);
                }
            }
        }
        out
    }
}

impl FeatureBuilder for InfraBmsAccessBuilder {
    fn feature(&self) -> Feature {
        Feature::InfraBmsAccess
    }

    fn build(&self, ctx: &BuilderContext<'_>) -> ConfigResult<FeatureFragment> {
        let mut frag = FeatureFragment::default();
        for pi in ctx.device_interfaces() {
            for port_ref in pi.back_refs_from(EntityType::Port) {
                let Ok(port) = ctx.store.read(EntityType::Port, &port_ref.uuid) else {
                    continue;
                };
                for vn in Self::infra_vns_for_port(ctx, &port) {
                    let Some(data) = vn.data.as_virtual_network() else {
                        continue;
                    };
                    let vxlan = data.vxlan_id.unwrap_or(data.vn_network_id);
                    let li_name = format!("{}.0", pi.name());

                    let mut entry = PhysicalInterfaceConfig::named(pi.name());
                    entry.comment = Some(origin_comment("Port", &port));
                    entry.logical_interfaces.push(LogicalInterfaceConfig {
                        name: li_name.clone(),
                        comment: Some(origin_comment("Virtual Network", &vn)),
                        unit: 0,
                        vlan_tag: Some(vxlan),
                        interface_type: None,
                        ip_addresses: Vec::new(),
                    });
                    frag.merge(FeatureFragment {
                        physical_interfaces: vec![entry],
                        ..Default::default()
                    });

                    match frag.vlans.iter_mut().find(|v| v.name == bd_name(vxlan)) {
                        Some(vlan) => {
                            if !vlan.interfaces.contains(&li_name) {
                                vlan.interfaces.push(li_name);
                            }
                        }
                        None => frag.vlans.push(VlanConfig {
                            name: bd_name(vxlan),
                            comment: Some(origin_comment("Virtual Network", &vn)),
                            vlan_id: Some(vxlan),
                            vxlan_id: Some(vxlan),
                            l3_interface: Some(irb_interface(data.vn_network_id)),
                            interfaces: vec![li_name],
                        }),
                    }

                    if let Some(irb) = super::gateway::irb_entry(&vn, data) {
                        frag.merge(FeatureFragment {
                            physical_interfaces: vec![irb],
                            ..Default::default()
                        });
                    }
                }
            }
        }
        Ok(frag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dm_entity_store::{EntityStore, StoreConfig};
    use dm_types::{EntityData, ForwardingMode, FqName, Subnet, Uuid, VirtualNetwork};

    #[test]
    fn test_tagged_port_binds_interface_into_infra_vn() {
        let s = EntityStore::new(StoreConfig::default());
        let pr = s
            .create(Entity::new(
                Uuid::new_v4(),
                FqName::from(["default-gsc", "leaf1"]),
                EntityData::PhysicalRouter(Default::default()),
            ))
            .unwrap();
        let mut pi = Entity::new(
            Uuid::new_v4(),
            FqName::from(["default-gsc", "leaf1", "xe-0/0/3"]),
            EntityData::PhysicalInterface(Default::default()),
        );
        pi.parent = Some((EntityType::PhysicalRouter, pr));
        let pi = s.create(pi).unwrap();

        let tag = s
            .create(Entity::new(
                Uuid::new_v4(),
                FqName::from(["label=provisioning"]),
                EntityData::Tag(dm_types::Tag {
                    tag_type: "label".into(),
                    value: "provisioning".into(),
                }),
            ))
            .unwrap();
        let vn = s
            .create(Entity::new(
                Uuid::new_v4(),
                FqName::from(["default-domain", "admin", "infra-vn"]),
                EntityData::VirtualNetwork(VirtualNetwork {
                    category: Some(dm_types::VnCategory::Infra),
                    forwarding_mode: Some(ForwardingMode::L2L3),
                    vxlan_id: Some(4000),
                    subnets: vec![Subnet {
                        prefix: "192.168.100.0".parse().unwrap(),
                        prefix_len: 24,
                        gateway: Some("192.168.100.1".parse().unwrap()),
                    }],
                    ..Default::default()
                }),
            ))
            .unwrap();
        s.add_ref(&vn, EntityType::Tag, &tag, None).unwrap();

        let node = s
            .create(Entity::new(
                Uuid::new_v4(),
                FqName::from(["default-gsc", "bms1"]),
                EntityData::Node(Default::default()),
            ))
            .unwrap();
        let mut port = Entity::new(
            Uuid::new_v4(),
            FqName::from(["default-gsc", "bms1", "eth0"]),
            EntityData::Port(Default::default()),
        );
        port.parent = Some((EntityType::Node, node));
        let port = s.create(port).unwrap();
        s.add_ref(&port, EntityType::PhysicalInterface, &pi, None).unwrap();
        s.add_ref(&port, EntityType::Tag, &tag, None).unwrap();

        let device = s.read(EntityType::PhysicalRouter, &pr).unwrap();
        let data = device.data.as_physical_router().unwrap().clone();
        let ctx = BuilderContext {
            store: &s,
            device: &device,
            device_data: &data,
            features: &[],
        };
        let frag = InfraBmsAccessBuilder.build(&ctx).unwrap();

        let vlan = frag.vlans.iter().find(|v| v.name == "bd-4000").unwrap();
        assert_eq!(vlan.interfaces, vec!["xe-0/0/3.0"]);
        let vn_id = s
            .read(EntityType::VirtualNetwork, &vn)
            .unwrap()
            .data
            .as_virtual_network()
            .unwrap()
            .vn_network_id;
        assert_eq!(vlan.l3_interface.as_deref(), Some(format!("irb.{vn_id}").as_str()));
        let access = frag
            .physical_interfaces
            .iter()
            .find(|p| p.name == "xe-0/0/3")
            .unwrap();
        assert_eq!(access.logical_interfaces[0].vlan_tag, Some(4000));
        let irb = frag
            .physical_interfaces
            .iter()
            .find(|p| p.name == "irb")
            .unwrap();
        assert_eq!(
            irb.logical_interfaces[0].ip_addresses,
            vec!["192.168.100.1/24"]
        );
    }

    #[test]
    fn test_untagged_port_emits_nothing() {
        let s = EntityStore::new(StoreConfig::default());
        let pr = s
            .create(Entity::new(
                Uuid::new_v4(),
                FqName::from(["default-gsc", "leaf1"]),
                EntityData::PhysicalRouter(Default::default()),
            ))
            .unwrap();
        let mut pi = Entity::new(
            Uuid::new_v4(),
            FqName::from(["default-gsc", "leaf1", "xe-0/0/3"]),
            EntityData::PhysicalInterface(Default::default()),
        );
        pi.parent = Some((EntityType::PhysicalRouter, pr));
        let pi = s.create(pi).unwrap();
        let port = s
            .create(Entity::new(
                Uuid::new_v4(),
                FqName::from(["default-gsc", "bms1", "eth0"]),
                EntityData::Port(Default::default()),
            ))
            .unwrap();
        s.add_ref(&port, EntityType::PhysicalInterface, &pi, None).unwrap();

        let device = s.read(EntityType::PhysicalRouter, &pr).unwrap();
        let data = device.data.as_physical_router().unwrap().clone();
        let ctx = BuilderContext {
            store: &s,
            device: &device,
            device_data: &data,
            features: &[],
        };
        let frag = InfraBmsAccessBuilder.build(&ctx).unwrap();
        assert!(frag.is_empty());
    }
}
