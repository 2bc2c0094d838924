//! pnf-service-chaining: stitches tenant LRs through a physical
//! network function.
//!
//! A ServiceAppliance pins the chain to the PNF box via side-attributed
//! interface refs; the PortTuple names the left and right tenant LRs.
//! The PNF box gets service sub-interfaces, security zones, and a
//! chain RI with eBGP legs toward both spines; each participating
//! spine gets the facing sub-interfaces and the peer leg back to the
//! PNF.

use super::{origin_comment, BuilderContext, FeatureBuilder};
use crate::error::ConfigResult;
use crate::feature::Feature;
use crate::model::{
    BgpGroup, BgpPeer, FeatureFragment, LogicalInterfaceConfig, PhysicalInterfaceConfig,
    RiBgp, RiPim, RiProtocols, RoutingInstanceConfig, SecurityPolicy, SecurityZone,
    VlanConfig,
};
use crate::names::{bd_name, vrf_name_l3};
use dm_types::{Entity, EntityType, PhysicalRole, ServiceInstance, Uuid};
use tracing::debug;

/// One side of a service chain, resolved against the entity graph.
struct ChainSide {
    /// `left` or `right`.
    side: &'static str,
    vlan: u32,
    /// `[spine ASN, PNF ASN]`.
    asns: [u32; 2],
    /// PNF-box interfaces serving this side.
    pnf_interfaces: Vec<Entity>,
}

impl ChainSide {
    fn resolve(
        ctx: &BuilderContext<'_>,
        sa: &Entity,
        side: &'static str,
        vlan: Option<u32>,
        asns: &[u32],
    ) -> Option<ChainSide> {
        let vlan = vlan?;
        if asns.len() != 2 {
            debug!(side, "service chain side is missing its ASN pair");
            return None;
        }
        let pnf_interfaces: Vec<Entity> = sa
            .refs_to(EntityType::PhysicalInterface)
            .filter(|r| r.interface_side() == Some(side))
            .filter_map(|r| ctx.store.read(EntityType::PhysicalInterface, &r.uuid).ok())
            .collect();
        if pnf_interfaces.is_empty() {
            return None;
        }
        Some(ChainSide {
            side,
            vlan,
            asns: [asns[0], asns[1]],
            pnf_interfaces,
        })
    }

    /// Sub-interface names on the PNF box.
    fn pnf_sub_interfaces(&self) -> Vec<String> {
        self.pnf_interfaces
            .iter()
            .map(|pi| format!("{}.{}", pi.name(), self.vlan))
            .collect()
    }

    /// Interfaces on the given spine facing this side's PNF ports.
    fn spine_interfaces(&self, ctx: &BuilderContext<'_>, spine: &Uuid) -> Vec<Entity> {
        self.pnf_interfaces
            .iter()
            .flat_map(|pi| pi.refs_to(EntityType::PhysicalInterface))
            .filter_map(|r| ctx.store.read(EntityType::PhysicalInterface, &r.uuid).ok())
            .filter(|pi| pi.parent.map(|(_, uuid)| uuid) == Some(*spine))
            .collect()
    }
}

/// Service chains anchored on the given PNF device.
fn chains_for_pnf(ctx: &BuilderContext<'_>) -> Vec<(Entity, ServiceInstance, Entity)> {
    let mut out = Vec::new();
    for si in ctx
        .store
        .list(EntityType::ServiceInstance, &Default::default())
    {
        let Some(data) = si.data.as_service_instance().cloned() else {
            continue;
        };
        let Some(sa) = si
            .ref_to(EntityType::ServiceAppliance)
            .and_then(|uuid| ctx.store.read(EntityType::ServiceAppliance, &uuid).ok())
        else {
            continue;
        };
        let on_device = sa
            .refs_to(EntityType::PhysicalInterface)
            .filter_map(|r| ctx.store.read(EntityType::PhysicalInterface, &r.uuid).ok())
            .any(|pi| pi.parent.map(|(_, uuid)| uuid) == Some(ctx.device.uuid));
        if on_device {
            out.push((si, data, sa));
        }
    }
    out
}

/// Port tuples whose left or right LR the chain terminates on.
fn port_tuples(ctx: &BuilderContext<'_>, si: &Entity) -> Vec<(Uuid, Uuid)> {
    ctx.store
        .children(EntityType::PortTuple, &si.uuid)
        .iter()
        .filter_map(|pt| {
            let data = pt.data.as_port_tuple()?;
            match (data.left_lr, data.right_lr) {
                (Some(left), Some(right)) => Some((left, right)),
                _ => {
                    debug!(
                        port_tuple = pt.name(),
                        "port tuple without both LRs, chain skipped"
                    );
                    None
                }
            }
        })
        .collect()
}

pub struct PnfServiceChainingBuilder;

impl PnfServiceChainingBuilder {
    /// Config on the PNF box itself.
    fn build_pnf_side(&self, ctx: &BuilderContext<'_>, frag: &mut FeatureFragment) {
        for (si, data, sa) in chains_for_pnf(ctx) {
            if port_tuples(ctx, &si).is_empty() {
                continue;
            }
            let Some(left) = ChainSide::resolve(
                ctx,
                &sa,
                "left",
                data.left_svc_vlan,
                &data.left_svc_asns,
            ) else {
                continue;
            };
            let Some(right) = ChainSide::resolve(
                ctx,
                &sa,
                "right",
                data.right_svc_vlan,
                &data.right_svc_asns,
            ) else {
                continue;
            };

            let mut ri = RoutingInstanceConfig::named(vrf_name_l3(si.name(), left.vlan));
            ri.comment = Some(origin_comment("Service Instance", &si));
            ri.instance_type = Some("vrf".to_string());
            let mut protocols = RiProtocols::default();

            for side in [&left, &right] {
                let subifs = side.pnf_sub_interfaces();
                for (pi, subif) in side.pnf_interfaces.iter().zip(&subifs) {
                    let mut entry = PhysicalInterfaceConfig::named(pi.name());
                    entry.logical_interfaces.push(LogicalInterfaceConfig {
                        name: subif.clone(),
                        comment: Some(origin_comment("Service Instance", &si)),
                        unit: side.vlan,
                        vlan_tag: Some(side.vlan),
                        interface_type: Some("service".to_string()),
                        ip_addresses: Vec::new(),
                    });
                    frag.merge(FeatureFragment {
                        physical_interfaces: vec![entry],
                        ..Default::default()
                    });
                    ri.interfaces.push(subif.clone());
                }
                frag.security_zones.push(SecurityZone {
                    name: format!("{}-{}", si.name(), side.side),
                    comment: Some(origin_comment("Service Instance", &si)),
                    interfaces: subifs.clone(),
                });
                // eBGP leg toward the spine: PNF speaks asns[1], peers
                // with the fabric-side asns[0].
                protocols.bgp.push(RiBgp {
                    name: format!("si_{}", side.side),
                    comment: Some(origin_comment("Service Instance", &si)),
                    peer_asn: Some(side.asns[0]),
                    local_asn: Some(side.asns[1]),
                    ..Default::default()
                });
            }

            // Chain loopback rides the left service unit.
            if let Some(unit) = data.left_svc_unit {
                let lo0_name = format!("lo0.{unit}");
                let mut lo0 = PhysicalInterfaceConfig::named("lo0");
                lo0.logical_interfaces.push(LogicalInterfaceConfig {
                    name: lo0_name.clone(),
                    comment: Some(origin_comment("Service Instance", &si)),
                    unit,
                    vlan_tag: None,
                    interface_type: Some("loopback".to_string()),
                    ip_addresses: Vec::new(),
                });
                frag.merge(FeatureFragment {
                    physical_interfaces: vec![lo0],
                    ..Default::default()
                });
                ri.interfaces.push(lo0_name);
            }

            if let Some(rp) = data.rp_ip_addr {
                protocols.pim.push(RiPim {
                    name: si.name().to_string(),
                    comment: Some(origin_comment("Service Instance", &si)),
                    mode: Some("sparse".to_string()),
                    rp_addresses: vec![rp],
                    pim_interfaces: vec!["all".to_string()],
                    bfd: None,
                });
            }

            ri.protocols = Some(protocols);
            frag.routing_instances.push(ri);

            for (from, to) in [("left", "right"), ("right", "left")] {
                frag.security_policies.push(SecurityPolicy {
                    name: format!("{}-{from}-to-{to}", si.name()),
                    comment: Some(origin_comment("Service Instance", &si)),
                    from_zone: format!("{}-{from}", si.name()),
                    to_zone: format!("{}-{to}", si.name()),
                    action: "permit".to_string(),
                });
            }
        }
    }

    /// Config on a spine terminating one of the chain's LRs.
    fn build_spine_side(&self, ctx: &BuilderContext<'_>, frag: &mut FeatureFragment) {
        for si in ctx
            .store
            .list(EntityType::ServiceInstance, &Default::default())
        {
            let Some(data) = si.data.as_service_instance().cloned() else {
                continue;
            };
            let Some(sa) = si
                .ref_to(EntityType::ServiceAppliance)
                .and_then(|uuid| ctx.store.read(EntityType::ServiceAppliance, &uuid).ok())
            else {
                continue;
            };
            for (left_lr, right_lr) in port_tuples(ctx, &si) {
                let member_lrs: Vec<Uuid> = ctx
                    .member_logical_routers()
                    .iter()
                    .map(|lr| lr.uuid)
                    .collect();
                let sides = [
                    ("left", left_lr, data.left_svc_vlan, &data.left_svc_asns),
                    ("right", right_lr, data.right_svc_vlan, &data.right_svc_asns),
                ];
                for (side, lr_uuid, vlan, asns) in sides {
                    if !member_lrs.contains(&lr_uuid) {
                        continue;
                    }
                    let Some(side) = ChainSide::resolve(ctx, &sa, side, vlan, asns) else {
                        continue;
                    };
                    let Ok(lr) = ctx.store.read(EntityType::LogicalRouter, &lr_uuid) else {
                        continue;
                    };
                    let Some(internal) = ctx.lr_internal_vn(&lr) else {
                        continue;
                    };
                    let Some(vn_data) = internal.data.as_virtual_network() else {
                        continue;
                    };

                    let mut ri = RoutingInstanceConfig::named(vrf_name_l3(
                        internal.name(),
                        vn_data.vn_network_id,
                    ));
                    ri.comment = Some(origin_comment("Logical Router", &lr));
                    ri.instance_type = Some("vrf".to_string());
                    ri.virtual_network_is_internal = true;

                    let mut spine_subifs = Vec::new();
                    for spine_pi in side.spine_interfaces(ctx, &ctx.device.uuid) {
                        let subif = format!("{}.{}", spine_pi.name(), side.vlan);
                        let mut entry = PhysicalInterfaceConfig::named(spine_pi.name());
                        entry.logical_interfaces.push(LogicalInterfaceConfig {
                            name: subif.clone(),
                            comment: Some(origin_comment("Service Instance", &si)),
                            unit: side.vlan,
                            vlan_tag: Some(side.vlan),
                            interface_type: Some("service".to_string()),
                            ip_addresses: Vec::new(),
                        });
                        frag.merge(FeatureFragment {
                            physical_interfaces: vec![entry],
                            ..Default::default()
                        });
                        ri.interfaces.push(subif.clone());
                        spine_subifs.push(subif);
                    }

                    // Bridge domain carrying the side's service VLAN.
                    frag.merge(FeatureFragment {
                        vlans: vec![VlanConfig {
                            name: bd_name(side.vlan),
                            comment: Some(origin_comment("Service Instance", &si)),
                            vlan_id: Some(side.vlan),
                            vxlan_id: Some(side.vlan),
                            l3_interface: None,
                            interfaces: spine_subifs,
                        }],
                        ..Default::default()
                    });

                    // The PNF box peers into the overlay from its
                    // loopback.
                    let pnf_device = side
                        .pnf_interfaces
                        .first()
                        .and_then(|pi| pi.parent)
                        .and_then(|(_, uuid)| {
                            ctx.store.read(EntityType::PhysicalRouter, &uuid).ok()
                        });
                    if let Some(peer_ip) = pnf_device.as_ref().and_then(|pnf| {
                        pnf.data.as_physical_router().and_then(|d| d.loopback_ip)
                    }) {
                        frag.bgp.push(BgpGroup {
                            name: format!("{}_{}", si.name(), side.side),
                            comment: Some(origin_comment("Service Instance", &si)),
                            bgp_type: "external".to_string(),
                            ip_address: None,
                            autonomous_system: Some(side.asns[0]),
                            hold_time: None,
                            families: Vec::new(),
                            peers: vec![BgpPeer {
                                ip_address: peer_ip,
                                comment: pnf_device.as_ref().map(|pnf| {
                                    origin_comment("Physical Router", pnf)
                                }),
                                autonomous_system: Some(side.asns[1]),
                                authentication_key: None,
                                hold_time: None,
                            }],
                        });
                    }

                    // Peer leg back to the PNF: spine speaks asns[0].
                    ri.protocols = Some(RiProtocols {
                        bgp: vec![RiBgp {
                            name: format!("si_{}", side.side),
                            comment: Some(origin_comment("Service Instance", &si)),
                            peer_asn: Some(side.asns[1]),
                            local_asn: Some(side.asns[0]),
                            ..Default::default()
                        }],
                        ..Default::default()
                    });
                    frag.merge(FeatureFragment {
                        routing_instances: vec![ri],
                        ..Default::default()
                    });
                }
            }
        }
    }
}

impl FeatureBuilder for PnfServiceChainingBuilder {
    fn feature(&self) -> Feature {
        Feature::PnfServiceChaining
    }

    fn build(&self, ctx: &BuilderContext<'_>) -> ConfigResult<FeatureFragment> {
        let mut frag = FeatureFragment::default();
        match ctx.device_data.physical_role {
            Some(PhysicalRole::Pnf) => self.build_pnf_side(ctx, &mut frag),
            _ => self.build_spine_side(ctx, &mut frag),
        }
        Ok(frag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dm_entity_store::{EntityStore, StoreConfig};
    use dm_types::{EntityData, FqName, RefAttr};

    struct Chain {
        s: EntityStore,
        pnf: Uuid,
        spine: Uuid,
    }

    fn chain_fixture() -> Chain {
        let s = EntityStore::new(StoreConfig::default());
        let pnf = s
            .create(Entity::new(
                Uuid::new_v4(),
                FqName::from(["default-gsc", "srx1"]),
                EntityData::PhysicalRouter(dm_types::PhysicalRouter {
                    physical_role: Some(PhysicalRole::Pnf),
                    rb_roles: vec!["pnf-servicechain".into()],
                    loopback_ip: Some("10.255.255.1".parse().unwrap()),
                    ..Default::default()
                }),
            ))
            .unwrap();
        let spine = s
            .create(Entity::new(
                Uuid::new_v4(),
                FqName::from(["default-gsc", "spine1"]),
                EntityData::PhysicalRouter(dm_types::PhysicalRouter {
                    physical_role: Some(PhysicalRole::Spine),
                    rb_roles: vec!["pnf-servicechain".into()],
                    ..Default::default()
                }),
            ))
            .unwrap();

        let mut spine_pi = Entity::new(
            Uuid::new_v4(),
            FqName::from(["default-gsc", "spine1", "xe-0/0/7"]),
            EntityData::PhysicalInterface(Default::default()),
        );
        spine_pi.parent = Some((EntityType::PhysicalRouter, spine));
        let spine_pi = s.create(spine_pi).unwrap();

        let mut left_pi = Entity::new(
            Uuid::new_v4(),
            FqName::from(["default-gsc", "srx1", "ge-0/0/0"]),
            EntityData::PhysicalInterface(Default::default()),
        );
        left_pi.parent = Some((EntityType::PhysicalRouter, pnf));
        let left_pi = s.create(left_pi).unwrap();
        s.add_ref(&left_pi, EntityType::PhysicalInterface, &spine_pi, None)
            .unwrap();
        let mut right_pi = Entity::new(
            Uuid::new_v4(),
            FqName::from(["default-gsc", "srx1", "ge-0/0/1"]),
            EntityData::PhysicalInterface(Default::default()),
        );
        right_pi.parent = Some((EntityType::PhysicalRouter, pnf));
        let right_pi = s.create(right_pi).unwrap();

        let sa = s
            .create(Entity::new(
                Uuid::new_v4(),
                FqName::from(["default-gsc", "sa1"]),
                EntityData::ServiceAppliance(Default::default()),
            ))
            .unwrap();
        s.add_ref(
            &sa,
            EntityType::PhysicalInterface,
            &left_pi,
            Some(RefAttr::InterfaceSide("left".into())),
        )
        .unwrap();
        s.add_ref(
            &sa,
            EntityType::PhysicalInterface,
            &right_pi,
            Some(RefAttr::InterfaceSide("right".into())),
        )
        .unwrap();

        let si = s
            .create(Entity::new(
                Uuid::new_v4(),
                FqName::from(["default-domain", "admin", "fw-chain"]),
                EntityData::ServiceInstance(ServiceInstance {
                    left_svc_vlan: Some(1000),
                    right_svc_vlan: Some(1001),
                    left_svc_asns: vec![64512, 65100],
                    right_svc_asns: vec![64512, 65100],
                    left_svc_unit: Some(1000),
                    rp_ip_addr: Some("10.255.0.1".parse().unwrap()),
                    ..Default::default()
                }),
            ))
            .unwrap();
        s.add_ref(&si, EntityType::ServiceAppliance, &sa, None).unwrap();

        // Left and right tenant LRs on the spine.
        let mut lrs = Vec::new();
        for name in ["lr-left", "lr-right"] {
            let lr = s
                .create(Entity::new(
                    Uuid::new_v4(),
                    FqName::from(["default-domain", "admin"]).child(name),
                    EntityData::LogicalRouter(dm_types::LogicalRouter {
                        logical_router_type: Some(dm_types::LogicalRouterType::VxlanRouting),
                        ..Default::default()
                    }),
                ))
                .unwrap();
            s.add_ref(&lr, EntityType::PhysicalRouter, &spine, None).unwrap();
            lrs.push(lr);
        }
        let mut pt = Entity::new(
            Uuid::new_v4(),
            FqName::from(["default-domain", "admin", "fw-chain", "pt1"]),
            EntityData::PortTuple(dm_types::PortTuple {
                left_lr: Some(lrs[0]),
                right_lr: Some(lrs[1]),
            }),
        );
        pt.parent = Some((EntityType::ServiceInstance, si));
        s.create(pt).unwrap();

        Chain { s, pnf, spine }
    }

    fn build(s: &EntityStore, pr: &Uuid) -> FeatureFragment {
        let device = s.read(EntityType::PhysicalRouter, pr).unwrap();
        let data = device.data.as_physical_router().unwrap().clone();
        let ctx = BuilderContext {
            store: s,
            device: &device,
            device_data: &data,
            features: &[],
        };
        PnfServiceChainingBuilder.build(&ctx).unwrap()
    }

    #[test]
    fn test_pnf_side_zones_subifs_and_bgp_legs() {
        let chain = chain_fixture();
        let frag = build(&chain.s, &chain.pnf);

        assert_eq!(frag.security_zones.len(), 2);
        let left_zone = frag
            .security_zones
            .iter()
            .find(|z| z.name == "fw-chain-left")
            .unwrap();
        assert_eq!(left_zone.interfaces, vec!["ge-0/0/0.1000"]);

        let ri = &frag.routing_instances[0];
        assert!(ri.interfaces.contains(&"ge-0/0/0.1000".to_string()));
        assert!(ri.interfaces.contains(&"ge-0/0/1.1001".to_string()));
        assert!(ri.interfaces.contains(&"lo0.1000".to_string()));
        let protocols = ri.protocols.as_ref().unwrap();
        assert_eq!(protocols.bgp.len(), 2);
        let left_leg = protocols.bgp.iter().find(|b| b.name == "si_left").unwrap();
        assert_eq!(left_leg.local_asn, Some(65100));
        assert_eq!(left_leg.peer_asn, Some(64512));
        assert_eq!(protocols.pim[0].rp_addresses.len(), 1);

        assert_eq!(frag.security_policies.len(), 2);
        assert!(frag
            .security_policies
            .iter()
            .all(|p| p.action == "permit"));
    }

    #[test]
    fn test_spine_side_subif_and_peer_leg() {
        let chain = chain_fixture();
        let frag = build(&chain.s, &chain.spine);

        // The spine faces only the left PNF port in this fixture.
        let pi = frag
            .physical_interfaces
            .iter()
            .find(|p| p.name == "xe-0/0/7")
            .unwrap();
        assert_eq!(pi.logical_interfaces[0].name, "xe-0/0/7.1000");
        let ri = frag
            .routing_instances
            .iter()
            .find(|ri| ri.interfaces.contains(&"xe-0/0/7.1000".to_string()))
            .unwrap();
        assert!(ri.virtual_network_is_internal);
        let leg = &ri.protocols.as_ref().unwrap().bgp[0];
        assert_eq!(leg.local_asn, Some(64512));
        assert_eq!(leg.peer_asn, Some(65100));
    }

    #[test]
    fn test_spine_side_service_vlans_and_pnf_peer() {
        let chain = chain_fixture();
        let frag = build(&chain.s, &chain.spine);

        // Both service VLANs surface as bridge domains.
        let mut vlan_names: Vec<_> = frag.vlans.iter().map(|v| v.name.as_str()).collect();
        vlan_names.sort();
        assert_eq!(vlan_names, vec!["bd-1000", "bd-1001"]);
        let left_vlan = frag.vlans.iter().find(|v| v.name == "bd-1000").unwrap();
        assert_eq!(left_vlan.vlan_id, Some(1000));
        assert!(left_vlan
            .interfaces
            .contains(&"xe-0/0/7.1000".to_string()));

        // The PNF box is a BGP peer from its loopback.
        let left_group = frag.bgp.iter().find(|g| g.name == "fw-chain_left").unwrap();
        assert_eq!(left_group.bgp_type, "external");
        assert_eq!(left_group.autonomous_system, Some(64512));
        assert_eq!(left_group.peers.len(), 1);
        let peer = &left_group.peers[0];
        assert_eq!(
            peer.ip_address,
            "10.255.255.1".parse::<std::net::IpAddr>().unwrap()
        );
        assert_eq!(peer.autonomous_system, Some(65100));
    }

    #[test]
    fn test_tuple_without_both_lrs_skipped() {
        let chain = chain_fixture();
        let s = &chain.s;
        // A second chain whose tuple names no right LR.
        let sa = s
            .create(Entity::new(
                Uuid::new_v4(),
                FqName::from(["default-gsc", "sa2"]),
                EntityData::ServiceAppliance(Default::default()),
            ))
            .unwrap();
        let si = s
            .create(Entity::new(
                Uuid::new_v4(),
                FqName::from(["default-domain", "admin", "half-chain"]),
                EntityData::ServiceInstance(ServiceInstance {
                    left_svc_vlan: Some(1002),
                    right_svc_vlan: Some(1003),
                    left_svc_asns: vec![64512, 65101],
                    right_svc_asns: vec![64512, 65101],
                    ..Default::default()
                }),
            ))
            .unwrap();
        s.add_ref(&si, EntityType::ServiceAppliance, &sa, None).unwrap();
        let mut pt = Entity::new(
            Uuid::new_v4(),
            FqName::from(["default-domain", "admin", "half-chain", "pt1"]),
            EntityData::PortTuple(dm_types::PortTuple {
                left_lr: None,
                right_lr: None,
            }),
        );
        pt.parent = Some((EntityType::ServiceInstance, si));
        s.create(pt).unwrap();

        let frag = build(s, &chain.pnf);
        // Only the complete chain renders.
        assert_eq!(frag.routing_instances.len(), 1);
        assert!(frag.routing_instances[0]
            .comment
            .as_ref()
            .unwrap()
            .contains("fw-chain"));
    }
}
