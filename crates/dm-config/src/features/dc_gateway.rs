//! dc-gateway: public LR export and FIP/SNAT NAT instances.

use super::gateway::{irb_entry, l2_routing_instance, l3_routing_instance};
use super::{origin_comment, BuilderContext, FeatureBuilder};
use crate::error::ConfigResult;
use crate::feature::Feature;
use crate::model::{
    FeatureFragment, FirewallFilter, FirewallTerm, NatRule, RoutingInstanceConfig, TermMatch,
    TermThen,
};
use crate::names::{
    irb_interface, nat_redirect_filter_name, nat_ri_name, vrf_name_l3,
    REDIRECT_TO_PUBLIC_VRFS_FILTER,
};
use dm_types::{Entity, EntityType, InterfaceKind, Subnet};
use std::net::IpAddr;
use tracing::debug;

/// Unit numbers of the service-interface legs of a NAT instance.
const NAT_INGRESS_UNIT: u32 = 9;
const NAT_EGRESS_UNIT: u32 = 10;

fn host_prefix(ip: IpAddr) -> Subnet {
    Subnet {
        prefix: ip,
        prefix_len: 32,
        gateway: None,
    }
}

pub struct DcGatewayBuilder;

impl DcGatewayBuilder {
    /// Public-LR path: every VN of an externally-gatewayed member LR is
    /// exported on this device.
    fn build_public_lrs(&self, ctx: &BuilderContext<'_>, frag: &mut FeatureFragment) {
        for lr in ctx.member_logical_routers() {
            let external = lr
                .data
                .as_logical_router()
                .map_or(false, |d| d.gateway_external);
            if !external {
                continue;
            }
            let tenant_vns = ctx.lr_tenant_vns(&lr);
            let all_prefixes: Vec<Subnet> = tenant_vns
                .iter()
                .filter_map(|vn| vn.data.as_virtual_network())
                .flat_map(|d| d.subnets.iter().cloned())
                .collect();

            for vn in &tenant_vns {
                let Some(data) = vn.data.as_virtual_network() else {
                    continue;
                };
                let (mut l2, vlan) = l2_routing_instance(ctx, vn, data);
                l2.is_public_network = true;
                frag.routing_instances.push(l2);
                frag.vlans.push(vlan);

                let mut l3 = l3_routing_instance(ctx, vn, data);
                l3.is_public_network = true;
                for prefix in &all_prefixes {
                    if !l3.prefixes.contains(prefix) {
                        l3.prefixes.push(prefix.clone());
                    }
                }
                frag.routing_instances.push(l3);
                if let Some(irb) = irb_entry(vn, data) {
                    frag.merge(FeatureFragment {
                        physical_interfaces: vec![irb],
                        ..Default::default()
                    });
                }
            }

            if let Some(internal) = ctx.lr_internal_vn(&lr) {
                if let Some(data) = internal.data.as_virtual_network() {
                    let mut ri = RoutingInstanceConfig::named(vrf_name_l3(
                        internal.name(),
                        data.vn_network_id,
                    ));
                    ri.comment = Some(origin_comment("Logical Router", &lr));
                    ri.instance_type = Some("vrf".to_string());
                    ri.virtual_network_mode = Some("l3".to_string());
                    ri.virtual_network_id = Some(data.vn_network_id);
                    ri.virtual_network_is_internal = true;
                    ri.is_public_network = true;
                    for vn in &tenant_vns {
                        if let Some(vn_data) = vn.data.as_virtual_network() {
                            ri.routing_interfaces
                                .push(irb_interface(vn_data.vn_network_id));
                        }
                    }
                    frag.routing_instances.push(ri);
                }
            }
        }
    }

    /// First service interface on the device, for NAT leg units.
    fn service_interface(ctx: &BuilderContext<'_>) -> Option<String> {
        ctx.device_interfaces()
            .iter()
            .find(|pi| {
                pi.data
                    .as_physical_interface()
                    .map_or(false, |d| d.interface_kind == Some(InterfaceKind::Service))
            })
            .map(|pi| pi.name().to_string())
    }

    /// FIPs (address, fixed address, private VN) behind a pool.
    fn pool_fips(
        ctx: &BuilderContext<'_>,
        pool: &Entity,
    ) -> Vec<(IpAddr, IpAddr, Option<Entity>)> {
        let mut out = Vec::new();
        for fip in ctx.store.children(EntityType::FloatingIp, &pool.uuid) {
            let Some(data) = fip.data.as_floating_ip() else {
                continue;
            };
            let (Some(addr), Some(fixed)) = (data.address, data.fixed_ip) else {
                continue;
            };
            let private_vn = fip
                .ref_to(EntityType::VirtualMachineInterface)
                .and_then(|uuid| {
                    ctx.store
                        .read(EntityType::VirtualMachineInterface, &uuid)
                        .ok()
                })
                .and_then(|vmi| vmi.ref_to(EntityType::VirtualNetwork))
                .and_then(|uuid| ctx.store.read(EntityType::VirtualNetwork, &uuid).ok());
            out.push((addr, fixed, private_vn));
        }
        out
    }

    /// FIP/SNAT path for every public VN extended to this device.
    fn build_fip_snat(&self, ctx: &BuilderContext<'_>, frag: &mut FeatureFragment) {
        let Some(si) = Self::service_interface(ctx) else {
            return;
        };
        let mut public_terms: Vec<FirewallTerm> = Vec::new();

        for vn_ref in ctx.device.refs_to(EntityType::VirtualNetwork) {
            let Ok(vn) = ctx.store.read(EntityType::VirtualNetwork, &vn_ref.uuid) else {
                continue;
            };
            let Some(data) = vn.data.as_virtual_network().cloned() else {
                continue;
            };
            if !data.router_external {
                continue;
            }
            let pools = ctx.store.children(EntityType::FloatingIpPool, &vn.uuid);
            if pools.is_empty() {
                continue;
            }

            let (mut l2, vlan) = l2_routing_instance(ctx, &vn, &data);
            l2.is_public_network = true;
            frag.routing_instances.push(l2);
            frag.vlans.push(vlan);
            let mut l3 = l3_routing_instance(ctx, &vn, &data);
            l3.is_public_network = true;
            let public_l3_name = l3.name.clone();
            frag.routing_instances.push(l3);

            // One redirect term per public VN.
            public_terms.push(FirewallTerm {
                name: format!("term-{}", vn.name()),
                fromxx: Some(TermMatch {
                    destination_address: data.subnets.clone(),
                    ..Default::default()
                }),
                then: Some(TermThen {
                    routing_instance: Some(public_l3_name.clone()),
                    ..Default::default()
                }),
            });

            let mut nat = RoutingInstanceConfig::named(nat_ri_name(&public_l3_name));
            nat.comment = Some(origin_comment("Virtual Network", &vn));
            nat.instance_type = Some("vrf".to_string());
            nat.ingress_interfaces = vec![format!("{si}.{NAT_INGRESS_UNIT}")];
            nat.egress_interfaces = vec![format!("{si}.{NAT_EGRESS_UNIT}")];

            for pool in &pools {
                for (addr, fixed, private_vn) in Self::pool_fips(ctx, pool) {
                    nat.nat_rules.push(NatRule {
                        name: format!("{addr}-inbound"),
                        direction: "inbound".to_string(),
                        translation_type: "basic-nat44".to_string(),
                        source_prefix: host_prefix(addr),
                        translated_prefix: host_prefix(fixed),
                    });
                    nat.nat_rules.push(NatRule {
                        name: format!("{fixed}-outbound"),
                        direction: "outbound".to_string(),
                        translation_type: "dnat-44".to_string(),
                        source_prefix: host_prefix(fixed),
                        translated_prefix: host_prefix(addr),
                    });

                    let Some(private_vn) = private_vn else {
                        continue;
                    };
                    let Some(private_data) = private_vn.data.as_virtual_network() else {
                        continue;
                    };
                    let private_l3 =
                        vrf_name_l3(private_vn.name(), private_data.vn_network_id);
                    let filter_name = nat_redirect_filter_name(&private_l3);
                    let fw = frag
                        .firewall
                        .get_or_insert_with(Default::default);
                    let filter = match fw
                        .firewall_filters
                        .iter_mut()
                        .find(|f| f.name == filter_name)
                    {
                        Some(f) => f,
                        None => {
                            fw.firewall_filters.push(FirewallFilter {
                                name: filter_name.clone(),
                                comment: Some(origin_comment(
                                    "Virtual Network",
                                    &private_vn,
                                )),
                                terms: Vec::new(),
                            });
                            fw.firewall_filters.last_mut().unwrap()
                        }
                    };
                    filter.terms.push(FirewallTerm {
                        name: format!("term-{fixed}"),
                        fromxx: Some(TermMatch {
                            source_address: vec![host_prefix(fixed)],
                            ..Default::default()
                        }),
                        then: Some(TermThen {
                            routing_instance: Some(nat.name.clone()),
                            ..Default::default()
                        }),
                    });
                }
            }
            frag.routing_instances.push(nat);
        }

        if !public_terms.is_empty() {
            public_terms.push(FirewallTerm {
                name: "default-term".to_string(),
                fromxx: None,
                then: Some(TermThen {
                    action: Some("accept".to_string()),
                    routing_instance: None,
                }),
            });
            frag.firewall
                .get_or_insert_with(Default::default)
                .firewall_filters
                .push(FirewallFilter {
                    name: REDIRECT_TO_PUBLIC_VRFS_FILTER.to_string(),
                    comment: None,
                    terms: public_terms,
                });
        }
    }
}

impl FeatureBuilder for DcGatewayBuilder {
    fn feature(&self) -> Feature {
        Feature::DcGateway
    }

    fn build(&self, ctx: &BuilderContext<'_>) -> ConfigResult<FeatureFragment> {
        let mut frag = FeatureFragment::default();
        self.build_public_lrs(ctx, &mut frag);
        self.build_fip_snat(ctx, &mut frag);
        if frag.is_empty() {
            debug!(device = ctx.device.name(), "dc-gateway produced no config");
        }
        Ok(frag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dm_entity_store::{EntityStore, StoreConfig};
    use dm_types::{EntityData, ForwardingMode, FqName, PhysicalRole, Uuid, VirtualNetwork};

    fn public_vn(cidr: &str, gw: &str) -> VirtualNetwork {
        VirtualNetwork {
            forwarding_mode: Some(ForwardingMode::L2L3),
            router_external: true,
            subnets: vec![Subnet {
                prefix: cidr.parse().unwrap(),
                prefix_len: 24,
                gateway: Some(gw.parse().unwrap()),
            }],
            ..Default::default()
        }
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
        DcGatewayBuilder.build(&ctx).unwrap()
    }

    #[test]
    fn test_fip_snat_nat_instance() {
        let s = EntityStore::new(StoreConfig::default());
        let pr = s
            .create(Entity::new(
                Uuid::new_v4(),
                FqName::from(["default-gsc", "mx1"]),
                EntityData::PhysicalRouter(dm_types::PhysicalRouter {
                    physical_role: Some(PhysicalRole::Spine),
                    rb_roles: vec!["dc-gateway".into()],
                    ..Default::default()
                }),
            ))
            .unwrap();
        let mut si = Entity::new(
            Uuid::new_v4(),
            FqName::from(["default-gsc", "mx1", "si-1/2/0"]),
            EntityData::PhysicalInterface(dm_types::PhysicalInterface {
                interface_kind: Some(InterfaceKind::Service),
                ..Default::default()
            }),
        );
        si.parent = Some((EntityType::PhysicalRouter, pr));
        s.create(si).unwrap();

        let public = s
            .create(Entity::new(
                Uuid::new_v4(),
                FqName::from(["default-domain", "admin", "vn_public_60"]),
                EntityData::VirtualNetwork(public_vn("60.0.0.0", "60.0.0.1")),
            ))
            .unwrap();
        s.add_ref(&pr, EntityType::VirtualNetwork, &public, None).unwrap();

        let private = s
            .create(Entity::new(
                Uuid::new_v4(),
                FqName::from(["default-domain", "admin", "vn_private_66"]),
                EntityData::VirtualNetwork(VirtualNetwork {
                    forwarding_mode: Some(ForwardingMode::L2L3),
                    subnets: vec![Subnet {
                        prefix: "66.0.0.0".parse().unwrap(),
                        prefix_len: 24,
                        gateway: Some("66.0.0.1".parse().unwrap()),
                    }],
                    ..Default::default()
                }),
            ))
            .unwrap();
        let vmi = s
            .create(Entity::new(
                Uuid::new_v4(),
                FqName::from(["default-domain", "admin", "vmi-private"]),
                EntityData::VirtualMachineInterface(Default::default()),
            ))
            .unwrap();
        s.add_ref(&vmi, EntityType::VirtualNetwork, &private, None).unwrap();

        let mut pool = Entity::new(
            Uuid::new_v4(),
            FqName::from(["default-domain", "admin", "vn_public_60", "pool1"]),
            EntityData::FloatingIpPool(Default::default()),
        );
        pool.parent = Some((EntityType::VirtualNetwork, public));
        let pool = s.create(pool).unwrap();
        let mut fip = Entity::new(
            Uuid::new_v4(),
            FqName::from(["default-domain", "admin", "vn_public_60", "pool1", "fip1"]),
            EntityData::FloatingIp(dm_types::FloatingIp {
                address: Some("60.0.0.4".parse().unwrap()),
                fixed_ip: Some("66.0.0.3".parse().unwrap()),
            }),
        );
        fip.parent = Some((EntityType::FloatingIpPool, pool));
        let fip = s.create(fip).unwrap();
        s.add_ref(&fip, EntityType::VirtualMachineInterface, &vmi, None)
            .unwrap();

        let frag = build(&s, &pr);

        let nat = frag
            .routing_instances
            .iter()
            .find(|ri| ri.name.ends_with("-nat"))
            .unwrap();
        assert_eq!(nat.ingress_interfaces, vec!["si-1/2/0.9"]);
        assert_eq!(nat.egress_interfaces, vec!["si-1/2/0.10"]);
        assert_eq!(nat.nat_rules.len(), 2);
        let inbound = &nat.nat_rules[0];
        assert_eq!(inbound.translation_type, "basic-nat44");
        assert_eq!(inbound.source_prefix.prefix.to_string(), "60.0.0.4");
        assert_eq!(inbound.translated_prefix.prefix.to_string(), "66.0.0.3");
        let outbound = &nat.nat_rules[1];
        assert_eq!(outbound.translation_type, "dnat-44");

        let fw = frag.firewall.as_ref().unwrap();
        let public_filter = fw
            .firewall_filters
            .iter()
            .find(|f| f.name == REDIRECT_TO_PUBLIC_VRFS_FILTER)
            .unwrap();
        // One VN term plus the default accept.
        assert_eq!(public_filter.terms.len(), 2);
        assert_eq!(
            public_filter.terms[0]
                .then
                .as_ref()
                .unwrap()
                .routing_instance
                .as_deref(),
            nat.name.strip_suffix("-nat")
        );
        assert!(fw
            .firewall_filters
            .iter()
            .any(|f| f.name.starts_with("redirect-to-") && f.name.ends_with("-nat-vrf")));
    }

    #[test]
    fn test_public_lr_exports_member_vns() {
        let s = EntityStore::new(StoreConfig::default());
        let pr = s
            .create(Entity::new(
                Uuid::new_v4(),
                FqName::from(["default-gsc", "qfx1"]),
                EntityData::PhysicalRouter(dm_types::PhysicalRouter {
                    physical_role: Some(PhysicalRole::Spine),
                    rb_roles: vec!["dc-gateway".into()],
                    ..Default::default()
                }),
            ))
            .unwrap();
        let lr = s
            .create(Entity::new(
                Uuid::new_v4(),
                FqName::from(["default-domain", "admin", "lr1"]),
                EntityData::LogicalRouter(dm_types::LogicalRouter {
                    logical_router_type: Some(dm_types::LogicalRouterType::VxlanRouting),
                    gateway_external: true,
                    ..Default::default()
                }),
            ))
            .unwrap();
        s.add_ref(&lr, EntityType::PhysicalRouter, &pr, None).unwrap();

        for (name, cidr) in [("vn1", "10.1.0.0"), ("vn2", "10.2.0.0"), ("vn3", "10.3.0.0")] {
            let vn = s
                .create(Entity::new(
                    Uuid::new_v4(),
                    FqName::from(["default-domain", "admin"]).child(name),
                    EntityData::VirtualNetwork(VirtualNetwork {
                        forwarding_mode: Some(ForwardingMode::L2L3),
                        subnets: vec![Subnet {
                            prefix: cidr.parse().unwrap(),
                            prefix_len: 24,
                            gateway: None,
                        }],
                        ..Default::default()
                    }),
                ))
                .unwrap();
            let vmi = s
                .create(Entity::new(
                    Uuid::new_v4(),
                    FqName::from(["default-domain", "admin"]).child(format!("vmi-{name}")),
                    EntityData::VirtualMachineInterface(Default::default()),
                ))
                .unwrap();
            s.add_ref(&vmi, EntityType::VirtualNetwork, &vn, None).unwrap();
            s.add_ref(&lr, EntityType::VirtualMachineInterface, &vmi, None)
                .unwrap();
        }

        let frag = build(&s, &pr);
        let l3_count = frag
            .routing_instances
            .iter()
            .filter(|ri| ri.virtual_network_mode.as_deref() == Some("l3") && ri.is_public_network)
            .count();
        let l2_count = frag
            .routing_instances
            .iter()
            .filter(|ri| ri.virtual_network_mode.as_deref() == Some("l2"))
            .count();
        // Three tenant L3 RIs plus the internal-VN RI; three L2 RIs.
        assert_eq!(l2_count, 3);
        assert_eq!(l3_count, 4);
        assert!(frag
            .routing_instances
            .iter()
            .any(|ri| ri.virtual_network_is_internal && ri.routing_interfaces.len() == 3));
    }
}
