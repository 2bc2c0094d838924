//! routed-vn: protocol config for routed virtual networks.
//!
//! A routed VN carries one `RoutedProperties` block per terminating
//! device; only the block naming this device is rendered.

use super::{origin_comment, BuilderContext, FeatureBuilder};
use crate::error::ConfigResult;
use crate::feature::Feature;
use crate::model::{
    FeatureFragment, RiBgp, RiOspf, RiPim, RiProtocols, RoutingInstanceConfig,
    RoutingPolicyConfig, StaticRoute,
};
use crate::names::{irb_interface, quote_auth_key, vrf_name_l3};
use dm_types::{
    Entity, EntityType, RoutedProperties, RoutedProtocol, Uuid, VnCategory,
};
use tracing::debug;

pub struct RoutedVnBuilder;

impl RoutedVnBuilder {
    /// Resolves policy uuids to names and emits their definitions into
    /// the fragment.
    fn resolve_policies(
        ctx: &BuilderContext<'_>,
        uuids: &[Uuid],
        frag: &mut FeatureFragment,
    ) -> Vec<String> {
        let mut names = Vec::new();
        for uuid in uuids {
            let Ok(rp) = ctx.store.read(EntityType::RoutingPolicy, uuid) else {
                debug!(%uuid, "routing policy missing, dropped from routed-vn config");
                continue;
            };
            let Some(data) = rp.data.as_routing_policy() else {
                continue;
            };
            let name = rp.name().to_string();
            if !frag.routing_policies.iter().any(|p| p.name == name) {
                frag.routing_policies.push(RoutingPolicyConfig {
                    name: name.clone(),
                    comment: Some(origin_comment("Routing Policy", &rp)),
                    term_type: Some("network-device".to_string()),
                    terms: data.terms.clone(),
                });
            }
            names.push(name);
        }
        names
    }

    fn protocols(
        ctx: &BuilderContext<'_>,
        vn: &Entity,
        props: &RoutedProperties,
        frag: &mut FeatureFragment,
    ) -> (RiProtocols, Vec<StaticRoute>) {
        let mut protocols = RiProtocols::default();
        let mut static_routes = Vec::new();
        let (import_policies, export_policies) = match &props.routing_policies {
            Some(rp) => (
                Self::resolve_policies(ctx, &rp.import_policies, frag),
                Self::resolve_policies(ctx, &rp.export_policies, frag),
            ),
            None => (Vec::new(), Vec::new()),
        };

        match props.routing_protocol {
            Some(RoutedProtocol::Bgp) => {
                let params = props.bgp.clone().unwrap_or_default();
                protocols.bgp.push(RiBgp {
                    name: format!("{}-bgp", vn.name()),
                    comment: Some(origin_comment("Virtual Network", vn)),
                    peer_ip: params.peer_ip,
                    peer_asn: params.peer_asn,
                    local_asn: params.local_asn,
                    autonomous_system: Some(ctx.local_asn()),
                    authentication_key: params.authentication_key.map(|k| quote_auth_key(&k)),
                    hold_time: params.hold_time,
                    bfd: props.bfd.clone(),
                    import_policies,
                    export_policies,
                });
            }
            Some(RoutedProtocol::Ospf) => {
                let params = props.ospf.clone().unwrap_or_default();
                protocols.ospf.push(RiOspf {
                    name: format!("{}-ospf", vn.name()),
                    comment: Some(origin_comment("Virtual Network", vn)),
                    hello_interval: params.hello_interval,
                    dead_interval: params.dead_interval,
                    area_id: params.area_id,
                    area_type: params.area_type,
                    originate_summary_lsa: params.originate_summary_lsa,
                    advertise_loopback: params.advertise_loopback,
                    bfd: props.bfd.clone(),
                    import_policies,
                    export_policies,
                });
            }
            Some(RoutedProtocol::Pim) => {
                let params = props.pim.clone().unwrap_or_default();
                protocols.pim.push(RiPim {
                    name: format!("{}-pim", vn.name()),
                    comment: Some(origin_comment("Virtual Network", vn)),
                    mode: params.mode,
                    rp_addresses: params.rp_addresses,
                    pim_interfaces: if params.enable_all_interfaces {
                        vec!["all".to_string()]
                    } else {
                        Vec::new()
                    },
                    bfd: props.bfd.clone(),
                });
            }
            Some(RoutedProtocol::StaticRoutes) => {
                let params = props.static_routes.clone().unwrap_or_default();
                for irt_uuid in &params.interface_route_tables {
                    let Ok(irt) = ctx
                        .store
                        .read(EntityType::InterfaceRouteTable, irt_uuid)
                    else {
                        continue;
                    };
                    let Some(data) = irt.data.as_interface_route_table() else {
                        continue;
                    };
                    for prefix in &data.prefixes {
                        static_routes.push(StaticRoute {
                            prefix: prefix.prefix,
                            prefix_len: prefix.prefix_len,
                            next_hop: params.next_hop,
                            bfd: props.bfd.clone(),
                        });
                    }
                }
            }
            None => {}
        }
        (protocols, static_routes)
    }
}

impl FeatureBuilder for RoutedVnBuilder {
    fn feature(&self) -> Feature {
        Feature::RoutedVn
    }

    fn build(&self, ctx: &BuilderContext<'_>) -> ConfigResult<FeatureFragment> {
        let mut frag = FeatureFragment::default();
        for vn in ctx.store.list(EntityType::VirtualNetwork, &Default::default()) {
            let Some(data) = vn.data.as_virtual_network() else {
                continue;
            };
            if data.category != Some(VnCategory::Routed) {
                continue;
            }
            let Some(props) = data
                .routed_properties
                .iter()
                .find(|p| p.physical_router == Some(ctx.device.uuid))
            else {
                continue;
            };

            let mut ri = RoutingInstanceConfig::named(vrf_name_l3(
                vn.name(),
                data.vn_network_id,
            ));
            ri.comment = Some(origin_comment("Virtual Network", &vn));
            ri.instance_type = Some("vrf".to_string());
            ri.virtual_network_mode = Some("l3".to_string());
            ri.virtual_network_id = Some(data.vn_network_id);
            ri.interfaces = vec![irb_interface(data.vn_network_id)];

            let (protocols, static_routes) = Self::protocols(ctx, &vn, props, &mut frag);
            if !protocols.is_empty() {
                ri.protocols = Some(protocols);
            }
            ri.static_routes = static_routes;
            frag.routing_instances.push(ri);
        }
        Ok(frag)
    }
}
