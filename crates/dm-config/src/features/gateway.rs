//! l2-gateway / l3-gateway / vn-interconnect builders.

use super::{origin_comment, BuilderContext, FeatureBuilder};
use crate::error::ConfigResult;
use crate::feature::Feature;
use crate::model::{
    FeatureFragment, LogicalInterfaceConfig, PhysicalInterfaceConfig, RoutingInstanceConfig,
    StaticRoute, VlanConfig,
};
use crate::names::{bd_name, irb_interface, vrf_name_l2, vrf_name_l3};
use dm_types::{Entity, RouteTarget, VirtualNetwork};

/// Import/export targets for a VN: its explicit route targets, or a
/// `target:<asn>:<vn-id>` derived from the device ASN when none are
/// set.
pub(super) fn route_targets(ctx: &BuilderContext<'_>, vn: &VirtualNetwork) -> Vec<String> {
    if vn.route_targets.is_empty() {
        vec![RouteTarget::new(ctx.local_asn(), u64::from(vn.vn_network_id)).0]
    } else {
        vn.route_targets.iter().map(|rt| rt.0.clone()).collect()
    }
}

fn vn_data(vn: &Entity) -> Option<&VirtualNetwork> {
    vn.data.as_virtual_network().filter(|d| !d.is_internal)
}

/// L3 routing instance for one VN, shared with the dc-gateway builder.
pub(super) fn l3_routing_instance(
    ctx: &BuilderContext<'_>,
    vn: &Entity,
    data: &VirtualNetwork,
) -> RoutingInstanceConfig {
    let mut ri = RoutingInstanceConfig::named(vrf_name_l3(vn.name(), data.vn_network_id));
    ri.comment = Some(origin_comment("Virtual Network", vn));
    ri.instance_type = Some("vrf".to_string());
    ri.virtual_network_mode = Some("l3".to_string());
    ri.virtual_network_id = Some(data.vn_network_id);
    ri.is_public_network = data.router_external;
    ri.import_targets = route_targets(ctx, data);
    ri.export_targets = ri.import_targets.clone();
    ri.interfaces = vec![irb_interface(data.vn_network_id)];
    for subnet in &data.subnets {
        ri.static_routes.push(StaticRoute {
            prefix: subnet.prefix,
            prefix_len: subnet.prefix_len,
            next_hop: None,
            bfd: None,
        });
        ri.prefixes.push(subnet.clone());
    }
    ri
}

/// L2 routing instance plus its VLAN for one VN, shared with the
/// dc-gateway builder.
pub(super) fn l2_routing_instance(
    ctx: &BuilderContext<'_>,
    vn: &Entity,
    data: &VirtualNetwork,
) -> (RoutingInstanceConfig, VlanConfig) {
    let vxlan = data.vxlan_id.unwrap_or(data.vn_network_id);
    let mut ri = RoutingInstanceConfig::named(vrf_name_l2(vn.name(), data.vn_network_id));
    ri.comment = Some(origin_comment("Virtual Network", vn));
    ri.instance_type = Some("virtual-switch".to_string());
    ri.virtual_network_mode = Some("l2".to_string());
    ri.virtual_network_id = Some(data.vn_network_id);
    ri.vxlan_id = Some(vxlan);
    ri.import_targets = route_targets(ctx, data);
    ri.export_targets = ri.import_targets.clone();
    ri.interfaces = vec![irb_interface(data.vn_network_id)];

    let mut vlan = VlanConfig {
        name: bd_name(vxlan),
        comment: Some(origin_comment("Virtual Network", vn)),
        vxlan_id: Some(vxlan),
        ..Default::default()
    };
    if data.forwarding_mode.map_or(false, |m| m.includes_l3()) {
        vlan.l3_interface = Some(irb_interface(data.vn_network_id));
    }
    for (_, li) in ctx.logical_interfaces_for_vn(&vn.uuid) {
        ri.interfaces.push(li.name().to_string());
        vlan.interfaces.push(li.name().to_string());
    }
    (ri, vlan)
}

/// IRB interface entry for a VN: one unit carrying the gateway address
/// of each subnet.
pub(super) fn irb_entry(vn: &Entity, data: &VirtualNetwork) -> Option<PhysicalInterfaceConfig> {
    let addresses: Vec<String> = data
        .subnets
        .iter()
        .filter_map(|s| s.gateway.map(|gw| format!("{}/{}", gw, s.prefix_len)))
        .collect();
    if addresses.is_empty() {
        return None;
    }
    let mut irb = PhysicalInterfaceConfig::named("irb");
    irb.interface_type = Some("irb".to_string());
    irb.logical_interfaces.push(LogicalInterfaceConfig {
        name: irb_interface(data.vn_network_id),
        comment: Some(origin_comment("Virtual Network", vn)),
        unit: data.vn_network_id,
        interface_type: Some("irb".to_string()),
        ip_addresses: addresses,
        vlan_tag: None,
    });
    Some(irb)
}

pub struct L2GatewayBuilder;

impl FeatureBuilder for L2GatewayBuilder {
    fn feature(&self) -> Feature {
        Feature::L2Gateway
    }

    fn build(&self, ctx: &BuilderContext<'_>) -> ConfigResult<FeatureFragment> {
        let mut frag = FeatureFragment::default();
        for vn in ctx.connected_vns() {
            let Some(data) = vn_data(&vn) else { continue };
            if !data.forwarding_mode.map_or(false, |m| m.includes_l2()) {
                continue;
            }
            let (ri, vlan) = l2_routing_instance(ctx, &vn, data);
            frag.routing_instances.push(ri);
            frag.vlans.push(vlan);
            if data.forwarding_mode.map_or(false, |m| m.includes_l3()) {
                if let Some(irb) = irb_entry(&vn, data) {
                    frag.merge(FeatureFragment {
                        physical_interfaces: vec![irb],
                        ..Default::default()
                    });
                }
            }
        }
        Ok(frag)
    }
}

pub struct L3GatewayBuilder;

impl FeatureBuilder for L3GatewayBuilder {
    fn feature(&self) -> Feature {
        Feature::L3Gateway
    }

    fn build(&self, ctx: &BuilderContext<'_>) -> ConfigResult<FeatureFragment> {
        let mut frag = FeatureFragment::default();
        for vn in ctx.connected_vns() {
            let Some(data) = vn_data(&vn) else { continue };
            if !data.forwarding_mode.map_or(false, |m| m.includes_l3()) {
                continue;
            }
            frag.routing_instances.push(l3_routing_instance(ctx, &vn, data));
            if let Some(irb) = irb_entry(&vn, data) {
                frag.merge(FeatureFragment {
                    physical_interfaces: vec![irb],
                    ..Default::default()
                });
            }
        }
        Ok(frag)
    }
}

/// Emits the internal-VN L3 routing instance of each vxlan-routing LR
/// the device is a member of; its routing interfaces are the union of
/// the member VNs' IRBs.
pub struct VnInterconnectBuilder;

impl FeatureBuilder for VnInterconnectBuilder {
    fn feature(&self) -> Feature {
        Feature::VnInterconnect
    }

    fn build(&self, ctx: &BuilderContext<'_>) -> ConfigResult<FeatureFragment> {
        let mut frag = FeatureFragment::default();
        for lr in ctx.member_logical_routers() {
            let Some(internal) = ctx.lr_internal_vn(&lr) else {
                continue;
            };
            let Some(data) = internal.data.as_virtual_network() else {
                continue;
            };
            let mut ri =
                RoutingInstanceConfig::named(vrf_name_l3(internal.name(), data.vn_network_id));
            ri.comment = Some(origin_comment("Logical Router", &lr));
            ri.instance_type = Some("vrf".to_string());
            ri.virtual_network_mode = Some("l3".to_string());
            ri.virtual_network_id = Some(data.vn_network_id);
            ri.virtual_network_is_internal = true;
            ri.vxlan_id = data.vxlan_id;
            let mut targets: Vec<String> = Vec::new();
            for vn in ctx.lr_tenant_vns(&lr) {
                let Some(vn_data) = vn.data.as_virtual_network() else {
                    continue;
                };
                ri.routing_interfaces
                    .push(irb_interface(vn_data.vn_network_id));
                for rt in route_targets(ctx, vn_data) {
                    if !targets.contains(&rt) {
                        targets.push(rt);
                    }
                }
            }
            ri.import_targets = targets.clone();
            ri.export_targets = targets;
            frag.routing_instances.push(ri);
        }
        Ok(frag)
    }
}
