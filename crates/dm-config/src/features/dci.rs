//! dci: intra-fabric interconnect between logical routers.
//!
//! Route leaking from a source LR into destination LRs, either through
//! a rib group (default) or through vrf import/export policies. A DCI
//! signalling both modes at once is recorded but renders nothing.

use super::gateway::route_targets;
use super::{origin_comment, BuilderContext, FeatureBuilder};
use crate::error::ConfigResult;
use crate::feature::Feature;
use crate::model::{
    FeatureFragment, RibGroup, RoutingInstanceConfig, RoutingPolicyConfig,
};
use crate::names::{dci_community, rib_group_name, vrf_name_l3};
use dm_types::{
    DciType, Entity, EntityType, PolicyTerm, PolicyTermAction, PolicyTermMatch, PrefixMatch,
    Uuid,
};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
enum DciMode {
    Rib,
    Vrf,
}

/// Interconnect mode: virtual-network refs (or a `_VRF_` name marker)
/// select vrf policies, otherwise routes leak through a rib group.
/// Attached routing policies feed whichever mode is chosen.
fn dci_mode(dci: &Entity) -> Option<DciMode> {
    let rib = dci.name().contains("_RIB_");
    let vrf = dci.refs_to(EntityType::VirtualNetwork).next().is_some()
        || dci.name().contains("_VRF_");
    match (rib, vrf) {
        (true, true) => {
            warn!(dci = dci.name(), "both rib and vrf markers set, dci skipped");
            None
        }
        (false, true) => Some(DciMode::Vrf),
        _ => Some(DciMode::Rib),
    }
}

pub struct DciBuilder;

impl DciBuilder {
    /// The source LR of a DCI: the LR ref carrying the `source`
    /// direction attr.
    fn source_lr(ctx: &BuilderContext<'_>, dci: &Entity) -> Option<Entity> {
        dci.refs_to(EntityType::LogicalRouter)
            .find(|r| r.lr_direction() == Some("source"))
            .and_then(|r| ctx.store.read(EntityType::LogicalRouter, &r.uuid).ok())
    }

    /// Internal-VN L3 RI name of an LR.
    fn internal_ri_name(ctx: &BuilderContext<'_>, lr: &Entity) -> Option<String> {
        let internal = ctx.lr_internal_vn(lr)?;
        let data = internal.data.as_virtual_network()?;
        Some(vrf_name_l3(internal.name(), data.vn_network_id))
    }

    /// Community carried by routes leaked out of the source LR,
    /// derived from its internal VN's route target.
    fn source_community(ctx: &BuilderContext<'_>, source_lr: &Entity) -> Option<String> {
        let internal = ctx.lr_internal_vn(source_lr)?;
        let data = internal.data.as_virtual_network()?;
        route_targets(ctx, data)
            .first()
            .map(|rt| dci_community(rt))
    }

    /// Referenced routing policies, emitted into the fragment and
    /// returned by name.
    fn policy_names(
        ctx: &BuilderContext<'_>,
        dci: &Entity,
        frag: &mut FeatureFragment,
    ) -> Vec<String> {
        let mut names = Vec::new();
        for r in dci.refs_to(EntityType::RoutingPolicy) {
            let Ok(rp) = ctx.store.read(EntityType::RoutingPolicy, &r.uuid) else {
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

    /// Accept-filter over the destination LRs' tenant prefixes, used
    /// when the DCI names no policies of its own.
    fn synthetic_policy(
        ctx: &BuilderContext<'_>,
        dci: &Entity,
        dest_lrs: &[Entity],
        frag: &mut FeatureFragment,
    ) -> String {
        let name = format!("_contrail_{}-import", dci.name());
        let mut prefixes = Vec::new();
        for lr in dest_lrs {
            for vn in ctx.lr_tenant_vns(lr) {
                let Some(data) = vn.data.as_virtual_network() else {
                    continue;
                };
                for subnet in &data.subnets {
                    prefixes.push(PrefixMatch {
                        prefix: subnet.clone(),
                        match_type: Some("orlonger".to_string()),
                    });
                }
            }
        }
        frag.routing_policies.push(RoutingPolicyConfig {
            name: name.clone(),
            comment: Some(origin_comment("Data Center Interconnect", dci)),
            term_type: Some("network-device".to_string()),
            terms: vec![PolicyTerm {
                from: PolicyTermMatch {
                    prefixes,
                    ..Default::default()
                },
                then: PolicyTermAction {
                    action: "accept".to_string(),
                    ..Default::default()
                },
            }],
        });
        name
    }

    /// Export policy on the source RI tagging leaked routes with the
    /// interconnect community.
    fn export_policy(
        dci: &Entity,
        community: &str,
        frag: &mut FeatureFragment,
    ) -> String {
        let name = format!("_contrail_{}-export", dci.name());
        frag.routing_policies.push(RoutingPolicyConfig {
            name: name.clone(),
            comment: Some(origin_comment("Data Center Interconnect", dci)),
            term_type: Some("network-device".to_string()),
            terms: vec![PolicyTerm {
                from: PolicyTermMatch::default(),
                then: PolicyTermAction {
                    action: "accept".to_string(),
                    community_add: vec![community.to_string()],
                    ..Default::default()
                },
            }],
        });
        name
    }

    /// Import policy accepting routes carrying the interconnect
    /// community, used on destination RIs when no source policies are
    /// attached.
    fn community_import_policy(
        dci: &Entity,
        community: &str,
        frag: &mut FeatureFragment,
    ) -> String {
        let name = format!("_contrail_{}-import", dci.name());
        frag.routing_policies.push(RoutingPolicyConfig {
            name: name.clone(),
            comment: Some(origin_comment("Data Center Interconnect", dci)),
            term_type: Some("network-device".to_string()),
            terms: vec![PolicyTerm {
                from: PolicyTermMatch {
                    communities: vec![community.to_string()],
                    ..Default::default()
                },
                then: PolicyTermAction {
                    action: "accept".to_string(),
                    ..Default::default()
                },
            }],
        });
        name
    }
}

impl FeatureBuilder for DciBuilder {
    fn feature(&self) -> Feature {
        Feature::Dci
    }

    fn build(&self, ctx: &BuilderContext<'_>) -> ConfigResult<FeatureFragment> {
        let mut frag = FeatureFragment::default();
        let member_lrs: Vec<_> = ctx.member_logical_routers();

        for dci in ctx
            .store
            .list(EntityType::DataCenterInterconnect, &Default::default())
        {
            let Some(data) = dci.data.as_data_center_interconnect().cloned() else {
                continue;
            };
            if data.dci_type == Some(DciType::InterFabric) {
                debug!(dci = dci.name(), "inter-fabric dci not rendered");
                continue;
            }
            let Some(source_lr) = Self::source_lr(ctx, &dci) else {
                continue;
            };
            // Only devices terminating the source LR render the leak.
            if !member_lrs.iter().any(|lr| lr.uuid == source_lr.uuid) {
                continue;
            }
            let Some(mode) = dci_mode(&dci) else {
                continue;
            };
            let Some(source_ri) = Self::internal_ri_name(ctx, &source_lr) else {
                continue;
            };

            let destinations: Vec<(Vec<Uuid>, Entity)> = data
                .destinations
                .iter()
                .filter_map(|d| {
                    ctx.store
                        .read(EntityType::LogicalRouter, &d.logical_router)
                        .ok()
                        .map(|lr| (d.physical_routers.clone(), lr))
                })
                .collect();
            let dest_lrs: Vec<Entity> =
                destinations.iter().map(|(_, lr)| lr.clone()).collect();

            match mode {
                DciMode::Rib => {
                    let mut import_rib = vec![source_ri.clone()];
                    // Destination RIs land in the group only where the
                    // destination is pinned to this device.
                    for (pinned, lr) in &destinations {
                        if !pinned.contains(&ctx.device.uuid) {
                            continue;
                        }
                        if let Some(ri) = Self::internal_ri_name(ctx, lr) {
                            if !import_rib.contains(&ri) {
                                import_rib.push(ri);
                            }
                        }
                    }
                    let mut import_policy = Self::policy_names(ctx, &dci, &mut frag);
                    if import_policy.is_empty() {
                        import_policy =
                            vec![Self::synthetic_policy(ctx, &dci, &dest_lrs, &mut frag)];
                    }
                    let group = rib_group_name(dci.name(), &dci.uuid);
                    frag.rib_groups.push(RibGroup {
                        name: group.clone(),
                        comment: Some(origin_comment("Data Center Interconnect", &dci)),
                        import_rib,
                        import_policy,
                    });
                    let mut ri = RoutingInstanceConfig::named(source_ri);
                    ri.virtual_network_is_internal = true;
                    ri.rib_group = Some(group);
                    frag.merge(FeatureFragment {
                        routing_instances: vec![ri],
                        ..Default::default()
                    });
                }
                DciMode::Vrf => {
                    let Some(community) = Self::source_community(ctx, &source_lr) else {
                        continue;
                    };
                    let export = Self::export_policy(&dci, &community, &mut frag);
                    let mut ri = RoutingInstanceConfig::named(source_ri.clone());
                    ri.virtual_network_is_internal = true;
                    ri.vrf_export = vec![export];
                    frag.merge(FeatureFragment {
                        routing_instances: vec![ri],
                        ..Default::default()
                    });

                    // Destinations import the attached source policies
                    // directly, or accept the leak community.
                    let mut imports = Self::policy_names(ctx, &dci, &mut frag);
                    if imports.is_empty() {
                        imports = vec![Self::community_import_policy(
                            &dci, &community, &mut frag,
                        )];
                    }
                    for lr in &dest_lrs {
                        let Some(dst_ri) = Self::internal_ri_name(ctx, lr) else {
                            continue;
                        };
                        if dst_ri == source_ri {
                            continue;
                        }
                        let mut ri = RoutingInstanceConfig::named(dst_ri);
                        ri.virtual_network_is_internal = true;
                        ri.vrf_import = imports.clone();
                        frag.merge(FeatureFragment {
                            routing_instances: vec![ri],
                            ..Default::default()
                        });
                    }
                }
            }
        }
        Ok(frag)
    }
}
