//! firewall: security-group filters for VPG-attached workloads.

use super::{origin_comment, BuilderContext, FeatureBuilder};
use crate::error::ConfigResult;
use crate::feature::Feature;
use crate::model::{
    FeatureFragment, Firewall, FirewallFilter, FirewallTerm, TermMatch, TermThen,
};
use crate::names::sg_filter_name;
use dm_types::{Entity, EntityType, SecurityGroupRule};

fn port_range(rule: &SecurityGroupRule) -> Vec<String> {
    match (rule.port_start, rule.port_end) {
        (Some(start), Some(end)) if start != end => vec![format!("{start}-{end}")],
        (Some(start), _) => vec![start.to_string()],
        (None, Some(end)) => vec![end.to_string()],
        (None, None) => Vec::new(),
    }
}

fn rule_term(idx: usize, rule: &SecurityGroupRule) -> FirewallTerm {
    FirewallTerm {
        name: format!("{}-rule-{idx}", rule.direction),
        fromxx: Some(TermMatch {
            ether_type: rule.ether_type.clone(),
            protocol: rule.protocol.clone(),
            source_address: rule.src_prefixes.clone(),
            destination_address: rule.dst_prefixes.clone(),
            source_ports: if rule.direction == "egress" {
                port_range(rule)
            } else {
                Vec::new()
            },
            destination_ports: if rule.direction == "ingress" {
                port_range(rule)
            } else {
                Vec::new()
            },
        }),
        then: Some(TermThen {
            action: Some("accept".to_string()),
            routing_instance: None,
        }),
    }
}

pub struct FirewallBuilder;

impl FirewallBuilder {
    /// Security groups attached to the device's VPG workloads.
    fn device_security_groups(ctx: &BuilderContext<'_>) -> Vec<Entity> {
        let mut out: Vec<Entity> = Vec::new();
        for vmi in ctx.device_vmis() {
            for sg_ref in vmi.refs_to(EntityType::SecurityGroup) {
                if out.iter().any(|sg| sg.uuid == sg_ref.uuid) {
                    continue;
                }
                if let Ok(sg) = ctx.store.read(EntityType::SecurityGroup, &sg_ref.uuid) {
                    out.push(sg);
                }
            }
        }
        out
    }
}

impl FeatureBuilder for FirewallBuilder {
    fn feature(&self) -> Feature {
        Feature::Firewall
    }

    fn build(&self, ctx: &BuilderContext<'_>) -> ConfigResult<FeatureFragment> {
        let mut frag = FeatureFragment::default();
        let mut filters: Vec<FirewallFilter> = Vec::new();
        for sg in Self::device_security_groups(ctx) {
            let Some(data) = sg.data.as_security_group() else {
                continue;
            };
            for direction in ["ingress", "egress"] {
                let mut terms: Vec<FirewallTerm> = data
                    .rules
                    .iter()
                    .filter(|r| r.direction == direction)
                    .enumerate()
                    .map(|(idx, r)| rule_term(idx, r))
                    .collect();
                if terms.is_empty() {
                    continue;
                }
                // Traffic matching no rule is dropped.
                terms.push(FirewallTerm {
                    name: "default-deny".to_string(),
                    fromxx: None,
                    then: Some(TermThen {
                        action: Some("reject".to_string()),
                        routing_instance: None,
                    }),
                });
                filters.push(FirewallFilter {
                    name: sg_filter_name(sg.name(), direction),
                    comment: Some(origin_comment("Security Group", &sg)),
                    terms,
                });
            }
        }
        if !filters.is_empty() {
            frag.firewall = Some(Firewall {
                firewall_filters: filters,
            });
        }
        Ok(frag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dm_entity_store::{EntityStore, StoreConfig};
    use dm_types::{EntityData, FqName, SecurityGroup, Subnet, Uuid};

    #[test]
    fn test_sg_filters_per_direction() {
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
            FqName::from(["default-gsc", "leaf1", "xe-0/0/1"]),
            EntityData::PhysicalInterface(Default::default()),
        );
        pi.parent = Some((EntityType::PhysicalRouter, pr));
        let pi = s.create(pi).unwrap();
        let vpg = s
            .create(Entity::new(
                Uuid::new_v4(),
                FqName::from(["default-gsc", "fabric1", "vpg1"]),
                EntityData::VirtualPortGroup(Default::default()),
            ))
            .unwrap();
        s.add_ref(&vpg, EntityType::PhysicalInterface, &pi, None).unwrap();
        let vmi = s
            .create(Entity::new(
                Uuid::new_v4(),
                FqName::from(["default-domain", "admin", "vmi1"]),
                EntityData::VirtualMachineInterface(Default::default()),
            ))
            .unwrap();
        s.add_ref(&vpg, EntityType::VirtualMachineInterface, &vmi, None)
            .unwrap();

        let sg = s
            .create(Entity::new(
                Uuid::new_v4(),
                FqName::from(["default-domain", "admin", "web-sg"]),
                EntityData::SecurityGroup(SecurityGroup {
                    rules: vec![
                        SecurityGroupRule {
                            direction: "ingress".into(),
                            protocol: Some("tcp".into()),
                            src_prefixes: vec![Subnet {
                                prefix: "10.0.0.0".parse().unwrap(),
                                prefix_len: 8,
                                gateway: None,
                            }],
                            port_start: Some(80),
                            port_end: Some(443),
                            ether_type: Some("IPv4".into()),
                            ..Default::default()
                        },
                        SecurityGroupRule {
                            direction: "egress".into(),
                            protocol: Some("udp".into()),
                            port_start: Some(53),
                            port_end: Some(53),
                            ..Default::default()
                        },
                    ],
                }),
            ))
            .unwrap();
        s.add_ref(&vmi, EntityType::SecurityGroup, &sg, None).unwrap();

        let device = s.read(EntityType::PhysicalRouter, &pr).unwrap();
        let data = device.data.as_physical_router().unwrap().clone();
        let ctx = BuilderContext {
            store: &s,
            device: &device,
            device_data: &data,
            features: &[],
        };
        let frag = FirewallBuilder.build(&ctx).unwrap();

        let fw = frag.firewall.as_ref().unwrap();
        assert_eq!(fw.firewall_filters.len(), 2);
        let ingress = fw
            .firewall_filters
            .iter()
            .find(|f| f.name == "sg-filter-web-sg-ingress")
            .unwrap();
        // One rule term plus the default deny.
        assert_eq!(ingress.terms.len(), 2);
        let from = ingress.terms[0].fromxx.as_ref().unwrap();
        assert_eq!(from.destination_ports, vec!["80-443"]);
        assert_eq!(from.protocol.as_deref(), Some("tcp"));
        assert_eq!(ingress.terms[1].then.as_ref().unwrap().action.as_deref(), Some("reject"));

        let egress = fw
            .firewall_filters
            .iter()
            .find(|f| f.name == "sg-filter-web-sg-egress")
            .unwrap();
        let from = egress.terms[0].fromxx.as_ref().unwrap();
        assert_eq!(from.source_ports, vec!["53"]);
    }

    #[test]
    fn test_no_security_groups_no_firewall() {
        let s = EntityStore::new(StoreConfig::default());
        let pr = s
            .create(Entity::new(
                Uuid::new_v4(),
                FqName::from(["default-gsc", "leaf1"]),
                EntityData::PhysicalRouter(Default::default()),
            ))
            .unwrap();
        let device = s.read(EntityType::PhysicalRouter, &pr).unwrap();
        let data = device.data.as_physical_router().unwrap().clone();
        let ctx = BuilderContext {
            store: &s,
            device: &device,
            device_data: &data,
            features: &[],
        };
        let frag = FirewallBuilder.build(&ctx).unwrap();
        assert!(frag.firewall.is_none());
    }
}
