//! storm-control / port-profile builders.
//!
//! Profiles reach a device through the VPGs anchored on its access
//! interfaces; emitted names are project-qualified.

use super::{origin_comment, BuilderContext, FeatureBuilder};
use crate::error::ConfigResult;
use crate::feature::Feature;
use crate::model::{
    FeatureFragment, PhysicalInterfaceConfig, PortProfileConfig, StormControl,
};
use crate::names::profile_name;
use dm_types::{Entity, EntityType};

/// Project-qualified name of a profile entity.
fn qualified(entity: &Entity) -> String {
    profile_name(entity.name(), entity.fq_name.project().unwrap_or_default())
}

/// Port profiles bound to the device, with the VPG member interfaces
/// (on this device) they apply to.
fn device_port_profiles(ctx: &BuilderContext<'_>) -> Vec<(Entity, Vec<String>)> {
    let device_pis = ctx.device_interfaces();
    let mut out: Vec<(Entity, Vec<String>)> = Vec::new();
    for vpg in ctx.device_vpgs() {
        let mut profiles: Vec<Entity> = Vec::new();
        if let Some(uuid) = vpg.ref_to(EntityType::PortProfile) {
            if let Ok(pp) = ctx.store.read(EntityType::PortProfile, &uuid) {
                profiles.push(pp);
            }
        }
        for vmi_ref in vpg.refs_to(EntityType::VirtualMachineInterface) {
            let Ok(vmi) = ctx
                .store
                .read(EntityType::VirtualMachineInterface, &vmi_ref.uuid)
            else {
                continue;
            };
            if let Some(uuid) = vmi.ref_to(EntityType::PortProfile) {
                if profiles.iter().any(|p| p.uuid == uuid) {
                    continue;
                }
                if let Ok(pp) = ctx.store.read(EntityType::PortProfile, &uuid) {
                    profiles.push(pp);
                }
            }
        }
        if profiles.is_empty() {
            continue;
        }
        let members: Vec<String> = vpg
            .refs_to(EntityType::PhysicalInterface)
            .filter_map(|r| device_pis.iter().find(|pi| pi.uuid == r.uuid))
            .map(|pi| pi.name().to_string())
            .collect();
        for pp in profiles {
            match out.iter_mut().find(|(p, _)| p.uuid == pp.uuid) {
                Some((_, ifaces)) => {
                    for m in &members {
                        if !ifaces.contains(m) {
                            ifaces.push(m.clone());
                        }
                    }
                }
                None => out.push((pp, members.clone())),
            }
        }
    }
    out
}

pub struct StormControlBuilder;

impl FeatureBuilder for StormControlBuilder {
    fn feature(&self) -> Feature {
        Feature::StormControl
    }

    fn build(&self, ctx: &BuilderContext<'_>) -> ConfigResult<FeatureFragment> {
        let mut frag = FeatureFragment::default();
        for (pp, _) in device_port_profiles(ctx) {
            let Some(sc_uuid) = pp.ref_to(EntityType::StormControlProfile) else {
                continue;
            };
            let Ok(sc) = ctx.store.read(EntityType::StormControlProfile, &sc_uuid) else {
                continue;
            };
            let Some(data) = sc.data.as_storm_control_profile() else {
                continue;
            };
            let name = qualified(&sc);
            if frag.storm_control.iter().any(|e| e.name == name) {
                continue;
            }
            frag.storm_control.push(StormControl {
                name,
                comment: Some(origin_comment("Storm Control Profile", &sc)),
                bandwidth_percent: data.bandwidth_percent,
                traffic_type: data.traffic_types.clone(),
                actions: data.actions.clone(),
                recovery_timeout: data.recovery_timeout,
            });
        }
        Ok(frag)
    }
}

pub struct PortProfileBuilder;

impl FeatureBuilder for PortProfileBuilder {
    fn feature(&self) -> Feature {
        Feature::PortProfile
    }

    fn build(&self, ctx: &BuilderContext<'_>) -> ConfigResult<FeatureFragment> {
        let mut frag = FeatureFragment::default();
        for (pp, interfaces) in device_port_profiles(ctx) {
            let Some(data) = pp.data.as_port_profile() else {
                continue;
            };
            let name = qualified(&pp);
            let storm_control_profile = pp
                .ref_to(EntityType::StormControlProfile)
                .and_then(|uuid| ctx.store.read(EntityType::StormControlProfile, &uuid).ok())
                .map(|sc| qualified(&sc));
            frag.port_profiles.push(PortProfileConfig {
                name: name.clone(),
                comment: Some(origin_comment("Port Profile", &pp)),
                flow_control: data.flow_control,
                bpdu_loop_protection: data.bpdu_loop_protection,
                port_params: data.port_params.clone(),
                lacp_params: data.lacp_params.clone(),
                storm_control_profile,
            });
            for iface in interfaces {
                let mut entry = PhysicalInterfaceConfig::named(iface);
                entry.port_profile = Some(name.clone());
                frag.merge(FeatureFragment {
                    physical_interfaces: vec![entry],
                    ..Default::default()
                });
            }
        }
        Ok(frag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dm_entity_store::{EntityStore, StoreConfig};
    use dm_types::{EntityData, FqName, StormControlProfile, Uuid};

    fn fixture() -> (EntityStore, Uuid, Uuid) {
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

        let sc = s
            .create(Entity::new(
                Uuid::new_v4(),
                FqName::from(["default-domain", "admin", "sc1"]),
                EntityData::StormControlProfile(StormControlProfile {
                    bandwidth_percent: Some(20),
                    actions: Some(vec!["interface-shutdown".into()]),
                    ..Default::default()
                }),
            ))
            .unwrap();
        let pp = s
            .create(Entity::new(
                Uuid::new_v4(),
                FqName::from(["default-domain", "admin", "pp1"]),
                EntityData::PortProfile(dm_types::PortProfile {
                    flow_control: true,
                    ..Default::default()
                }),
            ))
            .unwrap();
        s.add_ref(&pp, EntityType::StormControlProfile, &sc, None).unwrap();
        s.add_ref(&vpg, EntityType::PortProfile, &pp, None).unwrap();
        (s, pr, sc)
    }

    fn build<B: FeatureBuilder>(s: &EntityStore, pr: &Uuid, builder: B) -> FeatureFragment {
        let device = s.read(EntityType::PhysicalRouter, pr).unwrap();
        let data = device.data.as_physical_router().unwrap().clone();
        let ctx = BuilderContext {
            store: s,
            device: &device,
            device_data: &data,
            features: &[],
        };
        builder.build(&ctx).unwrap()
    }

    #[test]
    fn test_storm_control_entry_project_qualified() {
        let (s, pr, _) = fixture();
        let frag = build(&s, &pr, StormControlBuilder);
        assert_eq!(frag.storm_control.len(), 1);
        let entry = &frag.storm_control[0];
        assert_eq!(entry.name, "sc1-admin");
        assert_eq!(entry.bandwidth_percent, Some(20));
        assert_eq!(entry.actions.as_deref(), Some(&["interface-shutdown".to_string()][..]));
        assert!(entry.traffic_type.is_none());
    }

    #[test]
    fn test_update_clears_fields() {
        let (s, pr, sc) = fixture();
        s.update(
            &sc,
            &["bandwidth_percent", "recovery_timeout", "actions", "traffic_types"],
            |data| {
                if let EntityData::StormControlProfile(sc) = data {
                    sc.bandwidth_percent = Some(40);
                    sc.recovery_timeout = Some(1200);
                    sc.actions = None;
                    sc.traffic_types = None;
                }
            },
        )
        .unwrap();
        let frag = build(&s, &pr, StormControlBuilder);
        let entry = &frag.storm_control[0];
        assert_eq!(entry.bandwidth_percent, Some(40));
        assert_eq!(entry.recovery_timeout, Some(1200));
        assert!(entry.actions.is_none());
        assert!(entry.traffic_type.is_none());
    }

    #[test]
    fn test_port_profile_tags_member_interface() {
        let (s, pr, _) = fixture();
        let frag = build(&s, &pr, PortProfileBuilder);
        assert_eq!(frag.port_profiles.len(), 1);
        assert_eq!(frag.port_profiles[0].name, "pp1-admin");
        assert_eq!(
            frag.port_profiles[0].storm_control_profile.as_deref(),
            Some("sc1-admin")
        );
        let pi = &frag.physical_interfaces[0];
        assert_eq!(pi.name, "xe-0/0/1");
        assert_eq!(pi.port_profile.as_deref(), Some("pp1-admin"));
    }
}
