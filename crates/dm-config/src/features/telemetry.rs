//! telemetry: sflow profiles and interface instrumentation.

use super::{origin_comment, BuilderContext, FeatureBuilder};
use crate::error::ConfigResult;
use crate::feature::Feature;
use crate::model::{
    CollectorParams, FeatureFragment, PhysicalInterfaceConfig, SflowInterfaceOverride,
    SflowProfileConfig, TelemetryConfig,
};
use crate::names::profile_name;
use dm_types::{Entity, EntityType, SflowInterfaceType, SflowProfile};

const SFLOW_COLLECTOR_UDP_PORT: u16 = 6343;

fn qualified(entity: &Entity) -> String {
    profile_name(entity.name(), entity.fq_name.project().unwrap_or_default())
}

pub struct TelemetryBuilder;

impl TelemetryBuilder {
    /// Interfaces to tag, with their per-interface overrides for
    /// `custom` instrumentation.
    fn tagged_interfaces(
        ctx: &BuilderContext<'_>,
        sflow: &SflowProfile,
    ) -> Vec<(String, Option<SflowInterfaceOverride>)> {
        let mut out = Vec::new();
        match sflow.enabled_interface_type {
            Some(SflowInterfaceType::All) => {
                for pi in ctx.device_interfaces() {
                    out.push((pi.name().to_string(), None));
                }
            }
            Some(SflowInterfaceType::Custom) => {
                let device_names: Vec<String> = ctx
                    .device_interfaces()
                    .iter()
                    .map(|pi| pi.name().to_string())
                    .collect();
                for params in &sflow.enabled_interface_params {
                    if !device_names.contains(&params.name) {
                        continue;
                    }
                    let overrides = if params.sample_rate.is_some()
                        || params.polling_interval.is_some()
                    {
                        Some(SflowInterfaceOverride {
                            sample_rate: params.sample_rate,
                            polling_interval: params.polling_interval,
                        })
                    } else {
                        None
                    };
                    out.push((params.name.clone(), overrides));
                }
            }
            Some(selector) => {
                let wanted = match selector {
                    SflowInterfaceType::Access => dm_types::InterfaceKind::Access,
                    SflowInterfaceType::Fabric => dm_types::InterfaceKind::Fabric,
                    SflowInterfaceType::Service => dm_types::InterfaceKind::Service,
                    _ => unreachable!(),
                };
                for pi in ctx.device_interfaces() {
                    let kind = pi
                        .data
                        .as_physical_interface()
                        .and_then(|d| d.interface_kind);
                    if kind == Some(wanted) {
                        out.push((pi.name().to_string(), None));
                    }
                }
            }
            None => {}
        }
        out
    }

    fn collector(ctx: &BuilderContext<'_>) -> Option<CollectorParams> {
        ctx.store
            .list(EntityType::FlowNode, &Default::default())
            .iter()
            .find_map(|node| node.data.as_flow_node().and_then(|d| d.lb_ip))
            .map(|ip| CollectorParams {
                ip_address: ip,
                udp_port: SFLOW_COLLECTOR_UDP_PORT,
            })
    }
}

impl FeatureBuilder for TelemetryBuilder {
    fn feature(&self) -> Feature {
        Feature::Telemetry
    }

    fn build(&self, ctx: &BuilderContext<'_>) -> ConfigResult<FeatureFragment> {
        let mut frag = FeatureFragment::default();
        let Some(tp_uuid) = ctx.device.ref_to(EntityType::TelemetryProfile) else {
            return Ok(frag);
        };
        let Ok(tp) = ctx.store.read(EntityType::TelemetryProfile, &tp_uuid) else {
            return Ok(frag);
        };
        let tp_name = qualified(&tp);

        let sflow = tp
            .ref_to(EntityType::SflowProfile)
            .and_then(|uuid| ctx.store.read(EntityType::SflowProfile, &uuid).ok());
        let sflow_config = sflow.as_ref().and_then(|sp| {
            let data = sp.data.as_sflow_profile()?;
            Some(SflowProfileConfig {
                name: qualified(sp),
                agent_id: data.agent_id.clone(),
                sample_rate: data.sample_rate,
                polling_interval: data.polling_interval,
                adaptive_sample_rate: data.adaptive_sample_rate,
                enabled_interface_type: data.enabled_interface_type,
                collector_params: Self::collector(ctx),
            })
        });

        frag.telemetry.push(TelemetryConfig {
            name: tp_name.clone(),
            comment: Some(origin_comment("Telemetry Profile", &tp)),
            sflow_profile: sflow_config,
        });

        if let Some(sp) = &sflow {
            if let Some(data) = sp.data.as_sflow_profile() {
                for (iface, overrides) in Self::tagged_interfaces(ctx, data) {
                    let mut entry = PhysicalInterfaceConfig::named(iface);
                    entry.telemetry_profile = Some(tp_name.clone());
                    entry.sflow_params = overrides;
                    frag.merge(FeatureFragment {
                        physical_interfaces: vec![entry],
                        ..Default::default()
                    });
                }
            }
        }
        Ok(frag)
    }
}
