//! underlay-ip-clos: fabric-facing interface inventory.

use super::{origin_comment, BuilderContext, FeatureBuilder};
use crate::error::ConfigResult;
use crate::feature::Feature;
use crate::model::{FeatureFragment, PhysicalInterfaceConfig};
use dm_types::InterfaceKind;

/// Emits the device's fabric and loopback interfaces so higher
/// features can hang units off them.
pub struct UnderlayIpClosBuilder;

impl FeatureBuilder for UnderlayIpClosBuilder {
    fn feature(&self) -> Feature {
        Feature::UnderlayIpClos
    }

    fn build(&self, ctx: &BuilderContext<'_>) -> ConfigResult<FeatureFragment> {
        let mut frag = FeatureFragment::default();
        for pi in ctx.device_interfaces() {
            let Some(data) = pi.data.as_physical_interface() else {
                continue;
            };
            let kind = match data.interface_kind {
                Some(k @ (InterfaceKind::Fabric | InterfaceKind::Loopback)) => k,
                _ => continue,
            };
            let mut entry = PhysicalInterfaceConfig::named(pi.name());
            entry.comment = Some(origin_comment("Physical Interface", &pi));
            entry.interface_type = Some(kind.as_str().to_string());
            frag.physical_interfaces.push(entry);
        }
        Ok(frag)
    }
}
