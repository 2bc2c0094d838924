//! Feature identifiers and the global dependency order.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A named unit of device functionality. Variant order IS the global
/// feature dependency order (leaves first), so the derived `Ord`
/// sorts an enabled-feature list into build order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Feature {
    UnderlayIpClos,
    OverlayBgp,
    L2Gateway,
    L3Gateway,
    VnInterconnect,
    RoutedVn,
    StormControl,
    PortProfile,
    Telemetry,
    Firewall,
    InfraBmsAccess,
    PnfServiceChaining,
    Dci,
    DcGateway,
}

impl Feature {
    /// All features in dependency order.
    pub const ORDER: &'static [Feature] = &[
        Feature::UnderlayIpClos,
        Feature::OverlayBgp,
        Feature::L2Gateway,
        Feature::L3Gateway,
        Feature::VnInterconnect,
        Feature::RoutedVn,
        Feature::StormControl,
        Feature::PortProfile,
        Feature::Telemetry,
        Feature::Firewall,
        Feature::InfraBmsAccess,
        Feature::PnfServiceChaining,
        Feature::Dci,
        Feature::DcGateway,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Feature::UnderlayIpClos => "underlay-ip-clos",
            Feature::OverlayBgp => "overlay-bgp",
            Feature::L2Gateway => "l2-gateway",
            Feature::L3Gateway => "l3-gateway",
            Feature::VnInterconnect => "vn-interconnect",
            Feature::RoutedVn => "routed-vn",
            Feature::StormControl => "storm-control",
            Feature::PortProfile => "port-profile",
            Feature::Telemetry => "telemetry",
            Feature::Firewall => "firewall",
            Feature::InfraBmsAccess => "infra-bms-access",
            Feature::PnfServiceChaining => "pnf-service-chaining",
            Feature::Dci => "dci",
            Feature::DcGateway => "dc-gateway",
        }
    }

    pub fn parse(s: &str) -> Option<Feature> {
        Feature::ORDER.iter().copied().find(|f| f.name() == s)
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
