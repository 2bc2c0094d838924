//! Role-based feature resolution.
//!
//! A device's enabled features are the union of the features declared
//! by the role definitions matching its (physical_role, rb_role)
//! pairs. Definitions are read from the graph when present; a built-in
//! table covers the stock roles. Missing definitions or unknown
//! feature names degrade to warnings, never to a failed generation.

use crate::feature::Feature;
use dm_entity_store::{EntityStore, ListFilter};
use dm_types::{Entity, EntityType, PhysicalRole};
use tracing::{debug, warn};

/// The result of resolving one device's roles.
#[derive(Debug, Clone, Default)]
pub struct ResolvedFeatures {
    /// Enabled features in dependency order.
    pub features: Vec<Feature>,
    /// Per-device resolution warnings, carried into the generation
    /// report.
    pub warnings: Vec<String>,
}

impl ResolvedFeatures {
    pub fn contains(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }
}

/// Stock (physical_role, overlay_role) -> features table, used when
/// the graph holds no matching role-definition entity.
const BUILT_IN_ROLES: &[(&str, &str, &[Feature])] = &[
    (
        "leaf",
        "crb-access",
        &[
            Feature::UnderlayIpClos,
            Feature::OverlayBgp,
            Feature::L2Gateway,
            Feature::StormControl,
            Feature::PortProfile,
            Feature::Telemetry,
            Feature::Firewall,
            Feature::InfraBmsAccess,
        ],
    ),
    (
        "leaf",
        "erb-ucast-gateway",
        &[
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
        ],
    ),
    (
        "leaf",
        "crb-gateway",
        &[
            Feature::UnderlayIpClos,
            Feature::OverlayBgp,
            Feature::L2Gateway,
            Feature::L3Gateway,
            Feature::VnInterconnect,
        ],
    ),
    (
        "leaf",
        "dc-gateway",
        &[
            Feature::UnderlayIpClos,
            Feature::OverlayBgp,
            Feature::Dci,
            Feature::DcGateway,
        ],
    ),
    (
        "spine",
        "crb-access",
        &[
            Feature::UnderlayIpClos,
            Feature::OverlayBgp,
            Feature::L2Gateway,
            Feature::StormControl,
            Feature::PortProfile,
            Feature::Telemetry,
            Feature::Firewall,
        ],
    ),
    (
        "spine",
        "crb-gateway",
        &[
            Feature::UnderlayIpClos,
            Feature::OverlayBgp,
            Feature::L2Gateway,
            Feature::L3Gateway,
            Feature::VnInterconnect,
            Feature::RoutedVn,
        ],
    ),
    (
        "spine",
        "dc-gateway",
        &[
            Feature::UnderlayIpClos,
            Feature::OverlayBgp,
            Feature::Dci,
            Feature::DcGateway,
        ],
    ),
    (
        "spine",
        "pnf-servicechain",
        &[Feature::PnfServiceChaining],
    ),
    ("spine", "route-reflector", &[Feature::OverlayBgp]),
    ("pnf", "pnf-servicechain", &[Feature::PnfServiceChaining]),
];

/// Resolves enabled features for physical routers.
#[derive(Debug)]
pub struct FeatureResolver<'a> {
    store: &'a EntityStore,
}

impl<'a> FeatureResolver<'a> {
    pub fn new(store: &'a EntityStore) -> Self {
        Self { store }
    }

    /// Computes the ordered feature list for one device entity.
    pub fn enabled_features(&self, device: &Entity) -> ResolvedFeatures {
        let mut resolved = ResolvedFeatures::default();
        let Some(pr) = device.data.as_physical_router() else {
            resolved
                .warnings
                .push(format!("{} is not a physical-router", device.name()));
            return resolved;
        };
        let Some(physical_role) = pr.physical_role else {
            resolved.warnings.push(format!(
                "device {} has no physical role assigned",
                device.name()
            ));
            return resolved;
        };

        let definitions = self
            .store
            .list(EntityType::RoleDefinition, &ListFilter::default());

        for rb_role in &pr.rb_roles {
            match self.features_for(physical_role, rb_role, &definitions, &mut resolved) {
                Some(features) => {
                    for f in features {
                        if !resolved.features.contains(&f) {
                            resolved.features.push(f);
                        }
                    }
                }
                None => {
                    warn!(
                        device = device.name(),
                        physical_role = physical_role.as_str(),
                        rb_role,
                        "no role definition, skipping role"
                    );
                    resolved.warnings.push(format!(
                        "no role definition for ({}, {})",
                        physical_role.as_str(),
                        rb_role
                    ));
                }
            }
        }

        resolved.features.sort();
        debug!(device = device.name(), features = ?resolved.features, "resolved");
        resolved
    }

    fn features_for(
        &self,
        physical_role: PhysicalRole,
        rb_role: &str,
        definitions: &[Entity],
        resolved: &mut ResolvedFeatures,
    ) -> Option<Vec<Feature>> {
        // Graph-provided definitions win over the built-in table.
        for def in definitions {
            let Some(data) = def.data.as_role_definition() else {
                continue;
            };
            if data.physical_role == physical_role.as_str() && data.overlay_role == rb_role {
                let mut features = Vec::new();
                for name in &data.features {
                    match Feature::parse(name) {
                        Some(f) => features.push(f),
                        None => resolved.warnings.push(format!(
                            "role definition {} names unknown feature {}",
                            def.name(),
                            name
                        )),
                    }
                }
                return Some(features);
            }
        }

        BUILT_IN_ROLES
            .iter()
            .find(|(p, o, _)| *p == physical_role.as_str() && *o == rb_role)
            .map(|(_, _, features)| features.to_vec())
    }
}
