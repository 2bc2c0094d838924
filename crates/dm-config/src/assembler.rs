//! Per-device abstract-config assembly.
//!
//! Resolves the device's features, runs the enabled builders in
//! dependency order, merges and normalizes their fragments, and stamps
//! the triggering transaction onto the document.

use crate::error::{ConfigError, ConfigResult};
use crate::feature::Feature;
use crate::features::{all_builders, BuilderContext};
use crate::model::{AbstractConfig, SystemBlock};
use crate::resolver::FeatureResolver;
use dm_dependency::Transaction;
use dm_entity_store::EntityStore;
use dm_types::{EntityType, PhysicalRouter, Uuid};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Outcome summary of one device's generation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationReport {
    pub device: Uuid,
    pub device_name: String,
    pub transaction_id: u64,
    pub transaction_descr: String,
    /// Enabled feature names, in dependency order.
    pub features: Vec<String>,
    /// Feature fragments that came out empty.
    pub empty_features: Vec<String>,
    pub warnings: Vec<String>,
}

/// An assembled config together with its report.
#[derive(Debug, Clone)]
pub struct GeneratedConfig {
    pub config: AbstractConfig,
    pub report: GenerationReport,
}

fn system_block(data: &PhysicalRouter) -> SystemBlock {
    SystemBlock {
        product_name: data.product_name.clone(),
        vendor_name: data.vendor.clone(),
        physical_role: data.physical_role.map(|r| r.as_str().to_string()),
        routing_bridging_roles: data.rb_roles.clone(),
        management_ip: data.management_ip,
        loopback_ip: data.loopback_ip,
    }
}

/// Assembles abstract configs for physical routers.
pub struct ConfigAssembler {
    store: Arc<EntityStore>,
}

impl ConfigAssembler {
    pub fn new(store: Arc<EntityStore>) -> Self {
        Self { store }
    }

    /// Generates the abstract config for one device. Returns `None`
    /// for devices outside management scope (not vnc-managed, or with
    /// no enabled features).
    #[instrument(skip(self, transaction), fields(transaction = transaction.id))]
    pub fn generate(
        &self,
        device_uuid: &Uuid,
        transaction: &Transaction,
    ) -> ConfigResult<Option<GeneratedConfig>> {
        let device = self.store.read(EntityType::PhysicalRouter, device_uuid)?;
        let data = device
            .data
            .as_physical_router()
            .ok_or_else(|| {
                ConfigError::fatal(format!("{device_uuid} is not a physical-router"))
            })?
            .clone();
        if !data.vnc_managed {
            debug!(device = device.name(), "device is not vnc-managed, skipped");
            return Ok(None);
        }

        let resolved = FeatureResolver::new(self.store.as_ref()).enabled_features(&device);
        if resolved.features.is_empty() {
            debug!(device = device.name(), "no features enabled, skipped");
            return Ok(None);
        }

        let ctx = BuilderContext {
            store: self.store.as_ref(),
            device: &device,
            device_data: &data,
            features: &resolved.features,
        };

        let mut config = AbstractConfig {
            system: system_block(&data),
            transaction_id: transaction.id,
            transaction_descr: transaction.descr.clone(),
            ..Default::default()
        };
        let mut empty_features = Vec::new();

        for builder in all_builders() {
            let feature = builder.feature();
            if !resolved.contains(feature) {
                continue;
            }
            let mut fragment = builder.build(&ctx)?;
            fragment.normalize();
            if fragment.is_empty() {
                empty_features.push(feature.name().to_string());
                continue;
            }
            match config.features.get_mut(feature.name()) {
                Some(existing) => {
                    existing.merge(fragment);
                    existing.normalize();
                }
                None => {
                    config.features.insert(feature.name().to_string(), fragment);
                }
            }
        }

        let report = GenerationReport {
            device: device.uuid,
            device_name: device.name().to_string(),
            transaction_id: transaction.id,
            transaction_descr: transaction.descr.clone(),
            features: resolved
                .features
                .iter()
                .map(|f| f.name().to_string())
                .collect(),
            empty_features,
            warnings: resolved.warnings,
        };
        info!(
            device = report.device_name,
            features = report.features.len(),
            emitted = config.features.len(),
            "abstract config assembled"
        );
        Ok(Some(GeneratedConfig { config, report }))
    }

    /// True when the device enables the given feature.
    pub fn feature_enabled(&self, device_uuid: &Uuid, feature: Feature) -> ConfigResult<bool> {
        let device = self.store.read(EntityType::PhysicalRouter, device_uuid)?;
        Ok(FeatureResolver::new(self.store.as_ref())
            .enabled_features(&device)
            .contains(feature))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dm_entity_store::StoreConfig;
    use dm_types::{Entity, EntityData, ForwardingMode, FqName, PhysicalRole, Subnet};
    use pretty_assertions::assert_eq;

    fn transaction() -> Transaction {
        Transaction {
            id: 42,
            descr: "Virtual Network 'vn1' Create".into(),
        }
    }

    fn fixture() -> (Arc<EntityStore>, Uuid) {
        let s = Arc::new(EntityStore::new(StoreConfig::default()));
        let pr = s
            .create(Entity::new(
                Uuid::new_v4(),
                FqName::from(["default-gsc", "leaf1"]),
                EntityData::PhysicalRouter(dm_types::PhysicalRouter {
                    product_name: "qfx5110-48s".into(),
                    vendor: "juniper".into(),
                    family: "junos-qfx".into(),
                    physical_role: Some(PhysicalRole::Leaf),
                    rb_roles: vec!["crb-gateway".into()],
                    vnc_managed: true,
                    ..Default::default()
                }),
            ))
            .unwrap();
        let vn = s
            .create(Entity::new(
                Uuid::new_v4(),
                FqName::from(["default-domain", "admin", "vn1"]),
                EntityData::VirtualNetwork(dm_types::VirtualNetwork {
                    forwarding_mode: Some(ForwardingMode::L2L3),
                    subnets: vec![Subnet {
                        prefix: "10.0.0.0".parse().unwrap(),
                        prefix_len: 24,
                        gateway: Some("10.0.0.1".parse().unwrap()),
                    }],
                    ..Default::default()
                }),
            ))
            .unwrap();
        s.add_ref(&pr, EntityType::VirtualNetwork, &vn, None).unwrap();
        (s, pr)
    }

    #[test]
    fn test_generates_enabled_features_only() {
        let (s, pr) = fixture();
        let out = ConfigAssembler::new(s)
            .generate(&pr, &transaction())
            .unwrap()
            .unwrap();

        assert!(out.config.feature(Feature::L2Gateway).is_some());
        assert!(out.config.feature(Feature::L3Gateway).is_some());
        // dc-gateway is not part of the crb-gateway role.
        assert!(out.config.feature(Feature::DcGateway).is_none());
        assert_eq!(out.config.transaction_id, 42);
        assert_eq!(out.config.system.vendor_name, "juniper");
        assert!(out.report.features.contains(&"l2-gateway".to_string()));
        // Underlay had no fabric interfaces to describe.
        assert!(out
            .report
            .empty_features
            .contains(&"underlay-ip-clos".to_string()));
    }

    #[test]
    fn test_unmanaged_device_skipped() {
        let (s, pr) = fixture();
        s.update(&pr, &["vnc_managed"], |data| {
            if let EntityData::PhysicalRouter(pr) = data {
                pr.vnc_managed = false;
            }
        })
        .unwrap();
        let out = ConfigAssembler::new(s).generate(&pr, &transaction()).unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn test_regeneration_is_byte_identical() {
        let (s, pr) = fixture();
        let assembler = ConfigAssembler::new(s);
        let tx = transaction();
        let a = assembler.generate(&pr, &tx).unwrap().unwrap();
        let b = assembler.generate(&pr, &tx).unwrap().unwrap();
        assert_eq!(
            serde_json::to_string(&a.config).unwrap(),
            serde_json::to_string(&b.config).unwrap()
        );
    }
}
