//! overlay-bgp: device-level BGP peer groups.
//!
//! Peers of the device's BgpRouter are grouped into `__contrail__`
//! (internal, peer ASN equals local ASN) and `__contrail_external__`.

use super::{origin_comment, BuilderContext, FeatureBuilder};
use crate::error::ConfigResult;
use crate::feature::Feature;
use crate::model::{BgpGroup, BgpPeer, FeatureFragment};
use crate::names::{quote_auth_key, BGP_GROUP_EXTERNAL, BGP_GROUP_INTERNAL};
use dm_types::{BgpRouter, Entity, EntityType};

pub struct OverlayBgpBuilder;

impl OverlayBgpBuilder {
    fn local_asn(bgp: &BgpRouter) -> u32 {
        bgp.local_asn.unwrap_or(bgp.autonomous_system)
    }

    fn peer_entry(peer: &Entity, data: &BgpRouter) -> Option<BgpPeer> {
        Some(BgpPeer {
            ip_address: data.address?,
            comment: Some(origin_comment("BGP Router", peer)),
            autonomous_system: Some(Self::local_asn(data)),
            authentication_key: data
                .authentication_key
                .as_deref()
                .map(quote_auth_key),
            hold_time: data.hold_time,
        })
    }
}

impl FeatureBuilder for OverlayBgpBuilder {
    fn feature(&self) -> Feature {
        Feature::OverlayBgp
    }

    fn build(&self, ctx: &BuilderContext<'_>) -> ConfigResult<FeatureFragment> {
        let mut frag = FeatureFragment::default();
        let Some(local_uuid) = ctx.device.ref_to(EntityType::BgpRouter) else {
            return Ok(frag);
        };
        let Ok(local) = ctx.store.read(EntityType::BgpRouter, &local_uuid) else {
            return Ok(frag);
        };
        let Some(local_data) = local.data.as_bgp_router().cloned() else {
            return Ok(frag);
        };
        let local_asn = Self::local_asn(&local_data);

        let mut internal = BgpGroup {
            name: BGP_GROUP_INTERNAL.to_string(),
            comment: Some(origin_comment("BGP Router", &local)),
            bgp_type: "internal".to_string(),
            ip_address: local_data.address,
            autonomous_system: Some(local_asn),
            hold_time: local_data.hold_time,
            families: local_data.address_families.clone(),
            peers: Vec::new(),
        };
        let mut external = BgpGroup {
            name: BGP_GROUP_EXTERNAL.to_string(),
            bgp_type: "external".to_string(),
            ..internal.clone()
        };

        // Peering edges run in both directions.
        let peer_uuids: Vec<_> = local
            .refs_to(EntityType::BgpRouter)
            .chain(local.back_refs_from(EntityType::BgpRouter))
            .map(|r| r.uuid)
            .collect();
        for uuid in peer_uuids {
            let Ok(peer) = ctx.store.read(EntityType::BgpRouter, &uuid) else {
                continue;
            };
            let Some(peer_data) = peer.data.as_bgp_router() else {
                continue;
            };
            let Some(entry) = Self::peer_entry(&peer, peer_data) else {
                continue;
            };
            if Self::local_asn(peer_data) == local_asn {
                internal.peers.push(entry);
            } else {
                external.peers.push(entry);
            }
        }

        if !internal.peers.is_empty() {
            frag.bgp.push(internal);
        }
        if !external.peers.is_empty() {
            frag.bgp.push(external);
        }
        Ok(frag)
    }
}
