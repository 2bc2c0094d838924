//! The entity store adapter.
//!
//! An in-memory, coherent, typed view of the entity graph with a
//! change channel. The config generation core only reads and
//! subscribes; the write side exists for the API-server collaborator
//! and the test harness, and is where graph invariants are validated
//! (rejected writes surface as `BadRequest` and never propagate).

use crate::bus::{ChangeBus, Subscription};
use crate::cache::EntityCache;
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::event::{ChangeEvent, ChangeOp};
use dm_types::{
    Entity, EntityData, EntityType, FqName, LogicalRouterType, Ref, RefAttr, Uuid, VirtualNetwork,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Name of the auto-created VN backing a vxlan-routing LR.
pub fn internal_vn_name(lr_uuid: &Uuid) -> String {
    format!("__contrail_lr_internal_vn_{lr_uuid}__")
}

/// Filters for [`EntityStore::list`].
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub parent: Option<Uuid>,
    pub back_ref: Option<Uuid>,
    pub uuids: Option<Vec<Uuid>>,
    pub fq_names: Option<Vec<FqName>>,
}

impl ListFilter {
    pub fn parent(uuid: Uuid) -> Self {
        Self {
            parent: Some(uuid),
            ..Default::default()
        }
    }

    pub fn back_ref(uuid: Uuid) -> Self {
        Self {
            back_ref: Some(uuid),
            ..Default::default()
        }
    }

    pub fn uuids(uuids: Vec<Uuid>) -> Self {
        Self {
            uuids: Some(uuids),
            ..Default::default()
        }
    }

    fn matches(&self, entity: &Entity) -> bool {
        if let Some(parent) = &self.parent {
            if entity.parent.map(|(_, u)| u) != Some(*parent) {
                return false;
            }
        }
        if let Some(back_ref) = &self.back_ref {
            if !entity.back_refs.iter().any(|r| r.uuid == *back_ref) {
                return false;
            }
        }
        if let Some(uuids) = &self.uuids {
            if !uuids.contains(&entity.uuid) {
                return false;
            }
        }
        if let Some(fq_names) = &self.fq_names {
            if !fq_names.contains(&entity.fq_name) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Default)]
struct Graph {
    entities: HashMap<Uuid, Entity>,
    fq_index: HashMap<(EntityType, FqName), Uuid>,
    /// fq-name reservations taken by in-flight creates. A reservation
    /// left behind by a partial create/delete is reclaimable once
    /// older than the configured stale window.
    fq_locks: HashMap<(EntityType, FqName), Instant>,
    next_vn_id: u32,
}

/// In-memory entity store with cache and change channel.
#[derive(Debug)]
pub struct EntityStore {
    graph: RwLock<Graph>,
    cache: EntityCache,
    bus: Arc<ChangeBus>,
    config: StoreConfig,
}

impl EntityStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            graph: RwLock::new(Graph {
                next_vn_id: 1,
                ..Default::default()
            }),
            cache: EntityCache::new(&config),
            bus: Arc::new(ChangeBus::new(config.max_pending_updates)),
            config,
        }
    }

    /// Subscribes to the change channel.
    pub fn subscribe(&self) -> Subscription {
        self.bus.subscribe()
    }

    /// The underlying change bus (fault injection in tests, backoff
    /// pacing in the worker).
    pub fn bus(&self) -> &Arc<ChangeBus> {
        &self.bus
    }

    // ------------------------------------------------------------------
    // Read side
    // ------------------------------------------------------------------

    /// Reads an entity snapshot, serving from the cache when allowed.
    pub fn read(&self, entity_type: EntityType, uuid: &Uuid) -> StoreResult<Entity> {
        if let Some(cached) = self.cache.get(uuid) {
            if cached.entity_type() == entity_type {
                return Ok(cached);
            }
        }
        let entity = self.read_backing(entity_type, uuid)?;
        self.cache.insert(entity.clone());
        Ok(entity)
    }

    /// Cache-bypassing read used on the delete path, so a concurrently
    /// added back-ref is observed.
    pub fn read_for_delete(&self, entity_type: EntityType, uuid: &Uuid) -> StoreResult<Entity> {
        self.read_backing(entity_type, uuid)
    }

    fn read_backing(&self, entity_type: EntityType, uuid: &Uuid) -> StoreResult<Entity> {
        let graph = self.graph.read().unwrap();
        graph
            .entities
            .get(uuid)
            .filter(|e| e.entity_type() == entity_type)
            .cloned()
            .ok_or_else(|| StoreError::not_found(entity_type, uuid))
    }

    /// Read without a type assertion; used by generic traversals.
    pub fn read_any(&self, uuid: &Uuid) -> StoreResult<Entity> {
        if let Some(cached) = self.cache.get(uuid) {
            return Ok(cached);
        }
        let graph = self.graph.read().unwrap();
        graph
            .entities
            .get(uuid)
            .cloned()
            .ok_or_else(|| StoreError::not_found(EntityType::Project, uuid))
    }

    pub fn read_by_fq_name(&self, entity_type: EntityType, fq_name: &FqName) -> StoreResult<Entity> {
        let uuid = {
            let graph = self.graph.read().unwrap();
            graph
                .fq_index
                .get(&(entity_type, fq_name.clone()))
                .copied()
                .ok_or_else(|| StoreError::not_found(entity_type, fq_name))?
        };
        self.read(entity_type, &uuid)
    }

    /// fq-name to uuid resolution.
    pub fn fq_name_to_id(&self, entity_type: EntityType, fq_name: &FqName) -> StoreResult<Uuid> {
        let graph = self.graph.read().unwrap();
        graph
            .fq_index
            .get(&(entity_type, fq_name.clone()))
            .copied()
            .ok_or_else(|| StoreError::not_found(entity_type, fq_name))
    }

    /// uuid to fq-name resolution.
    pub fn id_to_fq_name(&self, uuid: &Uuid) -> StoreResult<FqName> {
        let graph = self.graph.read().unwrap();
        graph
            .entities
            .get(uuid)
            .map(|e| e.fq_name.clone())
            .ok_or_else(|| StoreError::not_found(EntityType::Project, uuid))
    }

    /// Lists entities of one type matching the filter. The sequence is
    /// finite and reflects the graph at call time.
    pub fn list(&self, entity_type: EntityType, filter: &ListFilter) -> Vec<Entity> {
        let graph = self.graph.read().unwrap();
        let mut out: Vec<Entity> = graph
            .entities
            .values()
            .filter(|e| e.entity_type() == entity_type && filter.matches(e))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.fq_name.cmp(&b.fq_name));
        out
    }

    /// Children of `parent` having the given type.
    pub fn children(&self, entity_type: EntityType, parent: &Uuid) -> Vec<Entity> {
        self.list(entity_type, &ListFilter::parent(*parent))
    }

    // ------------------------------------------------------------------
    // Write side (API server / test harness surface)
    // ------------------------------------------------------------------

    fn check_writable(&self) -> StoreResult<()> {
        if self.bus.at_capacity() {
            return Err(StoreError::Overloaded);
        }
        Ok(())
    }

    /// Creates an entity. Any refs present on the entity are installed
    /// (with back-refs on the targets) and validated as if added one
    /// by one.
    pub fn create(&self, entity: Entity) -> StoreResult<Uuid> {
        self.check_writable()?;
        let entity_type = entity.entity_type();
        let key = (entity_type, entity.fq_name.clone());

        {
            let mut graph = self.graph.write().unwrap();
            if graph.fq_index.contains_key(&key) {
                return Err(StoreError::AlreadyExists {
                    entity_type,
                    fq_name: entity.fq_name.to_string(),
                });
            }
            if let Some(taken) = graph.fq_locks.get(&key) {
                if taken.elapsed() < Duration::from_secs(self.config.stale_lock_seconds) {
                    return Err(StoreError::AlreadyExists {
                        entity_type,
                        fq_name: entity.fq_name.to_string(),
                    });
                }
                info!(fq_name = %entity.fq_name, "reclaiming stale fq-name lock");
                graph.fq_locks.remove(&key);
            }
            graph.fq_locks.insert(key.clone(), Instant::now());
        }

        let result = self.create_locked(entity);
        self.graph.write().unwrap().fq_locks.remove(&key);
        result
    }

    fn create_locked(&self, mut entity: Entity) -> StoreResult<Uuid> {
        for r in &entity.refs {
            self.validate_ref(&entity, r)?;
        }
        self.validate_create(&entity)?;
        let refs = entity.refs.clone();

        if let EntityData::VirtualNetwork(vn) = &mut entity.data {
            if vn.vn_network_id == 0 {
                let mut graph = self.graph.write().unwrap();
                vn.vn_network_id = graph.next_vn_id;
                graph.next_vn_id += 1;
            }
        }

        let uuid = entity.uuid;
        let entity_type = entity.entity_type();
        let fq_name = entity.fq_name.clone();
        {
            let mut graph = self.graph.write().unwrap();
            graph
                .fq_index
                .insert((entity_type, fq_name.clone()), uuid);
            graph.entities.insert(uuid, entity);
        }
        debug!(entity_type = %entity_type, %uuid, fq_name = %fq_name, "store create");
        self.emit(ChangeEvent::new(ChangeOp::Create, entity_type, uuid, fq_name));

        for r in refs {
            self.install_back_ref(&uuid, entity_type, &r);
        }
        self.apply_create_side_effects(entity_type, &uuid)?;
        Ok(uuid)
    }

    /// Updates an entity's payload in place. `changed_fields` names
    /// the mutated property fields for the reaction map.
    pub fn update<F>(&self, uuid: &Uuid, changed_fields: &[&str], mutate: F) -> StoreResult<()>
    where
        F: FnOnce(&mut EntityData),
    {
        self.update_with_op(uuid, changed_fields, ChangeOp::Update, mutate)
    }

    fn update_with_op<F>(
        &self,
        uuid: &Uuid,
        changed_fields: &[&str],
        op: ChangeOp,
        mutate: F,
    ) -> StoreResult<()>
    where
        F: FnOnce(&mut EntityData),
    {
        self.check_writable()?;
        let (entity_type, fq_name, snapshot) = {
            let mut graph = self.graph.write().unwrap();
            let entity = graph
                .entities
                .get_mut(uuid)
                .ok_or_else(|| StoreError::not_found(EntityType::Project, uuid))?;
            let before = entity.data.clone();
            mutate(&mut entity.data);
            let after = entity.clone();
            Self::validate_update(&before, &after)
                .map_err(|e| {
                    // Roll the mutation back so a rejected write has no effect.
                    if let Some(en) = graph.entities.get_mut(uuid) {
                        en.data = before.clone();
                    }
                    e
                })
                .map(|_| (after.entity_type(), after.fq_name.clone(), after))?
        };
        self.cache.reconcile(&snapshot);
        debug!(entity_type = %entity_type, %uuid, op = %op, fields = ?changed_fields, "store update");
        self.emit(
            ChangeEvent::new(op, entity_type, *uuid, fq_name)
                .with_fields(changed_fields.iter().copied()),
        );
        self.apply_update_side_effects(entity_type, uuid, changed_fields)?;
        Ok(())
    }

    /// Adds a reference edge from `from` to `to`, maintaining the
    /// target's back-refs.
    pub fn add_ref(
        &self,
        from: &Uuid,
        to_type: EntityType,
        to: &Uuid,
        attr: Option<RefAttr>,
    ) -> StoreResult<()> {
        self.check_writable()?;
        let from_entity = self.read_any(from)?;
        let mut r = Ref::new(to_type, *to);
        if let Some(attr) = attr {
            r = r.with_attr(attr);
        }
        self.validate_ref(&from_entity, &r)?;

        let from_type = from_entity.entity_type();
        let fq_name = {
            let mut graph = self.graph.write().unwrap();
            if !graph.entities.contains_key(to) {
                return Err(StoreError::not_found(to_type, to));
            }
            let entity = graph
                .entities
                .get_mut(from)
                .ok_or_else(|| StoreError::not_found(from_type, from))?;
            if entity.refs.iter().any(|e| e.uuid == *to) {
                return Ok(()); // idempotent
            }
            entity.refs.push(r.clone());
            entity.fq_name.clone()
        };
        self.reconcile_cached(from);
        self.emit(
            ChangeEvent::new(ChangeOp::Update, from_type, *from, fq_name)
                .with_fields([format!("{}_refs", to_type.name().replace('-', "_"))]),
        );
        self.install_back_ref(from, from_type, &r);
        self.apply_ref_side_effects(from, from_type, to_type, to)?;
        Ok(())
    }

    /// Removes a reference edge and its back-ref.
    pub fn remove_ref(&self, from: &Uuid, to: &Uuid) -> StoreResult<()> {
        self.check_writable()?;
        let (from_type, from_fq, to_type) = {
            let mut graph = self.graph.write().unwrap();
            let entity = graph
                .entities
                .get_mut(from)
                .ok_or_else(|| StoreError::not_found(EntityType::Project, from))?;
            let idx = entity.refs.iter().position(|r| r.uuid == *to);
            let Some(idx) = idx else { return Ok(()) };
            let removed = entity.refs.remove(idx);
            let info = (entity.entity_type(), entity.fq_name.clone(), removed.entity_type);
            if let Some(target) = graph.entities.get_mut(to) {
                target.back_refs.retain(|r| r.uuid != *from);
            }
            info
        };
        self.reconcile_cached(from);
        self.reconcile_cached(to);
        self.emit(
            ChangeEvent::new(ChangeOp::Update, from_type, *from, from_fq)
                .with_fields([format!("{}_refs", to_type.name().replace('-', "_"))]),
        );
        if let Ok(target) = self.read_any(to) {
            self.emit(
                ChangeEvent::new(ChangeOp::UpdateImplicit, to_type, *to, target.fq_name)
                    .with_fields(["back_refs".to_string()]),
            );
        }
        Ok(())
    }

    /// Deletes an entity. Fails with `RefsExist` while back-refs
    /// remain; auto-created children (native RI, internal VN) are
    /// cascaded.
    pub fn delete(&self, uuid: &Uuid) -> StoreResult<()> {
        self.check_writable()?;
        // Bypass the cache so concurrently added back-refs are seen.
        let snapshot = {
            let graph = self.graph.read().unwrap();
            graph
                .entities
                .get(uuid)
                .cloned()
                .ok_or_else(|| StoreError::not_found(EntityType::Project, uuid))?
        };
        let entity_type = snapshot.entity_type();

        self.apply_pre_delete_side_effects(entity_type, &snapshot)?;

        // Re-read: cascades may have removed back-refs.
        let snapshot = self.read_for_delete(entity_type, uuid)?;
        if !snapshot.back_refs.is_empty() {
            return Err(StoreError::RefsExist {
                entity_type,
                uuid: *uuid,
                count: snapshot.back_refs.len(),
            });
        }
        let children: Vec<Entity> = {
            let graph = self.graph.read().unwrap();
            graph
                .entities
                .values()
                .filter(|e| e.parent.map(|(_, u)| u) == Some(*uuid))
                .cloned()
                .collect()
        };
        for child in &children {
            self.delete(&child.uuid)?;
        }

        {
            let mut graph = self.graph.write().unwrap();
            graph.entities.remove(uuid);
            graph
                .fq_index
                .remove(&(entity_type, snapshot.fq_name.clone()));
            for r in &snapshot.refs {
                if let Some(target) = graph.entities.get_mut(&r.uuid) {
                    target.back_refs.retain(|b| b.uuid != *uuid);
                }
            }
        }
        self.cache.invalidate(uuid);
        for r in &snapshot.refs {
            self.reconcile_cached(&r.uuid);
            if let Ok(target) = self.read_any(&r.uuid) {
                self.emit(
                    ChangeEvent::new(
                        ChangeOp::UpdateImplicit,
                        target.entity_type(),
                        r.uuid,
                        target.fq_name,
                    )
                    .with_fields(["back_refs".to_string()]),
                );
            }
        }
        // The delete trace carries the name from the snapshot alone.
        info!(entity_type = %entity_type, %uuid, name = snapshot.name(), "store delete");
        self.emit(
            ChangeEvent::new(
                ChangeOp::Delete,
                entity_type,
                *uuid,
                snapshot.fq_name.clone(),
            )
            .with_pre_delete(snapshot),
        );
        Ok(())
    }

    /// Test hook: leaves a dangling fq-name reservation behind, as a
    /// crashed half-finished create would.
    pub fn leak_fq_name_lock(&self, entity_type: EntityType, fq_name: FqName) {
        let mut graph = self.graph.write().unwrap();
        graph
            .fq_locks
            .insert((entity_type, fq_name), Instant::now());
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn emit(&self, event: ChangeEvent) {
        match self.bus.publish(event) {
            Ok(()) => {}
            Err(StoreError::Transport { message }) => {
                // Parked for redelivery by the bus; the write itself
                // has committed.
                warn!(%message, "change publish deferred");
            }
            Err(e) => warn!(error = %e, "change publish failed"),
        }
    }

    fn reconcile_cached(&self, uuid: &Uuid) {
        let graph = self.graph.read().unwrap();
        if let Some(entity) = graph.entities.get(uuid) {
            self.cache.reconcile(entity);
        }
    }

    fn install_back_ref(&self, from: &Uuid, from_type: EntityType, r: &Ref) {
        let fq = {
            let mut graph = self.graph.write().unwrap();
            let Some(target) = graph.entities.get_mut(&r.uuid) else {
                return;
            };
            if target.back_refs.iter().any(|b| b.uuid == *from) {
                return;
            }
            let mut back = Ref::new(from_type, *from);
            back.attr = r.attr.clone();
            target.back_refs.push(back);
            target.fq_name.clone()
        };
        self.reconcile_cached(&r.uuid);
        self.emit(
            ChangeEvent::new(ChangeOp::UpdateImplicit, r.entity_type, r.uuid, fq)
                .with_fields(["back_refs".to_string()]),
        );
    }

    // ---- validation ---------------------------------------------------

    fn validate_create(&self, entity: &Entity) -> StoreResult<()> {
        match &entity.data {
            EntityData::FloatingIp(fip) => {
                if let (Some(addr), Some(pool)) = (fip.address, entity.parent.map(|(_, u)| u)) {
                    if let Ok(pool) = self.read_any(&pool) {
                        if let Some((_, vn_uuid)) = pool.parent {
                            let taken = self
                                .list(EntityType::InstanceIp, &ListFilter::default())
                                .into_iter()
                                .filter(|iip| iip.ref_to(EntityType::VirtualNetwork) == Some(vn_uuid))
                                .any(|iip| {
                                    iip.data.as_instance_ip().and_then(|d| d.address) == Some(addr)
                                });
                            if taken {
                                return Err(StoreError::bad_request(format!(
                                    "address {addr} already allocated as instance-ip in this network"
                                )));
                            }
                        }
                    }
                }
            }
            EntityData::InstanceIp(iip) => {
                if let Some(addr) = iip.address {
                    // The VN ref is still in entity.refs at this point.
                    let vn = entity
                        .refs
                        .iter()
                        .find(|r| r.entity_type == EntityType::VirtualNetwork)
                        .map(|r| r.uuid);
                    if let Some(vn_uuid) = vn {
                        let pools = self.children(EntityType::FloatingIpPool, &vn_uuid);
                        for pool in pools {
                            let fips = self.children(EntityType::FloatingIp, &pool.uuid);
                            if fips.iter().any(|f| {
                                f.data.as_floating_ip().and_then(|d| d.address) == Some(addr)
                            }) {
                                return Err(StoreError::bad_request(format!(
                                    "address {addr} already allocated as floating-ip in this network"
                                )));
                            }
                        }
                    }
                }
            }
            EntityData::BgpRouter(bgp) => {
                if let Some(sc_uuid) = entity
                    .refs
                    .iter()
                    .find(|r| r.entity_type == EntityType::SubCluster)
                    .map(|r| r.uuid)
                {
                    let sc = self.read(EntityType::SubCluster, &sc_uuid)?;
                    let sc_asn = sc.data.as_sub_cluster().map(|s| s.asn).unwrap_or(0);
                    if bgp.autonomous_system != sc_asn {
                        return Err(StoreError::bad_request(format!(
                            "bgp-router ASN {} does not match sub-cluster ASN {}",
                            bgp.autonomous_system, sc_asn
                        )));
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn validate_update(before: &EntityData, after: &Entity) -> StoreResult<()> {
        match (&before, &after.data) {
            (EntityData::SubCluster(old), EntityData::SubCluster(new)) => {
                if old.asn != 0 && old.asn != new.asn {
                    return Err(StoreError::bad_request("sub-cluster ASN is immutable"));
                }
            }
            (EntityData::GlobalSystemConfig(old), EntityData::GlobalSystemConfig(new)) => {
                let shrunk = match (
                    old.bgpaas_port_start,
                    old.bgpaas_port_end,
                    new.bgpaas_port_start,
                    new.bgpaas_port_end,
                ) {
                    (Some(os), Some(oe), Some(ns), Some(ne)) => ns > os || ne < oe,
                    _ => false,
                };
                if shrunk && !after.back_refs.is_empty() {
                    return Err(StoreError::bad_request(
                        "cannot shrink bgpaas port range while bgp-as-a-service objects exist",
                    ));
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn validate_ref(&self, from: &Entity, r: &Ref) -> StoreResult<()> {
        match (from.entity_type(), r.entity_type) {
            (EntityType::VirtualNetwork, EntityType::Bgpvpn) => {
                let vpn = self.read(EntityType::Bgpvpn, &r.uuid)?;
                let vpn_type = vpn.data.as_bgpvpn().map(|b| b.bgpvpn_type);
                let mode = from
                    .data
                    .as_virtual_network()
                    .and_then(|vn| vn.forwarding_mode);
                let ok = match vpn_type {
                    Some(dm_types::BgpvpnType::L2) => mode.map_or(true, |m| m.includes_l2()),
                    Some(dm_types::BgpvpnType::L3) => mode.map_or(true, |m| m.includes_l3()),
                    None => true,
                };
                if !ok {
                    return Err(StoreError::bad_request(
                        "bgpvpn type incompatible with network forwarding mode",
                    ));
                }
                // Reject when an LR serving this VN already holds it.
                for lr in vpn.back_refs_from(EntityType::LogicalRouter) {
                    if self.lr_serves_vn(&lr.uuid, &from.uuid) {
                        return Err(StoreError::bad_request(
                            "bgpvpn already attached to a logical-router serving this network",
                        ));
                    }
                }
            }
            (EntityType::LogicalRouter, EntityType::Bgpvpn) => {
                let vpn = self.read(EntityType::Bgpvpn, &r.uuid)?;
                if vpn.data.as_bgpvpn().map(|b| b.bgpvpn_type) == Some(dm_types::BgpvpnType::L2) {
                    return Err(StoreError::bad_request(
                        "logical-router may only attach l3 bgpvpns",
                    ));
                }
                for vn in vpn.back_refs_from(EntityType::VirtualNetwork) {
                    if self.lr_serves_vn(&from.uuid, &vn.uuid) {
                        return Err(StoreError::bad_request(
                            "bgpvpn already attached to a network served by this logical-router",
                        ));
                    }
                }
            }
            (EntityType::VirtualMachineInterface, EntityType::VirtualMachineInterface) => {
                let parent = self.read(EntityType::VirtualMachineInterface, &r.uuid)?;
                if parent.ref_to(EntityType::VirtualMachineInterface).is_some() {
                    return Err(StoreError::bad_request(
                        "sub-interface parent must not itself be a sub-interface",
                    ));
                }
                let vlan = from
                    .data
                    .as_virtual_machine_interface()
                    .and_then(|v| v.sub_interface_vlan_tag);
                for sibling in parent.back_refs_from(EntityType::VirtualMachineInterface) {
                    if sibling.uuid == from.uuid {
                        continue;
                    }
                    if let Ok(sib) = self.read(EntityType::VirtualMachineInterface, &sibling.uuid) {
                        let sib_vlan = sib
                            .data
                            .as_virtual_machine_interface()
                            .and_then(|v| v.sub_interface_vlan_tag);
                        if vlan.is_some() && vlan == sib_vlan {
                            return Err(StoreError::bad_request(format!(
                                "sub-interface vlan tag {} already used under parent interface",
                                vlan.unwrap_or(0)
                            )));
                        }
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// True when `vn` is one of the tenant networks attached to `lr`
    /// through a VMI.
    fn lr_serves_vn(&self, lr: &Uuid, vn: &Uuid) -> bool {
        let Ok(lr_entity) = self.read(EntityType::LogicalRouter, lr) else {
            return false;
        };
        let serves = lr_entity
            .refs_to(EntityType::VirtualMachineInterface)
            .filter_map(|r| self.read(EntityType::VirtualMachineInterface, &r.uuid).ok())
            .any(|vmi| vmi.ref_to(EntityType::VirtualNetwork) == Some(*vn));
        serves
    }

    // ---- implicit lifecycle -------------------------------------------

    fn apply_create_side_effects(&self, entity_type: EntityType, uuid: &Uuid) -> StoreResult<()> {
        match entity_type {
            EntityType::VirtualNetwork => self.ensure_native_ri(uuid),
            EntityType::LogicalRouter => self.sync_internal_vn(uuid),
            _ => Ok(()),
        }
    }

    fn apply_update_side_effects(
        &self,
        entity_type: EntityType,
        uuid: &Uuid,
        changed_fields: &[&str],
    ) -> StoreResult<()> {
        if entity_type == EntityType::LogicalRouter
            && changed_fields.contains(&"logical_router_type")
        {
            self.sync_internal_vn(uuid)?;
        }
        Ok(())
    }

    fn apply_ref_side_effects(
        &self,
        from: &Uuid,
        from_type: EntityType,
        to_type: EntityType,
        to: &Uuid,
    ) -> StoreResult<()> {
        // A VMI landing on a VN auto-links to the VN's native RI.
        if from_type == EntityType::VirtualMachineInterface && to_type == EntityType::VirtualNetwork
        {
            let vn = self.read(EntityType::VirtualNetwork, to)?;
            let native_fq = vn.fq_name.child(vn.name());
            if let Ok(ri) = self.read_by_fq_name(EntityType::RoutingInstance, &native_fq) {
                let already = self
                    .read_any(from)?
                    .ref_to(EntityType::RoutingInstance)
                    .is_some();
                if !already {
                    let fq = {
                        let mut graph = self.graph.write().unwrap();
                        let vmi = graph
                            .entities
                            .get_mut(from)
                            .ok_or_else(|| StoreError::not_found(from_type, from))?;
                        vmi.refs.push(Ref::new(EntityType::RoutingInstance, ri.uuid));
                        vmi.fq_name.clone()
                    };
                    self.reconcile_cached(from);
                    self.emit(
                        ChangeEvent::new(ChangeOp::UpdateImplicit, from_type, *from, fq)
                            .with_fields(["routing_instance_refs".to_string()]),
                    );
                    self.install_back_ref(
                        from,
                        from_type,
                        &Ref::new(EntityType::RoutingInstance, ri.uuid),
                    );
                }
            }
        }
        Ok(())
    }

    fn apply_pre_delete_side_effects(
        &self,
        entity_type: EntityType,
        snapshot: &Entity,
    ) -> StoreResult<()> {
        if entity_type == EntityType::LogicalRouter {
            // The internal VN's lifetime equals the LR's.
            let name = internal_vn_name(&snapshot.uuid);
            let fq = snapshot
                .fq_name
                .parent()
                .unwrap_or_else(|| FqName::new(Vec::<String>::new()))
                .child(name);
            if let Ok(vn) = self.read_by_fq_name(EntityType::VirtualNetwork, &fq) {
                self.remove_ref(&snapshot.uuid, &vn.uuid)?;
                self.delete(&vn.uuid)?;
            }
        }
        Ok(())
    }

    /// Every VN owns a routing-instance of the same name, created and
    /// destroyed with it.
    fn ensure_native_ri(&self, vn_uuid: &Uuid) -> StoreResult<()> {
        let vn = self.read_backing(EntityType::VirtualNetwork, vn_uuid)?;
        let fq = vn.fq_name.child(vn.name());
        if self.read_by_fq_name(EntityType::RoutingInstance, &fq).is_ok() {
            return Ok(());
        }
        let mut ri = Entity::new(
            Uuid::new_v4(),
            fq,
            EntityData::RoutingInstance(dm_types::RoutingInstance { is_default: true }),
        );
        ri.parent = Some((EntityType::VirtualNetwork, *vn_uuid));
        self.create(ri)?;
        Ok(())
    }

    /// Keeps the auto-created internal VN in step with the LR's type.
    fn sync_internal_vn(&self, lr_uuid: &Uuid) -> StoreResult<()> {
        let lr = self.read_backing(EntityType::LogicalRouter, lr_uuid)?;
        let lr_data = lr
            .data
            .as_logical_router()
            .ok_or_else(|| StoreError::bad_request("not a logical-router"))?;
        let name = internal_vn_name(lr_uuid);
        let fq = lr
            .fq_name
            .parent()
            .unwrap_or_else(|| FqName::new(Vec::<String>::new()))
            .child(name);
        let existing = self.read_by_fq_name(EntityType::VirtualNetwork, &fq).ok();

        match (lr_data.logical_router_type, existing) {
            (Some(LogicalRouterType::VxlanRouting), None) => {
                let vn = Entity::new(
                    Uuid::new_v4(),
                    fq,
                    EntityData::VirtualNetwork(VirtualNetwork {
                        forwarding_mode: Some(dm_types::ForwardingMode::L3),
                        is_internal: true,
                        vxlan_id: lr_data.vxlan_network_identifier,
                        ..Default::default()
                    }),
                );
                let vn_uuid = self.create(vn)?;
                self.add_ref(lr_uuid, EntityType::VirtualNetwork, &vn_uuid, None)?;
            }
            (Some(LogicalRouterType::VxlanRouting), Some(_)) => {}
            (_, Some(vn)) => {
                self.remove_ref(lr_uuid, &vn.uuid)?;
                self.delete(&vn.uuid)?;
            }
            (_, None) => {}
        }
        Ok(())
    }
}
