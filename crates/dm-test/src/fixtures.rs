//! Topology fixtures for device-manager tests
//!
//! Builds common fabric layouts against a live [`EntityStore`] so
//! tracker and config tests can share one vocabulary instead of
//! repeating entity plumbing.

use dm_entity_store::{EntityStore, StoreConfig};
use dm_types::{
    Entity, EntityData, EntityType, ForwardingMode, FqName, InterfaceKind, PhysicalRole,
    RefAttr, Subnet, Uuid, VirtualNetwork, VnCategory,
};
use std::sync::Arc;

/// A test topology wrapping a shared store.
pub struct Topology {
    pub store: Arc<EntityStore>,
}

impl Default for Topology {
    fn default() -> Self {
        Self::new()
    }
}

impl Topology {
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            store: Arc::new(EntityStore::new(config)),
        }
    }

    /// Creates the global system config carrying the fabric ASN.
    pub fn global_config(&self, asn: u32) -> Uuid {
        self.store
            .create(Entity::new(
                Uuid::new_v4(),
                FqName::from(["default-global-system-config"]),
                EntityData::GlobalSystemConfig(dm_types::GlobalSystemConfig {
                    autonomous_system: Some(asn),
                    ..Default::default()
                }),
            ))
            .expect("create global-system-config")
    }

    /// Starts a device definition.
    pub fn device(&self, name: &str) -> DeviceBuilder<'_> {
        DeviceBuilder {
            topo: self,
            name: name.to_string(),
            role: PhysicalRole::Leaf,
            rb_roles: Vec::new(),
            product: "qfx5110-48s".to_string(),
            vendor: "juniper".to_string(),
            bgp: None,
        }
    }

    /// Adds a physical interface to a device.
    pub fn interface(&self, device: &Uuid, name: &str, kind: InterfaceKind) -> Uuid {
        let parent = self
            .store
            .read(EntityType::PhysicalRouter, device)
            .expect("device exists");
        let mut pi = Entity::new(
            Uuid::new_v4(),
            parent.fq_name.child(name),
            EntityData::PhysicalInterface(dm_types::PhysicalInterface {
                interface_kind: Some(kind),
                ..Default::default()
            }),
        );
        pi.parent = Some((EntityType::PhysicalRouter, *device));
        self.store.create(pi).expect("create physical-interface")
    }

    /// Starts a virtual-network definition.
    pub fn vn(&self, name: &str) -> VnBuilder<'_> {
        VnBuilder {
            topo: self,
            name: name.to_string(),
            forwarding_mode: ForwardingMode::L2L3,
            subnets: Vec::new(),
            vxlan_id: None,
            router_external: false,
            category: None,
        }
    }

    /// Extends a VN to a device directly.
    pub fn extend_vn(&self, device: &Uuid, vn: &Uuid) {
        self.store
            .add_ref(device, EntityType::VirtualNetwork, vn, None)
            .expect("extend vn to device");
    }

    /// Attaches a VN to a device's interface through a VPG and VMI,
    /// returning `(vpg, vmi)`.
    pub fn vpg_attach(&self, name: &str, pi: &Uuid, vn: &Uuid) -> (Uuid, Uuid) {
        let vpg = self
            .store
            .create(Entity::new(
                Uuid::new_v4(),
                FqName::from(["default-gsc", "fabric1"]).child(name),
                EntityData::VirtualPortGroup(Default::default()),
            ))
            .expect("create vpg");
        self.store
            .add_ref(&vpg, EntityType::PhysicalInterface, pi, None)
            .expect("vpg member interface");
        let vmi = self
            .store
            .create(Entity::new(
                Uuid::new_v4(),
                FqName::from(["default-domain", "admin"]).child(format!("{name}-vmi")),
                EntityData::VirtualMachineInterface(Default::default()),
            ))
            .expect("create vmi");
        self.store
            .add_ref(&vmi, EntityType::VirtualNetwork, vn, None)
            .expect("vmi network");
        self.store
            .add_ref(&vpg, EntityType::VirtualMachineInterface, &vmi, None)
            .expect("vpg workload");
        (vpg, vmi)
    }

    /// Creates a vxlan-routing logical router spanning the given
    /// devices and tenant VNs.
    pub fn logical_router(&self, name: &str, devices: &[Uuid], vns: &[Uuid]) -> Uuid {
        self.logical_router_with(name, devices, vns, false)
    }

    /// Same as [`Self::logical_router`] with the external-gateway flag.
    pub fn logical_router_with(
        &self,
        name: &str,
        devices: &[Uuid],
        vns: &[Uuid],
        gateway_external: bool,
    ) -> Uuid {
        let lr = self
            .store
            .create(Entity::new(
                Uuid::new_v4(),
                FqName::from(["default-domain", "admin"]).child(name),
                EntityData::LogicalRouter(dm_types::LogicalRouter {
                    logical_router_type: Some(dm_types::LogicalRouterType::VxlanRouting),
                    gateway_external,
                    ..Default::default()
                }),
            ))
            .expect("create logical-router");
        for device in devices {
            self.store
                .add_ref(&lr, EntityType::PhysicalRouter, device, None)
                .expect("lr member device");
        }
        for vn in vns {
            let vmi = self
                .store
                .create(Entity::new(
                    Uuid::new_v4(),
                    FqName::from(["default-domain", "admin"])
                        .child(format!("{name}-vmi-{vn}")),
                    EntityData::VirtualMachineInterface(Default::default()),
                ))
                .expect("create lr vmi");
            self.store
                .add_ref(&vmi, EntityType::VirtualNetwork, vn, None)
                .expect("vmi network");
            self.store
                .add_ref(&lr, EntityType::VirtualMachineInterface, &vmi, None)
                .expect("lr attachment");
        }
        lr
    }

    /// Adds a ref with an attribute, for side- or direction-tagged
    /// edges.
    pub fn attr_ref(&self, from: &Uuid, to_type: EntityType, to: &Uuid, attr: RefAttr) {
        self.store
            .add_ref(from, to_type, to, Some(attr))
            .expect("attributed ref");
    }
}

/// Builder for a physical router plus its optional BGP router.
pub struct DeviceBuilder<'a> {
    topo: &'a Topology,
    name: String,
    role: PhysicalRole,
    rb_roles: Vec<String>,
    product: String,
    vendor: String,
    bgp: Option<(u32, std::net::IpAddr)>,
}

impl DeviceBuilder<'_> {
    pub fn role(mut self, role: PhysicalRole) -> Self {
        self.role = role;
        self
    }

    pub fn rb_roles(mut self, roles: &[&str]) -> Self {
        self.rb_roles = roles.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn product(mut self, product: &str, vendor: &str) -> Self {
        self.product = product.to_string();
        self.vendor = vendor.to_string();
        self
    }

    /// Gives the device a BGP router with the given ASN and address.
    pub fn bgp(mut self, asn: u32, address: &str) -> Self {
        self.bgp = Some((asn, address.parse().expect("valid address")));
        self
    }

    pub fn build(self) -> Uuid {
        let store = &self.topo.store;
        let pr = store
            .create(Entity::new(
                Uuid::new_v4(),
                FqName::from(["default-gsc"]).child(&self.name),
                EntityData::PhysicalRouter(dm_types::PhysicalRouter {
                    product_name: self.product,
                    vendor: self.vendor,
                    family: "junos-qfx".to_string(),
                    physical_role: Some(self.role),
                    rb_roles: self.rb_roles,
                    vnc_managed: true,
                    ..Default::default()
                }),
            ))
            .expect("create physical-router");
        if let Some((asn, address)) = self.bgp {
            let bgp = store
                .create(Entity::new(
                    Uuid::new_v4(),
                    FqName::from([
                        "default-domain",
                        "default-project",
                        "ip-fabric",
                        "__default__",
                    ])
                    .child(&self.name),
                    EntityData::BgpRouter(dm_types::BgpRouter {
                        autonomous_system: asn,
                        address: Some(address),
                        identifier: Some(address),
                        address_families: vec!["inet-vpn".into(), "evpn".into()],
                        ..Default::default()
                    }),
                ))
                .expect("create bgp-router");
            store
                .add_ref(&pr, EntityType::BgpRouter, &bgp, None)
                .expect("device bgp ref");
        }
        pr
    }
}

/// Builder for a virtual network.
pub struct VnBuilder<'a> {
    topo: &'a Topology,
    name: String,
    forwarding_mode: ForwardingMode,
    subnets: Vec<Subnet>,
    vxlan_id: Option<u32>,
    router_external: bool,
    category: Option<VnCategory>,
}

impl VnBuilder<'_> {
    pub fn forwarding_mode(mut self, mode: ForwardingMode) -> Self {
        self.forwarding_mode = mode;
        self
    }

    pub fn subnet(mut self, cidr: &str, prefix_len: u8, gateway: &str) -> Self {
        self.subnets.push(Subnet {
            prefix: cidr.parse().expect("valid prefix"),
            prefix_len,
            gateway: Some(gateway.parse().expect("valid gateway")),
        });
        self
    }

    pub fn vxlan(mut self, vxlan_id: u32) -> Self {
        self.vxlan_id = Some(vxlan_id);
        self
    }

    pub fn external(mut self) -> Self {
        self.router_external = true;
        self
    }

    pub fn category(mut self, category: VnCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn build(self) -> Uuid {
        self.topo
            .store
            .create(Entity::new(
                Uuid::new_v4(),
                FqName::from(["default-domain", "admin"]).child(&self.name),
                EntityData::VirtualNetwork(VirtualNetwork {
                    category: self.category,
                    vxlan_id: self.vxlan_id,
                    forwarding_mode: Some(self.forwarding_mode),
                    router_external: self.router_external,
                    subnets: self.subnets,
                    ..Default::default()
                }),
            ))
            .expect("create virtual-network")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_builder_creates_bgp_ref() {
        let topo = Topology::new();
        let pr = topo
            .device("leaf1")
            .role(PhysicalRole::Leaf)
            .rb_roles(&["crb-access"])
            .bgp(64512, "10.0.0.10")
            .build();
        let device = topo.store.read(EntityType::PhysicalRouter, &pr).unwrap();
        assert!(device.ref_to(EntityType::BgpRouter).is_some());
        assert!(device
            .data
            .as_physical_router()
            .unwrap()
            .vnc_managed);
    }

    #[test]
    fn test_logical_router_attaches_vns() {
        let topo = Topology::new();
        let pr = topo.device("leaf1").build();
        let vn = topo.vn("vn1").subnet("10.0.0.0", 24, "10.0.0.1").build();
        let lr = topo.logical_router("lr1", &[pr], &[vn]);

        let lr = topo.store.read(EntityType::LogicalRouter, &lr).unwrap();
        assert_eq!(lr.refs_to(EntityType::VirtualMachineInterface).count(), 1);
        // The store auto-creates the internal VN for vxlan-routing LRs.
        assert!(lr.refs_to(EntityType::VirtualNetwork).next().is_some());
    }
}
