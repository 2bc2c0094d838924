//! End-to-end generation scenarios: topology in, abstract config out.

use dm_config::{ConfigAssembler, Feature};
use dm_dependency::Transaction;
use dm_test::Topology;
use dm_types::{
    Entity, EntityData, EntityType, InterfaceKind, PhysicalRole, RefAttr, Uuid,
};
use pretty_assertions::assert_eq;

fn tx() -> Transaction {
    Transaction {
        id: 1,
        descr: "Virtual Network 'vn1' Create".into(),
    }
}

fn generate(topo: &Topology, device: &Uuid) -> dm_config::GeneratedConfig {
    ConfigAssembler::new(topo.store.clone())
        .generate(device, &tx())
        .expect("generation succeeds")
        .expect("device in scope")
}

fn vn_network_id(topo: &Topology, vn: &Uuid) -> u32 {
    topo.store
        .read(EntityType::VirtualNetwork, vn)
        .unwrap()
        .data
        .as_virtual_network()
        .unwrap()
        .vn_network_id
}

/// An ERB leaf serving a tenant VN through a VPG gets L2 and L3
/// instances with a route target derived from the device ASN.
#[test]
fn test_erb_leaf_tenant_vn() {
    dm_test::init_tracing();
    let topo = Topology::new();
    topo.global_config(64512);
    let leaf = topo
        .device("leaf1")
        .role(PhysicalRole::Leaf)
        .rb_roles(&["erb-ucast-gateway"])
        .bgp(64512, "10.0.0.11")
        .build();
    let pi = topo.interface(&leaf, "xe-0/0/1", InterfaceKind::Access);
    let vn = topo.vn("vn1").subnet("10.10.0.0", 24, "10.10.0.1").build();
    topo.vpg_attach("vpg1", &pi, &vn);

    let out = generate(&topo, &leaf);
    let id = vn_network_id(&topo, &vn);

    let l2 = out.config.feature(Feature::L2Gateway).expect("l2 fragment");
    assert!(l2
        .routing_instances
        .iter()
        .any(|ri| ri.name == format!("_contrail_vn1-l2-{id}")));
    assert!(l2.vlans.iter().any(|v| v.name == format!("bd-{id}")));

    let l3 = out.config.feature(Feature::L3Gateway).expect("l3 fragment");
    let ri = l3
        .routing_instances
        .iter()
        .find(|ri| ri.name == format!("_contrail_vn1-l3-{id}"))
        .expect("l3 instance");
    assert_eq!(ri.import_targets, vec![format!("target:64512:{id}")]);
    assert_eq!(ri.export_targets, ri.import_targets);

    let irb = l3
        .physical_interfaces
        .iter()
        .find(|p| p.name == "irb")
        .expect("irb entry");
    assert_eq!(irb.logical_interfaces[0].ip_addresses, vec!["10.10.0.1/24"]);
}

/// An externally-gatewayed LR exports all its tenant VNs on the
/// dc-gateway spine, plus the internal-VN instance.
#[test]
fn test_public_lr_on_dc_gateway_spine() {
    let topo = Topology::new();
    topo.global_config(64512);
    let spine = topo
        .device("spine1")
        .role(PhysicalRole::Spine)
        .rb_roles(&["dc-gateway"])
        .bgp(64512, "10.0.0.1")
        .build();
    let vn_a = topo.vn("vn-a").subnet("10.1.0.0", 24, "10.1.0.1").build();
    let vn_b = topo.vn("vn-b").subnet("10.2.0.0", 24, "10.2.0.1").build();
    topo.logical_router_with("lr1", &[spine], &[vn_a, vn_b], true);

    let out = generate(&topo, &spine);
    let frag = out
        .config
        .feature(Feature::DcGateway)
        .expect("dc-gateway fragment");

    let public_l3: Vec<_> = frag
        .routing_instances
        .iter()
        .filter(|ri| ri.is_public_network && ri.virtual_network_mode.as_deref() == Some("l3"))
        .collect();
    // Two tenant VNs plus the internal-VN instance.
    assert_eq!(public_l3.len(), 3);
    let internal = public_l3
        .iter()
        .find(|ri| ri.virtual_network_is_internal)
        .expect("internal instance");
    assert_eq!(internal.routing_interfaces.len(), 2);
    // Each tenant L3 RI carries the union of the LR's prefixes.
    let tenant = public_l3.iter().find(|ri| ri.name.contains("vn-a")).unwrap();
    assert_eq!(tenant.prefixes.len(), 2);
}

/// Floating IPs behind a public VN produce a NAT instance with service
/// legs and redirect filters.
#[test]
fn test_fip_snat_path() {
    let topo = Topology::new();
    topo.global_config(64512);
    let spine = topo
        .device("mx1")
        .role(PhysicalRole::Spine)
        .rb_roles(&["dc-gateway"])
        .bgp(64512, "10.0.0.1")
        .build();
    topo.interface(&spine, "si-1/2/0", InterfaceKind::Service);
    let public = topo
        .vn("vn_public_60")
        .subnet("60.0.0.0", 24, "60.0.0.1")
        .external()
        .build();
    topo.extend_vn(&spine, &public);
    let private = topo
        .vn("vn_private_66")
        .subnet("66.0.0.0", 24, "66.0.0.1")
        .build();
    let s = &topo.store;
    let vmi = s
        .create(Entity::new(
            Uuid::new_v4(),
            dm_types::FqName::from(["default-domain", "admin", "vm1-vmi"]),
            EntityData::VirtualMachineInterface(Default::default()),
        ))
        .unwrap();
    s.add_ref(&vmi, EntityType::VirtualNetwork, &private, None).unwrap();
    let mut pool = Entity::new(
        Uuid::new_v4(),
        dm_types::FqName::from(["default-domain", "admin", "vn_public_60", "pool"]),
        EntityData::FloatingIpPool(Default::default()),
    );
    pool.parent = Some((EntityType::VirtualNetwork, public));
    let pool = s.create(pool).unwrap();
    let mut fip = Entity::new(
        Uuid::new_v4(),
        dm_types::FqName::from(["default-domain", "admin", "vn_public_60", "pool", "fip1"]),
        EntityData::FloatingIp(dm_types::FloatingIp {
            address: Some("60.0.0.4".parse().unwrap()),
            fixed_ip: Some("66.0.0.3".parse().unwrap()),
        }),
    );
    fip.parent = Some((EntityType::FloatingIpPool, pool));
    let fip = s.create(fip).unwrap();
    s.add_ref(&fip, EntityType::VirtualMachineInterface, &vmi, None)
        .unwrap();

    let out = generate(&topo, &spine);
    let frag = out
        .config
        .feature(Feature::DcGateway)
        .expect("dc-gateway fragment");

    let nat = frag
        .routing_instances
        .iter()
        .find(|ri| ri.name.ends_with("-nat"))
        .expect("nat instance");
    assert_eq!(nat.ingress_interfaces, vec!["si-1/2/0.9"]);
    assert_eq!(nat.egress_interfaces, vec!["si-1/2/0.10"]);
    assert_eq!(nat.nat_rules.len(), 2);

    let fw = frag.firewall.as_ref().expect("firewall block");
    assert!(fw
        .firewall_filters
        .iter()
        .any(|f| f.name == "_contrail_redirect-to-public-vrfs-inet4"));
    assert!(fw
        .firewall_filters
        .iter()
        .any(|f| f.name.starts_with("redirect-to-") && f.name.ends_with("-nat-vrf")));
}

/// A PNF box in a service chain renders zones, service units, and the
/// eBGP legs.
#[test]
fn test_pnf_chain_on_pnf_box() {
    let topo = Topology::new();
    topo.global_config(64512);
    let pnf = topo
        .device("srx1")
        .role(PhysicalRole::Pnf)
        .rb_roles(&["pnf-servicechain"])
        .build();
    let spine = topo
        .device("spine1")
        .role(PhysicalRole::Spine)
        .rb_roles(&["pnf-servicechain"])
        .build();
    let left_pi = topo.interface(&pnf, "ge-0/0/0", InterfaceKind::Service);
    let right_pi = topo.interface(&pnf, "ge-0/0/1", InterfaceKind::Service);

    let s = &topo.store;
    let sa = s
        .create(Entity::new(
            Uuid::new_v4(),
            dm_types::FqName::from(["default-gsc", "sa1"]),
            EntityData::ServiceAppliance(Default::default()),
        ))
        .unwrap();
    topo.attr_ref(
        &sa,
        EntityType::PhysicalInterface,
        &left_pi,
        RefAttr::InterfaceSide("left".into()),
    );
    topo.attr_ref(
        &sa,
        EntityType::PhysicalInterface,
        &right_pi,
        RefAttr::InterfaceSide("right".into()),
    );
    let si = s
        .create(Entity::new(
            Uuid::new_v4(),
            dm_types::FqName::from(["default-domain", "admin", "fw-chain"]),
            EntityData::ServiceInstance(dm_types::ServiceInstance {
                left_svc_vlan: Some(1000),
                right_svc_vlan: Some(1001),
                left_svc_asns: vec![64512, 65100],
                right_svc_asns: vec![64512, 65100],
                left_svc_unit: Some(1000),
                ..Default::default()
            }),
        ))
        .unwrap();
    s.add_ref(&si, EntityType::ServiceAppliance, &sa, None).unwrap();
    let left_lr = topo.logical_router("lr-left", &[spine], &[]);
    let right_lr = topo.logical_router("lr-right", &[spine], &[]);
    let mut pt = Entity::new(
        Uuid::new_v4(),
        dm_types::FqName::from(["default-domain", "admin", "fw-chain", "pt0"]),
        EntityData::PortTuple(dm_types::PortTuple {
            left_lr: Some(left_lr),
            right_lr: Some(right_lr),
        }),
    );
    pt.parent = Some((EntityType::ServiceInstance, si));
    s.create(pt).unwrap();

    let out = generate(&topo, &pnf);
    let frag = out
        .config
        .feature(Feature::PnfServiceChaining)
        .expect("pnf fragment");
    assert_eq!(frag.security_zones.len(), 2);
    assert_eq!(frag.security_policies.len(), 2);
    let ri = &frag.routing_instances[0];
    assert!(ri.interfaces.contains(&"ge-0/0/0.1000".to_string()));
    assert!(ri.interfaces.contains(&"lo0.1000".to_string()));
    assert_eq!(ri.protocols.as_ref().unwrap().bgp.len(), 2);
}

/// An intra-fabric DCI with routing-policy refs leaks through a rib
/// group listing the source and destination internal instances.
#[test]
fn test_dci_rib_mode_with_policies() {
    let topo = Topology::new();
    topo.global_config(64512);
    let spine = topo
        .device("spine1")
        .role(PhysicalRole::Spine)
        .rb_roles(&["dc-gateway"])
        .bgp(64512, "10.0.0.1")
        .build();
    let src_vns: Vec<Uuid> = (21..=23)
        .map(|n| {
            topo.vn(&format!("vn{n}"))
                .subnet(&format!("10.{n}.0.0"), 24, &format!("10.{n}.0.1"))
                .build()
        })
        .collect();
    let src_lr = topo.logical_router("lr-src", &[spine], &src_vns);
    let vn24 = topo.vn("vn24").subnet("10.24.0.0", 24, "10.24.0.1").build();
    let vn25 = topo.vn("vn25").subnet("10.25.0.0", 24, "10.25.0.1").build();
    let dst1 = topo.logical_router("lr-dst1", &[spine], &[vn24]);
    let dst2 = topo.logical_router("lr-dst2", &[spine], &[vn25]);

    let s = &topo.store;
    let policies: Vec<Uuid> = ["rp-a", "rp-b"]
        .iter()
        .map(|name| {
            s.create(Entity::new(
                Uuid::new_v4(),
                dm_types::FqName::from(["default-domain", "admin"]).child(*name),
                EntityData::RoutingPolicy(dm_types::RoutingPolicy {
                    terms: vec![Default::default()],
                }),
            ))
            .unwrap()
        })
        .collect();
    let dci = s
        .create(Entity::new(
            Uuid::new_v4(),
            dm_types::FqName::from(["default-gsc", "dci1"]),
            EntityData::DataCenterInterconnect(dm_types::DataCenterInterconnect {
                dci_type: Some(dm_types::DciType::IntraFabric),
                destinations: vec![
                    dm_types::DciDestination {
                        logical_router: dst1,
                        physical_routers: vec![spine],
                    },
                    dm_types::DciDestination {
                        logical_router: dst2,
                        physical_routers: vec![spine],
                    },
                ],
            }),
        ))
        .unwrap();
    topo.attr_ref(
        &dci,
        EntityType::LogicalRouter,
        &src_lr,
        RefAttr::LrDirection("source".into()),
    );
    for lr in [dst1, dst2] {
        topo.attr_ref(
            &dci,
            EntityType::LogicalRouter,
            &lr,
            RefAttr::LrDirection("destination".into()),
        );
    }
    for rp in &policies {
        s.add_ref(&dci, EntityType::RoutingPolicy, rp, None).unwrap();
    }

    let out = generate(&topo, &spine);
    let frag = out.config.feature(Feature::Dci).expect("dci fragment");

    assert_eq!(frag.rib_groups.len(), 1);
    let group = &frag.rib_groups[0];
    assert!(group.name.starts_with("_contrail_rib_dci1_"));
    // Source internal RI plus one per destination LR.
    assert_eq!(group.import_rib.len(), 3);
    assert_eq!(group.import_policy.len(), 2);
    assert!(group.import_policy.contains(&"rp-a".to_string()));
    assert!(group.import_policy.contains(&"rp-b".to_string()));
    assert_eq!(frag.routing_policies.len(), 2);

    let source_ri = frag
        .routing_instances
        .iter()
        .find(|ri| ri.rib_group.is_some())
        .expect("source instance");
    assert_eq!(source_ri.rib_group.as_deref(), Some(group.name.as_str()));
    assert_eq!(group.import_rib[0], source_ri.name);
}

/// Telemetry lands only on the bound device, with per-interface
/// overrides for custom instrumentation.
#[test]
fn test_telemetry_bound_device_only() {
    let topo = Topology::new();
    topo.global_config(64512);
    let leaf1 = topo
        .device("leaf1")
        .role(PhysicalRole::Leaf)
        .rb_roles(&["crb-access"])
        .build();
    let leaf2 = topo
        .device("leaf2")
        .role(PhysicalRole::Leaf)
        .rb_roles(&["crb-access"])
        .build();
    topo.interface(&leaf1, "xe-0/0/0", InterfaceKind::Access);
    topo.interface(&leaf2, "xe-0/0/0", InterfaceKind::Access);

    let s = &topo.store;
    let sp = s
        .create(Entity::new(
            Uuid::new_v4(),
            dm_types::FqName::from(["default-domain", "admin", "sp1"]),
            EntityData::SflowProfile(dm_types::SflowProfile {
                sample_rate: Some(2000),
                enabled_interface_type: Some(dm_types::SflowInterfaceType::Custom),
                enabled_interface_params: vec![dm_types::SflowInterfaceParams {
                    name: "xe-0/0/0".into(),
                    sample_rate: Some(9000),
                    polling_interval: None,
                }],
                ..Default::default()
            }),
        ))
        .unwrap();
    let tp = s
        .create(Entity::new(
            Uuid::new_v4(),
            dm_types::FqName::from(["default-domain", "admin", "tp1"]),
            EntityData::TelemetryProfile(Default::default()),
        ))
        .unwrap();
    s.add_ref(&tp, EntityType::SflowProfile, &sp, None).unwrap();
    s.add_ref(&leaf1, EntityType::TelemetryProfile, &tp, None).unwrap();

    let bound = generate(&topo, &leaf1);
    let frag = bound
        .config
        .feature(Feature::Telemetry)
        .expect("telemetry fragment");
    assert_eq!(frag.telemetry[0].name, "tp1-admin");
    let pi = frag
        .physical_interfaces
        .iter()
        .find(|p| p.name == "xe-0/0/0")
        .unwrap();
    assert_eq!(
        pi.sflow_params.as_ref().unwrap().sample_rate,
        Some(9000)
    );

    let unbound = generate(&topo, &leaf2);
    assert!(unbound.config.feature(Feature::Telemetry).is_none());
    assert!(unbound
        .report
        .empty_features
        .contains(&"telemetry".to_string()));
}

/// Clearing storm-control fields must surface as explicit nulls after
/// regeneration.
#[test]
fn test_storm_control_update_clears_fields() {
    let topo = Topology::new();
    topo.global_config(64512);
    let leaf = topo
        .device("leaf1")
        .role(PhysicalRole::Leaf)
        .rb_roles(&["crb-access"])
        .build();
    let pi = topo.interface(&leaf, "xe-0/0/1", InterfaceKind::Access);
    let vn = topo.vn("vn1").subnet("10.0.0.0", 24, "10.0.0.1").build();
    let (vpg, _) = topo.vpg_attach("vpg1", &pi, &vn);

    let s = &topo.store;
    let sc = s
        .create(Entity::new(
            Uuid::new_v4(),
            dm_types::FqName::from(["default-domain", "admin", "sc1"]),
            EntityData::StormControlProfile(dm_types::StormControlProfile {
                bandwidth_percent: Some(20),
                actions: Some(vec!["interface-shutdown".into()]),
                traffic_types: Some(vec!["broadcast".into()]),
                recovery_timeout: Some(600),
            }),
        ))
        .unwrap();
    let pp = s
        .create(Entity::new(
            Uuid::new_v4(),
            dm_types::FqName::from(["default-domain", "admin", "pp1"]),
            EntityData::PortProfile(Default::default()),
        ))
        .unwrap();
    s.add_ref(&pp, EntityType::StormControlProfile, &sc, None).unwrap();
    s.add_ref(&vpg, EntityType::PortProfile, &pp, None).unwrap();

    s.update(&sc, &["actions", "traffic_types"], |data| {
        if let EntityData::StormControlProfile(sc) = data {
            sc.actions = None;
            sc.traffic_types = None;
        }
    })
    .unwrap();

    let out = generate(&topo, &leaf);
    let frag = out
        .config
        .feature(Feature::StormControl)
        .expect("storm-control fragment");
    let entry = &frag.storm_control[0];
    assert_eq!(entry.bandwidth_percent, Some(20));
    assert!(entry.actions.is_none());

    let json = serde_json::to_value(entry).unwrap();
    assert!(json["actions"].is_null());
    assert!(json["traffic_type"].is_null());
    assert_eq!(json["recovery_timeout"], 600);
}

/// Back-to-back generation of an unchanged graph is byte-identical.
#[test]
fn test_generation_is_deterministic() {
    let topo = Topology::new();
    topo.global_config(64512);
    let leaf = topo
        .device("leaf1")
        .role(PhysicalRole::Leaf)
        .rb_roles(&["erb-ucast-gateway"])
        .bgp(64512, "10.0.0.11")
        .build();
    let pi = topo.interface(&leaf, "xe-0/0/1", InterfaceKind::Access);
    for (name, cidr, gw) in [
        ("vn-b", "10.2.0.0", "10.2.0.1"),
        ("vn-a", "10.1.0.0", "10.1.0.1"),
    ] {
        let vn = topo.vn(name).subnet(cidr, 24, gw).build();
        topo.vpg_attach(&format!("vpg-{name}"), &pi, &vn);
    }

    let assembler = ConfigAssembler::new(topo.store.clone());
    let a = assembler.generate(&leaf, &tx()).unwrap().unwrap();
    let b = assembler.generate(&leaf, &tx()).unwrap().unwrap();
    assert_eq!(
        serde_json::to_string(&a.config).unwrap(),
        serde_json::to_string(&b.config).unwrap()
    );
}

/// Roles that resolve to no definition degrade to report warnings, not
/// failures.
#[test]
fn test_unknown_role_is_warning() {
    let topo = Topology::new();
    let leaf = topo
        .device("leaf1")
        .role(PhysicalRole::Leaf)
        .rb_roles(&["crb-access", "no-such-role"])
        .build();
    let out = generate(&topo, &leaf);
    assert!(out
        .report
        .warnings
        .iter()
        .any(|w| w.contains("no-such-role")));
    assert!(out.report.features.contains(&"l2-gateway".to_string()));
}
