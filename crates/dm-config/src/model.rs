//! Abstract-config document model.
//!
//! Feature builders emit [`FeatureFragment`]s; the assembler merges
//! them into one [`AbstractConfig`] per device. Every item carries a
//! `comment` naming its origin entity. Serialization skips absent
//! optionals and empty lists, except where a consumer relies on an
//! explicit `null` (storm-control fields cleared by an update must be
//! visible as cleared).

use crate::feature::Feature;
use dm_types::{LacpParams, PolicyTerm, PortParams, SflowInterfaceType, Subnet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;

fn is_false(b: &bool) -> bool {
    !*b
}

/// One static route inside a routing instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticRoute {
    pub prefix: IpAddr,
    pub prefix_len: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_hop: Option<IpAddr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bfd: Option<dm_types::BfdParams>,
}

/// NAT translation rule inside a NAT routing instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NatRule {
    pub name: String,
    /// `inbound` or `outbound`.
    pub direction: String,
    /// `basic-nat44` or `dnat-44`.
    pub translation_type: String,
    pub source_prefix: Subnet,
    pub translated_prefix: Subnet,
}

/// BGP session rendered under a routing instance (routed-VN, PNF
/// service legs).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiBgp {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer_ip: Option<IpAddr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer_asn: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_asn: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autonomous_system: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hold_time: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bfd: Option<dm_types::BfdParams>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub import_policies: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub export_policies: Vec<String>,
}

/// OSPF block rendered under a routing instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiOspf {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hello_interval: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dead_interval: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area_type: Option<String>,
    #[serde(skip_serializing_if = "is_false", default)]
    pub originate_summary_lsa: bool,
    #[serde(skip_serializing_if = "is_false", default)]
    pub advertise_loopback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bfd: Option<dm_types::BfdParams>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub import_policies: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub export_policies: Vec<String>,
}

/// PIM block rendered under a routing instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiPim {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub rp_addresses: Vec<IpAddr>,
    /// Interface names, or `["all"]`.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub pim_interfaces: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bfd: Option<dm_types::BfdParams>,
}

/// Protocol blocks under one routing instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiProtocols {
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub bgp: Vec<RiBgp>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub ospf: Vec<RiOspf>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub pim: Vec<RiPim>,
}

impl RiProtocols {
    pub fn is_empty(&self) -> bool {
        self.bgp.is_empty() && self.ospf.is_empty() && self.pim.is_empty()
    }
}

fn protocols_empty(p: &Option<RiProtocols>) -> bool {
    p.as_ref().map_or(true, RiProtocols::is_empty)
}

/// One routing instance in a fragment. Instances sharing `name` are
/// merged by the assembler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutingInstanceConfig {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// `vrf` or `virtual-switch`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,
    /// `l2` or `l3`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub virtual_network_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub virtual_network_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vxlan_id: Option<u32>,
    #[serde(skip_serializing_if = "is_false", default)]
    pub virtual_network_is_internal: bool,
    #[serde(skip_serializing_if = "is_false", default)]
    pub is_public_network: bool,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub import_targets: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub export_targets: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub interfaces: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub routing_interfaces: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub static_routes: Vec<StaticRoute>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub prefixes: Vec<Subnet>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub ingress_interfaces: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub egress_interfaces: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub nat_rules: Vec<NatRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rib_group: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub vrf_export: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub vrf_import: Vec<String>,
    #[serde(skip_serializing_if = "protocols_empty", default)]
    pub protocols: Option<RiProtocols>,
}

fn union_into<T: PartialEq>(dst: &mut Vec<T>, src: Vec<T>) {
    for item in src {
        if !dst.contains(&item) {
            dst.push(item);
        }
    }
}

impl RoutingInstanceConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Union-merges another instance of the same name into this one.
    pub fn merge_from(&mut self, other: RoutingInstanceConfig) {
        debug_assert_eq!(self.name, other.name);
        self.comment = self.comment.take().or(other.comment);
        self.instance_type = self.instance_type.take().or(other.instance_type);
        self.virtual_network_mode =
            self.virtual_network_mode.take().or(other.virtual_network_mode);
        self.virtual_network_id = self.virtual_network_id.or(other.virtual_network_id);
        self.vxlan_id = self.vxlan_id.or(other.vxlan_id);
        self.virtual_network_is_internal |= other.virtual_network_is_internal;
        self.is_public_network |= other.is_public_network;
        self.rib_group = self.rib_group.take().or(other.rib_group);
        union_into(&mut self.import_targets, other.import_targets);
        union_into(&mut self.export_targets, other.export_targets);
        union_into(&mut self.interfaces, other.interfaces);
        union_into(&mut self.routing_interfaces, other.routing_interfaces);
        union_into(&mut self.static_routes, other.static_routes);
        union_into(&mut self.prefixes, other.prefixes);
        union_into(&mut self.ingress_interfaces, other.ingress_interfaces);
        union_into(&mut self.egress_interfaces, other.egress_interfaces);
        union_into(&mut self.nat_rules, other.nat_rules);
        union_into(&mut self.vrf_export, other.vrf_export);
        union_into(&mut self.vrf_import, other.vrf_import);
        if let Some(theirs) = other.protocols {
            let ours = self.protocols.get_or_insert_with(RiProtocols::default);
            union_into(&mut ours.bgp, theirs.bgp);
            union_into(&mut ours.ospf, theirs.ospf);
            union_into(&mut ours.pim, theirs.pim);
        }
    }
}

/// Per-interface sflow override (custom instrumentation).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SflowInterfaceOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub polling_interval: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogicalInterfaceConfig {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub unit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vlan_tag: Option<u32>,
    /// `irb`, `service`, etc.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface_type: Option<String>,
    /// `a.b.c.d/len` gateway addresses.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub ip_addresses: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhysicalInterfaceConfig {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_profile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telemetry_profile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sflow_params: Option<SflowInterfaceOverride>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub logical_interfaces: Vec<LogicalInterfaceConfig>,
}

impl PhysicalInterfaceConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn merge_from(&mut self, other: PhysicalInterfaceConfig) {
        debug_assert_eq!(self.name, other.name);
        self.comment = self.comment.take().or(other.comment);
        self.interface_type = self.interface_type.take().or(other.interface_type);
        self.port_profile = self.port_profile.take().or(other.port_profile);
        self.telemetry_profile = self.telemetry_profile.take().or(other.telemetry_profile);
        self.sflow_params = self.sflow_params.take().or(other.sflow_params);
        for li in other.logical_interfaces {
            match self
                .logical_interfaces
                .iter_mut()
                .find(|mine| mine.name == li.name)
            {
                Some(mine) => {
                    mine.comment = mine.comment.take().or(li.comment);
                    mine.vlan_tag = mine.vlan_tag.or(li.vlan_tag);
                    mine.interface_type = mine.interface_type.take().or(li.interface_type);
                    union_into(&mut mine.ip_addresses, li.ip_addresses);
                }
                None => self.logical_interfaces.push(li),
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VlanConfig {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vlan_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vxlan_id: Option<u32>,
    /// e.g. `irb.<vn-id>`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l3_interface: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub interfaces: Vec<String>,
}

/// Match side of a firewall term.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TermMatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ether_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub source_address: Vec<Subnet>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub destination_address: Vec<Subnet>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub source_ports: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub destination_ports: Vec<String>,
}

/// Action side of a firewall term.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TermThen {
    /// `accept` or `reject`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routing_instance: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FirewallTerm {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fromxx: Option<TermMatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub then: Option<TermThen>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FirewallFilter {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub terms: Vec<FirewallTerm>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Firewall {
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub firewall_filters: Vec<FirewallFilter>,
}

impl Firewall {
    pub fn is_empty(&self) -> bool {
        self.firewall_filters.is_empty()
    }
}

fn firewall_empty(f: &Option<Firewall>) -> bool {
    f.as_ref().map_or(true, Firewall::is_empty)
}

/// One device-level BGP peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BgpPeer {
    pub ip_address: IpAddr,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autonomous_system: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hold_time: Option<u32>,
}

/// Device-level BGP peer group (`__contrail__` internal,
/// `__contrail_external__` external).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BgpGroup {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// `internal` or `external`.
    pub bgp_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<IpAddr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autonomous_system: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hold_time: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub families: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub peers: Vec<BgpPeer>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RibGroup {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub import_rib: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub import_policy: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutingPolicyConfig {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub term_type: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub terms: Vec<PolicyTerm>,
}

/// Storm-control entry. The four tunables serialize even when unset so
/// a cleared value reads as an explicit `null` downstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StormControl {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub bandwidth_percent: Option<u32>,
    pub traffic_type: Option<Vec<String>>,
    pub actions: Option<Vec<String>>,
    pub recovery_timeout: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortProfileConfig {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "is_false", default)]
    pub flow_control: bool,
    #[serde(skip_serializing_if = "is_false", default)]
    pub bpdu_loop_protection: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_params: Option<PortParams>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lacp_params: Option<LacpParams>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storm_control_profile: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorParams {
    pub ip_address: IpAddr,
    pub udp_port: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SflowProfileConfig {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub polling_interval: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adaptive_sample_rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled_interface_type: Option<SflowInterfaceType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collector_params: Option<CollectorParams>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sflow_profile: Option<SflowProfileConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityZone {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub interfaces: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityPolicy {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub from_zone: String,
    pub to_zone: String,
    pub action: String,
}

/// Everything one feature builder can contribute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureFragment {
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub routing_instances: Vec<RoutingInstanceConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub physical_interfaces: Vec<PhysicalInterfaceConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub vlans: Vec<VlanConfig>,
    #[serde(skip_serializing_if = "firewall_empty", default)]
    pub firewall: Option<Firewall>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub routing_policies: Vec<RoutingPolicyConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub rib_groups: Vec<RibGroup>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub bgp: Vec<BgpGroup>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub storm_control: Vec<StormControl>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub port_profiles: Vec<PortProfileConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub telemetry: Vec<TelemetryConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub security_zones: Vec<SecurityZone>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub security_policies: Vec<SecurityPolicy>,
}

impl FeatureFragment {
    pub fn is_empty(&self) -> bool {
        self.routing_instances.is_empty()
            && self.physical_interfaces.is_empty()
            && self.vlans.is_empty()
            && firewall_empty(&self.firewall)
            && self.routing_policies.is_empty()
            && self.rib_groups.is_empty()
            && self.bgp.is_empty()
            && self.storm_control.is_empty()
            && self.port_profiles.is_empty()
            && self.telemetry.is_empty()
            && self.security_zones.is_empty()
            && self.security_policies.is_empty()
    }

    /// Appends another fragment, merging routing instances and
    /// physical interfaces by name.
    pub fn merge(&mut self, other: FeatureFragment) {
        for ri in other.routing_instances {
            match self
                .routing_instances
                .iter_mut()
                .find(|mine| mine.name == ri.name)
            {
                Some(mine) => mine.merge_from(ri),
                None => self.routing_instances.push(ri),
            }
        }
        for pi in other.physical_interfaces {
            match self
                .physical_interfaces
                .iter_mut()
                .find(|mine| mine.name == pi.name)
            {
                Some(mine) => mine.merge_from(pi),
                None => self.physical_interfaces.push(pi),
            }
        }
        self.vlans.extend(other.vlans);
        if let Some(fw) = other.firewall {
            self.firewall
                .get_or_insert_with(Firewall::default)
                .firewall_filters
                .extend(fw.firewall_filters);
        }
        self.routing_policies.extend(other.routing_policies);
        self.rib_groups.extend(other.rib_groups);
        self.bgp.extend(other.bgp);
        self.storm_control.extend(other.storm_control);
        self.port_profiles.extend(other.port_profiles);
        self.telemetry.extend(other.telemetry);
        self.security_zones.extend(other.security_zones);
        self.security_policies.extend(other.security_policies);
    }

    /// Sorts every list by name and drops duplicates, so serialization
    /// is byte-stable across regenerations.
    pub fn normalize(&mut self) {
        self.routing_instances.sort_by(|a, b| a.name.cmp(&b.name));
        for ri in &mut self.routing_instances {
            ri.interfaces.sort();
            ri.routing_interfaces.sort();
            ri.import_targets.sort();
            ri.export_targets.sort();
        }
        self.physical_interfaces.sort_by(|a, b| a.name.cmp(&b.name));
        for pi in &mut self.physical_interfaces {
            pi.logical_interfaces.sort_by(|a, b| a.name.cmp(&b.name));
        }
        self.vlans.sort_by(|a, b| a.name.cmp(&b.name));
        self.vlans.dedup();
        if let Some(fw) = &mut self.firewall {
            fw.firewall_filters.sort_by(|a, b| a.name.cmp(&b.name));
            fw.firewall_filters.dedup();
        }
        self.routing_policies.sort_by(|a, b| a.name.cmp(&b.name));
        self.routing_policies.dedup();
        self.rib_groups.sort_by(|a, b| a.name.cmp(&b.name));
        self.rib_groups.dedup();
        self.bgp.sort_by(|a, b| a.name.cmp(&b.name));
        for group in &mut self.bgp {
            group.peers.sort_by_key(|p| p.ip_address);
            group.peers.dedup();
        }
        self.storm_control.sort_by(|a, b| a.name.cmp(&b.name));
        self.storm_control.dedup();
        self.port_profiles.sort_by(|a, b| a.name.cmp(&b.name));
        self.port_profiles.dedup();
        self.telemetry.sort_by(|a, b| a.name.cmp(&b.name));
        self.telemetry.dedup();
        self.security_zones.sort_by(|a, b| a.name.cmp(&b.name));
        self.security_zones.dedup();
        self.security_policies.sort_by(|a, b| a.name.cmp(&b.name));
        self.security_policies.dedup();
    }
}

/// Device identity block attached to every abstract config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemBlock {
    pub product_name: String,
    pub vendor_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub physical_role: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub routing_bridging_roles: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub management_ip: Option<IpAddr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loopback_ip: Option<IpAddr>,
}

/// The assembled per-device document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AbstractConfig {
    pub system: SystemBlock,
    /// Fragments keyed by feature name, in feature-name order.
    pub features: BTreeMap<String, FeatureFragment>,
    pub transaction_id: u64,
    pub transaction_descr: String,
}

impl AbstractConfig {
    pub fn feature(&self, feature: Feature) -> Option<&FeatureFragment> {
        self.features.get(feature.name())
    }
}
