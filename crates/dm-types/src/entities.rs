//! Per-type entity payloads.
//!
//! Each struct carries exactly the attributes the config generation
//! engine reads. Typed fields replace the legacy string-keyed
//! annotation blobs (service-chain VLANs/ASNs, DCI destinations,
//! routed-VN protocol parameters).

use crate::ids::Uuid;
use crate::net::{RouteTarget, Subnet};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Physical role a device plays in the fabric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhysicalRole {
    Leaf,
    Spine,
    Superspine,
    Pnf,
}

impl PhysicalRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhysicalRole::Leaf => "leaf",
            PhysicalRole::Spine => "spine",
            PhysicalRole::Superspine => "superspine",
            PhysicalRole::Pnf => "pnf",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "leaf" => Some(PhysicalRole::Leaf),
            "spine" => Some(PhysicalRole::Spine),
            "superspine" => Some(PhysicalRole::Superspine),
            "pnf" => Some(PhysicalRole::Pnf),
            _ => None,
        }
    }
}

/// Forwarding mode of a virtual network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForwardingMode {
    L2,
    L3,
    L2L3,
}

impl ForwardingMode {
    pub fn includes_l2(&self) -> bool {
        matches!(self, ForwardingMode::L2 | ForwardingMode::L2L3)
    }

    pub fn includes_l3(&self) -> bool {
        matches!(self, ForwardingMode::L3 | ForwardingMode::L2L3)
    }
}

/// Virtual network category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VnCategory {
    Routed,
    Infra,
    Tenant,
}

/// Physical interface kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceKind {
    Service,
    Fabric,
    Access,
    Lag,
    Irb,
    Loopback,
}

impl InterfaceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterfaceKind::Service => "service",
            InterfaceKind::Fabric => "fabric",
            InterfaceKind::Access => "access",
            InterfaceKind::Lag => "lag",
            InterfaceKind::Irb => "irb",
            InterfaceKind::Loopback => "loopback",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhysicalRouter {
    pub product_name: String,
    pub vendor: String,
    pub family: String,
    pub management_ip: Option<IpAddr>,
    pub loopback_ip: Option<IpAddr>,
    pub physical_role: Option<PhysicalRole>,
    pub rb_roles: Vec<String>,
    pub display_name: Option<String>,
    pub vnc_managed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhysicalInterface {
    pub interface_kind: Option<InterfaceKind>,
    pub mac: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogicalInterface {
    pub unit: u32,
    pub vlan_tag: Option<u32>,
    pub interface_kind: Option<InterfaceKind>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VirtualNetwork {
    pub category: Option<VnCategory>,
    pub vxlan_id: Option<u32>,
    /// Fabric-wide network id used in routing-instance names.
    pub vn_network_id: u32,
    pub forwarding_mode: Option<ForwardingMode>,
    pub router_external: bool,
    pub subnets: Vec<Subnet>,
    pub route_targets: Vec<RouteTarget>,
    /// Set on the auto-created internal VN backing a vxlan-routing LR.
    pub is_internal: bool,
    pub routed_properties: Vec<RoutedProperties>,
}

/// Logical router type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogicalRouterType {
    VxlanRouting,
    Snat,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogicalRouter {
    pub logical_router_type: Option<LogicalRouterType>,
    pub gateway_external: bool,
    pub vxlan_network_identifier: Option<u32>,
}

/// Port bindings carried by a VMI (vif details from the VPG path).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VmiBindings {
    pub vpg: Option<String>,
    pub vif_type: Option<String>,
    pub profile: Option<String>,
    pub vlan_id: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VirtualMachineInterface {
    pub bindings: VmiBindings,
    pub sub_interface_vlan_tag: Option<u32>,
    pub service_interface_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VirtualPortGroup {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fabric {
    pub enterprise_style: bool,
    pub ztp: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FabricNamespace {
    pub cidrs: Vec<Subnet>,
    pub tag: Option<String>,
}

/// One (physical role -> overlay roles) mapping in a node profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoleMapping {
    pub physical_role: String,
    pub rb_roles: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeProfile {
    pub vendor: String,
    pub device_family: String,
    pub role_mappings: Vec<RoleMapping>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoleDefinition {
    pub physical_role: String,
    pub overlay_role: String,
    pub features: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BgpRouter {
    pub autonomous_system: u32,
    pub local_asn: Option<u32>,
    pub address: Option<IpAddr>,
    pub identifier: Option<IpAddr>,
    pub address_families: Vec<String>,
    pub authentication_key: Option<String>,
    pub hold_time: Option<u32>,
    pub router_type: Option<String>,
}

/// Prefix match inside a routing-policy term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefixMatch {
    pub prefix: Subnet,
    /// `exact`, `orlonger`, `longer`; absent means exact.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyTermMatch {
    pub protocols: Vec<String>,
    pub prefixes: Vec<PrefixMatch>,
    pub communities: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyTermAction {
    /// `accept`, `reject`, or `next`.
    pub action: String,
    pub local_pref: Option<u32>,
    pub med: Option<u32>,
    pub community_add: Vec<String>,
    pub community_set: Vec<String>,
    pub asn_list: Vec<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyTerm {
    pub from: PolicyTermMatch,
    pub then: PolicyTermAction,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutingPolicy {
    pub terms: Vec<PolicyTerm>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FloatingIpPool {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FloatingIp {
    pub address: Option<IpAddr>,
    /// Fixed (private) address of the bound VMI.
    pub fixed_ip: Option<IpAddr>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceIp {
    pub address: Option<IpAddr>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutingInstance {
    /// True for the auto-created native RI co-named with its parent VN.
    pub is_default: bool,
}

/// DCI scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DciType {
    IntraFabric,
    InterFabric,
}

/// Destination side of an intra-fabric DCI: one destination LR and the
/// physical routers it extends to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DciDestination {
    pub logical_router: Uuid,
    pub physical_routers: Vec<Uuid>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataCenterInterconnect {
    pub dci_type: Option<DciType>,
    pub destinations: Vec<DciDestination>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceApplianceSet {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceAppliance {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceTemplate {
    pub virtualization_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceInstance {
    pub left_svc_vlan: Option<u32>,
    pub right_svc_vlan: Option<u32>,
    /// `[spine ASN, PNF-side ASN]` for the left service leg.
    pub left_svc_asns: Vec<u32>,
    pub right_svc_asns: Vec<u32>,
    pub left_svc_unit: Option<u32>,
    pub right_svc_unit: Option<u32>,
    /// Rendezvous-point override for PIM.
    pub rp_ip_addr: Option<IpAddr>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortTuple {
    pub left_lr: Option<Uuid>,
    pub right_lr: Option<Uuid>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortParams {
    pub port_disable: Option<bool>,
    pub port_disable_timeout: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LacpParams {
    pub lacp_enable: Option<bool>,
    pub lacp_interval: Option<String>,
    pub lacp_mode: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortProfile {
    pub flow_control: bool,
    pub bpdu_loop_protection: bool,
    pub port_params: Option<PortParams>,
    pub lacp_params: Option<LacpParams>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StormControlProfile {
    pub bandwidth_percent: Option<u32>,
    pub traffic_types: Option<Vec<String>>,
    pub actions: Option<Vec<String>>,
    pub recovery_timeout: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryProfile {}

/// Which of a device's interfaces an sflow profile instruments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SflowInterfaceType {
    Access,
    Fabric,
    Service,
    Custom,
    All,
}

/// Per-interface override for `custom` sflow instrumentation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SflowInterfaceParams {
    pub name: String,
    pub sample_rate: Option<u32>,
    pub polling_interval: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SflowProfile {
    pub agent_id: Option<String>,
    pub sample_rate: Option<u32>,
    pub polling_interval: Option<u32>,
    pub adaptive_sample_rate: Option<u32>,
    pub enabled_interface_type: Option<SflowInterfaceType>,
    pub enabled_interface_params: Vec<SflowInterfaceParams>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityGroupRule {
    /// `ingress` or `egress`.
    pub direction: String,
    pub protocol: Option<String>,
    pub src_prefixes: Vec<Subnet>,
    pub dst_prefixes: Vec<Subnet>,
    pub port_start: Option<u16>,
    pub port_end: Option<u16>,
    pub ether_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityGroup {
    pub rules: Vec<SecurityGroupRule>,
}

/// BGPVPN attachment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BgpvpnType {
    L2,
    L3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bgpvpn {
    pub bgpvpn_type: BgpvpnType,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub tag_type: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Port {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowNode {
    pub lb_ip: Option<IpAddr>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterfaceRouteTable {
    pub prefixes: Vec<Subnet>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkIpam {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubCluster {
    pub asn: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BgpAsAService {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalSystemConfig {
    pub autonomous_system: Option<u32>,
    pub bgpaas_port_start: Option<u16>,
    pub bgpaas_port_end: Option<u16>,
}

/// Routed-VN protocol selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoutedProtocol {
    Bgp,
    Ospf,
    Pim,
    StaticRoutes,
}

/// BFD liveness parameters shared by routed-VN protocols.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BfdParams {
    pub rx_tx_interval: Option<u32>,
    pub detection_time_multiplier: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutedBgpParams {
    pub peer_ip: Option<IpAddr>,
    pub peer_asn: Option<u32>,
    pub local_asn: Option<u32>,
    pub authentication_key: Option<String>,
    pub hold_time: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutedOspfParams {
    pub hello_interval: Option<u32>,
    pub dead_interval: Option<u32>,
    pub area_id: Option<String>,
    pub area_type: Option<String>,
    pub originate_summary_lsa: bool,
    pub advertise_loopback: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutedPimParams {
    pub rp_addresses: Vec<IpAddr>,
    pub mode: Option<String>,
    pub enable_all_interfaces: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutedStaticParams {
    pub interface_route_tables: Vec<Uuid>,
    pub next_hop: Option<IpAddr>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutedPolicies {
    pub import_policies: Vec<Uuid>,
    pub export_policies: Vec<Uuid>,
}

/// Per-device routed-VN attachment: which PR terminates the routed VN,
/// the interface address, and the protocol block to render.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutedProperties {
    pub physical_router: Option<Uuid>,
    pub routed_interface_ip: Option<IpAddr>,
    pub routing_protocol: Option<RoutedProtocol>,
    pub bgp: Option<RoutedBgpParams>,
    pub ospf: Option<RoutedOspfParams>,
    pub pim: Option<RoutedPimParams>,
    pub static_routes: Option<RoutedStaticParams>,
    pub bfd: Option<BfdParams>,
    pub routing_policies: Option<RoutedPolicies>,
}
