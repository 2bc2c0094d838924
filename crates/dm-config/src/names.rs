//! Naming conventions for emitted config objects.
//!
//! Every generated object name is derived here so builders agree on
//! spelling and regeneration stays byte-stable.

use dm_types::Uuid;
use once_cell::sync::Lazy;
use regex::Regex;

pub use dm_entity_store::internal_vn_name;

/// Filter steering public-destination traffic back into public VRFs.
pub const REDIRECT_TO_PUBLIC_VRFS_FILTER: &str = "_contrail_redirect-to-public-vrfs-inet4";

/// Internal BGP peer group (peer ASN equals local ASN).
pub const BGP_GROUP_INTERNAL: &str = "__contrail__";
/// External BGP peer group.
pub const BGP_GROUP_EXTERNAL: &str = "__contrail_external__";

/// L2 routing-instance name for a VN.
pub fn vrf_name_l2(vn_name: &str, vn_id: u32) -> String {
    format!("_contrail_{vn_name}-l2-{vn_id}")
}

/// L3 routing-instance name for a VN.
pub fn vrf_name_l3(vn_name: &str, vn_id: u32) -> String {
    format!("_contrail_{vn_name}-l3-{vn_id}")
}

/// NAT routing-instance paired with a public L3 RI.
pub fn nat_ri_name(l3_ri_name: &str) -> String {
    format!("{l3_ri_name}-nat")
}

/// Bridge-domain name from a VXLAN id.
pub fn bd_name(vxlan_id: u32) -> String {
    format!("bd-{vxlan_id}")
}

/// IRB unit for a VN id.
pub fn irb_interface(vn_id: u32) -> String {
    format!("irb.{vn_id}")
}

/// Rib-group stitching a DCI's source RI to its destination RIs.
pub fn rib_group_name(dci_name: &str, dci_uuid: &Uuid) -> String {
    format!("_contrail_rib_{dci_name}_{dci_uuid}")
}

/// Community tagged onto routes leaked out of a DCI source VRF,
/// derived from the source LR's route target.
pub fn dci_community(route_target: &str) -> String {
    route_target.trim_start_matches("target:").to_string()
}

/// Filter redirecting a private VN's FIP traffic into its NAT VRF.
pub fn nat_redirect_filter_name(private_l3_ri: &str) -> String {
    format!("redirect-to-{private_l3_ri}-nat-vrf")
}

/// Project-qualified profile name (`<name>-<project>`).
pub fn profile_name(name: &str, project: &str) -> String {
    format!("{name}-{project}")
}

/// Firewall filter name for a security group direction.
pub fn sg_filter_name(sg_name: &str, direction: &str) -> String {
    format!("sg-filter-{sg_name}-{direction}")
}

/// True for names of auto-created LR internal VNs.
pub fn is_internal_vn_name(name: &str) -> bool {
    name.starts_with("__contrail_lr_internal_vn_") && name.ends_with("__")
}

static ENCRYPTED_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\$(9|1|5|6)\$").expect("static regex"));

/// Junos-style pre-encrypted keys (`$9$…`, `$1$…`, `$5$…`, `$6$…`)
/// must be quoted when emitted.
pub fn quote_auth_key(key: &str) -> String {
    if ENCRYPTED_KEY_RE.is_match(key) {
        format!("\"{key}\"")
    } else {
        key.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vrf_names() {
        assert_eq!(vrf_name_l2("vn1", 5), "_contrail_vn1-l2-5");
        assert_eq!(vrf_name_l3("vn1", 5), "_contrail_vn1-l3-5");
        assert_eq!(nat_ri_name("_contrail_vn1-l3-5"), "_contrail_vn1-l3-5-nat");
        assert_eq!(bd_name(2000), "bd-2000");
        assert_eq!(irb_interface(5), "irb.5");
    }

    #[test]
    fn test_internal_vn_name_detection() {
        let uuid = Uuid::new_v4();
        assert!(is_internal_vn_name(&internal_vn_name(&uuid)));
        assert!(!is_internal_vn_name("vn1"));
    }

    #[test]
    fn test_auth_key_quoting() {
        assert_eq!(quote_auth_key("$9$abcdef"), "\"$9$abcdef\"");
        assert_eq!(quote_auth_key("$6$salt$hash"), "\"$6$salt$hash\"");
        assert_eq!(quote_auth_key("plaintext"), "plaintext");
        // Only the known magic prefixes are quoted.
        assert_eq!(quote_auth_key("$2$foo"), "$2$foo");
    }

    #[test]
    fn test_profile_and_filter_names() {
        assert_eq!(profile_name("sc1", "admin"), "sc1-admin");
        assert_eq!(
            nat_redirect_filter_name("_contrail_public-l3-7"),
            "redirect-to-_contrail_public-l3-7-nat-vrf"
        );
        assert_eq!(sg_filter_name("sg1", "ingress"), "sg-filter-sg1-ingress");
    }
}
