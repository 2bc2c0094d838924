//! Network primitive types shared across the entity model and the
//! abstract-config document.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// An IP subnet as carried in VN/IPAM attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subnet {
    pub prefix: IpAddr,
    pub prefix_len: u8,
    /// Default gateway inside the subnet, when allocated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<IpAddr>,
}

impl Subnet {
    pub fn new(prefix: IpAddr, prefix_len: u8) -> Self {
        Self {
            prefix,
            prefix_len,
            gateway: None,
        }
    }

    pub fn with_gateway(mut self, gateway: IpAddr) -> Self {
        self.gateway = Some(gateway);
        self
    }
}

impl fmt::Display for Subnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.prefix, self.prefix_len)
    }
}

/// A BGP extended-community route target, e.g. `target:64512:8000002`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteTarget(pub String);

impl RouteTarget {
    pub fn new(asn: u32, id: u64) -> Self {
        Self(format!("target:{asn}:{id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RouteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RouteTarget {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
