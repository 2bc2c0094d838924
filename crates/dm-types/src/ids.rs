//! Identifier types: uuids and fully-qualified names.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Entity identifier. Allocated by the API server, opaque to the core.
pub type Uuid = uuid::Uuid;

/// Fully-qualified name: the path of names from the configuration root
/// down to the entity (e.g. `["default-domain", "admin", "vn1"]`).
///
/// Displayed colon-joined, matching the wire form used by the
/// fq-name-to-id resolution endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FqName(pub Vec<String>);

impl FqName {
    /// Builds an fq-name from string-ish parts.
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    /// The leaf name (last path element).
    pub fn name(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or("")
    }

    /// Parent fq-name, if any.
    pub fn parent(&self) -> Option<FqName> {
        if self.0.len() < 2 {
            return None;
        }
        Some(FqName(self.0[..self.0.len() - 1].to_vec()))
    }

    /// The second-to-last element; for project-scoped entities this is
    /// the project name used in rendered profile names.
    pub fn project(&self) -> Option<&str> {
        if self.0.len() < 2 {
            return None;
        }
        self.0.get(self.0.len() - 2).map(String::as_str)
    }

    /// Appends a child name, producing the child's fq-name.
    pub fn child(&self, name: impl Into<String>) -> FqName {
        let mut parts = self.0.clone();
        parts.push(name.into());
        FqName(parts)
    }

    /// Parses the colon-joined wire form.
    pub fn parse(s: &str) -> Self {
        Self(s.split(':').map(str::to_string).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for FqName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(":"))
    }
}

impl From<Vec<String>> for FqName {
    fn from(parts: Vec<String>) -> Self {
        Self(parts)
    }
}

impl<const N: usize> From<[&str; N]> for FqName {
    fn from(parts: [&str; N]) -> Self {
        Self::new(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fq_name_display_roundtrip() {
        let fq = FqName::from(["default-domain", "admin", "vn1"]);
        assert_eq!(fq.to_string(), "default-domain:admin:vn1");
        assert_eq!(FqName::parse("default-domain:admin:vn1"), fq);
    }

    #[test]
    fn test_fq_name_parts() {
        let fq = FqName::from(["default-domain", "admin", "vn1"]);
        assert_eq!(fq.name(), "vn1");
        assert_eq!(fq.project(), Some("admin"));
        assert_eq!(
            fq.parent(),
            Some(FqName::from(["default-domain", "admin"]))
        );
        assert_eq!(fq.child("ri1").name(), "ri1");
    }

    #[test]
    fn test_fq_name_edge_cases() {
        let root = FqName::from(["root"]);
        assert_eq!(root.parent(), None);
        assert_eq!(root.project(), None);
        assert_eq!(FqName::new(Vec::<String>::new()).name(), "");
    }
}
