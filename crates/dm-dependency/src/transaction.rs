//! Transaction descriptors tagging one generation cycle.

use dm_entity_store::{ChangeEvent, ChangeOp};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

/// `(id, description)` pair correlating a triggering event with the
/// configs it produced. Stamped onto every abstract config emitted in
/// the same tracker pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: u64,
    pub descr: String,
}

impl Transaction {
    /// Builds a descriptor from the triggering event, e.g.
    /// `Logical Router 'lr-7' Update`.
    pub fn from_event(event: &ChangeEvent) -> Self {
        let type_words = event
            .entity_type
            .name()
            .split('-')
            .map(capitalize)
            .collect::<Vec<_>>()
            .join(" ");
        let op = match event.op {
            ChangeOp::Create => "Create",
            ChangeOp::Update | ChangeOp::UpdateImplicit => "Update",
            ChangeOp::Delete => "Delete",
        };
        Self {
            id: NEXT_TRANSACTION_ID.fetch_add(1, Ordering::Relaxed),
            descr: format!("{} '{}' {}", type_words, event.entity_name(), op),
        }
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.id, self.descr)
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dm_types::{EntityType, FqName, Uuid};

    #[test]
    fn test_descriptor_wording() {
        let ev = ChangeEvent::new(
            ChangeOp::Update,
            EntityType::LogicalRouter,
            Uuid::new_v4(),
            FqName::from(["default-domain", "admin", "lr-7"]),
        );
        let tx = Transaction::from_event(&ev);
        assert_eq!(tx.descr, "Logical Router 'lr-7' Update");
    }

    #[test]
    fn test_implicit_update_reads_as_update() {
        let ev = ChangeEvent::new(
            ChangeOp::UpdateImplicit,
            EntityType::VirtualNetwork,
            Uuid::new_v4(),
            FqName::from(["default-domain", "admin", "vn1"]),
        );
        assert_eq!(
            Transaction::from_event(&ev).descr,
            "Virtual Network 'vn1' Update"
        );
    }

    #[test]
    fn test_ids_are_unique() {
        let ev = ChangeEvent::new(
            ChangeOp::Create,
            EntityType::VirtualNetwork,
            Uuid::new_v4(),
            FqName::from(["default", "vn1"]),
        );
        let a = Transaction::from_event(&ev);
        let b = Transaction::from_event(&ev);
        assert_ne!(a.id, b.id);
    }
}
