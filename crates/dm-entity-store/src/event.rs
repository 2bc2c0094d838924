//! Change events delivered on the store's change channel.

use dm_types::{Entity, EntityType, FqName, Uuid};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operation kind of a change event.
///
/// `UpdateImplicit` marks changes the system made as a side effect of
/// another change (native-RI creation, internal-VN lifecycle, ref
/// back-propagation); it reacts like `Update` but keeps a distinct
/// label so traces can show cascades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeOp {
    Create,
    Update,
    UpdateImplicit,
    Delete,
}

impl ChangeOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeOp::Create => "CREATE",
            ChangeOp::Update => "UPDATE",
            ChangeOp::UpdateImplicit => "UPDATE-IMPLICIT",
            ChangeOp::Delete => "DELETE",
        }
    }
}

impl fmt::Display for ChangeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One change to the entity graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub op: ChangeOp,
    pub entity_type: EntityType,
    pub uuid: Uuid,
    pub fq_name: FqName,
    /// Property fields named by an UPDATE; empty means unknown/any.
    pub changed_fields: Vec<String>,
    /// Snapshot captured at event time for DELETEs, so dependency
    /// traversal sees the pre-delete refs. The entity name for DELETE
    /// traces comes from here, never from a post-delete lookup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_delete: Option<Box<Entity>>,
}

impl ChangeEvent {
    pub fn new(op: ChangeOp, entity_type: EntityType, uuid: Uuid, fq_name: FqName) -> Self {
        Self {
            op,
            entity_type,
            uuid,
            fq_name,
            changed_fields: Vec::new(),
            pre_delete: None,
        }
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.changed_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_pre_delete(mut self, entity: Entity) -> Self {
        self.pre_delete = Some(Box::new(entity));
        self
    }

    /// Entity leaf name resolvable from the event alone.
    pub fn entity_name(&self) -> &str {
        self.fq_name.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dm_types::{EntityData, VirtualNetwork};

    #[test]
    fn test_op_labels() {
        assert_eq!(ChangeOp::UpdateImplicit.as_str(), "UPDATE-IMPLICIT");
        assert_eq!(ChangeOp::Delete.to_string(), "DELETE");
    }

    #[test]
    fn test_delete_event_carries_snapshot() {
        let uuid = Uuid::new_v4();
        let fq = FqName::from(["default", "vn1"]);
        let entity = Entity::new(
            uuid,
            fq.clone(),
            EntityData::VirtualNetwork(VirtualNetwork::default()),
        );
        let ev = ChangeEvent::new(ChangeOp::Delete, EntityType::VirtualNetwork, uuid, fq)
            .with_pre_delete(entity);

        assert_eq!(ev.entity_name(), "vn1");
        assert_eq!(ev.pre_delete.as_ref().map(|e| e.uuid), Some(uuid));
    }
}
