use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec::{EncodedItem, encode_item};
use crate::error::Result;
use crate::types::{CompositePrimaryKey, KeyAttributes, TypedDatabaseItem};

use super::condition::{condition_for, successor_of};
use super::expression::ConditionExpr;

/// The five kinds of conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Insert,
    Clobber,
    Update,
    DeleteByKey,
    DeleteByItem,
}

/// A single write, with everything needed to derive its precondition.
///
/// Items are held already encoded so one transaction can mix payload types.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOperation {
    /// Fails if an item already exists at the key.
    Insert(EncodedItem),
    /// Overwrites whatever is stored at the key.
    Clobber(EncodedItem),
    /// Replaces `existing`, provided nobody modified it since it was read.
    Update {
        new_item: EncodedItem,
        existing: EncodedItem,
    },
    /// Removes the key if present. Idempotent.
    DeleteByKey(CompositePrimaryKey),
    /// Removes `existing`, provided nobody modified it since it was read.
    DeleteByItem(EncodedItem),
}

impl WriteOperation {
    pub fn insert<V: Serialize>(item: &TypedDatabaseItem<V>) -> Result<Self> {
        Ok(WriteOperation::Insert(encode_item(item)?))
    }

    pub fn clobber<V: Serialize>(item: &TypedDatabaseItem<V>) -> Result<Self> {
        Ok(WriteOperation::Clobber(encode_item(item)?))
    }

    /// The stored row status of the result is always `existing.row_status.next()`,
    /// whatever `new_item` carries.
    pub fn update<V: Serialize>(
        new_item: &TypedDatabaseItem<V>,
        existing: &TypedDatabaseItem<V>,
    ) -> Result<Self> {
        let existing = encode_item(existing)?;
        let new_item = successor_of(encode_item(new_item)?, &existing)?;
        Ok(WriteOperation::Update { new_item, existing })
    }

    pub fn delete_by_key(key: CompositePrimaryKey) -> Self {
        WriteOperation::DeleteByKey(key)
    }

    pub fn delete_existing<V: Serialize>(existing: &TypedDatabaseItem<V>) -> Result<Self> {
        Ok(WriteOperation::DeleteByItem(encode_item(existing)?))
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            WriteOperation::Insert(_) => OperationKind::Insert,
            WriteOperation::Clobber(_) => OperationKind::Clobber,
            WriteOperation::Update { .. } => OperationKind::Update,
            WriteOperation::DeleteByKey(_) => OperationKind::DeleteByKey,
            WriteOperation::DeleteByItem(_) => OperationKind::DeleteByItem,
        }
    }

    pub fn key(&self) -> &CompositePrimaryKey {
        match self {
            WriteOperation::Insert(item)
            | WriteOperation::Clobber(item)
            | WriteOperation::DeleteByItem(item) => &item.key,
            WriteOperation::Update { new_item, .. } => &new_item.key,
            WriteOperation::DeleteByKey(key) => key,
        }
    }

    /// The item that will be stored, if this operation stores one.
    pub fn stored_item(&self) -> Option<&EncodedItem> {
        match self {
            WriteOperation::Insert(item) | WriteOperation::Clobber(item) => Some(item),
            WriteOperation::Update { new_item, .. } => Some(new_item),
            WriteOperation::DeleteByKey(_) | WriteOperation::DeleteByItem(_) => None,
        }
    }

    /// Prepare the wire form for a table using `key_attributes`.
    pub fn to_request(&self, key_attributes: &KeyAttributes) -> WriteRequest {
        WriteRequest {
            kind: self.kind(),
            key: self.key().clone(),
            condition: condition_for(self, key_attributes),
            item: self
                .stored_item()
                .map(|item| item.to_document(key_attributes)),
        }
    }
}

/// A write as submitted to storage: kind, key, precondition and the full
/// document to store (absent for deletes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteRequest {
    pub kind: OperationKind,
    pub key: CompositePrimaryKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<ConditionExpr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<Value>,
}

impl WriteRequest {
    pub fn is_delete(&self) -> bool {
        matches!(
            self.kind,
            OperationKind::DeleteByKey | OperationKind::DeleteByItem
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn profile() -> TypedDatabaseItem<Value> {
        TypedDatabaseItem::new(
            CompositePrimaryKey::new("user#1", "profile"),
            json!({"name": "Alice"}),
        )
    }

    #[test]
    fn test_update_restamps_new_item() {
        let existing = profile();
        let mut new_item = existing.clone();
        new_item.payload = json!({"name": "Alicia"});

        let op = WriteOperation::update(&new_item, &existing).unwrap();
        let stored = op.stored_item().unwrap();
        assert_eq!(stored.row_status.row_version, 2);
        assert_eq!(stored.attributes["name"], "Alicia");
        assert_eq!(op.kind(), OperationKind::Update);
    }

    #[test]
    fn test_request_for_insert() {
        let op = WriteOperation::insert(&profile()).unwrap();
        let req = op.to_request(&KeyAttributes::default());
        assert_eq!(req.kind, OperationKind::Insert);
        assert!(req.condition.is_some());
        let doc = req.item.unwrap();
        assert_eq!(doc["PK"], "user#1");
        assert_eq!(doc["RowVersion"], 1);
    }

    #[test]
    fn test_request_for_delete_has_no_item() {
        let op = WriteOperation::delete_by_key(CompositePrimaryKey::new("a", "b"));
        let req = op.to_request(&KeyAttributes::default());
        assert!(req.is_delete());
        assert!(req.item.is_none());
        assert!(req.condition.is_none());
        assert_eq!(op.key(), &CompositePrimaryKey::new("a", "b"));
    }

    #[test]
    fn test_request_wire_shape() {
        let op = WriteOperation::delete_existing(&profile()).unwrap();
        let wire = serde_json::to_value(op.to_request(&KeyAttributes::default())).unwrap();
        assert_eq!(wire["kind"], "delete_by_item");
        assert_eq!(wire["key"]["partition_key"], "user#1");
        assert!(wire.get("item").is_none());
        assert!(wire["condition"].is_object());
    }
}
