//! Preconditions for each kind of write.
//!
//! | operation        | precondition                                   |
//! |------------------|------------------------------------------------|
//! | `Insert`         | neither key attribute exists                   |
//! | `Clobber`        | none                                           |
//! | `Update`         | stored `RowVersion` and `CreateDate` match     |
//! | `DeleteByKey`    | none                                           |
//! | `DeleteByItem`   | stored `RowVersion` and `CreateDate` match     |

use serde_json::Value;

use crate::codec::{EncodedItem, format_timestamp};
use crate::error::{CodecError, Result};
use crate::types::{CREATE_DATE_ATTRIBUTE, KeyAttributes, ROW_VERSION_ATTRIBUTE};

use super::expression::ConditionExpr;
use super::operation::WriteOperation;

/// The condition the storage engine must re-check atomically when applying `op`.
pub fn condition_for(op: &WriteOperation, key_attributes: &KeyAttributes) -> Option<ConditionExpr> {
    match op {
        WriteOperation::Insert(_) => Some(key_absent(key_attributes)),
        WriteOperation::Clobber(_) | WriteOperation::DeleteByKey(_) => None,
        WriteOperation::Update { existing, .. } | WriteOperation::DeleteByItem(existing) => {
            Some(row_unchanged(existing))
        }
    }
}

/// `attribute_not_exists (pk) AND attribute_not_exists (sk)`
pub fn key_absent(key_attributes: &KeyAttributes) -> ConditionExpr {
    ConditionExpr::and(vec![
        ConditionExpr::attribute_not_exists(key_attributes.partition_key.clone()),
        ConditionExpr::attribute_not_exists(key_attributes.sort_key.clone()),
    ])
}

/// `RowVersion = :version AND CreateDate = :createDate` for the row as it was read.
pub fn row_unchanged(existing: &EncodedItem) -> ConditionExpr {
    ConditionExpr::and(vec![
        ConditionExpr::eq(
            ConditionExpr::attr(ROW_VERSION_ATTRIBUTE),
            ConditionExpr::literal(Value::from(existing.row_status.row_version)),
        ),
        ConditionExpr::eq(
            ConditionExpr::attr(CREATE_DATE_ATTRIBUTE),
            ConditionExpr::literal(format_timestamp(&existing.create_date)),
        ),
    ])
}

/// Stamp `new_item` as the successor of `existing`: version + 1, fresh
/// last-updated date, original create date.
pub(crate) fn successor_of(mut new_item: EncodedItem, existing: &EncodedItem) -> Result<EncodedItem> {
    if new_item.key != existing.key {
        return Err(CodecError::unexpected(format!(
            "update changes the key from ({}, {}) to ({}, {})",
            existing.key.partition_key,
            existing.key.sort_key,
            new_item.key.partition_key,
            new_item.key.sort_key
        ))
        .into());
    }
    new_item.row_status = existing.row_status.next();
    new_item.create_date = existing.create_date;
    Ok(new_item)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_item;
    use crate::types::{CompositePrimaryKey, TypedDatabaseItem};
    use serde_json::json;

    fn item(version_bumps: usize) -> TypedDatabaseItem<Value> {
        let mut item = TypedDatabaseItem::new(
            CompositePrimaryKey::new("user#1", "profile"),
            json!({"name": "Alice"}),
        );
        for _ in 0..version_bumps {
            item = item.create_updated_item(json!({"name": "Alice"}));
        }
        item
    }

    #[test]
    fn test_insert_requires_absent_key() {
        let op = WriteOperation::insert(&item(0)).unwrap();
        let cond = condition_for(&op, &KeyAttributes::default()).unwrap();
        assert_eq!(
            cond.to_string(),
            "attribute_not_exists (PK) AND attribute_not_exists (SK)"
        );
    }

    #[test]
    fn test_insert_condition_uses_table_key_names() {
        let op = WriteOperation::insert(&item(0)).unwrap();
        let cond = condition_for(&op, &KeyAttributes::new("GSI-1-PK", "GSI-1-SK")).unwrap();
        assert!(cond.to_string().contains("GSI-1-PK"));
    }

    #[test]
    fn test_unconditional_writes() {
        let attrs = KeyAttributes::default();
        let clobber = WriteOperation::clobber(&item(0)).unwrap();
        let delete = WriteOperation::delete_by_key(CompositePrimaryKey::new("a", "b"));
        assert!(condition_for(&clobber, &attrs).is_none());
        assert!(condition_for(&delete, &attrs).is_none());
    }

    #[test]
    fn test_update_and_delete_item_match_version_and_create_date() {
        let existing = item(2);
        let attrs = KeyAttributes::default();
        let update = WriteOperation::update(&existing.create_updated_item(json!({})), &existing).unwrap();
        let delete = WriteOperation::delete_existing(&existing).unwrap();

        let update_cond = condition_for(&update, &attrs).unwrap();
        let delete_cond = condition_for(&delete, &attrs).unwrap();
        assert_eq!(update_cond, delete_cond);

        let stored = encode_item(&existing).unwrap().to_document(&attrs);
        assert!(update_cond.eval(&stored).unwrap());

        let newer = encode_item(&existing.create_updated_item(json!({})))
            .unwrap()
            .to_document(&attrs);
        assert!(!update_cond.eval(&newer).unwrap());
    }

    #[test]
    fn test_successor_takes_existing_version_plus_one() {
        let existing = encode_item(&item(4)).unwrap();
        // A caller-built item that ignores the versioning rules.
        let careless = encode_item(&item(0)).unwrap();
        let next = successor_of(careless, &existing).unwrap();
        assert_eq!(next.row_status.row_version, 6);
        assert_eq!(next.create_date, existing.create_date);
    }

    #[test]
    fn test_successor_rejects_key_change() {
        let existing = encode_item(&item(0)).unwrap();
        let mut moved = existing.clone();
        moved.key.sort_key = "elsewhere".to_string();
        assert!(successor_of(moved, &existing).is_err());
    }
}
