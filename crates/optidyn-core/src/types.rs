//! Core types: composite keys, row status, typed items, key attribute names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of operations in a single write transaction.
pub const MAX_TRANSACTION_OPERATIONS: usize = 25;

/// Maximum number of keys read by one multi-key get request.
pub const MAX_BATCH_GET_KEYS: usize = 100;

pub const DEFAULT_PARTITION_KEY_ATTRIBUTE: &str = "PK";
pub const DEFAULT_SORT_KEY_ATTRIBUTE: &str = "SK";

/// Reserved document attributes written alongside every item payload.
pub const ROW_VERSION_ATTRIBUTE: &str = "RowVersion";
pub const LAST_UPDATED_DATE_ATTRIBUTE: &str = "LastUpdatedDate";
pub const CREATE_DATE_ATTRIBUTE: &str = "CreateDate";
pub const ROW_TYPE_ATTRIBUTE: &str = "RowType";

/// Partition key plus sort key. Together they identify one item in a table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CompositePrimaryKey {
    pub partition_key: String,
    pub sort_key: String,
}

impl CompositePrimaryKey {
    pub fn new(partition_key: impl Into<String>, sort_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            sort_key: sort_key.into(),
        }
    }
}

/// The attribute names a table stores its key under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyAttributes {
    pub partition_key: String,
    pub sort_key: String,
}

impl KeyAttributes {
    pub fn new(partition_key: impl Into<String>, sort_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            sort_key: sort_key.into(),
        }
    }
}

impl Default for KeyAttributes {
    fn default() -> Self {
        Self::new(DEFAULT_PARTITION_KEY_ATTRIBUTE, DEFAULT_SORT_KEY_ATTRIBUTE)
    }
}

/// Optimistic-lock token carried by every stored row.
///
/// Starts at version 1; every successful update produces `next()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowStatus {
    pub row_version: u64,
    pub last_updated_date: DateTime<Utc>,
}

impl RowStatus {
    pub fn new() -> Self {
        Self {
            row_version: 1,
            last_updated_date: Utc::now(),
        }
    }

    /// The status of the row after one more successful update.
    pub fn next(&self) -> Self {
        Self {
            row_version: self.row_version + 1,
            last_updated_date: Utc::now(),
        }
    }
}

impl Default for RowStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// A versioned item with a caller-defined payload.
///
/// `row_type` is the discriminator written to storage so heterogeneous
/// partitions can be decoded through a
/// [`PolymorphicDecoder`](crate::codec::PolymorphicDecoder).
#[derive(Debug, Clone, PartialEq)]
pub struct TypedDatabaseItem<V> {
    pub key: CompositePrimaryKey,
    pub row_status: RowStatus,
    pub create_date: DateTime<Utc>,
    pub row_type: String,
    pub payload: V,
}

impl<V> TypedDatabaseItem<V> {
    /// A brand new item at version 1, typed by the short name of `V`.
    pub fn new(key: CompositePrimaryKey, payload: V) -> Self {
        let now = Utc::now();
        Self {
            key,
            row_status: RowStatus {
                row_version: 1,
                last_updated_date: now,
            },
            create_date: now,
            row_type: short_type_name::<V>().to_string(),
            payload,
        }
    }

    pub fn with_row_type(mut self, row_type: impl Into<String>) -> Self {
        self.row_type = row_type.into();
        self
    }

    /// The successor of this item carrying `payload`: same key, same create
    /// date, next row status.
    pub fn create_updated_item(&self, payload: V) -> Self {
        Self {
            key: self.key.clone(),
            row_status: self.row_status.next(),
            create_date: self.create_date,
            row_type: self.row_type.clone(),
            payload,
        }
    }
}

/// `my_crate::model::Order` -> `Order`. Generic arguments are kept.
fn short_type_name<V>() -> &'static str {
    let full = std::any::type_name::<V>();
    let base = full.split('<').next().unwrap_or(full);
    match base.rfind("::") {
        Some(pos) => &full[pos + 2..],
        None => full,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Order;

    #[test]
    fn test_new_item_starts_at_version_one() {
        let item = TypedDatabaseItem::new(CompositePrimaryKey::new("user#1", "profile"), 7u32);
        assert_eq!(item.row_status.row_version, 1);
        assert_eq!(item.row_status.last_updated_date, item.create_date);
    }

    #[test]
    fn test_create_updated_item_increments_version() {
        let item = TypedDatabaseItem::new(CompositePrimaryKey::new("a", "b"), "v1".to_string());
        let updated = item.create_updated_item("v2".to_string());
        assert_eq!(updated.row_status.row_version, 2);
        assert_eq!(updated.create_date, item.create_date);
        assert_eq!(updated.key, item.key);
        assert_eq!(updated.payload, "v2");
    }

    #[test]
    fn test_row_type_defaults_to_short_type_name() {
        let item = TypedDatabaseItem::new(CompositePrimaryKey::new("a", "b"), Order);
        assert_eq!(item.row_type, "Order");

        let item = item.with_row_type("OrderV2");
        assert_eq!(item.row_type, "OrderV2");
    }

    #[test]
    fn test_key_ordering_is_partition_then_sort() {
        let a = CompositePrimaryKey::new("a", "z");
        let b = CompositePrimaryKey::new("b", "a");
        assert!(a < b);
        assert!(CompositePrimaryKey::new("a", "1") < CompositePrimaryKey::new("a", "2"));
    }

    #[test]
    fn test_default_key_attributes() {
        let attrs = KeyAttributes::default();
        assert_eq!(attrs.partition_key, "PK");
        assert_eq!(attrs.sort_key, "SK");
    }
}
