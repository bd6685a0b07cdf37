//! Secondary-index sync for the in-memory engine.
//!
//! Writes go through two phases. The main-table batch commits first; then
//! each index applies the operations its projection derives from the
//! committed [`MutationEvent`]s. Indexes are separate atomicity domains: a
//! failure in phase two is reported but the main table is never rolled back.
//!
//! Both phases of one write run under a per-table pipeline lock, so index
//! tables see main-table commits in commit order.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use futures::lock::Mutex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::operation::WriteOperation;
use crate::api::query::{QueryInput, QueryPage};
use crate::api::table::CompositePrimaryKeyTable;
use crate::api::transaction::{TransactionExecutor, WriteTransaction};
use crate::codec::EncodedItem;
use crate::error::{CodecError, IndexError, IndexFailure, Result};
use crate::types::{CompositePrimaryKey, KeyAttributes};

use super::engine::{InMemoryTable, MutationEvent};

/// Maps main-table mutations to writes against one index table.
///
/// Implementations must be pure: the same event always yields the same
/// operations.
pub trait IndexProjection: Send + Sync {
    /// Name of the index table.
    fn name(&self) -> &str;

    /// Key attribute names used by the index table.
    fn key_attributes(&self) -> KeyAttributes {
        KeyAttributes::default()
    }

    fn on_insert(&self, item: &EncodedItem) -> Result<Vec<WriteOperation>>;

    fn on_clobber(
        &self,
        item: &EncodedItem,
        replaced: Option<&EncodedItem>,
    ) -> Result<Vec<WriteOperation>>;

    fn on_update(&self, new_item: &EncodedItem, existing: &EncodedItem) -> Result<Vec<WriteOperation>>;

    /// Called for both delete-by-key and delete-by-item. `removed` is the
    /// item that was stored, if any.
    fn on_delete(
        &self,
        key: &CompositePrimaryKey,
        removed: Option<&EncodedItem>,
    ) -> Result<Vec<WriteOperation>>;

    fn project(&self, event: &MutationEvent) -> Result<Vec<WriteOperation>> {
        match event {
            MutationEvent::Insert { item } => self.on_insert(item),
            MutationEvent::Clobber { item, replaced } => self.on_clobber(item, replaced.as_ref()),
            MutationEvent::Update { new_item, existing } => self.on_update(new_item, existing),
            MutationEvent::Delete { key, removed } => self.on_delete(key, removed.as_ref()),
        }
    }
}

// ---------------------------------------------------------------------------
// AttributeIndexProjection
// ---------------------------------------------------------------------------

/// A sparse index keyed on a payload attribute.
///
/// The index partition key is the value of `partition_attribute`. The index
/// sort key is the value of `sort_attribute` when one is set, or
/// `"<main pk>#<main sk>"` otherwise. Items without the attributes are not
/// indexed. Index entries carry the main item's attributes and metadata.
#[derive(Debug, Clone)]
pub struct AttributeIndexProjection {
    name: String,
    key_attributes: KeyAttributes,
    partition_attribute: String,
    sort_attribute: Option<String>,
}

impl AttributeIndexProjection {
    pub fn new(name: impl Into<String>, partition_attribute: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_attributes: KeyAttributes::default(),
            partition_attribute: partition_attribute.into(),
            sort_attribute: None,
        }
    }

    pub fn sort_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.sort_attribute = Some(attribute.into());
        self
    }

    pub fn with_key_attributes(mut self, key_attributes: KeyAttributes) -> Self {
        self.key_attributes = key_attributes;
        self
    }

    /// The index key for `item`, or `None` if the item is not indexed.
    pub fn index_key(&self, item: &EncodedItem) -> Result<Option<CompositePrimaryKey>> {
        let Some(partition_key) = scalar_attribute(item, &self.partition_attribute)? else {
            return Ok(None);
        };
        let sort_key = match &self.sort_attribute {
            Some(attribute) => match scalar_attribute(item, attribute)? {
                Some(value) => value,
                None => return Ok(None),
            },
            None => format!("{}#{}", item.key.partition_key, item.key.sort_key),
        };
        Ok(Some(CompositePrimaryKey::new(partition_key, sort_key)))
    }

    fn index_entry(&self, item: &EncodedItem, key: CompositePrimaryKey) -> EncodedItem {
        EncodedItem {
            key,
            ..item.clone()
        }
    }

    /// Remove the stale entry if the key moved, then write the current one.
    fn replace(&self, item: &EncodedItem, previous: Option<&EncodedItem>) -> Result<Vec<WriteOperation>> {
        let new_key = self.index_key(item)?;
        let old_key = match previous {
            Some(previous) => self.index_key(previous)?,
            None => None,
        };

        let mut ops = Vec::new();
        if let Some(old_key) = old_key
            && new_key.as_ref() != Some(&old_key)
        {
            ops.push(WriteOperation::delete_by_key(old_key));
        }
        if let Some(new_key) = new_key {
            ops.push(WriteOperation::Clobber(self.index_entry(item, new_key)));
        }
        Ok(ops)
    }
}

impl IndexProjection for AttributeIndexProjection {
    fn name(&self) -> &str {
        &self.name
    }

    fn key_attributes(&self) -> KeyAttributes {
        self.key_attributes.clone()
    }

    fn on_insert(&self, item: &EncodedItem) -> Result<Vec<WriteOperation>> {
        self.replace(item, None)
    }

    fn on_clobber(
        &self,
        item: &EncodedItem,
        replaced: Option<&EncodedItem>,
    ) -> Result<Vec<WriteOperation>> {
        self.replace(item, replaced)
    }

    fn on_update(&self, new_item: &EncodedItem, existing: &EncodedItem) -> Result<Vec<WriteOperation>> {
        self.replace(new_item, Some(existing))
    }

    fn on_delete(
        &self,
        _key: &CompositePrimaryKey,
        removed: Option<&EncodedItem>,
    ) -> Result<Vec<WriteOperation>> {
        let Some(removed) = removed else {
            return Ok(Vec::new());
        };
        Ok(self
            .index_key(removed)?
            .map(WriteOperation::delete_by_key)
            .into_iter()
            .collect())
    }
}

/// Strings are used as-is and numbers and booleans are rendered. Missing or
/// null means "not indexed"; arrays and objects are an error.
fn scalar_attribute(item: &EncodedItem, attribute: &str) -> Result<Option<String>> {
    match item.attributes.get(attribute) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(_) => Err(CodecError::unexpected(format!(
            "index attribute '{attribute}' must be a scalar"
        ))
        .into()),
    }
}

// ---------------------------------------------------------------------------
// InMemoryTableWithIndex
// ---------------------------------------------------------------------------

struct IndexBinding {
    projection: Arc<dyn IndexProjection>,
    table: InMemoryTable,
}

impl IndexBinding {
    /// Apply this index's share of `events`, in event order, stopping at the
    /// first failure.
    fn apply_events(&self, events: &[MutationEvent]) -> Result<usize> {
        let mut applied = 0;
        for event in events {
            for op in self.projection.project(event)? {
                self.table.apply_single(&op)?;
                applied += 1;
            }
        }
        Ok(applied)
    }
}

/// A main [`InMemoryTable`] whose writes are projected onto index tables.
#[derive(Clone)]
pub struct InMemoryTableWithIndex {
    main: InMemoryTable,
    indexes: Arc<Vec<IndexBinding>>,
    /// Held from the main commit until index sync finishes.
    pipeline: Arc<Mutex<()>>,
}

impl InMemoryTableWithIndex {
    pub fn builder(main: InMemoryTable) -> InMemoryTableWithIndexBuilder {
        InMemoryTableWithIndexBuilder {
            main,
            indexes: Vec::new(),
        }
    }

    pub fn main_table(&self) -> &InMemoryTable {
        &self.main
    }

    /// The index table registered under `name`.
    pub fn index_table(&self, name: &str) -> Option<&InMemoryTable> {
        self.indexes
            .iter()
            .find(|binding| binding.projection.name() == name)
            .map(|binding| &binding.table)
    }

    pub fn index_names(&self) -> Vec<&str> {
        self.indexes
            .iter()
            .map(|binding| binding.projection.name())
            .collect()
    }

    /// Phase two: run every index concurrently and collect all failures.
    async fn sync_indexes(&self, events: &[MutationEvent]) -> Result<()> {
        let tasks = self.indexes.iter().map(|binding| async move {
            binding
                .apply_events(events)
                .map_err(|e| IndexFailure {
                    index: binding.projection.name().to_string(),
                    reason: e.to_string(),
                })
        });

        let mut failures = Vec::new();
        for (binding, outcome) in self.indexes.iter().zip(join_all(tasks).await) {
            match outcome {
                Ok(applied) => {
                    debug!(index = %binding.projection.name(), applied, "index synced");
                }
                Err(failure) => {
                    warn!(index = %failure.index, reason = %failure.reason, "index projection failed");
                    failures.push(failure);
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(IndexError::ProjectionFailed { failures }.into())
        }
    }
}

/// Builder for an [`InMemoryTableWithIndex`].
pub struct InMemoryTableWithIndexBuilder {
    main: InMemoryTable,
    indexes: Vec<Arc<dyn IndexProjection>>,
}

impl InMemoryTableWithIndexBuilder {
    /// Register an index. Its table is created empty, named after the projection.
    pub fn index(mut self, projection: impl IndexProjection + 'static) -> Self {
        self.indexes.push(Arc::new(projection));
        self
    }

    pub fn build(self) -> InMemoryTableWithIndex {
        let indexes = self
            .indexes
            .into_iter()
            .map(|projection| IndexBinding {
                table: InMemoryTable::builder(projection.name())
                    .key_attributes(projection.key_attributes())
                    .build(),
                projection,
            })
            .collect();
        InMemoryTableWithIndex {
            main: self.main,
            indexes: Arc::new(indexes),
            pipeline: Arc::new(Mutex::new(())),
        }
    }
}

#[async_trait]
impl TransactionExecutor for InMemoryTableWithIndex {
    async fn execute(&self, transaction: WriteTransaction) -> Result<()> {
        let _pipeline = self.pipeline.lock().await;
        let events = self.main.apply_batch(transaction.operations())?;
        self.sync_indexes(&events).await
    }
}

#[async_trait]
impl CompositePrimaryKeyTable for InMemoryTableWithIndex {
    async fn apply(&self, op: WriteOperation) -> Result<()> {
        let _pipeline = self.pipeline.lock().await;
        let event = self.main.apply_single(&op)?;
        self.sync_indexes(std::slice::from_ref(&event)).await
    }

    async fn get_document(&self, key: &CompositePrimaryKey) -> Result<Option<EncodedItem>> {
        Ok(self.main.get(key))
    }

    async fn get_document_batch(&self, keys: &[CompositePrimaryKey]) -> Result<Vec<EncodedItem>> {
        Ok(self.main.get_many(keys))
    }

    async fn query_documents(&self, input: &QueryInput) -> Result<QueryPage<EncodedItem>> {
        self.main.query(input)
    }
}
