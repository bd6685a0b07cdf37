use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::operation::{OperationKind, WriteOperation, WriteRequest};
use crate::api::query::{QueryInput, QueryPage, encode_cursor};
use crate::api::table::CompositePrimaryKeyTable;
use crate::api::transaction::{TransactionExecutor, WriteTransaction};
use crate::codec::EncodedItem;
use crate::error::{CodecError, Error, Result, TxnError, WriteError};
use crate::remote::{BatchSubmitter, SubmitOutcome};
use crate::types::{CompositePrimaryKey, KeyAttributes, MAX_TRANSACTION_OPERATIONS};

/// Orders sort keys within a partition. Byte order when none is configured.
pub type SortComparator = Arc<dyn Fn(&str, &str) -> Ordering + Send + Sync>;

/// What a committed write did, as seen by secondary-index sync.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationEvent {
    Insert {
        item: EncodedItem,
    },
    Clobber {
        item: EncodedItem,
        replaced: Option<EncodedItem>,
    },
    Update {
        new_item: EncodedItem,
        existing: EncodedItem,
    },
    Delete {
        key: CompositePrimaryKey,
        removed: Option<EncodedItem>,
    },
}

impl MutationEvent {
    pub fn key(&self) -> &CompositePrimaryKey {
        match self {
            MutationEvent::Insert { item } | MutationEvent::Clobber { item, .. } => &item.key,
            MutationEvent::Update { new_item, .. } => &new_item.key,
            MutationEvent::Delete { key, .. } => key,
        }
    }
}

// ---------------------------------------------------------------------------
// Table state
// ---------------------------------------------------------------------------

#[derive(Default)]
struct TableState {
    partitions: HashMap<String, BTreeMap<String, EncodedItem>>,
}

impl TableState {
    fn get(&self, key: &CompositePrimaryKey) -> Option<&EncodedItem> {
        self.partitions
            .get(&key.partition_key)
            .and_then(|partition| partition.get(&key.sort_key))
    }

    fn put(&mut self, item: EncodedItem) -> Option<EncodedItem> {
        self.partitions
            .entry(item.key.partition_key.clone())
            .or_default()
            .insert(item.key.sort_key.clone(), item)
    }

    fn remove(&mut self, key: &CompositePrimaryKey) -> Option<EncodedItem> {
        let partition = self.partitions.get_mut(&key.partition_key)?;
        let removed = partition.remove(&key.sort_key);
        if partition.is_empty() {
            self.partitions.remove(&key.partition_key);
        }
        removed
    }
}

/// A request whose precondition held against the pre-batch state.
struct StagedWrite {
    kind: OperationKind,
    key: CompositePrimaryKey,
    item: Option<EncodedItem>,
    checked: Option<EncodedItem>,
}

// ---------------------------------------------------------------------------
// InMemoryTable
// ---------------------------------------------------------------------------

struct TableInner {
    name: String,
    key_attributes: KeyAttributes,
    comparator: Option<SortComparator>,
    state: RwLock<TableState>,
    /// Serializes read-check-write sequences (single-writer model).
    writer_lock: Mutex<()>,
}

/// A single table held in memory, with the same conditional-write semantics
/// as the remote store.
///
/// `InMemoryTable` is cheaply clonable (`Arc`-based) and `Send + Sync`.
#[derive(Clone)]
pub struct InMemoryTable {
    inner: Arc<TableInner>,
}

impl fmt::Debug for InMemoryTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryTable")
            .field("name", &self.inner.name)
            .field("key_attributes", &self.inner.key_attributes)
            .finish_non_exhaustive()
    }
}

impl InMemoryTable {
    /// An empty table with default key attribute names and byte-order sort keys.
    pub fn new(name: impl Into<String>) -> Self {
        Self::builder(name).build()
    }

    pub fn builder(name: impl Into<String>) -> InMemoryTableBuilder {
        InMemoryTableBuilder::new(name.into())
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn key_attributes(&self) -> &KeyAttributes {
        &self.inner.key_attributes
    }

    /// Point lookup.
    pub fn get(&self, key: &CompositePrimaryKey) -> Option<EncodedItem> {
        self.inner.state.read().get(key).cloned()
    }

    /// Point lookups under one read guard. Missing keys are skipped; found
    /// items come back in the order of `keys`.
    pub fn get_many(&self, keys: &[CompositePrimaryKey]) -> Vec<EncodedItem> {
        let state = self.inner.state.read();
        keys.iter()
            .filter_map(|key| state.get(key).cloned())
            .collect()
    }

    /// The stored document at `key`, with key and metadata attributes.
    pub fn document(&self, key: &CompositePrimaryKey) -> Option<Value> {
        self.get(key)
            .map(|item| item.to_document(&self.inner.key_attributes))
    }

    /// Total number of stored items.
    pub fn len(&self) -> usize {
        self.inner
            .state
            .read()
            .partitions
            .values()
            .map(BTreeMap::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.state.read().partitions.is_empty()
    }

    pub fn partition_count(&self) -> usize {
        self.inner.state.read().partitions.len()
    }

    fn compare(&self, a: &str, b: &str) -> Ordering {
        match &self.inner.comparator {
            Some(cmp) => cmp(a, b),
            None => a.cmp(b),
        }
    }

    /// Total order used for result positions and cursors: keys the
    /// comparator treats as equal fall back to byte order.
    fn scan_order(&self, a: &str, b: &str) -> Ordering {
        self.compare(a, b).then_with(|| a.cmp(b))
    }

    // -- writes ------------------------------------------------------------

    /// Apply one operation. A failed precondition is `ConditionalCheckFailed`
    /// and leaves the table unchanged.
    pub fn apply_single(&self, op: &WriteOperation) -> Result<MutationEvent> {
        let request = op.to_request(&self.inner.key_attributes);
        match self.apply_requests(std::slice::from_ref(&request)) {
            Ok(mut events) => events
                .pop()
                .ok_or_else(|| CodecError::unexpected("write produced no mutation").into()),
            Err(Error::Transaction(TxnError::TransactionAborted { .. })) => {
                Err(WriteError::ConditionalCheckFailed {
                    partition_key: request.key.partition_key,
                    sort_key: request.key.sort_key,
                }
                .into())
            }
            Err(e) => Err(e),
        }
    }

    /// Apply up to [`MAX_TRANSACTION_OPERATIONS`] operations all-or-nothing.
    pub fn apply_batch(&self, ops: &[WriteOperation]) -> Result<Vec<MutationEvent>> {
        if ops.len() > MAX_TRANSACTION_OPERATIONS {
            return Err(TxnError::TransactionFull {
                max: MAX_TRANSACTION_OPERATIONS,
            }
            .into());
        }
        let requests: Vec<WriteRequest> = ops
            .iter()
            .map(|op| op.to_request(&self.inner.key_attributes))
            .collect();
        self.apply_requests(&requests)
    }

    /// The conditional-write protocol over prepared requests.
    ///
    /// Every precondition is evaluated against the state before the batch.
    /// Only if all hold are the writes applied, in order, under a single
    /// write guard. Otherwise nothing is applied and the error names the
    /// first failing request.
    pub fn apply_requests(&self, requests: &[WriteRequest]) -> Result<Vec<MutationEvent>> {
        let _writer = self.inner.writer_lock.lock();

        let staged = {
            let state = self.inner.state.read();
            let mut staged = Vec::with_capacity(requests.len());
            for (index, request) in requests.iter().enumerate() {
                staged.push(self.check(&state, index, request)?);
            }
            staged
        };

        let mut state = self.inner.state.write();
        let events: Vec<MutationEvent> = staged
            .into_iter()
            .map(|write| commit(&mut state, write))
            .collect();
        drop(state);

        debug!(table = %self.inner.name, count = events.len(), "batch committed");
        Ok(events)
    }

    fn check(&self, state: &TableState, index: usize, request: &WriteRequest) -> Result<StagedWrite> {
        let key_attributes = &self.inner.key_attributes;
        let stored = state.get(&request.key);

        if let Some(condition) = &request.condition {
            let stored_doc = stored.map(|item| item.to_document(key_attributes));
            if !condition.eval_existing(stored_doc.as_ref())? {
                warn!(
                    table = %self.inner.name,
                    index,
                    partition_key = %request.key.partition_key,
                    sort_key = %request.key.sort_key,
                    "condition rejected"
                );
                return Err(TxnError::TransactionAborted {
                    index: Some(index),
                    reason: format!("condition '{condition}' not met"),
                }
                .into());
            }
        }

        if request.kind == OperationKind::Update && stored.is_none() {
            return Err(TxnError::TransactionAborted {
                index: Some(index),
                reason: "no existing item to update".to_string(),
            }
            .into());
        }

        let item = if request.is_delete() {
            None
        } else {
            let doc = request.item.as_ref().ok_or_else(|| {
                CodecError::unexpected(format!("{:?} request carries no item", request.kind))
            })?;
            let item = EncodedItem::from_document(doc, key_attributes)?;
            if item.key != request.key {
                return Err(CodecError::unexpected(format!(
                    "request key ({}, {}) does not match item key ({}, {})",
                    request.key.partition_key,
                    request.key.sort_key,
                    item.key.partition_key,
                    item.key.sort_key
                ))
                .into());
            }
            Some(item)
        };

        Ok(StagedWrite {
            kind: request.kind,
            key: request.key.clone(),
            item,
            checked: stored.cloned(),
        })
    }

    // -- queries -----------------------------------------------------------

    /// Run one page of `input` against this table.
    pub fn query(&self, input: &QueryInput) -> Result<QueryPage<EncodedItem>> {
        let cursor = input.validate()?;
        let state = self.inner.state.read();
        let Some(partition) = state.partitions.get(input.partition_key()) else {
            return Ok(QueryPage::empty());
        };

        let cmp = |a: &str, b: &str| self.compare(a, b);
        let mut matching: Vec<&EncodedItem> = partition
            .values()
            .filter(|item| {
                input
                    .condition()
                    .is_none_or(|cond| cond.matches_with(&item.key.sort_key, &cmp))
            })
            .collect();
        if self.inner.comparator.is_some() {
            matching.sort_by(|a, b| self.scan_order(&a.key.sort_key, &b.key.sort_key));
        }
        if !input.is_forward() {
            matching.reverse();
        }

        // Resume strictly after the cursor in scan direction.
        let start = match &cursor {
            Some(after) => {
                let past = if input.is_forward() {
                    Ordering::Greater
                } else {
                    Ordering::Less
                };
                matching
                    .iter()
                    .position(|item| self.scan_order(&item.key.sort_key, &after.sort_key) == past)
                    .unwrap_or(matching.len())
            }
            None => 0,
        };

        let remaining = &matching[start..];
        let take = input
            .limit_value()
            .map_or(remaining.len(), |limit| limit.min(remaining.len()));
        let items: Vec<EncodedItem> = remaining[..take].iter().map(|&item| item.clone()).collect();
        let last_evaluated_key = match items.last() {
            Some(last) if take < remaining.len() => Some(encode_cursor(&last.key)?),
            _ => None,
        };

        Ok(QueryPage {
            items,
            last_evaluated_key,
        })
    }
}

fn commit(state: &mut TableState, write: StagedWrite) -> MutationEvent {
    let StagedWrite {
        kind,
        key,
        item,
        checked,
    } = write;
    match item {
        Some(item) => {
            let previous = state.put(item.clone());
            match (kind, previous.or(checked)) {
                (OperationKind::Update, Some(existing)) => MutationEvent::Update {
                    new_item: item,
                    existing,
                },
                (OperationKind::Clobber, replaced) => MutationEvent::Clobber { item, replaced },
                _ => MutationEvent::Insert { item },
            }
        }
        None => MutationEvent::Delete {
            removed: state.remove(&key),
            key,
        },
    }
}

// ---------------------------------------------------------------------------
// InMemoryTableBuilder
// ---------------------------------------------------------------------------

/// Builder for an [`InMemoryTable`].
pub struct InMemoryTableBuilder {
    name: String,
    key_attributes: KeyAttributes,
    comparator: Option<SortComparator>,
}

impl InMemoryTableBuilder {
    fn new(name: String) -> Self {
        Self {
            name,
            key_attributes: KeyAttributes::default(),
            comparator: None,
        }
    }

    /// Name of the attribute holding the partition key (default `PK`).
    pub fn partition_key_attribute(mut self, name: impl Into<String>) -> Self {
        self.key_attributes.partition_key = name.into();
        self
    }

    /// Name of the attribute holding the sort key (default `SK`).
    pub fn sort_key_attribute(mut self, name: impl Into<String>) -> Self {
        self.key_attributes.sort_key = name.into();
        self
    }

    pub fn key_attributes(mut self, key_attributes: KeyAttributes) -> Self {
        self.key_attributes = key_attributes;
        self
    }

    /// Order sort keys with `cmp` instead of byte order.
    pub fn sort_comparator<F>(mut self, cmp: F) -> Self
    where
        F: Fn(&str, &str) -> Ordering + Send + Sync + 'static,
    {
        self.comparator = Some(Arc::new(cmp));
        self
    }

    pub fn build(self) -> InMemoryTable {
        debug!(
            table = %self.name,
            partition_key = %self.key_attributes.partition_key,
            sort_key = %self.key_attributes.sort_key,
            "table created"
        );
        InMemoryTable {
            inner: Arc::new(TableInner {
                name: self.name,
                key_attributes: self.key_attributes,
                comparator: self.comparator,
                state: RwLock::new(TableState::default()),
                writer_lock: Mutex::new(()),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Trait impls
// ---------------------------------------------------------------------------

#[async_trait]
impl TransactionExecutor for InMemoryTable {
    async fn execute(&self, transaction: WriteTransaction) -> Result<()> {
        self.apply_batch(transaction.operations()).map(|_| ())
    }
}

#[async_trait]
impl CompositePrimaryKeyTable for InMemoryTable {
    async fn apply(&self, op: WriteOperation) -> Result<()> {
        self.apply_single(&op).map(|_| ())
    }

    async fn get_document(&self, key: &CompositePrimaryKey) -> Result<Option<EncodedItem>> {
        Ok(self.get(key))
    }

    async fn get_document_batch(&self, keys: &[CompositePrimaryKey]) -> Result<Vec<EncodedItem>> {
        Ok(self.get_many(keys))
    }

    async fn query_documents(&self, input: &QueryInput) -> Result<QueryPage<EncodedItem>> {
        self.query(input)
    }
}

/// Lets a local table stand in for the remote batch primitive.
#[async_trait]
impl BatchSubmitter for InMemoryTable {
    async fn submit_batch(&self, table_name: &str, requests: Vec<WriteRequest>) -> SubmitOutcome {
        if table_name != self.inner.name {
            return SubmitOutcome::TransportError(format!("table '{table_name}' not found"));
        }
        if requests.len() > MAX_TRANSACTION_OPERATIONS {
            return SubmitOutcome::TransportError(format!(
                "batch of {} exceeds the maximum of {MAX_TRANSACTION_OPERATIONS} operations",
                requests.len()
            ));
        }
        match self.apply_requests(&requests) {
            Ok(_) => SubmitOutcome::Success,
            Err(Error::Transaction(TxnError::TransactionAborted { index, .. })) => {
                SubmitOutcome::ConditionalCheckFailed { index }
            }
            Err(e) => SubmitOutcome::TransportError(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypedDatabaseItem;
    use serde_json::json;

    fn item(pk: &str, sk: &str, payload: Value) -> TypedDatabaseItem<Value> {
        TypedDatabaseItem::new(CompositePrimaryKey::new(pk, sk), payload)
    }

    fn seeded(sort_keys: &[&str]) -> InMemoryTable {
        let table = InMemoryTable::new("orders");
        for sk in sort_keys {
            table
                .apply_single(&WriteOperation::insert(&item("orders#42", sk, json!({"year": sk}))).unwrap())
                .unwrap();
        }
        table
    }

    fn sort_keys(page: &QueryPage<EncodedItem>) -> Vec<&str> {
        page.items.iter().map(|i| i.key.sort_key.as_str()).collect()
    }

    #[test]
    fn test_insert_then_get() {
        let table = InMemoryTable::new("t");
        let op = WriteOperation::insert(&item("a", "1", json!({"v": 1}))).unwrap();
        let event = table.apply_single(&op).unwrap();
        assert!(matches!(event, MutationEvent::Insert { .. }));

        let stored = table.get(&CompositePrimaryKey::new("a", "1")).unwrap();
        assert_eq!(stored.attributes["v"], 1);
        assert_eq!(table.len(), 1);
        assert_eq!(table.partition_count(), 1);
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let table = InMemoryTable::new("t");
        let first = item("a", "1", json!({"v": 1}));
        table.apply_single(&WriteOperation::insert(&first).unwrap()).unwrap();

        let second = item("a", "1", json!({"v": 2}));
        let err = table
            .apply_single(&WriteOperation::insert(&second).unwrap())
            .unwrap_err();
        assert!(matches!(err, Error::Write(WriteError::ConditionalCheckFailed { .. })));

        let stored = table.get(&first.key).unwrap();
        assert_eq!(stored.attributes["v"], 1);
    }

    #[test]
    fn test_clobber_reports_replaced_item() {
        let table = InMemoryTable::new("t");
        let first = item("a", "1", json!({"v": 1}));
        table.apply_single(&WriteOperation::clobber(&first).unwrap()).unwrap();
        let event = table
            .apply_single(&WriteOperation::clobber(&item("a", "1", json!({"v": 2}))).unwrap())
            .unwrap();
        let MutationEvent::Clobber { item, replaced } = event else {
            panic!("expected clobber event");
        };
        assert_eq!(item.attributes["v"], 2);
        assert_eq!(replaced.unwrap().attributes["v"], 1);
    }

    #[test]
    fn test_update_of_missing_item_fails() {
        let table = InMemoryTable::new("t");
        let existing = item("a", "1", json!({}));
        let op = WriteOperation::update(&existing.create_updated_item(json!({})), &existing).unwrap();
        assert!(table.apply_single(&op).unwrap_err().is_conditional_check_failed());
        assert!(table.is_empty());
    }

    #[test]
    fn test_delete_by_key_is_idempotent() {
        let table = seeded(&["2021"]);
        let key = CompositePrimaryKey::new("orders#42", "2021");
        let event = table.apply_single(&WriteOperation::delete_by_key(key.clone())).unwrap();
        assert!(matches!(event, MutationEvent::Delete { removed: Some(_), .. }));
        let event = table.apply_single(&WriteOperation::delete_by_key(key)).unwrap();
        assert!(matches!(event, MutationEvent::Delete { removed: None, .. }));
        assert_eq!(table.partition_count(), 0);
    }

    #[test]
    fn test_batch_is_all_or_nothing() {
        let table = seeded(&["2021"]);
        let ops = vec![
            WriteOperation::insert(&item("orders#42", "2022", json!({}))).unwrap(),
            WriteOperation::insert(&item("orders#42", "2021", json!({}))).unwrap(),
        ];
        let err = table.apply_batch(&ops).unwrap_err();
        assert!(matches!(
            err,
            Error::Transaction(TxnError::TransactionAborted { index: Some(1), .. })
        ));
        assert!(table.get(&CompositePrimaryKey::new("orders#42", "2022")).is_none());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_batch_checks_against_pre_batch_state() {
        let table = InMemoryTable::new("t");
        let it = item("a", "1", json!({}));
        // Same key twice: the insert is checked against the empty pre-batch
        // state and the clobber then overwrites it.
        let ops = vec![
            WriteOperation::insert(&it).unwrap(),
            WriteOperation::clobber(&it).unwrap(),
        ];
        let events = table.apply_batch(&ops).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_batch_over_limit() {
        let table = InMemoryTable::new("t");
        let ops: Vec<_> = (0..26)
            .map(|n| WriteOperation::delete_by_key(CompositePrimaryKey::new("a", n.to_string())))
            .collect();
        let err = table.apply_batch(&ops).unwrap_err();
        assert!(matches!(err, Error::Transaction(TxnError::TransactionFull { max: 25 })));
    }

    #[test]
    fn test_request_with_mismatched_key_is_rejected() {
        let table = InMemoryTable::new("t");
        let mut request = WriteOperation::clobber(&item("a", "1", json!({})))
            .unwrap()
            .to_request(table.key_attributes());
        request.key = CompositePrimaryKey::new("a", "2");
        let err = table.apply_requests(&[request]).unwrap_err();
        assert!(matches!(err, Error::Codec(_)));
        assert!(table.is_empty());
    }

    #[test]
    fn test_custom_key_attribute_names() {
        let table = InMemoryTable::builder("gsi")
            .partition_key_attribute("GSI-1-PK")
            .sort_key_attribute("GSI-1-SK")
            .build();
        let it = item("a", "1", json!({"v": 1}));
        table.apply_single(&WriteOperation::insert(&it).unwrap()).unwrap();
        let doc = table.document(&it.key).unwrap();
        assert_eq!(doc["GSI-1-PK"], "a");
        assert!(doc.get("PK").is_none());
        assert!(table.apply_single(&WriteOperation::insert(&it).unwrap()).is_err());
    }

    #[test]
    fn test_query_forward_and_reverse() {
        let table = seeded(&["2022", "2021", "2023"]);
        let page = table.query(&QueryInput::new("orders#42")).unwrap();
        assert_eq!(sort_keys(&page), vec!["2021", "2022", "2023"]);
        assert!(page.last_evaluated_key.is_none());

        let page = table
            .query(&QueryInput::new("orders#42").scan_forward(false))
            .unwrap();
        assert_eq!(sort_keys(&page), vec!["2023", "2022", "2021"]);
    }

    #[test]
    fn test_query_with_sort_condition() {
        let table = seeded(&["2021", "2022", "2023", "2024"]);
        let page = table
            .query(&QueryInput::new("orders#42").sort_key_between("2022", "2023"))
            .unwrap();
        assert_eq!(sort_keys(&page), vec!["2022", "2023"]);
    }

    #[test]
    fn test_reverse_pagination_skips_toward_smaller_keys() {
        let table = seeded(&["2021", "2022", "2023"]);
        let input = QueryInput::new("orders#42").scan_forward(false).limit(1);

        let page1 = table.query(&input).unwrap();
        assert_eq!(sort_keys(&page1), vec!["2023"]);

        let cursor = page1.last_evaluated_key.unwrap();
        let page2 = table
            .query(&input.clone().exclusive_start_key(cursor))
            .unwrap();
        assert_eq!(sort_keys(&page2), vec!["2022"]);
        assert!(page2.last_evaluated_key.is_some());
    }

    #[test]
    fn test_query_absent_partition_is_empty() {
        let table = seeded(&["2021"]);
        let page = table.query(&QueryInput::new("nobody").limit(5)).unwrap();
        assert!(page.items.is_empty());
        assert!(page.last_evaluated_key.is_none());
    }

    #[test]
    fn test_exact_fit_page_has_no_cursor() {
        let table = seeded(&["2021", "2022"]);
        let page = table.query(&QueryInput::new("orders#42").limit(2)).unwrap();
        assert_eq!(page.items.len(), 2);
        assert!(page.last_evaluated_key.is_none());
    }

    #[test]
    fn test_custom_comparator_orders_numerically() {
        let table = InMemoryTable::builder("t")
            .sort_comparator(|a: &str, b: &str| {
                a.parse::<u64>()
                    .unwrap_or(u64::MAX)
                    .cmp(&b.parse::<u64>().unwrap_or(u64::MAX))
            })
            .build();
        for sk in ["10", "9", "100"] {
            table
                .apply_single(&WriteOperation::insert(&item("p", sk, json!({}))).unwrap())
                .unwrap();
        }
        let page = table.query(&QueryInput::new("p").sort_key_gt("9")).unwrap();
        assert_eq!(sort_keys(&page), vec!["10", "100"]);
    }

    #[test]
    fn test_comparator_ties_page_by_byte_order() {
        // "1" and "01" are the same number, so the comparator calls them equal.
        let table = InMemoryTable::builder("t")
            .sort_comparator(|a: &str, b: &str| {
                a.parse::<u64>()
                    .unwrap_or(u64::MAX)
                    .cmp(&b.parse::<u64>().unwrap_or(u64::MAX))
            })
            .build();
        for sk in ["1", "01", "2"] {
            table
                .apply_single(&WriteOperation::insert(&item("p", sk, json!({}))).unwrap())
                .unwrap();
        }

        for forward in [true, false] {
            let input = QueryInput::new("p").limit(1).scan_forward(forward);
            let mut seen = Vec::new();
            let mut page = table.query(&input).unwrap();
            loop {
                seen.extend(page.items.iter().map(|i| i.key.sort_key.clone()));
                let Some(cursor) = page.last_evaluated_key else {
                    break;
                };
                page = table
                    .query(&input.clone().exclusive_start_key(cursor))
                    .unwrap();
            }
            let mut expected = vec!["01", "1", "2"];
            if !forward {
                expected.reverse();
            }
            assert_eq!(seen, expected);
        }
    }

    #[test]
    fn test_get_many_skips_missing_keys() {
        let table = seeded(&["2021", "2022", "2023"]);
        let keys = vec![
            CompositePrimaryKey::new("orders#42", "2023"),
            CompositePrimaryKey::new("orders#42", "1999"),
            CompositePrimaryKey::new("orders#42", "2021"),
        ];
        let found = table.get_many(&keys);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].key.sort_key, "2023");
        assert_eq!(found[1].key.sort_key, "2021");
        assert!(table.get_many(&[]).is_empty());
    }
}
