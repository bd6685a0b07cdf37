//! The table abstraction callers program against.
//!
//! Implementors supply three primitives (apply one write, fetch one
//! document, query one page). Everything typed is layered on top.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::codec::{EncodedItem, PolymorphicDecoder};
use crate::error::Result;
use crate::types::{CompositePrimaryKey, MAX_BATCH_GET_KEYS, TypedDatabaseItem};

use super::operation::WriteOperation;
use super::query::{QueryInput, QueryPage};
use super::transaction::TransactionExecutor;

/// A DynamoDB-style table keyed by (partition key, sort key) with
/// optimistic-concurrency writes.
#[async_trait]
pub trait CompositePrimaryKeyTable: TransactionExecutor {
    /// Apply a single write, re-checking its precondition atomically.
    async fn apply(&self, op: WriteOperation) -> Result<()>;

    async fn get_document(&self, key: &CompositePrimaryKey) -> Result<Option<EncodedItem>>;

    async fn query_documents(&self, input: &QueryInput) -> Result<QueryPage<EncodedItem>>;

    /// One multi-key get request of at most [`MAX_BATCH_GET_KEYS`] keys.
    /// Missing keys are skipped. Tables that can read several keys at once
    /// override this; the default reads them one at a time.
    async fn get_document_batch(&self, keys: &[CompositePrimaryKey]) -> Result<Vec<EncodedItem>> {
        let mut found = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(doc) = self.get_document(key).await? {
                found.push(doc);
            }
        }
        Ok(found)
    }

    // -- typed writes ------------------------------------------------------

    /// Fails with `ConditionalCheckFailed` if the key is already taken.
    async fn insert_item<V: Serialize + Sync>(&self, item: &TypedDatabaseItem<V>) -> Result<()> {
        let op = WriteOperation::insert(item)?;
        self.apply(op).await
    }

    async fn clobber_item<V: Serialize + Sync>(&self, item: &TypedDatabaseItem<V>) -> Result<()> {
        let op = WriteOperation::clobber(item)?;
        self.apply(op).await
    }

    /// Fails with `ConditionalCheckFailed` if the stored row is no longer
    /// `existing_item` (different version or create date, or gone).
    async fn update_item<V: Serialize + Sync>(
        &self,
        new_item: &TypedDatabaseItem<V>,
        existing_item: &TypedDatabaseItem<V>,
    ) -> Result<()> {
        let op = WriteOperation::update(new_item, existing_item)?;
        self.apply(op).await
    }

    /// Succeeds whether or not the key exists.
    async fn delete_item(&self, key: CompositePrimaryKey) -> Result<()> {
        self.apply(WriteOperation::delete_by_key(key)).await
    }

    async fn delete_existing_item<V: Serialize + Sync>(
        &self,
        existing_item: &TypedDatabaseItem<V>,
    ) -> Result<()> {
        let op = WriteOperation::delete_existing(existing_item)?;
        self.apply(op).await
    }

    // -- typed reads -------------------------------------------------------

    async fn get_item<V: DeserializeOwned + Send>(
        &self,
        key: &CompositePrimaryKey,
    ) -> Result<Option<TypedDatabaseItem<V>>> {
        match self.get_document(key).await? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    /// Fetch any number of keys, split into requests of at most
    /// [`MAX_BATCH_GET_KEYS`]. Keys that do not exist are absent from the map.
    async fn get_documents(
        &self,
        keys: &[CompositePrimaryKey],
    ) -> Result<HashMap<CompositePrimaryKey, EncodedItem>> {
        let mut found = HashMap::with_capacity(keys.len());
        for chunk in keys.chunks(MAX_BATCH_GET_KEYS) {
            for doc in self.get_document_batch(chunk).await? {
                found.insert(doc.key.clone(), doc);
            }
        }
        Ok(found)
    }

    async fn get_items<V: DeserializeOwned + Send>(
        &self,
        keys: &[CompositePrimaryKey],
    ) -> Result<HashMap<CompositePrimaryKey, TypedDatabaseItem<V>>> {
        self.get_documents(keys)
            .await?
            .into_iter()
            .map(|(key, doc)| Ok((key, doc.decode()?)))
            .collect()
    }

    /// One page of items that all share payload type `V`.
    async fn query_page<V: DeserializeOwned + Send>(
        &self,
        input: &QueryInput,
    ) -> Result<QueryPage<TypedDatabaseItem<V>>> {
        self.query_documents(input).await?.try_map(|doc| doc.decode())
    }

    /// One page of heterogeneous items, dispatched on their row type.
    async fn query_polymorphic<T: Send>(
        &self,
        input: &QueryInput,
        decoder: &PolymorphicDecoder<T>,
    ) -> Result<QueryPage<T>> {
        self.query_documents(input)
            .await?
            .try_map(|doc| decoder.decode(&doc))
    }

    /// Follow `last_evaluated_key` until the partition is exhausted.
    async fn query_all_documents(&self, input: &QueryInput) -> Result<Vec<EncodedItem>> {
        let mut items = Vec::new();
        let mut page_input = input.clone();
        loop {
            let page = self.query_documents(&page_input).await?;
            items.extend(page.items);
            match page.last_evaluated_key {
                Some(cursor) => page_input = input.resume_from(Some(cursor)),
                None => return Ok(items),
            }
        }
    }

    async fn query_all<V: DeserializeOwned + Send>(
        &self,
        input: &QueryInput,
    ) -> Result<Vec<TypedDatabaseItem<V>>> {
        self.query_all_documents(input)
            .await?
            .iter()
            .map(EncodedItem::decode::<V>)
            .collect()
    }

    async fn query_all_polymorphic<T: Send>(
        &self,
        input: &QueryInput,
        decoder: &PolymorphicDecoder<T>,
    ) -> Result<Vec<T>> {
        self.query_all_documents(input)
            .await?
            .iter()
            .map(|doc| decoder.decode(doc))
            .collect()
    }

    // -- keys-only queries ---------------------------------------------------

    /// One page of the keys matching `input`, without decoding payloads.
    async fn query_keys(&self, input: &QueryInput) -> Result<QueryPage<CompositePrimaryKey>> {
        Ok(self.query_documents(input).await?.map(|doc| doc.key))
    }

    /// Every key matching `input`, following cursors to the end.
    async fn query_all_keys(&self, input: &QueryInput) -> Result<Vec<CompositePrimaryKey>> {
        Ok(self
            .query_all_documents(input)
            .await?
            .into_iter()
            .map(|doc| doc.key)
            .collect())
    }
}
