use async_trait::async_trait;
use serde::Serialize;

use crate::error::{Result, TxnError};
use crate::types::{CompositePrimaryKey, MAX_TRANSACTION_OPERATIONS, TypedDatabaseItem};

use super::operation::WriteOperation;

/// An ordered batch of writes to be applied all-or-nothing.
///
/// The transaction only holds data. It is handed by value to a
/// [`TransactionExecutor`], so it can be executed at most once.
#[derive(Debug, Default)]
pub struct WriteTransaction {
    operations: Vec<WriteOperation>,
}

impl WriteTransaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of operations currently queued.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn operations(&self) -> &[WriteOperation] {
        &self.operations
    }

    pub fn into_operations(self) -> Vec<WriteOperation> {
        self.operations
    }

    /// Queue `op`, returning the new count. Fails with `TransactionFull`
    /// once the transaction holds [`MAX_TRANSACTION_OPERATIONS`].
    pub fn append(&mut self, op: WriteOperation) -> Result<usize> {
        self.ensure_capacity()?;
        self.operations.push(op);
        Ok(self.operations.len())
    }

    /// Non-destructive: fails at execution if an item already exists at the key.
    pub fn insert_item<V: Serialize>(&mut self, item: &TypedDatabaseItem<V>) -> Result<usize> {
        self.ensure_capacity()?;
        self.append(WriteOperation::insert(item)?)
    }

    /// Destructive: overwrites whatever is stored at the key.
    pub fn clobber_item<V: Serialize>(&mut self, item: &TypedDatabaseItem<V>) -> Result<usize> {
        self.ensure_capacity()?;
        self.append(WriteOperation::clobber(item)?)
    }

    /// Fails at execution if the stored item is no longer `existing_item`.
    pub fn update_item<V: Serialize>(
        &mut self,
        new_item: &TypedDatabaseItem<V>,
        existing_item: &TypedDatabaseItem<V>,
    ) -> Result<usize> {
        self.ensure_capacity()?;
        self.append(WriteOperation::update(new_item, existing_item)?)
    }

    pub fn delete_item(&mut self, key: CompositePrimaryKey) -> Result<usize> {
        self.append(WriteOperation::delete_by_key(key))
    }

    /// Fails at execution if the stored item is no longer `existing_item`.
    pub fn delete_existing_item<V: Serialize>(
        &mut self,
        existing_item: &TypedDatabaseItem<V>,
    ) -> Result<usize> {
        self.ensure_capacity()?;
        self.append(WriteOperation::delete_existing(existing_item)?)
    }

    fn ensure_capacity(&self) -> Result<()> {
        if self.operations.len() >= MAX_TRANSACTION_OPERATIONS {
            return Err(TxnError::TransactionFull {
                max: MAX_TRANSACTION_OPERATIONS,
            }
            .into());
        }
        Ok(())
    }
}

/// Submits a whole [`WriteTransaction`] as one atomic batch.
///
/// On failure nothing from the batch is applied and the error is a
/// `TransactionAborted` naming the failing operation when it is known.
#[async_trait]
pub trait TransactionExecutor: Send + Sync {
    async fn execute(&self, transaction: WriteTransaction) -> Result<()>;
}
