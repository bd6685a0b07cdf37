//! Executing transactions against a remote store.
//!
//! The network call itself is abstracted as [`BatchSubmitter`]: one atomic
//! batch in, one [`SubmitOutcome`] out. [`RemoteTable`] prepares the batch
//! (conditions, documents) and maps the outcome onto the crate's errors.

use async_trait::async_trait;
use tracing::info;

use crate::api::operation::WriteRequest;
use crate::api::transaction::{TransactionExecutor, WriteTransaction};
use crate::error::{Error, Result, TxnError};
use crate::types::KeyAttributes;

/// Result of submitting one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Success,
    /// A precondition failed; nothing was applied. `index` names the failing
    /// request when the store reports it.
    ConditionalCheckFailed { index: Option<usize> },
    TransportError(String),
}

/// The atomic multi-item write primitive of a remote store.
#[async_trait]
pub trait BatchSubmitter: Send + Sync {
    async fn submit_batch(&self, table_name: &str, requests: Vec<WriteRequest>) -> SubmitOutcome;
}

/// A table living behind a [`BatchSubmitter`].
#[derive(Debug, Clone)]
pub struct RemoteTable<S> {
    table_name: String,
    key_attributes: KeyAttributes,
    submitter: S,
}

impl<S: BatchSubmitter> RemoteTable<S> {
    pub fn new(table_name: impl Into<String>, submitter: S) -> Self {
        Self {
            table_name: table_name.into(),
            key_attributes: KeyAttributes::default(),
            submitter,
        }
    }

    pub fn with_key_attributes(mut self, key_attributes: KeyAttributes) -> Self {
        self.key_attributes = key_attributes;
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn submitter(&self) -> &S {
        &self.submitter
    }
}

#[async_trait]
impl<S: BatchSubmitter> TransactionExecutor for RemoteTable<S> {
    async fn execute(&self, transaction: WriteTransaction) -> Result<()> {
        if transaction.is_empty() {
            return Ok(());
        }
        let requests: Vec<WriteRequest> = transaction
            .operations()
            .iter()
            .map(|op| op.to_request(&self.key_attributes))
            .collect();

        info!(table = %self.table_name, count = requests.len(), "submitting write batch");
        match self.submitter.submit_batch(&self.table_name, requests).await {
            SubmitOutcome::Success => Ok(()),
            SubmitOutcome::ConditionalCheckFailed { index } => Err(TxnError::TransactionAborted {
                index,
                reason: "conditional check failed".to_string(),
            }
            .into()),
            SubmitOutcome::TransportError(reason) => Err(Error::Transport(reason)),
        }
    }
}
