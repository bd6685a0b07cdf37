//! # optidyn
//!
//! A typed access layer for DynamoDB-style tables keyed by a partition key
//! and a sort key, with optimistic concurrency on every write.
//!
//! Every stored item carries a `RowVersion` and a `CreateDate`. Writes ship
//! a precondition that the store re-checks atomically:
//!
//! - `insert` fails if the key is taken;
//! - `update` and `delete_existing_item` fail if the row changed since it
//!   was read;
//! - `clobber` and `delete_item` are unconditional.
//!
//! Up to 25 writes can be grouped in a [`WriteTransaction`](api::WriteTransaction)
//! and applied all-or-nothing. [`InMemoryTable`](memory::InMemoryTable)
//! simulates the store, [`InMemoryTableWithIndex`](memory::InMemoryTableWithIndex)
//! adds secondary-index projection, and [`RemoteTable`](remote::RemoteTable)
//! forwards batches to a real store through a [`BatchSubmitter`](remote::BatchSubmitter).
//!
//! ## Quick Start
//!
//! ```no_run
//! use optidyn_core::api::{CompositePrimaryKeyTable, QueryInput};
//! use optidyn_core::memory::InMemoryTable;
//! use optidyn_core::types::{CompositePrimaryKey, TypedDatabaseItem};
//! use serde_json::json;
//!
//! # async fn run() -> optidyn_core::error::Result<()> {
//! let table = InMemoryTable::new("users");
//!
//! let profile = TypedDatabaseItem::new(
//!     CompositePrimaryKey::new("user#1", "profile"),
//!     json!({"name": "Alice"}),
//! );
//! table.insert_item(&profile).await?;
//!
//! // Updates are checked against the version that was read.
//! let updated = profile.create_updated_item(json!({"name": "Alicia"}));
//! table.update_item(&updated, &profile).await?;
//!
//! let items = table
//!     .query_all::<serde_json::Value>(&QueryInput::new("user#1"))
//!     .await?;
//! assert_eq!(items[0].row_status.row_version, 2);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod codec;
pub mod error;
pub mod memory;
pub mod remote;
pub mod types;
