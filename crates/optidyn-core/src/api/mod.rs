//! Public API: typed items, conditional writes, transactions and queries.

pub mod condition;
pub mod expression;
pub mod operation;
pub mod query;
pub mod table;
pub mod transaction;

pub use condition::condition_for;
pub use expression::ConditionExpr;
pub use operation::{OperationKind, WriteOperation, WriteRequest};
pub use query::{QueryInput, QueryPage, SortCondition};
pub use table::CompositePrimaryKeyTable;
pub use transaction::{TransactionExecutor, WriteTransaction};
