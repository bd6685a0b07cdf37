//! In-memory table engine and secondary-index sync.

pub mod engine;
pub mod index;

pub use engine::{InMemoryTable, InMemoryTableBuilder, MutationEvent, SortComparator};
pub use index::{
    AttributeIndexProjection, InMemoryTableWithIndex, InMemoryTableWithIndexBuilder,
    IndexProjection,
};
