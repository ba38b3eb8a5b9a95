//! Persistence layer
//!
//! - `store`: the [`DocumentStore`] trait and typed [`Collection`] view
//! - `mongo`: MongoDB adapter and index bootstrap
//! - `memory`: in-memory store for tests and dev mode
//! - `schemas`: document shapes per collection
//! - `update`: sparse `$set` builder and update-count classification

pub mod memory;
pub mod mongo;
pub mod schemas;
pub mod store;
pub mod update;

pub use memory::MemoryStore;
pub use mongo::{IntoIndexes, MongoClient};
pub use store::{Collection, DocumentStore, UpdateCounts};
pub use update::{nothing_to_update, settle_update, SetBuilder};
