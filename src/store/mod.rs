//! Persistence layer: folder hierarchy, per-run logs, and the run overview.

pub mod libsql_backend;
pub mod memory;
pub mod migrations;
pub mod traits;

pub use libsql_backend::FsStorage;
pub use memory::MemoryStorage;
pub use traits::{Folder, OverviewSink, RunLog, StorageHierarchy};
