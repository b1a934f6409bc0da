pub mod filesystem;
pub mod memory;
pub mod sqlite;

pub use filesystem::FilesystemBackend;
pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

pub use crate::{Record, RecordStore, StoreError, StoreResult, UpdateExpression};
