//! Memory store implementations for Oracle.

pub mod relevance;
pub mod noop;
pub mod in_memory;
pub mod file_backend;
pub mod mem0;

pub use noop::NoopStore;
pub use in_memory::InMemoryStore;
pub use file_backend::FileStore;
pub use mem0::Mem0Store;
