//! Session persistence backends.
//!
//! `SqliteSessionStore` is the durable default; `MemorySessionStore` backs
//! tests and embedders that do not need suspended runs to survive the
//! process.

pub mod memory;
pub mod sqlite;

pub use memory::MemorySessionStore;
pub use sqlite::SqliteSessionStore;
