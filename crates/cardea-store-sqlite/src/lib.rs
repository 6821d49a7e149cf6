//! SQLite backend for the Cardea directory and identity provider.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! pool without blocking the async runtime. One [`SqliteStore`] implements
//! both `DirectoryStore` and `IdentityProvider`; in production they are two
//! managed services, in this backend they share one file.

mod encode;
mod schema;
mod store;

pub use store::SqliteStore;
