//! SQLite backend for Parley.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Live feeds are driven by an in-process
//! broadcast of appended messages.

mod encode;
mod feed;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
