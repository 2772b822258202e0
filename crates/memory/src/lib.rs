//! Conversation memory: transcript, rolling summaries and user profile,
//! stored in SQLite.

pub mod error;
pub mod schema;
pub mod store;
pub mod store_sqlite;
pub mod summary;

pub use {
    error::{MemoryError, Result},
    schema::{SummaryRow, open_pool, run_migrations},
    store::MemoryStore,
    store_sqlite::SqliteMemoryStore,
    summary::{Summarizer, SummaryContext},
};
