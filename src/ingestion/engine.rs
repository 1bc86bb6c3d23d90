//! Collaborator interfaces the import pipeline drives.
//!
//! A [`DatabaseHandle`] stores named byte buffers; a [`QueryEngine`] runs SQL that can read
//! those buffers as table sources. Both are usually backed by the same database, see
//! [`super::MemoryDatabase`].

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::ImportResult;

/// Stores byte buffers under a name so the query engine can read them as files.
#[async_trait]
pub trait DatabaseHandle: Send + Sync {
    /// Register `bytes` under `name`, replacing any buffer with the same name.
    async fn register_file_buffer(&self, name: &str, bytes: Bytes) -> ImportResult<()>;

    /// Release the buffer registered under `name`.
    async fn drop_file(&self, name: &str) -> ImportResult<()>;
}

/// Executes SQL text.
#[async_trait]
pub trait QueryEngine: Send + Sync {
    /// Execute a single statement.
    async fn query(&self, sql: &str) -> ImportResult<()>;

    /// Quote `value` as a SQL string literal.
    fn literal(&self, value: &str) -> String {
        quote_literal(value)
    }
}

/// Standard SQL string literal quoting: wrap in single quotes, double embedded quotes.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
