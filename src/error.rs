//! Error types for the query engine and link inferencer.
//!
//! Mirrors the separation in the store's own `contracts` module: fallible
//! boundaries return a `thiserror` enum so callers can match on failure
//! kind, while orchestration code further up (binaries, service handlers)
//! collapses everything into `anyhow::Result`.

use thiserror::Error;

/// Opaque error surfaced by a [`crate::store::Store`] implementation.
#[derive(Debug, Error)]
#[error("store error: {0}")]
pub struct StoreError(#[from] pub anyhow::Error);

/// Errors from lexing, parsing, planning, and executing a query.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("lex error at byte {pos}: {message}")]
    Lex { pos: usize, message: String },

    #[error("parse error at token {pos}: {message}")]
    Parse { pos: usize, message: String },

    #[error("plan error: {0}")]
    Plan(String),

    #[error("evaluation error: {0}")]
    Eval(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors from the HTTP/async link inference pass.
///
/// Most per-node and per-file failures (a bad regex match, an unreadable
/// source range, a stale upsert id) are non-fatal and only logged — see
/// the module docs on [`crate::linker`]. `LinkerError` covers the handful
/// of failures that abort an entire run.
#[derive(Debug, Error)]
pub enum LinkerError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("invalid linker configuration: {0}")]
    Config(String),
}
