//! A Cypher-subset query engine and HTTP/async link inferencer over a
//! SQL-backed property graph of source code.
//!
//! [`query`] lexes, parses, plans, and executes a small pattern-matching
//! query language against whatever [`store::Store`] implementation is
//! wired in. [`linker`] runs a separate, store-driven pass that discovers
//! HTTP route registrations and outbound call sites in a project's own
//! source and materializes the inferred links back into the graph as
//! Route nodes and HANDLES/HTTP_CALLS/ASYNC_CALLS edges.
//!
//! Neither subsystem owns ingestion: populating the initial Function,
//! Method, Module, and CALLS graph is the job of an external collaborator
//! (§1); this crate only reads and augments what's already there.

pub mod config;
pub mod error;
pub mod linker;
pub mod observability;
pub mod query;
pub mod store;
pub mod types;

pub use error::{LinkerError, QueryError, StoreError};
pub use query::{execute, QueryResult};
pub use store::Store;
pub use types::{BfsResult, Direction, Edge, EdgeDraft, Label, Node, NodeDraft, Project};
