//! Schema-driven REST backend over append-only CSV files.
//!
//! Each collection lives in one human-readable CSV file that doubles as an
//! append-only log: the latest row for an identifier is the current state,
//! older rows are history, and a version of `0` marks a deletion. On top of
//! the log sit typed per-collection schemas, a multi-collection store with
//! optimistic concurrency control, a data-driven permission evaluator, an
//! in-process change-event broker and a stateless session signer.
//!
//! The HTTP adapter in [`server`] (feature `server`) composes all of the
//! above into a REST + SSE service; the core never depends on it.

mod logging;

pub mod auth;
pub mod broker;
pub mod store;

#[cfg(feature = "server")]
pub mod server;

pub use broker::{Action, Broker, Event};
pub use store::{Error, FieldSchema, FieldType, Resource, Row, RowLog, Schema, Store, Value};
