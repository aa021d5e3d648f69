//! Purpose: Typed columnar tables ingested from delimited text, plus fixed-width record datasets.
//! Exports: `core` (columns, tables, ingestion, text output, record codec) and `api`.
//! Role: Library backing the `coltab` CLI and integration tests.
//! Invariants: Core modules do no terminal I/O; progress and failures go through callbacks and `tracing`.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod api;
pub mod core;
pub mod notice;
