// Core modules implementing columns, tables, text ingestion/output, and binary records.
pub mod column;
pub mod error;
pub mod ingest;
pub mod record;
pub mod render;
pub mod sampler;
pub mod scalar;
pub mod table;
