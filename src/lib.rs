//! Table ETL: pull one data table out of an HTML page, normalise a numeric
//! column, and load the result into SQLite, a JSON snapshot and a CSV
//! snapshot, with a timestamped audit log of every phase.

pub mod audit;
pub mod config;
pub mod db;
pub mod error;
pub mod fetch;
pub mod parser;
pub mod pipeline;
pub mod records;
pub mod sinks;
pub mod transform;

pub use error::{EtlError, Result};
pub use pipeline::{Phase, Pipeline, RunReport};
pub use records::{RecordSet, Value};
