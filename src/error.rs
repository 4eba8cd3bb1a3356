//! Error taxonomy for the ETL pipeline.

use std::fmt;
use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EtlError>;

/// Persistence destination, used to name the sink a storage failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sink {
    Relational,
    Json,
    Csv,
}

impl fmt::Display for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Sink::Relational => "relational",
            Sink::Json => "json",
            Sink::Csv => "csv",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum EtlError {
    /// Expected table or row shape is absent; the source layout changed.
    #[error("structure error: {0}")]
    Structure(String),

    /// A cell could not be coerced to the expected type.
    #[error("format error: cannot read {raw:?} as {expected}")]
    Format { raw: String, expected: &'static str },

    /// A column that must be numeric held something else.
    #[error("type error: column {column:?} in row {row} is not numeric")]
    Type { column: String, row: usize },

    #[error("storage error in {sink} sink ({target}): {source}")]
    Storage {
        sink: Sink,
        target: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("I/O error on {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to retrieve {target}: {source}")]
    Fetch {
        target: String,
        #[source]
        source: reqwest::Error,
    },

    #[error(transparent)]
    Config(#[from] config::ConfigError),
}

impl EtlError {
    pub fn storage<E>(sink: Sink, target: impl Into<String>, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        EtlError::Storage {
            sink,
            target: target.into(),
            source: source.into(),
        }
    }

    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        EtlError::Io {
            context: context.into(),
            source,
        }
    }

    /// The sink this error came from, if it is a storage failure.
    pub fn sink(&self) -> Option<Sink> {
        match self {
            EtlError::Storage { sink, .. } => Some(*sink),
            _ => None,
        }
    }
}
