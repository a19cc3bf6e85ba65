//! Error types for the bucket resizer.
//!
//! Errors are split in two tiers. [`PipelineError`] aborts the whole run and
//! maps to a non-zero exit code; [`ItemError`] is scoped to one object, gets
//! logged, and the scan moves on to the next object.

use thiserror::Error;

/// Result type for fatal pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that terminate the run.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Configuration could not be loaded or is out of range
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Credentials could not be loaded or the storage client could not be built
    #[error("Failed to create storage client: {0}")]
    Client(#[source] StorageError),

    /// Listing the bucket failed with something other than end-of-listing
    #[error("Error iterating bucket: {0}")]
    Listing(#[source] StorageError),
}

/// Errors scoped to a single object. The object is skipped.
#[derive(Error, Debug)]
pub enum ItemError {
    #[error("Error reading {name}: {source}")]
    Read {
        name: String,
        #[source]
        source: StorageError,
    },

    #[error("Error decoding {name}: {source}")]
    Decode {
        name: String,
        #[source]
        source: image::ImageError,
    },

    #[error("Error encoding {name}: {source}")]
    Encode {
        name: String,
        #[source]
        source: image::ImageError,
    },

    #[error("Error closing writer for {name}: {source}")]
    Write {
        name: String,
        #[source]
        source: StorageError,
    },
}

impl ItemError {
    /// Name of the object the failure belongs to
    pub fn object_name(&self) -> &str {
        match self {
            ItemError::Read { name, .. }
            | ItemError::Decode { name, .. }
            | ItemError::Encode { name, .. }
            | ItemError::Write { name, .. } => name,
        }
    }

    /// Short stage label used as a structured log field
    pub fn stage(&self) -> &'static str {
        match self {
            ItemError::Read { .. } => "read",
            ItemError::Decode { .. } => "decode",
            ItemError::Encode { .. } => "encode",
            ItemError::Write { .. } => "write",
        }
    }
}

/// Storage backend errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("object not found: {name}")]
    NotFound { name: String },

    #[error("access denied ({status}): {body}")]
    Forbidden { status: u16, body: String },

    #[error("invalid credentials: {0}")]
    Credentials(String),

    #[error("unexpected status {status}: {body}")]
    Http { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        StorageError::Transport(err.to_string())
    }
}

/// Configuration errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}
