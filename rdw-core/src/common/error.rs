use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Per-row failure. Recoverable: the row is skipped and counted.
    #[error("invalid row, field '{field}': {message}")]
    Validation { field: String, message: String },

    /// Per-batch failure. Fatal for that source's batch.
    #[error("source format mismatch for '{src}': {message}")]
    SourceFormat { src: String, message: String },

    /// Per-table failure. Reported, does not abort sibling table loads.
    #[error("load failed for table '{table}': {message}")]
    Load { table: String, message: String },

    #[cfg(feature = "db")]
    #[error("database error: {message}")]
    Database { message: String },
}

impl EtlError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        EtlError::Validation { field: field.into(), message: message.into() }
    }

    pub fn source_format(source: impl Into<String>, message: impl Into<String>) -> Self {
        EtlError::SourceFormat { src: source.into(), message: message.into() }
    }

    pub fn load(table: impl Into<String>, message: impl Into<String>) -> Self {
        EtlError::Load { table: table.into(), message: message.into() }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
