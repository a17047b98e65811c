use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("CSV read failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Core(#[from] rdw_core::EtlError),
}

impl PipelineError {
    /// Whether the underlying failure is a per-batch source format mismatch,
    /// which is fatal for that source's extraction.
    pub fn is_source_format(&self) -> bool {
        matches!(self, PipelineError::Core(rdw_core::EtlError::SourceFormat { .. }))
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
