// Error types for probes, batches and export
//
// Per-model failures never surface as errors from the runner; they are folded
// into a failed ProbeResult. Only batch preconditions (ValidationError) escape
// BatchRunner::run.

use thiserror::Error;

/// Input rejected before any network activity
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// User prompt is empty or whitespace only
    #[error("user prompt must not be empty")]
    EmptyPrompt,

    /// API key is empty or whitespace only
    #[error("API key is required")]
    MissingApiKey,

    /// No models were selected for the batch
    #[error("at least one model must be selected")]
    NoModels,

    /// A model identifier is empty
    #[error("model identifier must not be empty")]
    EmptyModelId,

    /// Timeout budget is zero
    #[error("timeout must be positive")]
    ZeroTimeout,

    /// Concurrency limit is zero
    #[error("concurrency must be at least 1")]
    ZeroConcurrency,
}

/// Failures of the streaming transport, captured per probe
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection could not be established (DNS, refused, TLS, ...)
    #[error("connection failed: {0}")]
    Connect(String),

    /// Timeout budget exceeded
    #[error("timeout")]
    Timeout,

    /// Endpoint answered with a non-success status before streaming began
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Stream broke after it had started
    #[error("stream error: {0}")]
    Stream(String),
}

impl TransportError {
    /// Create a connect error
    pub fn connect(msg: impl Into<String>) -> Self {
        TransportError::Connect(msg.into())
    }

    /// Create a stream error
    pub fn stream(msg: impl Into<String>) -> Self {
        TransportError::Stream(msg.into())
    }

    /// Create a status error
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        TransportError::Status {
            status,
            body: body.into(),
        }
    }
}

/// Batch-level failure returned from BatchRunner::run
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    /// Shared configuration was invalid; no probe was dispatched
    #[error("invalid batch configuration: {0}")]
    Validation(#[from] ValidationError),
}

/// Errors raised while writing or reading CSV exports
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Nothing to export
    #[error("no results to export")]
    Empty,
}

/// Result type alias for export operations
pub type ExportResult<T> = std::result::Result<T, ExportError>;
