// Latency Benchmarking Core
//
// This crate measures how fast chat-completion endpoints start and finish
// streaming. It is transport- and UI-agnostic:
//
// - Prober: one streaming request -> one ProbeResult (first byte, total, length)
// - BatchRunner: many models, ordered results, progress sink, cooperative cancel
// - ChatTransport: the seam to the HTTP client (see firstbyte-openai)
// - export: CSV with BOM for spreadsheets
//
// Key design decisions:
// - Per-model failures are values, never errors; only batch preconditions fail `run`
// - No process-wide state: key, prompts and sinks are passed in explicitly
// - Timing uses tokio's clock so tests with a paused clock are exact

pub mod config;
pub mod error;
pub mod export;
pub mod grade;
pub mod model;
pub mod probe;
pub mod runner;
pub mod sse;
pub mod testing;
pub mod transport;

// Re-exports for convenience
pub use config::{ProbeConfig, DEFAULT_MODELS, DEFAULT_SYSTEM_PROMPT, DEFAULT_USER_PROMPT};
pub use error::{BatchError, ExportError, TransportError, ValidationError};
pub use export::{export_csv, read_csv, write_csv, ExportRow};
pub use grade::{format_millis, LatencyGrade};
pub use model::{BatchInputs, BatchResult, ModelSpec, ProbeRequest, ProbeResult};
pub use probe::Prober;
pub use runner::{
    BatchRunner, CancelSignal, CancellationFlag, ChannelSink, NeverCancel, NoProgress,
    ProgressEvent, ProgressSink,
};
pub use sse::{SseDecoder, StreamEvent};
pub use transport::{BoxedTransport, ByteStream, ChatTransport};
