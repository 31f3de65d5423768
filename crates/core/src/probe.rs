// Latency Probe
//
// Issues one streaming request and measures:
// - first byte: request start -> first content-bearing chunk
// - total: request start -> end marker or connection close
//
// Every failure mode ends up inside the returned ProbeResult. The whole
// exchange (connect + stream) shares one deadline, so a stalled stream can
// not hold a probe longer than its timeout.

use chrono::Utc;
use futures::StreamExt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, instrument, warn};

use crate::error::{TransportError, ValidationError};
use crate::model::{ProbeRequest, ProbeResult};
use crate::sse::{SseDecoder, StreamEvent};
use crate::transport::{BoxedTransport, ChatTransport};

/// Error text for a stream that ended without any content chunk
pub const NO_CONTENT_ERROR: &str = "stream completed without content";

/// Runs latency probes over a transport
#[derive(Clone)]
pub struct Prober {
    transport: BoxedTransport,
}

impl Prober {
    pub fn new(transport: impl ChatTransport + 'static) -> Self {
        Self {
            transport: Arc::new(transport),
        }
    }

    /// Create a prober over an already shared transport
    pub fn from_shared(transport: BoxedTransport) -> Self {
        Self { transport }
    }

    /// Probe one model. Never fails: validation, transport and protocol
    /// errors are reported as a failed ProbeResult.
    pub async fn probe(&self, request: ProbeRequest) -> ProbeResult {
        match request.validate() {
            Ok(()) => self.measure(&request).await,
            Err(err) => rejected(&request, err),
        }
    }

    /// Like `probe`, but reports validation failures as a distinct error.
    /// No transport call is made when validation fails.
    pub async fn try_probe(&self, request: ProbeRequest) -> Result<ProbeResult, ValidationError> {
        request.validate()?;
        Ok(self.measure(&request).await)
    }

    #[instrument(skip_all, fields(model = %request.model()))]
    async fn measure(&self, request: &ProbeRequest) -> ProbeResult {
        let started_at = Utc::now();
        let start = Instant::now();
        // A timeout too large to represent as an instant means no deadline
        let deadline = start.checked_add(request.timeout());
        let mut tally = Tally::new(start);

        let outcome = self.consume(request, deadline, &mut tally).await;
        let total = start.elapsed();
        let model = request.model().clone();

        match (outcome, tally.first_byte) {
            (Ok(()), Some(first_byte)) => {
                debug!(
                    first_byte_s = first_byte.as_secs_f64(),
                    total_s = total.as_secs_f64(),
                    length = tally.length,
                    "Probe succeeded"
                );
                ProbeResult::succeeded(model, first_byte, total, tally.length, started_at)
            }
            (Ok(()), None) => {
                warn!("Stream completed without content");
                ProbeResult::failed(model, None, total, 0, NO_CONTENT_ERROR, started_at)
            }
            (Err(err), first_byte) => {
                warn!(error = %err, "Probe failed");
                ProbeResult::failed(
                    model,
                    first_byte,
                    total,
                    tally.length,
                    err.to_string(),
                    started_at,
                )
            }
        }
    }

    async fn consume(
        &self,
        request: &ProbeRequest,
        deadline: Option<Instant>,
        tally: &mut Tally,
    ) -> Result<(), ProbeFailure> {
        let mut stream = until(deadline, self.transport.open_stream(request)).await??;

        let mut decoder = SseDecoder::new();
        while let Some(chunk) = until(deadline, stream.next()).await? {
            let chunk = chunk?;
            for event in decoder.feed(&chunk) {
                if tally.apply(event)? == Flow::Done {
                    return Ok(());
                }
            }
        }

        // Connection closed without an end marker: still a normal completion
        if let Some(event) = decoder.finish() {
            tally.apply(event)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Prober {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prober").finish_non_exhaustive()
    }
}

/// Await `future`, failing with a timeout once `deadline` passes
async fn until<F: Future>(
    deadline: Option<Instant>,
    future: F,
) -> Result<F::Output, TransportError> {
    match deadline {
        Some(deadline) => timeout_at(deadline, future)
            .await
            .map_err(|_| TransportError::Timeout),
        None => Ok(future.await),
    }
}

fn rejected(request: &ProbeRequest, err: ValidationError) -> ProbeResult {
    ProbeResult::failed(
        request.model().clone(),
        None,
        Duration::ZERO,
        0,
        err.to_string(),
        Utc::now(),
    )
}

#[derive(Debug, Error)]
enum ProbeFailure {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("server error: {0}")]
    Server(String),
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Done,
}

/// Timing milestones and content length accumulated over one stream
struct Tally {
    start: Instant,
    first_byte: Option<Duration>,
    length: usize,
}

impl Tally {
    fn new(start: Instant) -> Self {
        Self {
            start,
            first_byte: None,
            length: 0,
        }
    }

    fn apply(&mut self, event: StreamEvent) -> Result<Flow, ProbeFailure> {
        match event {
            StreamEvent::Content(text) => {
                if self.first_byte.is_none() {
                    self.first_byte = Some(self.start.elapsed());
                }
                self.length += text.chars().count();
                Ok(Flow::Continue)
            }
            StreamEvent::Heartbeat => Ok(Flow::Continue),
            StreamEvent::Done => Ok(Flow::Done),
            StreamEvent::ServerError(message) => Err(ProbeFailure::Server(message)),
            StreamEvent::Malformed(payload) => {
                debug!(payload = %payload, "Skipping non-JSON stream line");
                Ok(Flow::Continue)
            }
        }
    }
}
