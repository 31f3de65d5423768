// Scripted transport for tests
//
// A fake ChatTransport that replays a per-model script of steps as an SSE
// byte stream. Delays use tokio::time, so tests running with a paused clock
// get exact, deterministic timings without any network access.
//
// Design: intended for unit and integration tests of the probe and runner,
// and for downstream crates that want to exercise their progress sinks.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::TransportError;
use crate::model::ProbeRequest;
use crate::transport::{ByteStream, ChatTransport};

/// One scripted action
#[derive(Debug, Clone)]
pub enum Step {
    /// Delay before the response headers arrive (applies before the stream opens)
    ConnectDelay(Duration),
    /// Fail to connect
    ConnectError(String),
    /// Answer with a non-success status instead of a stream
    Status(u16, String),
    /// Sleep between stream chunks
    Delay(Duration),
    /// Emit an SSE content chunk
    Content(String),
    /// Emit a raw line (a newline is appended)
    Raw(String),
    /// Emit the [DONE] end marker
    Done,
    /// Break the stream with an error
    Fail(String),
    /// Stop producing anything, forever
    Hang,
}

#[derive(Debug)]
struct Script {
    steps: Vec<Step>,
    calls: AtomicUsize,
}

/// ChatTransport replaying scripted responses per model
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    scripts: HashMap<String, Script>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the script replayed for every request to `model`
    pub fn script(mut self, model: impl Into<String>, steps: Vec<Step>) -> Self {
        self.scripts.insert(
            model.into(),
            Script {
                steps,
                calls: AtomicUsize::new(0),
            },
        );
        self
    }

    /// Script a model that streams `chunks` evenly between `first_byte` and `total`
    pub fn timed(
        self,
        model: impl Into<String>,
        first_byte: Duration,
        total: Duration,
        chunks: &[&str],
    ) -> Self {
        let mut steps = vec![Step::Delay(first_byte)];
        let gaps = chunks.len().saturating_sub(1).max(1) as u32;
        let gap = total.saturating_sub(first_byte) / gaps;
        for (i, chunk) in chunks.iter().enumerate() {
            if i > 0 {
                steps.push(Step::Delay(gap));
            }
            steps.push(Step::Content(chunk.to_string()));
        }
        if chunks.len() <= 1 {
            steps.push(Step::Delay(gap));
        }
        steps.push(Step::Done);
        self.script(model, steps)
    }

    /// Number of times a stream was opened for `model`
    pub fn calls(&self, model: &str) -> usize {
        self.scripts
            .get(model)
            .map(|s| s.calls.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Total number of streams opened
    pub fn total_calls(&self) -> usize {
        self.scripts
            .values()
            .map(|s| s.calls.load(Ordering::SeqCst))
            .sum()
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn open_stream(&self, request: &ProbeRequest) -> Result<ByteStream, TransportError> {
        let script = self
            .scripts
            .get(request.model().as_str())
            .ok_or_else(|| {
                TransportError::status(404, format!("model not found: {}", request.model()))
            })?;
        script.calls.fetch_add(1, Ordering::SeqCst);

        let mut steps = script.steps.clone().into_iter().peekable();
        while let Some(step) = steps.peek() {
            match step {
                Step::ConnectDelay(d) => tokio::time::sleep(*d).await,
                Step::ConnectError(msg) => return Err(TransportError::connect(msg.clone())),
                Step::Status(code, body) => return Err(TransportError::status(*code, body.clone())),
                _ => break,
            }
            steps.next();
        }

        let stream = futures::stream::unfold(steps, |mut steps| async move {
            loop {
                let bytes = match steps.next()? {
                    Step::Delay(d) => {
                        tokio::time::sleep(d).await;
                        continue;
                    }
                    Step::Hang => {
                        futures::future::pending::<()>().await;
                        continue;
                    }
                    Step::Content(text) => Ok(Bytes::from(content_line(&text))),
                    Step::Raw(line) => Ok(Bytes::from(format!("{}\n", line))),
                    Step::Done => Ok(Bytes::from_static(b"data: [DONE]\n\n")),
                    Step::Fail(msg) => Err(TransportError::stream(msg)),
                    // Only meaningful before the stream opens
                    Step::ConnectDelay(_) | Step::ConnectError(_) | Step::Status(..) => continue,
                };
                return Some((bytes, steps));
            }
        });

        Ok(Box::pin(stream))
    }
}

/// Encode a content delta the way OpenAI-compatible endpoints do
pub fn content_line(text: &str) -> String {
    let chunk = serde_json::json!({
        "object": "chat.completion.chunk",
        "choices": [{"index": 0, "delta": {"content": text}}]
    });
    format!("data: {}\n\n", chunk)
}
