// Data model for latency probes and batches
//
// ProbeRequest and ProbeResult are immutable once built; BatchResult keeps
// results in submission order and remembers how many models were requested
// so a cancelled batch can be told apart from a completed one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use crate::error::ValidationError;

// ============================================================================
// ModelSpec
// ============================================================================

/// Identifier of a model endpoint (e.g. "doubao-1-5-245m-2410")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelSpec(String);

impl ModelSpec {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModelSpec {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ModelSpec {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ============================================================================
// ProbeRequest
// ============================================================================

/// Everything needed to issue one streaming request against one model
#[derive(Clone)]
pub struct ProbeRequest {
    model: ModelSpec,
    system_prompt: Option<String>,
    user_prompt: String,
    api_key: String,
    timeout: Duration,
}

impl ProbeRequest {
    pub fn new(
        model: impl Into<ModelSpec>,
        user_prompt: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            model: model.into(),
            system_prompt: None,
            user_prompt: user_prompt.into(),
            api_key: api_key.into(),
            timeout,
        }
    }

    /// Set the system prompt. Blank prompts are dropped, no system message is sent for them.
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = normalize_system_prompt(Some(system_prompt.into()));
        self
    }

    pub fn model(&self) -> &ModelSpec {
        &self.model
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    pub fn user_prompt(&self) -> &str {
        &self.user_prompt
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Check the request before any network activity
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.model.as_str().trim().is_empty() {
            return Err(ValidationError::EmptyModelId);
        }
        validate_shared(&self.user_prompt, &self.api_key, self.timeout)
    }
}

impl fmt::Debug for ProbeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProbeRequest")
            .field("model", &self.model)
            .field("system_prompt", &self.system_prompt)
            .field("user_prompt", &self.user_prompt)
            .field("api_key", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn normalize_system_prompt(prompt: Option<String>) -> Option<String> {
    prompt.filter(|p| !p.trim().is_empty())
}

fn validate_shared(user_prompt: &str, api_key: &str, timeout: Duration) -> Result<(), ValidationError> {
    if user_prompt.trim().is_empty() {
        return Err(ValidationError::EmptyPrompt);
    }
    if api_key.trim().is_empty() {
        return Err(ValidationError::MissingApiKey);
    }
    if timeout.is_zero() {
        return Err(ValidationError::ZeroTimeout);
    }
    Ok(())
}

// ============================================================================
// BatchInputs
// ============================================================================

/// Prompt, key and timeout shared read-only by every probe of a batch
#[derive(Clone)]
pub struct BatchInputs {
    system_prompt: Option<String>,
    user_prompt: String,
    api_key: String,
    timeout: Duration,
}

impl BatchInputs {
    pub fn new(user_prompt: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            system_prompt: None,
            user_prompt: user_prompt.into(),
            api_key: api_key.into(),
            timeout,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = normalize_system_prompt(Some(system_prompt.into()));
        self
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    pub fn user_prompt(&self) -> &str {
        &self.user_prompt
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_shared(&self.user_prompt, &self.api_key, self.timeout)
    }

    /// Build the probe request for one model of the batch
    pub fn request_for(&self, model: &ModelSpec) -> ProbeRequest {
        ProbeRequest {
            model: model.clone(),
            system_prompt: self.system_prompt.clone(),
            user_prompt: self.user_prompt.clone(),
            api_key: self.api_key.clone(),
            timeout: self.timeout,
        }
    }
}

impl fmt::Debug for BatchInputs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchInputs")
            .field("system_prompt", &self.system_prompt)
            .field("user_prompt", &self.user_prompt)
            .field("api_key", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

// ============================================================================
// ProbeResult
// ============================================================================

/// Measurement produced by exactly one probe invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    model: ModelSpec,
    success: bool,
    #[serde(with = "opt_duration_secs")]
    first_byte: Option<Duration>,
    #[serde(with = "duration_secs")]
    total: Duration,
    response_length: usize,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    error: Option<String>,
    started_at: DateTime<Utc>,
}

impl ProbeResult {
    /// A stream that completed normally with at least one content chunk
    pub fn succeeded(
        model: ModelSpec,
        first_byte: Duration,
        total: Duration,
        response_length: usize,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            model,
            success: true,
            first_byte: Some(first_byte),
            total,
            response_length,
            error: None,
            started_at,
        }
    }

    /// Any failure: validation, transport, protocol, timeout or empty stream
    pub fn failed(
        model: ModelSpec,
        first_byte: Option<Duration>,
        total: Duration,
        response_length: usize,
        error: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            model,
            success: false,
            first_byte,
            total,
            response_length,
            error: Some(error.into()),
            started_at,
        }
    }

    pub fn model(&self) -> &ModelSpec {
        &self.model
    }

    pub fn success(&self) -> bool {
        self.success
    }

    /// Time from request start to the first content-bearing chunk
    pub fn first_byte(&self) -> Option<Duration> {
        self.first_byte
    }

    pub fn total(&self) -> Duration {
        self.total
    }

    /// Characters of content received
    pub fn response_length(&self) -> usize {
        self.response_length
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

mod opt_duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&d.as_secs_f64()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Option::<f64>::deserialize(d)?
            .map(|secs| Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom))
            .transpose()
    }
}

// ============================================================================
// BatchResult
// ============================================================================

/// Results of one batch, in submission order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    batch_id: Uuid,
    requested: usize,
    results: Vec<ProbeResult>,
}

impl BatchResult {
    /// Assemble a batch from already ordered results
    pub fn from_results(requested: usize, results: Vec<ProbeResult>) -> Self {
        debug_assert!(results.len() <= requested);
        Self {
            batch_id: Uuid::now_v7(),
            requested,
            results,
        }
    }

    /// Collapse per-index slots into the populated prefix.
    /// Dispatch is in submission order, so filled slots are always contiguous from 0.
    pub(crate) fn from_slots(batch_id: Uuid, slots: Vec<Option<ProbeResult>>) -> Self {
        let requested = slots.len();
        let results: Vec<ProbeResult> = slots.into_iter().map_while(|slot| slot).collect();
        Self {
            batch_id,
            requested,
            results,
        }
    }

    pub fn batch_id(&self) -> Uuid {
        self.batch_id
    }

    /// Number of models the batch was asked to probe
    pub fn requested(&self) -> usize {
        self.requested
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.results.len() == self.requested
    }

    /// A cancelled batch holds fewer results than requested models
    pub fn is_cancelled(&self) -> bool {
        self.results.len() < self.requested
    }

    pub fn results(&self) -> &[ProbeResult] {
        &self.results
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ProbeResult> {
        self.results.iter()
    }

    pub fn into_results(self) -> Vec<ProbeResult> {
        self.results
    }

    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.results.len() - self.success_count()
    }
}

impl<'a> IntoIterator for &'a BatchResult {
    type Item = &'a ProbeResult;
    type IntoIter = std::slice::Iter<'a, ProbeResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}
