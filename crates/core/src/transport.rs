// Streaming transport abstraction
//
// The probe only needs raw response bytes; building the HTTP request,
// authenticating and mapping non-2xx statuses is the transport's job.
// Production: firstbyte_openai::OpenAiTransport. Tests: testing::ScriptedTransport.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::TransportError;
use crate::model::ProbeRequest;

/// Type alias for the raw response body stream
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// Opens one streaming chat-completion request
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send the request and return the body as a byte stream.
    ///
    /// Must return `TransportError::Status` when the endpoint answers with a
    /// non-success status before streaming begins.
    async fn open_stream(&self, request: &ProbeRequest) -> Result<ByteStream, TransportError>;
}

#[async_trait]
impl<T: ChatTransport + ?Sized> ChatTransport for Arc<T> {
    async fn open_stream(&self, request: &ProbeRequest) -> Result<ByteStream, TransportError> {
        (**self).open_stream(request).await
    }
}

/// Type alias for a shared, type-erased transport
pub type BoxedTransport = Arc<dyn ChatTransport>;
