// OpenAI-Compatible Transport
//
// reqwest-backed ChatTransport for endpoints that speak the OpenAI
// chat-completions protocol with `stream: true` (OpenAI, Volcengine Ark,
// local gateways). Timing and decoding live in firstbyte-core; this crate
// only opens the stream.

mod transport;
mod types;

pub use transport::OpenAiTransport;
pub use types::{ChatMessage, ChatRequest, MessageRole};

#[cfg(test)]
mod tests;
