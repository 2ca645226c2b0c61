//! parley-client - Chat completions API client for parley
//!
//! Thin abstraction over an OpenAI-compatible chat API. The buffered and
//! streaming responses are normalized at this boundary; the rest of the
//! system only sees [`parley_core::Role`] and [`StreamEvent`] values.

pub mod error;
mod openai;
mod test_client;
pub mod types;

pub use error::ClientError;
pub use openai::{API_KEY_VAR, OpenAiClient};
pub use test_client::StubClient;
pub use types::{ChatClient, ChatRequest, ChatStream, StreamEvent};
