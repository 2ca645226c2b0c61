//! Chat API client types
//!
//! Defines the client trait and the normalized streaming event type. The
//! remote API's string role vocabulary is translated to and from
//! [`parley_core::Role`] here and nowhere else.

use crate::error::ClientError;
use async_trait::async_trait;
use futures::Stream;
use parley_core::{Message, Role};
use std::pin::Pin;

/// One chat completion request.
///
/// Messages are the session transcript projected 1:1, role and content
/// verbatim, with the new user turn appended last.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    /// Forwarded only when set; the API applies its own default otherwise.
    pub max_tokens: Option<u32>,
    /// Selects the dispatch mode.
    pub stream: bool,
}

impl ChatRequest {
    pub fn new(model: &str, messages: Vec<Message>) -> Self {
        Self {
            model: model.to_string(),
            messages,
            max_tokens: None,
            stream: false,
        }
    }
}

/// Normalized incremental event from a streamed completion.
///
/// A delta carries either a role marker (first event of the stream, not body
/// text) or a content fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Role(Role),
    Content(String),
}

/// Stream of incremental events, terminated by end-of-stream.
pub type ChatStream<'a> = Pin<Box<dyn Stream<Item = Result<StreamEvent, ClientError>> + Send + 'a>>;

/// Abstraction over the remote chat API.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Issue one buffered request and return the first choice's message.
    async fn complete(&self, request: &ChatRequest) -> Result<Message, ClientError>;

    /// Issue a streaming request.
    fn stream<'a>(&'a self, request: &'a ChatRequest) -> ChatStream<'a>;

    /// List the model identifiers the API exposes, in API order.
    async fn list_models(&self) -> Result<Vec<String>, ClientError>;
}
