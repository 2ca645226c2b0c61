//! Deterministic stub client for exercising callers without the network.

use crate::error::ClientError;
use crate::types::{ChatClient, ChatRequest, ChatStream, StreamEvent};
use async_trait::async_trait;
use parley_core::{Message, Role};

/// Scripted [`ChatClient`] that replays a fixed response.
///
/// `complete` returns the configured reply, `stream` replays the configured
/// event sequence, and either can be scripted to fail to drive error paths.
pub struct StubClient {
    reply: Option<Message>,
    events: Vec<StreamEvent>,
    fail_mid_stream: bool,
    models: Vec<String>,
}

impl StubClient {
    pub fn new(reply: Message) -> Self {
        Self {
            reply: Some(reply),
            events: Vec::new(),
            fail_mid_stream: false,
            models: Vec::new(),
        }
    }

    /// A client whose buffered call fails with a server error.
    pub fn failing() -> Self {
        Self {
            reply: None,
            events: Vec::new(),
            fail_mid_stream: true,
            models: Vec::new(),
        }
    }

    pub fn with_events(mut self, events: Vec<StreamEvent>) -> Self {
        self.events = events;
        self
    }

    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.models = models;
        self
    }

    fn error() -> ClientError {
        ClientError::ServerError {
            status: 500,
            message: "stubbed failure".to_string(),
        }
    }
}

impl Default for StubClient {
    fn default() -> Self {
        Self::new(Message::new(Role::Assistant, "ok")).with_events(vec![
            StreamEvent::Role(Role::Assistant),
            StreamEvent::Content("ok".to_string()),
        ])
    }
}

#[async_trait]
impl ChatClient for StubClient {
    async fn complete(&self, _request: &ChatRequest) -> Result<Message, ClientError> {
        self.reply.clone().ok_or_else(Self::error)
    }

    fn stream<'a>(&'a self, _request: &'a ChatRequest) -> ChatStream<'a> {
        let mut items: Vec<Result<StreamEvent, ClientError>> =
            self.events.iter().cloned().map(Ok).collect();
        if self.fail_mid_stream {
            items.push(Err(Self::error()));
        }
        Box::pin(futures::stream::iter(items))
    }

    async fn list_models(&self) -> Result<Vec<String>, ClientError> {
        Ok(self.models.clone())
    }
}
