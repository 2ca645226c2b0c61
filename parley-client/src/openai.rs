//! OpenAI-compatible chat completions client
//!
//! Talks to the `/v1/chat/completions` and `/v1/models` endpoints. The
//! streaming path consumes server-sent events (`data: <json>` lines,
//! `data: [DONE]` terminator) and normalizes each chunk's first-choice delta
//! into a [`StreamEvent`].

use crate::error::ClientError;
use crate::types::{ChatClient, ChatRequest, ChatStream, StreamEvent};
use async_trait::async_trait;
use futures::StreamExt;
use parley_core::{Message, Role};
use serde::Deserialize;
use serde_json::Value;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Environment variable holding the API credential.
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";

/// Client for an OpenAI-compatible chat API.
pub struct OpenAiClient {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    role: Option<String>,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

/// One parsed SSE line.
#[derive(Debug)]
enum SseLine {
    Done,
    Chunk(StreamChunk),
}

impl OpenAiClient {
    /// Create a new client with the given API key.
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Create from the [`API_KEY_VAR`] environment variable.
    ///
    /// Absence of the credential is reported here, before any store or
    /// network access happens.
    pub fn from_env() -> Result<Self, ClientError> {
        let api_key = std::env::var(API_KEY_VAR).map_err(|_| ClientError::MissingApiKey)?;
        Ok(Self::new(api_key))
    }

    /// Point the client at an alternate endpoint.
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    fn build_request_body(request: &ChatRequest) -> Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": request.messages,
            "stream": request.stream,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = max_tokens.into();
        }

        body
    }

    /// Parse one SSE line. Comment lines, blank lines, and undecodable
    /// payloads all yield `None` and are skipped by the caller.
    fn parse_sse_line(line: &str) -> Option<SseLine> {
        let data = line.strip_prefix("data: ")?;
        if data == "[DONE]" {
            return Some(SseLine::Done);
        }
        serde_json::from_str(data).ok().map(SseLine::Chunk)
    }

    fn wire_role(role: &str) -> Result<Role, ClientError> {
        Role::from_wire(role).ok_or_else(|| ClientError::Protocol {
            message: format!("unknown role in response: {role}"),
        })
    }
}

#[async_trait]
impl ChatClient for OpenAiClient {
    async fn complete(&self, request: &ChatRequest) -> Result<Message, ClientError> {
        let body = Self::build_request_body(request);

        let response = self
            .http
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();
        if !(200..=299).contains(&status) {
            let text = response.text().await.unwrap_or_default();
            return Err(ClientError::from_http_status(status, text));
        }

        let completion: ChatCompletion = response.json().await?;
        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::Protocol {
                message: "response carried no choices".to_string(),
            })?;

        Ok(Message::new(
            Self::wire_role(&choice.message.role)?,
            choice.message.content,
        ))
    }

    fn stream<'a>(&'a self, request: &'a ChatRequest) -> ChatStream<'a> {
        Box::pin(async_stream::try_stream! {
            let body = Self::build_request_body(request);

            let response = self.http
                .post(format!("{}/v1/chat/completions", self.base_url))
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&body)
                .send()
                .await
                .map_err(ClientError::Network)?;

            let status = response.status().as_u16();
            if !(200..=299).contains(&status) {
                let text = response.text().await.unwrap_or_default();
                Err(ClientError::from_http_status(status, text))?;
                return;
            }

            let mut bytes = response.bytes_stream();
            let mut buffer = String::with_capacity(512);

            'receive: while let Some(chunk) = bytes.next().await {
                let chunk = chunk.map_err(ClientError::Network)?;
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(newline) = buffer.find('\n') {
                    let line = buffer[..newline].trim().to_string();
                    buffer.drain(..=newline);

                    if line.is_empty() || line.starts_with(':') {
                        continue;
                    }

                    match Self::parse_sse_line(&line) {
                        Some(SseLine::Done) => break 'receive,
                        Some(SseLine::Chunk(chunk)) => {
                            let Some(choice) = chunk.choices.into_iter().next() else {
                                continue;
                            };
                            if let Some(role) = choice.delta.role {
                                let role = Role::from_wire(&role).ok_or_else(|| {
                                    ClientError::StreamParse {
                                        message: format!("unknown role in delta: {role}"),
                                    }
                                })?;
                                yield StreamEvent::Role(role);
                            } else if let Some(content) = choice.delta.content {
                                yield StreamEvent::Content(content);
                            }
                        }
                        None => {}
                    }
                }
            }
        })
    }

    async fn list_models(&self) -> Result<Vec<String>, ClientError> {
        let response = self
            .http
            .get(format!("{}/v1/models", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await?;

        let status = response.status().as_u16();
        if !(200..=299).contains(&status) {
            let text = response.text().await.unwrap_or_default();
            return Err(ClientError::from_http_status(status, text));
        }

        let models: ModelList = response.json().await?;
        Ok(models.data.into_iter().map(|m| m.id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_omits_unset_max_tokens() {
        let request = ChatRequest::new("gpt-4o", vec![Message::new(Role::User, "hi")]);
        let body = OpenAiClient::build_request_body(&request);

        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["stream"], false);
        assert!(body.get("max_tokens").is_none());
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "hi");
    }

    #[test]
    fn request_body_forwards_max_tokens_and_stream() {
        let mut request = ChatRequest::new("gpt-4o", vec![]);
        request.max_tokens = Some(128);
        request.stream = true;
        let body = OpenAiClient::build_request_body(&request);

        assert_eq!(body["max_tokens"], 128);
        assert_eq!(body["stream"], true);
    }

    #[test]
    fn sse_line_with_role_delta() {
        let line = r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#;
        match OpenAiClient::parse_sse_line(line) {
            Some(SseLine::Chunk(chunk)) => {
                assert_eq!(chunk.choices[0].delta.role.as_deref(), Some("assistant"));
                assert_eq!(chunk.choices[0].delta.content, None);
            }
            other => panic!("expected chunk, got {other:?}"),
        }
    }

    #[test]
    fn sse_line_with_content_delta() {
        let line = r#"data: {"choices":[{"delta":{"content":"4"}}]}"#;
        match OpenAiClient::parse_sse_line(line) {
            Some(SseLine::Chunk(chunk)) => {
                assert_eq!(chunk.choices[0].delta.content.as_deref(), Some("4"));
            }
            other => panic!("expected chunk, got {other:?}"),
        }
    }

    #[test]
    fn sse_done_terminator() {
        assert!(matches!(
            OpenAiClient::parse_sse_line("data: [DONE]"),
            Some(SseLine::Done)
        ));
    }

    #[test]
    fn sse_non_data_and_malformed_lines_are_skipped() {
        assert!(OpenAiClient::parse_sse_line(": keep-alive").is_none());
        assert!(OpenAiClient::parse_sse_line("event: ping").is_none());
        assert!(OpenAiClient::parse_sse_line("data: {not json").is_none());
    }

    #[test]
    fn unknown_wire_role_is_a_protocol_error() {
        assert!(matches!(
            OpenAiClient::wire_role("tool"),
            Err(ClientError::Protocol { .. })
        ));
        assert_eq!(OpenAiClient::wire_role("assistant").unwrap(), Role::Assistant);
    }
}
