//! parley-core - Session and message model for parley
//!
//! These types form the representation boundary for session persistence and
//! the wire format sent to the chat API. A session is a conversation history
//! that can be persisted and resumed; its transcript is append-only while the
//! session is live, except that index 0 (the system message) may be edited
//! through session configuration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Model used when a session is created without an explicit one.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Persona seeded into a new session when no system prompt is given.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are chatgpt, a large language model trained by OpenAI, based on the GPT-4 architecture.";

/// Message author role.
///
/// Closed vocabulary at the model boundary; translation to and from the
/// API's string vocabulary happens only in the client crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// The wire string for this role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Parse a wire string back into a role.
    pub fn from_wire(s: &str) -> Option<Role> {
        match s {
            "system" => Some(Role::System),
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single transcript entry. Owned exclusively by its session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// A conversation session with full history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Optional free-text description, shown in listings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Model used for requests unless overridden per call.
    pub model: String,
    /// Ordered transcript. Never empty: index 0 is always the system message.
    pub messages: Vec<Message>,
}

impl Session {
    /// Create a session seeded with a single system message.
    ///
    /// An empty `model` falls back to [`DEFAULT_MODEL`]; an empty `prompt`
    /// falls back to [`DEFAULT_SYSTEM_PROMPT`]. Pure, no I/O.
    pub fn new(model: &str, prompt: &str) -> Self {
        let model = if model.is_empty() {
            DEFAULT_MODEL
        } else {
            model
        };
        let prompt = if prompt.is_empty() {
            DEFAULT_SYSTEM_PROMPT
        } else {
            prompt
        };

        Self {
            description: None,
            model: model.to_string(),
            messages: vec![Message::new(Role::System, prompt)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_seeds_system_message() {
        let session = Session::new("", "");
        assert_eq!(session.model, DEFAULT_MODEL);
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.messages[0].role, Role::System);
        assert!(!session.messages[0].content.is_empty());
    }

    #[test]
    fn new_session_keeps_explicit_model_and_prompt() {
        let session = Session::new("gpt-4o", "You are terse.");
        assert_eq!(session.model, "gpt-4o");
        assert_eq!(session.messages[0].content, "You are terse.");
    }

    #[test]
    fn role_round_trips_through_wire_strings() {
        for role in [Role::System, Role::User, Role::Assistant] {
            assert_eq!(Role::from_wire(role.as_str()), Some(role));
        }
        assert_eq!(Role::from_wire("tool"), None);
    }

    #[test]
    fn session_serializes_roles_lowercase() {
        let session = Session::new("gpt-4o", "hi");
        let json = serde_json::to_string(&session).unwrap();
        assert!(json.contains("\"role\":\"system\""));
        // No description key when unset.
        assert!(!json.contains("description"));
    }

    #[test]
    fn session_json_round_trip() {
        let mut session = Session::new("gpt-4o", "hi");
        session.description = Some("scratch".to_string());
        session.messages.push(Message::new(Role::User, "2+2?"));
        let json = serde_json::to_vec(&session).unwrap();
        let back: Session = serde_json::from_slice(&json).unwrap();
        assert_eq!(back, session);
    }
}
