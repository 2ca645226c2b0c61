//! Conversation turn engine
//!
//! Drives one request/response cycle (or many, in interactive loop mode):
//! resolve the session, assemble the user turn, persist it, dispatch the
//! request buffered or streamed, persist the assistant turn. The two
//! persistence points bracket the remote call so the user's contribution
//! survives a failed or interrupted dispatch.

use crate::error::CliError;
use crate::input;
use crate::sessions;
use futures::StreamExt;
use parley_client::{ChatClient, ChatRequest, StreamEvent};
use parley_core::{Message, Role, Session};
use parley_store::Store;
use std::fs::OpenOptions;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

/// Per-invocation chat configuration, built once from the parsed flags and
/// passed by parameter; nothing here is global.
#[derive(Debug, Default)]
pub struct ChatOptions {
    /// Positional message text.
    pub input: Option<String>,
    /// Model for this request only; an existing session keeps its stored one.
    pub model: Option<String>,
    /// Forwarded when non-zero.
    pub max_tokens: Option<u32>,
    /// Dispatch mode.
    pub stream: bool,
    /// Force a fresh session instead of resolving the current pointer.
    pub new_session: bool,
    /// Read one operator line per turn until an empty line ends the loop.
    pub interactive: bool,
    /// Name for a newly created session.
    pub name: Option<String>,
    /// Description for a newly created session.
    pub description: Option<String>,
    /// Replaces the system prompt in the outgoing request only.
    pub system_prompt: Option<String>,
    /// Append each assistant reply to this file.
    pub output: Option<PathBuf>,
}

/// Run the engine for one invocation.
pub async fn run(
    store: &Store,
    client: &dyn ChatClient,
    opts: ChatOptions,
) -> Result<(), CliError> {
    let (id, mut session) = resolve_session(store, &opts)?;

    if opts.interactive {
        loop {
            eprint!("> ");
            io::stderr().flush()?;

            let mut line = String::new();
            if io::stdin().lock().read_line(&mut line).is_err() {
                break;
            }
            let line = line.trim();
            if line.is_empty() {
                break;
            }

            let text = input::patch_input(line)?;
            run_turn(store, &id, &mut session, client, &opts, text).await?;
        }
        return Ok(());
    }

    let cli_text = opts.input.clone().unwrap_or_default();
    let stdin_fenced = input::read_stdin_if_piped()?.unwrap_or_default();
    let merged = input::merge_input(&cli_text, &stdin_fenced);
    if merged.is_empty() {
        return Err(CliError::NoInput);
    }

    let text = input::patch_input(&merged)?;
    run_turn(store, &id, &mut session, client, &opts, text).await
}

/// Resolve which session this invocation talks to.
///
/// `--new-session` always creates one (without moving the pointer); an unset
/// pointer creates the first-ever default session and marks it current; a
/// pointer naming a deleted session fails here, fatally.
fn resolve_session(store: &Store, opts: &ChatOptions) -> Result<(String, Session), CliError> {
    let create = |set_current: bool| -> Result<(String, Session), CliError> {
        let id = sessions::create(
            store,
            opts.name.clone(),
            opts.model.clone(),
            None,
            opts.description.clone(),
            set_current,
        )?;
        let session = store.get_session(&id)?;
        Ok((id, session))
    };

    if opts.new_session {
        return create(false);
    }

    match store.current()? {
        Some(id) => {
            let session = store.get_session(&id)?;
            Ok((id, session))
        }
        None => create(true),
    }
}

/// Project the transcript into the outgoing request.
///
/// The per-call system prompt replaces index 0 in the request only; the
/// stored transcript is not touched. The new user turn goes last.
fn build_request(session: &Session, opts: &ChatOptions, user_text: &str) -> ChatRequest {
    let mut messages = session.messages.clone();
    if let Some(prompt) = &opts.system_prompt
        && !prompt.is_empty()
    {
        messages[0].content = prompt.clone();
    }
    messages.push(Message::new(Role::User, user_text));

    let mut request = ChatRequest::new(opts.model.as_deref().unwrap_or(&session.model), messages);
    request.max_tokens = opts.max_tokens.filter(|&t| t != 0);
    request.stream = opts.stream;
    request
}

/// One full cycle: persist the user turn, dispatch, persist the assistant
/// turn, mirror to the side-output file if configured.
async fn run_turn(
    store: &Store,
    id: &str,
    session: &mut Session,
    client: &dyn ChatClient,
    opts: &ChatOptions,
    text: String,
) -> Result<(), CliError> {
    let request = build_request(session, opts, &text);

    // Committed before dispatch: the user turn survives a failed call.
    session.messages.push(Message::new(Role::User, text));
    store.set_session(id, session)?;

    let assistant = if opts.stream {
        stream_turn(client, &request).await?
    } else {
        let message = client.complete(&request).await?;
        println!("{}", message.content);
        message
    };

    session.messages.push(assistant.clone());
    store.set_session(id, session)?;

    if let Some(path) = &opts.output {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(assistant.content.as_bytes())?;
        file.write_all(b"\n")?;
    }

    Ok(())
}

/// Consume a delta stream into the assistant message, echoing content
/// fragments as they arrive.
///
/// The first role marker establishes the message role and carries no body
/// text. A mid-stream failure propagates with whatever was already echoed
/// left on the terminal; the transcript keeps only the user turn.
async fn stream_turn(
    client: &dyn ChatClient,
    request: &ChatRequest,
) -> Result<Message, CliError> {
    let mut stream = client.stream(request);
    let mut role = None;
    let mut content = String::new();
    let mut stdout = io::stdout();

    while let Some(event) = stream.next().await {
        match event? {
            StreamEvent::Role(r) => {
                role.get_or_insert(r);
            }
            StreamEvent::Content(fragment) => {
                content.push_str(&fragment);
                print!("{fragment}");
                stdout.flush()?;
            }
        }
    }
    println!();

    Ok(Message::new(role.unwrap_or(Role::Assistant), content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_client::StubClient;
    use tempfile::TempDir;

    fn store_with_session(dir: &TempDir, id: &str) -> (Store, Session) {
        let store = Store::open(dir.path().join("parley.redb")).unwrap();
        let session = Session::new("", "");
        store.set_session(id, &session).unwrap();
        (store, session)
    }

    #[tokio::test]
    async fn buffered_cycle_appends_and_persists_both_turns() {
        let dir = TempDir::new().unwrap();
        let (store, mut session) = store_with_session(&dir, "s");
        let client = StubClient::new(Message::new(Role::Assistant, "4"));
        let opts = ChatOptions::default();

        run_turn(&store, "s", &mut session, &client, &opts, "2+2?".into())
            .await
            .unwrap();

        assert_eq!(session.messages.len(), 3);
        assert_eq!(session.messages[0].role, Role::System);
        assert_eq!(session.messages[1], Message::new(Role::User, "2+2?"));
        assert_eq!(session.messages[2], Message::new(Role::Assistant, "4"));

        // The second committing write left the store equal to memory.
        assert_eq!(store.get_session("s").unwrap(), session);
    }

    #[tokio::test]
    async fn streaming_cycle_folds_deltas_into_one_message() {
        let dir = TempDir::new().unwrap();
        let (store, mut session) = store_with_session(&dir, "s");
        let client = StubClient::default().with_events(vec![
            StreamEvent::Role(Role::Assistant),
            StreamEvent::Content("4".into()),
            StreamEvent::Content("2".into()),
        ]);
        let opts = ChatOptions {
            stream: true,
            ..Default::default()
        };

        run_turn(&store, "s", &mut session, &client, &opts, "2+2?".into())
            .await
            .unwrap();

        assert_eq!(
            session.messages.last().unwrap(),
            &Message::new(Role::Assistant, "42")
        );
        assert_eq!(store.get_session("s").unwrap(), session);
    }

    #[tokio::test]
    async fn failed_dispatch_keeps_persisted_user_turn_only() {
        let dir = TempDir::new().unwrap();
        let (store, mut session) = store_with_session(&dir, "s");
        let client = StubClient::failing();
        let opts = ChatOptions::default();

        let result = run_turn(&store, "s", &mut session, &client, &opts, "2+2?".into()).await;
        assert!(result.is_err());

        let stored = store.get_session("s").unwrap();
        assert_eq!(stored.messages.len(), 2);
        assert_eq!(stored.messages[1], Message::new(Role::User, "2+2?"));
    }

    #[tokio::test]
    async fn mid_stream_failure_keeps_persisted_user_turn_only() {
        let dir = TempDir::new().unwrap();
        let (store, mut session) = store_with_session(&dir, "s");
        let client = StubClient::failing();
        let opts = ChatOptions {
            stream: true,
            ..Default::default()
        };

        let result = run_turn(&store, "s", &mut session, &client, &opts, "hi".into()).await;
        assert!(result.is_err());
        assert_eq!(store.get_session("s").unwrap().messages.len(), 2);
    }

    #[tokio::test]
    async fn assistant_reply_is_appended_to_output_file() {
        let dir = TempDir::new().unwrap();
        let (store, mut session) = store_with_session(&dir, "s");
        let client = StubClient::new(Message::new(Role::Assistant, "noted"));
        let out = dir.path().join("replies.txt");
        let opts = ChatOptions {
            output: Some(out.clone()),
            ..Default::default()
        };

        run_turn(&store, "s", &mut session, &client, &opts, "one".into())
            .await
            .unwrap();
        run_turn(&store, "s", &mut session, &client, &opts, "two".into())
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(out).unwrap(), "noted\nnoted\n");
    }

    #[test]
    fn request_overrides_are_request_local() {
        let mut session = Session::new("stored-model", "stored prompt");
        session.messages.push(Message::new(Role::User, "earlier"));
        let opts = ChatOptions {
            model: Some("override-model".into()),
            system_prompt: Some("override prompt".into()),
            max_tokens: Some(0),
            ..Default::default()
        };

        let request = build_request(&session, &opts, "now");

        assert_eq!(request.model, "override-model");
        assert_eq!(request.messages[0].content, "override prompt");
        assert_eq!(request.messages.last().unwrap().content, "now");
        assert_eq!(request.max_tokens, None, "zero max-tokens is not forwarded");

        // The stored transcript is untouched by per-call overrides.
        assert_eq!(session.messages[0].content, "stored prompt");
        assert_eq!(session.model, "stored-model");
    }

    #[test]
    fn request_defaults_come_from_the_session() {
        let session = Session::new("stored-model", "");
        let request = build_request(&session, &ChatOptions::default(), "q");

        assert_eq!(request.model, "stored-model");
        assert_eq!(request.messages.len(), 2);
        assert!(!request.stream);
    }

    #[test]
    fn resolve_creates_and_marks_first_ever_session() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path().join("parley.redb")).unwrap();

        let (id, session) = resolve_session(&store, &ChatOptions::default()).unwrap();
        assert_eq!(session.messages[0].role, Role::System);
        assert_eq!(store.current().unwrap(), Some(id));
    }

    #[test]
    fn resolve_forced_new_session_leaves_pointer_alone() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path().join("parley.redb")).unwrap();
        sessions::create(&store, Some("main".into()), None, None, None, true).unwrap();

        let opts = ChatOptions {
            new_session: true,
            name: Some("scratch".into()),
            ..Default::default()
        };
        let (id, _) = resolve_session(&store, &opts).unwrap();

        assert_eq!(id, "scratch");
        assert_eq!(store.current().unwrap(), Some("main".to_string()));
    }

    #[test]
    fn resolve_fails_when_pointer_names_a_deleted_session() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path().join("parley.redb")).unwrap();
        sessions::create(&store, Some("gone".into()), None, None, None, true).unwrap();
        store.delete_session("gone").unwrap();

        assert!(resolve_session(&store, &ChatOptions::default()).is_err());
    }
}
