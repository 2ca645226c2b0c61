//! Session directory operations
//!
//! Create/list/configure/rename/describe, layered on the store and the
//! session model. These functions return data; printing stays in `main`.

use crate::error::CliError;
use parley_core::Session;
use parley_store::Store;
use uuid::Uuid;

/// Fields applied to the current session by `session configure`.
#[derive(Debug, Default)]
pub struct ConfigureOptions {
    pub description: Option<String>,
    pub model: Option<String>,
    pub prompt: Option<String>,
    pub rename: Option<String>,
}

/// Create a session and return its id.
///
/// An omitted name gets a freshly generated identifier.
pub fn create(
    store: &Store,
    name: Option<String>,
    model: Option<String>,
    prompt: Option<String>,
    description: Option<String>,
    set_current: bool,
) -> Result<String, CliError> {
    let id = name.unwrap_or_else(|| Uuid::new_v4().to_string());

    let mut session = Session::new(
        model.as_deref().unwrap_or_default(),
        prompt.as_deref().unwrap_or_default(),
    );
    session.description = description;

    store.set_session(&id, &session)?;
    if set_current {
        store.set_current(&id)?;
    }

    Ok(id)
}

/// Display lines for every session, in store enumeration order.
pub fn list(store: &Store) -> Result<Vec<String>, CliError> {
    let mut lines = Vec::new();
    for id in store.list_sessions()? {
        let session = store.get_session(&id)?;
        match session.description {
            Some(description) if !description.is_empty() => {
                lines.push(format!("{id} - {description}"));
            }
            _ => lines.push(id),
        }
    }
    Ok(lines)
}

/// Apply any non-empty fields to the current session in place.
///
/// A rename is delete-old, write-new, advance-pointer, in that order. The
/// steps are three separate transactions; a crash in between is observable
/// as "old key gone, pointer not yet advanced".
pub fn configure(store: &Store, opts: ConfigureOptions) -> Result<(), CliError> {
    let id = store.current()?.ok_or(CliError::NoCurrentSession)?;
    let mut session = store.get_session(&id)?;

    if let Some(description) = opts.description
        && !description.is_empty()
    {
        session.description = Some(description);
    }
    if let Some(model) = opts.model
        && !model.is_empty()
    {
        session.model = model;
    }
    if let Some(prompt) = opts.prompt
        && !prompt.is_empty()
    {
        session.messages[0].content = prompt;
    }

    match opts.rename {
        Some(new_id) if !new_id.is_empty() && new_id != id => {
            store.delete_session(&id)?;
            store.set_session(&new_id, &session)?;
            store.set_current(&new_id)?;
        }
        _ => store.set_session(&id, &session)?,
    }

    Ok(())
}

/// Render the current session as text: identity, model, description if
/// present, then every transcript entry as `role> content`.
pub fn dump(store: &Store) -> Result<String, CliError> {
    let id = store.current()?.ok_or(CliError::NoCurrentSession)?;
    let session = store.get_session(&id)?;

    let mut out = String::new();
    out.push_str(&format!("Current session: {id}\n"));
    out.push_str(&format!("Model: {}\n", session.model));
    if let Some(description) = &session.description {
        out.push_str(&format!("Description: {description}\n"));
    }
    out.push('\n');
    for message in &session.messages {
        out.push_str(&format!("{}> {}\n", message.role, message.content));
    }

    Ok(out)
}
