//! CLI-level errors
//!
//! Aggregates the library error types plus the conditions only the binary
//! can hit. Every variant surfaces to the operator as a printed message and
//! a non-zero exit; nothing is retried.

use parley_client::ClientError;
use parley_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("chat API error: {0}")]
    Client(#[from] ClientError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not read file {path}: {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },

    #[error("no input; exiting")]
    NoInput,

    #[error("no current session is set")]
    NoCurrentSession,
}
