//! parley - session-keeping command-line client for chat completion APIs

mod chat;
mod error;
mod input;
mod sessions;

use chat::ChatOptions;
use clap::{Parser, Subcommand};
use error::CliError;
use parley_client::{ChatClient, OpenAiClient};
use parley_store::Store;
use sessions::ConfigureOptions;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "parley")]
#[command(version, about = "Keep multi-turn chat sessions with an OpenAI-compatible API")]
struct Cli {
    /// Backing database file path (defaults to the platform data directory).
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a message within the current session
    Chat {
        /// Message text; merged with piped standard input when both are present
        input: Option<String>,

        /// Model for this request only
        #[arg(long, short = 'm')]
        model: Option<String>,

        /// Maximum number of tokens to return
        #[arg(long)]
        max_tokens: Option<u32>,

        /// Stream the response as it is produced
        #[arg(long, short = 's')]
        stream: bool,

        /// Start a fresh session instead of the current one
        #[arg(long)]
        new_session: bool,

        /// Keep prompting for turns until an empty line
        #[arg(long, short = 'i')]
        interactive: bool,

        /// Name for a newly created session
        #[arg(long)]
        name: Option<String>,

        /// Description for a newly created session
        #[arg(long)]
        description: Option<String>,

        /// Replace the system prompt in this request only
        #[arg(long)]
        system_prompt: Option<String>,

        /// Append assistant replies to this file
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Manage sessions
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },

    /// List all models exposed by the API
    Models,

    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
}

#[derive(Subcommand)]
enum SessionCommands {
    /// Create a new session and print its id
    Create {
        /// Session name; generated when omitted
        #[arg(long)]
        name: Option<String>,

        /// Model stored in the session
        #[arg(long, short = 'm')]
        model: Option<String>,

        /// System prompt seeded at index 0
        #[arg(long)]
        prompt: Option<String>,

        /// Free-text description shown in listings
        #[arg(long)]
        description: Option<String>,

        /// Also make it the current session
        #[arg(long)]
        set_current: bool,
    },

    /// List existing sessions
    List,

    /// Print the current session transcript
    Dump,

    /// Print the current session id
    GetCurrent,

    /// Set the current session id
    SetCurrent { id: String },

    /// Delete a session
    Delete { id: String },

    /// Update the current session in place
    Configure {
        #[arg(long)]
        description: Option<String>,

        #[arg(long, short = 'm')]
        model: Option<String>,

        /// Replace the stored system prompt
        #[arg(long)]
        prompt: Option<String>,

        /// Move the session to a new id and advance the current pointer
        #[arg(long)]
        rename: Option<String>,
    },
}

#[derive(Subcommand)]
enum DbCommands {
    /// Compact the backing database file
    Shrink,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Chat {
            input,
            model,
            max_tokens,
            stream,
            new_session,
            interactive,
            name,
            description,
            system_prompt,
            output,
        } => {
            // Credential check comes first; no store or network access
            // happens without it.
            let client = OpenAiClient::from_env()?;
            let store = open_store(cli.db_path)?;
            let opts = ChatOptions {
                input,
                model,
                max_tokens,
                stream,
                new_session,
                interactive,
                name,
                description,
                system_prompt,
                output,
            };
            chat::run(&store, &client, opts).await
        }

        Commands::Session { command } => {
            let store = open_store(cli.db_path)?;
            run_session_command(&store, command)
        }

        Commands::Models => {
            let client = OpenAiClient::from_env()?;
            let mut models = client.list_models().await?;
            models.sort();
            for model in models {
                println!("{model}");
            }
            Ok(())
        }

        Commands::Db { command } => match command {
            DbCommands::Shrink => {
                let mut store = open_store(cli.db_path)?;
                store.shrink()?;
                Ok(())
            }
        },
    }
}

fn run_session_command(store: &Store, command: SessionCommands) -> Result<(), CliError> {
    match command {
        SessionCommands::Create {
            name,
            model,
            prompt,
            description,
            set_current,
        } => {
            let id = sessions::create(store, name, model, prompt, description, set_current)?;
            println!("{id}");
            Ok(())
        }

        SessionCommands::List => {
            for line in sessions::list(store)? {
                println!("{line}");
            }
            Ok(())
        }

        SessionCommands::Dump => {
            print!("{}", sessions::dump(store)?);
            Ok(())
        }

        SessionCommands::GetCurrent => {
            if let Some(id) = store.current()? {
                println!("{id}");
            }
            Ok(())
        }

        SessionCommands::SetCurrent { id } => Ok(store.set_current(&id)?),

        SessionCommands::Delete { id } => Ok(store.delete_session(&id)?),

        SessionCommands::Configure {
            description,
            model,
            prompt,
            rename,
        } => sessions::configure(
            store,
            ConfigureOptions {
                description,
                model,
                prompt,
                rename,
            },
        ),
    }
}

/// Open the store at the explicit path or the platform default location.
fn open_store(db_path: Option<PathBuf>) -> Result<Store, CliError> {
    let path = db_path.unwrap_or_else(default_db_path);
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    Ok(Store::open(path)?)
}

/// Platform data directory, falling back to the working directory when none
/// can be resolved.
fn default_db_path() -> PathBuf {
    match dirs::data_dir() {
        Some(dir) => dir.join("parley").join("parley.redb"),
        None => {
            tracing::warn!("no data directory available; using the working directory");
            PathBuf::from("parley.redb")
        }
    }
}
