//! Command-line interface parsing and handling
//!
//! This module parses command-line arguments and runs the selected command.

pub mod model_list;
pub mod say;

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::audio::{AudioClip, OpenAiTranscriber, Transcriber};
use crate::auth::{remove_endpoint_token, store_endpoint_token};
use crate::cli::model_list::list_models;
use crate::cli::say::run_say;
use crate::core::config::io::CONFIG_ENV_VAR;
use crate::core::config::Config;
use crate::core::keyring::KeyringStore;
use crate::core::models::Endpoint;
use crate::history::DbManager;
use crate::ui::chat_loop::{run_chat, ChatOptions};

pub const LOG_ENV_VAR: &str = "MMCHAT_LOG";

#[derive(Parser, Debug)]
#[command(name = "mmchat", version)]
#[command(about = "Terminal chat client for Gemini and OpenAI models")]
#[command(
    long_about = "mmchat routes each message to the selected backend (Google Gemini or OpenAI) \
and keeps the conversation history on disk.\n\n\
Authentication:\n\
  Use 'mmchat auth <endpoint>' to store an API token in the system keyring.\n\n\
Environment Variables (used when no keyring token is stored):\n\
  OPENAI_API_KEY    OpenAI API key\n\
  GEMINI_API_KEY    Google Gemini API key (GOOGLE_API_KEY also accepted)\n\
  MMCHAT_CONFIG     Path to config.toml\n\
  MMCHAT_LOG        Diagnostic log filter (e.g. 'mmchat=debug')\n\n\
In the chat loop type /help for the list of commands."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Backend to use (gemini or openai)
    #[arg(short = 'e', long, global = true, value_name = "ENDPOINT")]
    pub endpoint: Option<String>,

    /// Model to use for chat
    #[arg(short = 'm', long, global = true, value_name = "MODEL")]
    pub model: Option<String>,

    /// Append the conversation to this file
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Configuration file to use instead of the default location
    #[arg(long, global = true, value_name = "PATH", env = CONFIG_ENV_VAR)]
    pub config: Option<PathBuf>,

    /// Log in as this user without prompting
    #[arg(short = 'u', long, global = true, value_name = "NAME")]
    pub user: Option<String>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Start the chat interface (default)
    Chat,
    /// List the models available for each backend
    Models {
        /// Only list models for this backend
        endpoint: Option<String>,
    },
    /// Send a single prompt and print the reply
    Say {
        #[arg(required = true, trailing_var_arg = true)]
        prompt: Vec<String>,
        /// Attach a JPEG or PNG image
        #[arg(long, value_name = "PATH")]
        image: Option<PathBuf>,
    },
    /// Print the transcription of an audio file
    Transcribe { file: PathBuf },
    /// List stored conversations
    Sessions,
    /// Delete the stored history of a conversation
    DeleteSession { key: String },
    /// Store an API token for a backend in the system keyring
    Auth { endpoint: String },
    /// Remove a stored API token
    Deauth { endpoint: String },
    /// Print the effective configuration
    Config,
    /// Point a backend at a different API base URL and save it to the config
    SetBaseUrl { endpoint: String, url: String },
}

pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let config_path = args.config.clone();

    match args.command.unwrap_or(Commands::Chat) {
        Commands::Chat => {
            run_chat(ChatOptions {
                endpoint: args.endpoint,
                model: args.model,
                log: args.log,
                config: args.config,
                user: args.user,
            })
            .await
        }
        Commands::Models { endpoint } => {
            let config = Config::load(config_path.as_deref())?;
            let endpoint = endpoint.or(args.endpoint);
            list_models(&config, endpoint.as_deref())
        }
        Commands::Say { prompt, image } => {
            let config = Config::load(config_path.as_deref())?;
            run_say(
                &config,
                prompt,
                image,
                args.endpoint.as_deref(),
                args.model.as_deref(),
            )
            .await
        }
        Commands::Transcribe { file } => {
            let config = Config::load(config_path.as_deref())?;
            let text = transcribe_file(&config, &file).await?;
            println!("{text}");
            Ok(())
        }
        Commands::Sessions => {
            let db = DbManager::open_default()?;
            let keys = db.message_repo.list_session_keys()?;
            if keys.is_empty() {
                println!("No stored conversations.");
            }
            for key in keys {
                let count = db.message_repo.load_chat_history(&key)?.len();
                println!("{key}  ({count} messages)");
            }
            db.close();
            Ok(())
        }
        Commands::DeleteSession { key } => {
            let db = DbManager::open_default()?;
            db.message_repo.delete_chat_history(&key)?;
            db.close();
            println!("✅ Deleted conversation {key}");
            Ok(())
        }
        Commands::Auth { endpoint } => {
            let endpoint: Endpoint = endpoint.parse()?;
            if let Err(e) = store_endpoint_token(&KeyringStore::new(), endpoint) {
                eprintln!("❌ Authentication failed: {e}");
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Deauth { endpoint } => {
            let endpoint: Endpoint = endpoint.parse()?;
            if let Err(e) = remove_endpoint_token(&KeyringStore::new(), endpoint) {
                eprintln!("❌ Deauthentication failed: {e}");
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Config => {
            Config::load(config_path.as_deref())?.print_all();
            Ok(())
        }
        Commands::SetBaseUrl { endpoint, url } => {
            let endpoint: Endpoint = endpoint.parse()?;
            let path = match config_path {
                Some(path) => path,
                None => Config::get_config_path()?,
            };
            let mut config = Config::load_from_path(&path)?;
            config.set_base_url(endpoint, url.trim());
            config.save_to_path(&path)?;
            println!(
                "✅ {} base URL set to {}",
                endpoint.display_name(),
                config.base_url(endpoint)
            );
            Ok(())
        }
    }
}

async fn transcribe_file(config: &Config, file: &Path) -> Result<String, Box<dyn Error>> {
    let transcriber = OpenAiTranscriber::from_config(config, Arc::new(KeyringStore::new()))?;
    let clip = AudioClip::from_path(file)?;
    Ok(transcriber.transcribe(&clip).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_is_the_default_command() {
        let args = Args::try_parse_from(["mmchat", "-e", "openai", "-m", "gpt-4"]).unwrap();
        assert_eq!(args.command, None);
        assert_eq!(args.endpoint.as_deref(), Some("openai"));
        assert_eq!(args.model.as_deref(), Some("gpt-4"));
    }

    #[test]
    fn say_collects_prompt_words_and_image() {
        let args = Args::try_parse_from([
            "mmchat", "say", "--image", "cat.png", "what", "is", "this?",
        ])
        .unwrap();
        assert_eq!(
            args.command,
            Some(Commands::Say {
                prompt: vec!["what".into(), "is".into(), "this?".into()],
                image: Some(PathBuf::from("cat.png")),
            })
        );
    }

    #[test]
    fn say_requires_a_prompt() {
        assert!(Args::try_parse_from(["mmchat", "say"]).is_err());
    }

    #[test]
    fn global_flags_work_after_subcommand() {
        let args =
            Args::try_parse_from(["mmchat", "models", "--config", "/tmp/mm.toml", "gemini"]).unwrap();
        assert_eq!(args.config, Some(PathBuf::from("/tmp/mm.toml")));
        assert_eq!(
            args.command,
            Some(Commands::Models {
                endpoint: Some("gemini".into())
            })
        );
    }

    #[test]
    fn session_management_commands_parse() {
        let args = Args::try_parse_from(["mmchat", "delete-session", "abc123"]).unwrap();
        assert_eq!(
            args.command,
            Some(Commands::DeleteSession {
                key: "abc123".into()
            })
        );
        let args = Args::try_parse_from(["mmchat", "set-base-url", "openai", "http://localhost:8080/v1"])
            .unwrap();
        assert!(matches!(args.command, Some(Commands::SetBaseUrl { .. })));
    }
}
