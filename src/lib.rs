//! mmchat is a terminal chat client that routes each turn to Google Gemini or
//! OpenAI.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns per-session state, the model catalog, backend dispatch and
//!   the chat turn itself.
//! - [`ui`] runs the interactive login and chat loop.
//! - [`commands`] implements the slash commands used by the chat loop.
//! - [`documents`], [`history`] and [`audio`] are the collaborators a turn
//!   relies on: document retrieval, stored conversations and transcription.
//! - [`api`] defines the wire payloads used by the backend clients.
//!
//! The binary (`src/main.rs`) routes through [`crate::cli::main`].

pub mod api;
pub mod audio;
pub mod auth;
pub mod cli;
pub mod commands;
pub mod core;
pub mod documents;
pub mod history;
pub mod ui;
pub mod utils;
