pub mod app;
pub mod backends;
pub mod builtin_models;
pub mod chat;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod keyring;
pub mod message;
pub mod models;
pub mod providers;
pub mod session;
