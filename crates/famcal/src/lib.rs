//! Configuration, calendar service, diagnostics and CLI
//!
//! This crate provides the `famcal` command-line interface.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod secret;
pub mod service;
pub mod status;

pub use cli::Cli;
pub use config::{AppConfig, ConfigError, Settings};
pub use error::{ClientError, ClientResult};
pub use service::{CalendarService, EventsResponse};
pub use status::ConnectionStatus;
