//! Command-line interface definitions.
//!
//! This module defines the CLI structure for the control server and its
//! client using clap.

use clap::{Args, Parser, Subcommand};

use crate::command::{Command, Request};
use crate::config::{CacheConfig, QueueConfig};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3000;

/// Where the control server listens.
#[derive(Args, Debug, Clone)]
pub struct Endpoint {
    /// Server host.
    #[arg(long, default_value = DEFAULT_HOST)]
    pub host: String,

    /// Server port.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,
}

impl Endpoint {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Offline-resilience control server.
#[derive(Parser, Debug)]
#[command(name = "offline-server")]
#[command(author, version, about, long_about = None)]
pub struct ServerArgs {
    #[command(flatten)]
    pub endpoint: Endpoint,

    /// Maximum cache entries; 0 for unbounded.
    #[arg(long, default_value_t = 10_000)]
    pub max_capacity: usize,

    /// Default cache TTL in seconds.
    #[arg(long, default_value_t = 300)]
    pub ttl_secs: u64,

    /// Failed replays allowed before a queued write is dropped.
    #[arg(long, default_value_t = QueueConfig::DEFAULT_MAX_RETRIES)]
    pub max_retries: u32,

    /// Start in the offline state.
    #[arg(long)]
    pub offline: bool,
}

impl ServerArgs {
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .max_capacity(self.max_capacity)
            .default_ttl(std::time::Duration::from_secs(self.ttl_secs))
            .build()
    }

    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig::new().max_retries(self.max_retries).build()
    }
}

/// Offline-resilience control client.
///
/// A CLI tool for interacting with the control server.
#[derive(Parser, Debug)]
#[command(name = "offline-client")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub endpoint: Endpoint,

    /// The command to execute.
    #[clap(subcommand)]
    pub command: ClientCommand,
}

/// Available client commands.
#[derive(Subcommand, Debug)]
pub enum ClientCommand {
    /// Get a cached value by key.
    Get {
        key: String,
    },

    /// Cache a value under a key with the server's default TTL.
    Set {
        key: String,
        value: String,
    },

    /// Remove one cache entry.
    ClearKey {
        key: String,
    },

    /// Remove every cache entry.
    ClearAll,

    /// Show the number of cache entries.
    Size,

    /// Show cache and queue statistics.
    Stats,

    /// Show average handling time per command.
    Metrics,

    /// Check the server is responsive.
    Ping,

    /// Queue a write for later replay.
    ///
    /// The payload is JSON, e.g. '{"key": "city", "value": "Riyadh"}'.
    Enqueue {
        action: String,
        payload: String,
    },

    /// List pending writes.
    Queue,

    /// Mark the server online, replaying pending writes.
    Online,

    /// Mark the server offline.
    Offline,

    /// Replay pending writes now.
    Sync,
}

impl ClientCommand {
    /// The protocol request for this command.
    pub fn to_request(&self) -> Request {
        let (command, args) = match self {
            ClientCommand::Get { key } => (Command::Get, vec![key.clone()]),
            ClientCommand::Set { key, value } => (Command::Set, vec![key.clone(), value.clone()]),
            ClientCommand::ClearKey { key } => (Command::ClearKey, vec![key.clone()]),
            ClientCommand::ClearAll => (Command::ClearAll, vec![]),
            ClientCommand::Size => (Command::Size, vec![]),
            ClientCommand::Stats => (Command::Stats, vec![]),
            ClientCommand::Metrics => (Command::Metrics, vec![]),
            ClientCommand::Ping => (Command::Ping, vec![]),
            ClientCommand::Enqueue { action, payload } => {
                (Command::Enqueue, vec![action.clone(), payload.clone()])
            }
            ClientCommand::Queue => (Command::Queue, vec![]),
            ClientCommand::Online => (Command::Online, vec![]),
            ClientCommand::Offline => (Command::Offline, vec![]),
            ClientCommand::Sync => (Command::Sync, vec![]),
        };
        Request::new(command, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_get() {
        let cli = Cli::parse_from(["test", "get", "mykey"]);
        match cli.command {
            ClientCommand::Get { key } => assert_eq!(key, "mykey"),
            _ => panic!("Expected Get command"),
        }
        assert_eq!(cli.endpoint.addr(), "127.0.0.1:3000");
    }

    #[test]
    fn test_parse_endpoint() {
        let cli = Cli::parse_from(["test", "--host", "0.0.0.0", "--port", "4000", "ping"]);
        assert_eq!(cli.endpoint.addr(), "0.0.0.0:4000");
        assert!(matches!(cli.command, ClientCommand::Ping));
    }

    #[test]
    fn test_parse_clear_key() {
        let cli = Cli::parse_from(["test", "clear-key", "cities"]);
        assert_eq!(cli.command.to_request().encode(), "clear-key cities");
    }

    #[test]
    fn test_enqueue_request_round_trips() {
        let cli = Cli::parse_from(["test", "enqueue", "set", r#"{"key": "a", "value": "b"}"#]);
        let request = cli.command.to_request();
        assert_eq!(Request::parse(&request.encode()).unwrap(), request);
    }

    #[test]
    fn test_server_args() {
        let args = ServerArgs::parse_from(["server", "--max-capacity", "0", "--max-retries", "5", "--offline"]);
        assert!(args.offline);
        assert_eq!(args.cache_config().get_max_capacity(), None);
        assert_eq!(args.queue_config().get_max_retries(), 5);
        assert_eq!(args.endpoint.port, DEFAULT_PORT);
    }
}
