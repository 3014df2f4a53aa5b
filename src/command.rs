//! Commands understood by the control server.
//!
//! A request is one line: the command name followed by its arguments. The
//! last argument takes the rest of the line, so values and JSON payloads may
//! contain spaces.

use crate::error::{OfflineError, OfflineResult};
use crate::utils::split_word;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Health check.
    Ping,
    /// Read a cached value.
    Get,
    /// Store a value with the default TTL.
    Set,
    /// Remove one cache entry.
    ClearKey,
    /// Remove every cache entry.
    ClearAll,
    /// Number of cache entries.
    Size,
    /// Cache counters.
    Stats,
    /// Per-command timing report.
    Metrics,
    /// Queue a write: `enqueue <action> <json payload>`.
    Enqueue,
    /// List pending writes.
    Queue,
    /// Report the host online; triggers a replay.
    Online,
    /// Report the host offline.
    Offline,
    /// Replay pending writes now.
    Sync,
}

impl Command {
    /// Parse a command name (case-insensitive).
    pub fn parse(s: &str) -> OfflineResult<Command> {
        let cmd = match s.to_lowercase().as_str() {
            "ping" => Command::Ping,
            "get" => Command::Get,
            "set" => Command::Set,
            "clear-key" | "clear" | "del" => Command::ClearKey,
            "clear-all" => Command::ClearAll,
            "size" | "get-size" => Command::Size,
            "stats" | "info" => Command::Stats,
            "metrics" => Command::Metrics,
            "enqueue" => Command::Enqueue,
            "queue" => Command::Queue,
            "online" => Command::Online,
            "offline" => Command::Offline,
            "sync" => Command::Sync,
            _ => return Err(OfflineError::InvalidCommand(s.to_string())),
        };
        Ok(cmd)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Ping => "ping",
            Command::Get => "get",
            Command::Set => "set",
            Command::ClearKey => "clear-key",
            Command::ClearAll => "clear-all",
            Command::Size => "size",
            Command::Stats => "stats",
            Command::Metrics => "metrics",
            Command::Enqueue => "enqueue",
            Command::Queue => "queue",
            Command::Online => "online",
            Command::Offline => "offline",
            Command::Sync => "sync",
        }
    }

    /// Number of arguments the command takes.
    pub fn arity(&self) -> usize {
        match self {
            Command::Get | Command::ClearKey => 1,
            Command::Set | Command::Enqueue => 2,
            _ => 0,
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A parsed request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub command: Command,
    pub args: Vec<String>,
}

impl Request {
    pub fn new(command: Command, args: Vec<String>) -> Self {
        Self { command, args }
    }

    /// Parse a request line. Arguments beyond the command's arity are kept
    /// as part of the last argument.
    pub fn parse(line: &str) -> OfflineResult<Request> {
        let (name, mut rest) = split_word(line);
        if name.is_empty() {
            return Err(OfflineError::ParseError("empty command".to_string()));
        }
        let command = Command::parse(name)?;
        let arity = command.arity();

        let mut args = Vec::with_capacity(arity);
        for i in 0..arity {
            let arg = if i + 1 == arity {
                let last = rest.trim();
                rest = "";
                last
            } else {
                let (word, tail) = split_word(rest);
                rest = tail;
                word
            };

            if arg.is_empty() {
                return Err(OfflineError::MissingArgument {
                    command: command.as_str(),
                    expected: arity,
                });
            }
            args.push(arg.to_string());
        }

        Ok(Request { command, args })
    }

    /// Render the request as a protocol line.
    pub fn encode(&self) -> String {
        let mut line = self.command.as_str().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    pub fn arg(&self, index: usize) -> &str {
        self.args.get(index).map(String::as_str).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("get").unwrap(), Command::Get);
        assert_eq!(Command::parse("GET").unwrap(), Command::Get);
        assert_eq!(Command::parse("clear-key").unwrap(), Command::ClearKey);
        assert_eq!(Command::parse("get-size").unwrap(), Command::Size);
        assert_eq!(Command::parse("sync").unwrap(), Command::Sync);
        assert!(Command::parse("unknown").is_err());
    }

    #[test]
    fn test_as_str_round_trips_through_parse() {
        for cmd in [Command::ClearAll, Command::Enqueue, Command::Offline, Command::Metrics] {
            assert_eq!(Command::parse(cmd.as_str()).unwrap(), cmd);
        }
    }

    #[test]
    fn test_request_last_argument_takes_rest() {
        let req = Request::parse(r#"enqueue create {"name": "X", "city": "Jeddah"}"#).unwrap();
        assert_eq!(req.command, Command::Enqueue);
        assert_eq!(req.arg(0), "create");
        assert_eq!(req.arg(1), r#"{"name": "X", "city": "Jeddah"}"#);
    }

    #[test]
    fn test_request_set_value_with_spaces() {
        let req = Request::parse("set greeting   hello world").unwrap();
        assert_eq!(req.args, vec!["greeting", "hello world"]);
    }

    #[test]
    fn test_request_missing_argument() {
        let err = Request::parse("set only-key").unwrap_err();
        assert!(matches!(
            err,
            OfflineError::MissingArgument {
                command: "set",
                expected: 2
            }
        ));
        assert!(Request::parse("get").is_err());
    }

    #[test]
    fn test_request_without_arguments_ignores_trailing_text() {
        let req = Request::parse("ping please").unwrap();
        assert_eq!(req.command, Command::Ping);
        assert!(req.args.is_empty());
    }

    #[test]
    fn test_encode() {
        let req = Request::new(Command::Set, vec!["k".into(), "v w".into()]);
        assert_eq!(req.encode(), "set k v w");
        assert_eq!(Request::parse(&req.encode()).unwrap(), req);
    }
}
