//! Error types for the control surface.
//!
//! The resilience components themselves do not fail: a cache miss is `None`,
//! debounced failures go to the error handler, and executor failures feed
//! the queue's retry accounting. Errors here cover parsing commands, payloads
//! and socket I/O.

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OfflineError {
    /// The command name is not recognised.
    #[error("invalid command: '{0}'")]
    InvalidCommand(String),

    /// The request could not be decoded.
    #[error("parse error: {0}")]
    ParseError(String),

    /// A command was sent without all of its arguments.
    #[error("'{command}' expects {expected} argument(s)")]
    MissingArgument {
        command: &'static str,
        expected: usize,
    },

    /// A queued payload was not valid JSON or lacked a required field.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// The executor has no handler for a queued action.
    #[error("unknown action: '{0}'")]
    UnknownAction(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type OfflineResult<T> = Result<T, OfflineError>;
