use thiserror::Error;

use crate::{resp::RespValue, state::StateError};

/// Every failure a command handler can report back to a client. Each variant
/// renders to a simple-error frame; handlers have no side effects when they
/// return one of these.
#[derive(Error, Debug, PartialEq)]
pub enum CommandError {
    #[error("command not supported")]
    UnsupportedCommand,
    #[error("invalid command argument")]
    InvalidCommandArgument,
    #[error("wrong number of arguments for '{0}' command")]
    WrongArity(&'static str),
    #[error("invalid expire time in 'set' command")]
    InvalidSetExpiration,
    #[error("value is not an integer or out of range")]
    NotAnInteger,
    #[error("Invalid data type for key")]
    WrongDataType,
    #[error("{0}")]
    InvalidStreamId(String),
    #[error("syntax error")]
    SyntaxError,
    #[error("timeout is not an integer or out of range")]
    InvalidBlockDuration,
    #[error("EXEC without MULTI")]
    ExecWithoutMulti,
    #[error("DISCARD without MULTI")]
    DiscardWithoutMulti,
    #[error("{0}")]
    TransactionError(#[from] StateError),
    #[error("invalid INFO section")]
    InvalidInfoSection,
    #[error("invalid PSYNC offset")]
    InvalidPsyncOffset,
}

impl CommandError {
    /// Renders the error as an encoded simple-error frame with the `ERR`
    /// prefix the wire protocol uses.
    pub fn as_string(&self) -> String {
        RespValue::Error(format!("ERR {}", self)).encode()
    }
}
