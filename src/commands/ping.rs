use crate::{commands::command_error::CommandError, resp::RespValue};

pub struct PingArguments;

impl PingArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if !arguments.is_empty() {
            return Err(CommandError::WrongArity("ping"));
        }

        Ok(Self)
    }
}

/// Liveness probe; always answers `+PONG`.
pub fn ping(arguments: Vec<String>) -> Result<String, CommandError> {
    PingArguments::parse(arguments)?;

    Ok(RespValue::SimpleString("PONG".to_string()).encode())
}
