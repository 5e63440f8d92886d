use crate::{commands::CommandError, resp::RespValue};

/// A client request pulled apart into its command name and argument strings.
///
/// Requests arrive as an array of bulk strings; the first element is the
/// command name, compared case-insensitively, and the rest are its
/// arguments.
#[derive(Debug, PartialEq, Clone)]
pub struct CommandHandler {
    /// Uppercased command name (e.g. "GET", "XADD").
    pub name: String,
    /// The remaining bulk-string arguments, unmodified.
    pub arguments: Vec<String>,
}

impl CommandHandler {
    pub fn new(input: &RespValue) -> Result<Self, CommandError> {
        let RespValue::Array(elements) = input else {
            return Err(CommandError::UnsupportedCommand);
        };

        let name = match elements.first() {
            Some(RespValue::BulkString(name)) => name.to_uppercase(),
            Some(_) => return Err(CommandError::InvalidCommandArgument),
            None => return Err(CommandError::UnsupportedCommand),
        };

        let mut arguments = Vec::with_capacity(elements.len() - 1);

        for element in &elements[1..] {
            let RespValue::BulkString(argument) = element else {
                return Err(CommandError::InvalidCommandArgument);
            };
            arguments.push(argument.clone());
        }

        Ok(Self { name, arguments })
    }
}
