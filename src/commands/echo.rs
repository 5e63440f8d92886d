use crate::{commands::command_error::CommandError, resp::RespValue};

pub struct EchoArguments {
    message: String,
}

impl EchoArguments {
    pub fn parse(mut arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 1 {
            return Err(CommandError::WrongArity("echo"));
        }

        Ok(Self {
            message: arguments.remove(0),
        })
    }
}

/// Returns the single argument back as a bulk string.
pub fn echo(arguments: Vec<String>) -> Result<String, CommandError> {
    let echo_arguments = EchoArguments::parse(arguments)?;

    Ok(RespValue::BulkString(echo_arguments.message).encode())
}

#[cfg(test)]
mod tests {
    use super::echo;
    use crate::commands::CommandError;

    #[test]
    fn test_echo() {
        let test_cases = vec![
            (vec!["hey".to_string()], Ok("$3\r\nhey\r\n".to_string())),
            (vec![String::new()], Ok("$0\r\n\r\n".to_string())),
            (vec![], Err(CommandError::WrongArity("echo"))),
            (
                vec!["a".to_string(), "b".to_string()],
                Err(CommandError::WrongArity("echo")),
            ),
        ];

        for (arguments, expected) in test_cases {
            assert_eq!(echo(arguments.clone()), expected, "echoing {:?}", arguments);
        }
    }
}
