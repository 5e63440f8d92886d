use crate::{commands::command_error::CommandError, resp::RespValue};

/// Replication configuration exchange. Every REPLCONF a master receives
/// during a handshake is acknowledged with `+OK`; the options themselves are
/// not acted on.
pub fn replconf(_arguments: Vec<String>) -> Result<String, CommandError> {
    Ok(RespValue::SimpleString("OK".to_string()).encode())
}

#[cfg(test)]
mod tests {
    use super::replconf;

    #[test]
    fn test_replconf_always_acknowledges() {
        let test_cases = vec![
            vec![],
            vec!["listening-port".to_string(), "6380".to_string()],
            vec!["capa".to_string(), "psync2".to_string()],
        ];

        for arguments in test_cases {
            assert_eq!(replconf(arguments), Ok("+OK\r\n".to_string()));
        }
    }
}
