use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{commands::command_error::CommandError, resp::RespValue, state::State};

/// Opens a transaction for this connection. From here until EXEC or DISCARD
/// the dispatcher queues the connection's commands instead of running them.
pub async fn multi(
    connection_id: &str,
    state: Arc<Mutex<State>>,
    arguments: Vec<String>,
) -> Result<String, CommandError> {
    if !arguments.is_empty() {
        return Err(CommandError::WrongArity("multi"));
    }

    let mut state_guard = state.lock().await;
    state_guard.start_transaction(connection_id.to_string())?;

    Ok(RespValue::SimpleString("OK".to_string()).encode())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::Mutex;

    use super::multi;
    use crate::commands::CommandError;
    use crate::state::{State, StateError, TxStatus};

    #[tokio::test]
    async fn test_multi_opens_a_transaction() {
        let state = Arc::new(Mutex::new(State::new()));

        assert_eq!(
            multi("conn-1", Arc::clone(&state), vec![]).await,
            Ok("+OK\r\n".to_string())
        );
        assert_eq!(
            state.lock().await.transaction_status("conn-1"),
            Some(TxStatus::Active)
        );
    }

    #[tokio::test]
    async fn test_nested_multi_is_rejected() {
        let state = Arc::new(Mutex::new(State::new()));

        multi("conn-1", Arc::clone(&state), vec![]).await.unwrap();

        assert_eq!(
            multi("conn-1", Arc::clone(&state), vec![]).await,
            Err(CommandError::TransactionError(
                StateError::TransactionAlreadyOpen
            ))
        );
        assert_eq!(
            multi("conn-1", state, vec!["extra".to_string()]).await,
            Err(CommandError::WrongArity("multi"))
        );
    }
}
