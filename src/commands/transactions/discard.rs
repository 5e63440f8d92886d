use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{commands::command_error::CommandError, resp::RespValue, state::State};

/// Drops the connection's open transaction and everything it queued.
pub async fn discard(
    connection_id: &str,
    state: Arc<Mutex<State>>,
    arguments: Vec<String>,
) -> Result<String, CommandError> {
    if !arguments.is_empty() {
        return Err(CommandError::WrongArity("discard"));
    }

    let mut state_guard = state.lock().await;

    if state_guard.remove_transaction(connection_id).is_err() {
        return Err(CommandError::DiscardWithoutMulti);
    }

    Ok(RespValue::SimpleString("OK".to_string()).encode())
}
