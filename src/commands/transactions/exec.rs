use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{
    commands::command_error::CommandError,
    state::{State, TxStatus},
};

/// Validates EXEC and hands the queued raw requests back to the dispatcher
/// for replay. The unit is flipped to `Executing` first so that replayed
/// requests are not intercepted and queued again; the dispatcher removes the
/// unit once the batch has run.
pub async fn exec(
    connection_id: &str,
    state: Arc<Mutex<State>>,
    arguments: Vec<String>,
) -> Result<Vec<Vec<u8>>, CommandError> {
    if !arguments.is_empty() {
        return Err(CommandError::WrongArity("exec"));
    }

    let mut state_guard = state.lock().await;

    if state_guard.transaction_status(connection_id).is_none() {
        return Err(CommandError::ExecWithoutMulti);
    }

    state_guard.set_transaction_status(connection_id, TxStatus::Executing)?;

    Ok(state_guard
        .queued_requests(connection_id)
        .unwrap_or_default())
}
