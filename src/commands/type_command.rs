use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{
    commands::command_error::CommandError,
    key_value_store::KeyValueStore,
    resp::RespValue,
};

/// Reports the entry type stored at a key: `string`, `stream`, or `none`
/// when the key is absent or expired.
pub async fn type_command(
    store: Arc<Mutex<KeyValueStore>>,
    arguments: Vec<String>,
) -> Result<String, CommandError> {
    if arguments.len() != 1 {
        return Err(CommandError::WrongArity("type"));
    }

    let store_guard = store.lock().await;

    let type_name = match store_guard.get(&arguments[0]) {
        Some(value) => value.data.type_name(),
        None => "none",
    };

    Ok(RespValue::SimpleString(type_name.to_string()).encode())
}
