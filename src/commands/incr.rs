use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{
    commands::command_error::CommandError,
    key_value_store::{DataType, KeyValueStore},
    resp::RespValue,
};

pub struct IncrArguments {
    key: String,
}

impl IncrArguments {
    pub fn parse(mut arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 1 {
            return Err(CommandError::WrongArity("incr"));
        }

        Ok(Self {
            key: arguments.remove(0),
        })
    }
}

/// Atomically increments the integer stored at `key`, initializing a missing
/// key to 1. Values that do not parse as a signed 64-bit integer, and
/// increments that would overflow one, are rejected without modifying the
/// entry. An in-place increment keeps the entry's expiry.
pub async fn incr(
    store: Arc<Mutex<KeyValueStore>>,
    arguments: Vec<String>,
) -> Result<String, CommandError> {
    let incr_arguments = IncrArguments::parse(arguments)?;

    let mut store_guard = store.lock().await;

    let Some(value) = store_guard.get_mut(&incr_arguments.key) else {
        store_guard.put(
            incr_arguments.key,
            DataType::String("1".to_string()),
            None,
        );
        return Ok(RespValue::Integer(1).encode());
    };

    let DataType::String(stored) = &mut value.data else {
        return Err(CommandError::NotAnInteger);
    };

    let incremented = stored
        .parse::<i64>()
        .ok()
        .and_then(|current| current.checked_add(1))
        .ok_or(CommandError::NotAnInteger)?;

    *stored = incremented.to_string();

    Ok(RespValue::Integer(incremented).encode())
}
