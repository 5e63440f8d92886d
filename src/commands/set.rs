use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::{
    commands::command_error::CommandError,
    key_value_store::{DataType, KeyValueStore},
    resp::RespValue,
};

pub struct SetArguments {
    key: String,
    value: String,
    expiry: Option<Duration>,
}

impl SetArguments {
    /// Parses `key value [PX ms] ...`. Options are scanned in pairs; PX sets
    /// a millisecond expiry, anything unrecognized is skipped.
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() < 2 {
            return Err(CommandError::WrongArity("set"));
        }

        let mut expiry: Option<Duration> = None;
        let mut options = arguments[2..].iter();

        while let Some(option) = options.next() {
            if option.eq_ignore_ascii_case("px") {
                let milliseconds = options
                    .next()
                    .and_then(|value| value.parse::<u64>().ok())
                    .ok_or(CommandError::InvalidSetExpiration)?;

                expiry = Some(Duration::from_millis(milliseconds));
            }
        }

        Ok(Self {
            key: arguments[0].clone(),
            value: arguments[1].clone(),
            expiry,
        })
    }
}

/// Stores a string entry. Overwriting an existing string replaces it, but a
/// key's type is stable for its lifetime, so a key holding a stream rejects
/// the write. With PX the keyspace schedules a deferred deletion for the new
/// entry.
pub async fn set(
    store: Arc<Mutex<KeyValueStore>>,
    arguments: Vec<String>,
) -> Result<String, CommandError> {
    let set_arguments = SetArguments::parse(arguments)?;

    let mut store_guard = store.lock().await;

    if let Some(existing) = store_guard.get(&set_arguments.key) {
        if let DataType::Stream(_) = existing.data {
            return Err(CommandError::WrongDataType);
        }
    }

    store_guard.put(
        set_arguments.key,
        DataType::String(set_arguments.value),
        set_arguments.expiry,
    );

    Ok(RespValue::SimpleString("OK".to_string()).encode())
}
