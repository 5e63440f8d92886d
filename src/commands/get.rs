use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{
    commands::command_error::CommandError,
    key_value_store::{DataType, KeyValueStore},
    resp::RespValue,
};

pub struct GetArguments {
    key: String,
}

impl GetArguments {
    pub fn parse(mut arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 1 {
            return Err(CommandError::WrongArity("get"));
        }

        Ok(Self {
            key: arguments.remove(0),
        })
    }
}

/// Reads a string value. Absent, expired, and non-string keys all answer
/// with the null bulk string.
pub async fn get(
    store: Arc<Mutex<KeyValueStore>>,
    arguments: Vec<String>,
) -> Result<String, CommandError> {
    let get_arguments = GetArguments::parse(arguments)?;

    let store_guard = store.lock().await;

    match store_guard.get(&get_arguments.key) {
        Some(value) => match &value.data {
            DataType::String(data) => Ok(RespValue::BulkString(data.clone()).encode()),
            _ => Ok(RespValue::NullBulkString.encode()),
        },
        None => Ok(RespValue::NullBulkString.encode()),
    }
}
