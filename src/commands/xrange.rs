use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{
    commands::{
        command_error::CommandError,
        stream_utils::{entries_to_resp, parse_range_end, parse_range_start},
    },
    key_value_store::{DataType, KeyValueStore, StreamId},
    resp::RespValue,
};

pub struct XrangeArguments {
    key: String,
    start: StreamId,
    end: StreamId,
}

impl XrangeArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 3 {
            return Err(CommandError::WrongArity("xrange"));
        }

        Ok(Self {
            key: arguments[0].clone(),
            start: parse_range_start(&arguments[1])?,
            end: parse_range_end(&arguments[2])?,
        })
    }
}

/// Returns the stream entries whose id falls in the inclusive interval
/// `[start, end]`, in ascending order. A missing key and an empty interval
/// both answer with an empty array.
pub async fn xrange(
    store: Arc<Mutex<KeyValueStore>>,
    arguments: Vec<String>,
) -> Result<String, CommandError> {
    let xrange_arguments = XrangeArguments::parse(arguments)?;

    let store_guard = store.lock().await;

    let Some(value) = store_guard.get(&xrange_arguments.key) else {
        return Ok(RespValue::Array(Vec::new()).encode());
    };

    let DataType::Stream(stream) = &value.data else {
        return Err(CommandError::WrongDataType);
    };

    // BTreeMap::range panics on an inverted interval.
    if xrange_arguments.start > xrange_arguments.end {
        return Ok(RespValue::Array(Vec::new()).encode());
    }

    let entries = stream.range(xrange_arguments.start..=xrange_arguments.end);

    Ok(entries_to_resp(entries).encode())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::Mutex;

    use super::xrange;
    use crate::commands::CommandError;
    use crate::key_value_store::{DataType, KeyValueStore, StreamBody, StreamId};

    fn args(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|part| part.to_string()).collect()
    }

    fn store_with_stream() -> KeyValueStore {
        let (mut store, _expiry_rx) = KeyValueStore::new();

        let mut stream = StreamBody::new();
        stream.insert(
            StreamId::new(1000, 0),
            vec![("temp".to_string(), "25".to_string())],
        );
        stream.insert(
            StreamId::new(1000, 5),
            vec![("temp".to_string(), "26".to_string())],
        );
        stream.insert(
            StreamId::new(2000, 0),
            vec![("temp".to_string(), "30".to_string())],
        );

        store.put("sensor".to_string(), DataType::Stream(stream), None);
        store.put(
            "mango".to_string(),
            DataType::String("apple".to_string()),
            None,
        );
        store
    }

    #[tokio::test]
    async fn test_xrange() {
        let store = Arc::new(Mutex::new(store_with_stream()));

        let full = "*3\r\n\
                    *2\r\n$6\r\n1000-0\r\n*2\r\n$4\r\ntemp\r\n$2\r\n25\r\n\
                    *2\r\n$6\r\n1000-5\r\n*2\r\n$4\r\ntemp\r\n$2\r\n26\r\n\
                    *2\r\n$6\r\n2000-0\r\n*2\r\n$4\r\ntemp\r\n$2\r\n30\r\n";

        let test_cases = vec![
            (args(&["sensor", "-", "+"]), Ok(full.to_string())),
            (
                args(&["sensor", "1000-1", "1999-0"]),
                Ok("*1\r\n*2\r\n$6\r\n1000-5\r\n*2\r\n$4\r\ntemp\r\n$2\r\n26\r\n".to_string()),
            ),
            (
                // A bare millisecond covers the whole millisecond at either bound.
                args(&["sensor", "1000", "1000"]),
                Ok("*2\r\n\
                    *2\r\n$6\r\n1000-0\r\n*2\r\n$4\r\ntemp\r\n$2\r\n25\r\n\
                    *2\r\n$6\r\n1000-5\r\n*2\r\n$4\r\ntemp\r\n$2\r\n26\r\n"
                    .to_string()),
            ),
            (
                args(&["sensor", "2000-0", "+"]),
                Ok("*1\r\n*2\r\n$6\r\n2000-0\r\n*2\r\n$4\r\ntemp\r\n$2\r\n30\r\n".to_string()),
            ),
            (args(&["sensor", "3000", "+"]), Ok("*0\r\n".to_string())),
            (args(&["sensor", "2000", "1000"]), Ok("*0\r\n".to_string())),
            (args(&["missing", "-", "+"]), Ok("*0\r\n".to_string())),
            (args(&["mango", "-", "+"]), Err(CommandError::WrongDataType)),
            (args(&["sensor", "-"]), Err(CommandError::WrongArity("xrange"))),
        ];

        for (arguments, expected) in test_cases {
            assert_eq!(
                xrange(Arc::clone(&store), arguments.clone()).await,
                expected,
                "ranging {:?}",
                arguments
            );
        }
    }
}
