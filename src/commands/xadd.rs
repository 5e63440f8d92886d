use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::Mutex;

use crate::{
    commands::command_error::CommandError,
    key_value_store::{DataType, KeyValueStore, StreamBody, StreamEntry, StreamId},
    resp::RespValue,
    state::State,
};

const ID_TOO_SMALL: &str =
    "The ID specified in XADD is equal or smaller than the target stream top item";
const ID_IS_ZERO: &str = "The ID specified in XADD must be greater than 0-0";
const ID_MALFORMED: &str = "Invalid stream ID specified as stream command argument";

/// A client-supplied entry id, before derivation against the stream state.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum IdPattern {
    /// `*`: both parts generated from the clock.
    Auto,
    /// `ms-*`: explicit milliseconds, generated sequence.
    AutoSeq(u64),
    /// `ms-seq`: fully explicit.
    Explicit(StreamId),
}

impl IdPattern {
    pub fn parse(token: &str) -> Result<Self, CommandError> {
        if token == "*" {
            return Ok(IdPattern::Auto);
        }

        let Some((ms, seq)) = token.split_once('-') else {
            return Err(CommandError::InvalidStreamId(ID_MALFORMED.to_string()));
        };

        let ms = ms
            .parse::<u64>()
            .map_err(|_| CommandError::InvalidStreamId(ID_MALFORMED.to_string()))?;

        if seq == "*" {
            return Ok(IdPattern::AutoSeq(ms));
        }

        let seq = seq
            .parse::<u64>()
            .map_err(|_| CommandError::InvalidStreamId(ID_MALFORMED.to_string()))?;

        Ok(IdPattern::Explicit(StreamId::new(ms, seq)))
    }
}

pub struct XaddArguments {
    key: String,
    id: IdPattern,
    entry: StreamEntry,
}

impl XaddArguments {
    /// Parses `key id field value [field value ...]`; field/value pairs keep
    /// the order the client sent them.
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() < 4 || arguments[2..].len() % 2 != 0 {
            return Err(CommandError::WrongArity("xadd"));
        }

        let id = IdPattern::parse(&arguments[1])?;

        let entry = arguments[2..]
            .chunks(2)
            .map(|pair| (pair[0].clone(), pair[1].clone()))
            .collect();

        Ok(Self {
            key: arguments[0].clone(),
            id,
            entry,
        })
    }
}

/// Appends an entry to a stream, creating the stream when the key is absent.
/// The assigned id must strictly exceed the stream's current maximum; readers
/// blocked on the key are woken while the store lock is still held, so no
/// append can slip between their snapshot and their wait.
pub async fn xadd(
    store: Arc<Mutex<KeyValueStore>>,
    state: Arc<Mutex<State>>,
    arguments: Vec<String>,
) -> Result<String, CommandError> {
    let xadd_arguments = XaddArguments::parse(arguments)?;

    let mut store_guard = store.lock().await;

    let assigned_id = match store_guard.get_mut(&xadd_arguments.key) {
        Some(value) => {
            let DataType::Stream(stream) = &mut value.data else {
                return Err(CommandError::WrongDataType);
            };

            let last = stream.keys().next_back().copied();
            let id = derive_stream_id(xadd_arguments.id, last, unix_time_ms())?;
            stream.insert(id, xadd_arguments.entry);
            id
        }
        None => {
            let id = derive_stream_id(xadd_arguments.id, None, unix_time_ms())?;
            let mut stream = StreamBody::new();
            stream.insert(id, xadd_arguments.entry);
            store_guard.put(xadd_arguments.key.clone(), DataType::Stream(stream), None);
            id
        }
    };

    let mut state_guard = state.lock().await;
    state_guard.notify_stream_subscribers(&xadd_arguments.key);

    Ok(RespValue::BulkString(assigned_id.to_string()).encode())
}

/// Resolves an id pattern against the stream's current maximum (`None` for an
/// empty or absent stream) and validates the total order.
fn derive_stream_id(
    pattern: IdPattern,
    last: Option<StreamId>,
    now_ms: u64,
) -> Result<StreamId, CommandError> {
    let too_small = || CommandError::InvalidStreamId(ID_TOO_SMALL.to_string());

    match pattern {
        IdPattern::Explicit(id) => {
            if id == StreamId::MIN {
                return Err(CommandError::InvalidStreamId(ID_IS_ZERO.to_string()));
            }

            match last {
                Some(last) if id <= last => Err(too_small()),
                _ => Ok(id),
            }
        }
        IdPattern::AutoSeq(ms) => match last {
            None => {
                // 0-* on an empty stream starts at 0-1 since 0-0 is forbidden.
                let seq = if ms == 0 { 1 } else { 0 };
                Ok(StreamId::new(ms, seq))
            }
            Some(last) if ms == last.ms => {
                let seq = last.seq.checked_add(1).ok_or_else(too_small)?;
                Ok(StreamId::new(ms, seq))
            }
            Some(last) if ms > last.ms => Ok(StreamId::new(ms, 0)),
            Some(_) => Err(too_small()),
        },
        IdPattern::Auto => match last {
            Some(last) if now_ms <= last.ms => {
                // The clock caught up with (or fell behind) the stream head;
                // stay monotonic by advancing the sequence instead.
                let seq = last.seq.checked_add(1).ok_or_else(too_small)?;
                Ok(StreamId::new(last.ms, seq))
            }
            _ => Ok(StreamId::new(now_ms, 0)),
        },
    }
}

/// Wall-clock milliseconds since the unix epoch; a clock set before the
/// epoch reads as 0.
fn unix_time_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}
