use std::ops::Bound;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::time::Instant;

use crate::{
    commands::{
        command_error::CommandError,
        stream_utils::{entries_to_resp, parse_query_id},
    },
    key_value_store::{DataType, KeyValueStore, StreamId},
    resp::RespValue,
    state::{State, StreamSubscriber},
};

pub struct XreadArguments {
    block: Option<u64>,
    keys_and_ids: Vec<(String, String)>,
}

impl XreadArguments {
    /// Parses `[BLOCK ms] STREAMS key... id...`; the keys and ids are two
    /// halves of the same token list.
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() < 3 {
            return Err(CommandError::WrongArity("xread"));
        }

        let (block, streams_index) = if arguments[0].eq_ignore_ascii_case("block") {
            let duration_ms = arguments[1]
                .parse::<u64>()
                .map_err(|_| CommandError::InvalidBlockDuration)?;

            (Some(duration_ms), 2)
        } else {
            (None, 0)
        };

        if !arguments
            .get(streams_index)
            .is_some_and(|token| token.eq_ignore_ascii_case("streams"))
        {
            return Err(CommandError::SyntaxError);
        }

        let tokens = &arguments[streams_index + 1..];

        if tokens.is_empty() || tokens.len() % 2 != 0 {
            return Err(CommandError::WrongArity("xread"));
        }

        let half = tokens.len() / 2;
        let keys_and_ids = (0..half)
            .map(|index| (tokens[index].clone(), tokens[half + index].clone()))
            .collect();

        Ok(Self {
            block,
            keys_and_ids,
        })
    }
}

/// Reads stream entries strictly newer than a per-key id. Without BLOCK the
/// current contents are returned immediately (an empty array when nothing is
/// newer). With BLOCK the caller is parked on the keys' notifiers until an
/// XADD lands or the timeout passes; `BLOCK 0` waits indefinitely and a
/// timed-out wait answers with the null bulk string.
pub async fn xread(
    connection_id: &str,
    store: Arc<Mutex<KeyValueStore>>,
    state: Arc<Mutex<State>>,
    arguments: Vec<String>,
) -> Result<String, CommandError> {
    let xread_arguments = XreadArguments::parse(arguments)?;

    let pairs = resolve_start_ids(&store, xread_arguments.keys_and_ids).await?;

    let Some(block_ms) = xread_arguments.block else {
        let found = read_streams(&store, &pairs).await?;
        return Ok(RespValue::Array(found).encode());
    };

    // Register on the notifiers before taking the snapshot: an append that
    // lands after the snapshot signals the channel, one that lands before it
    // shows up in the snapshot, so neither can be missed.
    let (sender, receiver) = mpsc::channel(1);

    {
        let mut state_guard = state.lock().await;

        for (key, _) in &pairs {
            state_guard.add_stream_subscriber(
                key.clone(),
                StreamSubscriber {
                    connection_id: connection_id.to_string(),
                    sender: sender.clone(),
                },
            );
        }
    }
    // Only the registered clones remain; if they are torn down, the wait
    // observes a closed channel instead of hanging.
    drop(sender);

    let outcome = match read_streams(&store, &pairs).await {
        Ok(found) if !found.is_empty() => Ok(Some(found)),
        Ok(_) => wait_for_entries(&store, &pairs, receiver, block_ms).await,
        Err(error) => Err(error),
    };

    {
        let mut state_guard = state.lock().await;

        for (key, _) in &pairs {
            state_guard.remove_stream_subscriber(key, connection_id);
        }
    }

    match outcome? {
        Some(found) => Ok(RespValue::Array(found).encode()),
        None => Ok(RespValue::NullBulkString.encode()),
    }
}

/// Parks on the notifier channel, re-reading after every wakeup until some
/// stream has grown past its start id or the deadline passes. A wakeup can be
/// unproductive when the appended id is still at or below the requested start.
async fn wait_for_entries(
    store: &Arc<Mutex<KeyValueStore>>,
    pairs: &[(String, StreamId)],
    mut receiver: mpsc::Receiver<()>,
    block_ms: u64,
) -> Result<Option<Vec<RespValue>>, CommandError> {
    let deadline = (block_ms > 0).then(|| Instant::now() + Duration::from_millis(block_ms));

    loop {
        let woken = match deadline {
            None => receiver.recv().await.is_some(),
            Some(deadline) => matches!(
                tokio::time::timeout_at(deadline, receiver.recv()).await,
                Ok(Some(()))
            ),
        };

        if !woken {
            return Ok(None);
        }

        let found = read_streams(store, pairs).await?;
        if !found.is_empty() {
            return Ok(Some(found));
        }
    }
}

/// Resolves each raw start-id token. `$` snapshots the stream's current
/// maximum so only future entries match; on an absent or empty stream it
/// falls back to the smallest id.
async fn resolve_start_ids(
    store: &Arc<Mutex<KeyValueStore>>,
    keys_and_ids: Vec<(String, String)>,
) -> Result<Vec<(String, StreamId)>, CommandError> {
    let store_guard = store.lock().await;
    let mut pairs = Vec::with_capacity(keys_and_ids.len());

    for (key, token) in keys_and_ids {
        let start = if token == "$" {
            match store_guard.get(&key) {
                Some(value) => {
                    let DataType::Stream(stream) = &value.data else {
                        return Err(CommandError::WrongDataType);
                    };
                    stream.keys().next_back().copied().unwrap_or(StreamId::MIN)
                }
                None => StreamId::MIN,
            }
        } else {
            parse_query_id(&token, 0)?
        };

        pairs.push((key, start));
    }

    Ok(pairs)
}

/// Collects, per requested stream, the entries strictly greater than its
/// start id. Streams with nothing newer are omitted from the reply.
async fn read_streams(
    store: &Arc<Mutex<KeyValueStore>>,
    pairs: &[(String, StreamId)],
) -> Result<Vec<RespValue>, CommandError> {
    let store_guard = store.lock().await;
    let mut results = Vec::new();

    for (key, start) in pairs {
        let Some(value) = store_guard.get(key) else {
            continue;
        };

        let DataType::Stream(stream) = &value.data else {
            return Err(CommandError::WrongDataType);
        };

        let entries: Vec<_> = stream
            .range((Bound::Excluded(*start), Bound::Unbounded))
            .collect();

        if entries.is_empty() {
            continue;
        }

        results.push(RespValue::Array(vec![
            RespValue::BulkString(key.clone()),
            entries_to_resp(entries),
        ]));
    }

    Ok(results)
}
