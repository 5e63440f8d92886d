//! The keyspace: typed entries with millisecond TTL expiry, plus the stream
//! storage types.
//!
//! Expiry is active: every `put` with an expiry spawns a sleeper that sends a
//! deletion event on the expiry channel once the deadline passes, and a
//! single watcher task consumes the channel and removes keys. Each stored
//! value carries a version number and the sleeper captures the version it
//! scheduled against, so a timer firing after the key was overwritten deletes
//! nothing. Reads also filter on the deadline, which covers the window
//! between the deadline passing and the watcher draining the event.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// Identifier of one stream entry: a millisecond timestamp and a sequence
/// number that disambiguates entries within the same millisecond. Ordering is
/// lexicographic on `(ms, seq)`, which the derived `Ord` provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamId {
    pub ms: u64,
    pub seq: u64,
}

#[derive(Error, Debug, PartialEq)]
#[error("invalid stream id")]
pub struct ParseStreamIdError;

impl StreamId {
    pub const MIN: StreamId = StreamId { ms: 0, seq: 0 };
    pub const MAX: StreamId = StreamId {
        ms: u64::MAX,
        seq: u64::MAX,
    };

    pub fn new(ms: u64, seq: u64) -> Self {
        StreamId { ms, seq }
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

impl FromStr for StreamId {
    type Err = ParseStreamIdError;

    /// Parses the explicit `ms-seq` form. The looser forms clients may send
    /// (`ms` alone, `ms-*`, `*`, `-`, `+`, `$`) are resolved by the command
    /// layer before a `StreamId` exists.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (ms, seq) = input.split_once('-').ok_or(ParseStreamIdError)?;

        Ok(StreamId {
            ms: ms.parse().map_err(|_| ParseStreamIdError)?,
            seq: seq.parse().map_err(|_| ParseStreamIdError)?,
        })
    }
}

/// Field/value pairs of one stream entry, in the order the client sent them.
pub type StreamEntry = Vec<(String, String)>;

/// Append-only ordered map backing a stream-typed key.
pub type StreamBody = BTreeMap<StreamId, StreamEntry>;

#[derive(Debug, PartialEq)]
pub enum DataType {
    String(String),
    Stream(StreamBody),
}

impl DataType {
    /// The type name reported by TYPE. Missing keys report `none` at the
    /// command layer.
    pub fn type_name(&self) -> &'static str {
        match self {
            DataType::String(_) => "string",
            DataType::Stream(_) => "stream",
        }
    }
}

#[derive(Debug)]
pub struct Value {
    pub data: DataType,
    pub expires_at: Option<Instant>,
    version: u64,
}

impl Value {
    fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|deadline| Instant::now() > deadline)
    }
}

/// Deferred-deletion message produced by a TTL sleeper.
#[derive(Debug)]
pub struct ExpiryEvent {
    key: String,
    version: u64,
}

#[derive(Debug)]
pub struct KeyValueStore {
    entries: HashMap<String, Value>,
    next_version: u64,
    expiry_tx: mpsc::UnboundedSender<ExpiryEvent>,
}

impl KeyValueStore {
    /// Creates an empty store together with the receiving end of its expiry
    /// channel; the caller hands the receiver to [`spawn_expiry_watcher`].
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ExpiryEvent>) {
        let (expiry_tx, expiry_rx) = mpsc::unbounded_channel();

        (
            KeyValueStore {
                entries: HashMap::new(),
                next_version: 0,
                expiry_tx,
            },
            expiry_rx,
        )
    }

    /// Stores `data` under `key`, replacing any existing entry. With an
    /// expiry, a deferred deletion is scheduled for the new version of the
    /// key. A later `put` of the same key does not cancel earlier timers;
    /// the version check at fire time makes them inert.
    pub fn put(&mut self, key: String, data: DataType, expiry: Option<Duration>) {
        let version = self.next_version;
        self.next_version += 1;

        let expires_at = expiry.map(|ttl| Instant::now() + ttl);

        self.entries.insert(
            key.clone(),
            Value {
                data,
                expires_at,
                version,
            },
        );

        if let Some(ttl) = expiry {
            let expiry_tx = self.expiry_tx.clone();

            tokio::spawn(async move {
                tokio::time::sleep(ttl).await;
                let _ = expiry_tx.send(ExpiryEvent { key, version });
            });
        }
    }

    /// Looks up a live entry; keys past their deadline read as absent even
    /// before the watcher removes them.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key).filter(|value| !value.is_expired())
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries
            .get_mut(key)
            .filter(|value| !value.is_expired())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    /// Removes `key` only if the stored version still matches the one the
    /// expiry timer captured; an intervening overwrite keeps the entry.
    fn remove_if_version(&mut self, key: &str, version: u64) -> bool {
        match self.entries.get(key) {
            Some(value) if value.version == version => {
                self.entries.remove(key);
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Runs the expiry watcher: consumes deferred-deletion events and removes
/// matching keys under the store lock. The task ends when every sender is
/// gone, i.e. when the store itself is dropped.
pub fn spawn_expiry_watcher(
    store: Arc<Mutex<KeyValueStore>>,
    mut expiry_rx: mpsc::UnboundedReceiver<ExpiryEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = expiry_rx.recv().await {
            let mut store_guard = store.lock().await;

            if store_guard.remove_if_version(&event.key, event.version) {
                debug!(key = %event.key, "expired key removed");
            }
        }
    })
}
