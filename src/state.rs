//! Shared per-server state that is not the keyspace: the per-connection
//! transaction table and the registry of blocked stream readers.

use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Error, Debug, PartialEq)]
pub enum StateError {
    #[error("MULTI calls can not be nested")]
    TransactionAlreadyOpen,
    #[error("no transaction is open for this connection")]
    TransactionNotOpen,
}

impl StateError {
    pub fn as_string(&self) -> String {
        self.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TxStatus {
    /// MULTI was issued; commands are being queued.
    Active,
    /// EXEC is replaying the queue; interception must not re-trigger.
    Executing,
}

/// One open transaction: its status and the raw request bytes queued since
/// MULTI. Requests are kept unparsed because EXEC replays them through the
/// same decode-and-dispatch pipeline as freshly read input.
#[derive(Debug)]
pub struct TxUnit {
    pub status: TxStatus,
    pub queued: Vec<Vec<u8>>,
}

/// A connection blocked in XREAD, waiting for one stream key to grow. The
/// sender is signaled by XADD; capacity one is enough since a single pending
/// wakeup already forces a re-read.
#[derive(Debug)]
pub struct StreamSubscriber {
    pub connection_id: String,
    pub sender: mpsc::Sender<()>,
}

#[derive(Debug, Default)]
pub struct State {
    stream_subscribers: HashMap<String, Vec<StreamSubscriber>>,
    transactions: HashMap<String, TxUnit>,
}

impl State {
    pub fn new() -> Self {
        State::default()
    }

    pub fn add_stream_subscriber(&mut self, key: String, subscriber: StreamSubscriber) {
        self.stream_subscribers
            .entry(key)
            .or_default()
            .push(subscriber);
    }

    pub fn remove_stream_subscriber(&mut self, key: &str, connection_id: &str) {
        if let Some(subscribers) = self.stream_subscribers.get_mut(key) {
            subscribers.retain(|subscriber| subscriber.connection_id != connection_id);

            if subscribers.is_empty() {
                self.stream_subscribers.remove(key);
            }
        }
    }

    /// Wakes every reader blocked on `key`. A full channel means a wakeup is
    /// already pending and nothing is lost; a closed one means the reader is
    /// gone and its registration is dropped.
    pub fn notify_stream_subscribers(&mut self, key: &str) {
        let Some(subscribers) = self.stream_subscribers.get_mut(key) else {
            return;
        };

        subscribers.retain(|subscriber| {
            !matches!(
                subscriber.sender.try_send(()),
                Err(mpsc::error::TrySendError::Closed(_))
            )
        });

        if subscribers.is_empty() {
            self.stream_subscribers.remove(key);
        }
    }

    pub fn start_transaction(&mut self, connection_id: String) -> Result<(), StateError> {
        if self.transactions.contains_key(&connection_id) {
            return Err(StateError::TransactionAlreadyOpen);
        }

        self.transactions.insert(
            connection_id,
            TxUnit {
                status: TxStatus::Active,
                queued: Vec::new(),
            },
        );

        Ok(())
    }

    pub fn transaction_status(&self, connection_id: &str) -> Option<TxStatus> {
        self.transactions.get(connection_id).map(|unit| unit.status)
    }

    pub fn queue_in_transaction(
        &mut self,
        connection_id: &str,
        raw_request: Vec<u8>,
    ) -> Result<(), StateError> {
        let unit = self
            .transactions
            .get_mut(connection_id)
            .ok_or(StateError::TransactionNotOpen)?;

        unit.queued.push(raw_request);
        Ok(())
    }

    pub fn set_transaction_status(
        &mut self,
        connection_id: &str,
        status: TxStatus,
    ) -> Result<(), StateError> {
        let unit = self
            .transactions
            .get_mut(connection_id)
            .ok_or(StateError::TransactionNotOpen)?;

        unit.status = status;
        Ok(())
    }

    /// Snapshot of the raw requests queued in a connection's transaction.
    pub fn queued_requests(&self, connection_id: &str) -> Option<Vec<Vec<u8>>> {
        self.transactions
            .get(connection_id)
            .map(|unit| unit.queued.clone())
    }

    pub fn remove_transaction(&mut self, connection_id: &str) -> Result<TxUnit, StateError> {
        self.transactions
            .remove(connection_id)
            .ok_or(StateError::TransactionNotOpen)
    }

    /// Tears down everything owned by a closing connection: its open
    /// transaction, if any, and all of its stream registrations.
    pub fn remove_connection(&mut self, connection_id: &str) {
        self.transactions.remove(connection_id);

        self.stream_subscribers.retain(|_, subscribers| {
            subscribers.retain(|subscriber| subscriber.connection_id != connection_id);
            !subscribers.is_empty()
        });
    }
}
