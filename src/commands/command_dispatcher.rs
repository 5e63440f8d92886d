use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::{
    commands::{
        CommandError, CommandHandler, echo::echo, get::get, incr::incr, info::info, ping::ping,
        psync::psync, replconf::replconf, set::set,
        transactions::{discard, exec, multi},
        type_command::type_command, xadd::xadd, xrange::xrange, xread::xread,
    },
    key_value_store::KeyValueStore,
    replication::ReplicationInfo,
    resp::RespValue,
    state::{State, TxStatus},
};

/// Routes one decoded request to its handler and produces the encoded reply.
///
/// The dispatcher owns handles to all shared state so that the registry of
/// handlers is fixed once at startup; the connection id travels as an
/// explicit parameter and scopes transactions to their connection.
pub struct CommandDispatcher {
    store: Arc<Mutex<KeyValueStore>>,
    state: Arc<Mutex<State>>,
    replication: Arc<RwLock<ReplicationInfo>>,
}

impl CommandDispatcher {
    pub fn new(
        store: Arc<Mutex<KeyValueStore>>,
        state: Arc<Mutex<State>>,
        replication: Arc<RwLock<ReplicationInfo>>,
    ) -> Self {
        CommandDispatcher {
            store,
            state,
            replication,
        }
    }

    /// Decodes and dispatches a single raw request. The connection loop,
    /// which already holds the decoded frame, calls
    /// [`dispatch_frame`](Self::dispatch_frame) instead.
    pub async fn dispatch(&self, connection_id: &str, raw_request: &[u8]) -> String {
        match RespValue::decode(raw_request) {
            Ok((frame, _)) => self.dispatch_frame(connection_id, &frame, raw_request).await,
            Err(error) => error.as_string(),
        }
    }

    /// Dispatches a decoded request frame. While the connection has an
    /// `Active` transaction, everything but MULTI/EXEC/DISCARD is queued
    /// verbatim and answered `+QUEUED`; EXEC later replays the queued bytes
    /// through [`run_command`](Self::run_command), where the `Executing`
    /// status keeps this interception from re-triggering.
    pub async fn dispatch_frame(
        &self,
        connection_id: &str,
        input: &RespValue,
        raw_request: &[u8],
    ) -> String {
        let command = match CommandHandler::new(input) {
            Ok(command) => command,
            Err(error) => return error.as_string(),
        };

        if !matches!(command.name.as_str(), "MULTI" | "EXEC" | "DISCARD") {
            let mut state_guard = self.state.lock().await;

            if state_guard.transaction_status(connection_id) == Some(TxStatus::Active) {
                return match state_guard.queue_in_transaction(connection_id, raw_request.to_vec())
                {
                    Ok(()) => RespValue::SimpleString("QUEUED".to_string()).encode(),
                    Err(error) => CommandError::from(error).as_string(),
                };
            }
        }

        if command.name == "EXEC" {
            return self.run_transaction(connection_id, command.arguments).await;
        }

        self.run_command(connection_id, command).await
    }

    /// Executes the queued batch: every queued request is replayed in queue
    /// order through the full decode-and-handle pipeline, failures become
    /// per-element error frames, and the replies form one array.
    async fn run_transaction(&self, connection_id: &str, arguments: Vec<String>) -> String {
        let queued = match exec(connection_id, Arc::clone(&self.state), arguments).await {
            Ok(queued) => queued,
            Err(error) => return error.as_string(),
        };

        let mut reply = format!("*{}\r\n", queued.len());

        for raw_request in &queued {
            // Straight to the handler table: going back through the frame
            // dispatch here would make the async call graph cyclic.
            let element = match RespValue::decode(raw_request) {
                Ok((frame, _)) => match CommandHandler::new(&frame) {
                    Ok(command) => self.run_command(connection_id, command).await,
                    Err(error) => error.as_string(),
                },
                Err(error) => error.as_string(),
            };

            reply.push_str(&element);
        }

        let mut state_guard = self.state.lock().await;
        let _ = state_guard.remove_transaction(connection_id);

        reply
    }

    async fn run_command(&self, connection_id: &str, command: CommandHandler) -> String {
        let result = match command.name.as_str() {
            "PING" => ping(command.arguments),
            "ECHO" => echo(command.arguments),
            "GET" => get(Arc::clone(&self.store), command.arguments).await,
            "SET" => set(Arc::clone(&self.store), command.arguments).await,
            "TYPE" => type_command(Arc::clone(&self.store), command.arguments).await,
            "INCR" => incr(Arc::clone(&self.store), command.arguments).await,
            "XADD" => {
                xadd(
                    Arc::clone(&self.store),
                    Arc::clone(&self.state),
                    command.arguments,
                )
                .await
            }
            "XRANGE" => xrange(Arc::clone(&self.store), command.arguments).await,
            "XREAD" => {
                xread(
                    connection_id,
                    Arc::clone(&self.store),
                    Arc::clone(&self.state),
                    command.arguments,
                )
                .await
            }
            "INFO" => info(Arc::clone(&self.replication), command.arguments).await,
            "REPLCONF" => replconf(command.arguments),
            "PSYNC" => psync(Arc::clone(&self.replication), command.arguments).await,
            "MULTI" => {
                multi(connection_id, Arc::clone(&self.state), command.arguments).await
            }
            "DISCARD" => {
                discard(connection_id, Arc::clone(&self.state), command.arguments).await
            }
            _ => Err(CommandError::UnsupportedCommand),
        };

        match result {
            Ok(reply) => reply,
            Err(error) => error.as_string(),
        }
    }
}
