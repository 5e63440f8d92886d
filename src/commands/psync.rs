use std::sync::Arc;

use tokio::sync::RwLock;

use crate::{
    commands::command_error::CommandError, replication::ReplicationInfo, resp::RespValue,
};

pub struct PsyncArguments;

impl PsyncArguments {
    /// `PSYNC <replid|?> <offset|-1>`. The offset must at least parse; the
    /// requested replid is not checked since no partial resync exists.
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 2 {
            return Err(CommandError::WrongArity("psync"));
        }

        arguments[1]
            .parse::<i64>()
            .map_err(|_| CommandError::InvalidPsyncOffset)?;

        Ok(Self)
    }
}

/// Invites the replica to a full resynchronization. Only the FULLRESYNC
/// reply line is produced; no snapshot transfer follows.
pub async fn psync(
    replication: Arc<RwLock<ReplicationInfo>>,
    arguments: Vec<String>,
) -> Result<String, CommandError> {
    PsyncArguments::parse(arguments)?;

    let replication_guard = replication.read().await;

    Ok(RespValue::SimpleString(format!(
        "FULLRESYNC {} {}",
        replication_guard.master_replid, replication_guard.master_repl_offset
    ))
    .encode())
}
