use std::sync::Arc;

use tokio::sync::RwLock;

use crate::{
    commands::command_error::CommandError, replication::ReplicationInfo, resp::RespValue,
};

pub struct InfoArguments;

impl InfoArguments {
    /// INFO takes at most one section name; only `replication` (and the
    /// default of no section) is served here.
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        match arguments.len() {
            0 => Ok(Self),
            1 if arguments[0].eq_ignore_ascii_case("replication") => Ok(Self),
            1 => Err(CommandError::InvalidInfoSection),
            _ => Err(CommandError::WrongArity("info")),
        }
    }
}

/// Replies with the replication record as `key:value` lines in one bulk
/// string.
pub async fn info(
    replication: Arc<RwLock<ReplicationInfo>>,
    arguments: Vec<String>,
) -> Result<String, CommandError> {
    InfoArguments::parse(arguments)?;

    let replication_guard = replication.read().await;

    Ok(RespValue::BulkString(replication_guard.render()).encode())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::RwLock;

    use super::info;
    use crate::commands::CommandError;
    use crate::replication::ReplicationInfo;

    #[tokio::test]
    async fn test_info() {
        let replication = Arc::new(RwLock::new(ReplicationInfo::new(false)));

        let reply = info(Arc::clone(&replication), vec![]).await.unwrap();
        assert!(reply.starts_with('$'));
        assert!(reply.contains("role:master\r\n"));
        assert!(reply.contains("master_replid:"));
        assert!(reply.contains("repl_backlog_size:1048576"));

        assert!(
            info(Arc::clone(&replication), vec!["replication".to_string()])
                .await
                .is_ok()
        );
        assert_eq!(
            info(Arc::clone(&replication), vec!["keyspace".to_string()]).await,
            Err(CommandError::InvalidInfoSection)
        );
        assert_eq!(
            info(replication, vec!["a".to_string(), "b".to_string()]).await,
            Err(CommandError::WrongArity("info"))
        );
    }

    #[tokio::test]
    async fn test_info_reports_slave_role() {
        let replication = Arc::new(RwLock::new(ReplicationInfo::new(true)));

        let reply = info(replication, vec![]).await.unwrap();
        assert!(reply.contains("role:slave\r\n"));
    }
}
