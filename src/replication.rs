//! Replication metadata and the replica-side startup handshake.
//!
//! Only the handshake framing is implemented: a replica announces itself to
//! its master with four requests and discards the replies. No replication
//! stream is established afterwards.

use rand::distr::{Alphanumeric, SampleString};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::resp::RespValue;

#[derive(Error, Debug)]
pub enum HandshakeError {
    #[error("failed to connect to master at {address}: {source}")]
    Connect {
        address: String,
        source: std::io::Error,
    },
    #[error("handshake I/O failure during {step}: {source}")]
    Exchange {
        step: &'static str,
        source: std::io::Error,
    },
}

/// The replication section of INFO. Field names are part of the wire
/// contract; values beyond `role` and `master_replid` are the fixed defaults
/// of a server with no attached replicas.
#[derive(Debug, Clone)]
pub struct ReplicationInfo {
    pub role: &'static str,
    pub connected_slaves: u32,
    pub master_replid: String,
    pub master_repl_offset: u64,
    pub second_repl_offset: i64,
    pub repl_backlog_active: u32,
    pub repl_backlog_size: u64,
    pub repl_backlog_first_byte_offset: u64,
    pub repl_backlog_histlen: u64,
}

impl ReplicationInfo {
    pub fn new(is_replica: bool) -> Self {
        ReplicationInfo {
            role: if is_replica { "slave" } else { "master" },
            connected_slaves: 0,
            master_replid: Alphanumeric.sample_string(&mut rand::rng(), 40),
            master_repl_offset: 0,
            second_repl_offset: -1,
            repl_backlog_active: 0,
            repl_backlog_size: 1048576,
            repl_backlog_first_byte_offset: 0,
            repl_backlog_histlen: 0,
        }
    }

    /// Renders the record as CRLF-separated `key:value` lines, the payload
    /// of the INFO bulk-string reply.
    pub fn render(&self) -> String {
        [
            format!("role:{}", self.role),
            format!("connected_slaves:{}", self.connected_slaves),
            format!("master_replid:{}", self.master_replid),
            format!("master_repl_offset:{}", self.master_repl_offset),
            format!("second_repl_offset:{}", self.second_repl_offset),
            format!("repl_backlog_active:{}", self.repl_backlog_active),
            format!("repl_backlog_size:{}", self.repl_backlog_size),
            format!(
                "repl_backlog_first_byte_offset:{}",
                self.repl_backlog_first_byte_offset
            ),
            format!("repl_backlog_histlen:{}", self.repl_backlog_histlen),
        ]
        .join("\r\n")
    }
}

/// Runs the four-step handshake against the master: PING, REPLCONF
/// listening-port, REPLCONF capa, PSYNC. Each reply is read (up to 4 KiB)
/// and discarded; the connection is dropped once the last step completes.
pub async fn perform_handshake(
    host: &str,
    port: u32,
    listening_port: u32,
) -> Result<(), HandshakeError> {
    let address = format!("{}:{}", host, port);

    let mut stream =
        TcpStream::connect(&address)
            .await
            .map_err(|source| HandshakeError::Connect {
                address: address.clone(),
                source,
            })?;

    info!(master = %address, "starting replication handshake");

    let own_port = listening_port.to_string();

    let steps: [(&'static str, RespValue); 4] = [
        ("PING", RespValue::command(["PING"])),
        (
            "REPLCONF listening-port",
            RespValue::command(["REPLCONF", "listening-port", own_port.as_str()]),
        ),
        (
            "REPLCONF capa",
            RespValue::command(["REPLCONF", "capa", "psync2"]),
        ),
        ("PSYNC", RespValue::command(["PSYNC", "?", "-1"])),
    ];

    for (step, request) in steps {
        send_and_discard_reply(&mut stream, step, request).await?;
        debug!(step, "handshake step acknowledged");
    }

    Ok(())
}

async fn send_and_discard_reply(
    stream: &mut TcpStream,
    step: &'static str,
    request: RespValue,
) -> Result<(), HandshakeError> {
    let exchange_error = |source| HandshakeError::Exchange { step, source };

    stream
        .write_all(request.encode().as_bytes())
        .await
        .map_err(exchange_error)?;
    stream.flush().await.map_err(exchange_error)?;

    let mut reply = [0u8; 4096];
    let _ = stream.read(&mut reply).await.map_err(exchange_error)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::{ReplicationInfo, perform_handshake};

    #[test]
    fn test_replication_info_render() {
        let mut info = ReplicationInfo::new(false);
        info.master_replid = "8371b4fb1155b71f4a04d3e1bc3e18c4a990aeeb".to_string();

        assert_eq!(
            info.render(),
            "role:master\r\n\
             connected_slaves:0\r\n\
             master_replid:8371b4fb1155b71f4a04d3e1bc3e18c4a990aeeb\r\n\
             master_repl_offset:0\r\n\
             second_repl_offset:-1\r\n\
             repl_backlog_active:0\r\n\
             repl_backlog_size:1048576\r\n\
             repl_backlog_first_byte_offset:0\r\n\
             repl_backlog_histlen:0"
        );
    }

    #[test]
    fn test_replid_shape() {
        let info = ReplicationInfo::new(true);
        assert_eq!(info.role, "slave");
        assert_eq!(info.master_replid.len(), 40);
        assert!(info.master_replid.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[tokio::test]
    async fn test_handshake_sends_four_steps() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let master_port = listener.local_addr().unwrap().port() as u32;

        let master = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            let mut buffer = [0u8; 4096];

            for _ in 0..4 {
                let read = socket.read(&mut buffer).await.unwrap();
                received.extend_from_slice(&buffer[..read]);
                socket.write_all(b"+OK\r\n").await.unwrap();
            }

            received
        });

        perform_handshake("127.0.0.1", master_port, 6380)
            .await
            .expect("handshake should complete");

        let received = String::from_utf8(master.await.unwrap()).unwrap();
        assert_eq!(
            received,
            "*1\r\n$4\r\nPING\r\n\
             *3\r\n$8\r\nREPLCONF\r\n$14\r\nlistening-port\r\n$4\r\n6380\r\n\
             *3\r\n$8\r\nREPLCONF\r\n$4\r\ncapa\r\n$6\r\npsync2\r\n\
             *3\r\n$5\r\nPSYNC\r\n$1\r\n?\r\n$2\r\n-1\r\n"
        );
    }

    #[tokio::test]
    async fn test_handshake_fails_when_master_unreachable() {
        // Port 1 is essentially never listening.
        let result = perform_handshake("127.0.0.1", 1, 6380).await;
        assert!(result.is_err());
    }
}
