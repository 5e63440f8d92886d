//! The per-connection loop: read bytes, split them into frames, dispatch,
//! write the replies back.

use std::sync::Arc;

use bytes::BytesMut;
use rand::distr::{Alphanumeric, SampleString};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::commands::CommandDispatcher;
use crate::resp::{RespError, RespValue};
use crate::state::State;

/// Serves one client connection until EOF or an I/O failure.
///
/// Each connection gets a fresh opaque id that scopes its transaction and
/// its blocked stream reads. Input accumulates in a growable buffer; a read
/// may carry several pipelined requests or a fraction of one, so after every
/// read all complete frames are drained in order and a trailing partial
/// frame is kept for the next read.
pub async fn handle_connection(
    mut stream: TcpStream,
    dispatcher: Arc<CommandDispatcher>,
    state: Arc<Mutex<State>>,
) {
    let connection_id = Alphanumeric.sample_string(&mut rand::rng(), 16);
    let mut buffer = BytesMut::with_capacity(1024);

    debug!(connection = %connection_id, "client connected");

    'serve: loop {
        match stream.read_buf(&mut buffer).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(error) => {
                warn!(connection = %connection_id, %error, "read failed");
                break;
            }
        }

        while !buffer.is_empty() {
            match RespValue::decode(&buffer) {
                Ok((frame, consumed)) => {
                    let raw_request = buffer.split_to(consumed);

                    let reply = dispatcher
                        .dispatch_frame(&connection_id, &frame, &raw_request)
                        .await;

                    if let Err(error) = write_reply(&mut stream, &reply).await {
                        warn!(connection = %connection_id, %error, "write failed");
                        break 'serve;
                    }
                }
                // A truncated frame stays in the buffer until more bytes
                // arrive.
                Err(RespError::UnexpectedEof) => break,
                Err(error) => {
                    warn!(connection = %connection_id, %error, "malformed request");

                    let failed = write_reply(&mut stream, &error.as_string()).await.is_err();
                    // The garbage offers no frame boundary to resume from.
                    buffer.clear();

                    if failed {
                        break 'serve;
                    }
                    break;
                }
            }
        }
    }

    let mut state_guard = state.lock().await;
    state_guard.remove_connection(&connection_id);

    debug!(connection = %connection_id, "client disconnected");
}

async fn write_reply(stream: &mut TcpStream, reply: &str) -> tokio::io::Result<()> {
    stream.write_all(reply.as_bytes()).await?;
    stream.flush().await
}
