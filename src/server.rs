//! Server configuration and the accept loop.

use std::sync::Arc;

use regex::Regex;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::commands::CommandDispatcher;
use crate::connection::handle_connection;
use crate::key_value_store::{KeyValueStore, spawn_expiry_watcher};
use crate::replication::{HandshakeError, ReplicationInfo, perform_handshake};
use crate::state::State;

#[derive(Error, Debug, PartialEq, Clone)]
pub enum CliError {
    #[error("missing value for {0}")]
    MissingFlagValue(&'static str),
    #[error("invalid port flag value")]
    InvalidPort,
    #[error("invalid master address")]
    InvalidMasterAddress,
    #[error("invalid master port")]
    InvalidMasterPort,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Role {
    Master,
    /// Replica of the master at (host, port); triggers the startup
    /// handshake and reports `slave` in INFO.
    Replica { host: String, port: u32 },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u32,
    pub role: Role,
}

impl Config {
    /// Builds a configuration from the raw command line.
    ///
    /// Tokens are scanned pairwise: `--port <n>` and `--replicaof
    /// "<host> <port>"` are recognized and validated; unrecognized tokens
    /// are skipped.
    pub fn from_args<I: IntoIterator<Item = String>>(args: I) -> Result<Self, CliError> {
        let mut tokens = args.into_iter().skip(1);
        let mut port: Option<u32> = None;
        let mut role: Option<Role> = None;

        while let Some(token) = tokens.next() {
            match token.as_str() {
                "--port" => {
                    let value = tokens.next().ok_or(CliError::MissingFlagValue("--port"))?;
                    port = Some(validate_port(&value, CliError::InvalidPort)?);
                }
                "--replicaof" => {
                    let value = tokens
                        .next()
                        .ok_or(CliError::MissingFlagValue("--replicaof"))?;
                    let (host, master_port) = validate_master_address(&value)?;

                    role = Some(Role::Replica {
                        host,
                        port: master_port,
                    });
                }
                _ => {}
            }
        }

        Ok(Config {
            port: port.unwrap_or(6379),
            role: role.unwrap_or(Role::Master),
        })
    }
}

fn validate_port(port: &str, error: CliError) -> Result<u32, CliError> {
    let port_number = port.parse::<u32>().map_err(|_| error.clone())?;

    if !(1..=65535).contains(&port_number) {
        return Err(error);
    }

    Ok(port_number)
}

/// Validates the `--replicaof` value: a space-separated host and port, where
/// the host is an IPv4 address or a hostname.
fn validate_master_address(master_address: &str) -> Result<(String, u32), CliError> {
    let ipv4_regex = Regex::new(r"^(\d{1,3})\.(\d{1,3})\.(\d{1,3})\.(\d{1,3})$").unwrap();
    let hostname_regex = Regex::new(r"^[a-zA-Z0-9\-\.]+$").unwrap();

    let split_address = master_address.split_whitespace().collect::<Vec<&str>>();

    if split_address.len() != 2 {
        return Err(CliError::InvalidMasterAddress);
    }

    let address = split_address[0];

    let valid_address = if let Some(captures) = ipv4_regex.captures(address) {
        captures.iter().skip(1).all(|octet| {
            octet
                .map(|m| m.as_str().parse::<u16>().map(|v| v <= 255).unwrap_or(false))
                .unwrap_or(false)
        })
    } else {
        hostname_regex.is_match(address)
    };

    if !valid_address {
        return Err(CliError::InvalidMasterAddress);
    }

    let port = validate_port(split_address[1], CliError::InvalidMasterPort)?;

    Ok((address.to_string(), port))
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to bind to port {port}: {source}")]
    Bind {
        port: u32,
        source: std::io::Error,
    },
    #[error(transparent)]
    Handshake(#[from] HandshakeError),
}

pub struct Server {
    config: Config,
    listener: TcpListener,
}

impl Server {
    /// Binds the listening socket. Kept separate from [`run`](Self::run) so
    /// callers can learn the bound address before serving, which also lets
    /// tests bind port 0.
    pub async fn bind(config: Config) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(format!("127.0.0.1:{}", config.port))
            .await
            .map_err(|source| ServerError::Bind {
                port: config.port,
                source,
            })?;

        Ok(Server { config, listener })
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Performs the replication handshake when configured as a replica,
    /// then accepts connections forever, one task per client.
    pub async fn run(self) -> Result<(), ServerError> {
        if let Role::Replica { host, port } = &self.config.role {
            perform_handshake(host, *port, self.config.port).await?;
            info!(master = %format!("{}:{}", host, port), "replication handshake complete");
        }

        let (store, expiry_rx) = KeyValueStore::new();
        let store = Arc::new(Mutex::new(store));
        spawn_expiry_watcher(Arc::clone(&store), expiry_rx);

        let state = Arc::new(Mutex::new(State::new()));
        let is_replica = matches!(self.config.role, Role::Replica { .. });
        let replication = Arc::new(RwLock::new(ReplicationInfo::new(is_replica)));

        let dispatcher = Arc::new(CommandDispatcher::new(
            store,
            Arc::clone(&state),
            replication,
        ));

        let role_name = if is_replica { "slave" } else { "master" };
        info!(port = self.config.port, role = role_name, "serving");

        loop {
            match self.listener.accept().await {
                Ok((stream, peer_address)) => {
                    debug!(peer = %peer_address, "accepted connection");

                    let dispatcher = Arc::clone(&dispatcher);
                    let state = Arc::clone(&state);

                    tokio::spawn(async move {
                        handle_connection(stream, dispatcher, state).await;
                    });
                }
                Err(error) => {
                    warn!(%error, "failed to accept connection");
                }
            }
        }
    }
}
