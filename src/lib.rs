//! An in-memory key/value server speaking the RESP line protocol.
//!
//! The crate provides:
//!
//! - a frame codec for the five RESP shapes (simple string, simple error,
//!   integer, bulk string, array)
//! - a typed keyspace with millisecond TTL expiry
//! - append-only streams with id derivation, range queries, and blocking
//!   reads (XADD, XRANGE, XREAD)
//! - per-connection transactions (MULTI, EXEC, DISCARD)
//! - the replica side of the replication handshake and the matching
//!   master-side replies (INFO, REPLCONF, PSYNC)
//!
//! Each client connection runs as its own Tokio task against shared,
//! lock-guarded state.

pub mod commands;
pub mod connection;
pub mod key_value_store;
pub mod replication;
pub mod resp;
pub mod server;
pub mod state;
