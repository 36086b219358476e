//! Error taxonomy.
//!
//! Only construction and handshake failure are surfaced to the caller of
//! [`crate::pool::Pool::run`]; every other failure kind in the steady-state
//! loop is logged in place and handled per-connection (see `connection.rs`).

use std::io;

/// Errors that can abort pool construction or startup.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("failed to create wakeup pipe: {0}")]
    Pipe(#[source] io::Error),

    #[error("failed to allocate connection: {0}")]
    Alloc(String),

    #[error("connection {id} failed to connect: {message}")]
    Connect { id: usize, message: String },

    #[error("connection handshake failed: {0}")]
    Handshake(String),
}

/// Errors confined to a single connection's send/flush/consume cycle.
///
/// These never cross the I/O-thread boundary; they are logged via
/// [`crate::logger`] and handled in place per spec.md §7.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("send_query failed after retries: {0}")]
    SendFailed(String),

    #[error("flush failed: {0}")]
    FlushFailed(String),

    #[error("consume_input failed: {0}")]
    ConsumeFailed(String),

    #[error("connection broken: {0}")]
    Broken(String),
}
