//! A4 — the driver seam.
//!
//! `connection.rs` and `pool.rs` are written against the [`Driver`] trait,
//! not against libpq directly, so the event-loop/state-machine logic can be
//! exercised in tests without a live PostgreSQL server. This mirrors the
//! teacher's own pooling abstraction, `mobc::Manager`
//! (`examples/ozontech-pg_doorman/src/mobc/lib.rs`): a small trait naming
//! the operations a pool needs from its backend, with one production
//! implementation and, here, one in-memory test double.
//!
//! The production implementation, [`libpq::LibpqDriver`], is a thin
//! wrapper over `pq-sys`'s raw bindings to libpq's nonblocking polling API —
//! the same API spec.md §6 names function-for-function.

pub mod libpq;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

use std::collections::HashMap;
use std::os::unix::io::RawFd;

use crate::error::PoolError;
use crate::param::Parameter;

/// Mirrors libpq's `PostgresPollingStatusType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    Reading,
    Writing,
    Ok,
    Failed,
}

/// Outcome of `PQflush`: drained, needs another round, or errored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushStatus {
    Drained,
    Pending,
    Error,
}

/// The operations a connection's state machine and the event loop need from
/// the wire driver. Every method name and signature corresponds 1:1 to an
/// abstract operation in spec.md §6.
pub trait Driver: Send + Sync + 'static {
    /// An open (possibly mid-handshake) connection handle.
    type Conn: Send;
    /// A single result handle as returned by `get_result`.
    type QueryResult: Send;

    /// Starts `count` nonblocking handshakes in parallel. On any single
    /// synchronous failure, already-opened handles are released and the
    /// whole batch fails (spec.md §4.3).
    fn connect_all(
        &self,
        count: usize,
        params: &HashMap<String, String>,
    ) -> Result<Vec<Self::Conn>, PoolError>;

    /// Advances the nonblocking connection handshake and reports its state.
    fn poll(&self, conn: &mut Self::Conn) -> PollStatus;

    /// The OS socket backing this connection, for readiness selection.
    fn socket(&self, conn: &Self::Conn) -> RawFd;

    /// Re-initiates the handshake on a broken connection in place.
    fn reset_start(&self, conn: &mut Self::Conn) -> bool;

    /// Sends a parameterless query. `true` on success.
    fn send_query(&self, conn: &mut Self::Conn, sql: &str) -> bool;

    /// Sends a parameterized query with text result format. `true` on success.
    fn send_query_params(&self, conn: &mut Self::Conn, sql: &str, params: &[Parameter]) -> bool;

    /// Drains readable bytes into libpq's internal buffer. `true` on success.
    fn consume_input(&self, conn: &mut Self::Conn) -> bool;

    /// `true` while a result is still being assembled.
    fn is_busy(&self, conn: &mut Self::Conn) -> bool;

    /// Pulls the next buffered result, or `None` once drained.
    fn get_result(&self, conn: &mut Self::Conn) -> Option<Self::QueryResult>;

    /// Flushes buffered output.
    fn flush(&self, conn: &mut Self::Conn) -> FlushStatus;

    /// The connection's last error message.
    fn error_message(&self, conn: &Self::Conn) -> String;
}
