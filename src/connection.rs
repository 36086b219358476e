//! C3 — a single pooled connection and its nonblocking state machine.

use crate::driver::{Driver, FlushStatus, PollStatus};
use crate::error::ConnectionError;
use crate::query::Query;

const SEND_RETRIES: u32 = 4;

/// Wraps one server connection: drives the nonblocking handshake, then
/// send/flush/consume for whatever work item is currently in flight.
///
/// Invariants (spec.md §3): `busy` implies `current_item` is `Some`;
/// `needs_flush` implies `busy`; a connection with `busy == false` is
/// eligible to receive the next pending work item.
pub struct Connection<D: Driver> {
    id: usize,
    conn: D::Conn,
    current_item: Option<Query<D::QueryResult>>,
    busy: bool,
    needs_flush: bool,
}

impl<D: Driver> Connection<D> {
    pub fn new(id: usize, conn: D::Conn) -> Self {
        Connection {
            id,
            conn,
            current_item: None,
            busy: false,
            needs_flush: false,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Advances the handshake state machine.
    pub fn poll_handshake(&mut self, driver: &D) -> PollStatus {
        driver.poll(&mut self.conn)
    }

    pub fn socket(&self, driver: &D) -> i32 {
        driver.socket(&self.conn)
    }

    pub fn error_message(&self, driver: &D) -> String {
        driver.error_message(&self.conn)
    }

    /// Re-initiates the handshake on a broken connection in place (a failed
    /// connection is reset, never recreated — spec.md §3).
    pub fn reset(&mut self, driver: &D) {
        if !driver.reset_start(&mut self.conn) {
            log::error!(
                "[db] pool[{}] reset_start failed: {}",
                self.id,
                driver.error_message(&self.conn)
            );
        }
    }

    /// wants-read while awaiting results; wants-write while output is
    /// still buffered (spec.md §4.3).
    pub fn wants_read(&self) -> bool {
        self.busy
    }

    pub fn wants_write(&self) -> bool {
        self.needs_flush
    }

    /// Moves `item` into the connection and initiates its send, retrying
    /// the nonblocking send up to `SEND_RETRIES` times on transient
    /// failure (spec.md §4.3, §7).
    pub fn execute(&mut self, driver: &D, item: Query<D::QueryResult>) -> bool {
        let sql = item.sql().to_string();
        let params = item.params().to_vec();
        self.current_item = Some(item);

        let mut success = false;
        for attempt in 1..=SEND_RETRIES {
            success = if params.is_empty() {
                driver.send_query(&mut self.conn, &sql)
            } else {
                driver.send_query_params(&mut self.conn, &sql, &params)
            };
            if success {
                break;
            }
            log::error!(
                "[db] pool[{}] send attempt {attempt}/{SEND_RETRIES} failed: {}",
                self.id,
                driver.error_message(&self.conn)
            );
        }

        if !success {
            let err = ConnectionError::SendFailed(driver.error_message(&self.conn));
            log::error!("[db] pool[{}] {err}", self.id);
        }

        self.busy = success;
        self.needs_flush = self.busy;
        self.busy
    }

    /// Flushes buffered output if any is pending.
    pub fn flush(&mut self, driver: &D) {
        if !self.needs_flush {
            return;
        }
        match driver.flush(&mut self.conn) {
            FlushStatus::Drained => self.needs_flush = false,
            FlushStatus::Pending => {}
            FlushStatus::Error => {
                let err = ConnectionError::FlushFailed(driver.error_message(&self.conn));
                log::error!("[db] pool[{}] {err}", self.id);
            }
        }
    }

    /// Consumes readable input; once the driver reports the result fully
    /// assembled, collects every buffered result handle and delivers them
    /// to the in-flight item's callback.
    pub fn consume(&mut self, driver: &D) {
        if !self.busy {
            return;
        }

        if !driver.consume_input(&mut self.conn) {
            let err = ConnectionError::ConsumeFailed(driver.error_message(&self.conn));
            log::error!("[db] pool[{}] {err}", self.id);
        }

        if driver.is_busy(&mut self.conn) {
            return;
        }

        let mut results = Vec::new();
        while let Some(result) = driver.get_result(&mut self.conn) {
            results.push(result);
        }

        if let Some(mut item) = self.current_item.take() {
            item.deliver(results);
        }
        self.busy = false;
    }
}
