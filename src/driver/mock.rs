//! An in-memory [`Driver`] double used by the test suite.
//!
//! Handshakes complete immediately (no `Reading`/`Writing` phase) unless the
//! whole batch is scripted to fail up front, or a specific connection is
//! armed to fail mid-run via [`MockDriver::fail_connection`]. Each mock
//! connection owns one end of a real `socketpair(2)` so that the event
//! loop's genuine `select(2)` call sees a valid, always-readable file
//! descriptor; completion timing is driven by an explicit countdown rather
//! than real bytes on the wire, which is what lets these tests run without a
//! PostgreSQL server.

use std::collections::{HashMap, VecDeque};
use std::os::unix::io::RawFd;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{Driver, FlushStatus, PollStatus};
use crate::error::PoolError;
use crate::param::Parameter;

pub struct MockConn {
    id: usize,
    fd: RawFd,
    busy: bool,
    /// Number of `is_busy` polls before a result becomes available.
    settle_after: u32,
    pending_results: VecDeque<MockResult>,
}

impl Drop for MockConn {
    fn drop(&mut self) {
        unsafe { libc::close(self.fd) };
    }
}

#[derive(Debug, Clone)]
pub struct MockResult {
    pub status_ok: bool,
}

/// Shared knobs the test harness can flip while the pool's I/O thread runs.
#[derive(Default)]
pub struct MockScript {
    pub settle_after: u32,
    pub results_per_query: usize,
    pub fail_all_handshakes: bool,
}

#[derive(Clone)]
pub struct MockDriver {
    script: Arc<MockScript>,
    /// One-shot steady-state failures, keyed by connection id. Armed by
    /// [`MockDriver::fail_connection`] and consumed by the next `poll` for
    /// that connection, so a test can simulate the server closing one
    /// connection mid-run (spec.md §8 scenario 5) without it failing
    /// forever afterward.
    armed_failures: Arc<Mutex<HashMap<usize, bool>>>,
    /// Connection ids `reset_start` has been called for, in call order —
    /// lets a test assert the pool actually reset the connection it
    /// observed as failed.
    resets: Arc<Mutex<Vec<usize>>>,
}

impl MockDriver {
    pub fn new(script: MockScript) -> Self {
        MockDriver {
            script: Arc::new(script),
            armed_failures: Arc::new(Mutex::new(HashMap::new())),
            resets: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Arms a one-shot steady-state failure for connection `id`: the next
    /// `poll` on that connection reports `PollStatus::Failed`, as if the
    /// server had closed it, then the connection behaves normally again.
    pub fn fail_connection(&self, id: usize) {
        self.armed_failures.lock().insert(id, true);
    }

    /// Connection ids `reset_start` has been invoked for, in call order.
    pub fn resets(&self) -> Vec<usize> {
        self.resets.lock().clone()
    }
}

fn make_socketpair() -> (RawFd, RawFd) {
    let mut fds: [i32; 2] = [0, 0];
    let ret = unsafe {
        libc::socketpair(libc::AF_UNIX, libc::SOCK_STREAM, 0, fds.as_mut_ptr())
    };
    assert_eq!(ret, 0, "socketpair failed");
    (fds[0], fds[1])
}

impl Driver for MockDriver {
    type Conn = MockConn;
    type QueryResult = MockResult;

    fn connect_all(
        &self,
        count: usize,
        _params: &HashMap<String, String>,
    ) -> Result<Vec<Self::Conn>, PoolError> {
        if self.script.fail_all_handshakes {
            return Err(PoolError::Connect {
                id: 0,
                message: "mock handshake failure".into(),
            });
        }
        let mut conns = Vec::with_capacity(count);
        for id in 0..count {
            let (mine, theirs) = make_socketpair();
            unsafe { libc::close(theirs) };
            conns.push(MockConn {
                id,
                fd: mine,
                busy: false,
                settle_after: self.script.settle_after,
                pending_results: VecDeque::new(),
            });
        }
        Ok(conns)
    }

    fn poll(&self, conn: &mut Self::Conn) -> PollStatus {
        if self.armed_failures.lock().remove(&conn.id).is_some() {
            return PollStatus::Failed;
        }
        PollStatus::Ok
    }

    fn socket(&self, conn: &Self::Conn) -> RawFd {
        conn.fd
    }

    fn reset_start(&self, conn: &mut Self::Conn) -> bool {
        self.resets.lock().push(conn.id);
        true
    }

    fn send_query(&self, conn: &mut Self::Conn, _sql: &str) -> bool {
        conn.busy = true;
        for _ in 0..self.script.results_per_query.max(1) {
            conn.pending_results.push_back(MockResult { status_ok: true });
        }
        true
    }

    fn send_query_params(&self, conn: &mut Self::Conn, sql: &str, _params: &[Parameter]) -> bool {
        self.send_query(conn, sql)
    }

    fn consume_input(&self, _conn: &mut Self::Conn) -> bool {
        true
    }

    fn is_busy(&self, conn: &mut Self::Conn) -> bool {
        if !conn.busy {
            return false;
        }
        if conn.settle_after > 0 {
            conn.settle_after -= 1;
            true
        } else {
            false
        }
    }

    fn get_result(&self, conn: &mut Self::Conn) -> Option<Self::QueryResult> {
        if conn.busy {
            let result = conn.pending_results.pop_front();
            if result.is_none() {
                conn.busy = false;
            }
            result
        } else {
            None
        }
    }

    fn flush(&self, _conn: &mut Self::Conn) -> FlushStatus {
        FlushStatus::Drained
    }

    fn error_message(&self, _conn: &Self::Conn) -> String {
        "mock error".to_string()
    }
}
