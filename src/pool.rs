//! C5 — the pool and its event loop.
//!
//! One dedicated I/O thread multiplexes every connection over a single
//! `select(2)`-driven loop: phase 1 waits for every connection to finish
//! its handshake (or aborts the whole pool on the first failure — see
//! DESIGN.md for why this crate keeps that behavior rather than continuing
//! with the healthy subset); phase 2 is the steady-state dispatch/consume/
//! flush cycle described in spec.md §4.5.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;

use crate::connection::Connection;
use crate::driver::libpq::LibpqDriver;
use crate::driver::{Driver, PollStatus};
use crate::error::{ConnectionError, PoolError};
use crate::queue::Queue;
use crate::query::Query;
use crate::select::{select, FdSet};

const STEADY_STATE_TIMEOUT: Duration = Duration::from_secs(3);

/// The connection pool: fixed size, one background I/O thread, a FIFO of
/// pending work items reachable from any producer thread.
pub struct Pool<D: Driver = LibpqDriver> {
    size: usize,
    driver: Arc<D>,
    queue: Arc<Queue<D::QueryResult>>,
    thread: Mutex<Option<JoinHandle<()>>>,
    running: Arc<AtomicBool>,
}

impl Pool<LibpqDriver> {
    /// Constructs a pool of `size` connections against the real libpq
    /// driver. No network I/O happens until [`Pool::run`].
    pub fn new(size: usize) -> Result<Self, PoolError> {
        Self::with_driver(size, LibpqDriver)
    }
}

impl<D: Driver> Pool<D> {
    /// Constructs a pool against an arbitrary [`Driver`] — the seam tests
    /// use to run the event loop against [`crate::driver::mock::MockDriver`].
    pub fn with_driver(size: usize, driver: D) -> Result<Self, PoolError> {
        Ok(Pool {
            size,
            driver: Arc::new(driver),
            queue: Arc::new(Queue::new()?),
            thread: Mutex::new(None),
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Spawns the I/O thread and starts connecting. `params` is the
    /// libpq-style keyword/value connection parameter map (`host`,
    /// `hostaddr`, `dbname`, `user`, `password`, ...).
    pub fn run(&self, params: HashMap<String, String>) {
        let driver = self.driver.clone();
        let queue = self.queue.clone();
        let size = self.size;
        let running = self.running.clone();
        running.store(true, Ordering::SeqCst);

        let handle = std::thread::spawn(move || {
            if let Err(err) = event_loop(driver, queue, size, params) {
                log::error!("[db] pool exited: {err}");
            }
            running.store(false, Ordering::SeqCst);
        });
        *self.thread.lock() = Some(handle);
    }

    /// Non-blocking submit. The callback runs on the I/O thread, exactly
    /// once, whether or not the query ever reaches the wire.
    pub fn async_query(&self, item: Query<D::QueryResult>) {
        self.queue.push(item);
    }

    /// Blocks until the I/O thread exits and the queue is cleared. Safe to
    /// call even if the I/O thread already exited on its own (e.g. after a
    /// phase-1 handshake failure).
    pub fn stop(&self) {
        self.queue.signal_stop();
        if let Some(handle) = self.thread.lock().take() {
            let _ = handle.join();
        }
        self.queue.clear();
    }

    /// True while the I/O thread is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

fn drop_deliver_all<R>(pending: &mut VecDeque<Query<R>>, queue: &Queue<R>) {
    for mut item in pending.drain(..) {
        item.deliver(Vec::new());
    }
    queue.drain_pipe();
    queue.clear();
}

fn event_loop<D: Driver>(
    driver: Arc<D>,
    queue: Arc<Queue<D::QueryResult>>,
    size: usize,
    params: HashMap<String, String>,
) -> Result<(), PoolError> {
    log::info!("[db] connection pool is created. waiting for connection");

    let raw_conns = driver.connect_all(size, &params)?;
    let mut conns: Vec<Connection<D>> = raw_conns
        .into_iter()
        .enumerate()
        .map(|(id, c)| Connection::new(id, c))
        .collect();

    let mut pending: VecDeque<Query<D::QueryResult>> = VecDeque::new();

    // Phase 1 — wait for every connection to finish its handshake.
    loop {
        let mut read_fds = FdSet::new();
        let mut write_fds = FdSet::new();
        read_fds.set(queue.read_fd());
        let mut maxfd = queue.read_fd();

        let mut all_ok = true;
        let mut failure: Option<PoolError> = None;

        for c in &mut conns {
            match c.poll_handshake(&driver) {
                PollStatus::Ok => {
                    log::info!("[db] pool[{}] connected", c.id());
                }
                PollStatus::Failed => {
                    failure = Some(PoolError::Handshake(format!(
                        "pool[{}]: {}",
                        c.id(),
                        c.error_message(&driver)
                    )));
                    break;
                }
                PollStatus::Reading => {
                    all_ok = false;
                    let fd = c.socket(&driver);
                    read_fds.set(fd);
                    maxfd = maxfd.max(fd);
                }
                PollStatus::Writing => {
                    all_ok = false;
                    let fd = c.socket(&driver);
                    write_fds.set(fd);
                    maxfd = maxfd.max(fd);
                }
            }
        }

        if let Some(err) = failure {
            drop_deliver_all(&mut pending, &queue);
            return Err(err);
        }
        if all_ok {
            break;
        }

        if select(maxfd, &mut read_fds, &mut write_fds, None) > 0 && read_fds.is_set(queue.read_fd()) {
            let (stop, new_work) = queue.drain_pipe();
            if stop {
                log::info!("[db] stop called");
                drop_deliver_all(&mut pending, &queue);
                return Ok(());
            }
            if new_work {
                queue.drain_into(&mut pending);
            }
        }
    }

    log::info!("[db] connection pool is connected");

    // Phase 2 — steady-state dispatch / consume / flush.
    loop {
        let mut read_fds = FdSet::new();
        let mut write_fds = FdSet::new();
        read_fds.set(queue.read_fd());
        let mut maxfd = queue.read_fd();

        for c in &mut conns {
            let fd = c.socket(&driver);
            match c.poll_handshake(&driver) {
                PollStatus::Ok => {
                    if !pending.is_empty() && !c.is_busy() {
                        if let Some(item) = pending.pop_front() {
                            c.execute(&driver, item);
                        }
                    }
                }
                PollStatus::Failed => {
                    let err = ConnectionError::Broken(c.error_message(&driver));
                    log::error!("[db] pool[{}] {err}", c.id());
                    c.reset(&driver);
                    read_fds.set(fd);
                    maxfd = maxfd.max(fd);
                }
                PollStatus::Reading => {
                    read_fds.set(fd);
                    maxfd = maxfd.max(fd);
                }
                PollStatus::Writing => {
                    write_fds.set(fd);
                    maxfd = maxfd.max(fd);
                }
            }

            if c.wants_read() {
                read_fds.set(fd);
                maxfd = maxfd.max(fd);
            }
            if c.wants_write() {
                write_fds.set(fd);
                maxfd = maxfd.max(fd);
            }
        }

        let ready = select(maxfd, &mut read_fds, &mut write_fds, Some(STEADY_STATE_TIMEOUT));
        if ready <= 0 {
            continue;
        }

        if read_fds.is_set(queue.read_fd()) {
            let (stop, new_work) = queue.drain_pipe();
            if stop {
                log::info!("[db] stop called");
                drop_deliver_all(&mut pending, &queue);
                return Ok(());
            }
            if new_work {
                queue.drain_into(&mut pending);
            }
        }

        for c in &mut conns {
            let fd = c.socket(&driver);
            if read_fds.is_set(fd) {
                c.consume(&driver);
            }
            if write_fds.is_set(fd) {
                c.flush(&driver);
            }
        }
    }
}
