//! C4 — the submission queue and its wakeup pipe.
//!
//! Producer threads hand work items to the I/O thread through a
//! mutex-guarded FIFO; an anonymous pipe (the same `libc::pipe` +
//! `libc::select` combination the teacher uses for its own binary-upgrade
//! readiness handshake, see `examples/ozontech-pg_doorman/src/app/server.rs`)
//! gives the I/O thread one selectable waiting primitive across both
//! sockets and producer wakeups.

use std::collections::VecDeque;
use std::io;
use std::os::unix::io::RawFd;

use parking_lot::Mutex;

use crate::error::PoolError;
use crate::query::Query;

pub const NEW_WORK: u8 = b'1';
pub const STOP: u8 = b'0';

/// Thread-safe FIFO of work items, paired with a selectable wakeup pipe.
pub struct Queue<R> {
    items: Mutex<VecDeque<Query<R>>>,
    read_fd: RawFd,
    write_fd: RawFd,
}

impl<R> Queue<R> {
    pub fn new() -> Result<Self, PoolError> {
        let mut fds: [i32; 2] = [0, 0];
        let ret = unsafe { libc::pipe(fds.as_mut_ptr()) };
        if ret != 0 {
            return Err(PoolError::Pipe(io::Error::last_os_error()));
        }
        Ok(Queue {
            items: Mutex::new(VecDeque::new()),
            read_fd: fds[0],
            write_fd: fds[1],
        })
    }

    pub fn read_fd(&self) -> RawFd {
        self.read_fd
    }

    /// Appends a work item; writes exactly one wakeup byte on the
    /// empty→nonempty transition (I-wakeup), none otherwise.
    pub fn push(&self, item: Query<R>) {
        let was_empty = {
            let mut guard = self.items.lock();
            let was_empty = guard.is_empty();
            guard.push_back(item);
            was_empty
        };
        if was_empty {
            self.write_byte(NEW_WORK);
        }
    }

    /// Moves every queued item onto `out`, leaving the queue empty.
    pub fn drain_into(&self, out: &mut VecDeque<Query<R>>) {
        let mut guard = self.items.lock();
        out.extend(guard.drain(..));
    }

    /// Drop-delivers (empty result sequence) every item still queued, then
    /// clears the queue. Part of the pool's shutdown-completion guarantee.
    pub fn clear(&self) {
        let mut guard = self.items.lock();
        for mut item in guard.drain(..) {
            item.deliver(Vec::new());
        }
    }

    /// Writes the stop byte; `Pool::stop` calls this once before joining
    /// the I/O thread.
    pub fn signal_stop(&self) {
        self.write_byte(STOP);
    }

    fn write_byte(&self, byte: u8) {
        let buf = [byte];
        unsafe {
            libc::write(self.write_fd, buf.as_ptr() as *const libc::c_void, 1);
        }
    }

    /// Drains every byte currently sitting in the pipe, returning whether a
    /// stop byte was among them and whether any new-work byte was among
    /// them. Multiple `NEW_WORK` bytes collapse to a single `true`.
    pub fn drain_pipe(&self) -> (bool, bool) {
        let mut available: i32 = 0;
        if unsafe { libc::ioctl(self.read_fd, libc::FIONREAD, &mut available) } != 0
            || available <= 0
        {
            return (false, false);
        }
        let mut buf = vec![0u8; available as usize];
        let n = unsafe {
            libc::read(
                self.read_fd,
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
            )
        };
        let mut saw_stop = false;
        let mut saw_new_work = false;
        if n > 0 {
            for &b in &buf[..n as usize] {
                match b {
                    STOP => saw_stop = true,
                    NEW_WORK => saw_new_work = true,
                    _ => {}
                }
            }
        }
        (saw_stop, saw_new_work)
    }
}

impl<R> Drop for Queue<R> {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.read_fd);
            libc::close(self.write_fd);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_into_empty_queue_writes_one_wakeup_byte() {
        let queue: Queue<i32> = Queue::new().unwrap();
        queue.push(Query::new("SELECT 1", |_| {}));
        let (stop, new_work) = queue.drain_pipe();
        assert!(!stop);
        assert!(new_work);
        // draining again sees nothing further
        let (stop2, new_work2) = queue.drain_pipe();
        assert!(!stop2 && !new_work2);
    }

    #[test]
    fn push_into_nonempty_queue_writes_no_further_byte() {
        let queue: Queue<i32> = Queue::new().unwrap();
        queue.push(Query::new("SELECT 1", |_| {}));
        queue.push(Query::new("SELECT 2", |_| {}));
        queue.push(Query::new("SELECT 3", |_| {}));

        let mut available: i32 = 0;
        unsafe { libc::ioctl(queue.read_fd(), libc::FIONREAD, &mut available) };
        assert_eq!(available, 1, "three pushes into an empty queue should yield one byte");

        let mut out = std::collections::VecDeque::new();
        queue.drain_into(&mut out);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn clear_drop_delivers_every_queued_item() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let queue: Queue<i32> = Queue::new().unwrap();
        let delivered = Arc::new(AtomicUsize::new(0));
        for _ in 0..5 {
            let delivered = delivered.clone();
            queue.push(Query::new("SELECT 1", move |results: Vec<i32>| {
                assert!(results.is_empty());
                delivered.fetch_add(1, Ordering::SeqCst);
            }));
        }
        queue.clear();
        assert_eq!(delivered.load(Ordering::SeqCst), 5);
    }
}
