//! A small `select(2)` wrapper.
//!
//! The event loop (`pool.rs`) needs exactly one waiting primitive that
//! covers both the wakeup pipe and every connection's socket; `select`,
//! driven through raw `libc` calls, is the teacher's own choice for this
//! same kind of readiness wait (see the binary-upgrade handshake in
//! `examples/ozontech-pg_doorman/src/app/server.rs`).

use std::os::unix::io::RawFd;
use std::time::Duration;

pub struct FdSet(libc::fd_set);

impl FdSet {
    pub fn new() -> Self {
        unsafe {
            let mut raw = std::mem::MaybeUninit::<libc::fd_set>::uninit();
            libc::FD_ZERO(raw.as_mut_ptr());
            FdSet(raw.assume_init())
        }
    }

    pub fn set(&mut self, fd: RawFd) {
        unsafe { libc::FD_SET(fd, &mut self.0) };
    }

    pub fn is_set(&self, fd: RawFd) -> bool {
        unsafe { libc::FD_ISSET(fd, &self.0) }
    }

    fn as_mut_ptr(&mut self) -> *mut libc::fd_set {
        &mut self.0
    }
}

/// Waits for readiness on `read_set`/`write_set` up to `timeout` (blocking
/// indefinitely if `None`). Returns the number of ready descriptors, as
/// `select(2)` does (0 on timeout, negative on error).
pub fn select(maxfd: RawFd, read_set: &mut FdSet, write_set: &mut FdSet, timeout: Option<Duration>) -> i32 {
    let mut tv;
    let tv_ptr = match timeout {
        Some(d) => {
            tv = libc::timeval {
                tv_sec: d.as_secs() as libc::time_t,
                tv_usec: d.subsec_micros() as libc::suseconds_t,
            };
            &mut tv as *mut libc::timeval
        }
        None => std::ptr::null_mut(),
    };

    unsafe {
        libc::select(
            maxfd + 1,
            read_set.as_mut_ptr(),
            write_set.as_mut_ptr(),
            std::ptr::null_mut(),
            tv_ptr,
        )
    }
}
