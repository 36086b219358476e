//! Production [`Driver`] backed by `pq-sys`'s raw bindings to libpq.
//!
//! Every call here is the direct, unsafe analogue of the libpq C function
//! named in spec.md §6; this module is intentionally thin — it owns no
//! state beyond the raw `*mut PGconn` handles it's handed, since libpq
//! itself is the state machine.

use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::os::unix::io::RawFd;
use std::ptr;

use pq_sys::{
    PGconn, PGresult, PQconnectStartParams, PQconnectPoll, PQconsumeInput, PQerrorMessage,
    PQfinish, PQflush, PQgetResult, PQisBusy, PQresetStart, PQsendQuery, PQsendQueryParams,
    PQsetnonblocking, PQsocket, PQstatus, CONNECTION_BAD, PGRES_POLLING_OK, PGRES_POLLING_READING,
    PGRES_POLLING_WRITING,
};

use super::{Driver, FlushStatus, PollStatus};
use crate::error::PoolError;
use crate::param::Parameter;

/// A single nonblocking libpq connection handle.
///
/// `unsafe impl Send` is sound because exactly one owner (the connection's
/// owning `Connection<D>`, which lives only on the pool's I/O thread after
/// construction) ever touches the raw pointer at a time.
pub struct LibpqConn {
    raw: *mut PGconn,
}

unsafe impl Send for LibpqConn {}

impl Drop for LibpqConn {
    fn drop(&mut self) {
        if !self.raw.is_null() {
            unsafe { PQfinish(self.raw) };
        }
    }
}

/// A single result handle as returned by `PQgetResult`, owned until the
/// caller (the work item's callback) frees it with `PQclear`.
pub struct LibpqResult {
    raw: *mut PGresult,
}

unsafe impl Send for LibpqResult {}

impl LibpqResult {
    /// Raw libpq result pointer, for callers that decode rows themselves.
    /// Out of scope per spec.md §1; this accessor is the seam the (external)
    /// SQL-dialect/row-decoding collaborator hangs off of.
    pub fn as_ptr(&self) -> *mut PGresult {
        self.raw
    }
}

impl Drop for LibpqResult {
    fn drop(&mut self) {
        if !self.raw.is_null() {
            unsafe { pq_sys::PQclear(self.raw) };
        }
    }
}

#[derive(Default, Clone, Copy)]
pub struct LibpqDriver;

fn to_cstrings(params: &HashMap<String, String>) -> Result<(Vec<CString>, Vec<CString>), PoolError> {
    let mut keywords = Vec::with_capacity(params.len());
    let mut values = Vec::with_capacity(params.len());
    for (k, v) in params {
        let keyword = CString::new(k.as_str()).map_err(|_| {
            PoolError::Alloc(format!("connection parameter key {k:?} contains an embedded NUL byte"))
        })?;
        let value = CString::new(v.as_str()).map_err(|_| {
            PoolError::Alloc(format!(
                "connection parameter value for {k:?} contains an embedded NUL byte"
            ))
        })?;
        keywords.push(keyword);
        values.push(value);
    }
    Ok((keywords, values))
}

impl Driver for LibpqDriver {
    type Conn = LibpqConn;
    type QueryResult = LibpqResult;

    fn connect_all(
        &self,
        count: usize,
        params: &HashMap<String, String>,
    ) -> Result<Vec<Self::Conn>, PoolError> {
        let (keywords, values) = to_cstrings(params)?;
        let mut keyword_ptrs: Vec<*const c_char> =
            keywords.iter().map(|s| s.as_ptr()).chain(std::iter::once(ptr::null())).collect();
        let mut value_ptrs: Vec<*const c_char> =
            values.iter().map(|s| s.as_ptr()).chain(std::iter::once(ptr::null())).collect();

        let mut opened = Vec::with_capacity(count);
        for id in 0..count {
            let raw = unsafe {
                PQconnectStartParams(keyword_ptrs.as_mut_ptr(), value_ptrs.as_mut_ptr(), 0)
            };
            if raw.is_null() {
                drop(opened);
                return Err(PoolError::Alloc("PQconnectStartParams returned NULL".into()));
            }
            if unsafe { PQstatus(raw) } == CONNECTION_BAD {
                let message = unsafe { cstr_to_string(PQerrorMessage(raw)) };
                unsafe { PQfinish(raw) };
                return Err(PoolError::Connect { id, message });
            }
            unsafe { PQsetnonblocking(raw, 1) };
            opened.push(LibpqConn { raw });
        }
        Ok(opened)
    }

    fn poll(&self, conn: &mut Self::Conn) -> PollStatus {
        match unsafe { PQconnectPoll(conn.raw) } {
            PGRES_POLLING_OK => PollStatus::Ok,
            PGRES_POLLING_READING => PollStatus::Reading,
            PGRES_POLLING_WRITING => PollStatus::Writing,
            _ => PollStatus::Failed,
        }
    }

    fn socket(&self, conn: &Self::Conn) -> RawFd {
        unsafe { PQsocket(conn.raw) }
    }

    fn reset_start(&self, conn: &mut Self::Conn) -> bool {
        unsafe { PQresetStart(conn.raw) == 1 }
    }

    fn send_query(&self, conn: &mut Self::Conn, sql: &str) -> bool {
        let c_sql = match CString::new(sql) {
            Ok(s) => s,
            Err(_) => return false,
        };
        unsafe { PQsendQuery(conn.raw, c_sql.as_ptr()) == 1 }
    }

    fn send_query_params(&self, conn: &mut Self::Conn, sql: &str, params: &[Parameter]) -> bool {
        let c_sql = match CString::new(sql) {
            Ok(s) => s,
            Err(_) => return false,
        };
        let values: Vec<*const c_char> = params.iter().map(|p| p.data().as_ptr() as *const c_char).collect();
        let lengths: Vec<i32> = params.iter().map(|p| p.len() as i32).collect();
        let formats: Vec<i32> = params.iter().map(|p| p.is_binary() as i32).collect();

        unsafe {
            PQsendQueryParams(
                conn.raw,
                c_sql.as_ptr(),
                params.len() as i32,
                ptr::null(),
                values.as_ptr(),
                lengths.as_ptr(),
                formats.as_ptr(),
                0,
            ) == 1
        }
    }

    fn consume_input(&self, conn: &mut Self::Conn) -> bool {
        unsafe { PQconsumeInput(conn.raw) == 1 }
    }

    fn is_busy(&self, conn: &mut Self::Conn) -> bool {
        unsafe { PQisBusy(conn.raw) == 1 }
    }

    fn get_result(&self, conn: &mut Self::Conn) -> Option<Self::QueryResult> {
        let raw = unsafe { PQgetResult(conn.raw) };
        if raw.is_null() {
            None
        } else {
            Some(LibpqResult { raw })
        }
    }

    fn flush(&self, conn: &mut Self::Conn) -> FlushStatus {
        match unsafe { PQflush(conn.raw) } {
            0 => FlushStatus::Drained,
            1 => FlushStatus::Pending,
            _ => FlushStatus::Error,
        }
    }

    fn error_message(&self, conn: &Self::Conn) -> String {
        unsafe { cstr_to_string(PQerrorMessage(conn.raw)) }
    }
}

unsafe fn cstr_to_string(ptr: *const c_char) -> String {
    if ptr.is_null() {
        String::new()
    } else {
        CStr::from_ptr(ptr).to_string_lossy().into_owned()
    }
}
