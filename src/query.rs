//! C2 — work items.
//!
//! A `Query` is SQL text, its ordered parameters, and a completion callback
//! that the at-most-once contract (I2-a) guarantees runs exactly once over
//! the item's lifetime: explicitly via [`Query::deliver`], or implicitly
//! with an empty result sequence when the item is dropped without having
//! been delivered.

use crate::param::Parameter;

/// A one-shot completion callback. Boxed because closures captured by
/// producer threads are not necessarily the same concrete type.
pub type Callback<R> = Box<dyn FnOnce(Vec<R>) + Send>;

/// A single SQL request plus its parameters and completion callback.
///
/// Move-only in spirit: `Query` does not implement `Clone` because
/// duplicating an item would let its callback run twice, which would
/// violate I2-a. Moving a `Query` (e.g. out of the submission queue and
/// into a connection) transfers the callback outright; there is nothing
/// left behind to "already fired" the way the C++ original needed, since
/// Rust's move semantics make the source itself inaccessible.
pub struct Query<R> {
    sql: String,
    params: Vec<Parameter>,
    callback: Option<Callback<R>>,
}

impl<R> Query<R> {
    /// A query with no parameters.
    pub fn new(sql: impl Into<String>, callback: impl FnOnce(Vec<R>) + Send + 'static) -> Self {
        Query {
            sql: sql.into(),
            params: Vec::new(),
            callback: Some(Box::new(callback)),
        }
    }

    /// A parameterized query.
    pub fn with_params(
        sql: impl Into<String>,
        params: Vec<Parameter>,
        callback: impl FnOnce(Vec<R>) + Send + 'static,
    ) -> Self {
        Query {
            sql: sql.into(),
            params,
            callback: Some(Box::new(callback)),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    /// True if this item carries no SQL text (a default/placeholder item).
    pub fn empty(&self) -> bool {
        self.sql.is_empty()
    }

    /// Runs the callback at most once, consuming the stored callback. A
    /// second call (including the implicit one in `Drop`) is a no-op.
    pub fn deliver(&mut self, results: Vec<R>) {
        if let Some(callback) = self.callback.take() {
            callback(results);
        }
    }
}

impl<R> Drop for Query<R> {
    fn drop(&mut self) {
        self.deliver(Vec::new());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn drop_without_delivery_fires_once_with_empty_results() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen_empty = Arc::new(AtomicUsize::new(0));
        {
            let calls = calls.clone();
            let seen_empty = seen_empty.clone();
            let query: Query<i32> = Query::new("SELECT 1", move |results: Vec<i32>| {
                calls.fetch_add(1, Ordering::SeqCst);
                if results.is_empty() {
                    seen_empty.fetch_add(1, Ordering::SeqCst);
                }
            });
            drop(query);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(seen_empty.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn explicit_deliver_then_drop_fires_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut query: Query<i32> = {
            let calls = calls.clone();
            Query::new("SELECT 1", move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };
        query.deliver(vec![1, 2, 3]);
        query.deliver(vec![4]); // no-op
        drop(query); // no-op
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_reports_missing_sql() {
        let query: Query<i32> = Query::new("", |_| {});
        assert!(query.empty());
    }
}
