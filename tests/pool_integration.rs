//! End-to-end scenarios from spec.md §8, run against the mock driver so
//! they don't require a live PostgreSQL server.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use async_pool::driver::mock::{MockDriver, MockScript};
use async_pool::pool::Pool;
use async_pool::query::Query;

fn wait_running<D: async_pool::Driver>(pool: &Pool<D>) {
    for _ in 0..500 {
        if pool.is_running() {
            return;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    panic!("pool never reached running state");
}

/// Scaled-down version of spec.md §8 scenario 1 (20 threads x 10,000 x 2):
/// many producer threads hammering `async_query` concurrently, expecting
/// every callback to fire exactly once by the time `stop()` returns.
#[test]
fn stress_many_producers_every_callback_fires_once() {
    let driver = MockDriver::new(MockScript {
        settle_after: 0,
        results_per_query: 1,
        fail_all_handshakes: false,
    });
    let pool = Arc::new(Pool::with_driver(8, driver).unwrap());
    pool.run(HashMap::new());
    wait_running(&pool);

    const THREADS: usize = 10;
    const PER_THREAD: usize = 200;
    let total_expected = THREADS * PER_THREAD;

    let (tx, rx) = mpsc::channel();
    let mut handles = Vec::new();
    for _ in 0..THREADS {
        let pool = pool.clone();
        let tx = tx.clone();
        handles.push(std::thread::spawn(move || {
            for j in 0..PER_THREAD {
                let tx = tx.clone();
                pool.async_query(Query::new(format!("SELECT {j}"), move |results: Vec<_>| {
                    tx.send(results.len()).unwrap();
                }));
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }
    drop(tx);

    let mut received = 0;
    while received < total_expected {
        rx.recv_timeout(Duration::from_secs(10)).expect("missing a callback");
        received += 1;
    }
    assert_eq!(received, total_expected);

    pool.stop();
}

/// Scenario 2: handshake failure. `run()` spawns the thread, it logs and
/// exits, and a subsequent submission still fires its callback (empty) once
/// `stop()` returns.
#[test]
fn handshake_failure_pool_exits_and_drop_delivers() {
    let driver = MockDriver::new(MockScript {
        settle_after: 0,
        results_per_query: 1,
        fail_all_handshakes: true,
    });
    let pool = Pool::with_driver(3, driver).unwrap();
    pool.run(HashMap::new());

    // The I/O thread should observe the failure and exit on its own, well
    // within the steady-state timeout (it never even reaches steady state).
    std::thread::sleep(Duration::from_millis(300));
    assert!(!pool.is_running());

    let delivered = Arc::new(AtomicUsize::new(0));
    {
        let delivered = delivered.clone();
        pool.async_query(Query::new("SELECT 1", move |results: Vec<_>| {
            assert!(results.is_empty());
            delivered.fetch_add(1, Ordering::SeqCst);
        }));
    }
    pool.stop();
    assert_eq!(delivered.load(Ordering::SeqCst), 1);
}

/// Scenario 6: stop with pending work. Submitting a batch and immediately
/// stopping must still deliver exactly one callback per item.
#[test]
fn stop_with_pending_delivers_every_item_exactly_once() {
    let driver = MockDriver::new(MockScript {
        settle_after: 5,
        results_per_query: 1,
        fail_all_handshakes: false,
    });
    let pool = Pool::with_driver(4, driver).unwrap();
    pool.run(HashMap::new());
    wait_running(&pool);

    let delivered = Arc::new(AtomicUsize::new(0));
    for _ in 0..100 {
        let delivered = delivered.clone();
        pool.async_query(Query::new("SELECT 1", move |_: Vec<_>| {
            delivered.fetch_add(1, Ordering::SeqCst);
        }));
    }
    pool.stop();
    assert_eq!(delivered.load(Ordering::SeqCst), 100);
}

/// Scenario 5: mid-run connection failure. The pool logs the failure,
/// resets the affected connection in place (never recreating it), and keeps
/// serving work across every connection afterward — including the one that
/// was just reset.
#[test]
fn steady_state_failure_resets_connection_and_keeps_serving() {
    let driver = MockDriver::new(MockScript {
        settle_after: 0,
        results_per_query: 1,
        fail_all_handshakes: false,
    });
    let fault_injector = driver.clone();
    let pool = Pool::with_driver(3, driver).unwrap();
    pool.run(HashMap::new());
    wait_running(&pool);

    // Prime every connection before failing any of them.
    let (tx, rx) = mpsc::channel();
    for i in 0..9 {
        let tx = tx.clone();
        pool.async_query(Query::new(format!("SELECT {i}"), move |results: Vec<_>| {
            tx.send(results.len()).unwrap();
        }));
    }
    for _ in 0..9 {
        rx.recv_timeout(Duration::from_secs(5))
            .expect("priming queries should complete");
    }

    assert!(fault_injector.resets().is_empty(), "nothing should have failed yet");
    fault_injector.fail_connection(1);

    // Give the I/O thread a moment to observe the failure and reset it.
    for _ in 0..200 {
        if !fault_injector.resets().is_empty() {
            break;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(
        fault_injector.resets(),
        vec![1],
        "reset_start should fire exactly once, for connection 1"
    );

    // The pool keeps accepting and completing work across all connections,
    // including the one that was just reset.
    const AFTER: usize = 30;
    for i in 0..AFTER {
        let tx = tx.clone();
        pool.async_query(Query::new(format!("SELECT {i}"), move |results: Vec<_>| {
            tx.send(results.len()).unwrap();
        }));
    }
    drop(tx);

    let mut received = 0;
    while let Ok(_) = rx.recv_timeout(Duration::from_secs(5)) {
        received += 1;
        if received == AFTER {
            break;
        }
    }
    assert_eq!(received, AFTER);

    pool.stop();
}

/// I-order: a single producer thread's submissions are dispatched to
/// connections (and thus complete) in submission order, when there is only
/// one connection to serialize them through.
#[test]
fn single_connection_preserves_submission_order() {
    let driver = MockDriver::new(MockScript {
        settle_after: 0,
        results_per_query: 1,
        fail_all_handshakes: false,
    });
    let pool = Pool::with_driver(1, driver).unwrap();
    pool.run(HashMap::new());
    wait_running(&pool);

    let (tx, rx) = mpsc::channel();
    const N: usize = 50;
    for i in 0..N {
        let tx = tx.clone();
        pool.async_query(Query::new(format!("SELECT {i}"), move |_: Vec<_>| {
            tx.send(i).unwrap();
        }));
    }
    drop(tx);

    let mut order = Vec::new();
    while let Ok(i) = rx.recv_timeout(Duration::from_secs(5)) {
        order.push(i);
        if order.len() == N {
            break;
        }
    }
    assert_eq!(order, (0..N).collect::<Vec<_>>());

    pool.stop();
}
