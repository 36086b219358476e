//! A5 — a small demo binary wiring config, logger and pool together.
//!
//! Loads `pool.toml`, opens the pool, fires a handful of queries, and
//! blocks until Enter is pressed before tearing the pool down — the same
//! shape as the original C++ `test/main.cpp`'s interactive stress harness,
//! without its always-on thread-storm.

use std::io::Read as _;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_pool::config::Config;
use async_pool::{args, logger, Parameter, Pool, Query};

fn main() {
    let args = args::parse();
    if let Err(err) = logger::init(args.log_level.into()) {
        eprintln!("failed to install logger: {err}");
    }

    let config = match Config::load(&args.config_file) {
        Ok(config) => config,
        Err(err) => {
            log::error!("[db] {err}");
            std::process::exit(1);
        }
    };

    let pool = Pool::new(config.pool.size).expect("failed to create wakeup pipe");
    pool.run(config.connection.clone());

    let completed = Arc::new(AtomicUsize::new(0));
    for i in 0..10 {
        let completed = completed.clone();
        pool.async_query(Query::with_params(
            "SELECT * FROM users WHERE id = $1::bigint",
            vec![Parameter::int64(i)],
            move |_results| {
                completed.fetch_add(1, Ordering::SeqCst);
            },
        ));
    }

    log::info!("[db] submitted queries, press Enter to stop");
    let _ = std::io::stdin().read(&mut [0u8]);

    pool.stop();
    log::info!(
        "[db] stopped; {} of 10 demo queries completed",
        completed.load(Ordering::SeqCst)
    );
}
