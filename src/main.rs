//! ttlkeeper demo
//!
//! Inserts a batch of records with a TTL into an in-memory store, then lists
//! them through the engine once per second and logs how many are still
//! active. Runs until `--duration` elapses or Ctrl+C.

use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use ttlkeeper::{ExpirationFormat, ExpiryPolicy, MemoryStore, Record, TtlConfig, TtlEngine};

/// Demo configuration
struct Config {
    /// Sweep interval in seconds (0 = lazy deactivation)
    interval: u64,
    /// TTL given to every record
    ttl: i64,
    /// Number of records to insert
    records: usize,
    /// How long to run, in seconds
    duration: u64,
    /// Store expirations as epoch seconds
    epoch: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval: 0,
            ttl: 5,
            records: 10,
            duration: 15,
            epoch: false,
        }
    }
}

impl Config {
    /// Parse configuration from command-line arguments
    fn from_args() -> Self {
        let mut config = Config::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--interval" | "-i" => {
                    config.interval = parse_value(&args, i, "--interval");
                    i += 2;
                }
                "--ttl" | "-t" => {
                    config.ttl = parse_value(&args, i, "--ttl");
                    i += 2;
                }
                "--records" | "-n" => {
                    config.records = parse_value(&args, i, "--records");
                    i += 2;
                }
                "--duration" | "-d" => {
                    config.duration = parse_value(&args, i, "--duration");
                    i += 2;
                }
                "--epoch" => {
                    config.epoch = true;
                    i += 1;
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("ttlkeeper version {}", ttlkeeper::VERSION);
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        config
    }

    fn engine_config(&self) -> anyhow::Result<TtlConfig> {
        let policy = ExpiryPolicy::from_flags(self.interval > 0, self.interval)?;
        let format = if self.epoch {
            ExpirationFormat::EpochSeconds
        } else {
            ExpirationFormat::Timestamp
        };
        Ok(TtlConfig::default().with_policy(policy).with_format(format))
    }
}

fn parse_value<T: std::str::FromStr>(args: &[String], i: usize, flag: &str) -> T {
    match args.get(i + 1).map(|v| v.parse()) {
        Some(Ok(value)) => value,
        Some(Err(_)) => {
            eprintln!("Error: invalid value for {}", flag);
            std::process::exit(1);
        }
        None => {
            eprintln!("Error: {} requires a value", flag);
            std::process::exit(1);
        }
    }
}

fn print_help() {
    println!(
        r#"
ttlkeeper - TTL expiration engine demo

USAGE:
    ttlkeeper [OPTIONS]

OPTIONS:
    -i, --interval <SECS>    Sweep interval; 0 means lazy deactivation (default: 0)
    -t, --ttl <SECS>         TTL given to every record (default: 5)
    -n, --records <N>        Number of records to insert (default: 10)
    -d, --duration <SECS>    How long to run (default: 15)
        --epoch              Store expirations as epoch seconds
    -v, --version            Print version information
    -h, --help               Print this help message

EXAMPLES:
    ttlkeeper                      # Lazy deactivation, records expire after 5s
    ttlkeeper --interval 2         # Delete expired records every 2s
    RUST_LOG=debug ttlkeeper       # Show per-sweep and per-read details
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_args();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let store = Arc::new(MemoryStore::new());
    let engine_config = config.engine_config()?;
    let engine = TtlEngine::new(engine_config, store.clone())?;
    info!(policy = ?engine.config().policy, ttl = config.ttl, "Engine ready");

    let mut batch: Vec<Record> = (0..config.records)
        .map(|i| Record::new(format!("record:{}", i)).with("ttl", config.ttl))
        .collect();
    for record in &mut batch {
        engine.config().apply_defaults(record);
    }
    engine.on_insert(&mut batch)?;
    for record in batch {
        store.insert(record);
    }
    info!(records = store.len(), "Records inserted");

    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
    };

    tokio::select! {
        _ = report_loop(&engine, &store) => {}
        _ = tokio::time::sleep(Duration::from_secs(config.duration)) => {}
        _ = shutdown => {}
    }

    engine.shutdown();
    let stats = store.stats();
    info!(
        remaining = stats.records,
        updates = stats.updates,
        cleared = stats.cleared,
        "Demo finished"
    );
    Ok(())
}

/// Lists the store through the engine once per second.
async fn report_loop(engine: &TtlEngine, store: &MemoryStore) {
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        ticker.tick().await;

        let mut list = store.list();
        let corrections = engine.on_found(&mut list);
        let active = list
            .iter()
            .filter(|r| r.boolean(&engine.config().active_field) == Ok(Some(true)))
            .count();

        info!(
            stored = list.len(),
            active = active,
            deactivated = corrections.len(),
            "Store status"
        );
    }
}
