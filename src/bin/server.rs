//! weir collection server.
//!
//! Listens for TCP clients that each send a fixed number of 1024-byte
//! frames, collects the frames into the shared log, and exits once
//! `capacity * per-conn` frames have arrived and the drain checks out.
//!
//! # Usage
//!
//! ```sh
//! weir-server --bind 0.0.0.0:8001 --capacity 4 --per-conn 5
//! ```
//!
//! Exit code 0 means the target was reached and every counted frame was
//! drained; anything else (bind failure, wait deadline, listener failure,
//! count mismatch) exits 1.

use std::time::Duration;

use weir::net::Endpoint;
use weir::runtime::{Collector, CollectorConfig, CollectorError};

/// Default bind address.
const DEFAULT_BIND: &str = "0.0.0.0:8001";

/// Default maximum number of simultaneous connections.
const DEFAULT_CAPACITY: usize = 4;

/// Default number of frames expected from each connection.
const DEFAULT_PER_CONN: u64 = 5;

/// Default wait deadline in seconds; 0 waits forever.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

fn main() {
    weir::init_tracing();
    if let Err(e) = run() {
        eprintln!("weir-server: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), CollectorError> {
    let args: Vec<String> = std::env::args().collect();
    let config = parse_args(&args)?;
    let target = config.target_frames;

    let collector: Collector = Collector::spawn(config)?;
    eprintln!(
        "weir-server: listening on {}, waiting for {target} frame(s)",
        collector.local_addr()
    );

    let received = collector.wait_for_target()?;
    eprintln!("weir-server: target reached ({received} frames), shutting down");

    let log = collector.shutdown()?;
    let observed = log.snapshot_count();

    let mut drained = 0u64;
    for frame in log.drain() {
        println!("collected: {}", frame.text());
        drained += 1;
    }
    if drained != observed {
        return Err(CollectorError::CountMismatch { drained, observed });
    }

    eprintln!("weir-server: all {drained} frames collected");
    Ok(())
}

/// Parses command line arguments into a [`CollectorConfig`].
fn parse_args(args: &[String]) -> Result<CollectorConfig, CollectorError> {
    let mut bind_addr: Option<Endpoint> = None;
    let mut capacity = DEFAULT_CAPACITY;
    let mut per_conn = DEFAULT_PER_CONN;
    let mut timeout_secs = DEFAULT_TIMEOUT_SECS;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" | "-b" => {
                i += 1;
                bind_addr = Some(value_of(args, i, "--bind")?.parse().map_err(invalid_arg)?);
            }
            "--capacity" | "-c" => {
                i += 1;
                capacity = value_of(args, i, "--capacity")?.parse().map_err(invalid_arg)?;
            }
            "--per-conn" | "-n" => {
                i += 1;
                per_conn = value_of(args, i, "--per-conn")?.parse().map_err(invalid_arg)?;
            }
            "--timeout" | "-t" => {
                i += 1;
                timeout_secs = value_of(args, i, "--timeout")?.parse().map_err(invalid_arg)?;
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            arg => {
                return Err(CollectorError::Bind(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("unknown argument: {arg}"),
                )));
            }
        }
        i += 1;
    }

    let bind_addr = match bind_addr {
        Some(addr) => addr,
        None => DEFAULT_BIND.parse().map_err(invalid_arg)?,
    };

    Ok(CollectorConfig {
        bind_addr,
        max_conns: capacity,
        target_frames: capacity as u64 * per_conn,
        wait_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
        ..CollectorConfig::default()
    })
}

fn value_of<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str, CollectorError> {
    args.get(i).map(String::as_str).ok_or_else(|| {
        CollectorError::Bind(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("missing value for {flag}"),
        ))
    })
}

fn invalid_arg<E: std::error::Error + Send + Sync + 'static>(e: E) -> CollectorError {
    CollectorError::Bind(std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
}

fn print_usage() {
    eprintln!(
        r#"weir-server - concurrent fixed-frame TCP collector

USAGE:
    weir-server [OPTIONS]

OPTIONS:
    -b, --bind <ADDR>       Bind address (default: 0.0.0.0:8001)
    -c, --capacity <N>      Max simultaneous connections (default: 4)
    -n, --per-conn <N>      Expected frames per connection (default: 5);
                            the target is capacity * per-conn
    -t, --timeout <SECS>    Give up waiting after SECS seconds;
                            0 waits forever (default: 30)
    -h, --help              Print this help message

EXAMPLE:
    weir-server --bind 127.0.0.1:8001 --capacity 4 --per-conn 5
"#
    );
}
