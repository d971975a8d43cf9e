//! End-to-end tests for the collection runtime.
//!
//! Each test binds an ephemeral loopback port, drives the collector with
//! plain `std::net::TcpStream` clients sending fixed-size frames, and
//! checks the full phase sequence: wait for target → cooperative
//! shutdown → exclusive drain → count validation.
//!
//! # Running with tracing
//!
//! ```bash
//! RUST_LOG=weir=debug cargo test --features tracing -- --nocapture
//! ```

use std::io::Write;
use std::net::TcpStream;
use std::sync::Once;
use std::thread;
use std::time::Duration;

use weir::net::Endpoint;
use weir::runtime::{Collector, CollectorConfig, CollectorError};

/// Frame size used by every test client in this file.
const FRAME: usize = 32;

static INIT_TRACING: Once = Once::new();

fn init_test_tracing() {
    INIT_TRACING.call_once(|| {
        weir::init_tracing();
    });
}

fn test_config(max_conns: usize, target: u64, wait_timeout: Duration) -> CollectorConfig {
    CollectorConfig {
        bind_addr: Endpoint::localhost(0),
        max_conns,
        target_frames: target,
        wait_timeout: Some(wait_timeout),
        ..CollectorConfig::default()
    }
}

/// Connects to the collector and sends each message as one NUL-padded
/// frame, with a little jitter between sends. Closes on return.
fn send_frames(addr: Endpoint, messages: &[String]) {
    let mut stream = TcpStream::connect(addr.as_socket_addr()).expect("connect");
    stream.set_nodelay(true).expect("nodelay");
    for message in messages {
        let mut buf = [0u8; FRAME];
        buf[..message.len()].copy_from_slice(message.as_bytes());
        stream.write_all(&buf).expect("write frame");
        thread::sleep(Duration::from_millis(fastrand::u64(0..3)));
    }
}

fn drain_texts(log: weir::log::MessageLog<FRAME>) -> Vec<String> {
    log.drain().map(|f| f.text().into_owned()).collect()
}

#[test]
fn four_clients_reach_the_target_and_drain_exactly() {
    init_test_tracing();

    let collector =
        Collector::<FRAME>::spawn(test_config(4, 20, Duration::from_secs(10))).expect("spawn");
    let addr = collector.local_addr();

    let mut expected: Vec<String> = Vec::new();
    let clients: Vec<_> = (0..4)
        .map(|c| {
            let messages: Vec<String> = (0..5).map(|m| format!("c{c}-m{m}")).collect();
            expected.extend(messages.iter().cloned());
            thread::spawn(move || send_frames(addr, &messages))
        })
        .collect();

    let received = collector.wait_for_target().expect("target reached");
    assert_eq!(received, 20);

    for client in clients {
        client.join().expect("client thread");
    }

    let log = collector.shutdown().expect("shutdown");
    let observed = log.snapshot_count();
    assert_eq!(observed, 20);

    let mut texts = drain_texts(log);
    assert_eq!(texts.len() as u64, observed);

    // Cross-connection arrival order is unspecified; the multiset of
    // payloads is not.
    texts.sort();
    expected.sort();
    assert_eq!(texts, expected);
}

#[test]
fn client_stopping_short_trips_the_wait_deadline() {
    init_test_tracing();

    // One client sends 3 of the 5 expected frames, then closes. Its
    // worker exits cleanly; the target is simply never reached.
    let collector =
        Collector::<FRAME>::spawn(test_config(1, 5, Duration::from_secs(2))).expect("spawn");
    let addr = collector.local_addr();

    let messages: Vec<String> = (0..3).map(|m| format!("short-{m}")).collect();
    let client = thread::spawn(move || send_frames(addr, &messages));
    client.join().expect("client thread");

    match collector.wait_for_target() {
        Err(CollectorError::TimedOut { received, target }) => {
            assert_eq!(received, 3);
            assert_eq!(target, 5);
        }
        other => panic!("expected TimedOut, got {other:?}"),
    }

    // The partial collection still shuts down and drains consistently.
    let log = collector.shutdown().expect("shutdown");
    assert_eq!(log.snapshot_count(), 3);
    assert_eq!(drain_texts(log).len(), 3);
}

#[test]
fn backlogged_client_is_served_once_a_slot_frees() {
    init_test_tracing();

    // Capacity 2, three clients. The third connection waits in the
    // kernel backlog until one of the first two workers exits and is
    // reaped; nothing is refused.
    let collector =
        Collector::<FRAME>::spawn(test_config(2, 6, Duration::from_secs(10))).expect("spawn");
    let addr = collector.local_addr();

    let clients: Vec<_> = (0..3)
        .map(|c| {
            let messages: Vec<String> = (0..2).map(|m| format!("q{c}-m{m}")).collect();
            thread::spawn(move || send_frames(addr, &messages))
        })
        .collect();
    for client in clients {
        client.join().expect("client thread");
    }

    let received = collector.wait_for_target().expect("all three served");
    assert_eq!(received, 6);

    let log = collector.shutdown().expect("shutdown");
    let texts = drain_texts(log);
    assert_eq!(texts.len(), 6);
    for c in 0..3 {
        assert!(
            texts.iter().any(|t| t.starts_with(&format!("q{c}-"))),
            "no frames from client {c}: {texts:?}"
        );
    }
}

#[test]
fn shutdown_mid_stream_is_clean_and_consistent() {
    init_test_tracing();

    // Cancel while a client is still sending: whatever the log counted
    // at shutdown is exactly what drains. Un-read bytes are dropped with
    // the connection (cancellation is best-effort by design).
    let collector =
        Collector::<FRAME>::spawn(test_config(1, u64::MAX, Duration::from_millis(200)))
            .expect("spawn");
    let addr = collector.local_addr();

    let client = thread::spawn(move || {
        // Writes may fail once the worker closes its end; that is the
        // expected way for this client to stop.
        let mut stream = TcpStream::connect(addr.as_socket_addr()).expect("connect");
        for m in 0..50u32 {
            let mut buf = [0u8; FRAME];
            let message = format!("mid-{m}");
            buf[..message.len()].copy_from_slice(message.as_bytes());
            if stream.write_all(&buf).is_err() {
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }
    });

    // Deadline passes while frames are still arriving.
    assert!(matches!(
        collector.wait_for_target(),
        Err(CollectorError::TimedOut { .. })
    ));

    let log = collector.shutdown().expect("shutdown");
    let observed = log.snapshot_count();
    assert_eq!(drain_texts(log).len() as u64, observed);

    client.join().expect("client thread");
}
