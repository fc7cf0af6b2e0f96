//! CaptureClient against a real REP responder over TCP.
//!
//! Each test binds its own port so they can run in parallel.

use captureproto::{
    CaptureClient, CaptureReply, CaptureRequest, ClientConfig, ConnectionState, ControlError,
    ControlResponder,
};
use std::sync::atomic::{AtomicU16, Ordering};
use std::thread;
use std::time::{Duration, Instant};

static PORT: AtomicU16 = AtomicU16::new(18470);

fn next_endpoint() -> String {
    let port = PORT.fetch_add(1, Ordering::SeqCst);
    format!("tcp://127.0.0.1:{}", port)
}

/// A service that mirrors the real one: one capture at a time, shutdown ends the loop.
fn spawn_fake_service(endpoint: String) -> thread::JoinHandle<Vec<CaptureRequest>> {
    let responder = ControlResponder::bind(&endpoint, "fake-service").unwrap();
    thread::spawn(move || {
        let mut seen = Vec::new();
        let mut capturing = false;
        let deadline = Instant::now() + Duration::from_secs(10);

        while Instant::now() < deadline {
            let Some(incoming) = responder.recv(Duration::from_millis(50)).unwrap() else {
                continue;
            };
            seen.push(incoming.request);

            let reply = match incoming.request {
                CaptureRequest::StartCapture if capturing => {
                    CaptureReply::rejected("capture already running")
                }
                CaptureRequest::StartCapture => {
                    capturing = true;
                    CaptureReply::accepted()
                }
                CaptureRequest::StopAndSaveCapture if !capturing => {
                    CaptureReply::rejected("no capture running")
                }
                CaptureRequest::StopAndSaveCapture => {
                    capturing = false;
                    CaptureReply::accepted()
                }
                CaptureRequest::Shutdown => CaptureReply::accepted(),
            };
            responder.reply(&incoming, &reply).unwrap();

            if incoming.request == CaptureRequest::Shutdown {
                break;
            }
        }
        seen
    })
}

fn connected_client(endpoint: &str, timeout: Duration) -> CaptureClient {
    let config = ClientConfig::new("test-layer", endpoint)
        .with_timeout(timeout)
        .with_retries(5);
    let client = CaptureClient::connect(config).unwrap();
    // Give the TCP connection time to come up
    thread::sleep(Duration::from_millis(150));
    client
}

#[test]
fn test_start_stop_shutdown() {
    let endpoint = next_endpoint();
    let service = spawn_fake_service(endpoint.clone());
    let mut client = connected_client(&endpoint, Duration::from_secs(2));

    assert_eq!(client.health().state(), ConnectionState::Unknown);

    assert!(client.start_capture().unwrap());
    assert_eq!(client.health().state(), ConnectionState::Connected);

    // Service enforces one capture at a time
    assert!(!client.start_capture().unwrap());

    assert!(client.stop_and_save_capture().unwrap());
    assert!(!client.stop_and_save_capture().unwrap());

    assert!(client.shutdown_service().unwrap());

    let seen = service.join().unwrap();
    assert_eq!(
        seen,
        vec![
            CaptureRequest::StartCapture,
            CaptureRequest::StartCapture,
            CaptureRequest::StopAndSaveCapture,
            CaptureRequest::StopAndSaveCapture,
            CaptureRequest::Shutdown,
        ]
    );
}

#[test]
fn test_no_service_fails_fast() {
    // Nothing listens here
    let config = ClientConfig::new("test-layer", "tcp://127.0.0.1:59981")
        .with_timeout(Duration::from_millis(200));
    let mut client = CaptureClient::connect(config).unwrap();

    let start = Instant::now();
    let result = client.start_capture();
    let elapsed = start.elapsed();

    // Nothing was sent, so the service state cannot have changed
    assert!(matches!(
        result,
        Err(ControlError::NotDelivered {
            request: CaptureRequest::StartCapture
        })
    ));
    assert!(!result.unwrap_err().may_have_reached_service());
    assert!(
        elapsed < Duration::from_secs(1),
        "request blocked for {:?}",
        elapsed
    );
    assert_eq!(client.health().failures(), 1);
}

#[test]
fn test_hung_service_is_bounded_and_client_recovers() {
    let endpoint = next_endpoint();
    let responder = ControlResponder::bind(&endpoint, "slow-service").unwrap();

    let service = thread::spawn(move || {
        // First request: answer far too late, the client has given up by then
        let first = loop {
            if let Some(incoming) = responder.recv(Duration::from_millis(50)).unwrap() {
                break incoming;
            }
        };
        thread::sleep(Duration::from_millis(400));
        responder.reply(&first, &CaptureReply::accepted()).unwrap();

        // Second request: answer promptly
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if let Some(incoming) = responder.recv(Duration::from_millis(50)).unwrap() {
                responder.reply(&incoming, &CaptureReply::accepted()).unwrap();
                return incoming.request;
            }
        }
        panic!("second request never arrived");
    });

    let config = ClientConfig::new("test-layer", &endpoint).with_timeout(Duration::from_millis(150));
    let mut client = CaptureClient::connect(config).unwrap();
    thread::sleep(Duration::from_millis(150));

    let start = Instant::now();
    let first = client.start_capture();
    let elapsed = start.elapsed();
    assert!(matches!(first, Err(ControlError::Timeout { .. })));
    assert!(
        elapsed < Duration::from_millis(400),
        "timeout not enforced: {:?}",
        elapsed
    );

    // The socket was replaced; a fresh request goes through once the service is free
    thread::sleep(Duration::from_millis(500));
    let mut answered = false;
    for _ in 0..10 {
        if let Ok(ok) = client.stop_and_save_capture() {
            answered = ok;
            break;
        }
        thread::sleep(Duration::from_millis(50));
    }
    assert!(answered);
    assert_eq!(service.join().unwrap(), CaptureRequest::StopAndSaveCapture);
}

#[test]
fn test_dead_service_is_not_waited_on() {
    let endpoint = next_endpoint();
    // Bound but never answers
    let _responder = ControlResponder::bind(&endpoint, "hung-service").unwrap();

    let config = ClientConfig::new("test-layer", &endpoint)
        .with_timeout(Duration::from_millis(100))
        .with_dead_retry_interval(Duration::from_millis(600));
    let mut client = CaptureClient::connect(config).unwrap();
    thread::sleep(Duration::from_millis(150));

    // Three missed replies mark the service dead. A request right after a
    // socket reset may find the new socket not yet connected.
    for _ in 0..3 {
        let err = client.start_capture().unwrap_err();
        assert!(matches!(
            err,
            ControlError::Timeout { .. } | ControlError::NotDelivered { .. }
        ));
        thread::sleep(Duration::from_millis(50));
    }
    assert_eq!(client.health().state(), ConnectionState::Dead);

    let start = Instant::now();
    for _ in 0..20 {
        let err = client.start_capture().unwrap_err();
        assert!(matches!(err, ControlError::ServiceDead { .. }));
    }
    assert!(
        start.elapsed() < Duration::from_millis(50),
        "dead service still blocked for {:?}",
        start.elapsed()
    );

    // After the retry interval one request goes out again
    thread::sleep(Duration::from_millis(650));
    let start = Instant::now();
    assert!(matches!(
        client.start_capture(),
        Err(ControlError::Timeout { .. })
    ));
    assert!(start.elapsed() >= Duration::from_millis(100));
}
