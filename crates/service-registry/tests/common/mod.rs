//! Common test utilities for service registry integration tests

pub mod test_harness;

use std::time::{Duration, Instant};

/// Test timeout for async operations
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Poll `condition` until it holds, panicking after [`TEST_TIMEOUT`]
pub async fn eventually(what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + TEST_TIMEOUT;
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// URL on a local port nothing listens on
pub fn closed_port_url(path: &str) -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind probe port");
    let port = listener.local_addr().expect("No local address").port();
    drop(listener);
    format!("http://127.0.0.1:{}{}", port, path)
}
