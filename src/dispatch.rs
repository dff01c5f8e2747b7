//! HamClock coordinate dispatcher.
//!
//! Holds the configured HamClock base URIs and fans each coordinate update
//! out to all of them over HTTP. Target failures are isolated: a target
//! that is unreachable or answers with an error status is logged and never
//! affects the other targets or the caller.

use futures::future::join_all;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{error, trace};

/// Path appended to each HamClock base URI
const COMMAND_ROUTE: &str = "/set_newdx";

/// Outbound request timeout
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Dispatcher construction errors
#[derive(Debug)]
pub enum DispatchError {
    /// The configured target string yielded no usable addresses
    NoTargets,
    /// HTTP client construction failed
    Client(reqwest::Error),
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchError::NoTargets => write!(f, "No HamClock URIs specified"),
            DispatchError::Client(e) => write!(f, "Failed to build HTTP client: {}", e),
        }
    }
}

impl std::error::Error for DispatchError {}

/// Fans coordinate updates out to every configured HamClock.
///
/// The target list is built once at construction and immutable afterwards.
pub struct Dispatcher {
    targets: Vec<String>,
    client: reqwest::Client,
}

impl Dispatcher {
    /// Build a dispatcher from a comma-delimited list of HamClock base URIs.
    ///
    /// Entries are trimmed and stripped of trailing slashes; empty entries
    /// are discarded. Fails if nothing usable remains.
    pub fn new(uris: &str) -> Result<Self, DispatchError> {
        let targets = parse_targets(uris);
        if targets.is_empty() {
            return Err(DispatchError::NoTargets);
        }

        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(DispatchError::Client)?;

        trace!(count = targets.len(), "Initialized HamClock dispatcher");

        Ok(Dispatcher { targets, client })
    }

    /// Push one coordinate update to every target.
    ///
    /// Both coordinates are parsed purely to validate well-formedness; the
    /// raw strings are what goes on the wire. Targets are updated
    /// concurrently and each outcome is logged on its own; this never
    /// returns an error to the caller.
    pub async fn update(&self, lat: &str, lon: &str) {
        trace!(count = self.targets.len(), "Updating HamClock targets");

        if lat.parse::<f64>().is_err() || lon.parse::<f64>().is_err() {
            error!(lat = %lat, lon = %lon, "Invalid lat/lon, skipping update");
            return;
        }

        join_all(
            self.targets
                .iter()
                .map(|target| self.send_to_target(target, lat, lon)),
        )
        .await;
    }

    /// Issue one `set_newdx` request against one target.
    ///
    /// Non-200 statuses and transport faults are logged, never propagated.
    async fn send_to_target(&self, target: &str, lat: &str, lon: &str) {
        let url = command_url(target, lat, lon);
        trace!(url = %url, "Calling HamClock API");

        match self.client.get(&url).send().await {
            Ok(response) => {
                let status = response.status();
                if status != StatusCode::OK {
                    error!(target = %target, status = %status, "HamClock API error status");
                }
                trace!(target = %target, status = %status, "HamClock API response");
            }
            Err(e) => {
                error!(target = %target, error = %e, "Error calling HamClock API");
            }
        }
    }

    /// Get the resolved target list for testing
    #[cfg(test)]
    pub fn targets(&self) -> &[String] {
        &self.targets
    }
}

/// Split a comma-delimited URI list into normalized base addresses
fn parse_targets(uris: &str) -> Vec<String> {
    uris.split(',')
        .map(|uri| uri.trim().trim_end_matches('/'))
        .filter(|uri| !uri.is_empty())
        .map(|uri| uri.to_string())
        .collect()
}

/// Build the `set_newdx` request URL, coordinates attached exactly as given
fn command_url(base: &str, lat: &str, lon: &str) -> String {
    format!("{}{}?lat={}&lng={}", base, COMMAND_ROUTE, lat, lon)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    /// Minimal one-shot HTTP server answering every request with `status`.
    /// Sends the request line of each request it sees down the channel.
    async fn stub_hamclock(status: &'static str) -> (String, mpsc::UnboundedReceiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let tx = tx.clone();
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 4096];
                    let n = socket.read(&mut buf).await.unwrap_or(0);
                    let request = String::from_utf8_lossy(&buf[..n]).to_string();
                    let _ = tx.send(request.lines().next().unwrap_or("").to_string());

                    let response = format!(
                        "HTTP/1.1 {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                        status
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                });
            }
        });

        (format!("http://{}", addr), rx)
    }

    #[test]
    fn test_parse_targets() {
        let targets = parse_targets("http://a.com/, http://b.com");
        assert_eq!(targets, vec!["http://a.com", "http://b.com"]);
    }

    #[test]
    fn test_parse_targets_discards_empty_entries() {
        let targets = parse_targets("http://a.com,, ,http://b.com/");
        assert_eq!(targets, vec!["http://a.com", "http://b.com"]);
    }

    #[test]
    fn test_construction_empty_fails() {
        assert!(matches!(Dispatcher::new(""), Err(DispatchError::NoTargets)));
        assert!(matches!(
            Dispatcher::new("  , ,  "),
            Err(DispatchError::NoTargets)
        ));
    }

    #[test]
    fn test_construction_two_targets() {
        let dispatcher = Dispatcher::new("http://a.com/, http://b.com").unwrap();
        assert_eq!(dispatcher.targets(), ["http://a.com", "http://b.com"]);
    }

    #[test]
    fn test_command_url() {
        assert_eq!(
            command_url("http://a.com", "41.7144", "-72.7289"),
            "http://a.com/set_newdx?lat=41.7144&lng=-72.7289"
        );
    }

    #[tokio::test]
    async fn test_update_hits_target() {
        let (base, mut rx) = stub_hamclock("200 OK").await;
        let dispatcher = Dispatcher::new(&base).unwrap();

        dispatcher.update("41.7144", "-72.7289").await;

        let request_line = rx.recv().await.unwrap();
        assert_eq!(request_line, "GET /set_newdx?lat=41.7144&lng=-72.7289 HTTP/1.1");
    }

    #[tokio::test]
    async fn test_invalid_coordinates_skip_all_targets() {
        let (base, mut rx) = stub_hamclock("200 OK").await;
        let dispatcher = Dispatcher::new(&base).unwrap();

        dispatcher.update("not-a-number", "-72.7289").await;
        dispatcher.update("41.7144", "").await;

        // No request may have been issued
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unreachable_target_does_not_block_others() {
        let (good, mut rx) = stub_hamclock("200 OK").await;
        // Port 1 refuses connections
        let uris = format!("http://127.0.0.1:1, {}", good);
        let dispatcher = Dispatcher::new(&uris).unwrap();

        dispatcher.update("41.7144", "-72.7289").await;

        let request_line = rx.recv().await.unwrap();
        assert!(request_line.contains("lat=41.7144&lng=-72.7289"));
    }

    #[tokio::test]
    async fn test_error_status_does_not_block_others() {
        let (bad, mut bad_rx) = stub_hamclock("500 Internal Server Error").await;
        let (good, mut good_rx) = stub_hamclock("200 OK").await;
        let uris = format!("{},{}", bad, good);
        let dispatcher = Dispatcher::new(&uris).unwrap();

        dispatcher.update("51.2", "0.3").await;

        assert!(bad_rx.recv().await.unwrap().contains("lat=51.2&lng=0.3"));
        assert!(good_rx.recv().await.unwrap().contains("lat=51.2&lng=0.3"));
    }
}
