//! TCP client session against the N3FJP API.
//!
//! Connects to the logger, reads the record stream chunk by chunk, and
//! drives decode and dispatch strictly in arrival order: the next read is
//! not issued until every HamClock call for the current chunk's events has
//! completed.

use crate::dispatch::Dispatcher;
use crate::protocol::Decoder;
use bytes::BytesMut;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace};

/// Read buffer size
const BUFFER_SIZE: usize = 1024;

/// One relay session against the N3FJP API server.
pub struct ApiClient {
    host: String,
    port: u16,
    dispatcher: Dispatcher,
    cancel: CancellationToken,
}

impl ApiClient {
    /// Create a client for the given N3FJP host and port.
    pub fn new(host: String, port: u16, dispatcher: Dispatcher) -> Self {
        ApiClient {
            host,
            port,
            dispatcher,
            cancel: CancellationToken::new(),
        }
    }

    /// Connect and run the read loop until the stream closes, a read fails,
    /// or [`ApiClient::disconnect`] is called.
    ///
    /// Transport faults surface to the caller; everything below the
    /// transport (bad records, unreachable targets) is logged and survived.
    pub async fn connect(&self) -> std::io::Result<()> {
        trace!(host = %self.host, port = self.port, "Connecting to N3FJP API");

        let mut stream = match TcpStream::connect((self.host.as_str(), self.port)).await {
            Ok(stream) => stream,
            Err(e) => {
                error!(error = %e, "Error connecting to N3FJP API");
                return Err(e);
            }
        };
        info!("Connected to N3FJP API server");

        let mut decoder = Decoder::new();
        let mut chunk = BytesMut::with_capacity(BUFFER_SIZE);

        let result = loop {
            chunk.clear();

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    trace!("Read loop cancelled");
                    break Ok(());
                }
                read = stream.read_buf(&mut chunk) => match read {
                    Ok(0) => {
                        info!("N3FJP API closed the connection");
                        break Ok(());
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(error = %e, "Read error from N3FJP API");
                        break Err(e);
                    }
                },
            }

            trace!(message = %String::from_utf8_lossy(&chunk).trim(), "[N3FJP API]");

            // Dispatch in arrival order; the next read waits on all of it
            for event in decoder.ingest(&chunk) {
                self.dispatcher.update(&event.lat, &event.lon).await;
            }
        };

        decoder.reset();
        info!("Disconnected from N3FJP API");
        result
    }

    /// Signal the read loop to stop.
    ///
    /// Calling this when already disconnected is a no-op.
    pub fn disconnect(&self) {
        if self.cancel.is_cancelled() {
            trace!("Already disconnected");
            return;
        }
        trace!("Disconnecting from N3FJP API");
        self.cancel.cancel();
    }
}
