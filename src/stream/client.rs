//! SSE client using `reqwest` byte streams.
//!
//! Holds a single long-lived `GET {base}/events` request open with:
//! - Fixed-delay reconnection (no backoff), optional attempt limit
//! - Idle watchdog (the server heartbeats with `ping` events)
//! - `Last-Event-ID` resume header when the server assigns ids
//! - Frame forwarding via tokio channel

use futures_util::StreamExt;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::stream::sse::{SseDecoder, SseFrame};

/// No bytes for this long means the stream is dead.
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// TCP/TLS connect timeout for the stream request.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// What the client reports to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Stream opened (HTTP 2xx received).
    Connected,
    /// Stream closed or failed; a reconnect follows unless shut down.
    Disconnected,
    Frame(SseFrame),
}

/// A single SSE connection to the signal server.
pub struct SseClient {
    /// Full events URL.
    events_url: String,
    /// Bearer token, if any.
    auth_token: Option<String>,
    /// Fixed delay between reconnection attempts.
    reconnect_delay_ms: u64,
    /// Maximum consecutive failed attempts (None = unlimited).
    max_reconnect_attempts: Option<u32>,
    http: reqwest::Client,
}

impl SseClient {
    pub fn new(
        events_url: String,
        auth_token: Option<String>,
        reconnect_delay_ms: u64,
        max_reconnect_attempts: Option<u32>,
    ) -> Result<Self, reqwest::Error> {
        // No overall request timeout: the response body never ends.
        let http = reqwest::Client::builder()
            .tcp_nodelay(true)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            events_url,
            auth_token,
            reconnect_delay_ms,
            max_reconnect_attempts,
            http,
        })
    }

    /// Run the stream loop with auto-reconnection.
    ///
    /// Sends connectivity changes and decoded frames to `tx`.
    /// Runs until the `shutdown` signal is received, the receiver is dropped,
    /// or the attempt limit is exhausted.
    pub async fn run(&self, tx: mpsc::UnboundedSender<ClientEvent>, mut shutdown: watch::Receiver<bool>) {
        let mut decoder = SseDecoder::new();
        let mut failed_attempts: u32 = 0;

        loop {
            if *shutdown.borrow() {
                info!("Shutdown signal received, stopping stream");
                break;
            }

            match self.connect_and_run(&tx, &mut decoder, &mut shutdown).await {
                Ok(received) => {
                    info!(url = %self.events_url, "Stream closed");
                    if *shutdown.borrow() || tx.is_closed() {
                        break;
                    }
                    // A close with no bytes counts against the limit.
                    if received {
                        failed_attempts = 0;
                    } else {
                        failed_attempts += 1;
                    }
                }
                Err(e) => {
                    error!(url = %self.events_url, error = %e, "Stream error");
                    failed_attempts += 1;
                }
            }

            decoder.reset();
            if tx.send(ClientEvent::Disconnected).is_err() {
                break;
            }

            if let Some(max) = self.max_reconnect_attempts {
                if failed_attempts > max {
                    error!(
                        attempts = failed_attempts,
                        "Max reconnection attempts reached, giving up"
                    );
                    break;
                }
            }

            info!(
                delay_ms = self.reconnect_delay_ms,
                attempt = failed_attempts,
                "Reconnecting after delay"
            );

            tokio::select! {
                _ = sleep(Duration::from_millis(self.reconnect_delay_ms)) => {},
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }

    /// Open the stream and forward frames until it ends or shutdown.
    ///
    /// `Ok(true)` when at least one chunk arrived before a clean close.
    async fn connect_and_run(
        &self,
        tx: &mpsc::UnboundedSender<ClientEvent>,
        decoder: &mut SseDecoder,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<bool, BoxError> {
        info!(url = %self.events_url, "Connecting to event stream");

        let mut request = self
            .http
            .get(&self.events_url)
            .header("Accept", "text/event-stream")
            .header("Cache-Control", "no-cache");
        if let Some(ref token) = self.auth_token {
            request = request.bearer_auth(token);
        }
        if let Some(id) = decoder.last_event_id() {
            request = request.header("Last-Event-ID", id);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {}", status).into());
        }

        info!(url = %self.events_url, "Event stream connected");
        if tx.send(ClientEvent::Connected).is_err() {
            return Ok(false);
        }

        let mut body = response.bytes_stream();
        let mut received = false;

        loop {
            tokio::select! {
                chunk = timeout(IDLE_TIMEOUT, body.next()) => {
                    match chunk {
                        Ok(Some(Ok(bytes))) => {
                            received = true;
                            for frame in decoder.feed(&bytes)? {
                                debug!(event = %frame.event, len = frame.data.len(), "Frame received");
                                if tx.send(ClientEvent::Frame(frame)).is_err() {
                                    warn!("Event channel closed");
                                    return Ok(received);
                                }
                            }
                        }
                        Ok(Some(Err(e))) => return Err(Box::new(e)),
                        Ok(None) => return Ok(received),
                        Err(_) => {
                            return Err(format!("no data for {}s", IDLE_TIMEOUT.as_secs()).into());
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Shutdown signal, closing stream");
                        return Ok(received);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sse_client_new() {
        let client = SseClient::new(
            "http://localhost:3001/events".to_string(),
            Some("token".to_string()),
            3000,
            None,
        )
        .unwrap();

        assert_eq!(client.events_url, "http://localhost:3001/events");
        assert_eq!(client.reconnect_delay_ms, 3000);
        assert!(client.max_reconnect_attempts.is_none());
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        // Nothing listens on port 9 locally; every attempt fails fast.
        let client = SseClient::new("http://127.0.0.1:9/events".to_string(), None, 10, Some(1)).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        client.run(tx, shutdown_rx).await;

        let mut disconnects = 0;
        while let Ok(event) = rx.try_recv() {
            assert_eq!(event, ClientEvent::Disconnected);
            disconnects += 1;
        }
        assert_eq!(disconnects, 2);
    }

    #[tokio::test]
    async fn test_empty_streams_count_toward_max_attempts() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        // Answers every request with an empty 200 body.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
                    .await;
            }
        });

        let client = SseClient::new(format!("http://{}/events", addr), None, 10, Some(1)).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::time::timeout(Duration::from_secs(5), client.run(tx, shutdown_rx))
            .await
            .unwrap();

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert_eq!(
            events,
            vec![
                ClientEvent::Connected,
                ClientEvent::Disconnected,
                ClientEvent::Connected,
                ClientEvent::Disconnected,
            ]
        );
    }

    #[tokio::test]
    async fn test_shutdown_stops_reconnect_loop() {
        let client = SseClient::new("http://127.0.0.1:9/events".to_string(), None, 60_000, None).unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move { client.run(tx, shutdown_rx).await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
