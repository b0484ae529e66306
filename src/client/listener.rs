//! Console listener
//!
//! Opens one WebSocket connection to an [`Endpoint`] and writes a
//! `Received: <payload>` line to its sink for every data message that arrives
//! while the connection is open. Nothing else is ever written to the sink.

use std::io::{self, Write};

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{self, Message},
};
use tracing::{debug, info, warn};

use super::Endpoint;

/// Prefix of every line written to the sink
pub const RECEIVED_PREFIX: &str = "Received:";

/// Errors that can occur while listening
#[derive(Error, Debug)]
pub enum ListenerError {
    #[error("Failed to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: Box<tungstenite::Error>,
    },

    #[error("WebSocket read failed: {0}")]
    Read(#[source] Box<tungstenite::Error>),

    #[error("Failed to write to output sink: {0}")]
    Sink(#[from] io::Error),
}

/// Outcome of a finished listening session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListenSummary {
    /// Number of `Received:` lines written
    pub messages: u64,
}

/// Connection initializer with an explicit target and output sink
pub struct Listener<W> {
    endpoint: Endpoint,
    sink: W,
}

impl<W: Write> Listener<W> {
    /// Create a listener for `endpoint` writing to `sink`
    pub fn new(endpoint: Endpoint, sink: W) -> Self {
        Self { endpoint, sink }
    }

    /// Endpoint this listener connects to
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Consume the listener and hand back its sink
    pub fn into_sink(self) -> W {
        self.sink
    }

    /// Connect and log messages until the connection closes or shutdown fires
    ///
    /// A failed connection attempt returns [`ListenerError::Connect`] without
    /// touching the sink. There is no retry.
    pub async fn run(
        &mut self,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<ListenSummary, ListenerError> {
        debug!("Opening connection to host {}", self.endpoint.host());
        let url = self.endpoint.url().to_string();
        let (ws_stream, _response) =
            connect_async(url.as_str())
                .await
                .map_err(|e| ListenerError::Connect {
                    url: url.clone(),
                    source: Box::new(e),
                })?;
        info!("Connected to {}", url);

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let mut summary = ListenSummary::default();

        loop {
            tokio::select! {
                msg = ws_receiver.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.write_received(&text)?;
                            summary.messages += 1;
                        }
                        Some(Ok(Message::Binary(data))) => {
                            self.write_received(&format!("<binary {} bytes>", data.len()))?;
                            summary.messages += 1;
                        }
                        Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                            // Control frames, answered by the protocol layer
                        }
                        Some(Ok(Message::Close(frame))) => {
                            debug!("Server closed connection: {:?}", frame);
                            break;
                        }
                        Some(Ok(Message::Frame(_))) => {}
                        Some(Err(e)) => {
                            warn!("WebSocket error from {}: {}", url, e);
                            return Err(ListenerError::Read(Box::new(e)));
                        }
                        None => {
                            debug!("Connection to {} ended", url);
                            break;
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, closing connection to {}", url);
                    let _ = ws_sender.send(Message::Close(None)).await;
                    break;
                }
            }
        }

        info!("Connection to {} closed after {} messages", url, summary.messages);
        Ok(summary)
    }

    fn write_received(&mut self, payload: &str) -> Result<(), ListenerError> {
        writeln!(self.sink, "{RECEIVED_PREFIX} {payload}")?;
        self.sink.flush()?;
        Ok(())
    }
}
