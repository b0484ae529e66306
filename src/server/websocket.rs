//! Development server implementation
//!
//! Serves the page bundle from the public directory and accepts WebSocket
//! connections on `/ws`, logging every message and echoing text messages
//! back to the sender.

use std::path::PathBuf;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::client::WS_PATH;

/// Configuration for the development server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind: String,
    /// Port to listen on
    pub port: u16,
    /// Directory static assets are served from
    pub public_dir: PathBuf,
}

impl ServerConfig {
    /// Create a new server configuration
    pub fn new(bind: String, port: u16, public_dir: PathBuf) -> Self {
        Self {
            bind,
            port,
            public_dir,
        }
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

/// State shared with the WebSocket handler
#[derive(Clone)]
struct ServerState {
    shutdown_tx: broadcast::Sender<()>,
}

/// Page and WebSocket development server
pub struct DevServer {
    config: ServerConfig,
    shutdown_tx: broadcast::Sender<()>,
}

impl DevServer {
    /// Create a new development server
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            shutdown_tx,
        }
    }

    /// Trigger server shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Bind the configured address and serve until shutdown
    pub async fn run(&self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.config.socket_addr()).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener until shutdown
    pub async fn serve(&self, listener: TcpListener) -> anyhow::Result<()> {
        let addr = listener.local_addr()?;
        info!("Serving {:?} on http://{}", self.config.public_dir, addr);
        info!("WebSocket endpoint at ws://{}{}", addr, WS_PATH);

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let app = self.router();

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("Shutdown signal received, stopping server");
        })
        .await?;

        Ok(())
    }

    /// `/ws` upgrades to an echo session; everything else is a static asset
    fn router(&self) -> Router {
        let state = ServerState {
            shutdown_tx: self.shutdown_tx.clone(),
        };

        Router::new()
            .route(WS_PATH, get(ws_handler))
            .fallback_service(ServeDir::new(&self.config.public_dir))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer_addr): ConnectInfo<SocketAddr>,
    State(state): State<ServerState>,
) -> impl IntoResponse {
    let shutdown_rx = state.shutdown_tx.subscribe();
    ws.on_upgrade(move |socket| handle_websocket(socket, peer_addr, shutdown_rx))
}

/// Echo session on the WebSocket endpoint
async fn handle_websocket(
    socket: WebSocket,
    peer_addr: SocketAddr,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let session_id = Uuid::new_v4();
    let (mut ws_sender, mut ws_receiver) = socket.split();
    info!("WebSocket session {} opened by {}", session_id, peer_addr);

    loop {
        tokio::select! {
            msg = ws_receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        info!("WS message read [{}]: {}", session_id, text.as_str());
                        if let Err(e) = ws_sender.send(Message::Text(text)).await {
                            error!("Failed to echo in session {}: {}", session_id, e);
                            break;
                        }
                    }
                    Some(Ok(Message::Binary(data))) => {
                        warn!("WS binary message read [{}] ({} bytes), not echoed", session_id, data.len());
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) => {
                        info!("Session {} requested close", session_id);
                        break;
                    }
                    Some(Err(e)) => {
                        error!("WebSocket error in session {}: {}", session_id, e);
                        break;
                    }
                    None => {
                        break;
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Shutdown signal received, closing session {}", session_id);
                let _ = ws_sender.send(Message::Close(None)).await;
                break;
            }
        }
    }

    info!("WebSocket session {} closed", session_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Arc;
    use std::time::Duration;

    use tempfile::{tempdir, TempDir};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::task::JoinHandle;
    use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};

    use crate::client::{Endpoint, Listener};

    async fn start_server() -> (TempDir, SocketAddr, Arc<DevServer>, JoinHandle<()>) {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("index.html"), "<html>console</html>").unwrap();
        fs::write(dir.path().join("script.js"), "console.log(1);").unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let config = ServerConfig::new("127.0.0.1".to_string(), 0, dir.path().to_path_buf());
        let server = Arc::new(DevServer::new(config));

        let handle = {
            let server = Arc::clone(&server);
            tokio::spawn(async move {
                server.serve(listener).await.unwrap();
            })
        };

        (dir, addr, server, handle)
    }

    /// Send `parts` with a pause between each, then read until the peer closes
    async fn http_exchange(addr: SocketAddr, parts: &[&str]) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            stream.write_all(part.as_bytes()).await.unwrap();
        }

        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();
        String::from_utf8_lossy(&response).into_owned()
    }

    async fn http_get(addr: SocketAddr, path: &str) -> String {
        let request = format!(
            "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
            path, addr
        );
        http_exchange(addr, &[&request]).await
    }

    #[test]
    fn test_server_config() {
        let config = ServerConfig::new("127.0.0.1".to_string(), 9999, PathBuf::from("public"));
        assert_eq!(config.socket_addr(), "127.0.0.1:9999");
    }

    #[tokio::test]
    async fn test_serves_index_for_root() {
        let (_dir, addr, server, _handle) = start_server().await;

        let response = http_get(addr, "/").await;
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.to_ascii_lowercase().contains("content-type: text/html"));
        assert!(response.ends_with("<html>console</html>"));

        server.shutdown();
    }

    #[tokio::test]
    async fn test_serves_script_with_js_type() {
        let (_dir, addr, server, _handle) = start_server().await;

        let response = http_get(addr, "/script.js").await.to_ascii_lowercase();
        assert!(response.starts_with("http/1.1 200 ok"));
        assert!(response.contains("javascript"));
        assert!(response.contains("content-length: 15"));

        server.shutdown();
    }

    #[tokio::test]
    async fn test_missing_asset_is_not_found() {
        let (_dir, addr, server, _handle) = start_server().await;

        assert!(http_get(addr, "/missing.css").await.starts_with("HTTP/1.1 404"));
        assert!(http_get(addr, "/../secret").await.starts_with("HTTP/1.1 404"));

        server.shutdown();
    }

    #[tokio::test]
    async fn test_request_line_split_across_writes() {
        let (_dir, addr, server, _handle) = start_server().await;

        let response = http_exchange(
            addr,
            &["GET /ind", "ex.html HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n"],
        )
        .await;
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.ends_with("<html>console</html>"));

        let response = http_exchange(
            addr,
            &["GE", "T / HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n"],
        )
        .await;
        assert!(response.starts_with("HTTP/1.1 200 OK"));

        server.shutdown();
    }

    #[tokio::test]
    async fn test_websocket_upgrade_split_across_writes() {
        let (_dir, addr, server, _handle) = start_server().await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"GET /w").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        stream
            .write_all(
                b"s HTTP/1.1\r\nHost: x\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\
                  Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\nSec-WebSocket-Version: 13\r\n\r\n",
            )
            .await
            .unwrap();

        let mut response = Vec::new();
        let mut buffer = [0u8; 512];
        while !response.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut buffer).await.unwrap();
            assert!(n > 0, "connection closed before handshake response");
            response.extend_from_slice(&buffer[..n]);
        }
        assert!(String::from_utf8_lossy(&response).starts_with("HTTP/1.1 101"));

        server.shutdown();
    }

    #[tokio::test]
    async fn test_websocket_echoes_text() {
        let (_dir, addr, server, _handle) = start_server().await;

        let (mut ws, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
        ws.send(WsMessage::Text("hello".to_string())).await.unwrap();

        match ws.next().await {
            Some(Ok(WsMessage::Text(text))) => assert_eq!(text, "hello"),
            other => panic!("Expected echoed text, got {:?}", other),
        }

        ws.close(None).await.unwrap();
        server.shutdown();
    }

    #[tokio::test]
    async fn test_listener_sees_no_output_from_idle_server() {
        let (_dir, addr, server, handle) = start_server().await;
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let endpoint = Endpoint::from_host(addr.to_string()).unwrap();
        let mut listener = Listener::new(endpoint, Vec::new());
        let run = tokio::spawn(async move {
            let summary = listener.run(shutdown_rx).await.unwrap();
            (summary, listener.into_sink())
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        server.shutdown();
        handle.await.unwrap();
        let (summary, output) = run.await.unwrap();
        drop(shutdown_tx);

        assert_eq!(summary.messages, 0);
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_stops_server() {
        let (_dir, addr, server, handle) = start_server().await;
        // Make sure the server is accepting before signalling
        assert!(http_get(addr, "/").await.starts_with("HTTP/1.1 200"));

        server.shutdown();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
