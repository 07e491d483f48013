//! WebSocket Trial Server
//!
//! Async WebSocket server for the blind-trial protocol. Accepts
//! connections, routes issuance and submission requests to the core
//! components, and keeps every response payload free of secret material.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::time::interval;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, error, info, instrument, warn};

use crate::network::protocol::{
    ClientMessage, ErrorCode, ServerError, ServerMessage, SubmitRequest,
};
use crate::store::RecordStore;
use crate::trial::issuer::TrialIssuer;
use crate::trial::recorder::{RecordError, RecorderConfig, SubmissionRecorder};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Idle timeout before a connection is dropped from the registry.
    pub idle_timeout: Duration,
    /// Recorder policy (duplicates, confidence bounds).
    pub recorder: RecorderConfig,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".parse().expect("static bind address"),
            max_connections: 1000,
            idle_timeout: Duration::from_secs(300),
            recorder: RecorderConfig::default(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Trial server errors.
#[derive(Debug, thiserror::Error)]
pub enum TrialServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Connected client state.
struct ConnectedClient {
    /// Connection time.
    #[allow(dead_code)]
    connected_at: Instant,
    /// Last activity.
    last_activity: Instant,
}

/// The trial server.
pub struct TrialServer {
    /// Server configuration.
    config: ServerConfig,
    /// Shared record store.
    store: Arc<RecordStore>,
    /// Trial issuer.
    issuer: TrialIssuer,
    /// Submission recorder.
    recorder: SubmissionRecorder,
    /// Connected clients.
    clients: Arc<RwLock<BTreeMap<SocketAddr, ConnectedClient>>>,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl TrialServer {
    /// Create a new trial server.
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let store = Arc::new(RecordStore::new());
        let issuer = TrialIssuer::new(store.clone());
        let recorder = SubmissionRecorder::new(store.clone(), config.recorder.clone());

        Self {
            config,
            store,
            issuer,
            recorder,
            clients: Arc::new(RwLock::new(BTreeMap::new())),
            shutdown_tx,
        }
    }

    /// Run the server.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), TrialServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!(
            "Trial server v{} listening on {}",
            self.config.version, self.config.bind_addr
        );

        // Spawn idle-connection cleanup task
        let cleanup_clients = self.clients.clone();
        let idle_timeout = self.config.idle_timeout;
        let cleanup_handle = tokio::spawn(async move {
            Self::run_cleanup_loop(cleanup_clients, idle_timeout).await;
        });

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let clients_count = self.clients.read().await.len();
                            if clients_count >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }

                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        cleanup_handle.abort();
        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let clients = self.clients.clone();
        let issuer = self.issuer.clone();
        let recorder = self.recorder.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(64);

            // Register client
            {
                let mut clients = clients.write().await;
                clients.insert(addr, ConnectedClient {
                    connected_at: Instant::now(),
                    last_activity: Instant::now(),
                });
            }

            // Spawn message sender task
            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
            });

            // Handle incoming messages
            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                let client_msg = match ClientMessage::from_json(&text) {
                                    Ok(m) => m,
                                    Err(e) => {
                                        debug!("Invalid message from {}: {}", addr, e);
                                        let _ = msg_tx.send(ServerMessage::Error(ServerError {
                                            code: ErrorCode::InvalidInput,
                                            message: "Invalid message format".to_string(),
                                        })).await;
                                        continue;
                                    }
                                };

                                // Update activity
                                {
                                    let mut clients = clients.write().await;
                                    if let Some(client) = clients.get_mut(&addr) {
                                        client.last_activity = Instant::now();
                                    }
                                }

                                Self::handle_client_message(
                                    addr,
                                    client_msg,
                                    &issuer,
                                    &recorder,
                                    &msg_tx,
                                ).await;
                            }
                            Some(Ok(Message::Binary(data))) => {
                                // Binary path carries submissions only
                                match SubmitRequest::from_bytes(&data) {
                                    Ok(req) => {
                                        Self::handle_client_message(
                                            addr,
                                            ClientMessage::Submit(req),
                                            &issuer,
                                            &recorder,
                                            &msg_tx,
                                        ).await;
                                    }
                                    Err(e) => {
                                        debug!("Invalid binary message from {}: {}", addr, e);
                                        let _ = msg_tx.send(ServerMessage::Error(ServerError {
                                            code: ErrorCode::InvalidInput,
                                            message: "Invalid message format".to_string(),
                                        })).await;
                                    }
                                }
                            }
                            Some(Ok(Message::Ping(_))) => {
                                let _ = msg_tx.send(ServerMessage::Pong {
                                    timestamp: 0,
                                    server_time: unix_millis(),
                                }).await;
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Client {} disconnected", addr);
                                break;
                            }
                            Some(Err(e)) => {
                                error!("WebSocket error for {}: {}", addr, e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        let _ = msg_tx.send(ServerMessage::Shutdown {
                            reason: "Server shutting down".to_string(),
                        }).await;
                        break;
                    }
                }
            }

            // Cleanup
            sender_task.abort();
            {
                let mut clients = clients.write().await;
                clients.remove(&addr);
            }

            info!("Client {} cleaned up", addr);
        });
    }

    /// Handle a client message.
    async fn handle_client_message(
        addr: SocketAddr,
        msg: ClientMessage,
        issuer: &TrialIssuer,
        recorder: &SubmissionRecorder,
        sender: &mpsc::Sender<ServerMessage>,
    ) {
        match msg {
            ClientMessage::StartTrial => {
                match issuer.issue().await {
                    Ok(issued) => {
                        let _ = sender.send(ServerMessage::TrialIssued(issued)).await;
                    }
                    Err(e) => {
                        // The error display never contains the scalar, but
                        // the client still only gets a generic message.
                        error!("Issuance failed for {}: {}", addr, e);
                        let _ = sender.send(ServerMessage::Error(ServerError {
                            code: ErrorCode::InternalError,
                            message: "Trial issuance failed".to_string(),
                        })).await;
                    }
                }
            }
            ClientMessage::Submit(req) => {
                match recorder.record(req.trial_id, req.guess, req.confidence).await {
                    Ok(receipt) => {
                        let _ = sender.send(ServerMessage::SubmissionAck(receipt)).await;
                    }
                    Err(e) => {
                        debug!("Submission rejected for {}: {}", addr, e);
                        let _ = sender.send(ServerMessage::Error(ServerError {
                            code: error_code(&e),
                            message: e.to_string(),
                        })).await;
                    }
                }
            }
            ClientMessage::Ping { timestamp } => {
                let _ = sender.send(ServerMessage::Pong {
                    timestamp,
                    server_time: unix_millis(),
                }).await;
            }
        }
    }

    /// Run idle-connection cleanup loop.
    async fn run_cleanup_loop(
        clients: Arc<RwLock<BTreeMap<SocketAddr, ConnectedClient>>>,
        idle_timeout: Duration,
    ) {
        let mut interval = interval(Duration::from_secs(60));

        loop {
            interval.tick().await;

            let now = Instant::now();
            let to_remove: Vec<_> = {
                let clients = clients.read().await;
                clients.iter()
                    .filter(|(_, c)| now.duration_since(c.last_activity) > idle_timeout)
                    .map(|(addr, _)| *addr)
                    .collect()
            };

            for addr in to_remove {
                let mut clients = clients.write().await;
                if clients.remove(&addr).is_some() {
                    info!("Removed idle client {}", addr);
                }
            }
        }
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get active connection count.
    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Get issued trial count.
    pub async fn trial_count(&self) -> usize {
        self.store.trial_count().await
    }

    /// Get count of trials with at least one submission.
    pub async fn submission_count(&self) -> usize {
        self.store.submission_count().await
    }
}

/// Map a recording error to its wire code.
fn error_code(e: &RecordError) -> ErrorCode {
    match e {
        RecordError::UnknownTrial => ErrorCode::TrialNotFound,
        RecordError::ConfidenceOutOfRange { .. } => ErrorCode::InvalidInput,
        RecordError::DuplicateSubmission => ErrorCode::DuplicateSubmission,
    }
}

/// Server time in unix milliseconds.
fn unix_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
