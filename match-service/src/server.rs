//! Unix socket server for page and native host messages

use crate::api::{ApiClient, MatchApi};
use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::handler::Handler;
use crate::payload::{ServiceMessage, ServiceResponse};
use crate::session::Session;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, info, warn};

/// Match server that listens on a Unix socket
pub struct MatchServer {
    socket_path: PathBuf,
    handler: Arc<Handler>,
    /// Fresh per process; lets clients notice a restart
    instance: String,
}

impl MatchServer {
    pub fn new(socket_path: impl Into<PathBuf>, handler: Handler) -> Self {
        Self {
            socket_path: socket_path.into(),
            handler: Arc::new(handler),
            instance: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Build the server, its API client and its session from configuration
    pub fn from_config(config: &ServiceConfig) -> Result<Self, ServiceError> {
        let api: Arc<dyn MatchApi> = Arc::new(ApiClient::new(
            &config.api.base_url,
            config.api.timeout(),
        )?);
        let session = Session::from_env_or(
            config.session.token.clone(),
            config.session.resume_id.clone(),
        );
        let handler = Handler::new(api, session, config.api.default_min_score);
        Ok(Self::new(&config.server.socket_path, handler))
    }

    /// Get the socket path
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Bind the socket, replacing a stale socket file
    pub fn bind(&self) -> Result<UnixListener, ServiceError> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;
        info!(
            "Match server listening on {:?} (instance {})",
            self.socket_path, self.instance
        );
        Ok(listener)
    }

    /// Start the server and listen for connections
    pub async fn run(&self) -> Result<(), ServiceError> {
        let listener = self.bind()?;
        self.serve(listener).await;
        Ok(())
    }

    /// Accept connections until the task is dropped
    pub async fn serve(&self, listener: UnixListener) {
        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let handler = Arc::clone(&self.handler);
                    let instance = self.instance.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, handler, instance).await {
                            error!("Connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }
    }

    /// Process a single message (for direct integration without socket)
    pub async fn process(&self, message: ServiceMessage) -> ServiceResponse {
        self.handler
            .handle(message)
            .await
            .with_instance(&self.instance)
    }
}

/// Handle a single client connection
async fn handle_connection(
    stream: UnixStream,
    handler: Arc<Handler>,
    instance: String,
) -> Result<(), ServiceError> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    // One JSON message per line
    while reader.read_line(&mut line).await? > 0 {
        if line.trim().is_empty() {
            line.clear();
            continue;
        }

        let response = match serde_json::from_str::<ServiceMessage>(&line) {
            Ok(message) => handler.handle(message).await,
            Err(e) => {
                warn!("Failed to parse message: {}", e);
                ServiceResponse::error(&format!("Parse error: {}", e))
            }
        };
        let response = response.with_instance(&instance);

        let response_json = serde_json::to_string(&response)?;
        writer.write_all(response_json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;

        line.clear();
    }

    debug!("Connection closed");
    Ok(())
}
