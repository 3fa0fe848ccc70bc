//! Request/response channel to the match service.
//!
//! The annotator never talks to the scoring API itself. It sends small JSON
//! messages to the match service, which holds the session and does the HTTP
//! work. Failures are reported as a closed set of kinds so callers can tell
//! "not up yet" from "gone for good" without looking at message text.

use crate::types::MatchEntry;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::{debug, trace, warn};

/// Error text a relay reports when nothing listens on the other side
pub const NOT_READY_MESSAGE: &str = "Could not establish connection. Receiving end does not exist.";

/// Error text reported once the service this page was attached to is gone
pub const INVALIDATED_MESSAGE: &str = "Extension context invalidated";

/// Messages sent from a page to the match service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentMessage {
    /// Fetch all matches for the active résumé
    CheckJobMatches {
        #[serde(rename = "minScore", default, skip_serializing_if = "Option::is_none")]
        min_score: Option<f64>,
        /// Service-side source name; `null` when the platform is unknown
        #[serde(rename = "platformSource", default)]
        platform_source: Option<String>,
    },
    /// Queue job URLs for indexing
    SubmitLinks { urls: Vec<String> },
}

/// Response envelope shared by every message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Identifies the running service process
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

/// Payload of a successful `CHECK_JOB_MATCHES`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchesData {
    pub matches: Vec<MatchEntry>,
}

/// Payload of a successful `SUBMIT_LINKS`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitData {
    pub submitted: u32,
    pub skipped: u32,
}

impl ServiceResponse {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            instance: None,
        }
    }

    pub fn error(message: &str) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.to_string()),
            instance: None,
        }
    }

    /// Decode `data` of a successful response
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, TransportError> {
        if !self.success {
            return Err(TransportError::Failed(
                self.error
                    .clone()
                    .unwrap_or_else(|| "Request failed".to_string()),
            ));
        }

        let data = self.data.clone().unwrap_or(serde_json::Value::Null);
        serde_json::from_value(data)
            .map_err(|e| TransportError::Failed(format!("Malformed response data: {}", e)))
    }

    pub fn matches(&self) -> Result<Vec<MatchEntry>, TransportError> {
        self.decode::<MatchesData>().map(|data| data.matches)
    }

    pub fn submit_result(&self) -> Result<SubmitData, TransportError> {
        self.decode()
    }
}

/// Transport failure kinds
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Nobody is listening yet; worth one more try shortly
    #[error("{}", NOT_READY_MESSAGE)]
    NotReady,

    /// The service this page was attached to went away; terminal
    #[error("{}", INVALIDATED_MESSAGE)]
    ContextInvalidated,

    #[error("{0}")]
    Failed(String),
}

impl TransportError {
    /// Map an error message from a relay or older service build to its kind
    pub fn classify(message: &str) -> Self {
        if message.contains("Extension context invalidated") {
            TransportError::ContextInvalidated
        } else if message.contains("Could not establish connection")
            || message.contains("Receiving end does not exist")
        {
            TransportError::NotReady
        } else {
            TransportError::Failed(message.to_string())
        }
    }
}

/// Something that can carry a [`ContentMessage`] to the match service
#[async_trait(?Send)]
pub trait Transport {
    async fn send(&self, message: &ContentMessage) -> Result<ServiceResponse, TransportError>;
}

/// Newline-delimited JSON over the match service's Unix socket.
///
/// One connection per message. The first `instance` id seen is remembered;
/// a response from a different instance means the service restarted and
/// whatever this page was attached to no longer exists.
pub struct SocketTransport {
    socket_path: PathBuf,
    timeout: Duration,
    instance: RefCell<Option<String>>,
}

impl SocketTransport {
    pub fn new(socket_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout,
            instance: RefCell::new(None),
        }
    }

    async fn exchange(&self, message: &ContentMessage) -> Result<ServiceResponse, TransportError> {
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound | ErrorKind::ConnectionRefused => TransportError::NotReady,
                _ => TransportError::Failed(format!("Connect failed: {}", e)),
            })?;

        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        let json = serde_json::to_string(message)
            .map_err(|e| TransportError::Failed(format!("Encode failed: {}", e)))?;

        writer
            .write_all(json.as_bytes())
            .await
            .map_err(|e| TransportError::Failed(e.to_string()))?;
        writer
            .write_all(b"\n")
            .await
            .map_err(|e| TransportError::Failed(e.to_string()))?;
        writer
            .flush()
            .await
            .map_err(|e| TransportError::Failed(e.to_string()))?;

        let mut line = String::new();
        let read = reader
            .read_line(&mut line)
            .await
            .map_err(|e| TransportError::Failed(e.to_string()))?;
        if read == 0 {
            return Err(TransportError::Failed(
                "Connection closed before response".to_string(),
            ));
        }

        serde_json::from_str(&line)
            .map_err(|e| TransportError::Failed(format!("Malformed response: {}", e)))
    }

    fn check_instance(&self, response: &ServiceResponse) -> Result<(), TransportError> {
        let Some(seen) = response.instance.as_deref() else {
            return Ok(());
        };

        let mut known = self.instance.borrow_mut();
        match known.as_deref() {
            None => {
                debug!("Attached to match service instance {}", seen);
                *known = Some(seen.to_string());
                Ok(())
            }
            Some(current) if current == seen => Ok(()),
            Some(current) => {
                debug!("Match service instance changed: {} -> {}", current, seen);
                Err(TransportError::ContextInvalidated)
            }
        }
    }
}

#[async_trait(?Send)]
impl Transport for SocketTransport {
    async fn send(&self, message: &ContentMessage) -> Result<ServiceResponse, TransportError> {
        trace!("Sending {:?} to {:?}", message, self.socket_path);

        let response = match tokio::time::timeout(self.timeout, self.exchange(message)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!("Match service did not answer within {:?}", self.timeout);
                return Err(TransportError::Failed("Request timed out".to_string()));
            }
        };

        self.check_instance(&response)?;

        // A relay in between reports its own connectivity problems as text
        if !response.success {
            if let Some(error) = response.error.as_deref() {
                match TransportError::classify(error) {
                    TransportError::Failed(_) => {}
                    kind => return Err(kind),
                }
            }
        }

        Ok(response)
    }
}
