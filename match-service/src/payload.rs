//! Message and response types

use serde::{Deserialize, Serialize};

/// Message received from a page, the native host, or a local tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceMessage {
    /// All matches for the active résumé at or above a score
    CheckJobMatches {
        #[serde(rename = "minScore", default, skip_serializing_if = "Option::is_none")]
        min_score: Option<f64>,
        #[serde(rename = "platformSource", default, skip_serializing_if = "Option::is_none")]
        platform_source: Option<String>,
    },

    /// Queue job URLs for indexing
    SubmitLinks { urls: Vec<String> },

    GetAuthState,

    SetActiveResume {
        #[serde(rename = "resumeId")]
        resume_id: String,
    },

    Logout,
}

impl ServiceMessage {
    /// Wire name, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceMessage::CheckJobMatches { .. } => "CHECK_JOB_MATCHES",
            ServiceMessage::SubmitLinks { .. } => "SUBMIT_LINKS",
            ServiceMessage::GetAuthState => "GET_AUTH_STATE",
            ServiceMessage::SetActiveResume { .. } => "SET_ACTIVE_RESUME",
            ServiceMessage::Logout => "LOGOUT",
        }
    }
}

/// A job the scoring API matched to the résumé
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMatch {
    pub url: String,
    pub score: f64,
}

/// Session summary reported to callers (the token itself never leaves)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthState {
    pub authenticated: bool,
    #[serde(rename = "resumeId")]
    pub resume_id: Option<String>,
}

/// Response sent back to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Id of the running service process
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
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

    pub fn with_instance(mut self, instance: &str) -> Self {
        self.instance = Some(instance.to_string());
        self
    }
}
