//! In-memory session: API token and active résumé

use crate::payload::AuthState;
use tracing::info;

/// Environment variable carrying the initial API token
pub const TOKEN_ENV: &str = "JOB_MATCHER_TOKEN";

/// Environment variable carrying the initial résumé id
pub const RESUME_ENV: &str = "JOB_MATCHER_RESUME_ID";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    token: Option<String>,
    resume_id: Option<String>,
}

impl Session {
    pub fn new(token: Option<String>, resume_id: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.is_empty()),
            resume_id: resume_id.filter(|r| !r.is_empty()),
        }
    }

    /// Seed from configured values, with the environment taking precedence
    pub fn from_env_or(token: Option<String>, resume_id: Option<String>) -> Self {
        let token = std::env::var(TOKEN_ENV).ok().or(token);
        let resume_id = std::env::var(RESUME_ENV).ok().or(resume_id);
        let session = Self::new(token, resume_id);
        info!(
            "Session: authenticated={}, resume={}",
            session.token.is_some(),
            session.resume_id.as_deref().unwrap_or("none")
        );
        session
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn resume_id(&self) -> Option<&str> {
        self.resume_id.as_deref()
    }

    /// Token and résumé together, when both are present
    pub fn credentials(&self) -> Option<(&str, &str)> {
        Some((self.token()?, self.resume_id()?))
    }

    pub fn set_resume(&mut self, resume_id: &str) {
        self.resume_id = Some(resume_id.to_string());
    }

    pub fn logout(&mut self) {
        self.token = None;
        self.resume_id = None;
    }

    pub fn auth_state(&self) -> AuthState {
        AuthState {
            authenticated: self.token.is_some(),
            resume_id: self.resume_id.clone(),
        }
    }
}
