//! Message handling against the session and the scoring API

use crate::api::{CheckMatchesRequest, MatchApi};
use crate::error::ServiceError;
use crate::payload::{JobMatch, ServiceMessage, ServiceResponse};
use crate::session::Session;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

pub struct Handler {
    api: Arc<dyn MatchApi>,
    session: Mutex<Session>,
    default_min_score: f64,
}

impl Handler {
    pub fn new(api: Arc<dyn MatchApi>, session: Session, default_min_score: f64) -> Self {
        Self {
            api,
            session: Mutex::new(session),
            default_min_score,
        }
    }

    /// Handle one message. Failures become error envelopes.
    pub async fn handle(&self, message: ServiceMessage) -> ServiceResponse {
        let kind = message.kind();
        debug!("Handling {}", kind);

        match self.dispatch(message).await {
            Ok(data) => ServiceResponse::ok(data),
            Err(e) => {
                warn!("{} failed: {}", kind, e);
                ServiceResponse::error(&e.to_string())
            }
        }
    }

    async fn dispatch(&self, message: ServiceMessage) -> Result<Value, ServiceError> {
        match message {
            ServiceMessage::CheckJobMatches {
                min_score,
                platform_source,
            } => {
                let matches = self.job_matches(min_score, platform_source).await;
                Ok(json!({ "matches": matches }))
            }

            ServiceMessage::SubmitLinks { urls } => {
                let token = {
                    let session = self.session.lock().await;
                    session
                        .token()
                        .map(str::to_string)
                        .ok_or(ServiceError::NotAuthenticated)?
                };

                let result = self.api.submit_links(&token, &urls).await?;
                info!(
                    "Submitted {} links ({} skipped)",
                    result.submitted, result.skipped
                );
                Ok(serde_json::to_value(result)?)
            }

            ServiceMessage::GetAuthState => {
                let session = self.session.lock().await;
                Ok(serde_json::to_value(session.auth_state())?)
            }

            ServiceMessage::SetActiveResume { resume_id } => {
                self.session.lock().await.set_resume(&resume_id);
                info!("Active résumé set to {}", resume_id);
                Ok(json!({ "resumeId": resume_id }))
            }

            ServiceMessage::Logout => {
                let mut session = self.session.lock().await;
                session.logout();
                info!("Logged out");
                Ok(serde_json::to_value(session.auth_state())?)
            }
        }
    }

    /// Matches for the active résumé; empty whenever they cannot be had
    async fn job_matches(
        &self,
        min_score: Option<f64>,
        platform_source: Option<String>,
    ) -> Vec<JobMatch> {
        let (token, resume_id) = {
            let session = self.session.lock().await;
            match session.credentials() {
                Some((token, resume_id)) => (token.to_string(), resume_id.to_string()),
                None => {
                    debug!("No token or résumé, no matches");
                    return Vec::new();
                }
            }
        };

        let min_score = match min_score {
            Some(score) if score > 0.0 => score,
            _ => self.default_min_score,
        };

        let request = CheckMatchesRequest {
            resume_id,
            min_score,
            platform_source,
        };

        match self.api.check_matches(&token, &request).await {
            Ok(matches) => {
                debug!("{} matches at >= {}", matches.len(), min_score);
                matches
            }
            Err(e) => {
                error!("Failed to check job matches: {}", e);
                Vec::new()
            }
        }
    }
}
