//! SessionRegistry - Session Registration Collaborator
//!
//! ## Responsibilities
//!
//! - Register a session before it goes active
//! - Notify the collaborator when a session ends
//!
//! The end call may return the collaborator's own final score. It is
//! advisory only: the engine always recomputes the score from its local
//! counters, which are the source of truth for the report.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Registration collaborator interface
pub trait SessionRegistry: Send + Sync {
    /// Register a new session; failure aborts session start
    fn start_session(
        &self,
        session_id: &str,
        candidate_name: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Mark a session as ended; may return the collaborator's advisory score
    fn end_session(&self, session_id: &str) -> impl Future<Output = Result<Option<i32>>> + Send;
}

#[derive(Debug, Serialize)]
struct StartSessionRequest<'a> {
    session_id: &'a str,
    candidate_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct EndSessionAck {
    #[serde(default)]
    integrity_score: Option<i32>,
}

impl<T: SessionRegistry + ?Sized> SessionRegistry for std::sync::Arc<T> {
    fn start_session(
        &self,
        session_id: &str,
        candidate_name: &str,
    ) -> impl Future<Output = Result<()>> + Send {
        (**self).start_session(session_id, candidate_name)
    }

    fn end_session(&self, session_id: &str) -> impl Future<Output = Result<Option<i32>>> + Send {
        (**self).end_session(session_id)
    }
}

/// HTTP-backed registry client
pub struct HttpSessionRegistry {
    http: reqwest::Client,
    base_url: String,
}

impl HttpSessionRegistry {
    /// Create a new registry client
    pub fn new(base_url: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .expect("Failed to create HTTP client");

        Self { http, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

impl SessionRegistry for HttpSessionRegistry {
    async fn start_session(&self, session_id: &str, candidate_name: &str) -> Result<()> {
        let url = self.url("/api/session/start");
        let response = self
            .http
            .post(&url)
            .json(&StartSessionRequest {
                session_id,
                candidate_name,
            })
            .send()
            .await
            .map_err(|e| Error::SessionStartFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::SessionStartFailed(format!("{status} - {body}")));
        }

        Ok(())
    }

    async fn end_session(&self, session_id: &str) -> Result<Option<i32>> {
        let url = self.url(&format!("/api/session/{session_id}/end"));
        let response = self
            .http
            .post(&url)
            .send()
            .await
            .map_err(|e| Error::SessionEndFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::SessionEndFailed(response.status().to_string()));
        }

        let ack: EndSessionAck = response
            .json()
            .await
            .map_err(|e| Error::SessionEndFailed(e.to_string()))?;

        Ok(ack.integrity_score)
    }
}

/// Registry that accepts everything; used when no collaborator is deployed
#[derive(Debug, Default, Clone)]
pub struct OfflineRegistry;

impl SessionRegistry for OfflineRegistry {
    async fn start_session(&self, session_id: &str, candidate_name: &str) -> Result<()> {
        tracing::debug!(
            session_id = %session_id,
            candidate_name = %candidate_name,
            "Offline registry: session start accepted"
        );
        Ok(())
    }

    async fn end_session(&self, session_id: &str) -> Result<Option<i32>> {
        tracing::debug!(session_id = %session_id, "Offline registry: session end accepted");
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_without_double_slash() {
        let registry = HttpSessionRegistry::new("http://backend:8000/".to_string());
        assert_eq!(
            registry.url("/api/session/start"),
            "http://backend:8000/api/session/start"
        );
    }

    #[test]
    fn test_start_request_wire_shape() {
        let request = StartSessionRequest {
            session_id: "session_1700000000000",
            candidate_name: "Alice",
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json.get("session_id").unwrap().as_str(),
            Some("session_1700000000000")
        );
        assert_eq!(json.get("candidate_name").unwrap().as_str(), Some("Alice"));
    }

    #[test]
    fn test_end_ack_score_optional() {
        let ack: EndSessionAck = serde_json::from_str(r#"{"message": "ok"}"#).unwrap();
        assert_eq!(ack.integrity_score, None);

        let ack: EndSessionAck =
            serde_json::from_str(r#"{"integrity_score": 85, "message": "ok"}"#).unwrap();
        assert_eq!(ack.integrity_score, Some(85));
    }
}
