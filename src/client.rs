use serde::Deserialize;
use serde_json::json;
use std::error::Error;

use crate::roster::RosterEntry;
use crate::session::Session;

/// Result type for remote API calls
///
/// Transport failures and non-2xx statuses are not distinguished: both mean
/// the call did not succeed and the caller falls back to its error path.
pub type ApiResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

/// Payload returned by `GET /stream_status`
#[derive(Debug, Clone, Deserialize)]
pub struct StatusPayload {
    pub is_streaming: bool,
    #[serde(default)]
    pub status: DetectionStatus,
}

/// Detection snapshot nested inside [`StatusPayload`]
///
/// Every field is optional on the wire; anything absent keeps its default so a
/// sparse payload never fails to parse.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetectionStatus {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub faces: Vec<String>,
    #[serde(default)]
    pub timestamp: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SleepListResponse {
    #[serde(default)]
    list: Vec<RosterEntry>,
}

/// Client for the remote detection API
///
/// Wraps a pooled [`reqwest::Client`] and the configured base URL. One
/// instance is shared by every poll loop and request handler.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        ApiClient {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Base URL of the MJPEG feed, without the cache-busting token
    ///
    /// [`crate::stream::StreamSync`] owns token generation, so it receives
    /// this bare URL at construction and appends `?t=<token>` itself.
    pub fn feed_base(&self) -> String {
        format!("{}/video_feed", self.base_url)
    }

    /// `POST /start_stream` — begin remote capture
    pub async fn start_stream(&self) -> ApiResult<()> {
        self.http
            .post(format!("{}/start_stream", self.base_url))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// `POST /stop_stream` — end remote capture
    pub async fn stop_stream(&self) -> ApiResult<()> {
        self.http
            .post(format!("{}/stop_stream", self.base_url))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// `GET /stream_status` — poll the current remote state
    pub async fn stream_status(&self) -> ApiResult<StatusPayload> {
        let payload = self
            .http
            .get(format!("{}/stream_status", self.base_url))
            .send()
            .await?
            .error_for_status()?
            .json::<StatusPayload>()
            .await?;
        Ok(payload)
    }

    /// `GET /who-sleeping` — fetch the flagged roster
    pub async fn sleeping_list(&self) -> ApiResult<Vec<RosterEntry>> {
        let response = self
            .http
            .get(format!("{}/who-sleeping", self.base_url))
            .send()
            .await?
            .error_for_status()?
            .json::<SleepListResponse>()
            .await?;
        Ok(response.list)
    }

    /// `DELETE /who-sleeping` — remove one roster entry by name
    pub async fn delete_sleeping(&self, name: &str) -> ApiResult<()> {
        self.http
            .delete(format!("{}/who-sleeping", self.base_url))
            .json(&json!({ "name": name }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// `POST /login` — authenticate and build the session object
    pub async fn login(&self, username: &str, password: &str) -> ApiResult<Session> {
        let session = self
            .http
            .post(format!("{}/login", self.base_url))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await?
            .error_for_status()?
            .json::<Session>()
            .await?;
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_base_strips_trailing_slash() {
        let client = ApiClient::new("http://localhost:8000/");
        assert_eq!(client.feed_base(), "http://localhost:8000/video_feed");
    }

    #[test]
    fn status_payload_parses_full_body() {
        let body = r#"{
            "is_streaming": true,
            "status": {
                "label": "Closed",
                "confidence": 0.91,
                "faces": ["krit", "pim"],
                "timestamp": 1724900000.5
            }
        }"#;
        let payload: StatusPayload = serde_json::from_str(body).unwrap();
        assert!(payload.is_streaming);
        assert_eq!(payload.status.label.as_deref(), Some("Closed"));
        assert_eq!(payload.status.faces, vec!["krit", "pim"]);
    }

    #[test]
    fn status_payload_defaults_missing_fields() {
        // A payload with no status block at all must still parse; missing
        // fields read as "not present".
        let payload: StatusPayload = serde_json::from_str(r#"{"is_streaming": false}"#).unwrap();
        assert!(!payload.is_streaming);
        assert!(payload.status.label.is_none());
        assert!(payload.status.faces.is_empty());

        let payload: StatusPayload =
            serde_json::from_str(r#"{"is_streaming": true, "status": {"label": "Open"}}"#).unwrap();
        assert_eq!(payload.status.label.as_deref(), Some("Open"));
        assert!(payload.status.confidence.is_none());
    }

    #[test]
    fn sleep_list_response_defaults_to_empty() {
        let response: SleepListResponse = serde_json::from_str("{}").unwrap();
        assert!(response.list.is_empty());
    }
}
