use chrono::Utc;
use serde::Serialize;
use std::time::{Duration, Instant};

use crate::client::StatusPayload;

/// Connection health as shown next to the video panel
///
/// Derived, not authoritative: set optimistically on user actions and
/// corrected by poll results and by video load success/failure events. Any
/// value may follow any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    Error,
}

/// Last known detection snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Detection {
    pub label: Option<String>,
    pub confidence: Option<f64>,
    pub faces: Vec<String>,
}

/// Serializable view of the current stream state, rendered by the page
#[derive(Debug, Clone, Serialize)]
pub struct StreamSnapshot {
    pub is_streaming: bool,
    pub status: ConnectionStatus,
    pub detection: Detection,
    pub video_src: Option<String>,
}

/// View-model for the live video/detection panel
///
/// Owns the streaming flag, the derived connection status, the last detection
/// snapshot and the bound video element's source URL. The model itself does no
/// I/O: the host issues the HTTP calls and feeds the outcomes back through the
/// `apply_*` methods, so every state transition here is synchronous and
/// applied atomically under the host's lock.
///
/// Poll responses carry a sequence token handed out by [`begin_poll`]: if a
/// slow response arrives after a newer one was already applied it is dropped,
/// so an overlapping tick can never roll the panel back to stale state.
///
/// [`begin_poll`]: StreamSync::begin_poll
pub struct StreamSync {
    is_streaming: bool,
    status: ConnectionStatus,
    detection: Detection,
    video_src: Option<String>,

    feed_base: String,
    last_token: i64,

    retry_backoff: Duration,
    retry_at: Option<Instant>,

    poll_seq: u64,
    applied_seq: u64,
}

impl StreamSync {
    /// Create a detached model pointing at the given feed URL
    /// (without the `?t=` token, which the model appends itself)
    pub fn new(feed_base: String, retry_backoff: Duration) -> Self {
        StreamSync {
            is_streaming: false,
            status: ConnectionStatus::Disconnected,
            detection: Detection::default(),
            video_src: None,
            feed_base,
            last_token: 0,
            retry_backoff,
            retry_at: None,
            poll_seq: 0,
            applied_seq: 0,
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.is_streaming
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn detection(&self) -> &Detection {
        &self.detection
    }

    /// Current source URL of the bound video element, if any
    pub fn video_src(&self) -> Option<&str> {
        self.video_src.as_deref()
    }

    pub fn snapshot(&self) -> StreamSnapshot {
        StreamSnapshot {
            is_streaming: self.is_streaming,
            status: self.status,
            detection: self.detection.clone(),
            video_src: self.video_src.clone(),
        }
    }

    /// Record the outcome of a `/start_stream` command
    ///
    /// Success marks the stream live and points the video element at a
    /// freshly cache-busted feed URL; failure only flags the error, leaving
    /// `is_streaming` untouched.
    pub fn apply_start(&mut self, ok: bool) {
        if ok {
            self.is_streaming = true;
            self.status = ConnectionStatus::Connected;
            self.video_src = Some(self.fresh_feed_url());
        } else {
            self.status = ConnectionStatus::Error;
        }
    }

    /// Record the outcome of a `/stop_stream` command
    ///
    /// Success clears the detection snapshot and the video source
    /// unconditionally. There is no optimistic stop: on failure the caller
    /// logs and the state stays as it was.
    pub fn apply_stop(&mut self, ok: bool) {
        if ok {
            self.is_streaming = false;
            self.status = ConnectionStatus::Disconnected;
            self.detection = Detection::default();
            self.video_src = None;
            self.retry_at = None;
        }
    }

    /// Hand out the sequence token for the poll about to be issued
    pub fn begin_poll(&mut self) -> u64 {
        self.poll_seq += 1;
        self.poll_seq
    }

    /// Reconcile local state with one `/stream_status` response
    ///
    /// `None` means the request failed (transport error or non-2xx) and only
    /// flags the error. A successful payload sets `is_streaming` and the
    /// connection status directly from the server's flag and overwrites the
    /// detection snapshot wholesale. A false→true streaming transition
    /// re-points the video source; an already-live stream keeps its URL.
    pub fn apply_poll(&mut self, seq: u64, payload: Option<&StatusPayload>) {
        if seq <= self.applied_seq {
            log::debug!("dropping stale stream status response (seq {seq})");
            return;
        }
        self.applied_seq = seq;

        let Some(payload) = payload else {
            self.status = ConnectionStatus::Error;
            return;
        };

        let was_streaming = self.is_streaming;
        self.is_streaming = payload.is_streaming;
        self.status = if payload.is_streaming {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Disconnected
        };

        self.detection = Detection {
            label: payload.status.label.clone(),
            confidence: payload.status.confidence,
            faces: payload.status.faces.clone(),
        };

        if payload.is_streaming && !was_streaming {
            self.video_src = Some(self.fresh_feed_url());
        }
    }

    /// The bound video element failed to load its source
    ///
    /// Flags the error and arms a retry for `now + backoff`; the retry itself
    /// happens on the next poll tick past the deadline, see
    /// [`apply_pending_retry`](StreamSync::apply_pending_retry).
    pub fn on_video_load_error(&mut self, now: Instant) {
        self.status = ConnectionStatus::Error;
        self.retry_at = Some(now + self.retry_backoff);
    }

    /// The bound video element loaded a frame
    pub fn on_video_load_success(&mut self) {
        self.status = ConnectionStatus::Connected;
    }

    /// Fire the armed video retry once its deadline has passed
    ///
    /// Called on every poll tick. The retry is consumed either way, but only
    /// re-points the source while the stream is still believed live; the new
    /// URL always differs from the previous one. Returns whether a retry was
    /// issued.
    pub fn apply_pending_retry(&mut self, now: Instant) -> bool {
        match self.retry_at {
            Some(at) if now >= at => {
                self.retry_at = None;
                if self.is_streaming {
                    self.video_src = Some(self.fresh_feed_url());
                    true
                } else {
                    false
                }
            }
            _ => false,
        }
    }

    fn fresh_feed_url(&mut self) -> String {
        let token = self.next_token();
        format!("{}?t={}", self.feed_base, token)
    }

    /// Cache-busting token: epoch milliseconds, clamped to be strictly
    /// increasing so two URLs minted in the same millisecond still differ
    fn next_token(&mut self) -> i64 {
        let now = Utc::now().timestamp_millis();
        self.last_token = if now > self.last_token {
            now
        } else {
            self.last_token + 1
        };
        self.last_token
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::DetectionStatus;

    fn sync() -> StreamSync {
        StreamSync::new(
            "http://localhost:8000/video_feed".to_string(),
            Duration::from_millis(1500),
        )
    }

    fn payload(is_streaming: bool, label: Option<&str>) -> StatusPayload {
        StatusPayload {
            is_streaming,
            status: DetectionStatus {
                label: label.map(String::from),
                confidence: label.map(|_| 0.9),
                faces: vec!["krit".to_string()],
                timestamp: Some(1.0),
            },
        }
    }

    #[test]
    fn poll_streaming_true_connects() {
        let mut s = sync();
        let seq = s.begin_poll();
        s.apply_poll(seq, Some(&payload(true, Some("Closed"))));
        assert!(s.is_streaming());
        assert_eq!(s.status(), ConnectionStatus::Connected);
        assert_eq!(s.detection().label.as_deref(), Some("Closed"));
    }

    #[test]
    fn poll_streaming_false_disconnects_but_keeps_detection_from_payload() {
        let mut s = sync();
        let seq = s.begin_poll();
        s.apply_poll(seq, Some(&payload(false, Some("Open"))));
        assert!(!s.is_streaming());
        assert_eq!(s.status(), ConnectionStatus::Disconnected);
        // Poll alone never forces the snapshot empty; it mirrors the payload.
        assert_eq!(s.detection().label.as_deref(), Some("Open"));
        assert_eq!(s.detection().faces, vec!["krit"]);
    }

    #[test]
    fn poll_failure_flags_error_and_touches_nothing_else() {
        let mut s = sync();
        let seq = s.begin_poll();
        s.apply_poll(seq, Some(&payload(true, Some("Closed"))));

        let seq = s.begin_poll();
        s.apply_poll(seq, None);
        assert_eq!(s.status(), ConnectionStatus::Error);
        assert!(s.is_streaming());
        assert_eq!(s.detection().label.as_deref(), Some("Closed"));
    }

    #[test]
    fn stale_poll_response_is_dropped() {
        let mut s = sync();
        let old = s.begin_poll();
        let new = s.begin_poll();
        s.apply_poll(new, Some(&payload(true, Some("Closed"))));
        // The slower, older response arrives afterwards and must not win.
        s.apply_poll(old, Some(&payload(false, None)));
        assert!(s.is_streaming());
        assert_eq!(s.status(), ConnectionStatus::Connected);
    }

    #[test]
    fn start_success_goes_live_and_sets_video_src() {
        let mut s = sync();
        s.apply_start(true);
        assert!(s.is_streaming());
        assert_eq!(s.status(), ConnectionStatus::Connected);
        let src = s.video_src().unwrap();
        assert!(src.starts_with("http://localhost:8000/video_feed?t="));
    }

    #[test]
    fn start_failure_flags_error_without_going_live() {
        let mut s = sync();
        s.apply_start(false);
        assert!(!s.is_streaming());
        assert_eq!(s.status(), ConnectionStatus::Error);
        assert!(s.video_src().is_none());
    }

    #[test]
    fn stop_success_clears_detection_and_video_src() {
        let mut s = sync();
        s.apply_start(true);
        let seq = s.begin_poll();
        s.apply_poll(seq, Some(&payload(true, Some("Closed"))));

        s.apply_stop(true);
        assert!(!s.is_streaming());
        assert_eq!(s.status(), ConnectionStatus::Disconnected);
        assert_eq!(*s.detection(), Detection::default());
        assert!(s.video_src().is_none());
    }

    #[test]
    fn stop_failure_leaves_state_alone() {
        let mut s = sync();
        s.apply_start(true);
        s.apply_stop(false);
        assert!(s.is_streaming());
        assert_eq!(s.status(), ConnectionStatus::Connected);
        assert!(s.video_src().is_some());
    }

    #[test]
    fn poll_transition_to_streaming_repoints_video_src() {
        let mut s = sync();
        assert!(s.video_src().is_none());
        let seq = s.begin_poll();
        s.apply_poll(seq, Some(&payload(true, None)));
        let first = s.video_src().unwrap().to_string();

        // Still streaming: the source must not churn every tick.
        let seq = s.begin_poll();
        s.apply_poll(seq, Some(&payload(true, None)));
        assert_eq!(s.video_src().unwrap(), first);
    }

    #[test]
    fn video_error_retry_mints_a_fresh_url() {
        let mut s = sync();
        s.apply_start(true);
        let before = s.video_src().unwrap().to_string();

        let now = Instant::now();
        s.on_video_load_error(now);
        assert_eq!(s.status(), ConnectionStatus::Error);

        // Not due yet.
        assert!(!s.apply_pending_retry(now));
        assert_eq!(s.video_src().unwrap(), before);

        // Past the backoff deadline: the URL must differ.
        assert!(s.apply_pending_retry(now + Duration::from_millis(1500)));
        assert_ne!(s.video_src().unwrap(), before);
    }

    #[test]
    fn video_retry_is_skipped_once_stopped() {
        let mut s = sync();
        s.apply_start(true);
        let now = Instant::now();
        s.on_video_load_error(now);
        s.apply_stop(true);
        assert!(!s.apply_pending_retry(now + Duration::from_secs(2)));
        assert!(s.video_src().is_none());
    }

    #[test]
    fn video_load_success_reconnects() {
        let mut s = sync();
        s.apply_start(true);
        s.on_video_load_error(Instant::now());
        s.on_video_load_success();
        assert_eq!(s.status(), ConnectionStatus::Connected);
    }

    #[test]
    fn consecutive_feed_urls_differ() {
        let mut s = sync();
        s.apply_start(true);
        let first = s.video_src().unwrap().to_string();
        s.apply_stop(true);
        s.apply_start(true);
        assert_ne!(s.video_src().unwrap(), first);
    }

    #[test]
    fn tokens_are_strictly_increasing() {
        let mut s = sync();
        let a = s.next_token();
        let b = s.next_token();
        let c = s.next_token();
        assert!(a < b && b < c);
    }
}
