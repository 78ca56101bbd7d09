//! Session - Session Lifecycle State Machine
//!
//! ## Responsibilities
//!
//! - `Idle -> Active -> Ended` lifecycle, one instance per monitored session
//! - Session identity and the 1-second elapsed-time clock
//! - Orchestration of the frame pipeline, detection channel and aggregator
//! - Freezing state at session end and invoking report synthesis
//!
//! Every session owns its channel, counters, alert log and clock outright;
//! nothing is shared between concurrent sessions except the process-wide
//! session id allocator. Dropping a session (abandonment) cancels its
//! worker and releases the channel without producing a report.

mod event_loop;

use crate::aggregator::{Aggregator, Alert, SessionStats};
use crate::config::EngineConfig;
use crate::detector_channel;
use crate::error::{Error, Result};
use crate::frame_source::FrameSource;
use crate::report::{self, Report};
use crate::scoring::{score, ScoreBreakdown};
use crate::session_registry::SessionRegistry;
use chrono::{DateTime, Utc};
use self::event_loop::EventLoopContext;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Active,
    /// Terminal; reached by explicit end or abandonment
    Ended,
}

/// Last issued session id milliseconds, kept strictly increasing so ids are
/// unique for the lifetime of the process even under clock adjustment
static LAST_ISSUED_MS: AtomicI64 = AtomicI64::new(0);

/// Allocate a fresh monotonic-time-derived session id
pub fn next_session_id() -> String {
    let now = Utc::now().timestamp_millis();
    let mut prev = LAST_ISSUED_MS.load(Ordering::Relaxed);
    loop {
        let candidate = now.max(prev + 1);
        match LAST_ISSUED_MS.compare_exchange(prev, candidate, Ordering::Relaxed, Ordering::Relaxed)
        {
            Ok(_) => return format!("session_{candidate}"),
            Err(actual) => prev = actual,
        }
    }
}

/// One monitored exam session
pub struct ProctorSession<R: SessionRegistry> {
    config: EngineConfig,
    registry: R,
    state: SessionState,
    session_id: Option<String>,
    candidate_name: Option<String>,
    started_at: Option<DateTime<Utc>>,
    elapsed_secs: Arc<AtomicU64>,
    aggregator: Arc<RwLock<Aggregator>>,
    live_score: Arc<RwLock<ScoreBreakdown>>,
    channel_lost: Arc<AtomicBool>,
    cancel: CancellationToken,
    worker: Option<JoinHandle<()>>,
}

impl<R: SessionRegistry> ProctorSession<R> {
    /// Create an idle session
    pub fn new(config: EngineConfig, registry: R) -> Self {
        Self {
            config,
            registry,
            state: SessionState::Idle,
            session_id: None,
            candidate_name: None,
            started_at: None,
            elapsed_secs: Arc::new(AtomicU64::new(0)),
            aggregator: Arc::new(RwLock::new(Aggregator::new())),
            live_score: Arc::new(RwLock::new(ScoreBreakdown::default())),
            channel_lost: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
            worker: None,
        }
    }

    /// Start the session for a candidate
    ///
    /// Registers the session with the collaborator, opens the detection
    /// channel and spawns the event loop. A rejected registration aborts
    /// with `SessionStartFailed` and leaves the session idle. A failed
    /// channel connection does not: the session starts degraded, with no
    /// scoring input, and can still be ended normally.
    pub async fn start<S: FrameSource>(
        &mut self,
        candidate_name: &str,
        source: S,
    ) -> Result<String> {
        if self.state != SessionState::Idle {
            return Err(Error::InvalidInput("session already started".to_string()));
        }
        let candidate = candidate_name.trim();
        if candidate.is_empty() {
            return Err(Error::InvalidInput(
                "candidate name must not be empty".to_string(),
            ));
        }

        let session_id = next_session_id();
        self.registry.start_session(&session_id, candidate).await?;

        // Fresh per-session state
        self.elapsed_secs.store(0, Ordering::Relaxed);
        *self.aggregator.write().await = Aggregator::new();
        *self.live_score.write().await = ScoreBreakdown::default();
        self.channel_lost.store(false, Ordering::Relaxed);

        let url = self.config.channel_url(&session_id);
        let (sink, stream) = match detector_channel::connect(&url).await {
            Ok((sink, stream)) => (Some(sink), Some(stream)),
            Err(e) => {
                tracing::warn!(
                    session_id = %session_id,
                    error = %e,
                    "Detection channel unavailable; session continues without scoring input"
                );
                self.channel_lost.store(true, Ordering::Relaxed);
                (None, None)
            }
        };

        self.cancel = CancellationToken::new();
        let ctx = EventLoopContext {
            cancel: self.cancel.child_token(),
            source,
            sink,
            stream,
            aggregator: self.aggregator.clone(),
            live_score: self.live_score.clone(),
            elapsed_secs: self.elapsed_secs.clone(),
            channel_lost: self.channel_lost.clone(),
            frame_interval: self.config.frame_interval,
            jpeg_quality: self.config.jpeg_quality,
            max_frame_dimension: self.config.max_frame_dimension,
        };
        self.worker = Some(tokio::spawn(event_loop::run(ctx)));

        self.started_at = Some(Utc::now());
        self.candidate_name = Some(candidate.to_string());
        self.session_id = Some(session_id.clone());
        self.state = SessionState::Active;

        tracing::info!(
            session_id = %session_id,
            candidate_name = %candidate,
            "Session started"
        );

        Ok(session_id)
    }

    /// End the session and synthesize the report
    ///
    /// Idempotent: a second call on an ended session is a no-op returning
    /// `None`. The score is recomputed from the frozen counters rather than
    /// taken from the live value, so a result landing just before the end
    /// request cannot race the report. The registration collaborator's end
    /// response is advisory; local state always prevails so a report can be
    /// produced even when the collaborator rejects the request.
    pub async fn end(&mut self) -> Result<Option<Report>> {
        match self.state {
            SessionState::Ended => return Ok(None),
            SessionState::Idle => {
                return Err(Error::InvalidInput("no active session to end".to_string()))
            }
            SessionState::Active => {}
        }

        // Stops new frame sends immediately; an in-flight result is discarded
        self.cancel.cancel();
        if let Some(worker) = self.worker.take() {
            let _ = worker.await;
        }

        let session_id = self.session_id.clone().unwrap_or_default();
        let candidate = self.candidate_name.clone().unwrap_or_default();
        let started_at = self.started_at.unwrap_or_else(Utc::now);
        let duration_seconds = self.elapsed_secs.load(Ordering::Relaxed);

        let snapshot = self.aggregator.read().await.snapshot();
        let breakdown = score(&snapshot.stats);

        match self.registry.end_session(&session_id).await {
            Ok(Some(remote_score)) if remote_score != breakdown.score => {
                tracing::info!(
                    session_id = %session_id,
                    remote_score = remote_score,
                    local_score = breakdown.score,
                    "Registry score differs; keeping locally computed value"
                );
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(
                    session_id = %session_id,
                    error = %e,
                    "Session end not acknowledged by registry; ending locally"
                );
            }
        }

        let report = report::synthesize(
            &session_id,
            &candidate,
            started_at,
            duration_seconds,
            &snapshot,
            &breakdown,
        );

        self.state = SessionState::Ended;
        tracing::info!(
            session_id = %session_id,
            score = breakdown.score,
            duration_seconds = duration_seconds,
            total_frames = snapshot.stats.total_frames_captured,
            "Session ended"
        );

        Ok(Some(report))
    }

    /// Discard the session without producing a report
    ///
    /// Releases the detection channel, frame loop and clock. Safe to call
    /// in any state.
    pub fn abandon(&mut self) {
        if self.state == SessionState::Active {
            tracing::info!(session_id = ?self.session_id, "Session abandoned");
        }
        self.cancel.cancel();
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
        self.state = SessionState::Ended;
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Session id, present once the session has started
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Elapsed session time, 1-second resolution
    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed_secs.load(Ordering::Relaxed)
    }

    /// Whether the detection channel has been lost
    pub fn channel_lost(&self) -> bool {
        self.channel_lost.load(Ordering::Relaxed)
    }

    /// Current counter snapshot
    pub async fn stats(&self) -> SessionStats {
        self.aggregator.read().await.stats().clone()
    }

    /// Most recent live score
    pub async fn live_score(&self) -> ScoreBreakdown {
        self.live_score.read().await.clone()
    }

    /// Bounded recent alerts for live display
    pub async fn recent_alerts(&self) -> Vec<Alert> {
        self.aggregator.read().await.recent_alerts()
    }
}

impl<R: SessionRegistry> Drop for ProctorSession<R> {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_source::TestPatternSource;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct StubRegistry {
        reject_start: bool,
        starts: AtomicUsize,
        ends: AtomicUsize,
    }

    impl SessionRegistry for Arc<StubRegistry> {
        async fn start_session(&self, _session_id: &str, _candidate_name: &str) -> Result<()> {
            self.starts.fetch_add(1, Ordering::Relaxed);
            if self.reject_start {
                return Err(Error::SessionStartFailed("registry says no".to_string()));
            }
            Ok(())
        }

        async fn end_session(&self, _session_id: &str) -> Result<Option<i32>> {
            self.ends.fetch_add(1, Ordering::Relaxed);
            Ok(Some(42))
        }
    }

    fn unreachable_config() -> EngineConfig {
        EngineConfig {
            // Nothing listens here; the session must start degraded
            detector_ws_url: "ws://127.0.0.1:9".to_string(),
            api_base_url: "http://127.0.0.1:9".to_string(),
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_session_ids_unique_and_increasing() {
        let ids: Vec<String> = (0..50).map(|_| next_session_id()).collect();
        let mut previous = 0i64;
        for id in &ids {
            let millis: i64 = id.strip_prefix("session_").unwrap().parse().unwrap();
            assert!(millis > previous, "id {id} not strictly increasing");
            previous = millis;
        }
    }

    #[tokio::test]
    async fn test_start_requires_candidate_name() {
        let registry = Arc::new(StubRegistry::default());
        let mut session = ProctorSession::new(unreachable_config(), registry.clone());

        let result = session.start("   ", TestPatternSource::new(8, 8)).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert_eq!(session.state(), SessionState::Idle);
        // Registration must not even be attempted
        assert_eq!(registry.starts.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_rejected_registration_aborts_start() {
        let registry = Arc::new(StubRegistry {
            reject_start: true,
            ..StubRegistry::default()
        });
        let mut session = ProctorSession::new(unreachable_config(), registry.clone());

        let result = session.start("Alice", TestPatternSource::new(8, 8)).await;
        assert!(matches!(result, Err(Error::SessionStartFailed(_))));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_lifecycle_with_lost_channel() {
        let registry = Arc::new(StubRegistry::default());
        let mut session = ProctorSession::new(unreachable_config(), registry.clone());

        let session_id = session
            .start("Alice", TestPatternSource::new(8, 8))
            .await
            .unwrap();
        assert_eq!(session.state(), SessionState::Active);
        assert!(session.channel_lost());
        assert!(session_id.starts_with("session_"));

        // A degraded session still ends with a valid report
        let report = session.end().await.unwrap().expect("first end yields report");
        assert_eq!(report.session_id, session_id);
        assert_eq!(report.candidate_name, "Alice");
        assert_eq!(report.total_frames, 0);
        assert_eq!(report.integrity_score, 100);
        assert_eq!(session.state(), SessionState::Ended);
        assert_eq!(registry.ends.load(Ordering::Relaxed), 1);

        // Second end is a no-op
        assert!(session.end().await.unwrap().is_none());
        assert_eq!(registry.ends.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_end_without_start_is_an_error() {
        let registry = Arc::new(StubRegistry::default());
        let mut session = ProctorSession::new(unreachable_config(), registry);
        assert!(matches!(
            session.end().await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_double_start_rejected() {
        let registry = Arc::new(StubRegistry::default());
        let mut session = ProctorSession::new(unreachable_config(), registry);

        session
            .start("Alice", TestPatternSource::new(8, 8))
            .await
            .unwrap();
        let second = session.start("Bob", TestPatternSource::new(8, 8)).await;
        assert!(matches!(second, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_abandon_releases_without_report() {
        let registry = Arc::new(StubRegistry::default());
        let mut session = ProctorSession::new(unreachable_config(), registry.clone());

        session
            .start("Alice", TestPatternSource::new(8, 8))
            .await
            .unwrap();
        session.abandon();
        assert_eq!(session.state(), SessionState::Ended);
        // No end-of-session report, no registry end call
        assert!(session.end().await.unwrap().is_none());
        assert_eq!(registry.ends.load(Ordering::Relaxed), 0);
    }
}
