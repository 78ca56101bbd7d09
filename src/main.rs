//! Proctoring session engine demo host
//!
//! Starts one session for a candidate, streams synthetic frames to the
//! configured detection service, logs live state once per status interval,
//! and prints the final report as JSON when interrupted.

use proctor_engine::frame_source::TestPatternSource;
use proctor_engine::session_registry::{HttpSessionRegistry, OfflineRegistry, SessionRegistry};
use proctor_engine::{EngineConfig, ProctorSession};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "proctor_engine=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting proctoring engine v{}", env!("CARGO_PKG_VERSION"));

    let candidate = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("PROCTOR_CANDIDATE").ok())
        .unwrap_or_default();

    let config = EngineConfig::default();
    tracing::info!(
        detector_ws_url = %config.detector_ws_url,
        api_base_url = %config.api_base_url,
        frame_interval_ms = config.frame_interval.as_millis() as u64,
        "Configuration loaded"
    );

    if std::env::var("PROCTOR_API_URL").is_ok() {
        let registry = HttpSessionRegistry::new(config.api_base_url.clone());
        run_session(config, registry, &candidate).await
    } else {
        tracing::info!("PROCTOR_API_URL not set; running without session registration");
        run_session(config, OfflineRegistry, &candidate).await
    }
}

async fn run_session<R: SessionRegistry>(
    config: EngineConfig,
    registry: R,
    candidate: &str,
) -> anyhow::Result<()> {
    let mut session = ProctorSession::new(config, registry);
    let session_id = session
        .start(candidate, TestPatternSource::new(640, 480))
        .await?;
    tracing::info!(session_id = %session_id, "Monitoring; press Ctrl-C to end the session");

    let mut status = tokio::time::interval(Duration::from_secs(5));
    status.tick().await;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = status.tick() => {
                let stats = session.stats().await;
                let breakdown = session.live_score().await;
                tracing::info!(
                    elapsed_secs = session.elapsed_secs(),
                    total_frames = stats.total_frames_captured,
                    score = breakdown.score,
                    channel_lost = session.channel_lost(),
                    "Session status"
                );
            }
        }
    }

    match session.end().await? {
        Some(report) => println!("{}", serde_json::to_string_pretty(&report)?),
        None => tracing::warn!("Session ended with no report"),
    }

    Ok(())
}
