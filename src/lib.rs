//! Proctoring Session Engine
//!
//! Real-time exam monitoring: frames stream to a detection service over a
//! persistent channel, detection results accumulate into counters and
//! alerts, an integrity score is derived continuously, and a final report
//! is synthesized when the session ends.
//!
//! ## Architecture (9 Components)
//!
//! 1. EngineConfig - Environment-backed configuration
//! 2. FrameSource - Frame acquisition seam (camera or synthetic)
//! 3. FrameCodec - Bounded JPEG encoding + transport payload
//! 4. DetectorChannel - Duplex WebSocket to the detection service
//! 5. Aggregator - Counter snapshots and bounded alert log
//! 6. Scoring - Pure counters-to-score derivation
//! 7. Session - Lifecycle state machine and per-session event loop
//! 8. SessionRegistry - Registration collaborator client
//! 9. Report - End-of-session report synthesis
//!
//! ## Design Principles
//!
//! - Counters from the detection service are the single source of truth
//! - Single-flight frame transmission; at most one round trip outstanding
//! - Sessions are fully isolated; no shared state across sessions
//! - Failures degrade the current session, never the host process

pub mod aggregator;
pub mod config;
pub mod detector_channel;
pub mod error;
pub mod frame_codec;
pub mod frame_source;
pub mod report;
pub mod scoring;
pub mod session;
pub mod session_registry;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use report::Report;
pub use session::{ProctorSession, SessionState};
