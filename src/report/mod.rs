//! Report - End-of-Session Report Synthesis
//!
//! ## Responsibilities
//!
//! - Combine session identity, elapsed time, frozen counters, scoring
//!   output and the full alert history into one immutable report value
//! - Deterministic recommendation generation from score band and deduction
//!   reasons
//!
//! Synthesis is pure given its inputs; the only clock read is the
//! informational `generatedAt` footer, which carries no semantics.

use crate::aggregator::{AggregateSnapshot, SessionStats};
use crate::scoring::{Deduction, ScoreBreakdown};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// Per-category totals surfaced in the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedStats {
    pub focus_lost: u64,
    pub mobile_detected: u64,
    pub multiple_people: u64,
    pub no_face_detected: u64,
}

/// Alert entry with a display-formatted timestamp
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportAlert {
    #[serde(rename = "type")]
    pub kind: String,
    pub details: String,
    pub timestamp: String,
}

/// Immutable end-of-session summary document
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub candidate_name: String,
    pub session_id: String,
    pub session_date: String,
    pub session_time: String,
    /// `m:ss` display form of the session length
    pub duration: String,
    pub duration_seconds: u64,
    pub total_frames: u64,
    pub integrity_score: i32,
    pub deductions: Vec<Deduction>,
    /// Alert count per alert type
    pub suspicious_events: HashMap<String, u64>,
    pub detailed_stats: DetailedStats,
    /// Full ordered alert history
    pub alert_log: Vec<ReportAlert>,
    pub recommendations: Vec<String>,
    /// Informational footer; excluded from any equality semantics
    pub generated_at: String,
}

/// Build the report from frozen session state
pub fn synthesize(
    session_id: &str,
    candidate_name: &str,
    started_at: DateTime<Utc>,
    duration_seconds: u64,
    snapshot: &AggregateSnapshot,
    breakdown: &ScoreBreakdown,
) -> Report {
    Report {
        candidate_name: candidate_name.to_string(),
        session_id: session_id.to_string(),
        session_date: started_at.format("%Y-%m-%d").to_string(),
        session_time: started_at.format("%H:%M:%S").to_string(),
        duration: format_duration(duration_seconds),
        duration_seconds,
        total_frames: snapshot.stats.total_frames_captured,
        integrity_score: breakdown.score,
        deductions: breakdown.deductions.clone(),
        suspicious_events: snapshot.alert_tally.clone(),
        detailed_stats: detailed_stats(&snapshot.stats),
        alert_log: snapshot
            .alert_history
            .iter()
            .map(|alert| ReportAlert {
                kind: alert.kind.clone(),
                details: alert.details.clone(),
                timestamp: format_alert_timestamp(alert.timestamp),
            })
            .collect(),
        recommendations: recommendations(breakdown.score, &breakdown.deductions),
        generated_at: Utc::now().to_rfc3339(),
    }
}

fn detailed_stats(stats: &SessionStats) -> DetailedStats {
    DetailedStats {
        focus_lost: stats.looking_away_frames,
        mobile_detected: stats.mobile_detected_frames,
        multiple_people: stats.multiple_people_frames,
        no_face_detected: stats.no_face_frames,
    }
}

/// Format elapsed seconds as `m:ss`
pub fn format_duration(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

fn format_alert_timestamp(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| millis.to_string())
}

/// Deterministic recommendation table: one baseline sentence by score band,
/// then one sentence per distinct deduction reason
fn recommendations(score: i32, deductions: &[Deduction]) -> Vec<String> {
    let baseline = if score >= 90 {
        "Excellent performance with minimal violations detected."
    } else if score >= 75 {
        "Good performance with minor violations. Consider reviewing flagged incidents."
    } else if score >= 60 {
        "Moderate violations detected. Manual review recommended."
    } else {
        "Significant violations detected. Immediate review required."
    };

    let mut result = vec![baseline.to_string()];
    let mut seen: Vec<&str> = Vec::new();

    for deduction in deductions {
        if seen.contains(&deduction.reason.as_str()) {
            continue;
        }
        seen.push(&deduction.reason);

        let sentence = match deduction.reason.as_str() {
            "Looking Away" => {
                "Candidate frequently looked away from screen. Verify exam environment."
            }
            "Mobile Device" => {
                "Mobile device detected. Investigate potential unauthorized assistance."
            }
            "Multiple People" => {
                "Multiple people detected. Verify candidate identity and exam integrity."
            }
            "Face Not Visible" => {
                "Face frequently not visible. Check camera setup and candidate positioning."
            }
            _ => continue,
        };
        result.push(sentence.to_string());
    }

    result
}
