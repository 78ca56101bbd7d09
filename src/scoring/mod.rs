//! Scoring - Integrity Score Derivation
//!
//! ## Responsibilities
//!
//! - Pure counters-to-score function, callable live and at session end
//! - Per-category deduction records for the report
//!
//! The same function serves the live display and the final report; there is
//! no separate end-of-session formula. Deductions are always recomputed from
//! the counters, never accumulated incrementally.

use crate::aggregator::SessionStats;
use serde::Serialize;

/// A scoring penalty derived from one category exceeding its threshold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Deduction {
    /// Display label for the category
    pub reason: String,
    /// Points actually subtracted (after the cap)
    #[serde(rename = "deduction")]
    pub points: f64,
    /// Raw percentage of session frames, rounded to one decimal
    pub percentage: f64,
}

/// Result of one scoring pass
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub score: i32,
    pub deductions: Vec<Deduction>,
}

impl Default for ScoreBreakdown {
    fn default() -> Self {
        Self {
            score: 100,
            deductions: Vec::new(),
        }
    }
}

struct ScoringRule {
    reason: &'static str,
    /// Percentage above which the rule triggers
    threshold: f64,
    /// Deduction per percentage point
    multiplier: f64,
    /// Maximum points this rule may subtract
    cap: f64,
    count: fn(&SessionStats) -> u64,
}

const RULES: [ScoringRule; 4] = [
    ScoringRule {
        reason: "Looking Away",
        threshold: 20.0,
        multiplier: 1.0,
        cap: 30.0,
        count: |s| s.looking_away_frames,
    },
    ScoringRule {
        reason: "Mobile Device",
        threshold: 5.0,
        multiplier: 2.0,
        cap: 25.0,
        count: |s| s.mobile_detected_frames,
    },
    ScoringRule {
        reason: "Multiple People",
        threshold: 2.0,
        multiplier: 5.0,
        cap: 20.0,
        count: |s| s.multiple_people_frames,
    },
    ScoringRule {
        reason: "Face Not Visible",
        threshold: 10.0,
        multiplier: 1.0,
        cap: 15.0,
        count: |s| s.no_face_frames,
    },
];

/// Derive the integrity score and deduction list from counters
///
/// The denominator is floored at one frame so an empty session scores 100.
/// The result is clamped to [0, 100] even for out-of-contract counters
/// (category counts exceeding the total).
pub fn score(stats: &SessionStats) -> ScoreBreakdown {
    let total = stats.total_frames_captured.max(1) as f64;

    let mut remaining = 100.0;
    let mut deductions = Vec::new();

    for rule in &RULES {
        let percentage = (rule.count)(stats) as f64 / total * 100.0;
        if percentage > rule.threshold {
            let points = (percentage * rule.multiplier).min(rule.cap);
            remaining -= points;
            deductions.push(Deduction {
                reason: rule.reason.to_string(),
                points,
                percentage: (percentage * 10.0).round() / 10.0,
            });
        }
    }

    ScoreBreakdown {
        score: (remaining.floor() as i32).clamp(0, 100),
        deductions,
    }
}
