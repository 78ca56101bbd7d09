//! Aggregator - Detection Result Accumulation
//!
//! ## Responsibilities
//!
//! - Adopt each authoritative counter snapshot from the detection service
//! - Keep a bounded recent-alert log for live display
//! - Retain the full ordered alert history for report synthesis
//!
//! Counters are replaced wholesale on every update (the service sends
//! cumulative totals, not deltas) and are never derived from alerts:
//! alerts are a human-readable echo, counters are the source of truth
//! for scoring.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Recent alerts retained for live display
pub const LIVE_ALERT_CAPACITY: usize = 10;

/// Cumulative per-category frame counters for one session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    #[serde(default)]
    pub total_frames_captured: u64,
    #[serde(default)]
    pub looking_away_frames: u64,
    #[serde(default)]
    pub mobile_detected_frames: u64,
    #[serde(default)]
    pub multiple_people_frames: u64,
    #[serde(default)]
    pub no_face_frames: u64,
}

/// A discrete notable detection event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Alert category label (e.g. "Looking Away")
    #[serde(rename = "type")]
    pub kind: String,
    /// Human-readable detail
    pub details: String,
    /// Milliseconds since epoch
    pub timestamp: i64,
}

/// One round trip's worth of detection results
#[derive(Debug, Clone, Deserialize)]
pub struct DetectionUpdate {
    #[serde(default)]
    pub alerts: Vec<Alert>,
    pub stats: SessionStats,
}

/// Frozen aggregator state, taken once when the session ends
#[derive(Debug, Clone)]
pub struct AggregateSnapshot {
    pub stats: SessionStats,
    pub alert_history: Vec<Alert>,
    pub alert_tally: HashMap<String, u64>,
}

/// Aggregator instance, owned by a single session
#[derive(Debug, Default)]
pub struct Aggregator {
    stats: SessionStats,
    recent: VecDeque<Alert>,
    history: Vec<Alert>,
    tally: HashMap<String, u64>,
}

impl Aggregator {
    /// Create an empty aggregator
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one detection update into the running state
    pub fn apply(&mut self, update: DetectionUpdate) {
        // Last write wins; no client-side merging
        self.stats = update.stats;

        for alert in update.alerts {
            *self.tally.entry(alert.kind.clone()).or_insert(0) += 1;
            if self.recent.len() >= LIVE_ALERT_CAPACITY {
                self.recent.pop_front();
            }
            self.recent.push_back(alert.clone());
            self.history.push(alert);
        }
    }

    /// Current counter snapshot
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Bounded recent alerts, oldest first
    pub fn recent_alerts(&self) -> Vec<Alert> {
        self.recent.iter().cloned().collect()
    }

    /// Full ordered alert history
    pub fn history(&self) -> &[Alert] {
        &self.history
    }

    /// Freeze the aggregate state for report synthesis
    pub fn snapshot(&self) -> AggregateSnapshot {
        AggregateSnapshot {
            stats: self.stats.clone(),
            alert_history: self.history.clone(),
            alert_tally: self.tally.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert(kind: &str, ts: i64) -> Alert {
        Alert {
            kind: kind.to_string(),
            details: format!("{kind} detected"),
            timestamp: ts,
        }
    }

    #[test]
    fn test_stats_replaced_not_merged() {
        let mut agg = Aggregator::new();
        agg.apply(DetectionUpdate {
            alerts: vec![],
            stats: SessionStats {
                total_frames_captured: 50,
                looking_away_frames: 15,
                ..SessionStats::default()
            },
        });
        agg.apply(DetectionUpdate {
            alerts: vec![],
            stats: SessionStats {
                total_frames_captured: 100,
                looking_away_frames: 10,
                ..SessionStats::default()
            },
        });

        // The second snapshot wins outright, even where counts went down
        assert_eq!(agg.stats().total_frames_captured, 100);
        assert_eq!(agg.stats().looking_away_frames, 10);
    }

    #[test]
    fn test_recent_alerts_bounded_history_unbounded() {
        let mut agg = Aggregator::new();
        let alerts: Vec<Alert> = (0i64..25).map(|i| alert("Looking Away", i)).collect();
        agg.apply(DetectionUpdate {
            alerts,
            stats: SessionStats::default(),
        });

        let recent = agg.recent_alerts();
        assert_eq!(recent.len(), LIVE_ALERT_CAPACITY);
        // The bounded log keeps the most recent entries in order
        assert_eq!(recent[0].timestamp, 15);
        assert_eq!(recent[LIVE_ALERT_CAPACITY - 1].timestamp, 24);
        assert_eq!(agg.history().len(), 25);
        assert_eq!(agg.history()[0].timestamp, 0);
    }

    #[test]
    fn test_alert_tally_counts_by_kind() {
        let mut agg = Aggregator::new();
        agg.apply(DetectionUpdate {
            alerts: vec![alert("Looking Away", 1), alert("Mobile Phone", 2)],
            stats: SessionStats::default(),
        });
        agg.apply(DetectionUpdate {
            alerts: vec![alert("Looking Away", 3)],
            stats: SessionStats::default(),
        });

        let snapshot = agg.snapshot();
        assert_eq!(snapshot.alert_tally.get("Looking Away"), Some(&2));
        assert_eq!(snapshot.alert_tally.get("Mobile Phone"), Some(&1));
    }

    #[test]
    fn test_alert_wire_field_names() {
        let parsed: Alert = serde_json::from_str(
            r#"{"type":"Multiple People","details":"Detected 2 faces","timestamp":1700000000000}"#,
        )
        .unwrap();
        assert_eq!(parsed.kind, "Multiple People");
        assert_eq!(parsed.timestamp, 1_700_000_000_000);
    }
}
