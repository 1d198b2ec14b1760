use std::collections::BTreeMap;
use std::time::SystemTime;

use serde::Serialize;

/// One dominant-emotion observation, recorded each time a frame is served
/// with a face in it.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryEntry {
    pub timestamp: SystemTime,
    pub emotion: String,
    pub score: f64,
}

impl HistoryEntry {
    pub fn now(emotion: impl Into<String>, score: f64) -> Self {
        Self {
            timestamp: SystemTime::now(),
            emotion: emotion.into(),
            score,
        }
    }
}

/// Aggregate view over the whole session history.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct EmotionAnalytics {
    /// Share of entries per label; values sum to 1.
    pub distribution: BTreeMap<String, f64>,
    /// Labels of the most recent entries, oldest first.
    pub recent: Vec<String>,
    pub total_frames: usize,
}

impl EmotionAnalytics {
    pub fn from_entries(entries: &[HistoryEntry], recent_len: usize) -> Self {
        if entries.is_empty() {
            return Self::default();
        }

        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for entry in entries {
            *counts.entry(entry.emotion.as_str()).or_default() += 1;
        }
        let total = entries.len();
        let distribution = counts
            .into_iter()
            .map(|(label, n)| (label.to_string(), n as f64 / total as f64))
            .collect();

        let recent = entries[total.saturating_sub(recent_len)..]
            .iter()
            .map(|e| e.emotion.clone())
            .collect();

        Self {
            distribution,
            recent,
            total_frames: total,
        }
    }
}
