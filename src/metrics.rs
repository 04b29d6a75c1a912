// ── Latency ring buffers ────────────────────────────────────────────────────
// Per-tool history of recent execution durations (milliseconds), bounded at
// `capacity` with oldest-first eviction. Uses `std::sync::Mutex` because the
// critical sections are tiny and never hold across an `.await`.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

use serde::Serialize;

pub const DEFAULT_LATENCY_WINDOW: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencyStats {
    pub count: usize,
    pub avg_ms: f64,
    pub p95_ms: f64,
}

pub struct LatencyRecorder {
    histories: Mutex<HashMap<String, VecDeque<f64>>>,
    capacity: usize,
}

impl LatencyRecorder {
    pub fn new(capacity: usize) -> Self {
        Self {
            histories: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&self, tool: &str, elapsed_ms: f64) {
        let mut map = self.histories.lock().unwrap_or_else(|p| p.into_inner());
        let buf = map
            .entry(tool.to_string())
            .or_insert_with(|| VecDeque::with_capacity(self.capacity));
        if buf.len() >= self.capacity {
            buf.pop_front();
        }
        buf.push_back(elapsed_ms);
    }

    /// Copy of the current history for `tool`, oldest first.
    pub fn history(&self, tool: &str) -> Vec<f64> {
        let map = self.histories.lock().unwrap_or_else(|p| p.into_inner());
        map.get(tool).map(|b| b.iter().copied().collect()).unwrap_or_default()
    }

    /// Summary statistics for every tool with at least one sample.
    pub fn snapshot(&self) -> BTreeMap<String, LatencyStats> {
        let copies: Vec<(String, Vec<f64>)> = {
            let map = self.histories.lock().unwrap_or_else(|p| p.into_inner());
            map.iter()
                .filter(|(_, b)| !b.is_empty())
                .map(|(k, b)| (k.clone(), b.iter().copied().collect()))
                .collect()
        };

        copies
            .into_iter()
            .map(|(tool, samples)| (tool, summarize(samples)))
            .collect()
    }
}

impl Default for LatencyRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_LATENCY_WINDOW)
    }
}

fn summarize(mut samples: Vec<f64>) -> LatencyStats {
    let count = samples.len();
    let avg = samples.iter().sum::<f64>() / count as f64;
    samples.sort_by(|a, b| a.total_cmp(b));
    // Nearest-rank selection.
    let rank = ((0.95 * count as f64).floor() as usize).min(count - 1);
    LatencyStats {
        count,
        avg_ms: round2(avg),
        p95_ms: round2(samples[rank]),
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
