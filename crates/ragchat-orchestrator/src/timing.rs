use std::collections::HashMap;

use ragchat_core::types::StoreKind;
use tokio::sync::Mutex;

/// Per-backend answer latencies (seconds), append-only.
#[derive(Default)]
pub struct TimingLog {
    samples: Mutex<HashMap<StoreKind, Vec<f64>>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingSummary {
    pub kind: StoreKind,
    pub count: usize,
    pub mean_seconds: f64,
}

impl TimingLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, kind: StoreKind, seconds: f64) {
        self.samples.lock().await.entry(kind).or_default().push(seconds);
    }

    pub async fn samples(&self, kind: StoreKind) -> Vec<f64> {
        self.samples.lock().await.get(&kind).cloned().unwrap_or_default()
    }

    pub async fn mean(&self, kind: StoreKind) -> Option<f64> {
        let samples = self.samples.lock().await;
        let v = samples.get(&kind).filter(|v| !v.is_empty())?;
        Some(v.iter().sum::<f64>() / v.len() as f64)
    }

    /// One line per backend that has samples, flat first.
    pub async fn summary(&self) -> Vec<TimingSummary> {
        let samples = self.samples.lock().await;
        [StoreKind::Flat, StoreKind::Lance]
            .into_iter()
            .filter_map(|kind| {
                let v = samples.get(&kind).filter(|v| !v.is_empty())?;
                Some(TimingSummary { kind, count: v.len(), mean_seconds: v.iter().sum::<f64>() / v.len() as f64 })
            })
            .collect()
    }
}
