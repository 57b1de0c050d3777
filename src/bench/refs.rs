//! Reference results
//!
//! Baseline measurements keyed metric, then workload config, then
//! algorithm. Loaded from JSON produced by earlier baseline runs.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Baseline algorithms compared against, in display order.
pub const BASELINES: [&str; 5] = ["atl", "ff", "bf", "fc", "fafc"];

/// Reference measurements: metric name, config name, algorithm name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RefResults {
    inner: BTreeMap<String, BTreeMap<String, BTreeMap<String, f64>>>,
}

impl RefResults {
    /// One reference value, if the file carried it.
    pub fn value(&self, metric: &str, config: &str, algo: &str) -> Option<f64> {
        self.inner
            .get(metric)
            .and_then(|configs| configs.get(config))
            .and_then(|algos| algos.get(algo))
            .copied()
    }

    /// Mean of an algorithm's values across every config the file lists for
    /// the metric. `None` when the file has no values to average.
    pub fn average(&self, metric: &str, algo: &str) -> Option<f64> {
        let configs = self.inner.get(metric)?;
        let values: Vec<f64> = configs
            .values()
            .filter_map(|algos| algos.get(algo))
            .copied()
            .collect();
        if values.is_empty() {
            return None;
        }
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }

    /// Load from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load from file
    pub fn from_file(path: &Path) -> io::Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("JSON error: {}", e)))
    }

    #[cfg(test)]
    pub(crate) fn insert(&mut self, metric: &str, config: &str, algo: &str, value: f64) {
        self.inner
            .entry(metric.to_string())
            .or_default()
            .entry(config.to_string())
            .or_default()
            .insert(algo.to_string(), value);
    }
}
