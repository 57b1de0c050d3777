//! Bench results artifact (test_results.json)

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Schema version for test_results.json
pub const BENCH_RESULTS_SCHEMA_VERSION: u32 = 1;

/// Schema identifier for test_results.json
pub const BENCH_RESULTS_SCHEMA_ID: &str = "dss/test_results@1";

/// Metric labels, in evaluation order.
pub const METRIC_LABELS: [&str; 3] = [
    "Turnaround time",
    "Resource utilisation",
    "Total rental cost",
];

/// Performance metrics reported by a simulator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Metric {
    Turnaround,
    Utilisation,
    RentalCost,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Turnaround, Metric::Utilisation, Metric::RentalCost];

    pub fn label(&self) -> &'static str {
        match self {
            Metric::Turnaround => METRIC_LABELS[0],
            Metric::Utilisation => METRIC_LABELS[1],
            Metric::RentalCost => METRIC_LABELS[2],
        }
    }

    /// Utilisation is the one metric where larger means better.
    pub fn higher_is_better(&self) -> bool {
        matches!(self, Metric::Utilisation)
    }

    /// Turnaround renders without decimals.
    pub fn integral(&self) -> bool {
        matches!(self, Metric::Turnaround)
    }
}

/// Everything measured for one workload config.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigMeasure {
    pub turnaround: Option<i64>,
    pub utilisation: Option<f64>,
    pub rental_cost: Option<f64>,
    pub scheduled_jobs: Option<i64>,
    pub unscheduled_jobs: Option<i64>,
}

/// Bench results artifact (test_results.json)
///
/// The five measurement maps carry one entry per workload config, `null`
/// where the run produced no value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchResults {
    /// Schema version
    pub schema_version: u32,

    /// Schema identifier
    pub schema_id: String,

    /// Run identifier
    pub run_id: String,

    /// When the results were written
    pub created_at: DateTime<Utc>,

    #[serde(rename = "Turnaround time")]
    pub turnaround: BTreeMap<String, Option<i64>>,

    #[serde(rename = "Resource utilisation")]
    pub utilisation: BTreeMap<String, Option<f64>>,

    #[serde(rename = "Total rental cost")]
    pub rental_cost: BTreeMap<String, Option<f64>>,

    #[serde(rename = "Scheduled jobs")]
    pub scheduled_jobs: BTreeMap<String, Option<i64>>,

    #[serde(rename = "Unscheduled jobs")]
    pub unscheduled_jobs: BTreeMap<String, Option<i64>>,

    /// SHA-256 of each workload config file, keyed by config name
    pub config_digests: BTreeMap<String, String>,
}

impl BenchResults {
    /// Assemble the artifact from per-config measurements.
    pub fn from_measures(
        run_id: String,
        measures: &BTreeMap<String, ConfigMeasure>,
        config_digests: BTreeMap<String, String>,
    ) -> Self {
        let mut results = Self {
            schema_version: BENCH_RESULTS_SCHEMA_VERSION,
            schema_id: BENCH_RESULTS_SCHEMA_ID.to_string(),
            run_id,
            created_at: Utc::now(),
            turnaround: BTreeMap::new(),
            utilisation: BTreeMap::new(),
            rental_cost: BTreeMap::new(),
            scheduled_jobs: BTreeMap::new(),
            unscheduled_jobs: BTreeMap::new(),
            config_digests,
        };
        for (config, measure) in measures {
            results.turnaround.insert(config.clone(), measure.turnaround);
            results.utilisation.insert(config.clone(), measure.utilisation);
            results.rental_cost.insert(config.clone(), measure.rental_cost);
            results
                .scheduled_jobs
                .insert(config.clone(), measure.scheduled_jobs);
            results
                .unscheduled_jobs
                .insert(config.clone(), measure.unscheduled_jobs);
        }
        results
    }

    /// Config names, in evaluation order.
    pub fn configs(&self) -> impl Iterator<Item = &str> {
        self.turnaround.keys().map(String::as_str)
    }

    /// One metric's value for one config, widened to f64 for comparison.
    pub fn value(&self, metric: Metric, config: &str) -> Option<f64> {
        match metric {
            Metric::Turnaround => self.turnaround.get(config).copied().flatten().map(|v| v as f64),
            Metric::Utilisation => self.utilisation.get(config).copied().flatten(),
            Metric::RentalCost => self.rental_cost.get(config).copied().flatten(),
        }
    }

    /// Unscheduled-job count for one config, if the simulator reported one.
    pub fn unscheduled(&self, config: &str) -> Option<i64> {
        self.unscheduled_jobs.get(config).copied().flatten()
    }

    /// True when no config produced a value for the metric.
    pub fn metric_missing(&self, metric: Metric) -> bool {
        self.configs().all(|c| self.value(metric, c).is_none())
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Write to file via a temp file in the same directory.
    pub fn write_to_file(&self, path: &Path) -> io::Result<()> {
        let json = self.to_json().map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, format!("JSON error: {}", e))
        })?;
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;
        let temp_path = parent.join(".test_results.json.tmp");
        fs::write(&temp_path, json)?;
        fs::rename(&temp_path, path)?;
        Ok(())
    }

    /// Load from file
    pub fn from_file(path: &Path) -> io::Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("JSON error: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BenchResults {
        let mut measures = BTreeMap::new();
        measures.insert(
            "demo.xml".to_string(),
            ConfigMeasure {
                turnaround: Some(1205),
                utilisation: Some(84.53),
                rental_cost: Some(152.33),
                scheduled_jobs: Some(10),
                unscheduled_jobs: None,
            },
        );
        measures.insert("broken.xml".to_string(), ConfigMeasure::default());
        BenchResults::from_measures("run-1".to_string(), &measures, BTreeMap::new())
    }

    #[test]
    fn test_metric_labels_match_fields() {
        let json = sample().to_json().unwrap();
        for label in METRIC_LABELS {
            assert!(json.contains(&format!("\"{}\"", label)));
        }
        assert!(json.contains(r#""Scheduled jobs""#));
        assert!(json.contains(r#""Unscheduled jobs""#));
    }

    #[test]
    fn test_missing_values_serialize_null() {
        let json = sample().to_json().unwrap();
        assert!(json.contains(r#""broken.xml": null"#));
    }

    #[test]
    fn test_turnaround_serializes_without_decimals() {
        let json = sample().to_json().unwrap();
        assert!(json.contains(r#""demo.xml": 1205"#));
        assert!(!json.contains("1205.0"));
    }

    #[test]
    fn test_value_lookup() {
        let results = sample();
        assert_eq!(results.value(Metric::Turnaround, "demo.xml"), Some(1205.0));
        assert_eq!(results.value(Metric::Utilisation, "broken.xml"), None);
        assert_eq!(results.value(Metric::RentalCost, "missing.xml"), None);
    }

    #[test]
    fn test_metric_missing() {
        let results = sample();
        assert!(!results.metric_missing(Metric::Turnaround));

        let empty = BenchResults::from_measures(
            "run-2".to_string(),
            &BTreeMap::new(),
            BTreeMap::new(),
        );
        assert!(empty.metric_missing(Metric::Turnaround));
    }

    #[test]
    fn test_file_round_trip() {
        use tempfile::TempDir;

        let dir = TempDir::new().unwrap();
        let results = sample();
        let path = dir.path().join("results").join("test_results.json");
        results.write_to_file(&path).unwrap();
        assert!(!dir.path().join("results").join(".test_results.json.tmp").exists());

        let loaded = BenchResults::from_file(&path).unwrap();
        assert_eq!(loaded.run_id, "run-1");
        assert_eq!(loaded.value(Metric::RentalCost, "demo.xml"), Some(152.33));
    }
}
