//! Session summary (session_summary.json)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

use crate::scheduler::{CompletionReason, RunOutcome};
use crate::session::SessionStats;

/// Schema version for session_summary.json
pub const SESSION_SUMMARY_SCHEMA_VERSION: u32 = 1;

/// Schema identifier for session_summary.json
pub const SESSION_SUMMARY_SCHEMA_ID: &str = "dss/session_summary@1";

/// Generate a new run_id using ULID (sortable, filesystem-safe)
pub fn generate_run_id() -> String {
    ulid::Ulid::new().to_string().to_lowercase()
}

/// Session summary (session_summary.json)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Schema version
    pub schema_version: u32,

    /// Schema identifier
    pub schema_id: String,

    /// Run identifier
    pub run_id: String,

    /// When the summary was created
    pub created_at: DateTime<Utc>,

    /// Simulator address the session spoke to
    pub simulator: String,

    /// User name presented at authentication
    pub user: String,

    /// Placement rule in effect
    pub policy: String,

    /// Fallback mode in effect
    pub fallback: String,

    /// Line framing in effect
    pub framing: String,

    /// How the run ended
    pub completion: CompletionReason,

    /// Session counters
    pub stats: SessionStats,

    /// Human-readable summary
    pub human_summary: String,
}

impl SessionSummary {
    /// Build a summary from a finished run.
    pub fn from_outcome(
        run_id: String,
        simulator: &str,
        user: &str,
        policy: &str,
        fallback: &str,
        framing: &str,
        outcome: &RunOutcome,
    ) -> Self {
        let human_summary = Self::generate_human_summary(outcome);
        Self {
            schema_version: SESSION_SUMMARY_SCHEMA_VERSION,
            schema_id: SESSION_SUMMARY_SCHEMA_ID.to_string(),
            run_id,
            created_at: Utc::now(),
            simulator: simulator.to_string(),
            user: user.to_string(),
            policy: policy.to_string(),
            fallback: fallback.to_string(),
            framing: framing.to_string(),
            completion: outcome.reason,
            stats: outcome.stats.clone(),
            human_summary,
        }
    }

    fn generate_human_summary(outcome: &RunOutcome) -> String {
        let stats = &outcome.stats;
        let ending = match outcome.reason {
            CompletionReason::NoMoreJobs => "simulator finished",
            CompletionReason::PeerClosed => "simulator closed the stream",
        };
        if stats.jobs_seen == 0 {
            return format!("No jobs offered ({})", ending);
        }
        format!(
            "Scheduled {}/{} jobs, {} unscheduled ({})",
            stats.jobs_placed, stats.jobs_seen, stats.jobs_unscheduled, ending
        )
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Write to file via a temp file in the same directory, so readers never
    /// observe a partial summary.
    pub fn write_to_file(&self, path: &Path) -> io::Result<()> {
        let json = self.to_json().map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, format!("JSON error: {}", e))
        })?;
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;
        let temp_path = parent.join(".session_summary.json.tmp");
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

    fn make_outcome(placed: u64, seen: u64, unscheduled: u64) -> RunOutcome {
        RunOutcome {
            reason: CompletionReason::NoMoreJobs,
            stats: SessionStats {
                jobs_seen: seen,
                jobs_placed: placed,
                placements_rejected: 0,
                jobs_unscheduled: unscheduled,
                completions_seen: 0,
                machine_queries: 1,
            },
        }
    }

    fn make_summary(outcome: &RunOutcome) -> SessionSummary {
        SessionSummary::from_outcome(
            generate_run_id(),
            "127.0.0.1:50000",
            "tester",
            "largest-available",
            "requery",
            "lf",
            outcome,
        )
    }

    #[test]
    fn test_run_id_is_lowercase() {
        let id = generate_run_id();
        assert_eq!(id.len(), 26);
        assert_eq!(id, id.to_lowercase());
    }

    #[test]
    fn test_human_summary_with_jobs() {
        let summary = make_summary(&make_outcome(3, 4, 1));
        assert_eq!(
            summary.human_summary,
            "Scheduled 3/4 jobs, 1 unscheduled (simulator finished)"
        );
    }

    #[test]
    fn test_human_summary_no_jobs() {
        let summary = make_summary(&make_outcome(0, 0, 0));
        assert_eq!(summary.human_summary, "No jobs offered (simulator finished)");
    }

    #[test]
    fn test_serialization() {
        let summary = make_summary(&make_outcome(2, 2, 0));
        let json = summary.to_json().unwrap();
        assert!(json.contains(r#""schema_version": 1"#));
        assert!(json.contains(r#""schema_id": "dss/session_summary@1""#));
        assert!(json.contains(r#""completion": "no_more_jobs""#));

        let parsed = SessionSummary::from_json(&json).unwrap();
        assert_eq!(parsed.run_id, summary.run_id);
        assert_eq!(parsed.stats.jobs_placed, 2);
    }

    #[test]
    fn test_write_and_read_file() {
        use tempfile::TempDir;

        let dir = TempDir::new().unwrap();
        let summary = make_summary(&make_outcome(1, 1, 0));

        let path = dir.path().join("out").join("session_summary.json");
        summary.write_to_file(&path).unwrap();
        assert!(!dir.path().join("out").join(".session_summary.json.tmp").exists());

        let loaded = SessionSummary::from_file(&path).unwrap();
        assert_eq!(loaded.run_id, summary.run_id);
    }
}
