//! Placement Policies
//!
//! The only policy logic in the system. A rule is selected per run and never
//! adapts; selection itself is a pure function over machine records so it can
//! be exercised without a connection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use dss_protocol::{JobNotice, MachineRecord};

/// Static placement rule, chosen at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlacementRule {
    /// First machine record that satisfies the job's requirement.
    FirstFit,
    /// The machine with the most cores across the full set, computed once
    /// per session and reused for every job regardless of its needs.
    #[default]
    LargestAvailable,
}

impl fmt::Display for PlacementRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlacementRule::FirstFit => write!(f, "first-fit"),
            PlacementRule::LargestAvailable => write!(f, "largest-available"),
        }
    }
}

impl FromStr for PlacementRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "first-fit" | "firstfit" => Ok(PlacementRule::FirstFit),
            "largest" | "largest-available" => Ok(PlacementRule::LargestAvailable),
            other => Err(format!(
                "invalid policy '{}' (expected first-fit or largest-available)",
                other
            )),
        }
    }
}

/// What to do when the primary query yields no usable machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FallbackMode {
    /// Re-query the full machine set and re-apply the rule, filtered by the
    /// job's requirement, before giving up.
    #[default]
    #[serde(rename = "requery")]
    Requery,
    /// Leave the job unscheduled immediately.
    #[serde(rename = "none")]
    LeaveUnscheduled,
}

impl fmt::Display for FallbackMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackMode::Requery => write!(f, "requery"),
            FallbackMode::LeaveUnscheduled => write!(f, "none"),
        }
    }
}

impl FromStr for FallbackMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "requery" => Ok(FallbackMode::Requery),
            "none" => Ok(FallbackMode::LeaveUnscheduled),
            other => Err(format!(
                "invalid fallback '{}' (expected requery or none)",
                other
            )),
        }
    }
}

/// First record satisfying the job's cores, memory and disk requirement.
pub fn first_fit<'a>(records: &'a [MachineRecord], job: &JobNotice) -> Option<&'a MachineRecord> {
    records
        .iter()
        .find(|r| r.can_fit(job.cores, job.memory, job.disk))
}

/// The record with the most cores. Ties keep the earlier record, so the
/// choice is deterministic in query order.
pub fn largest(records: &[MachineRecord]) -> Option<&MachineRecord> {
    let mut best: Option<&MachineRecord> = None;
    for record in records {
        match best {
            Some(current) if record.cores <= current.cores => {}
            _ => best = Some(record),
        }
    }
    best
}
