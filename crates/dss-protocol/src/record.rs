//! Machine and job records.
//!
//! Field layouts follow the ds-sim wire format exactly. Identifiers are
//! parsed to integers once here; nothing downstream re-splits raw lines.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::MACHINE_RECORD_FIELDS;

/// Lifecycle state of a simulated machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MachineState {
    Inactive,
    Booting,
    Idle,
    Active,
    Unavailable,
}

impl MachineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MachineState::Inactive => "inactive",
            MachineState::Booting => "booting",
            MachineState::Idle => "idle",
            MachineState::Active => "active",
            MachineState::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MachineState {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inactive" => Ok(MachineState::Inactive),
            "booting" => Ok(MachineState::Booting),
            "idle" => Ok(MachineState::Idle),
            "active" => Ok(MachineState::Active),
            "unavailable" => Ok(MachineState::Unavailable),
            other => Err(ParseError::UnknownMachineState(other.to_string())),
        }
    }
}

/// One machine record line from a query exchange.
///
/// Nine whitespace-separated fields:
/// `type id state curStartTime cores memory disk waitingJobs runningJobs`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineRecord {
    pub kind: String,
    pub id: u32,
    pub state: MachineState,
    pub cur_start_time: i64,
    pub cores: u32,
    pub memory: u32,
    pub disk: u32,
    pub waiting_jobs: u32,
    pub running_jobs: u32,
}

impl MachineRecord {
    /// An idle machine with empty queues, for inventories built in tests.
    pub fn idle(kind: &str, id: u32, cores: u32, memory: u32, disk: u32) -> Self {
        Self {
            kind: kind.to_string(),
            id,
            state: MachineState::Idle,
            cur_start_time: 0,
            cores,
            memory,
            disk,
            waiting_jobs: 0,
            running_jobs: 0,
        }
    }

    /// Whether this machine meets a resource requirement.
    pub fn can_fit(&self, cores: u32, memory: u32, disk: u32) -> bool {
        self.cores >= cores && self.memory >= memory && self.disk >= disk
    }
}

impl fmt::Display for MachineRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {} {} {} {}",
            self.kind,
            self.id,
            self.state,
            self.cur_start_time,
            self.cores,
            self.memory,
            self.disk,
            self.waiting_jobs,
            self.running_jobs
        )
    }
}

impl FromStr for MachineRecord {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != MACHINE_RECORD_FIELDS {
            return Err(ParseError::RecordFieldCount {
                expected: MACHINE_RECORD_FIELDS,
                found: fields.len(),
            });
        }

        Ok(Self {
            kind: fields[0].to_string(),
            id: parse_field("record", "id", fields[1])?,
            state: fields[2].parse()?,
            cur_start_time: parse_field("record", "curStartTime", fields[3])?,
            cores: parse_field("record", "cores", fields[4])?,
            memory: parse_field("record", "memory", fields[5])?,
            disk: parse_field("record", "disk", fields[6])?,
            waiting_jobs: parse_field("record", "waitingJobs", fields[7])?,
            running_jobs: parse_field("record", "runningJobs", fields[8])?,
        })
    }
}

/// A job announced by `JOBN`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobNotice {
    pub submit_time: u64,
    pub id: u32,
    pub est_runtime: u64,
    pub cores: u32,
    pub memory: u32,
    pub disk: u32,
}

impl JobNotice {
    /// Parse the fields following the `JOBN` tag.
    pub fn from_fields(fields: &[&str]) -> Result<Self, ParseError> {
        const TAG: &str = "JOBN";
        const NAMES: [&str; 6] = ["submitTime", "jobID", "estRuntime", "cores", "memory", "disk"];
        if fields.len() < NAMES.len() {
            return Err(ParseError::MissingField {
                tag: TAG,
                field: NAMES[fields.len()],
            });
        }

        Ok(Self {
            submit_time: parse_field(TAG, NAMES[0], fields[0])?,
            id: parse_field(TAG, NAMES[1], fields[1])?,
            est_runtime: parse_field(TAG, NAMES[2], fields[2])?,
            cores: parse_field(TAG, NAMES[3], fields[3])?,
            memory: parse_field(TAG, NAMES[4], fields[4])?,
            disk: parse_field(TAG, NAMES[5], fields[5])?,
        })
    }

    /// Render the full wire line, tag included.
    pub fn wire(&self) -> String {
        format!(
            "JOBN {} {} {} {} {} {}",
            self.submit_time, self.id, self.est_runtime, self.cores, self.memory, self.disk
        )
    }
}

/// A job completion announced by `JCPL`. Informational only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionNotice {
    pub end_time: u64,
    pub job_id: u32,
    pub machine_kind: String,
    pub machine_id: u32,
}

impl CompletionNotice {
    /// Parse the fields following the `JCPL` tag.
    pub fn from_fields(fields: &[&str]) -> Result<Self, ParseError> {
        const TAG: &str = "JCPL";
        const NAMES: [&str; 4] = ["endTime", "jobID", "serverType", "serverID"];
        if fields.len() < NAMES.len() {
            return Err(ParseError::MissingField {
                tag: TAG,
                field: NAMES[fields.len()],
            });
        }

        Ok(Self {
            end_time: parse_field(TAG, NAMES[0], fields[0])?,
            job_id: parse_field(TAG, NAMES[1], fields[1])?,
            machine_kind: fields[2].to_string(),
            machine_id: parse_field(TAG, NAMES[3], fields[3])?,
        })
    }

    /// Render the full wire line, tag included.
    pub fn wire(&self) -> String {
        format!(
            "JCPL {} {} {} {}",
            self.end_time, self.job_id, self.machine_kind, self.machine_id
        )
    }
}

/// A scheduling decision sent as `SCHD`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub job_id: u32,
    pub machine_kind: String,
    pub machine_id: u32,
}

impl Placement {
    pub fn new(job_id: u32, machine_kind: &str, machine_id: u32) -> Self {
        Self {
            job_id,
            machine_kind: machine_kind.to_string(),
            machine_id,
        }
    }
}

pub(crate) fn parse_field<T: FromStr>(
    tag: &'static str,
    field: &'static str,
    value: &str,
) -> Result<T, ParseError> {
    value.parse().map_err(|_| ParseError::InvalidField {
        tag,
        field,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_small_record() {
        let record: MachineRecord = "small 0 idle 0 2 1024 1024 0 0".parse().unwrap();
        assert_eq!(record.kind, "small");
        assert_eq!(record.id, 0);
        assert_eq!(record.state, MachineState::Idle);
        assert_eq!(record.cur_start_time, 0);
        assert_eq!(record.cores, 2);
        assert_eq!(record.memory, 1024);
        assert_eq!(record.disk, 1024);
        assert_eq!(record.waiting_jobs, 0);
        assert_eq!(record.running_jobs, 0);
    }

    #[test]
    fn test_parse_large_record() {
        let record: MachineRecord = "large 1 idle 0 8 4096 4096 0 0".parse().unwrap();
        assert_eq!(record.kind, "large");
        assert_eq!(record.id, 1);
        assert_eq!(record.cores, 8);
    }

    #[test]
    fn test_record_display_round_trip() {
        let record = MachineRecord::idle("medium", 3, 4, 8192, 16384);
        let line = record.to_string();
        assert_eq!(line, "medium 3 idle 0 4 8192 16384 0 0");
        let parsed: MachineRecord = line.parse().unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_record_negative_start_time() {
        // ds-sim reports -1 for machines that have never been started
        let record: MachineRecord = "small 0 inactive -1 2 1024 1024 0 0".parse().unwrap();
        assert_eq!(record.cur_start_time, -1);
        assert_eq!(record.state, MachineState::Inactive);
    }

    #[test]
    fn test_record_wrong_field_count() {
        let err = "small 0 idle 0 2 1024".parse::<MachineRecord>().unwrap_err();
        assert_eq!(
            err,
            ParseError::RecordFieldCount {
                expected: 9,
                found: 6
            }
        );
    }

    #[test]
    fn test_record_bad_core_count() {
        let err = "small 0 idle 0 two 1024 1024 0 0"
            .parse::<MachineRecord>()
            .unwrap_err();
        assert!(matches!(err, ParseError::InvalidField { field: "cores", .. }));
    }

    #[test]
    fn test_record_unknown_state() {
        let err = "small 0 sleeping 0 2 1024 1024 0 0"
            .parse::<MachineRecord>()
            .unwrap_err();
        assert_eq!(err, ParseError::UnknownMachineState("sleeping".to_string()));
    }

    #[test]
    fn test_can_fit() {
        let record = MachineRecord::idle("small", 0, 2, 1024, 1024);
        assert!(record.can_fit(2, 1024, 1024));
        assert!(record.can_fit(1, 512, 512));
        assert!(!record.can_fit(4, 1024, 1024));
        assert!(!record.can_fit(2, 2048, 1024));
    }

    #[test]
    fn test_job_notice_fields() {
        let job = JobNotice::from_fields(&["12", "3", "200", "4", "2048", "1024"]).unwrap();
        assert_eq!(job.submit_time, 12);
        assert_eq!(job.id, 3);
        assert_eq!(job.est_runtime, 200);
        assert_eq!(job.cores, 4);
        assert_eq!(job.memory, 2048);
        assert_eq!(job.disk, 1024);
    }

    #[test]
    fn test_job_notice_missing_field() {
        let err = JobNotice::from_fields(&["12", "3", "200", "4"]).unwrap_err();
        assert_eq!(
            err,
            ParseError::MissingField {
                tag: "JOBN",
                field: "memory"
            }
        );
    }

    #[test]
    fn test_job_notice_wire() {
        let job = JobNotice {
            submit_time: 37,
            id: 5,
            est_runtime: 1200,
            cores: 2,
            memory: 900,
            disk: 600,
        };
        assert_eq!(job.wire(), "JOBN 37 5 1200 2 900 600");
    }

    #[test]
    fn test_completion_notice_fields() {
        let done = CompletionNotice::from_fields(&["80", "2", "large", "1"]).unwrap();
        assert_eq!(done.end_time, 80);
        assert_eq!(done.job_id, 2);
        assert_eq!(done.machine_kind, "large");
        assert_eq!(done.machine_id, 1);
        assert_eq!(done.wire(), "JCPL 80 2 large 1");
    }

    #[test]
    fn test_machine_state_round_trip() {
        for state in [
            MachineState::Inactive,
            MachineState::Booting,
            MachineState::Idle,
            MachineState::Active,
            MachineState::Unavailable,
        ] {
            let parsed: MachineState = state.as_str().parse().unwrap();
            assert_eq!(parsed, state);
        }
    }
}
