//! Scheduling Loop
//!
//! Drives a session from greeting to termination: request events with REDY,
//! place each job according to the configured rule, and stop cleanly on
//! NONE or on the simulator closing the stream.

use serde::{Deserialize, Serialize};

use dss_protocol::{JobNotice, Placement, QueryMode, ServerMessage};

use crate::policy::{first_fit, largest, FallbackMode, PlacementRule};
use crate::session::{Session, SessionError, SessionStats};
use crate::transport::LineTransport;

/// Why the run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    /// The simulator announced NONE and acknowledged our QUIT.
    NoMoreJobs,
    /// The stream ended at a quiescent point without a NONE.
    PeerClosed,
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub reason: CompletionReason,
    pub stats: SessionStats,
}

/// Event-loop driver for one simulator session.
pub struct Scheduler<T: LineTransport> {
    session: Session<T>,
    rule: PlacementRule,
    fallback: FallbackMode,
    /// Largest machine by cores, fixed for the whole session.
    largest_target: Option<(String, u32)>,
    verbose: bool,
}

impl<T: LineTransport> Scheduler<T> {
    pub fn new(session: Session<T>, rule: PlacementRule, fallback: FallbackMode) -> Self {
        Self {
            session,
            rule,
            fallback,
            largest_target: None,
            verbose: false,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Run the full session: handshake, event loop, termination.
    pub fn run(&mut self, user: &str) -> Result<RunOutcome, SessionError> {
        self.session.greet()?;
        self.session.authenticate(user)?;

        if self.rule == PlacementRule::LargestAvailable {
            self.prime_largest()?;
        }

        let reason = loop {
            match self.session.ready()? {
                None => {
                    if self.verbose {
                        eprintln!("simulator closed the stream");
                    }
                    break CompletionReason::PeerClosed;
                }
                Some(ServerMessage::Job(job)) => {
                    self.session.stats_mut().jobs_seen += 1;
                    self.place_job(&job)?;
                }
                Some(ServerMessage::Completed(notice)) => {
                    self.session.stats_mut().completions_seen += 1;
                    if self.verbose {
                        eprintln!(
                            "job {} completed on {} {}",
                            notice.job_id, notice.machine_kind, notice.machine_id
                        );
                    }
                }
                Some(ServerMessage::NoMoreJobs) => {
                    self.session.quit()?;
                    break CompletionReason::NoMoreJobs;
                }
                Some(ServerMessage::Error(reason)) => {
                    return Err(SessionError::Simulator(reason));
                }
                Some(ServerMessage::Unknown(line)) => {
                    if self.verbose {
                        eprintln!("ignoring unrecognized event '{}'", line);
                    }
                }
                Some(other) => {
                    return Err(SessionError::Violation(format!(
                        "unexpected reply to REDY: {}",
                        other.wire()
                    )));
                }
            }
        };

        Ok(RunOutcome {
            reason,
            stats: self.session.stats().clone(),
        })
    }

    /// Resolve the session-wide largest machine from one full query.
    fn prime_largest(&mut self) -> Result<(), SessionError> {
        let records = self.session.query_machines(QueryMode::All)?;
        self.largest_target = largest(&records).map(|m| (m.kind.clone(), m.id));
        if self.verbose {
            match &self.largest_target {
                Some((kind, id)) => eprintln!("largest machine is {} {}", kind, id),
                None => eprintln!("simulator reported no machines"),
            }
        }
        Ok(())
    }

    fn place_job(&mut self, job: &JobNotice) -> Result<(), SessionError> {
        let target = match self.rule {
            PlacementRule::LargestAvailable => self.largest_target.clone(),
            PlacementRule::FirstFit => self.pick_first_fit(job)?,
        };

        let Some((kind, id)) = target else {
            self.session.stats_mut().jobs_unscheduled += 1;
            if self.verbose {
                eprintln!("no machine for job {}; left unscheduled", job.id);
            }
            return Ok(());
        };

        let placed = self
            .session
            .schedule(&Placement::new(job.id, &kind, id))?;
        if !placed {
            self.session.stats_mut().jobs_unscheduled += 1;
        }
        Ok(())
    }

    /// Primary capable query, then the configured fallback.
    fn pick_first_fit(&mut self, job: &JobNotice) -> Result<Option<(String, u32)>, SessionError> {
        let records = self.session.query_machines(QueryMode::Capable {
            cores: job.cores,
            memory: job.memory,
            disk: job.disk,
        })?;
        if let Some(machine) = first_fit(&records, job) {
            return Ok(Some((machine.kind.clone(), machine.id)));
        }

        match self.fallback {
            FallbackMode::LeaveUnscheduled => Ok(None),
            FallbackMode::Requery => {
                if self.verbose {
                    eprintln!("no capable machine for job {}; re-querying full set", job.id);
                }
                let records = self.session.query_machines(QueryMode::All)?;
                Ok(first_fit(&records, job).map(|m| (m.kind.clone(), m.id)))
            }
        }
    }
}
