//! Mock Simulator
//!
//! Scripted in-process stand-in for a ds-sim server. Tests drive the real
//! session and scheduler code against it through the [`LineTransport`] seam,
//! with no sockets involved. The mock answers each client line synchronously,
//! records the full client transcript, and flags protocol violations instead
//! of panicking so tests can assert on them.

use std::collections::{HashSet, VecDeque};
use std::io;
use std::sync::{Arc, Mutex};

use dss_protocol::{
    ClientMessage, CompletionNotice, JobNotice, MachineRecord, Placement, QueryMode,
    RECORD_SENTINEL,
};

use crate::transport::LineTransport;

/// One scripted event handed out per REDY.
#[derive(Debug, Clone)]
pub enum SimEvent {
    Job(JobNotice),
    Completed(CompletionNotice),
}

/// Server-side phase of the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SimPhase {
    AwaitGreeting,
    AwaitAuth,
    Idle,
    AwaitDataAck,
    AwaitRecordsAck,
    Closed,
}

struct SimState {
    phase: SimPhase,
    machines: Vec<MachineRecord>,
    script: VecDeque<SimEvent>,
    /// Lines queued for the client to read.
    outbox: VecDeque<String>,
    /// Records held back until the client acknowledges the DATA header.
    pending_records: Vec<String>,
    /// Every line the client sent, in order.
    transcript: Vec<String>,
    /// Client protocol violations observed, in order.
    violations: Vec<String>,
    /// Placements the client committed successfully.
    scheduled: Vec<Placement>,
    authed_user: Option<String>,
    reject_auth: bool,
    reject_jobs: HashSet<u32>,
    /// Drop the stream instead of answering NONE once the script runs out.
    silent_finish: bool,
    /// Offset applied to the advertised record count in DATA headers.
    data_count_offset: i32,
}

impl SimState {
    fn new(machines: Vec<MachineRecord>) -> Self {
        Self {
            phase: SimPhase::AwaitGreeting,
            machines,
            script: VecDeque::new(),
            outbox: VecDeque::new(),
            pending_records: Vec::new(),
            transcript: Vec::new(),
            violations: Vec::new(),
            scheduled: Vec::new(),
            authed_user: None,
            reject_auth: false,
            reject_jobs: HashSet::new(),
            silent_finish: false,
            data_count_offset: 0,
        }
    }

    fn push(&mut self, line: impl Into<String>) {
        self.outbox.push_back(line.into());
    }

    fn violation(&mut self, detail: impl Into<String>) {
        self.violations.push(detail.into());
        self.push("ERR: protocol error");
    }

    fn handle(&mut self, line: &str) {
        self.transcript.push(line.to_string());

        let message = match ClientMessage::parse(line) {
            Ok(m) => m,
            Err(e) => {
                self.violation(format!("unparseable client line '{}': {}", line, e));
                return;
            }
        };

        match (self.phase, message) {
            (SimPhase::AwaitGreeting, ClientMessage::Greeting) => {
                self.push("OK");
                self.phase = SimPhase::AwaitAuth;
            }
            (SimPhase::AwaitAuth, ClientMessage::Auth(user)) => {
                if self.reject_auth {
                    self.push("ERR: unknown user");
                    self.phase = SimPhase::Closed;
                } else {
                    self.authed_user = Some(user);
                    self.push("OK");
                    self.phase = SimPhase::Idle;
                }
            }
            (SimPhase::Idle, ClientMessage::Ready) => match self.script.pop_front() {
                Some(SimEvent::Job(job)) => self.push(job.wire()),
                Some(SimEvent::Completed(notice)) => self.push(notice.wire()),
                None if self.silent_finish => self.phase = SimPhase::Closed,
                None => self.push("NONE"),
            },
            (SimPhase::Idle, ClientMessage::Query(mode)) => self.start_query(&mode),
            (SimPhase::AwaitDataAck, ClientMessage::Ack) => {
                for record in self.pending_records.drain(..).collect::<Vec<_>>() {
                    self.push(record);
                }
                self.phase = SimPhase::AwaitRecordsAck;
            }
            (SimPhase::AwaitRecordsAck, ClientMessage::Ack) => {
                self.push(RECORD_SENTINEL);
                self.phase = SimPhase::Idle;
            }
            (SimPhase::Idle, ClientMessage::Schedule(placement)) => {
                if self.reject_jobs.contains(&placement.job_id) {
                    self.push(format!("ERR: cannot schedule job {}", placement.job_id));
                } else if !self
                    .machines
                    .iter()
                    .any(|m| m.kind == placement.machine_kind && m.id == placement.machine_id)
                {
                    self.push(format!(
                        "ERR: no such machine {} {}",
                        placement.machine_kind, placement.machine_id
                    ));
                } else {
                    self.scheduled.push(placement);
                    self.push("OK");
                }
            }
            (SimPhase::Idle, ClientMessage::Quit) | (SimPhase::AwaitAuth, ClientMessage::Quit) => {
                self.push("QUIT");
                self.phase = SimPhase::Closed;
            }
            (phase, message) => {
                self.violation(format!("{:?} not valid in {:?}", message, phase));
            }
        }
    }

    fn start_query(&mut self, mode: &QueryMode) {
        let matching: Vec<&MachineRecord> = match mode {
            QueryMode::All => self.machines.iter().collect(),
            QueryMode::Capable {
                cores,
                memory,
                disk,
            } => self
                .machines
                .iter()
                .filter(|m| m.can_fit(*cores, *memory, *disk))
                .collect(),
        };

        self.pending_records = matching.iter().map(|m| m.to_string()).collect();
        let record_len = self
            .pending_records
            .iter()
            .map(|r| r.len())
            .max()
            .unwrap_or(0);
        let count = self.pending_records.len() as i64 + self.data_count_offset as i64;
        self.push(format!("DATA {} {}", count.max(0), record_len));
        self.phase = SimPhase::AwaitDataAck;
    }
}

/// Handle for configuring the mock and inspecting what the client did.
pub struct SimServer {
    state: Arc<Mutex<SimState>>,
}

impl SimServer {
    /// Create a simulator serving the given machine set.
    pub fn new(machines: Vec<MachineRecord>) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::new(machines))),
        }
    }

    // === Script configuration ===

    /// Queue a job to hand out on a future REDY.
    pub fn push_job(&self, job: JobNotice) {
        let mut state = self.state.lock().unwrap();
        state.script.push_back(SimEvent::Job(job));
    }

    /// Queue a completion notice to hand out on a future REDY.
    pub fn push_completion(&self, notice: CompletionNotice) {
        let mut state = self.state.lock().unwrap();
        state.script.push_back(SimEvent::Completed(notice));
    }

    // === Failure injection ===

    /// Reject the AUTH line and close.
    pub fn reject_auth(&self) {
        let mut state = self.state.lock().unwrap();
        state.reject_auth = true;
    }

    /// Answer SCHD for this job id with an error.
    pub fn reject_job(&self, job_id: u32) {
        let mut state = self.state.lock().unwrap();
        state.reject_jobs.insert(job_id);
    }

    /// Skew the record count advertised in DATA headers, to exercise the
    /// client's desync handling.
    pub fn misreport_data_count(&self, offset: i32) {
        let mut state = self.state.lock().unwrap();
        state.data_count_offset = offset;
    }

    /// Close the stream without a NONE once the script is exhausted.
    pub fn finish_silently(&self) {
        let mut state = self.state.lock().unwrap();
        state.silent_finish = true;
    }

    // === Inspection ===

    /// Open the client side of the link.
    pub fn link(&self) -> SimLink {
        SimLink {
            state: Arc::clone(&self.state),
        }
    }

    /// Every line the client sent, in order.
    pub fn transcript(&self) -> Vec<String> {
        self.state.lock().unwrap().transcript.clone()
    }

    /// Client protocol violations observed so far.
    pub fn violations(&self) -> Vec<String> {
        self.state.lock().unwrap().violations.clone()
    }

    /// Placements the simulator accepted.
    pub fn scheduled(&self) -> Vec<Placement> {
        self.state.lock().unwrap().scheduled.clone()
    }

    /// User name accepted at AUTH, if any.
    pub fn authed_user(&self) -> Option<String> {
        self.state.lock().unwrap().authed_user.clone()
    }
}

/// Client-side transport backed by the in-process simulator.
pub struct SimLink {
    state: Arc<Mutex<SimState>>,
}

impl LineTransport for SimLink {
    fn send_line(&mut self, line: &str) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.phase == SimPhase::Closed && state.outbox.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "simulator closed the connection",
            ));
        }
        state.handle(line);
        Ok(())
    }

    fn recv_line(&mut self) -> io::Result<Option<String>> {
        let mut state = self.state.lock().unwrap();
        if let Some(line) = state.outbox.pop_front() {
            return Ok(Some(line));
        }
        if state.phase == SimPhase::Closed {
            return Ok(None);
        }
        state
            .violations
            .push("client read with no reply pending".to_string());
        Err(io::Error::new(
            io::ErrorKind::WouldBlock,
            "no reply pending",
        ))
    }
}
