//! Scheduling Session
//!
//! One session object owns the transport and walks the fixed handshake:
//! greeting, authentication, then the readiness loop. Inner operations
//! return typed results; only the scheduling loop decides what is fatal.

use std::io;

use serde::{Deserialize, Serialize};

use dss_protocol::{
    ClientMessage, MachineRecord, ParseError, Placement, QueryMode, ServerMessage, RECORD_SENTINEL,
};

use crate::transport::LineTransport;

/// Session phase. The handshake is linear with no branching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// Connected, nothing sent yet
    Init,
    /// Greeting acknowledged
    Greeted,
    /// Authentication acknowledged
    Authenticated,
    /// Readiness loop entered
    Ready,
    /// QUIT exchanged or stream ended
    Terminated,
}

impl Phase {
    /// Check if transition from this phase to target is valid
    pub fn can_advance_to(&self, target: Phase) -> bool {
        match (self, target) {
            (Phase::Init, Phase::Greeted) => true,
            (Phase::Greeted, Phase::Authenticated) => true,
            (Phase::Authenticated, Phase::Ready) => true,

            // QUIT is legal from any authenticated point
            (Phase::Authenticated, Phase::Terminated) => true,
            (Phase::Ready, Phase::Terminated) => true,

            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Terminated)
    }
}

/// Errors for session operations
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("connection closed while waiting for {0}")]
    UnexpectedEof(&'static str),

    #[error("authentication rejected for '{user}': {reason}")]
    AuthRejected { user: String, reason: String },

    #[error("protocol violation: {0}")]
    Violation(String),

    #[error("simulator error: {0}")]
    Simulator(String),

    #[error("invalid phase transition from {from:?} to {to:?}")]
    Phase { from: Phase, to: Phase },
}

impl SessionError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            SessionError::Io(_) => 20,
            SessionError::UnexpectedEof(_) => 20,
            SessionError::AuthRejected { .. } => 21,
            SessionError::Parse(_) => 40,
            SessionError::Violation(_) => 40,
            SessionError::Simulator(_) => 40,
            SessionError::Phase { .. } => 40,
        }
    }
}

/// Counters for one session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionStats {
    /// Job notices received
    pub jobs_seen: u64,
    /// Placements acknowledged by the simulator
    pub jobs_placed: u64,
    /// Placements the simulator refused
    pub placements_rejected: u64,
    /// Jobs ended as an explicit non-decision
    pub jobs_unscheduled: u64,
    /// Completion notices received
    pub completions_seen: u64,
    /// Machine query exchanges performed
    pub machine_queries: u64,
}

/// A scheduling session over a line transport.
pub struct Session<T: LineTransport> {
    link: T,
    phase: Phase,
    stats: SessionStats,
    verbose: bool,
}

impl<T: LineTransport> Session<T> {
    pub fn new(link: T) -> Self {
        Self {
            link,
            phase: Phase::Init,
            stats: SessionStats::default(),
            verbose: false,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut SessionStats {
        &mut self.stats
    }

    fn check_advance(&self, to: Phase) -> Result<(), SessionError> {
        if self.phase.can_advance_to(to) {
            Ok(())
        } else {
            Err(SessionError::Phase {
                from: self.phase,
                to,
            })
        }
    }

    fn require_authenticated(&self) -> Result<(), SessionError> {
        match self.phase {
            Phase::Authenticated | Phase::Ready => Ok(()),
            from => Err(SessionError::Phase {
                from,
                to: Phase::Ready,
            }),
        }
    }

    fn send(&mut self, message: &ClientMessage) -> Result<(), SessionError> {
        self.link.send_line(&message.wire())?;
        Ok(())
    }

    /// Receive a line that must arrive; end of stream here means the
    /// exchange desynchronized.
    fn recv_required(&mut self, waiting_for: &'static str) -> Result<String, SessionError> {
        match self.link.recv_line()? {
            Some(line) => Ok(line),
            None => Err(SessionError::UnexpectedEof(waiting_for)),
        }
    }

    /// Send the greeting and require any non-empty acknowledgement.
    pub fn greet(&mut self) -> Result<(), SessionError> {
        self.check_advance(Phase::Greeted)?;
        self.send(&ClientMessage::Greeting)?;

        let reply = self.recv_required("greeting acknowledgement")?;
        if reply.trim().is_empty() {
            return Err(SessionError::Violation(
                "empty greeting acknowledgement".to_string(),
            ));
        }

        self.phase = Phase::Greeted;
        Ok(())
    }

    /// Authenticate. A simulator `ERR` reply is fatal; there is no retry.
    pub fn authenticate(&mut self, user: &str) -> Result<(), SessionError> {
        self.check_advance(Phase::Authenticated)?;
        self.send(&ClientMessage::Auth(user.to_string()))?;

        let reply = self.recv_required("authentication acknowledgement")?;
        if reply.trim().is_empty() {
            return Err(SessionError::Violation(
                "empty authentication acknowledgement".to_string(),
            ));
        }
        if let Ok(ServerMessage::Error(reason)) = ServerMessage::parse(&reply) {
            return Err(SessionError::AuthRejected {
                user: user.to_string(),
                reason,
            });
        }

        if self.verbose {
            eprintln!("authenticated as '{}'", user);
        }
        self.phase = Phase::Authenticated;
        Ok(())
    }

    /// Assert readiness and receive the next event.
    ///
    /// `Ok(None)` means the peer closed at a quiescent point; the caller
    /// decides whether that ends the run cleanly.
    pub fn ready(&mut self) -> Result<Option<ServerMessage>, SessionError> {
        self.require_authenticated()?;
        self.send(&ClientMessage::Ready)?;
        self.phase = Phase::Ready;

        match self.link.recv_line()? {
            Some(line) => Ok(Some(ServerMessage::parse(&line)?)),
            None => Ok(None),
        }
    }

    /// Run the counted machine-query exchange.
    ///
    /// `GETS` → `DATA n len` → `OK` → n records → `OK` → `"."`. Under- or
    /// over-reading the record block desynchronizes the session with no
    /// recovery path, so every step is enforced.
    pub fn query_machines(&mut self, mode: QueryMode) -> Result<Vec<MachineRecord>, SessionError> {
        self.require_authenticated()?;
        self.send(&ClientMessage::Query(mode))?;

        let header = self.recv_required("machine data header")?;
        let count = match ServerMessage::parse(&header)? {
            ServerMessage::Data { count, .. } => count,
            other => {
                return Err(SessionError::Violation(format!(
                    "expected DATA header, got '{}'",
                    other.wire()
                )))
            }
        };

        self.send(&ClientMessage::Ack)?;

        let mut records = Vec::with_capacity(count);
        for _ in 0..count {
            let line = self.recv_required("machine record")?;
            records.push(line.parse::<MachineRecord>()?);
        }

        self.send(&ClientMessage::Ack)?;

        let sentinel = self.recv_required("record sentinel")?;
        if sentinel.trim() != RECORD_SENTINEL {
            return Err(SessionError::Violation(format!(
                "expected record sentinel, got '{}'",
                sentinel
            )));
        }

        self.stats.machine_queries += 1;
        if self.verbose {
            eprintln!("machine query returned {} records", records.len());
        }
        Ok(records)
    }

    /// Send a placement and read the confirmation.
    ///
    /// Returns `false` when the simulator refuses the placement. A refusal
    /// is recorded, not retried with an alternative machine.
    pub fn schedule(&mut self, placement: &Placement) -> Result<bool, SessionError> {
        self.require_authenticated()?;
        self.send(&ClientMessage::Schedule(placement.clone()))?;

        let reply = self.recv_required("placement confirmation")?;
        match ServerMessage::parse(&reply)? {
            ServerMessage::Error(reason) => {
                self.stats.placements_rejected += 1;
                if self.verbose {
                    eprintln!(
                        "placement of job {} on {} {} refused: {}",
                        placement.job_id, placement.machine_kind, placement.machine_id, reason
                    );
                }
                Ok(false)
            }
            _ => {
                self.stats.jobs_placed += 1;
                Ok(true)
            }
        }
    }

    /// End the session. Awaits the simulator's acknowledgement, tolerating
    /// an immediate close instead.
    pub fn quit(&mut self) -> Result<(), SessionError> {
        self.check_advance(Phase::Terminated)?;
        self.send(&ClientMessage::Quit)?;
        let _ = self.link.recv_line()?;
        self.phase = Phase::Terminated;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_handshake_transitions() {
        assert!(Phase::Init.can_advance_to(Phase::Greeted));
        assert!(Phase::Greeted.can_advance_to(Phase::Authenticated));
        assert!(Phase::Authenticated.can_advance_to(Phase::Ready));
        assert!(Phase::Ready.can_advance_to(Phase::Terminated));
    }

    #[test]
    fn test_no_skipping_phases() {
        assert!(!Phase::Init.can_advance_to(Phase::Authenticated));
        assert!(!Phase::Init.can_advance_to(Phase::Ready));
        assert!(!Phase::Greeted.can_advance_to(Phase::Ready));
    }

    #[test]
    fn test_terminated_is_terminal() {
        assert!(Phase::Terminated.is_terminal());
        assert!(!Phase::Terminated.can_advance_to(Phase::Ready));
        assert!(!Phase::Terminated.can_advance_to(Phase::Init));
    }

    #[test]
    fn test_quit_legal_before_first_ready() {
        assert!(Phase::Authenticated.can_advance_to(Phase::Terminated));
    }

    #[test]
    fn test_error_exit_codes() {
        let auth = SessionError::AuthRejected {
            user: "alice".to_string(),
            reason: "no such user".to_string(),
        };
        assert_eq!(auth.exit_code(), 21);
        assert_eq!(SessionError::UnexpectedEof("record").exit_code(), 20);
        assert_eq!(
            SessionError::Violation("desync".to_string()).exit_code(),
            40
        );
    }
}
