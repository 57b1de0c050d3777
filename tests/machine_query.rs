//! Machine Query Exchange Tests
//!
//! The counted GETS exchange against the in-process simulator: header,
//! acknowledgements, record block and sentinel, plus the desync paths.

use dss_client::mock::SimServer;
use dss_client::session::SessionError;
use dss_client::Session;
use dss_protocol::{MachineRecord, Placement, QueryMode};

fn fleet() -> Vec<MachineRecord> {
    vec![
        MachineRecord::idle("small", 0, 2, 1024, 1024),
        MachineRecord::idle("medium", 0, 4, 2048, 2048),
        MachineRecord::idle("large", 0, 8, 4096, 4096),
    ]
}

fn authed_session(sim: &SimServer) -> Session<dss_client::mock::SimLink> {
    let mut session = Session::new(sim.link());
    session.greet().unwrap();
    session.authenticate("alice").unwrap();
    session
}

// =============================================================================
// Query scopes
// =============================================================================

#[test]
fn test_query_all_returns_whole_fleet() {
    let sim = SimServer::new(fleet());
    let mut session = authed_session(&sim);

    let records = session.query_machines(QueryMode::All).unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].kind, "small");
    assert_eq!(records[2].kind, "large");
    assert_eq!(session.stats().machine_queries, 1);
    assert!(sim.violations().is_empty());
}

#[test]
fn test_query_capable_filters_by_requirement() {
    let sim = SimServer::new(fleet());
    let mut session = authed_session(&sim);

    let records = session
        .query_machines(QueryMode::Capable {
            cores: 4,
            memory: 2048,
            disk: 2048,
        })
        .unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].kind, "medium");
    assert_eq!(records[1].kind, "large");
}

#[test]
fn test_query_capable_can_return_no_records() {
    let sim = SimServer::new(fleet());
    let mut session = authed_session(&sim);

    let records = session
        .query_machines(QueryMode::Capable {
            cores: 64,
            memory: 65536,
            disk: 65536,
        })
        .unwrap();
    assert!(records.is_empty());
    // The exchange still completes; the session stays usable.
    let more = session.query_machines(QueryMode::All).unwrap();
    assert_eq!(more.len(), 3);
    assert!(sim.violations().is_empty());
}

#[test]
fn test_record_fields_survive_parsing() {
    let sim = SimServer::new(fleet());
    let mut session = authed_session(&sim);

    let records = session.query_machines(QueryMode::All).unwrap();
    let medium = &records[1];
    assert_eq!(medium.cores, 4);
    assert_eq!(medium.memory, 2048);
    assert_eq!(medium.disk, 2048);
    assert!(medium.can_fit(4, 2048, 1024));
    assert!(!medium.can_fit(8, 2048, 1024));
}

#[test]
fn test_query_transcript_shape() {
    let sim = SimServer::new(fleet());
    let mut session = authed_session(&sim);
    session.query_machines(QueryMode::All).unwrap();

    assert_eq!(
        sim.transcript(),
        ["HELO", "AUTH alice", "GETS All", "OK", "OK"]
    );
}

// =============================================================================
// Desync: the advertised count is authoritative, so a wrong one is fatal
// =============================================================================

#[test]
fn test_overreported_count_fails_query() {
    let sim = SimServer::new(fleet());
    sim.misreport_data_count(1);
    let mut session = authed_session(&sim);

    let err = session.query_machines(QueryMode::All).unwrap_err();
    assert!(matches!(err, SessionError::Io(_)));
    assert_eq!(err.exit_code(), 20);
}

#[test]
fn test_underreported_count_leaves_stray_record() {
    let sim = SimServer::new(fleet());
    sim.misreport_data_count(-1);
    let mut session = authed_session(&sim);

    // Two records are read, the third arrives where the sentinel belongs.
    let err = session.query_machines(QueryMode::All).unwrap_err();
    assert!(matches!(err, SessionError::Violation(_)));
    assert_eq!(err.exit_code(), 40);
}

// =============================================================================
// Placement confirmations
// =============================================================================

#[test]
fn test_schedule_confirmed_counts_placement() {
    let sim = SimServer::new(fleet());
    let mut session = authed_session(&sim);

    let placed = session.schedule(&Placement::new(7, "large", 0)).unwrap();
    assert!(placed);
    assert_eq!(session.stats().jobs_placed, 1);
    assert_eq!(sim.scheduled().len(), 1);
}

#[test]
fn test_schedule_refusal_is_not_an_error() {
    let sim = SimServer::new(fleet());
    sim.reject_job(7);
    let mut session = authed_session(&sim);

    let placed = session.schedule(&Placement::new(7, "large", 0)).unwrap();
    assert!(!placed);
    assert_eq!(session.stats().placements_rejected, 1);
    assert_eq!(session.stats().jobs_placed, 0);
    assert!(sim.scheduled().is_empty());
}

#[test]
fn test_schedule_to_unknown_machine_refused() {
    let sim = SimServer::new(fleet());
    let mut session = authed_session(&sim);

    let placed = session.schedule(&Placement::new(7, "ghost", 9)).unwrap();
    assert!(!placed);
    assert_eq!(session.stats().placements_rejected, 1);
}
