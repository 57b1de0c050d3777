//! Tagged protocol messages.
//!
//! Both directions of the wire are tokenized into sums here. The server side
//! keeps unrecognized tags as `Unknown` so the scheduling loop can re-assert
//! readiness instead of aborting; the client side has a closed vocabulary and
//! rejects unknown tags outright.

use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::record::{parse_field, CompletionNotice, JobNotice, Placement};

/// Machine query scope for `GETS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryMode {
    /// Every machine in the simulation.
    All,
    /// Machines whose total resources satisfy the requirement.
    Capable { cores: u32, memory: u32, disk: u32 },
}

impl QueryMode {
    pub fn wire(&self) -> String {
        match self {
            QueryMode::All => "GETS All".to_string(),
            QueryMode::Capable { cores, memory, disk } => {
                format!("GETS Capable {} {} {}", cores, memory, disk)
            }
        }
    }
}

/// Every server line the client can observe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerMessage {
    /// Plain acknowledgement.
    Ok,
    /// Acknowledgement of the client's `QUIT`.
    Quit,
    /// Header of a machine-record block.
    Data { count: usize, record_len: usize },
    /// A job to place.
    Job(JobNotice),
    /// A job finished somewhere. Informational.
    Completed(CompletionNotice),
    /// No further jobs will be sent.
    NoMoreJobs,
    /// Server-reported error.
    Error(String),
    /// Unrecognized tag, preserved verbatim.
    Unknown(String),
}

impl ServerMessage {
    /// Tokenize one received line.
    ///
    /// A known tag with malformed fields is an error; an unknown tag is not.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Err(ParseError::Empty);
        }

        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        let tag = fields[0];

        // ds-sim renders errors as "ERR: message"; tolerate the bare form too.
        if tag == "ERR" || tag == "ERR:" {
            let message = trimmed[tag.len()..].trim_start_matches(':').trim();
            return Ok(ServerMessage::Error(message.to_string()));
        }

        match tag {
            "OK" => Ok(ServerMessage::Ok),
            "QUIT" => Ok(ServerMessage::Quit),
            "NONE" => Ok(ServerMessage::NoMoreJobs),
            "DATA" => {
                if fields.len() < 3 {
                    return Err(ParseError::MissingField {
                        tag: "DATA",
                        field: if fields.len() < 2 { "nRecs" } else { "recLen" },
                    });
                }
                Ok(ServerMessage::Data {
                    count: parse_field("DATA", "nRecs", fields[1])?,
                    record_len: parse_field("DATA", "recLen", fields[2])?,
                })
            }
            "JOBN" => Ok(ServerMessage::Job(JobNotice::from_fields(&fields[1..])?)),
            "JCPL" => Ok(ServerMessage::Completed(CompletionNotice::from_fields(
                &fields[1..],
            )?)),
            _ => Ok(ServerMessage::Unknown(trimmed.to_string())),
        }
    }

    /// Render the wire line without terminator.
    pub fn wire(&self) -> String {
        match self {
            ServerMessage::Ok => "OK".to_string(),
            ServerMessage::Quit => "QUIT".to_string(),
            ServerMessage::Data { count, record_len } => {
                format!("DATA {} {}", count, record_len)
            }
            ServerMessage::Job(job) => job.wire(),
            ServerMessage::Completed(done) => done.wire(),
            ServerMessage::NoMoreJobs => "NONE".to_string(),
            ServerMessage::Error(message) => format!("ERR: {}", message),
            ServerMessage::Unknown(line) => line.clone(),
        }
    }
}

/// Every line the client can send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientMessage {
    /// `HELO`, the first line of the handshake.
    Greeting,
    /// `AUTH <username>`.
    Auth(String),
    /// `REDY`, asserting readiness for the next event.
    Ready,
    /// `GETS`, opening a machine query exchange.
    Query(QueryMode),
    /// `OK` inside a machine-record block.
    Ack,
    /// `SCHD`, a placement decision.
    Schedule(Placement),
    /// `QUIT`.
    Quit,
}

impl ClientMessage {
    /// Tokenize one client line. Used by the in-process simulator and tests.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Err(ParseError::Empty);
        }

        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        match fields[0] {
            "HELO" => Ok(ClientMessage::Greeting),
            "AUTH" => match fields.get(1) {
                Some(user) => Ok(ClientMessage::Auth(user.to_string())),
                None => Err(ParseError::MissingField {
                    tag: "AUTH",
                    field: "username",
                }),
            },
            "REDY" => Ok(ClientMessage::Ready),
            "OK" => Ok(ClientMessage::Ack),
            "QUIT" => Ok(ClientMessage::Quit),
            "GETS" => match fields.get(1) {
                Some(&"All") => Ok(ClientMessage::Query(QueryMode::All)),
                Some(&"Capable") => {
                    if fields.len() < 5 {
                        return Err(ParseError::MissingField {
                            tag: "GETS",
                            field: "requirement",
                        });
                    }
                    Ok(ClientMessage::Query(QueryMode::Capable {
                        cores: parse_field("GETS", "cores", fields[2])?,
                        memory: parse_field("GETS", "memory", fields[3])?,
                        disk: parse_field("GETS", "disk", fields[4])?,
                    }))
                }
                Some(other) => Err(ParseError::InvalidField {
                    tag: "GETS",
                    field: "mode",
                    value: other.to_string(),
                }),
                None => Err(ParseError::MissingField {
                    tag: "GETS",
                    field: "mode",
                }),
            },
            "SCHD" => {
                if fields.len() < 4 {
                    return Err(ParseError::MissingField {
                        tag: "SCHD",
                        field: "placement",
                    });
                }
                Ok(ClientMessage::Schedule(Placement {
                    job_id: parse_field("SCHD", "jobID", fields[1])?,
                    machine_kind: fields[2].to_string(),
                    machine_id: parse_field("SCHD", "serverID", fields[3])?,
                }))
            }
            other => Err(ParseError::UnknownTag(other.to_string())),
        }
    }

    /// Render the wire line without terminator.
    pub fn wire(&self) -> String {
        match self {
            ClientMessage::Greeting => "HELO".to_string(),
            ClientMessage::Auth(user) => format!("AUTH {}", user),
            ClientMessage::Ready => "REDY".to_string(),
            ClientMessage::Query(mode) => mode.wire(),
            ClientMessage::Ack => "OK".to_string(),
            ClientMessage::Schedule(p) => {
                format!("SCHD {} {} {}", p.job_id, p.machine_kind, p.machine_id)
            }
            ClientMessage::Quit => "QUIT".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_job_notice() {
        let msg = ServerMessage::parse("JOBN 12 3 200 4 2048 1024").unwrap();
        match msg {
            ServerMessage::Job(job) => {
                // The job id is the second field after the tag, not the first.
                assert_eq!(job.id, 3);
                assert_eq!(job.submit_time, 12);
                assert_eq!(job.cores, 4);
            }
            other => panic!("expected Job, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_data_header() {
        let msg = ServerMessage::parse("DATA 2 124").unwrap();
        assert_eq!(
            msg,
            ServerMessage::Data {
                count: 2,
                record_len: 124
            }
        );
    }

    #[test]
    fn test_parse_data_header_missing_len() {
        let err = ServerMessage::parse("DATA 2").unwrap_err();
        assert_eq!(
            err,
            ParseError::MissingField {
                tag: "DATA",
                field: "recLen"
            }
        );
    }

    #[test]
    fn test_parse_no_more_jobs() {
        assert_eq!(ServerMessage::parse("NONE").unwrap(), ServerMessage::NoMoreJobs);
    }

    #[test]
    fn test_parse_completion() {
        let msg = ServerMessage::parse("JCPL 80 2 large 1").unwrap();
        match msg {
            ServerMessage::Completed(done) => {
                assert_eq!(done.job_id, 2);
                assert_eq!(done.machine_kind, "large");
            }
            other => panic!("expected Completed, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_error_line_with_colon() {
        let msg = ServerMessage::parse("ERR: No such user").unwrap();
        assert_eq!(msg, ServerMessage::Error("No such user".to_string()));
    }

    #[test]
    fn test_parse_error_line_bare() {
        let msg = ServerMessage::parse("ERR invalid message").unwrap();
        assert_eq!(msg, ServerMessage::Error("invalid message".to_string()));
    }

    #[test]
    fn test_parse_unknown_tag_preserved() {
        let msg = ServerMessage::parse("WHAT is this").unwrap();
        assert_eq!(msg, ServerMessage::Unknown("WHAT is this".to_string()));
    }

    #[test]
    fn test_parse_empty_line_rejected() {
        assert_eq!(ServerMessage::parse("").unwrap_err(), ParseError::Empty);
        assert_eq!(ServerMessage::parse("   ").unwrap_err(), ParseError::Empty);
    }

    #[test]
    fn test_malformed_known_tag_rejected() {
        assert!(ServerMessage::parse("JOBN 12 x 200 4 2048 1024").is_err());
        assert!(ServerMessage::parse("JOBN 12 3").is_err());
        assert!(ServerMessage::parse("DATA two 124").is_err());
    }

    #[test]
    fn test_server_wire_round_trip() {
        let messages = [
            ServerMessage::Ok,
            ServerMessage::Quit,
            ServerMessage::Data {
                count: 3,
                record_len: 56,
            },
            ServerMessage::NoMoreJobs,
            ServerMessage::Error("boom".to_string()),
        ];
        for msg in messages {
            assert_eq!(ServerMessage::parse(&msg.wire()).unwrap(), msg);
        }
    }

    #[test]
    fn test_client_parse_handshake_lines() {
        assert_eq!(ClientMessage::parse("HELO").unwrap(), ClientMessage::Greeting);
        assert_eq!(
            ClientMessage::parse("AUTH alice").unwrap(),
            ClientMessage::Auth("alice".to_string())
        );
        assert_eq!(ClientMessage::parse("REDY").unwrap(), ClientMessage::Ready);
    }

    #[test]
    fn test_client_parse_auth_without_user() {
        let err = ClientMessage::parse("AUTH").unwrap_err();
        assert_eq!(
            err,
            ParseError::MissingField {
                tag: "AUTH",
                field: "username"
            }
        );
    }

    #[test]
    fn test_client_parse_queries() {
        assert_eq!(
            ClientMessage::parse("GETS All").unwrap(),
            ClientMessage::Query(QueryMode::All)
        );
        assert_eq!(
            ClientMessage::parse("GETS Capable 4 2048 1024").unwrap(),
            ClientMessage::Query(QueryMode::Capable {
                cores: 4,
                memory: 2048,
                disk: 1024
            })
        );
        assert!(ClientMessage::parse("GETS Avail").is_err());
        assert!(ClientMessage::parse("GETS Capable 4 2048").is_err());
    }

    #[test]
    fn test_client_parse_schedule() {
        assert_eq!(
            ClientMessage::parse("SCHD 3 large 1").unwrap(),
            ClientMessage::Schedule(Placement::new(3, "large", 1))
        );
        assert!(ClientMessage::parse("SCHD 3 large").is_err());
        assert!(ClientMessage::parse("SCHD x large 1").is_err());
    }

    #[test]
    fn test_client_unknown_tag_rejected() {
        let err = ClientMessage::parse("PING").unwrap_err();
        assert_eq!(err, ParseError::UnknownTag("PING".to_string()));
    }

    #[test]
    fn test_client_wire_round_trip() {
        let messages = [
            ClientMessage::Greeting,
            ClientMessage::Auth("alice".to_string()),
            ClientMessage::Ready,
            ClientMessage::Query(QueryMode::All),
            ClientMessage::Query(QueryMode::Capable {
                cores: 2,
                memory: 900,
                disk: 600,
            }),
            ClientMessage::Ack,
            ClientMessage::Schedule(Placement::new(7, "small", 0)),
            ClientMessage::Quit,
        ];
        for msg in messages {
            assert_eq!(ClientMessage::parse(&msg.wire()).unwrap(), msg);
        }
    }
}
