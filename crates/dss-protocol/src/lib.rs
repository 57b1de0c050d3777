//! ds-sim Wire Protocol
//!
//! Types and a line tokenizer for the ds-sim text protocol. Every message is
//! one ASCII line; this crate validates each line once at the boundary and
//! hands the rest of the client a tagged value.

pub mod error;
pub mod framing;
pub mod message;
pub mod record;

pub use error::ParseError;
pub use framing::Framing;
pub use message::{ClientMessage, QueryMode, ServerMessage};
pub use record::{CompletionNotice, JobNotice, MachineRecord, MachineState, Placement};

/// Default ds-server listen port.
pub const DEFAULT_PORT: u16 = 50000;

/// Line closing the machine-record block of a query exchange.
pub const RECORD_SENTINEL: &str = ".";

/// Number of whitespace-separated fields in a machine record.
pub const MACHINE_RECORD_FIELDS: usize = 9;
