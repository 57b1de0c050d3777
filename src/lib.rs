//! ds-sim Scheduling Client
//!
//! This crate implements `dss`, a client for the ds-sim distributed
//! systems simulator. It speaks the simulator's line protocol, places
//! jobs on simulated machines under a configurable rule, and ships a
//! marking bench that measures a client against reference baselines.

pub mod bench;
pub mod config;
pub mod error;
pub mod mock;
pub mod policy;
pub mod scheduler;
pub mod session;
pub mod summary;
pub mod transport;

pub use config::{ClientConfig, ConfigError};
pub use error::{ClientError, ClientResult};
pub use policy::{FallbackMode, PlacementRule};
pub use scheduler::{CompletionReason, RunOutcome, Scheduler};
pub use session::{Session, SessionError, SessionStats};
pub use summary::SessionSummary;
pub use transport::{LineTransport, TcpLineTransport};
