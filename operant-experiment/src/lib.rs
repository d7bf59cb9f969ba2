pub mod config;
pub mod layout;
pub mod log;
pub mod outcome;
pub mod sequence;
pub mod state;
pub mod stimuli;
pub mod trial;

pub use config::{ConfigError, SessionConfig, SessionTimings};
pub use log::{EventRecord, LogError, SessionLog};
pub use outcome::{reinforcement_probability, resolve_outcome};
pub use sequence::{SequenceError, generate_sequence};
pub use state::{EndReason, SessionError, SessionStateMachine, SessionSummary};
pub use stimuli::{StimulusAssignments, StimulusError};
pub use trial::{PeckCounters, Trial};
