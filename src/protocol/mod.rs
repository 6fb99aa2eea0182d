//! Commit-reveal protocol for a fair two-party dice roll

pub mod driver;
pub mod engine;
pub mod initiator;
pub mod responder;
pub mod types;

pub use driver::{run_initiator, run_responder};
pub use engine::{EngineAction, ResponderEngine};
pub use initiator::InitiatorSession;
pub use responder::ResponderSession;
pub use types::{InitiatorState, ResponderState};
