pub mod agent;
pub mod classifier;
pub mod config;
pub mod cooldown;
pub mod dispatcher;
pub mod error;
pub mod router;
pub mod scoring;
pub mod signal;
pub mod store;

pub use agent::{FocusAgent, OutcomeReport, SignalOutcome};
pub use classifier::{classify, AgentState};
pub use config::FyxConfig;
pub use dispatcher::{InterventionAction, InterventionMessage, TabMessenger};
pub use error::AgentError;
pub use router::{InboundMessage, MessageRouter, Reply};
pub use signal::{CameraUserState, SignalSample, TabId};
pub use store::{AgentRecord, OutcomeRecord};
