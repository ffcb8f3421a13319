//! Zone access core: lockout tracking, session lifecycle, continuous
//! re-verification and the coordinator that gates requests through them.
//! Keep the public surface thin and split implementation across sub-modules.

mod attempts;
mod coordinator;
mod monitor;
mod session;

pub use attempts::{FailedAttemptRecord, FailedAttemptTracker};
pub use coordinator::{
    AccessDecision, Collaborators, DenialReason, ZoneAccessCoordinator, ZoneAccessRequest,
};
pub use monitor::ContinuousMonitor;
pub use session::{SessionRegistry, TerminationReason, ZoneSession};
