mod change;
mod session;

pub use change::ChangeDetector;
pub use session::{GoalClaims, SessionTracker};
