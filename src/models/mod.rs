mod frame;
mod record;
mod session;

pub use frame::{ExtractedFields, RawOcrFrame};
pub use record::{NormalizedTipRecord, TipEvent};
pub use session::{SessionMetadata, SessionPhase, SessionSlot};
