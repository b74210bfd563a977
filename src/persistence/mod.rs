mod jsonl;

pub use jsonl::JsonlSink;

use anyhow::Result;

use crate::db::Database;
use crate::models::TipEvent;

/// The one persistence interface the pipeline talks to, selected once at
/// startup. The relational variant additionally carries session bookkeeping;
/// the append-only variant skips it entirely.
pub enum EventSink {
    Sqlite(Database),
    Jsonl(JsonlSink),
}

impl EventSink {
    /// The relational session store, when this sink has one.
    pub fn session_store(&self) -> Option<&Database> {
        match self {
            EventSink::Sqlite(db) => Some(db),
            EventSink::Jsonl(_) => None,
        }
    }

    pub async fn insert_tip_event(&self, event: &TipEvent) -> Result<()> {
        match self {
            EventSink::Sqlite(db) => db.insert_tip_event(event).await,
            EventSink::Jsonl(sink) => sink.append(event),
        }
    }

    /// Best-effort flush on shutdown. The SQLite worker commits per call, so
    /// only the file sink has buffered state.
    pub fn flush(&self) -> Result<()> {
        match self {
            EventSink::Sqlite(_) => Ok(()),
            EventSink::Jsonl(sink) => sink.flush(),
        }
    }
}
