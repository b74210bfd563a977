use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use log::{error, info};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::sync::oneshot;

mod migrations;

use migrations::run_migrations;

use crate::models::{SessionMetadata, SessionSlot, TipEvent};
use crate::tracking::GoalClaims;

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum DbCommand {
    Execute(DbTask),
    Shutdown,
}

struct DatabaseInner {
    sender: mpsc::Sender<DbCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(DbCommand::Shutdown) {
                error!("Failed to send shutdown to DB thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join DB thread: {join_err:?}");
            }
        }
    }
}

fn parse_datetime(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| anyhow!("invalid datetime '{value}': {err}"))
}

fn slot_from_str(value: &str) -> Result<SessionSlot> {
    match value {
        "morning" => Ok(SessionSlot::Morning),
        "night" => Ok(SessionSlot::Night),
        _ => Err(anyhow!("unknown session slot '{value}'")),
    }
}

fn row_to_session(row: &Row<'_>) -> Result<SessionMetadata> {
    let slot: String = row.get(2)?;
    let start_time: String = row.get(3)?;
    let end_time: Option<String> = row.get(4)?;
    Ok(SessionMetadata {
        id: row.get(0)?,
        day: row.get(1)?,
        slot: slot_from_str(&slot)?,
        start_time: parse_datetime(&start_time)?,
        end_time: end_time.as_deref().map(parse_datetime).transpose()?,
        tips_goal: row.get(5)?,
        members_goal: row.get(6)?,
    })
}

const SESSION_COLUMNS: &str = "id, day, slot, start_time, end_time, tips_goal, members_goal";

/// Relational store. All SQLite work runs on a dedicated worker thread; the
/// async methods ship a closure over and await the reply, so calls from the
/// single-threaded monitor loop complete strictly in order. Each call is its
/// own transaction (autocommit).
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
    db_path: Arc<PathBuf>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let (command_tx, command_rx) = mpsc::channel::<DbCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path_for_thread = db_path.clone();

        let worker = thread::Builder::new()
            .name("tipwatch-db".into())
            .spawn(move || {
                let mut conn = match Connection::open(&path_for_thread) {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(Err(anyhow::Error::new(err)
                            .context("failed to open SQLite database")));
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    error!("Failed to enable WAL mode: {err}");
                }
                if let Err(err) = conn.pragma_update(None, "foreign_keys", "ON") {
                    error!("Failed to enable foreign keys: {err}");
                }

                let init_result =
                    run_migrations(&mut conn).context("failed to run database migrations");
                if ready_tx.send(init_result).is_err() {
                    error!("DB initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        DbCommand::Execute(task) => {
                            task(&mut conn);
                        }
                        DbCommand::Shutdown => break,
                    }
                }

                info!("Database thread shutting down");
            })
            .with_context(|| "failed to spawn database worker thread")?;

        ready_rx
            .recv()
            .context("database worker exited before signaling readiness")??;

        info!("Database initialized at {}", db_path.as_path().display());

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.inner.sender.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = DbCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("DB caller dropped before receiving result");
            }
        }));

        sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to DB thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("database thread terminated unexpectedly"))?
    }

    /// Looks up or creates the (day, slot) session row. The start time is
    /// written only on insert; a restart mid-session gets the original row
    /// back untouched.
    pub async fn ensure_session(
        &self,
        day: String,
        slot: SessionSlot,
        started_at: DateTime<Utc>,
    ) -> Result<SessionMetadata> {
        self.execute(move |conn| {
            let existing = conn
                .query_row(
                    &format!(
                        "SELECT {SESSION_COLUMNS} FROM stream_sessions WHERE day = ?1 AND slot = ?2"
                    ),
                    params![day, slot.as_str()],
                    |row| Ok(row_to_session(row)),
                )
                .optional()
                .with_context(|| format!("failed to look up session {day}/{slot}"))?;

            if let Some(session) = existing {
                return session;
            }

            conn.execute(
                "INSERT INTO stream_sessions (day, slot, start_time) VALUES (?1, ?2, ?3)",
                params![day, slot.as_str(), started_at.to_rfc3339()],
            )
            .with_context(|| format!("failed to insert session {day}/{slot}"))?;

            Ok(SessionMetadata {
                id: conn.last_insert_rowid(),
                day,
                slot,
                start_time: started_at,
                end_time: None,
                tips_goal: None,
                members_goal: None,
            })
        })
        .await
    }

    /// Writes first-seen goal values. COALESCE keeps an already-set goal in
    /// place even if a caller races a stale claim.
    pub async fn record_goals(&self, session_id: i64, claims: GoalClaims) -> Result<()> {
        self.execute(move |conn| {
            conn.execute(
                "UPDATE stream_sessions
                 SET tips_goal = COALESCE(tips_goal, ?1),
                     members_goal = COALESCE(members_goal, ?2)
                 WHERE id = ?3",
                params![claims.tips_goal, claims.members_goal, session_id],
            )
            .with_context(|| format!("failed to record goals for session {session_id}"))?;
            Ok(())
        })
        .await
    }

    /// Stamps the session end once; repeated calls keep the first stamp.
    pub async fn mark_session_end(&self, session_id: i64, ended_at: DateTime<Utc>) -> Result<()> {
        self.execute(move |conn| {
            conn.execute(
                "UPDATE stream_sessions
                 SET end_time = COALESCE(end_time, ?1)
                 WHERE id = ?2",
                params![ended_at.to_rfc3339(), session_id],
            )
            .with_context(|| format!("failed to mark session {session_id} ended"))?;
            Ok(())
        })
        .await
    }

    pub async fn insert_tip_event(&self, event: &TipEvent) -> Result<()> {
        let record = event.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO tip_events (session_id, local_time, utc_time, stream_clock,
                                         tips_total, members_total, last_tipper,
                                         last_tipper_value, top_tipper, top_tipper_value)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    record.session_id,
                    record.local_time,
                    record.utc_time,
                    record.stream_clock,
                    record.tips_total,
                    record.members_total,
                    record.last_tipper,
                    record.last_tipper_value,
                    record.top_tipper,
                    record.top_tipper_value,
                ],
            )
            .with_context(|| "failed to insert tip event")?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(dir.path().join("tipwatch.sqlite3")).expect("open db");
        (dir, db)
    }

    #[tokio::test]
    async fn ensure_session_is_idempotent_per_day_and_slot() {
        let (_dir, db) = open_temp_db();
        let day = "2026-08-08".to_string();
        let first_start = Utc::now();

        let first = db
            .ensure_session(day.clone(), SessionSlot::Morning, first_start)
            .await
            .unwrap();

        // Simulated restart ten minutes later: same row, original start.
        let later = first_start + chrono::Duration::minutes(10);
        let second = db
            .ensure_session(day.clone(), SessionSlot::Morning, later)
            .await
            .unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(
            second.start_time.timestamp(),
            first_start.timestamp(),
        );

        // The other slot gets its own row.
        let night = db
            .ensure_session(day, SessionSlot::Night, later)
            .await
            .unwrap();
        assert_ne!(night.id, first.id);
    }

    #[tokio::test]
    async fn goals_are_write_once() {
        let (_dir, db) = open_temp_db();
        let session = db
            .ensure_session("2026-08-08".into(), SessionSlot::Night, Utc::now())
            .await
            .unwrap();

        db.record_goals(
            session.id,
            GoalClaims {
                tips_goal: Some(500.0),
                members_goal: None,
            },
        )
        .await
        .unwrap();

        // A stale claim later in the session must not overwrite.
        db.record_goals(
            session.id,
            GoalClaims {
                tips_goal: Some(999.0),
                members_goal: Some(40),
            },
        )
        .await
        .unwrap();

        let reread = db
            .ensure_session("2026-08-08".into(), SessionSlot::Night, Utc::now())
            .await
            .unwrap();
        assert_eq!(reread.tips_goal, Some(500.0));
        assert_eq!(reread.members_goal, Some(40));
    }

    #[tokio::test]
    async fn session_end_keeps_the_first_stamp() {
        let (_dir, db) = open_temp_db();
        let session = db
            .ensure_session("2026-08-08".into(), SessionSlot::Morning, Utc::now())
            .await
            .unwrap();

        let first_end = Utc::now();
        db.mark_session_end(session.id, first_end).await.unwrap();
        db.mark_session_end(session.id, first_end + chrono::Duration::hours(1))
            .await
            .unwrap();

        let reread = db
            .ensure_session("2026-08-08".into(), SessionSlot::Morning, Utc::now())
            .await
            .unwrap();
        assert_eq!(
            reread.end_time.map(|dt| dt.timestamp()),
            Some(first_end.timestamp())
        );
    }
}
