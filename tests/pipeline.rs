use std::collections::VecDeque;

use rusqlite::Connection;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use tipwatch::{
    config::TrackerConfig,
    db::Database,
    monitor::{
        automation::{AutomationError, FrameText, StreamAutomation},
        SessionOutcome, StreamMonitor,
    },
    persistence::{EventSink, JsonlSink},
};

/// Plays back a fixed frame script, then reports end of stream.
struct ScriptedAutomation {
    frames: VecDeque<FrameText>,
}

impl ScriptedAutomation {
    fn new(tops: &[&str]) -> Self {
        Self {
            frames: tops
                .iter()
                .map(|top| FrameText {
                    top_text: top.to_string(),
                    bottom_text: String::new(),
                    stream_clock: None,
                })
                .collect(),
        }
    }
}

impl StreamAutomation for ScriptedAutomation {
    fn acquire(&mut self) -> Result<(), AutomationError> {
        Ok(())
    }

    fn probe_online(&mut self) -> Result<bool, AutomationError> {
        Ok(!self.frames.is_empty())
    }

    fn capture_frame(&mut self) -> Result<FrameText, AutomationError> {
        self.frames.pop_front().ok_or(AutomationError::SessionEnded)
    }

    fn release(&mut self) {}
}

fn test_config(dir: &TempDir) -> TrackerConfig {
    TrackerConfig {
        channel: "somechannel".to_string(),
        db_path: dir.path().join("tipwatch.sqlite3"),
        output_path: dir.path().join("events.jsonl"),
        ..Default::default()
    }
}

fn monitor_with_sqlite(
    dir: &TempDir,
    tops: &[&str],
) -> StreamMonitor<ScriptedAutomation> {
    let config = test_config(dir);
    let db = Database::new(config.db_path.clone()).expect("open db");
    StreamMonitor::new(
        ScriptedAutomation::new(tops),
        EventSink::Sqlite(db),
        config,
        CancellationToken::new(),
    )
    .expect("build monitor")
}

#[tokio::test(start_paused = true)]
async fn goal_frames_fill_session_metadata_without_tip_events() {
    let dir = tempfile::tempdir().unwrap();
    let mut monitor = monitor_with_sqlite(
        &dir,
        &[
            "Tips Goal: $0/$500",
            "Tips Goal: $0/$500",
            "Last Tip: Bob $5.00",
        ],
    );

    let outcome = monitor.run_session().await.unwrap();
    assert_eq!(outcome, SessionOutcome::Offline);

    let conn = Connection::open(dir.path().join("tipwatch.sqlite3")).unwrap();

    // Exactly one session row: goal captured once, start and end stamped.
    let (session_id, tips_goal, members_goal, end_time): (i64, Option<f64>, Option<i64>, Option<String>) = conn
        .query_row(
            "SELECT id, tips_goal, members_goal, end_time FROM stream_sessions",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .unwrap();
    assert_eq!(tips_goal, Some(500.0));
    assert_eq!(members_goal, None);
    assert!(end_time.is_some());

    // The two goal-only frames persist nothing (warm-up $0 suppressed); the
    // tip frame persists exactly once, linked to the session.
    let events: Vec<(Option<i64>, Option<String>, Option<f64>)> = conn
        .prepare("SELECT session_id, last_tipper, last_tipper_value FROM tip_events")
        .unwrap()
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, Some(session_id));
    assert_eq!(events[0].1.as_deref(), Some("Bob"));
    assert_eq!(events[0].2, Some(5.0));
}

#[tokio::test(start_paused = true)]
async fn restart_mid_session_keeps_the_original_start_time() {
    let dir = tempfile::tempdir().unwrap();

    let mut first = monitor_with_sqlite(&dir, &["Tips Goal: $10/$500"]);
    first.run_session().await.unwrap();
    drop(first);

    let conn = Connection::open(dir.path().join("tipwatch.sqlite3")).unwrap();
    let original_start: String = conn
        .query_row("SELECT start_time FROM stream_sessions", [], |row| row.get(0))
        .unwrap();
    drop(conn);

    // Process restart, same broadcast window.
    let mut second = monitor_with_sqlite(&dir, &["Tips Goal: $20/$500"]);
    second.run_session().await.unwrap();

    let conn = Connection::open(dir.path().join("tipwatch.sqlite3")).unwrap();
    let (count, start): (i64, String) = conn
        .query_row(
            "SELECT COUNT(*), start_time FROM stream_sessions",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(count, 1);
    assert_eq!(start, original_start);
}

#[tokio::test(start_paused = true)]
async fn unchanged_records_are_suppressed() {
    let dir = tempfile::tempdir().unwrap();
    let mut monitor = monitor_with_sqlite(
        &dir,
        &[
            "Tips Goal: $100/$500",
            "Tips Goal: $100/$500",
            "Tips Goal: $120/$500",
        ],
    );
    monitor.run_session().await.unwrap();

    let conn = Connection::open(dir.path().join("tipwatch.sqlite3")).unwrap();
    let totals: Vec<Option<f64>> = conn
        .prepare("SELECT tips_total FROM tip_events ORDER BY id")
        .unwrap()
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(totals, vec![Some(100.0), Some(120.0)]);
}

#[tokio::test(start_paused = true)]
async fn jsonl_sink_skips_session_bookkeeping() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir);
    let sink = EventSink::Jsonl(JsonlSink::open(config.output_path.clone()).unwrap());
    let mut monitor = StreamMonitor::new(
        ScriptedAutomation::new(&[
            "Tips Goal: $100/$500 Members: 12/50",
            "Last Tip: Bob $5.00",
        ]),
        sink,
        config.clone(),
        CancellationToken::new(),
    )
    .unwrap();

    monitor.run_session().await.unwrap();

    let contents = std::fs::read_to_string(config.output_path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 2);

    // No session linkage without a relational store.
    let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(first["session_id"], serde_json::Value::Null);
    assert_eq!(first["tips_total"], 100.0);
    assert_eq!(first["members_total"], 12);

    let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
    assert_eq!(second["last_tipper"], "Bob");
    assert_eq!(second["last_tipper_value"], 5.0);
}
