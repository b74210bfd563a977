pub mod automation;
pub mod bridge;

use anyhow::{anyhow, bail, Result};
use chrono::{Local, Utc};
use log::{debug, info, warn};
use tokio::time::{interval, sleep, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    config::TrackerConfig,
    extraction,
    models::{RawOcrFrame, TipEvent},
    persistence::EventSink,
    schedule::SessionSchedule,
    tracking::{ChangeDetector, SessionTracker},
};

use automation::{AutomationError, FrameText, StreamAutomation};

/// Why a capture session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The stream went offline (navigation away, stale element, explicit
    /// end-of-stream signal).
    Offline,
    /// Shutdown was requested mid-session.
    Interrupted,
}

/// The outer polling loop. Owns all pipeline state (automation collaborator,
/// sink, detector, tracker) and threads it through each tick; no ambient
/// globals anywhere.
pub struct StreamMonitor<A: StreamAutomation> {
    automation: A,
    sink: EventSink,
    schedule: SessionSchedule,
    detector: ChangeDetector,
    tracker: SessionTracker,
    config: TrackerConfig,
    shutdown: CancellationToken,
}

impl<A: StreamAutomation> StreamMonitor<A> {
    pub fn new(
        automation: A,
        sink: EventSink,
        config: TrackerConfig,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        let schedule = config.schedule()?;
        let detector = ChangeDetector::new(config.warmup_grace());
        Ok(Self {
            automation,
            sink,
            schedule,
            detector,
            tracker: SessionTracker::new(),
            config,
            shutdown,
        })
    }

    /// Runs until shutdown is requested or a resource-acquisition failure
    /// exhausts its retries. Always attempts the cleanup sequence on the way
    /// out: end an active session, flush the sink, release the collaborator.
    pub async fn run(mut self) -> Result<()> {
        let result = self.run_inner().await;
        self.cleanup().await;
        result
    }

    async fn run_inner(&mut self) -> Result<()> {
        self.acquire_with_retries().await?;
        let mut probe_failures: u32 = 0;

        loop {
            if self.shutdown.is_cancelled() {
                info!("Shutdown requested; leaving monitor loop");
                return Ok(());
            }

            match self.probe_confirmed().await {
                Ok(true) => {
                    probe_failures = 0;
                    info!("Stream is live; starting capture loop");
                    if self.run_session().await? == SessionOutcome::Interrupted {
                        return Ok(());
                    }
                }
                Ok(false) => {
                    probe_failures = 0;
                    self.offline_backoff().await?;
                }
                Err(AutomationError::SessionEnded) => {
                    // A probe racing a page teardown reads as offline.
                    probe_failures = 0;
                    self.offline_backoff().await?;
                }
                Err(err) => {
                    probe_failures += 1;
                    warn!(
                        "Status probe failed (attempt {probe_failures}/{}): {err}",
                        self.config.max_setup_attempts
                    );
                    if probe_failures >= self.config.max_setup_attempts {
                        bail!("status probe failed {probe_failures} consecutive times: {err}");
                    }
                    self.wait(self.config.retry_delay()).await;
                }
            }
        }
    }

    /// One full online window: activate the session, capture until an offline
    /// signal (or shutdown), then record the session end.
    pub async fn run_session(&mut self) -> Result<SessionOutcome> {
        self.begin_session().await?;
        let outcome = self.capture_loop().await;
        self.end_session().await;
        Ok(outcome)
    }

    /// A positive probe is only trusted after a second probe agrees once the
    /// settle delay has passed. Bounded: exactly two checks, no recursion.
    async fn probe_confirmed(&mut self) -> Result<bool, AutomationError> {
        if !self.automation.probe_online()? {
            return Ok(false);
        }
        debug!(
            "Probe positive; settling {}s before confirming",
            self.config.settle_delay_secs
        );
        self.wait(self.config.settle_delay()).await;
        if self.shutdown.is_cancelled() {
            return Ok(false);
        }
        self.automation.probe_online()
    }

    async fn begin_session(&mut self) -> Result<()> {
        self.detector.begin_session();
        let Some(sessions) = self.sink.session_store() else {
            // Append-only sink: no session bookkeeping at all.
            return Ok(());
        };

        let now = Local::now();
        let (slot, _) = self.schedule.closest_slot(now);
        let day = SessionSchedule::day_key(now);

        let mut last_err = None;
        for attempt in 1..=self.config.max_setup_attempts {
            match sessions
                .ensure_session(day.clone(), slot, Utc::now())
                .await
            {
                Ok(meta) => {
                    self.tracker.activate(meta);
                    return Ok(());
                }
                Err(err) => {
                    warn!(
                        "Could not reach session store (attempt {attempt}/{}): {err:#}",
                        self.config.max_setup_attempts
                    );
                    last_err = Some(err);
                    if attempt < self.config.max_setup_attempts {
                        self.wait(self.config.retry_delay()).await;
                    }
                }
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow!("session store unavailable")))
    }

    async fn capture_loop(&mut self) -> SessionOutcome {
        let shutdown = self.shutdown.clone();
        let mut ticker = interval(self.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested mid-session");
                    return SessionOutcome::Interrupted;
                }
                _ = ticker.tick() => {
                    match self.automation.capture_frame() {
                        Ok(text) => self.process_frame(text).await,
                        Err(AutomationError::SessionEnded) => {
                            info!("Stream went offline; capture loop finished");
                            return SessionOutcome::Offline;
                        }
                        Err(err) => {
                            // Stale elements and probe timeouts mid-session all
                            // mean the broadcast is gone.
                            warn!("Capture failed ({err}); treating as end of stream");
                            return SessionOutcome::Offline;
                        }
                    }
                }
            }
        }
    }

    /// One tick of the pipeline. Never fails: extraction misses drop fields,
    /// sink rejections drop the record, and the loop keeps going.
    async fn process_frame(&mut self, text: FrameText) {
        let frame = RawOcrFrame::captured_now(text.top_text, text.bottom_text, text.stream_clock);
        let fields = extraction::extract(&frame.top_text, &frame.bottom_text);
        if fields.is_empty() {
            debug!("No usable fields this tick; frame discarded");
            return;
        }
        let record = extraction::normalize(&frame, &fields);

        let claims = self.tracker.pending_goals(&record);
        if !claims.is_empty() {
            let session_id = self.tracker.current().map(|meta| meta.id);
            if let (Some(sessions), Some(session_id)) = (self.sink.session_store(), session_id) {
                match sessions.record_goals(session_id, claims).await {
                    Ok(()) => self.tracker.mark_goals(&claims),
                    Err(err) => warn!("Failed to record session goals: {err:#}"),
                }
            }
        }

        if self.detector.should_persist(&record) {
            let event = TipEvent::from_record(&record, self.tracker.current().map(|meta| meta.id));
            match self.sink.insert_tip_event(&event).await {
                Ok(()) => {
                    debug!("Persisted tip event: {record:?}");
                    self.detector.accept(&record);
                }
                Err(err) => warn!("Sink rejected tip event; skipping: {err:#}"),
            }
        } else {
            debug!("Record unchanged; suppressed");
        }
    }

    async fn end_session(&mut self) {
        if let Some(session_id) = self.tracker.end() {
            if let Some(sessions) = self.sink.session_store() {
                if let Err(err) = sessions.mark_session_end(session_id, Utc::now()).await {
                    warn!("Failed to mark session {session_id} ended: {err:#}");
                }
            }
            info!("Session {session_id} ended");
        }
        self.tracker.reset();
    }

    /// Offline policy: far from the next session window, release the
    /// expensive collaborator and nap long; near one, nap short and re-probe.
    async fn offline_backoff(&mut self) -> Result<()> {
        let (slot, distance) = self.schedule.closest_slot(Local::now());
        if distance.num_seconds() > self.config.hibernate_threshold_secs {
            info!(
                "Offline; {slot} session is {}s away, hibernating",
                distance.num_seconds()
            );
            self.automation.release();
            self.wait(self.config.hibernate_sleep()).await;
            if self.shutdown.is_cancelled() {
                return Ok(());
            }
            self.acquire_with_retries().await?;
        } else {
            debug!(
                "Offline; {slot} session is {}s away, next probe in {}s",
                distance.num_seconds(),
                self.config.probe_interval_secs
            );
            self.wait(self.config.probe_interval()).await;
        }
        Ok(())
    }

    /// Bounded acquisition with fixed inter-attempt delay. Exhaustion is the
    /// one deterministic give-up point that surfaces as a fatal error.
    async fn acquire_with_retries(&mut self) -> Result<()> {
        for attempt in 1..=self.config.max_setup_attempts {
            match self.automation.acquire() {
                Ok(()) => return Ok(()),
                Err(err) => {
                    warn!(
                        "Automation acquire failed (attempt {attempt}/{}): {err}",
                        self.config.max_setup_attempts
                    );
                    if attempt < self.config.max_setup_attempts {
                        self.wait(self.config.retry_delay()).await;
                    }
                }
            }
        }
        bail!(
            "could not acquire automation collaborator after {} attempts",
            self.config.max_setup_attempts
        )
    }

    /// Sleep that wakes early on shutdown.
    async fn wait(&self, duration: std::time::Duration) {
        tokio::select! {
            _ = self.shutdown.cancelled() => {}
            _ = sleep(duration) => {}
        }
    }

    async fn cleanup(&mut self) {
        self.end_session().await;
        if let Err(err) = self.sink.flush() {
            warn!("Failed to flush sink on shutdown: {err:#}");
        }
        self.automation.release();
        info!("Monitor shut down");
    }
}
