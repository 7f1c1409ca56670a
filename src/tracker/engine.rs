use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use chrono::Local;
use log::{info, warn};

use crate::activity::LastActivity;
use crate::blocker::SiteBlocker;
use crate::config::TrackerConfig;
use crate::daw::DawDetector;
use crate::db::Database;

use super::monitor::InputMonitor;
use super::state::TrackerState;

/// The tracker state machine. Owns all mutable tracker state; the
/// control loop drives it by calling `startup` once, `tick` every
/// loop interval, and `shutdown` once after cancellation.
///
/// Sensors, store, and gate are injected so the machine can be driven
/// tick-by-tick in tests without sleeping or real processes.
pub struct TrackerEngine<D: DawDetector> {
    config: TrackerConfig,
    detector: D,
    db: Database,
    blocker: SiteBlocker,
    last_activity: Arc<LastActivity>,
    monitor: Box<dyn InputMonitor>,
    state: TrackerState,
    shared: Arc<Mutex<TrackerState>>,
    shutdown_done: bool,
}

impl<D: DawDetector> TrackerEngine<D> {
    pub fn new(
        config: TrackerConfig,
        detector: D,
        db: Database,
        blocker: SiteBlocker,
        last_activity: Arc<LastActivity>,
        monitor: Box<dyn InputMonitor>,
        shared: Arc<Mutex<TrackerState>>,
    ) -> Self {
        Self {
            detector,
            db,
            blocker,
            last_activity,
            monitor,
            state: TrackerState::new(config.target_seconds),
            shared,
            config,
            shutdown_done: false,
        }
    }

    /// Run-once startup: load today's persisted total and make the
    /// initial enforcement decision. `sites_blocked` is always resolved
    /// to Some(_) here, before the first tick, so a threshold crossing
    /// can never be missed against an unknown flag.
    pub async fn startup(&mut self) {
        match self.db.day_total(today()).await {
            Ok(total) => self.state.total_seconds_today = total,
            Err(err) => {
                warn!("Failed to load today's total, starting from zero: {err:#}");
            }
        }
        self.state.update_time_text(self.config.target_seconds);

        if self.state.total_seconds_today < self.config.target_seconds {
            self.state.sites_blocked = Some(self.blocker.block());
        } else {
            // A failed unblock keeps the belief "still blocked" so the
            // per-tick guard retries instead of stranding the block.
            self.state.sites_blocked = Some(!self.blocker.unblock());
        }

        info!(
            "Tracker started: {}s of {}s done today, blocked={:?}",
            self.state.total_seconds_today, self.config.target_seconds, self.state.sites_blocked
        );
        self.publish();
    }

    /// One control-loop step, sampling both sensors at `now`.
    pub async fn tick(&mut self, now: SystemTime) {
        match (self.detector.detect(), self.state.session_active) {
            (Some(name), false) => self.begin_session(name),
            (Some(_), true) => self.continue_session(now).await,
            (None, true) => self.end_session().await,
            (None, false) => self.wait_for_daw(),
        }
        self.publish();
    }

    fn begin_session(&mut self, process_name: String) {
        info!("DAW detected: {process_name}");
        self.state.session_active = true;
        self.state.is_idle = false;
        self.state.status_text = format!("DAW detected: {process_name}");
        self.state.active_process_name = Some(process_name);
        self.monitor.start();
    }

    async fn continue_session(&mut self, now: SystemTime) {
        self.state.is_idle = self
            .last_activity
            .idle_longer_than(self.config.idle_threshold, now);

        if self.state.is_idle {
            self.state.status_text = "Idle, timer paused...".to_string();
            return;
        }

        self.state.status_text = "Session active, clock is running".to_string();
        self.state.total_seconds_today += self.config.loop_interval.as_secs();
        self.state.update_time_text(self.config.target_seconds);
        self.persist_total().await;

        // Crossing check runs on every accrual tick but is guarded by
        // the blocked flag, so the unblock fires at most once.
        if self.state.sites_blocked == Some(true)
            && self.state.total_seconds_today >= self.config.target_seconds
        {
            info!(
                "Daily goal reached at {}s",
                self.state.total_seconds_today
            );
            if self.blocker.unblock() {
                self.state.sites_blocked = Some(false);
                self.state.status_text = "Daily goal reached! Sites are unblocked.".to_string();
            } else {
                self.state.status_text =
                    "Daily goal reached, but the hosts file could not be updated".to_string();
            }
        }
    }

    async fn end_session(&mut self) {
        info!("DAW closed, ending session");
        self.state.status_text = "DAW closed. Session ended.".to_string();
        self.persist_total().await;
        self.state.session_active = false;
        self.state.is_idle = false;
        self.state.active_process_name = None;
        // Join the monitor before clearing the timestamp so a late
        // write cannot leak into the next session.
        self.monitor.stop();
        self.last_activity.clear();
    }

    fn wait_for_daw(&mut self) {
        self.state.status_text = if self.state.total_seconds_today < self.config.target_seconds {
            "Waiting for a DAW to start. Sites are blocked.".to_string()
        } else {
            "Waiting for a DAW to start. Daily goal already met.".to_string()
        };
    }

    /// Final persistence and cleanup; runs exactly once no matter what
    /// state the loop was in when it was cancelled.
    pub async fn shutdown(&mut self) {
        if self.shutdown_done {
            return;
        }
        self.shutdown_done = true;

        info!("Tracker shutting down, saving state");
        self.persist_total().await;
        if self.state.sites_blocked == Some(true) && self.blocker.unblock() {
            self.state.sites_blocked = Some(false);
        }
        self.monitor.stop();
        self.publish();
    }

    async fn persist_total(&self) {
        let total = self.state.total_seconds_today;
        if let Err(err) = self.db.upsert_day_total(today(), total).await {
            // Keep the in-memory count; one lost write must not lose
            // the day's progress.
            warn!("Failed to persist today's total ({total}s): {err:#}");
        }
    }

    fn publish(&self) {
        let mut guard = match self.shared.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = self.state.clone();
    }
}

fn today() -> chrono::NaiveDate {
    Local::now().date_naive()
}
