use std::{
    sync::{Arc, Mutex},
    time::{Duration, SystemTime},
};

use log::{error, info};
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::daw::DawDetector;

use super::engine::TrackerEngine;
use super::state::TrackerState;

/// Handle to the running control loop. Cloned into Tauri managed
/// state; the UI commands only ever read the published snapshot or
/// request cancellation.
#[derive(Clone)]
pub struct TrackerController {
    shared: Arc<Mutex<TrackerState>>,
    cancel: CancellationToken,
    task: Arc<Mutex<Option<tauri::async_runtime::JoinHandle<()>>>>,
}

impl TrackerController {
    /// Spawn the control loop. The engine runs startup, then one tick
    /// per `loop_interval` until cancelled, then shutdown.
    pub fn spawn<D: DawDetector + Sync + 'static>(
        engine: TrackerEngine<D>,
        shared: Arc<Mutex<TrackerState>>,
        loop_interval: Duration,
    ) -> Self {
        let cancel = CancellationToken::new();
        let loop_cancel = cancel.clone();

        let task = tauri::async_runtime::spawn(run_loop(engine, loop_interval, loop_cancel));

        Self {
            shared,
            cancel,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }

    /// Most recent state published by the engine.
    pub fn snapshot(&self) -> TrackerState {
        match self.shared.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Request cancellation without waiting; the loop finishes its
    /// current tick and runs shutdown on its own task.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Cancel and wait for the loop to finish its shutdown sequence.
    /// Safe to call more than once; only the first caller waits.
    pub async fn shutdown(&self) {
        self.cancel.cancel();

        let task = {
            let mut guard = match self.task.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.take()
        };

        if let Some(task) = task {
            if let Err(err) = task.await {
                error!("Tracker loop task failed: {err}");
            }
        }
    }
}

async fn run_loop<D: DawDetector>(
    mut engine: TrackerEngine<D>,
    loop_interval: Duration,
    cancel: CancellationToken,
) {
    engine.startup().await;

    let mut interval = time::interval(loop_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; the engine has just
    // started up, so consume it and begin sampling one interval later.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                engine.tick(SystemTime::now()).await;
            }
        }
    }

    engine.shutdown().await;
    info!("Tracker loop exited");
}
