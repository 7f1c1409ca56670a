use anyhow::{anyhow, Context, Result};
use log::{error, info, warn};
use midir::{MidiInput, MidiInputConnection};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::activity::LastActivity;

const POLL_SLEEP: Duration = Duration::from_millis(100);
/// In degraded mode the timestamp is refreshed every 10th poll (~1s).
const DEGRADED_REFRESH_POLLS: u32 = 10;

/// Seam between the tracker engine and the session-scoped input
/// monitor. Both calls are idempotent.
pub trait InputMonitor: Send + Sync {
    fn start(&mut self);
    fn stop(&mut self);
}

/// Real monitor: spawns one MIDI listener thread per session.
pub struct MidiMonitor {
    last_activity: Arc<LastActivity>,
    handle: Option<MonitorHandle>,
}

impl MidiMonitor {
    pub fn new(last_activity: Arc<LastActivity>) -> Self {
        Self {
            last_activity,
            handle: None,
        }
    }
}

impl InputMonitor for MidiMonitor {
    fn start(&mut self) {
        if self.handle.is_some() {
            return;
        }
        match MonitorHandle::start(Arc::clone(&self.last_activity)) {
            Ok(handle) => self.handle = Some(handle),
            Err(err) => {
                // A session without a monitor still ticks; the engine
                // then treats an unset timestamp as active.
                warn!("Failed to start MIDI monitor: {err:#}");
            }
        }
    }

    fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop();
        }
    }
}

/// Input-activity monitor: one background thread per DAW session,
/// stopped with a level-triggered flag and joined before the session
/// is considered over, so a late write can never race the next
/// session's fresh timestamp.
pub struct MonitorHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    pub fn start(last_activity: Arc<LastActivity>) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_for_thread = Arc::clone(&stop);

        let thread = thread::Builder::new()
            .name("dawblock-midi".into())
            .spawn(move || run_monitor(last_activity, stop_for_thread))
            .context("failed to spawn MIDI monitor thread")?;

        Ok(Self {
            stop,
            thread: Some(thread),
        })
    }

    /// Signal the thread and wait for it to finish.
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                error!("MIDI monitor thread panicked");
            }
        }
    }
}

fn run_monitor(last_activity: Arc<LastActivity>, stop: Arc<AtomicBool>) {
    // Mark the session fresh right away so it is never judged idle
    // before the first event arrives.
    last_activity.touch();

    match open_first_port(Arc::clone(&last_activity)) {
        Ok((port_name, _connection)) => {
            info!("Listening for MIDI input on '{port_name}'");
            // The connection's callback does the touching; this thread
            // only waits for the stop flag. Dropping the connection on
            // exit closes the port.
            while !stop.load(Ordering::Relaxed) {
                thread::sleep(POLL_SLEEP);
            }
        }
        Err(err) => {
            warn!("No MIDI input device ({err}); DAW presence alone counts as activity");
            let mut polls: u32 = 0;
            while !stop.load(Ordering::Relaxed) {
                if polls % DEGRADED_REFRESH_POLLS == 0 {
                    last_activity.touch();
                }
                polls = polls.wrapping_add(1);
                thread::sleep(POLL_SLEEP);
            }
        }
    }

    info!("MIDI monitor stopped");
}

fn open_first_port(
    last_activity: Arc<LastActivity>,
) -> Result<(String, MidiInputConnection<()>)> {
    let midi_in = MidiInput::new("dawblock").map_err(|err| anyhow!("{err}"))?;
    let ports = midi_in.ports();
    let port = ports.first().ok_or_else(|| anyhow!("no MIDI input ports"))?;
    let port_name = midi_in
        .port_name(port)
        .unwrap_or_else(|_| "unknown".to_string());

    let connection = midi_in
        .connect(
            port,
            "dawblock-input",
            move |_timestamp, _message, _: &mut ()| {
                last_activity.touch();
            },
            (),
        )
        .map_err(|err| anyhow!("{err}"))?;

    Ok((port_name, connection))
}
