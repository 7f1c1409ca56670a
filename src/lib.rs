mod activity;
mod blocker;
mod config;
mod daw;
mod db;
mod privilege;
mod settings;
mod tracker;

use std::sync::{Arc, Mutex};

use tauri::{Manager, RunEvent, State};

use activity::LastActivity;
use blocker::SiteBlocker;
use daw::ProcessDawDetector;
use db::Database;
use settings::TrackerSettings;
use tracker::{MidiMonitor, TrackerController, TrackerEngine, TrackerState};

pub(crate) struct AppState {
    pub(crate) tracker: TrackerController,
}

/// Snapshot of the tracker for the display window; polled once a second.
#[tauri::command]
fn get_tracker_status(state: State<AppState>) -> Result<TrackerState, String> {
    Ok(state.tracker.snapshot())
}

#[tauri::command]
fn stop_tracker(state: State<AppState>) -> Result<(), String> {
    state.tracker.stop();
    Ok(())
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("DAWBlock starting up...");

    // Editing the hosts file needs elevation; refuse to start without
    // it rather than fail on the first block attempt.
    if !privilege::is_elevated() {
        log::error!("DAWBlock must run elevated (root/administrator) to manage the hosts file");
        eprintln!("DAWBlock must be run as root/administrator.");
        std::process::exit(1);
    }

    tauri::Builder::default()
        .setup(|app| {
            let result = (|| -> anyhow::Result<()> {
                let app_data_dir = app
                    .path()
                    .app_data_dir()
                    .map_err(|err| anyhow::anyhow!(err))?;
                std::fs::create_dir_all(&app_data_dir)?;

                let settings = TrackerSettings::load(&app_data_dir.join("settings.json"))?;
                let tracker_config = settings.tracker_config();
                let loop_interval = tracker_config.loop_interval;

                let database = Database::new(app_data_dir.join("dawblock.sqlite3"))?;
                let blocker = SiteBlocker::with_defaults(settings.blocked_sites.clone());
                let detector = ProcessDawDetector::new(settings.daw_process_names.clone());

                let last_activity = Arc::new(LastActivity::new());
                let monitor = MidiMonitor::new(Arc::clone(&last_activity));
                let shared = Arc::new(Mutex::new(TrackerState::new(
                    tracker_config.target_seconds,
                )));

                let engine = TrackerEngine::new(
                    tracker_config,
                    detector,
                    database,
                    blocker,
                    last_activity,
                    Box::new(monitor),
                    Arc::clone(&shared),
                );
                let tracker = TrackerController::spawn(engine, shared, loop_interval);

                app.manage(AppState { tracker });

                Ok(())
            })();

            result.map_err(|err| err.into())
        })
        .invoke_handler(tauri::generate_handler![get_tracker_status, stop_tracker])
        .build(tauri::generate_context!())
        .expect("error while building tauri application")
        .run(|app_handle, event| {
            // Persist the running total and lift the block before the
            // process goes away, whatever triggered the exit.
            if let RunEvent::Exit = event {
                let state: State<AppState> = app_handle.state();
                tauri::async_runtime::block_on(state.tracker.shutdown());
            }
        });
}
