use std::path::PathBuf;
use std::time::Duration;

/// Daily goal: 30 minutes of genuinely active DAW time.
pub const TARGET_SECONDS_PER_DAY: u64 = 30 * 60;

/// How often the tracker samples its sensors.
pub const LOOP_INTERVAL_SECS: u64 = 5;

/// No MIDI input for this long while a DAW is open counts as idle.
pub const IDLE_THRESHOLD_SECS: u64 = 60;

/// Executable names we treat as a DAW, compared case-insensitively.
pub const DAW_PROCESS_NAMES: &[&str] = &[
    "ableton live 12 lite.exe",
    "ableton live 11 suite.exe",
    "fl64.exe",
    "bitwigstudio.exe",
    "reaper.exe",
    "studio one.exe",
];

pub const SITES_TO_BLOCK: &[&str] = &[
    "www.youtube.com",
    "youtube.com",
    "www.netflix.com",
    "netflix.com",
];

pub const REDIRECT_IP: &str = "127.0.0.1";

/// Marker appended to every hosts line we own; the sole key used to
/// find and remove our entries without touching anything else.
pub const HOSTS_TAG: &str = "# Blocked by DAWBlock";

pub fn hosts_path() -> PathBuf {
    #[cfg(windows)]
    {
        let system_root =
            std::env::var("SystemRoot").unwrap_or_else(|_| r"C:\Windows".to_string());
        PathBuf::from(system_root).join(r"System32\drivers\etc\hosts")
    }

    #[cfg(not(windows))]
    {
        PathBuf::from("/etc/hosts")
    }
}

/// Timing knobs for the tracker control loop, bundled so tests can run
/// the state machine with whatever cadence they need.
#[derive(Debug, Clone, Copy)]
pub struct TrackerConfig {
    pub target_seconds: u64,
    pub loop_interval: Duration,
    pub idle_threshold: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            target_seconds: TARGET_SECONDS_PER_DAY,
            loop_interval: Duration::from_secs(LOOP_INTERVAL_SECS),
            idle_threshold: Duration::from_secs(IDLE_THRESHOLD_SECS),
        }
    }
}
