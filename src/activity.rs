use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Timestamp of the most recent MIDI event, shared between the monitor
/// thread (writer) and the tracker loop (reader).
///
/// A single atomic slot is all the coordination this needs: the reader
/// only ever wants the latest value, and staleness up to one loop tick
/// is acceptable, so relaxed ordering is fine. Zero means "unset".
pub struct LastActivity(AtomicU64);

impl LastActivity {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Record an input event happening right now.
    pub fn touch(&self) {
        self.record(SystemTime::now());
    }

    pub fn record(&self, at: SystemTime) {
        let millis = at
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
            .max(1);
        self.0.store(millis, Ordering::Relaxed);
    }

    /// Forget the last event; called between sessions after the monitor
    /// thread has been joined, so no late write can race this.
    pub fn clear(&self) {
        self.0.store(0, Ordering::Relaxed);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed) != 0
    }

    /// True iff a timestamp was recorded and it is older than `threshold`
    /// as of `now`. An unset cell never reads as idle; if no input device
    /// exists the monitor keeps the cell fresh instead (degraded mode).
    pub fn idle_longer_than(&self, threshold: Duration, now: SystemTime) -> bool {
        let millis = self.0.load(Ordering::Relaxed);
        if millis == 0 {
            return false;
        }
        let last = UNIX_EPOCH + Duration::from_millis(millis);
        match now.duration_since(last) {
            Ok(elapsed) => elapsed > threshold,
            // Clock went backwards; treat as fresh rather than idle.
            Err(_) => false,
        }
    }
}

impl Default for LastActivity {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_cell_is_never_idle() {
        let cell = LastActivity::new();
        assert!(!cell.is_set());
        assert!(!cell.idle_longer_than(Duration::from_secs(60), SystemTime::now()));
    }

    #[test]
    fn fresh_touch_is_not_idle() {
        let cell = LastActivity::new();
        cell.touch();
        assert!(cell.is_set());
        assert!(!cell.idle_longer_than(Duration::from_secs(60), SystemTime::now()));
    }

    #[test]
    fn stale_timestamp_reads_as_idle() {
        let cell = LastActivity::new();
        let now = SystemTime::now();
        cell.record(now - Duration::from_secs(61));
        assert!(cell.idle_longer_than(Duration::from_secs(60), now));
        assert!(!cell.idle_longer_than(Duration::from_secs(120), now));
    }

    #[test]
    fn clear_resets_to_unset() {
        let cell = LastActivity::new();
        cell.touch();
        cell.clear();
        assert!(!cell.is_set());
    }
}
