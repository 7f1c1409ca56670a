use serde::Serialize;

/// Snapshot of everything the tracker knows, owned by the control loop
/// and published read-only for the status window. `status_text` and
/// `time_text` are the only fields the window actually renders.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerState {
    pub total_seconds_today: u64,
    pub session_active: bool,
    /// None only before the startup enforcement decision has run.
    pub sites_blocked: Option<bool>,
    pub is_idle: bool,
    pub active_process_name: Option<String>,
    pub status_text: String,
    pub time_text: String,
}

impl TrackerState {
    pub fn new(target_seconds: u64) -> Self {
        let mut state = Self {
            total_seconds_today: 0,
            session_active: false,
            sites_blocked: None,
            is_idle: false,
            active_process_name: None,
            status_text: "Starting up...".to_string(),
            time_text: String::new(),
        };
        state.update_time_text(target_seconds);
        state
    }

    /// Recompute the "MM:SS / MM:SS" display (elapsed / target).
    pub fn update_time_text(&mut self, target_seconds: u64) {
        self.time_text = format!(
            "{} / {}",
            format_mm_ss(self.total_seconds_today),
            format_mm_ss(target_seconds)
        );
    }
}

fn format_mm_ss(total_seconds: u64) -> String {
    format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state_shows_zero_against_target() {
        let state = TrackerState::new(1800);
        assert_eq!(state.time_text, "00:00 / 30:00");
        assert!(!state.session_active);
        assert_eq!(state.sites_blocked, None);
    }

    #[test]
    fn time_text_is_zero_padded() {
        let mut state = TrackerState::new(1800);
        state.total_seconds_today = 65;
        state.update_time_text(1800);
        assert_eq!(state.time_text, "01:05 / 30:00");
    }

    #[test]
    fn time_text_handles_non_whole_minutes_in_target() {
        let mut state = TrackerState::new(90);
        state.total_seconds_today = 5;
        state.update_time_text(90);
        assert_eq!(state.time_text, "00:05 / 01:30");
    }

    #[test]
    fn elapsed_can_exceed_the_target() {
        let mut state = TrackerState::new(1800);
        state.total_seconds_today = 1805;
        state.update_time_text(1800);
        assert_eq!(state.time_text, "30:05 / 30:00");
    }
}
