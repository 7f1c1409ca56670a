use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};

/// Process-presence sensor: "is a tracked DAW running right now, and
/// which one". Behind a trait so the tracker state machine can be
/// driven tick-by-tick in tests without real processes.
pub trait DawDetector: Send {
    /// Returns the process name of a running DAW, or None.
    fn detect(&mut self) -> Option<String>;
}

/// Scans the system process table with sysinfo, matching executable
/// names case-insensitively against the configured DAW list.
pub struct ProcessDawDetector {
    system: System,
    names: Vec<String>,
}

impl ProcessDawDetector {
    pub fn new(names: Vec<String>) -> Self {
        Self {
            system: System::new(),
            names: names
                .into_iter()
                .map(|name| name.to_lowercase())
                .collect(),
        }
    }
}

impl DawDetector for ProcessDawDetector {
    fn detect(&mut self) -> Option<String> {
        self.system
            .refresh_processes_specifics(ProcessesToUpdate::All, ProcessRefreshKind::new());

        for process in self.system.processes().values() {
            let name = process.name().to_string_lossy();
            if self
                .names
                .iter()
                .any(|candidate| name.eq_ignore_ascii_case(candidate))
            {
                // Original casing, for display.
                return Some(name.into_owned());
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_watch_list_never_matches() {
        let mut detector = ProcessDawDetector::new(Vec::new());
        assert_eq!(detector.detect(), None);
    }

    #[test]
    fn matching_is_case_insensitive() {
        // The test binary itself is always running, so watching for its
        // own process name (upper-cased) must produce a match. Linux
        // truncates names to 15 bytes, so watch for that prefix too.
        let own_name = std::env::current_exe()
            .ok()
            .and_then(|path| path.file_name().map(|n| n.to_string_lossy().into_owned()))
            .expect("test binary has a name");
        let truncated: String = own_name.chars().take(15).collect();

        let mut detector =
            ProcessDawDetector::new(vec![own_name.to_uppercase(), truncated.to_uppercase()]);
        let found = detector.detect().expect("own process should be detected");
        assert!(own_name.to_lowercase().starts_with(&found.to_lowercase()));
    }
}
