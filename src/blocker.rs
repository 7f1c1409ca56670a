use anyhow::{Context, Result};
use log::{error, info, warn};
use std::fs;
use std::path::PathBuf;

/// Enforcement gate over the hosts file. Every line we write carries
/// `tag`, and the tag is the only thing used to find our lines again,
/// so unrelated content is never disturbed.
///
/// `block` and `unblock` are idempotent: both start by dropping every
/// tagged line, then `block` appends one fresh entry per site. Failure
/// to write (typically missing privileges) is reported as `false` and
/// leaves enforcement in whatever state it was.
pub struct SiteBlocker {
    hosts_path: PathBuf,
    redirect_ip: String,
    tag: String,
    sites: Vec<String>,
}

impl SiteBlocker {
    pub fn new(hosts_path: PathBuf, redirect_ip: &str, tag: &str, sites: Vec<String>) -> Self {
        Self {
            hosts_path,
            redirect_ip: redirect_ip.to_string(),
            tag: tag.to_string(),
            sites,
        }
    }

    pub fn with_defaults(sites: Vec<String>) -> Self {
        Self::new(
            crate::config::hosts_path(),
            crate::config::REDIRECT_IP,
            crate::config::HOSTS_TAG,
            sites,
        )
    }

    pub fn block(&self) -> bool {
        match self.rewrite(true) {
            Ok(()) => {
                info!("Sites blocked ({} entries)", self.sites.len());
                true
            }
            Err(err) => {
                error!("Failed to block sites: {err:#}");
                false
            }
        }
    }

    pub fn unblock(&self) -> bool {
        match self.rewrite(false) {
            Ok(()) => {
                info!("Sites unblocked");
                true
            }
            Err(err) => {
                warn!("Failed to unblock sites: {err:#}");
                false
            }
        }
    }

    /// Read, drop every tagged line, optionally append fresh entries,
    /// write back. One read and one write per call; the tracker loop is
    /// the only writer, so no cross-process locking is needed.
    fn rewrite(&self, add_entries: bool) -> Result<()> {
        let contents = fs::read_to_string(&self.hosts_path)
            .with_context(|| format!("failed to read {}", self.hosts_path.display()))?;

        let mut kept: Vec<&str> = contents
            .lines()
            .filter(|line| !line.contains(&self.tag))
            .collect();

        // Drop trailing blank lines left behind by earlier rewrites.
        while kept.last().is_some_and(|line| line.trim().is_empty()) {
            kept.pop();
        }

        let mut output = kept.join("\n");
        if add_entries {
            for site in &self.sites {
                output.push('\n');
                output.push_str(&format!("{}\t{}\t{}", self.redirect_ip, site, self.tag));
            }
        }
        output.push('\n');

        fs::write(&self.hosts_path, output)
            .with_context(|| format!("failed to write {}", self.hosts_path.display()))
    }

    /// Count of tagged lines currently present.
    #[cfg(test)]
    pub fn tagged_line_count(&self) -> usize {
        fs::read_to_string(&self.hosts_path)
            .map(|contents| {
                contents
                    .lines()
                    .filter(|line| line.contains(&self.tag))
                    .count()
            })
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const TAG: &str = "# Blocked by DAWBlock";

    fn blocker_with(dir: &tempfile::TempDir, initial: &str) -> SiteBlocker {
        let path = dir.path().join("hosts");
        fs::write(&path, initial).unwrap();
        SiteBlocker::new(
            path,
            "127.0.0.1",
            TAG,
            vec!["youtube.com".to_string(), "netflix.com".to_string()],
        )
    }

    fn untagged_lines(blocker: &SiteBlocker) -> Vec<String> {
        fs::read_to_string(&blocker.hosts_path)
            .unwrap()
            .lines()
            .filter(|line| !line.contains(TAG) && !line.trim().is_empty())
            .map(|line| line.to_string())
            .collect()
    }

    #[test]
    fn block_appends_one_tagged_line_per_site() {
        let dir = tempdir().unwrap();
        let blocker = blocker_with(&dir, "127.0.0.1\tlocalhost\n");

        assert!(blocker.block());
        assert_eq!(blocker.tagged_line_count(), 2);

        let contents = fs::read_to_string(&blocker.hosts_path).unwrap();
        assert!(contents.contains(&format!("127.0.0.1\tyoutube.com\t{TAG}")));
    }

    #[test]
    fn block_twice_is_idempotent() {
        let dir = tempdir().unwrap();
        let blocker = blocker_with(&dir, "127.0.0.1\tlocalhost\n");

        assert!(blocker.block());
        let once = fs::read_to_string(&blocker.hosts_path).unwrap();
        assert!(blocker.block());
        let twice = fs::read_to_string(&blocker.hosts_path).unwrap();

        assert_eq!(once, twice);
        assert_eq!(blocker.tagged_line_count(), 2);
    }

    #[test]
    fn unblock_twice_is_a_noop_the_second_time() {
        let dir = tempdir().unwrap();
        let blocker = blocker_with(&dir, "127.0.0.1\tlocalhost\n");

        assert!(blocker.block());
        assert!(blocker.unblock());
        assert_eq!(blocker.tagged_line_count(), 0);

        let once = fs::read_to_string(&blocker.hosts_path).unwrap();
        assert!(blocker.unblock());
        let twice = fs::read_to_string(&blocker.hosts_path).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn unrelated_lines_survive_a_block_unblock_cycle() {
        let dir = tempdir().unwrap();
        let initial = "127.0.0.1\tlocalhost\n::1\tlocalhost\n10.0.0.5\tmy-nas # homelab\n";
        let blocker = blocker_with(&dir, initial);

        let before = untagged_lines(&blocker);
        assert!(blocker.block());
        assert!(blocker.unblock());
        let after = untagged_lines(&blocker);

        assert_eq!(before, after);
        assert_eq!(blocker.tagged_line_count(), 0);
    }

    #[test]
    fn missing_hosts_file_reports_failure_not_panic() {
        let dir = tempdir().unwrap();
        let blocker = SiteBlocker::new(
            dir.path().join("does-not-exist"),
            "127.0.0.1",
            TAG,
            vec!["youtube.com".to_string()],
        );

        assert!(!blocker.block());
        assert!(!blocker.unblock());
    }
}
