//! Startup privilege check. Rewriting the hosts file needs elevated
//! rights, and running without them would silently break enforcement,
//! so absence of privilege is fatal at startup.

#[cfg(unix)]
pub fn is_elevated() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

#[cfg(windows)]
pub fn is_elevated() -> bool {
    // There is no euid equivalent; probing the hosts file for write
    // access answers the only question we actually care about.
    std::fs::OpenOptions::new()
        .append(true)
        .open(crate::config::hosts_path())
        .is_ok()
}
