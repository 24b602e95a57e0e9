pub const ROOT_REQUIRED_MESSAGE: &str =
    "This program requires root privileges to access GPU registers. Please run with sudo.";

/// Whether the process runs with an effective uid of 0.
#[cfg(unix)]
pub fn has_root_privileges() -> bool {
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
pub fn has_root_privileges() -> bool {
    false
}

/// Exit with status 1 unless running as root.
///
/// The register windows behind the junction and VRAM sensors are only
/// readable by root, so the check happens before any backend is opened.
pub fn ensure_root_privileges() {
    if !has_root_privileges() {
        eprintln!("{ROOT_REQUIRED_MESSAGE}");
        std::process::exit(1);
    }
}
