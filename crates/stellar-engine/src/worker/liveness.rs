//! OS-level process liveness.

/// Whether process `pid` exists and has not exited.
///
/// A zombie counts as dead. When `pid` is a child of this process (a worker
/// spawned by [`ProcessLauncher`](super::ProcessLauncher)) an exited child is
/// reaped here, so it never lingers as a zombie.
#[cfg(unix)]
pub fn process_alive(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    if raw <= 0 {
        return false;
    }
    let pid = Pid::from_raw(raw);

    match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
        Ok(WaitStatus::StillAlive) => return true,
        Ok(_) => return false,
        // ECHILD: not ours, ask the kernel instead
        Err(_) => {}
    }

    match kill(pid, None) {
        Ok(()) => !is_zombie(pid),
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(target_os = "linux")]
fn is_zombie(pid: nix::unistd::Pid) -> bool {
    let Ok(stat) = std::fs::read_to_string(format!("/proc/{}/stat", pid)) else {
        return false;
    };
    // "<pid> (<comm>) <state> ..."; comm may itself contain ')'
    stat.rsplit_once(')')
        .and_then(|(_, rest)| rest.split_whitespace().next())
        .is_some_and(|state| state == "Z" || state == "X")
}

#[cfg(all(unix, not(target_os = "linux")))]
fn is_zombie(_pid: nix::unistd::Pid) -> bool {
    false
}

#[cfg(not(unix))]
pub fn process_alive(_pid: u32) -> bool {
    false
}
