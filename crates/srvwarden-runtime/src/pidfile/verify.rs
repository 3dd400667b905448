//! Check that a recorded pid still runs our server executable.

use std::path::Path;

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};

/// True when `pid` is alive and its executable is `executable`.
///
/// Any doubt (pid gone, exe unreadable, different binary) yields `false`,
/// so a reused pid is never killed.
pub fn is_our_server(pid: u32, executable: &Path) -> bool {
    let target = Pid::from_u32(pid);
    let mut sys = System::new();
    sys.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[target]),
        true,
        ProcessRefreshKind::nothing().with_exe(UpdateKind::OnlyIfNotSet),
    );

    let Some(exe) = sys.process(target).and_then(|p| p.exe()) else {
        return false;
    };

    same_file(exe, executable)
}

fn same_file(actual: &Path, expected: &Path) -> bool {
    match (actual.canonicalize(), expected.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => actual == expected,
    }
}
