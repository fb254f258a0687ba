//! Termination signals for recorded server processes

use crate::error::{Error, Result};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Signals sent by the stop path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermSignal {
    Terminate,
    Kill,
}

#[cfg(unix)]
impl TermSignal {
    fn as_raw(self) -> libc::c_int {
        match self {
            TermSignal::Terminate => libc::SIGTERM,
            TermSignal::Kill => libc::SIGKILL,
        }
    }
}

/// Send `signal` to `pid`. A process that is already gone counts as success.
#[cfg(unix)]
pub fn send(pid: u32, signal: TermSignal) -> Result<()> {
    let raw_pid = libc::pid_t::try_from(pid).map_err(|_| Error::Signal {
        pid,
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "pid out of range"),
    })?;
    // pid 0 and negative pids address process groups
    if raw_pid <= 0 {
        return Err(Error::Signal {
            pid,
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "refusing group pid"),
        });
    }

    let rc = unsafe { libc::kill(raw_pid, signal.as_raw()) };
    if rc == 0 {
        return Ok(());
    }
    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        debug!(pid, ?signal, "Process already exited");
        return Ok(());
    }
    Err(Error::Signal { pid, source: err })
}

#[cfg(not(unix))]
pub fn send(pid: u32, _signal: TermSignal) -> Result<()> {
    Err(Error::Signal {
        pid,
        source: std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "signals are only supported on Unix",
        ),
    })
}

/// Send SIGTERM to every direct child of `parent` via `pkill -TERM -P`.
///
/// `pkill` exits 1 when nothing matched, which is not a failure here.
pub async fn terminate_children(parent: u32) -> Result<()> {
    let status = Command::new("pkill")
        .args(["-TERM", "-P", &parent.to_string()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map_err(|source| Error::Signal {
            pid: parent,
            source,
        })?;

    match status.code() {
        Some(0) | Some(1) => Ok(()),
        _ => Err(Error::Signal {
            pid: parent,
            source: std::io::Error::other(format!("pkill exited with {}", status)),
        }),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_signal_missing_process_is_ok() {
        // Reap a short-lived child so its pid is known to be free
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();

        assert!(send(pid, TermSignal::Terminate).is_ok());
    }

    #[test]
    fn test_refuses_pid_zero() {
        assert!(matches!(
            send(0, TermSignal::Kill),
            Err(Error::Signal { pid: 0, .. })
        ));
    }

    #[test]
    fn test_kill_terminates_process() {
        let mut child = std::process::Command::new("sleep")
            .arg("30")
            .spawn()
            .unwrap();

        send(child.id(), TermSignal::Kill).unwrap();
        let status = child.wait().unwrap();
        assert!(!status.success());
    }

    fn is_alive(pid: u32) -> bool {
        unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
    }

    #[tokio::test]
    async fn test_terminate_children_signals_child_processes() {
        use std::io::{BufRead, BufReader};

        let mut parent = std::process::Command::new("bash")
            .args(["-c", "sleep 300 & echo $!; wait"])
            .stdout(Stdio::piped())
            .spawn()
            .unwrap();

        let mut line = String::new();
        BufReader::new(parent.stdout.take().unwrap())
            .read_line(&mut line)
            .unwrap();
        let child_pid: u32 = line.trim().parse().unwrap();
        assert!(is_alive(child_pid));

        terminate_children(parent.id()).await.unwrap();

        // bash reaps the sleep once it dies, then exits itself
        let status = parent.wait().unwrap();
        assert!(status.success());
        assert!(!is_alive(child_pid));
    }

    #[tokio::test]
    async fn test_terminate_children_without_children_is_ok() {
        let mut lonely = std::process::Command::new("sleep")
            .arg("30")
            .spawn()
            .unwrap();

        assert!(terminate_children(lonely.id()).await.is_ok());
        assert_eq!(lonely.try_wait().unwrap(), None);

        lonely.kill().unwrap();
        lonely.wait().unwrap();
    }
}
