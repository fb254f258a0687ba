use crate::environment::EnvironmentPreparer;
use crate::error::{Error, Result};
use crate::nginx::ProxyRoute;
use crate::registry::{ProcessRegistry, ServerProcessRecord};
use crate::settings::{ServerSettings, KEY_PORT};
use crate::signal::{self, TermSignal};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Shell used to run start commands
const SHELL: &str = "bash";

/// A process launched by [`Supervisor::start`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Started {
    pub pid: u32,
    /// Present when the project has a `MATCH` host and an allocated port
    pub route: Option<ProxyRoute>,
}

/// Starts and stops server processes, recording them in the registry.
///
/// Launches are fire-and-forget: the supervisor returns as soon as the OS
/// confirms the spawn and never waits on the child.
pub struct Supervisor {
    registry: ProcessRegistry,
    environment: Box<dyn EnvironmentPreparer>,
}

impl Supervisor {
    pub fn new(registry: ProcessRegistry, environment: Box<dyn EnvironmentPreparer>) -> Self {
        Self {
            registry,
            environment,
        }
    }

    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    /// Launch the project's `START` command in `working_dir`.
    ///
    /// Returns `Ok(None)` when the project has no start command. The new
    /// process is recorded and the registry persisted before returning.
    pub async fn start(
        &mut self,
        name: &str,
        settings: &ServerSettings,
        working_dir: &Path,
        port: Option<u16>,
    ) -> Result<Option<Started>> {
        let Some(command) = settings.start_command() else {
            debug!(server = name, "No START command, skipping");
            return Ok(None);
        };

        let line = self.environment.prepare(command, working_dir);
        info!(server = name, command = %line, working_dir = %working_dir.display(), ?port, "Starting server");

        let mut cmd = Command::new(SHELL);
        cmd.arg("-c").arg(&line);
        cmd.current_dir(working_dir);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::inherit());
        cmd.stderr(Stdio::inherit());
        if let Some(port) = port {
            cmd.env(KEY_PORT, port.to_string());
        }

        let launch_error = |source: std::io::Error| Error::Launch {
            command: line.clone(),
            working_dir: working_dir.to_path_buf(),
            source,
        };
        let child = cmd.spawn().map_err(launch_error)?;
        let pid = child.id().ok_or_else(|| {
            launch_error(std::io::Error::other("process exited before its pid was read"))
        })?;
        drop(child);

        info!(server = name, pid, "Server process spawned");
        if let Err(e) = self
            .registry
            .add(ServerProcessRecord::new(pid, working_dir))
        {
            warn!(server = name, pid, error = %e, "Failed to persist process registry");
        }
        println!("Started server: {}", name);

        let route = match (settings.match_host(), port) {
            (Some(host), Some(port)) => Some(ProxyRoute::new(host, port)),
            _ => None,
        };
        Ok(Some(Started { pid, route }))
    }

    /// Stop every recorded process launched in `working_dir`.
    ///
    /// Each match gets SIGTERM, then SIGTERM to its children, then SIGKILL,
    /// regardless of whether the earlier signals worked. Each record is
    /// removed and the registry persisted right after its process is
    /// signalled. Returns the number of records stopped.
    pub async fn stop(&mut self, name: &str, working_dir: &Path) -> usize {
        let matches = self.registry.find_by_working_dir(working_dir);
        if matches.is_empty() {
            debug!(server = name, working_dir = %working_dir.display(), "Nothing recorded to stop");
            return 0;
        }

        for record in &matches {
            let pid = record.pid;
            info!(server = name, pid, "Stopping server process");

            if let Err(e) = signal::send(pid, TermSignal::Terminate) {
                debug!(server = name, pid, error = %e, "SIGTERM failed");
            }
            if let Err(e) = signal::terminate_children(pid).await {
                debug!(server = name, pid, error = %e, "Terminating children failed");
            }
            if let Err(e) = signal::send(pid, TermSignal::Kill) {
                debug!(server = name, pid, error = %e, "SIGKILL failed");
            }

            println!("Stopped server: {}", name);
            if let Err(e) = self.registry.remove(pid) {
                warn!(server = name, pid, error = %e, "Failed to persist process registry");
            }
        }

        matches.len()
    }
}
