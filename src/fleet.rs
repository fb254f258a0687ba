//! One pass over the servers directory
//!
//! Projects are handled strictly one after another in directory-listing
//! order, which also fixes the order ports are handed out in. In start mode
//! the nginx config is rewritten exactly once, after the last project.

use crate::config::RuntimeConfig;
use crate::environment::{EnvironmentPreparer, NvmActivation};
use crate::error::{Error, Result};
use crate::nginx::{NginxWriter, ProxyRoute};
use crate::ports::PortAllocator;
use crate::registry::ProcessRegistry;
use crate::settings::ServerSettings;
use crate::supervisor::Supervisor;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Sub-directory of a project that its server runs in
pub const SERVER_SUBDIR: &str = "server";

/// What a run does to each project
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Start,
    Stop,
}

impl Mode {
    /// `stop` selects stop mode; anything else starts
    pub fn from_arg(arg: &str) -> Self {
        if arg == "stop" {
            Mode::Stop
        } else {
            Mode::Start
        }
    }
}

/// Result of handling one managed project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectOutcome {
    pub name: String,
    pub serverless: bool,
    pub port: Option<u16>,
    /// Pid of the process launched in start mode
    pub started: Option<u32>,
    /// Number of recorded processes terminated in stop mode
    pub stopped: usize,
    pub route: Option<ProxyRoute>,
}

/// Everything a run did, in scan order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub mode: Mode,
    pub projects: Vec<ProjectOutcome>,
    /// Whether the nginx config was rewritten (start mode only)
    pub proxy_updated: bool,
}

impl RunSummary {
    pub fn routes(&self) -> Vec<ProxyRoute> {
        self.projects
            .iter()
            .filter_map(|p| p.route.clone())
            .collect()
    }
}

/// Reconciles the servers directory against the process registry
pub struct Fleet {
    config: RuntimeConfig,
    supervisor: Supervisor,
    nginx: NginxWriter,
}

impl Fleet {
    /// Build a fleet around an already loaded registry, activating nvm for `.nvmrc` projects
    pub fn new(config: RuntimeConfig, registry: ProcessRegistry) -> Self {
        let environment = NvmActivation::new(config.nvm_script());
        Self::with_environment(config, registry, Box::new(environment))
    }

    pub fn with_environment(
        config: RuntimeConfig,
        registry: ProcessRegistry,
        environment: Box<dyn EnvironmentPreparer>,
    ) -> Self {
        let nginx = NginxWriter::new(
            config.nginx_config_path.clone(),
            config.reload_command.clone(),
        );
        Self {
            supervisor: Supervisor::new(registry, environment),
            nginx,
            config,
        }
    }

    /// Load the registry named by `config` and build a fleet around it
    pub fn load(config: RuntimeConfig) -> Result<Self> {
        let registry = ProcessRegistry::load(&config.registry_path)?;
        Ok(Self::new(config, registry))
    }

    pub fn registry(&self) -> &ProcessRegistry {
        self.supervisor.registry()
    }

    /// Start or stop every managed project, then (start mode) rewrite nginx.
    ///
    /// Per-project failures are logged and the scan moves on.
    pub async fn run(&mut self, mode: Mode) -> RunSummary {
        let servers_dir = match std::fs::canonicalize(&self.config.servers_dir) {
            Ok(dir) => dir,
            Err(e) => {
                warn!(
                    servers_dir = %self.config.servers_dir.display(),
                    error = %e,
                    "Cannot resolve servers directory"
                );
                self.config.servers_dir.clone()
            }
        };

        let mut ports = PortAllocator::new(self.config.base_port);
        let mut projects = Vec::new();

        for (name, project_dir) in list_projects(&servers_dir) {
            let mut settings = match ServerSettings::load(&project_dir) {
                Ok(Some(settings)) => settings,
                Ok(None) => {
                    debug!(server = %name, "No settings file, not a managed project");
                    continue;
                }
                Err(e) => {
                    warn!(server = %name, error = %e, "Failed to read settings");
                    continue;
                }
            };

            let serverless = settings.is_serverless();
            let port = match ports.allocate(serverless) {
                Ok(port) => port,
                Err(e) => {
                    warn!(server = %name, error = %e, "No port allocated");
                    None
                }
            };
            if let Some(port) = port {
                settings.set_port(port);
            }

            let working_dir = project_dir.join(SERVER_SUBDIR);
            let mut outcome = ProjectOutcome {
                name,
                serverless,
                port,
                started: None,
                stopped: 0,
                route: None,
            };

            match mode {
                Mode::Stop => {
                    outcome.stopped = self.supervisor.stop(&outcome.name, &working_dir).await;
                }
                Mode::Start => {
                    match self
                        .supervisor
                        .start(&outcome.name, &settings, &working_dir, port)
                        .await
                    {
                        Ok(Some(started)) => {
                            outcome.started = Some(started.pid);
                            outcome.route = started.route;
                        }
                        Ok(None) => {}
                        Err(e) => {
                            warn!(server = %outcome.name, error = %e, "Failed to start server");
                        }
                    }
                }
            }

            projects.push(outcome);
        }

        let mut summary = RunSummary {
            mode,
            projects,
            proxy_updated: false,
        };

        if mode == Mode::Start {
            summary.proxy_updated = self.update_proxy(&summary.routes()).await;
        }

        info!(
            ?mode,
            projects = summary.projects.len(),
            routes = summary.routes().len(),
            "Run complete"
        );
        summary
    }

    async fn update_proxy(&self, routes: &[ProxyRoute]) -> bool {
        if let Err(e) = self.nginx.apply(routes).await {
            error!(error = %e, "Failed to write nginx configuration");
            return false;
        }
        println!("Nginx configuration updated!");
        true
    }
}

/// Project directories directly under `servers_dir`, in listing order
fn list_projects(servers_dir: &Path) -> Vec<(String, PathBuf)> {
    let entries = match std::fs::read_dir(servers_dir) {
        Ok(entries) => entries,
        Err(e) => {
            let e = Error::io(servers_dir, e);
            warn!(error = %e, "Cannot list servers directory");
            return Vec::new();
        }
    };

    entries
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "Skipping unreadable directory entry");
                None
            }
        })
        // Symlinks are not followed, so a linked directory is not a project
        .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_dir()))
        .map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            (name, entry.path())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::NoPreparation;

    #[test]
    fn test_mode_from_arg() {
        assert_eq!(Mode::from_arg("stop"), Mode::Stop);
        assert_eq!(Mode::from_arg("start"), Mode::Start);
        assert_eq!(Mode::from_arg("restart"), Mode::Start);
        assert_eq!(Mode::from_arg("STOP"), Mode::Start);
    }

    #[test]
    fn test_list_projects_skips_files() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("app")).unwrap();
        std::fs::write(tmp.path().join("README"), "not a project").unwrap();

        let projects = list_projects(tmp.path());
        assert_eq!(projects, vec![("app".to_string(), tmp.path().join("app"))]);
    }

    #[cfg(unix)]
    #[test]
    fn test_list_projects_skips_symlinked_directories() {
        let tmp = tempfile::TempDir::new().unwrap();
        let elsewhere = tempfile::TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("app")).unwrap();
        std::os::unix::fs::symlink(elsewhere.path(), tmp.path().join("linked")).unwrap();
        assert!(tmp.path().join("linked").is_dir());

        let projects = list_projects(tmp.path());
        assert_eq!(projects, vec![("app".to_string(), tmp.path().join("app"))]);
    }

    #[test]
    fn test_list_missing_directory_is_empty() {
        let tmp = tempfile::TempDir::new().unwrap();
        assert!(list_projects(&tmp.path().join("missing")).is_empty());
    }

    fn outcome<'a>(summary: &'a RunSummary, name: &str) -> Option<&'a ProjectOutcome> {
        summary.projects.iter().find(|p| p.name == name)
    }

    fn fleet(tmp: &tempfile::TempDir) -> Fleet {
        let config = RuntimeConfig {
            servers_dir: tmp.path().join("servers"),
            nginx_config_path: tmp.path().join("nginx.conf"),
            registry_path: tmp.path().join("processes.json"),
            reload_command: Vec::new(),
            ..RuntimeConfig::default()
        };
        let registry = ProcessRegistry::new(config.registry_path.clone());
        Fleet::with_environment(config, registry, Box::new(NoPreparation))
    }

    #[tokio::test]
    async fn test_unmanaged_projects_are_skipped() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("servers/plain/server")).unwrap();

        let mut fleet = fleet(&tmp);
        let summary = fleet.run(Mode::Start).await;

        assert!(summary.projects.is_empty());
        assert!(fleet.registry().is_empty());
        assert!(summary.proxy_updated);
    }

    #[tokio::test]
    async fn test_missing_servers_dir_still_writes_config() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut fleet = fleet(&tmp);

        let summary = fleet.run(Mode::Start).await;
        assert!(summary.projects.is_empty());
        assert!(summary.proxy_updated);

        let written = std::fs::read_to_string(tmp.path().join("nginx.conf")).unwrap();
        assert!(!written.contains("server_name"));
    }

    #[tokio::test]
    async fn test_stop_never_touches_proxy_config() {
        let tmp = tempfile::TempDir::new().unwrap();
        let project = tmp.path().join("servers/app");
        std::fs::create_dir_all(&project).unwrap();
        std::fs::write(project.join(".settings"), "MATCH=app.test\n").unwrap();

        let mut fleet = fleet(&tmp);
        let summary = fleet.run(Mode::Stop).await;

        assert!(!summary.proxy_updated);
        assert_eq!(outcome(&summary, "app").unwrap().stopped, 0);
        assert!(!tmp.path().join("nginx.conf").exists());
    }

    #[tokio::test]
    async fn test_projects_without_start_still_consume_ports() {
        let tmp = tempfile::TempDir::new().unwrap();
        for (name, settings) in [
            ("a", "MATCH=a.test\n"),
            ("b", "MATCH=b.test\n"),
            ("lambda", "SERVERLESS=true\nMATCH=l.test\n"),
            ("c", "MATCH=c.test\n"),
        ] {
            let project = tmp.path().join("servers").join(name);
            std::fs::create_dir_all(&project).unwrap();
            std::fs::write(project.join(".settings"), settings).unwrap();
        }

        let mut fleet = fleet(&tmp);
        let summary = fleet.run(Mode::Start).await;

        assert_eq!(outcome(&summary, "lambda").unwrap().port, None);
        // Scan order is the allocation order
        let ports: Vec<u16> = summary.projects.iter().filter_map(|p| p.port).collect();
        assert_eq!(ports, vec![2000, 2001, 2002]);
        assert!(summary.routes().is_empty());
    }
}
