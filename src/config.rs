use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable that overrides the configuration file location
pub const CONFIG_PATH_ENV: &str = "SERMAN_CONFIG";

/// Configuration file used when `SERMAN_CONFIG` is not set
pub const DEFAULT_CONFIG_FILE: &str = "serman.toml";

/// Process-wide settings, loaded once at startup and never mutated
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Directory holding one sub-directory per server project
    #[serde(default = "default_servers_dir")]
    pub servers_dir: PathBuf,

    /// Where the generated nginx configuration is written
    #[serde(default = "default_nginx_config_path")]
    pub nginx_config_path: PathBuf,

    /// First port handed out to a non-serverless project
    #[serde(default = "default_base_port")]
    pub base_port: u16,

    /// Script sourced before `nvm use` for projects with an `.nvmrc`
    #[serde(default = "default_nvm_path")]
    pub nvm_path: String,

    /// Where the list of started processes is persisted between runs
    #[serde(default = "default_registry_path")]
    pub registry_path: PathBuf,

    /// Command that reloads nginx after the config is rewritten (empty disables it)
    #[serde(default = "default_reload_command")]
    pub reload_command: Vec<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            servers_dir: default_servers_dir(),
            nginx_config_path: default_nginx_config_path(),
            base_port: default_base_port(),
            nvm_path: default_nvm_path(),
            registry_path: default_registry_path(),
            reload_command: default_reload_command(),
        }
    }
}

fn default_servers_dir() -> PathBuf {
    PathBuf::from("./servers")
}

fn default_nginx_config_path() -> PathBuf {
    PathBuf::from("/etc/nginx/nginx.conf")
}

fn default_base_port() -> u16 {
    2000
}

fn default_nvm_path() -> String {
    "~/.nvm/nvm.sh".to_string()
}

fn default_registry_path() -> PathBuf {
    PathBuf::from("./processes.json")
}

fn default_reload_command() -> Vec<String> {
    ["sudo", "systemctl", "restart", "nginx"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl RuntimeConfig {
    /// Load the configuration, falling back to defaults when the file does not exist.
    ///
    /// A file that exists but cannot be read or parsed is an error.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No configuration file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(Error::io(path, e)),
        };

        let config: RuntimeConfig = toml::from_str(&content).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the configuration file location from `SERMAN_CONFIG`
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.base_port == 0 {
            errors.push("base_port must be greater than 0".to_string());
        }
        if self.servers_dir.as_os_str().is_empty() {
            errors.push("servers_dir must not be empty".to_string());
        }

        if !errors.is_empty() {
            return Err(Error::InvalidConfig(errors.join("; ")));
        }
        Ok(())
    }

    /// The nvm script path with a leading `~/` expanded to the home directory
    pub fn nvm_script(&self) -> PathBuf {
        expand_home(&self.nvm_path)
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs_next::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
