//! Shell preparation run before a server's start command

use std::path::{Path, PathBuf};

/// Marker file that pins a project's Node.js version
pub const NVMRC_FILE: &str = ".nvmrc";

/// Produces an optional shell prefix for a command launched in `working_dir`.
///
/// The prefix is joined to the start command as-is, so it must end with a
/// command separator such as `&& `.
pub trait EnvironmentPreparer: Send + Sync {
    fn prefix(&self, working_dir: &Path) -> Option<String>;

    /// The full shell line to run for `command`
    fn prepare(&self, command: &str, working_dir: &Path) -> String {
        match self.prefix(working_dir) {
            Some(prefix) => format!("{}{}", prefix, command),
            None => command.to_string(),
        }
    }
}

/// Activates nvm and runs `nvm use` when the project has an `.nvmrc`
#[derive(Debug, Clone)]
pub struct NvmActivation {
    script: PathBuf,
}

impl NvmActivation {
    pub fn new(script: impl Into<PathBuf>) -> Self {
        Self {
            script: script.into(),
        }
    }
}

impl EnvironmentPreparer for NvmActivation {
    fn prefix(&self, working_dir: &Path) -> Option<String> {
        if !working_dir.join(NVMRC_FILE).is_file() {
            return None;
        }
        let script = self.script.to_string_lossy();
        Some(format!(
            "source {} && nvm use && ",
            shell_words::quote(&script)
        ))
    }
}

/// Runs start commands unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPreparation;

impl EnvironmentPreparer for NoPreparation {
    fn prefix(&self, _working_dir: &Path) -> Option<String> {
        None
    }
}
