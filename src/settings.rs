//! Per-project `.settings` files
//!
//! Each project directory may carry a line-oriented `KEY=VALUE` file. A
//! directory without one is not a managed project.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::path::Path;

/// Name of the settings file inside a project directory
pub const SETTINGS_FILE: &str = ".settings";

pub const KEY_SERVERLESS: &str = "SERVERLESS";
pub const KEY_PORT: &str = "PORT";
pub const KEY_START: &str = "START";
pub const KEY_MATCH: &str = "MATCH";

/// Parsed settings of one project, re-read on every run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerSettings {
    values: HashMap<String, String>,
}

impl ServerSettings {
    /// Read `<project_dir>/.settings`.
    ///
    /// Returns `Ok(None)` when the file does not exist.
    pub fn load(project_dir: &Path) -> Result<Option<Self>> {
        let path = project_dir.join(SETTINGS_FILE);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(Self::parse(&content))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io(&path, e)),
        }
    }

    /// Parse settings text. Later duplicates overwrite earlier ones.
    pub fn parse(content: &str) -> Self {
        let mut values = HashMap::new();
        for line in content.lines() {
            if line.trim_start().starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            values.insert(key.to_string(), unquote(value).to_string());
        }
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_string(), value.into());
    }

    /// Whether the project binds no port and gets no route
    pub fn is_serverless(&self) -> bool {
        self.get(KEY_SERVERLESS).is_some_and(|v| {
            let v = v.trim();
            v.eq_ignore_ascii_case("true") || v == "1" || v.eq_ignore_ascii_case("yes")
        })
    }

    pub fn start_command(&self) -> Option<&str> {
        self.get(KEY_START)
    }

    /// Hostname nginx should route to this project
    pub fn match_host(&self) -> Option<&str> {
        self.get(KEY_MATCH).filter(|host| !host.is_empty())
    }

    pub fn set_port(&mut self, port: u16) {
        self.set(KEY_PORT, port.to_string());
    }
}

/// Strip one matching pair of surrounding quotes
fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}
