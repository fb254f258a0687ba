//! nginx configuration generation
//!
//! The whole file is rendered from scratch on every start run: a fixed set of
//! top-level directives plus one `server` block per route.

use crate::error::{Error, Result};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{info, warn};

/// A hostname forwarded to a local port
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProxyRoute {
    pub hostname: String,
    pub port: u16,
}

impl ProxyRoute {
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        Self {
            hostname: hostname.into(),
            port,
        }
    }

    /// The `server { ... }` block for this route
    pub fn server_block(&self) -> String {
        format!(
            r#"server {{
    listen 80;
    server_name {host};
    location / {{
        proxy_pass http://localhost:{port};
        proxy_set_header Host $host;
        proxy_set_header X-Real-IP $remote_addr;
        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;
    }}
}}"#,
            host = self.hostname,
            port = self.port
        )
    }
}

/// Render a complete nginx.conf for `routes`, in order
pub fn render(routes: &[ProxyRoute]) -> String {
    let mut servers = String::new();
    for route in routes {
        let _ = writeln!(servers, "{}", route.server_block());
    }

    format!(
        r#"user www-data;
worker_processes auto;
pid /run/nginx.pid;
include /etc/nginx/modules-enabled/*.conf;

events {{
    worker_connections 768;
}}

http {{
    large_client_header_buffers 4 16k;
{servers}}}
"#
    )
}

/// Writes the generated config and reloads nginx
#[derive(Debug, Clone)]
pub struct NginxWriter {
    config_path: PathBuf,
    reload_command: Vec<String>,
}

impl NginxWriter {
    pub fn new(config_path: impl Into<PathBuf>, reload_command: Vec<String>) -> Self {
        Self {
            config_path: config_path.into(),
            reload_command,
        }
    }

    /// Overwrite the config file with `routes`
    pub fn write(&self, routes: &[ProxyRoute]) -> Result<()> {
        std::fs::write(&self.config_path, render(routes))
            .map_err(|e| Error::io(&self.config_path, e))?;
        info!(path = %self.config_path.display(), routes = routes.len(), "Wrote nginx configuration");
        Ok(())
    }

    /// Run the reload command, if one is configured
    pub async fn reload(&self) -> Result<()> {
        let Some((program, args)) = self.reload_command.split_first() else {
            return Ok(());
        };

        let status = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|e| Error::io(program, e))?;

        if !status.success() {
            warn!(command = %self.reload_command.join(" "), %status, "nginx reload command failed");
        }
        Ok(())
    }

    /// Write the config then reload nginx.
    ///
    /// Only a failed write is an error; a failed reload is logged since the
    /// new config is already in place for the next reload.
    pub async fn apply(&self, routes: &[ProxyRoute]) -> Result<()> {
        self.write(routes)?;
        if let Err(e) = self.reload().await {
            warn!(error = %e, "Failed to reload nginx");
        }
        Ok(())
    }
}
