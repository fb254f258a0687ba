//! Serman - a supervisor for a directory of local servers
//!
//! This library provides a one-shot reconciler that:
//! - Scans a servers directory for projects carrying a `.settings` file
//! - Starts each project's command through a shell, or stops what it started earlier
//! - Records started processes in a registry file that survives between runs
//! - Hands out sequential ports to projects that are not serverless
//! - Regenerates the nginx configuration routing each project's hostname to its port

pub mod config;
pub mod environment;
pub mod error;
pub mod fleet;
pub mod nginx;
pub mod ports;
pub mod registry;
pub mod settings;
pub mod signal;
pub mod supervisor;
