use serman::config::RuntimeConfig;
use serman::fleet::{Fleet, Mode};
use tracing::{error, info};

const PKG_NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize logging on stderr; stdout carries the status lines
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("serman=info")),
        )
        .init();

    let Some(command) = std::env::args().nth(1) else {
        println!("Usage: {} [start|stop]", PKG_NAME);
        return Ok(());
    };
    let mode = Mode::from_arg(&command);

    // Load configuration
    let config_path = RuntimeConfig::default_path();
    let config = RuntimeConfig::load(&config_path).map_err(|e| {
        error!(path = %config_path.display(), error = %e, "Failed to load configuration");
        e
    })?;

    print_startup_banner(&config, mode);

    let mut fleet = Fleet::load(config).map_err(|e| {
        error!(error = %e, "Failed to load process registry");
        e
    })?;

    let summary = fleet.run(mode).await;

    info!(
        started = summary.projects.iter().filter(|p| p.started.is_some()).count(),
        stopped = summary.projects.iter().map(|p| p.stopped).sum::<usize>(),
        tracked = fleet.registry().len(),
        "Finished"
    );
    Ok(())
}

fn print_startup_banner(config: &RuntimeConfig, mode: Mode) {
    info!(name = PKG_NAME, version = VERSION, ?mode, "Reconciling servers");
    info!(
        servers_dir = %config.servers_dir.display(),
        base_port = config.base_port,
        registry = %config.registry_path.display(),
        "Server settings"
    );
    info!(
        nginx_config = %config.nginx_config_path.display(),
        reload = %config.reload_command.join(" "),
        nvm = %config.nvm_script().display(),
        "Proxy settings"
    );
}
