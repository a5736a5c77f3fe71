mod admin;
mod app;
mod cli;
mod config;

use admin::Credentials;
use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use config::AppConfig;
use locex_client::ApiClient;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

const LOG_TARGETS: [&str; 6] = [
    "locex",
    "locex_experiment",
    "locex_client",
    "locex_audio",
    "locex_render",
    "locex_core",
];

/// Filter used when `RUST_LOG` is unset: our crates at `level`, others at warn.
fn default_filter(level: &str) -> String {
    let mut directives = vec!["warn".to_owned()];
    directives.extend(LOG_TARGETS.iter().map(|t| format!("{t}={level}")));
    directives.join(",")
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter(level)))
        .unwrap_or_else(|_| EnvFilter::new(default_filter("info")));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?.with_overrides(&cli);
    init_tracing(&config.log_level);

    info!(
        "Starting locex v{} ({} {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    );
    info!(api = %config.api.base_url, "Backend");

    let credentials = Credentials {
        username: config.api.username.clone(),
        password: cli.password.clone(),
    };
    let client = ApiClient::new(&config.api.base_url).context("invalid backend URL")?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start I/O runtime")?;

    match cli.command {
        Command::Run(args) => app::App::new(config, args, credentials, client, runtime).run(),
        Command::Auth { action } => runtime.block_on(admin::auth(&client, &credentials, action)),
        Command::Experiments { action } => {
            runtime.block_on(admin::experiments(&client, &credentials, action))
        }
        Command::Samples { action } => {
            runtime.block_on(admin::samples(&client, &credentials, action))
        }
        Command::Results { action } => runtime.block_on(admin::results(&client, action)),
    }
}
