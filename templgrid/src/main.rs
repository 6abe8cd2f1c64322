//! templgrid: transactional email template service
//!
//! ```bash
//! templgrid generate -f templgrid.toml   # render, write outputs, sync
//! templgrid serve -f templgrid.toml      # HTTP send API and previews
//! templgrid version
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use templgrid::api::{ApiServer, Routes};
use templgrid::config::{AppConfig, LoggingConfig};
use templgrid::generator::{directory_input, Generator};
use templgrid::input::load_registry;
use templgrid::sender::{EmailQueue, SendGridMailer, SendWorker};
use templgrid::templates::TemplateRegistry;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "templgrid")]
#[command(about = "Transactional email templates", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render templates, write the enabled outputs and sync the remote store
    Generate {
        /// Configuration file
        #[arg(short = 'f', long = "config", default_value = "templgrid.toml")]
        config: PathBuf,
    },
    /// Run the HTTP server
    Serve {
        /// Configuration file
        #[arg(short = 'f', long = "config", default_value = "templgrid.toml")]
        config: PathBuf,
    },
    /// Print version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            println!("templgrid {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Generate { config } => {
            let config = load_config(&config)?;
            init_tracing(&config.logging);
            generate(config).await
        }
        Commands::Serve { config } => {
            let config = load_config(&config)?;
            init_tracing(&config.logging);
            serve(config).await
        }
    }
}

fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    AppConfig::load(path).with_context(|| format!("Failed to load configuration from {}", path.display()))
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("templgrid={},tower_http={}", logging.level, logging.level).into()
    });
    let registry = tracing_subscriber::registry().with(filter);

    if logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn generate(config: AppConfig) -> anyhow::Result<()> {
    info!("Starting templgrid generate v{}", env!("CARGO_PKG_VERSION"));

    let cancel = shutdown_token();
    let registry = Arc::new(TemplateRegistry::new());
    let mut generator = Generator::from_config(&config, registry);

    let summary = generator.generate(&cancel).await.context("Generation failed")?;

    if let Some(report) = summary.sync {
        for failure in &report.failures {
            error!("{}", failure);
        }
        if report.cancelled {
            anyhow::bail!("Synchronization cancelled");
        }
        if !report.failures.is_empty() {
            anyhow::bail!(
                "Synchronization finished with {} failed templates",
                report.failures.len()
            );
        }
        if !report.kept.is_empty() {
            warn!(
                "{} remote templates are not listed locally: {}",
                report.kept.len(),
                report.kept.join(", ")
            );
        }
    }

    Ok(())
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    info!("Starting templgrid server v{}", env!("CARGO_PKG_VERSION"));

    let registry = Arc::new(TemplateRegistry::new());
    load_registry(&directory_input(&config), &registry)
        .await
        .context("Failed to load templates")?;
    info!("Loaded {} email templates", registry.len());

    let cancel = shutdown_token();

    let (queue, worker) = if config.sender.enabled {
        let (queue, rx) = EmailQueue::bounded(config.server.queue_capacity);
        let mailer = SendGridMailer::new(config.sender.api_key.clone())
            .with_host(config.sender.host.clone());
        let worker = SendWorker::new(registry.clone(), Arc::new(mailer), config.sender.sandbox);
        let handle = tokio::spawn(worker.run(rx, cancel.clone()));
        (Some(queue), Some(handle))
    } else {
        (None, None)
    };

    let server = ApiServer::new(
        registry,
        queue,
        config.server.api_key.clone(),
        Routes {
            api: config.server.api_enabled,
            preview: config.server.preview_enabled,
        },
        config.server.listen_addr.clone(),
    );

    let result = server.run(cancel.clone()).await;
    cancel.cancel();

    if let Some(handle) = worker {
        if let Err(e) = handle.await {
            error!("Send worker task panic: {}", e);
        }
    }

    result.context("API server failed")?;
    info!("templgrid server stopped");
    Ok(())
}

/// Token cancelled on Ctrl-C or SIGTERM.
fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutdown signal received");
        trigger.cancel();
    });

    token
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(terminate) => terminate,
        Err(e) => {
            warn!("Failed to install SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
