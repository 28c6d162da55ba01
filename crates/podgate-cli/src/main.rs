//! podgate: validate placement-extension config and drive cycles locally.
//!
//! # Usage
//!
//! ```text
//! podgate check-config --config podgate.toml
//! podgate simulate --config podgate.toml --cluster cluster.toml --workload default/web-0
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use podgate_core::PodgateConfig;
use podgate_plugin::{CallContext, CapacityGate, Handle, Registry};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod cycle;
mod manifest;

use cycle::CycleDriver;
use manifest::ClusterManifest;

#[derive(Parser)]
#[command(
    name = "podgate",
    about = "Capacity-gated placement extension",
    version,
    propagate_version = true
)]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse and validate a config file, then print the effective config.
    CheckConfig {
        /// Config file (built-in defaults when omitted).
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Run one placement cycle for a pending workload from a cluster manifest.
    Simulate {
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Cluster manifest (TOML, or JSON with a `.json` extension).
        #[arg(long)]
        cluster: PathBuf,

        /// Pending workload as `namespace/name`.
        #[arg(short, long)]
        workload: String,

        /// Give up on a waiting binding after this many seconds.
        #[arg(long, default_value = "60")]
        permit_timeout: u64,

        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::CheckConfig { config } => check_config(config.as_deref()),
        Command::Simulate {
            config,
            cluster,
            workload,
            permit_timeout,
            format,
        } => {
            simulate(
                config.as_deref(),
                &cluster,
                &workload,
                Duration::from_secs(permit_timeout),
                format,
            )
            .await
        }
    }
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,podgate=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<PodgateConfig> {
    let config = match path {
        Some(path) => PodgateConfig::from_file(path)?,
        None => {
            let config = PodgateConfig::default();
            config.validate()?;
            config
        }
    };
    Ok(config)
}

fn check_config(path: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(path)?;
    let registry = Registry::with_defaults();
    if !registry.contains(&config.scheduler_name) {
        info!(
            name = %config.scheduler_name,
            "scheduler name is not a built-in plugin name; workloads must reference it explicitly"
        );
    }
    print!("{}", config.to_toml_string()?);
    println!("✓ config valid");
    Ok(())
}

async fn simulate(
    config: Option<&Path>,
    cluster: &Path,
    workload: &str,
    permit_timeout: Duration,
    format: Format,
) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let manifest = ClusterManifest::from_file(cluster)?;
    let workload = manifest.pending_workload(workload)?;
    let store = Arc::new(manifest.into_store()?);

    let handle = Handle::new(store.clone(), store.clone());
    let plugin = CapacityGate::from_config(&config, &handle)?;

    let token = CancellationToken::new();
    let ctrl_c = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, cancelling cycle");
            ctrl_c.cancel();
        }
    });
    let ctx = CallContext::new().with_cancellation(token);

    let driver = CycleDriver::new(&plugin, store.as_ref(), permit_timeout);
    let outcome = driver.run(&ctx, workload).await?;

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
        Format::Text => println!("{}: {outcome}", workload.key()),
    }
    Ok(())
}
