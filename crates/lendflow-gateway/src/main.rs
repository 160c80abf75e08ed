//! Lendflow Gateway - loan origination over HTTP

use anyhow::Context;
use clap::{Parser, Subcommand};
use lendflow_core::{AuthMode, BindMode};
use lendflow_gateway::config::DEFAULT_CONFIG_PATH;
use lendflow_gateway::{start_gateway, LendflowConfig};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser)]
#[command(name = "lendflow-gateway", about = "Lendflow loan origination gateway")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
        #[arg(short, long)]
        port: Option<u16>,
        /// "loopback" or "lan"
        #[arg(short, long)]
        bind: Option<String>,
        /// Bearer token for the ledger endpoints
        #[arg(short, long)]
        token: Option<String>,
        #[arg(long)]
        no_auth: bool,
        #[arg(long)]
        ledger_dir: Option<PathBuf>,
        /// Keep artifacts in memory instead of pinning them remotely
        #[arg(long)]
        local_artifacts: bool,
        /// Also write logs to this file
        #[arg(long)]
        log_file: Option<PathBuf>,
        /// Emit JSON log lines on stdout
        #[arg(long)]
        json_logs: bool,
    },
    /// Show version
    Version,
}

fn init_tracing(log_file: Option<&Path>, json: bool) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "lendflow=info,tower_http=info".into());
    let stdout = if json {
        fmt::layer().json().boxed()
    } else {
        fmt::layer().boxed()
    };

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path.file_name().context("--log-file needs a file name")?;
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout)
        .with(file_layer)
        .init();
    Ok(guard)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve {
            config,
            port,
            bind,
            token,
            no_auth,
            ledger_dir,
            local_artifacts,
            log_file,
            json_logs,
        }) => {
            let _guard = init_tracing(log_file.as_deref(), json_logs)?;

            let mut settings = LendflowConfig::load(&config);
            if let Some(port) = port {
                settings.gateway.port = port;
            }
            if let Some(bind) = bind {
                settings.gateway.bind = BindMode::parse(&bind);
            }
            if token.is_some() {
                settings.gateway.auth.token = token;
            }
            if no_auth {
                settings.gateway.auth.mode = AuthMode::None;
            }
            if let Some(dir) = ledger_dir {
                settings.ledger.dir = dir;
            }

            start_gateway(settings, local_artifacts).await?;
        }

        Some(Commands::Version) | None => {
            println!("lendflow v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
