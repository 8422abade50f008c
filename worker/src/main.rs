mod worker;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use clap::Parser;
use common::{apps::APP_NAMES, CoordinatorClient};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::worker::{WorkerConfig, DEFAULT_IDLE_MS};

#[derive(Parser)]
#[command(name = "worker")]
#[command(about = "Worker map/reduce: pide tareas al coordinator hasta que el job termina")]
struct Args {
    /// Aplicación map/reduce a ejecutar (wc, indexer)
    #[arg(long, default_value = "wc")]
    app: String,

    /// Directorio donde se escriben intermedios y salidas
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// Ruta del socket (por defecto MR_SOCKET o /var/tmp/5840-mr-<uid>)
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Milisegundos de espera cuando no hay tareas
    #[arg(long, default_value_t = DEFAULT_IDLE_MS)]
    idle_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("worker=debug,common=info,reqwest=info")),
        )
        .init();

    let args = Args::parse();

    let app = common::app_by_name(&args.app).ok_or_else(|| {
        anyhow!(
            "aplicación desconocida '{}' (disponibles: {})",
            args.app,
            APP_NAMES.join(", ")
        )
    })?;

    // Nombre de host (solo para info)
    let hostname_str = hostname::get()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();

    let socket = args.socket.unwrap_or_else(common::coordinator_sock);
    let client = CoordinatorClient::connect(&socket)?;

    let cfg = WorkerConfig {
        worker_id: std::process::id(),
        app: Arc::from(app),
        work_dir: args.dir,
        idle: Duration::from_millis(args.idle_ms),
    };

    info!(
        "worker {} en {} con app={}",
        cfg.worker_id,
        hostname_str,
        args.app
    );

    if let Err(e) = worker::run(&client, &cfg).await {
        error!("worker {} termina: {:#}", cfg.worker_id, e);
        return Err(e);
    }
    Ok(())
}
