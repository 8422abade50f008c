use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use coordinator::{
    handlers,
    state::{AppState, Coordinator},
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Tiempo sin volver a preguntar tras el cual una tarea se reasigna.
pub const DEFAULT_TASK_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_N_REDUCE: u32 = 10;

/// Cada cuánto se mira si el job terminó.
const DONE_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Parser)]
#[command(name = "coordinator")]
#[command(about = "Coordinator map/reduce: reparte tareas a los workers por un socket Unix")]
struct Args {
    /// Número de particiones de reduce
    #[arg(long, default_value_t = DEFAULT_N_REDUCE, value_parser = clap::value_parser!(u32).range(1..))]
    n_reduce: u32,

    /// Segundos sin re-poll para dar a un worker por muerto
    #[arg(long, default_value_t = DEFAULT_TASK_TIMEOUT_SECS)]
    task_timeout_secs: u64,

    /// Ruta del socket (por defecto MR_SOCKET o /var/tmp/5840-mr-<uid>)
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Archivos de entrada, una tarea de map por archivo
    #[arg(value_name = "FILES", required = true)]
    files: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("coordinator=debug,tower_http=info")),
        )
        .init();

    let args = Args::parse();
    let socket = args.socket.unwrap_or_else(common::coordinator_sock);
    let task_timeout = Duration::from_secs(args.task_timeout_secs);

    info!(
        "job con {} archivos de entrada, n_reduce={}, timeout={:?}",
        args.files.len(),
        args.n_reduce,
        task_timeout
    );

    let state = AppState::new(Coordinator::new(args.files, args.n_reduce as usize, task_timeout));

    // sin socket no hay job
    let listener = handlers::bind_socket(&socket)
        .with_context(|| format!("no se pudo escuchar en {}", socket.display()))?;
    info!("coordinator escuchando en {}", socket.display());

    let server = handlers::serve(listener, state.clone());
    let result = handlers::run_until_done(state, server, DONE_POLL_INTERVAL).await;

    match &result {
        Ok(status) => {
            info!(
                "job terminado: {} maps, {} reduces, {} reasignaciones",
                status.total_maps, status.total_reduces, status.reassignments
            );
            // margen para que los workers que estén preguntando reciban `stop`
            tokio::time::sleep(DONE_POLL_INTERVAL).await;
        }
        Err(e) => error!("coordinator abortado: {:#}", e),
    }

    if let Err(e) = std::fs::remove_file(&socket) {
        warn!("no se pudo borrar {}: {}", socket.display(), e);
    }
    result.map(|_| ())
}
