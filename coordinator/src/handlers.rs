use std::{future::Future, io, path::Path, time::Duration};

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use anyhow::{anyhow, Context, Result};
use common::{DoneResponse, JobStatus, TaskDescriptor, TaskRequest};
use tokio::net::UnixListener;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/tasks/next", post(get_task))
        .route("/api/v1/done", get(is_done))
        .route("/api/v1/status", get(job_status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Abre el socket Unix del coordinator. Si quedó un socket viejo de otra
/// ejecución se borra antes de hacer bind.
pub fn bind_socket(path: &Path) -> io::Result<UnixListener> {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    UnixListener::bind(path)
}

/// Sirve el router sobre `listener` hasta que falle.
pub async fn serve(listener: UnixListener, state: AppState) -> io::Result<()> {
    axum::serve(listener, build_router(state)).await
}

/// Espera a que el job termine mirando `is_done` cada `poll`, mientras
/// vigila el servidor. Si el servidor termina antes que el job (con error,
/// panic o sin él) se devuelve `Err`: sin servidor nadie puede terminarlo.
pub async fn run_until_done<S>(state: AppState, server: S, poll: Duration) -> Result<JobStatus>
where
    S: Future<Output = io::Result<()>> + Send + 'static,
{
    let mut server = tokio::spawn(server);

    loop {
        if state.coordinator.is_done() {
            return Ok(state.coordinator.status());
        }

        tokio::select! {
            res = &mut server => {
                return match res {
                    Ok(Ok(())) => Err(anyhow!("el servidor RPC terminó antes que el job")),
                    Ok(Err(e)) => Err(e).context("el servidor RPC falló"),
                    Err(e) => Err(e).context("la tarea del servidor RPC no terminó bien"),
                };
            }
            _ = tokio::time::sleep(poll) => {}
        }
    }
}

/* ---------------- handlers HTTP ---------------- */

async fn health() -> &'static str {
    "ok"
}

// GetTask: el único RPC que cambia estado
async fn get_task(
    State(state): State<AppState>,
    Json(req): Json<TaskRequest>,
) -> Json<TaskDescriptor> {
    Json(state.coordinator.get_task(req.worker_id))
}

async fn is_done(State(state): State<AppState>) -> Json<DoneResponse> {
    Json(DoneResponse {
        done: state.coordinator.is_done(),
    })
}

async fn job_status(State(state): State<AppState>) -> Json<JobStatus> {
    Json(state.coordinator.status())
}
