use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use reqwest::Client;

use crate::{
    job::{DoneResponse, JobStatus},
    task::TaskDescriptor,
    worker::{TaskRequest, WorkerId},
};

/// Host ficticio: con socket Unix la URL sólo aporta la ruta.
const BASE_URL: &str = "http://coordinator";

/// Cliente RPC del coordinator (HTTP sobre el socket Unix del job).
///
/// Cualquier fallo de transporte o status HTTP no exitoso se devuelve como
/// `Err`, separado de las respuestas de aplicación (`TaskDescriptor`, etc).
#[derive(Clone)]
pub struct CoordinatorClient {
    http: Client,
    socket: PathBuf,
}

impl CoordinatorClient {
    pub fn connect(socket: impl AsRef<Path>) -> Result<Self> {
        let socket = socket.as_ref().to_path_buf();
        let http = Client::builder()
            .unix_socket(socket.clone())
            .build()
            .context("no se pudo construir el cliente HTTP")?;

        Ok(Self { http, socket })
    }

    pub fn socket(&self) -> &Path {
        &self.socket
    }

    /// `GetTask`: pide trabajo para `worker_id`.
    pub async fn get_task(&self, worker_id: WorkerId) -> Result<TaskDescriptor> {
        let url = format!("{}/api/v1/tasks/next", BASE_URL);
        let resp = self
            .http
            .post(&url)
            .json(&TaskRequest { worker_id })
            .send()
            .await
            .with_context(|| format!("GetTask contra {}", self.socket.display()))?
            .error_for_status()?;

        Ok(resp.json().await?)
    }

    /// `IsDone`
    pub async fn is_done(&self) -> Result<bool> {
        let url = format!("{}/api/v1/done", BASE_URL);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("IsDone contra {}", self.socket.display()))?
            .error_for_status()?;

        let DoneResponse { done } = resp.json().await?;
        Ok(done)
    }

    pub async fn status(&self) -> Result<JobStatus> {
        let url = format!("{}/api/v1/status", BASE_URL);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("status contra {}", self.socket.display()))?
            .error_for_status()?;

        Ok(resp.json().await?)
    }
}
