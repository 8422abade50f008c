use serde::{Deserialize, Serialize};

/// Identidad de un worker: el pid del proceso.
pub type WorkerId = u32;

/// Cuerpo de `POST /api/v1/tasks/next`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    pub worker_id: WorkerId,
}
