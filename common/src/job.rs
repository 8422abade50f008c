use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fase del job. No se guarda en ningún lado: se deriva de los contadores
/// y del tracker en cada consulta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Mapping,
    MapDraining,
    Reducing,
    ReduceDraining,
    Done,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoneResponse {
    pub done: bool,
}

/// Foto del estado del coordinator (`GET /api/v1/status`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatus {
    pub phase: Phase,

    pub total_maps: usize,
    pub maps_issued: usize,
    pub total_reduces: usize,
    pub reduces_issued: usize,

    /// Asignaciones vivas en el tracker
    pub in_flight: usize,
    /// Tareas reasignadas por timeout
    pub reassignments: u64,

    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}
