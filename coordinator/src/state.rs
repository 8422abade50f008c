// coordinator/src/state.rs

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use common::{JobStatus, Phase, TaskDescriptor, WorkerId};
use tracing::{debug, info, warn};

use crate::tracker::{Assignment, InFlightTracker, TaskRef};

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
}

impl AppState {
    pub fn new(coordinator: Coordinator) -> Self {
        Self {
            coordinator: Arc::new(coordinator),
        }
    }
}

/// Estado del job. Vive detrás del mutex de `Coordinator`.
#[derive(Debug)]
struct JobState {
    input_files: Vec<String>,
    n_reduce: usize,

    // cuántas tareas *nuevas* se han repartido en cada fase (no cuántas terminaron)
    next_map: usize,
    next_reduce: usize,

    // tareas ya asignadas pero no retiradas
    tracker: InFlightTracker,

    // Métricas
    reassignments: u64,
    last_phase: Phase,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl JobState {
    fn phase(&self) -> Phase {
        if self.next_map < self.input_files.len() {
            Phase::Mapping
        } else if self.next_reduce == 0 && !self.tracker.is_empty() {
            Phase::MapDraining
        } else if self.next_reduce < self.n_reduce {
            Phase::Reducing
        } else if !self.tracker.is_empty() {
            Phase::ReduceDraining
        } else {
            Phase::Done
        }
    }

    /// Calcula la fase y deja constancia si cambió.
    fn observe_phase(&mut self) -> Phase {
        let phase = self.phase();
        if phase != self.last_phase {
            info!("fase {:?} -> {:?}", self.last_phase, phase);
            self.last_phase = phase;
        }
        if phase == Phase::Done && self.finished_at.is_none() {
            self.finished_at = Some(Utc::now());
        }
        phase
    }

    /// Si la asignación más antigua lleva `timeout` o más sin que su worker
    /// vuelva a preguntar, la saca del tracker y la devuelve.
    fn take_stale(&mut self, now: Instant, timeout: Duration) -> Option<Assignment> {
        let oldest = *self.tracker.oldest()?;
        if now.saturating_duration_since(oldest.assigned_at) < timeout {
            return None;
        }
        self.tracker.evict(oldest.worker_id)
    }

    fn fresh_task(&mut self, phase: Phase) -> TaskRef {
        match phase {
            Phase::Mapping => {
                let idx = self.next_map;
                self.next_map += 1;
                TaskRef::Map(idx)
            }
            _ => {
                let idx = self.next_reduce;
                self.next_reduce += 1;
                TaskRef::Reduce(idx)
            }
        }
    }

    /// Asigna `task` a `worker_id` y arma la respuesta.
    fn assign(&mut self, worker_id: WorkerId, task: TaskRef, now: Instant) -> TaskDescriptor {
        self.tracker.upsert(worker_id, task, now);
        self.describe(task)
    }

    fn reassign(&mut self, worker_id: WorkerId, stale: Assignment, now: Instant) -> TaskDescriptor {
        self.reassignments += 1;
        warn!(
            "worker {} sin responder hace {:?}, reasignando {:?} al worker {}",
            stale.worker_id,
            now.saturating_duration_since(stale.assigned_at),
            stale.task,
            worker_id
        );
        self.assign(worker_id, stale.task, now)
    }

    fn describe(&self, task: TaskRef) -> TaskDescriptor {
        match task {
            TaskRef::Map(idx) => TaskDescriptor::Map {
                input_file: self.input_files[idx].clone(),
                reduce_partitions: self.n_reduce as u32,
            },
            TaskRef::Reduce(idx) => TaskDescriptor::Reduce {
                partition_index: idx as u32,
            },
        }
    }
}

/// Coordinator de un job map/reduce.
///
/// Todo el estado (contadores + tracker) está bajo un único mutex que se
/// toma durante el cuerpo completo de cada operación.
pub struct Coordinator {
    state: Mutex<JobState>,
    task_timeout: Duration,
}

impl Coordinator {
    /// `n_reduce` se fuerza a 1 como mínimo.
    pub fn new(input_files: Vec<String>, n_reduce: usize, task_timeout: Duration) -> Self {
        let state = JobState {
            input_files,
            n_reduce: n_reduce.max(1),
            next_map: 0,
            next_reduce: 0,
            tracker: InFlightTracker::new(),
            reassignments: 0,
            last_phase: Phase::Mapping,
            started_at: Utc::now(),
            finished_at: None,
        };

        Self {
            state: Mutex::new(state),
            task_timeout,
        }
    }

    // Ninguna operación deja el estado a medias entre dos sentencias que
    // puedan hacer panic, así que un lock envenenado se puede seguir usando.
    fn lock(&self) -> MutexGuard<'_, JobState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `GetTask` con el reloj actual.
    pub fn get_task(&self, worker_id: WorkerId) -> TaskDescriptor {
        self.get_task_at(worker_id, Instant::now())
    }

    /// `GetTask` con un instante explícito.
    ///
    /// 1. El worker que pregunta retira su asignación anterior (si tenía).
    /// 2. Según la fase: reasignar la tarea más antigua si está vencida,
    ///    repartir una nueva, mandar a esperar (`Idle`) o a terminar (`Stop`).
    pub fn get_task_at(&self, worker_id: WorkerId, now: Instant) -> TaskDescriptor {
        let timeout = self.task_timeout;
        let mut st = self.lock();

        if let Some(prev) = st.tracker.evict(worker_id) {
            debug!("worker {} volvió a preguntar, retiro {:?}", worker_id, prev.task);
        }

        let reply = match st.observe_phase() {
            phase @ (Phase::Mapping | Phase::Reducing) => match st.take_stale(now, timeout) {
                Some(stale) => st.reassign(worker_id, stale, now),
                None => {
                    let task = st.fresh_task(phase);
                    st.assign(worker_id, task, now)
                }
            },
            Phase::MapDraining | Phase::ReduceDraining => match st.take_stale(now, timeout) {
                Some(stale) => st.reassign(worker_id, stale, now),
                None => TaskDescriptor::Idle,
            },
            Phase::Done => TaskDescriptor::Stop,
        };

        match &reply {
            TaskDescriptor::Idle => debug!(
                "worker {} sin tarea ({} en vuelo), que espere",
                worker_id,
                st.tracker.len()
            ),
            TaskDescriptor::Stop => debug!("worker {}: job terminado, stop", worker_id),
            other => info!(
                "asignando {:?} al worker {} ({} en vuelo)",
                other,
                worker_id,
                st.tracker.len()
            ),
        }

        st.observe_phase();
        reply
    }

    /// `IsDone`: todas las tareas repartidas y ninguna en vuelo.
    pub fn is_done(&self) -> bool {
        let mut st = self.lock();
        st.observe_phase() == Phase::Done
    }

    #[cfg(test)]
    pub fn phase(&self) -> Phase {
        self.lock().observe_phase()
    }

    pub fn status(&self) -> JobStatus {
        let mut st = self.lock();
        let phase = st.observe_phase();

        JobStatus {
            phase,
            total_maps: st.input_files.len(),
            maps_issued: st.next_map,
            total_reduces: st.n_reduce,
            reduces_issued: st.next_reduce,
            in_flight: st.tracker.len(),
            reassignments: st.reassignments,
            started_at: st.started_at,
            finished_at: st.finished_at,
        }
    }
}
