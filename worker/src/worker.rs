use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use common::{engine, CoordinatorClient, MapReduceApp, TaskDescriptor, WorkerId};
use tokio::time::sleep;
use tracing::{debug, info};

pub const DEFAULT_IDLE_MS: u64 = 1000;

/// Qué hacer después de procesar una respuesta del coordinator.
#[derive(Debug, PartialEq, Eq)]
pub enum Flow {
    /// volver a pedir tarea
    Poll,
    /// salir del loop
    Stop,
}

pub struct WorkerConfig {
    /// Identidad ante el coordinator (el pid en el binario)
    pub worker_id: WorkerId,
    pub app: Arc<dyn MapReduceApp>,
    /// Directorio de intermedios y salidas
    pub work_dir: PathBuf,
    /// Espera ante `Idle` antes de volver a preguntar
    pub idle: Duration,
}

/// Loop principal del worker:
/// - pide tarea con `cfg.worker_id` como identidad
/// - la ejecuta
/// - vuelve a pedir (ese nuevo pedido es la única señal de que terminó)
///
/// Un fallo de transporte o de E/S termina el loop con `Err` sin volver a
/// preguntar: la tarea queda en vuelo en el coordinator y otro worker la
/// recibe cuando venza el timeout.
pub async fn run(client: &CoordinatorClient, cfg: &WorkerConfig) -> Result<()> {
    let worker_id = cfg.worker_id;
    info!(
        "worker {} pidiendo tareas en {} (dir={})",
        worker_id,
        client.socket().display(),
        cfg.work_dir.display()
    );

    loop {
        let task = client
            .get_task(worker_id)
            .await
            .context("GetTask falló, no se puede avanzar sin el coordinator")?;

        debug!("worker {}: recibió {}", worker_id, task.kind());

        if execute(cfg, task).await? == Flow::Stop {
            info!("worker {}: job terminado, salgo", worker_id);
            return Ok(());
        }
    }
}

/// Ejecuta una respuesta de `GetTask`. Map y reduce corren en un hilo de
/// bloqueo (leen y escriben archivos enteros).
pub async fn execute(cfg: &WorkerConfig, task: TaskDescriptor) -> Result<Flow> {
    let worker_id = cfg.worker_id;
    match task {
        TaskDescriptor::Map {
            input_file,
            reduce_partitions,
        } => {
            info!("worker {}: map de {} ({} particiones)", worker_id, input_file, reduce_partitions);

            let app = Arc::clone(&cfg.app);
            let dir = cfg.work_dir.clone();
            let file = input_file.clone();
            let outcome = tokio::task::spawn_blocking(move || {
                engine::run_map(app.as_ref(), &file, reduce_partitions, &dir)
            })
            .await
            .context("panic o join error en map")?
            .with_context(|| format!("map de {} falló", input_file))?;

            info!(
                "worker {}: map de {} listo ({} pares, {} archivos escritos, {} ya existían)",
                worker_id,
                input_file,
                outcome.records,
                outcome.written.len(),
                outcome.skipped.len()
            );
            Ok(Flow::Poll)
        }

        TaskDescriptor::Reduce { partition_index } => {
            info!("worker {}: reduce de la partición {}", worker_id, partition_index);

            let app = Arc::clone(&cfg.app);
            let dir = cfg.work_dir.clone();
            let outcome = tokio::task::spawn_blocking(move || {
                engine::run_reduce(app.as_ref(), partition_index, &dir)
            })
            .await
            .context("panic o join error en reduce")?
            .with_context(|| format!("reduce de la partición {} falló", partition_index))?;

            info!(
                "worker {}: reduce {} listo ({} intermedios, {} claves -> {})",
                worker_id,
                partition_index,
                outcome.inputs,
                outcome.keys,
                outcome.output.display()
            );
            Ok(Flow::Poll)
        }

        TaskDescriptor::Idle => {
            debug!("worker {}: no hay tareas, esperando {:?}", worker_id, cfg.idle);
            sleep(cfg.idle).await;
            Ok(Flow::Poll)
        }

        TaskDescriptor::Stop | TaskDescriptor::Unknown => Ok(Flow::Stop),
    }
}
