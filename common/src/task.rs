use serde::{Deserialize, Serialize};

/// Respuesta del coordinator a `GetTask`: exactamente una variante por respuesta.
///
/// En JSON va etiquetada por `"type"`, ej: `{"type":"reduce","partition_index":3}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskDescriptor {
    Map {
        /// Archivo de entrada tal como lo recibió el coordinator
        input_file: String,
        /// Número de particiones de reduce (nReduce)
        reduce_partitions: u32,
    },
    Reduce {
        partition_index: u32,
    },
    /// No hay trabajo ahora, volver a preguntar más tarde
    Idle,
    /// El job terminó, el worker debe salir
    Stop,
    /// Cualquier etiqueta desconocida; el worker la trata igual que `Stop`
    #[serde(other)]
    Unknown,
}

impl TaskDescriptor {
    pub fn kind(&self) -> &'static str {
        match self {
            TaskDescriptor::Map { .. } => "map",
            TaskDescriptor::Reduce { .. } => "reduce",
            TaskDescriptor::Idle => "idle",
            TaskDescriptor::Stop => "stop",
            TaskDescriptor::Unknown => "unknown",
        }
    }
}
