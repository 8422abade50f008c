use std::{env, fs, os::unix::fs::MetadataExt, path::PathBuf};

/// Variable de entorno que fuerza la ruta del socket del coordinator.
pub const SOCKET_ENV: &str = "MR_SOCKET";

const SOCKET_PREFIX: &str = "/var/tmp/5840-mr-";

/// Ruta del socket Unix donde escucha el coordinator.
///
/// - Si `MR_SOCKET` está definida, se usa tal cual.
/// - Si no: `/var/tmp/5840-mr-<uid>`, así dos usuarios en la misma máquina
///   no chocan. No usamos el directorio actual porque algunos FS en red
///   no soportan sockets Unix.
pub fn coordinator_sock() -> PathBuf {
    if let Ok(path) = env::var(SOCKET_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }
    PathBuf::from(format!("{}{}", SOCKET_PREFIX, current_uid()))
}

/// uid del usuario que corre el proceso (dueño de /proc/self).
fn current_uid() -> u32 {
    fs::metadata("/proc/self")
        .or_else(|_| fs::metadata(env::var("HOME").unwrap_or_default()))
        .map(|m| m.uid())
        .unwrap_or(0)
}
