use std::hash::Hasher;

use fnv::FnvHasher;
use serde::{Deserialize, Serialize};

/// Par clave/valor emitido por `map` y consumido por `reduce`.
/// En los archivos intermedios va un objeto JSON por línea.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Hash de una clave intermedia, sin el bit de signo.
/// La partición de una clave es `ihash(key) % reduce_partitions`.
///
/// FNV-1a es estable entre procesos (a diferencia de `DefaultHasher`, que
/// no garantiza nada entre versiones de Rust), así que dos workers siempre
/// mandan la misma clave a la misma partición.
pub fn ihash(key: &str) -> u32 {
    let mut hasher = FnvHasher::default();
    hasher.write(key.as_bytes());
    (hasher.finish() & 0x7fff_ffff) as u32
}

/// Partición de reduce a la que va `key`.
pub fn partition_for(key: &str, reduce_partitions: u32) -> u32 {
    ihash(key) % reduce_partitions.max(1)
}
