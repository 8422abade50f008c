use crate::{indexer::Indexer, kv::KeyValue, wordcount::WordCount};

/// Lógica de negocio de un job: la ejecuta el worker, el coordinator
/// nunca la ve.
///
/// Ambas funciones pueden ejecutarse más de una vez para la misma entrada
/// (una tarea reasignada por timeout se vuelve a ejecutar en otro worker),
/// así que tienen que ser deterministas.
pub trait MapReduceApp: Send + Sync {
    fn map(&self, filename: &str, contents: &str) -> Vec<KeyValue>;
    fn reduce(&self, key: &str, values: &[String]) -> String;
}

/// Aplicaciones incluidas, seleccionables por nombre desde la CLI del worker.
pub const APP_NAMES: &[&str] = &["wc", "indexer"];

pub fn app_by_name(name: &str) -> Option<Box<dyn MapReduceApp>> {
    match name {
        "wc" | "wordcount" => Some(Box::new(WordCount)),
        "indexer" => Some(Box::new(Indexer)),
        _ => None,
    }
}
