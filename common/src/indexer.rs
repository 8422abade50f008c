use std::collections::BTreeSet;

use crate::{apps::MapReduceApp, kv::KeyValue, wordcount::words};

/// Índice invertido: para cada palabra, en qué documentos aparece.
pub struct Indexer;

impl MapReduceApp for Indexer {
    fn map(&self, filename: &str, contents: &str) -> Vec<KeyValue> {
        // una sola emisión por palabra distinta dentro del documento
        let distinct: BTreeSet<&str> = words(contents).collect();
        distinct
            .into_iter()
            .map(|w| KeyValue::new(w, filename))
            .collect()
    }

    /// Salida: `"<n> doc1,doc2,..."` con los documentos ordenados.
    fn reduce(&self, _key: &str, values: &[String]) -> String {
        let docs: BTreeSet<&str> = values.iter().map(String::as_str).collect();
        let joined: Vec<&str> = docs.into_iter().collect();
        format!("{} {}", joined.len(), joined.join(","))
    }
}
