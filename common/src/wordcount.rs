use crate::{apps::MapReduceApp, kv::KeyValue};

/// WordCount: `map` emite `(palabra, "1")` por cada palabra,
/// `reduce` devuelve cuántas veces apareció.
pub struct WordCount;

/// Parte el texto en palabras: cualquier carácter que no sea letra separa.
pub(crate) fn words(contents: &str) -> impl Iterator<Item = &str> {
    contents
        .split(|c: char| !c.is_alphabetic())
        .filter(|w| !w.is_empty())
}

impl MapReduceApp for WordCount {
    fn map(&self, _filename: &str, contents: &str) -> Vec<KeyValue> {
        words(contents).map(|w| KeyValue::new(w, "1")).collect()
    }

    fn reduce(&self, _key: &str, values: &[String]) -> String {
        values.len().to_string()
    }
}
