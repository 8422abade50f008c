use std::{
    collections::BTreeMap,
    fs::{self, File},
    hash::Hasher,
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use fnv::FnvHasher;
use glob::{glob, Pattern};
use tracing::debug;

use crate::{
    apps::MapReduceApp,
    kv::{partition_for, KeyValue},
};

/* =========================
   Nombres de archivos
   ========================= */

/// Archivo intermedio de la partición `partition` para un archivo de entrada:
/// `mr-<partition>-<basename>-<fnv64 de la ruta completa>.json`.
///
/// El hash distingue entradas con el mismo nombre en directorios distintos.
pub fn intermediate_name(partition: u32, input_file: &str) -> String {
    let base = Path::new(input_file)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("nofile");

    let mut hasher = FnvHasher::default();
    hasher.write(input_file.as_bytes());
    format!("mr-{}-{}-{:016x}.json", partition, base, hasher.finish())
}

/// Archivo final de una partición de reduce: `mr-out-<partition>`.
pub fn output_name(partition: u32) -> String {
    format!("mr-out-{}", partition)
}

/// Archivo temporal en el mismo directorio que el destino (para que el
/// link/rename final no cruce de filesystem). Empieza por '.' para que el
/// glob de reduce nunca lo vea.
fn temp_path(dir: &Path, final_name: &str) -> PathBuf {
    dir.join(format!(".tmp-{}-{}", std::process::id(), final_name))
}

/* =========================
   MAP
   ========================= */

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MapOutcome {
    /// Pares emitidos por `map`
    pub records: usize,
    /// Archivos intermedios que escribió esta ejecución
    pub written: Vec<PathBuf>,
    /// Archivos que ya existían (otra ejecución de la misma tarea llegó antes)
    pub skipped: Vec<PathBuf>,
}

/// Ejecuta una tarea de map:
///   1. lee `input_file` entero y aplica `app.map`
///   2. reparte los pares por `ihash(key) % reduce_partitions`
///   3. escribe cada partición no vacía en `work_dir/mr-<p>-<archivo>.json`
///
/// Si el archivo de una partición ya existe no se toca: gana el primero que
/// lo publicó y el resto descarta su salida sin error.
pub fn run_map(
    app: &dyn MapReduceApp,
    input_file: &str,
    reduce_partitions: u32,
    work_dir: &Path,
) -> io::Result<MapOutcome> {
    let raw = fs::read(input_file)?;
    let contents = String::from_utf8_lossy(&raw);

    let kvs = app.map(input_file, &contents);
    let mut outcome = MapOutcome {
        records: kvs.len(),
        ..Default::default()
    };

    let mut buckets: BTreeMap<u32, Vec<KeyValue>> = BTreeMap::new();
    for kv in kvs {
        let p = partition_for(&kv.key, reduce_partitions);
        buckets.entry(p).or_default().push(kv);
    }

    fs::create_dir_all(work_dir)?;

    for (partition, chunk) in buckets {
        let name = intermediate_name(partition, input_file);
        let final_path = work_dir.join(&name);

        if final_path.exists() {
            debug!("{} ya existe, no lo recreo", final_path.display());
            outcome.skipped.push(final_path);
            continue;
        }

        let tmp = temp_path(work_dir, &name);
        if let Err(e) = write_records(&tmp, &chunk) {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }

        if publish_if_absent(&tmp, &final_path)? {
            outcome.written.push(final_path);
        } else {
            debug!("otra ejecución publicó {} antes", final_path.display());
            outcome.skipped.push(final_path);
        }
    }

    Ok(outcome)
}

/// Escribe los pares como JSONL (un objeto por línea).
fn write_records(path: &Path, records: &[KeyValue]) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for kv in records {
        serde_json::to_writer(&mut writer, kv)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()
}

/// Publica `tmp` como `final_path` sólo si este último no existe.
/// El hard link falla con `AlreadyExists` si alguien llegó antes; el
/// temporal se borra siempre. Devuelve `true` si publicamos nosotros.
fn publish_if_absent(tmp: &Path, final_path: &Path) -> io::Result<bool> {
    let res = fs::hard_link(tmp, final_path);
    let _ = fs::remove_file(tmp);

    match res {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e),
    }
}

/* =========================
   REDUCE
   ========================= */

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReduceOutcome {
    /// Archivos intermedios leídos
    pub inputs: usize,
    /// Claves distintas escritas
    pub keys: usize,
    pub output: PathBuf,
}

/// Lista los archivos intermedios de una partición (de todos los maps),
/// ordenados por nombre.
pub fn intermediate_files(partition: u32, work_dir: &Path) -> io::Result<Vec<PathBuf>> {
    let dir = Pattern::escape(&work_dir.to_string_lossy());
    let pattern = format!("{}/mr-{}-*.json", dir, partition);

    let entries = glob(&pattern)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| e.into_error())?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Lee un archivo intermedio (JSONL). Las líneas vacías se ignoran,
/// una línea que no sea un `KeyValue` es `InvalidData`.
pub fn read_records(path: &Path) -> io::Result<Vec<KeyValue>> {
    let reader = BufReader::new(File::open(path)?);

    let mut out = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let kv: KeyValue = serde_json::from_str(&line)?;
        out.push(kv);
    }

    Ok(out)
}

/// Ejecuta una tarea de reduce:
///   1. junta los registros de todos los `mr-<p>-*.json`
///   2. ordena por clave y agrupa claves iguales consecutivas
///   3. escribe `"<clave> <valor reducido>"` por clave en `mr-out-<p>`
///
/// La salida se escribe en un temporal y se renombra encima de
/// `mr-out-<p>`: una segunda ejecución de la misma partición reemplaza el
/// archivo en vez de duplicar líneas.
pub fn run_reduce(
    app: &dyn MapReduceApp,
    partition: u32,
    work_dir: &Path,
) -> io::Result<ReduceOutcome> {
    sweep_stale_temps(partition, work_dir);
    let files = intermediate_files(partition, work_dir)?;

    let mut intermediate: Vec<KeyValue> = Vec::new();
    for f in &files {
        intermediate.extend(read_records(f)?);
    }

    // sort estable: los valores de una clave mantienen el orden de lectura
    intermediate.sort_by(|a, b| a.key.cmp(&b.key));

    fs::create_dir_all(work_dir)?;
    let name = output_name(partition);
    let final_path = work_dir.join(&name);
    let tmp = temp_path(work_dir, &name);

    let keys = match write_reduced(app, &intermediate, &tmp) {
        Ok(k) => k,
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
    };
    fs::rename(&tmp, &final_path)?;

    Ok(ReduceOutcome {
        inputs: files.len(),
        keys,
        output: final_path,
    })
}

/// Borra temporales de intermedios de esta partición que dejó un map que
/// murió antes de publicar. En fase de reduce todos los maps ya se dieron
/// por hechos, así que nadie los va a publicar. Devuelve cuántos borró.
fn sweep_stale_temps(partition: u32, work_dir: &Path) -> usize {
    let dir = Pattern::escape(&work_dir.to_string_lossy());
    let pattern = format!("{}/.tmp-*-mr-{}-*.json", dir, partition);

    let Ok(entries) = glob(&pattern) else {
        return 0;
    };

    let mut removed = 0;
    for path in entries.flatten() {
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("borrado temporal huérfano {}", path.display());
                removed += 1;
            }
            Err(e) => debug!("no se pudo borrar {}: {}", path.display(), e),
        }
    }
    removed
}

fn write_reduced(app: &dyn MapReduceApp, sorted: &[KeyValue], path: &Path) -> io::Result<usize> {
    let mut writer = BufWriter::new(File::create(path)?);
    let mut keys = 0;

    for group in sorted.chunk_by(|a, b| a.key == b.key) {
        let key = &group[0].key;
        let values: Vec<String> = group.iter().map(|kv| kv.value.clone()).collect();
        let reduced = app.reduce(key, &values);

        writeln!(writer, "{} {}", key, reduced)?;
        keys += 1;
    }

    writer.flush()?;
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{indexer::Indexer, wordcount::WordCount};
    use std::{env, fs, io::Write};

    fn temp_dir(sub: &str) -> PathBuf {
        let base = env::temp_dir()
            .join("mr_engine_tests")
            .join(sub);
        let _ = fs::remove_dir_all(&base);
        fs::create_dir_all(&base).unwrap();
        base
    }

    fn write_input(dir: &Path, name: &str, text: &str) -> String {
        let path = dir.join(name);
        let mut f = fs::File::create(&path).unwrap();
        write!(f, "{}", text).unwrap();
        path.to_string_lossy().to_string()
    }

    fn sorted_lines(path: &Path) -> Vec<String> {
        let content = fs::read_to_string(path).unwrap();
        let mut lines: Vec<String> = content.lines().map(str::to_string).collect();
        lines.sort();
        lines
    }

    /* ============
       NOMBRES
       ============ */

    #[test]
    fn intermediate_name_lleva_basename_y_hash_de_la_ruta() {
        let name = intermediate_name(3, "/data/in/pg-grimm.txt");
        assert!(name.starts_with("mr-3-pg-grimm.txt-"));
        assert!(name.ends_with(".json"));
        assert!(Pattern::new("mr-3-*.json").unwrap().matches(&name));

        // misma ruta, mismo nombre; mismo basename en otro directorio, otro nombre
        assert_eq!(name, intermediate_name(3, "/data/in/pg-grimm.txt"));
        assert_ne!(name, intermediate_name(3, "/data/otro/pg-grimm.txt"));
        assert_eq!(output_name(7), "mr-out-7");
    }

    /* ============
       MAP
       ============ */

    #[test]
    fn run_map_reparte_cada_clave_en_su_particion() {
        let tmp = temp_dir("map_partitions");
        let input = write_input(&tmp, "in.txt", "a b c a d e f g a");

        let outcome = run_map(&WordCount, &input, 3, &tmp).unwrap();
        assert_eq!(outcome.records, 9);
        assert!(outcome.skipped.is_empty());
        assert!(!outcome.written.is_empty());

        let mut total = 0;
        for path in &outcome.written {
            let name = path.file_name().unwrap().to_str().unwrap();
            let p: u32 = name
                .trim_start_matches("mr-")
                .split('-')
                .next()
                .unwrap()
                .parse()
                .unwrap();

            for kv in read_records(path).unwrap() {
                assert_eq!(partition_for(&kv.key, 3), p);
                total += 1;
            }
        }
        assert_eq!(total, 9);

        // no quedan temporales
        let leftovers = fs::read_dir(&tmp)
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().starts_with(".tmp-"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn run_map_no_pisa_un_intermedio_existente() {
        let tmp = temp_dir("map_first_writer_wins");
        let input = write_input(&tmp, "in.txt", "hola");

        // con una sola partición todo va al intermedio de la partición 0
        let existing = tmp.join(intermediate_name(0, &input));
        fs::write(&existing, "{\"key\":\"previo\",\"value\":\"1\"}\n").unwrap();

        let outcome = run_map(&WordCount, &input, 1, &tmp).unwrap();
        assert!(outcome.written.is_empty());
        assert_eq!(outcome.skipped, vec![existing.clone()]);

        let recs = read_records(&existing).unwrap();
        assert_eq!(recs, vec![KeyValue::new("previo", "1")]);
    }

    #[test]
    fn run_map_con_entrada_inexistente_devuelve_error() {
        let tmp = temp_dir("map_missing");
        let missing = tmp.join("no_existe.txt").to_string_lossy().to_string();

        assert!(run_map(&WordCount, &missing, 2, &tmp).is_err());
        assert!(intermediate_files(0, &tmp).unwrap().is_empty());
        assert!(intermediate_files(1, &tmp).unwrap().is_empty());
    }

    /* ============
       REDUCE
       ============ */

    #[test]
    fn map_y_reduce_agregan_claves_de_todas_las_entradas() {
        let tmp = temp_dir("map_reduce_roundtrip");
        let a = write_input(&tmp, "a.txt", "hola hola mundo");
        let b = write_input(&tmp, "b.txt", "mundo mundo prueba");

        let n = 3;
        run_map(&WordCount, &a, n, &tmp).unwrap();
        run_map(&WordCount, &b, n, &tmp).unwrap();

        let mut all = Vec::new();
        for p in 0..n {
            let outcome = run_reduce(&WordCount, p, &tmp).unwrap();
            all.extend(sorted_lines(&outcome.output));
        }
        all.sort();

        assert_eq!(all, vec!["hola 2", "mundo 3", "prueba 1"]);
    }

    #[test]
    fn entradas_con_el_mismo_basename_no_se_pisan() {
        let tmp = temp_dir("map_same_basename");
        let d1 = tmp.join("d1");
        let d2 = tmp.join("d2");
        fs::create_dir_all(&d1).unwrap();
        fs::create_dir_all(&d2).unwrap();
        let x1 = write_input(&d1, "x.txt", "alpha");
        let x2 = write_input(&d2, "x.txt", "beta");

        let out = tmp.join("out");
        run_map(&WordCount, &x1, 1, &out).unwrap();
        let second = run_map(&WordCount, &x2, 1, &out).unwrap();
        assert!(second.skipped.is_empty());
        assert_eq!(second.written.len(), 1);

        let outcome = run_reduce(&WordCount, 0, &out).unwrap();
        assert_eq!(outcome.inputs, 2);
        assert_eq!(sorted_lines(&outcome.output), vec!["alpha 1", "beta 1"]);
    }

    #[test]
    fn reduce_borra_temporales_huerfanos_de_su_particion() {
        let tmp = temp_dir("reduce_sweep");
        fs::write(tmp.join("mr-0-a.json"), "{\"key\":\"k\",\"value\":\"1\"}\n").unwrap();
        let orphan = tmp.join(".tmp-999-mr-0-a.txt-00ff.json");
        let other = tmp.join(".tmp-999-mr-1-a.txt-00ff.json");
        fs::write(&orphan, "{\"key\":\"medio\"").unwrap();
        fs::write(&other, "{\"key\":\"medio\"").unwrap();

        let outcome = run_reduce(&WordCount, 0, &tmp).unwrap();
        assert_eq!(fs::read_to_string(outcome.output).unwrap(), "k 1\n");
        assert!(!orphan.exists());
        // la partición 1 no es asunto de este reduce
        assert!(other.exists());
    }

    #[test]
    fn reduce_escribe_claves_ordenadas() {
        let tmp = temp_dir("reduce_sorted");
        fs::write(
            tmp.join("mr-0-x.json"),
            "{\"key\":\"b\",\"value\":\"x\"}\n\n{\"key\":\"a\",\"value\":\"x\"}\n",
        )
        .unwrap();
        fs::write(tmp.join("mr-0-y.json"), "{\"key\":\"a\",\"value\":\"y\"}\n").unwrap();

        let outcome = run_reduce(&Indexer, 0, &tmp).unwrap();
        assert_eq!(outcome.inputs, 2);
        assert_eq!(outcome.keys, 2);

        let content = fs::read_to_string(&outcome.output).unwrap();
        assert_eq!(content, "a 2 x,y\nb 1 x\n");
    }

    #[test]
    fn reduce_sin_intermedios_crea_salida_vacia() {
        let tmp = temp_dir("reduce_empty");

        let outcome = run_reduce(&WordCount, 4, &tmp).unwrap();
        assert_eq!(outcome.inputs, 0);
        assert_eq!(outcome.output, tmp.join("mr-out-4"));
        assert!(fs::read_to_string(&outcome.output).unwrap().is_empty());
    }

    #[test]
    fn reduce_de_particion_1_no_lee_la_particion_10() {
        let tmp = temp_dir("reduce_glob");
        fs::write(tmp.join("mr-1-a.json"), "{\"key\":\"uno\",\"value\":\"1\"}\n").unwrap();
        fs::write(tmp.join("mr-10-a.json"), "{\"key\":\"diez\",\"value\":\"1\"}\n").unwrap();

        let files = intermediate_files(1, &tmp).unwrap();
        assert_eq!(files, vec![tmp.join("mr-1-a.json")]);
    }

    #[test]
    fn reduce_repetido_reemplaza_la_salida() {
        let tmp = temp_dir("reduce_twice");
        fs::write(tmp.join("mr-0-a.json"), "{\"key\":\"k\",\"value\":\"1\"}\n").unwrap();

        run_reduce(&WordCount, 0, &tmp).unwrap();
        let outcome = run_reduce(&WordCount, 0, &tmp).unwrap();

        assert_eq!(fs::read_to_string(outcome.output).unwrap(), "k 1\n");
    }

    #[test]
    fn reduce_con_linea_corrupta_devuelve_invalid_data() {
        let tmp = temp_dir("reduce_corrupt");
        fs::write(tmp.join("mr-0-a.json"), "esto no es json\n").unwrap();

        let err = run_reduce(&WordCount, 0, &tmp).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(!tmp.join("mr-out-0").exists());
    }
}
