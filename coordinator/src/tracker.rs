// coordinator/src/tracker.rs

use std::{collections::HashMap, time::Instant};

use common::WorkerId;

/// Tarea asignada: índice + tipo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskRef {
    /// índice en la lista de archivos de entrada
    Map(usize),
    /// índice de partición de reduce
    Reduce(usize),
}

/// Una tarea en vuelo: qué worker la tiene y desde cuándo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub worker_id: WorkerId,
    pub task: TaskRef,
    pub assigned_at: Instant,
}

#[derive(Debug)]
struct Node {
    assignment: Assignment,
    prev: Option<WorkerId>,
    next: Option<WorkerId>,
}

/// Tareas asignadas y todavía no retiradas, ordenadas por momento de
/// asignación.
///
/// Lista doblemente enlazada cuyos nodos viven en un `HashMap` indexado por
/// worker (los punteros `prev`/`next` son ids de worker). Se inserta siempre
/// por la cola y la cabeza es la asignación más antigua, así que todas las
/// operaciones son O(1).
///
/// Invariante: como mucho un registro por worker.
#[derive(Debug, Default)]
pub struct InFlightTracker {
    nodes: HashMap<WorkerId, Node>,
    head: Option<WorkerId>,
    tail: Option<WorkerId>,
}

impl InFlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra `task` para `worker_id` con timestamp `now`, reemplazando
    /// cualquier registro previo de ese worker.
    pub fn upsert(&mut self, worker_id: WorkerId, task: TaskRef, now: Instant) {
        self.evict(worker_id);

        let node = Node {
            assignment: Assignment {
                worker_id,
                task,
                assigned_at: now,
            },
            prev: self.tail,
            next: None,
        };

        match self.tail {
            Some(old_tail) => {
                if let Some(n) = self.nodes.get_mut(&old_tail) {
                    n.next = Some(worker_id);
                }
            }
            None => self.head = Some(worker_id),
        }
        self.tail = Some(worker_id);
        self.nodes.insert(worker_id, node);
    }

    /// Saca el registro de `worker_id` si existe. Devuelve lo que había.
    pub fn evict(&mut self, worker_id: WorkerId) -> Option<Assignment> {
        let node = self.nodes.remove(&worker_id)?;

        match node.prev {
            Some(p) => {
                if let Some(n) = self.nodes.get_mut(&p) {
                    n.next = node.next;
                }
            }
            None => self.head = node.next,
        }

        match node.next {
            Some(nx) => {
                if let Some(n) = self.nodes.get_mut(&nx) {
                    n.prev = node.prev;
                }
            }
            None => self.tail = node.prev,
        }

        Some(node.assignment)
    }

    /// La asignación más antigua (cabeza de la lista).
    pub fn oldest(&self) -> Option<&Assignment> {
        self.head
            .and_then(|id| self.nodes.get(&id))
            .map(|n| &n.assignment)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Recorre de la más antigua a la más nueva.
    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = &Assignment> + '_ {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            let node = self.nodes.get(&cursor?)?;
            cursor = node.next;
            Some(&node.assignment)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn order(t: &InFlightTracker) -> Vec<WorkerId> {
        t.iter().map(|a| a.worker_id).collect()
    }

    #[test]
    fn tracker_vacio_no_tiene_oldest() {
        let t = InFlightTracker::new();
        assert!(t.oldest().is_none());
        assert!(t.is_empty());
        assert_eq!(t.len(), 0);
    }

    #[test]
    fn oldest_es_el_primero_insertado() {
        let base = Instant::now();
        let mut t = InFlightTracker::new();
        t.upsert(10, TaskRef::Map(0), base);
        t.upsert(20, TaskRef::Map(1), base + Duration::from_secs(1));
        t.upsert(30, TaskRef::Map(2), base + Duration::from_secs(2));

        let oldest = t.oldest().unwrap();
        assert_eq!(oldest.worker_id, 10);
        assert_eq!(oldest.task, TaskRef::Map(0));
        assert_eq!(oldest.assigned_at, base);
        assert_eq!(order(&t), vec![10, 20, 30]);
    }

    #[test]
    fn upsert_reemplaza_y_mueve_al_final() {
        let base = Instant::now();
        let mut t = InFlightTracker::new();
        t.upsert(1, TaskRef::Map(0), base);
        t.upsert(2, TaskRef::Map(1), base);
        t.upsert(1, TaskRef::Map(2), base + Duration::from_secs(5));

        assert_eq!(t.len(), 2);
        assert_eq!(order(&t), vec![2, 1]);
        assert_eq!(t.iter().last().unwrap().task, TaskRef::Map(2));
        assert_eq!(t.oldest().unwrap().worker_id, 2);
    }

    #[test]
    fn evict_de_cabeza_medio_y_cola_mantiene_enlaces() {
        let now = Instant::now();
        let mut t = InFlightTracker::new();
        for w in 1..=5 {
            t.upsert(w, TaskRef::Reduce(w as usize), now);
        }

        // medio
        assert_eq!(t.evict(3).unwrap().task, TaskRef::Reduce(3));
        assert_eq!(order(&t), vec![1, 2, 4, 5]);

        // cabeza
        t.evict(1);
        assert_eq!(t.oldest().unwrap().worker_id, 2);
        assert_eq!(order(&t), vec![2, 4, 5]);

        // cola, y luego insertar de nuevo detrás de la nueva cola
        t.evict(5);
        t.upsert(6, TaskRef::Reduce(6), now);
        assert_eq!(order(&t), vec![2, 4, 6]);
        assert_eq!(t.len(), 3);
    }

    #[test]
    fn evict_de_worker_desconocido_no_hace_nada() {
        let mut t = InFlightTracker::new();
        t.upsert(1, TaskRef::Map(0), Instant::now());

        assert!(t.evict(99).is_none());
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn evict_del_unico_nodo_deja_la_lista_vacia() {
        let mut t = InFlightTracker::new();
        t.upsert(1, TaskRef::Map(0), Instant::now());
        t.evict(1);

        assert!(t.is_empty());
        assert!(t.oldest().is_none());
        assert_eq!(order(&t), Vec::<WorkerId>::new());

        // y se puede volver a usar
        t.upsert(2, TaskRef::Map(1), Instant::now());
        assert_eq!(t.oldest().unwrap().worker_id, 2);
    }
}
