// Identifier -> worker registry, the collaborator-facing layer.
//
// The core components know nothing about identifiers; this registry owns
// the opaque-id mapping so nothing ambient or global is needed.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;
use uuid::Uuid;

use crate::config::ProbeOptions;
use crate::worker::ProbeWorker;

/// Concurrency-safe creation, lookup, and deletion of probe workers by
/// opaque identifier.
pub struct WorkerRegistry {
    workers: DashMap<Uuid, Arc<ProbeWorker>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        WorkerRegistry {
            workers: DashMap::new(),
        }
    }

    /// Resolves defaults for any unset option, builds a worker in the
    /// Created state, and returns its identifier. The caller starts it via
    /// [`WorkerRegistry::get`].
    pub fn create(&self, options: ProbeOptions) -> Uuid {
        let config = options.resolve();
        let id = Uuid::new_v4();
        info!(%id, target = %config.target, port = config.port, "registered probe worker");
        self.workers
            .insert(id, Arc::new(ProbeWorker::with_config(config)));
        id
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<ProbeWorker>> {
        self.workers.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn ids(&self) -> Vec<Uuid> {
        self.workers.iter().map(|entry| *entry.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Stops and drops the worker. Its statistics store dies with it once
    /// all outstanding handles are released.
    pub fn remove(&self, id: &Uuid) -> bool {
        match self.workers.remove(id) {
            Some((_, worker)) => {
                let _ = worker.stop();
                info!(%id, "removed probe worker");
                true
            }
            None => false,
        }
    }
}

impl Default for WorkerRegistry {
    fn default() -> Self {
        WorkerRegistry::new()
    }
}
