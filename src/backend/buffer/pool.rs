//! Writer Pool
//!
//! One `BufferedWriter` per tenant for a given item kind, so a batch never
//! mixes rows bound for different tenant databases. Writers are built on
//! first request by a factory that receives the tenant's handle; later
//! requests for the same tenant get the same instance and the handle they
//! pass is ignored.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

use super::writer::BufferedWriter;

type Factory<T, H> = Box<dyn Fn(Uuid, H) -> BufferedWriter<T> + Send + Sync>;

pub struct WriterPool<T: Send + 'static, H> {
    writers: Mutex<HashMap<Uuid, Arc<BufferedWriter<T>>>>,
    factory: Factory<T, H>,
}

impl<T: Send + 'static, H> WriterPool<T, H> {
    pub fn new(factory: impl Fn(Uuid, H) -> BufferedWriter<T> + Send + Sync + 'static) -> Self {
        Self {
            writers: Mutex::new(HashMap::new()),
            factory: Box::new(factory),
        }
    }

    /// Writer of `tenant_id`, created from `handle` on first use
    pub fn get_or_create(&self, tenant_id: Uuid, handle: H) -> Arc<BufferedWriter<T>> {
        let mut writers = self.writers.lock().unwrap_or_else(PoisonError::into_inner);
        writers
            .entry(tenant_id)
            .or_insert_with(|| {
                tracing::debug!("[Buffer] Creating writer for tenant {}", tenant_id);
                Arc::new((self.factory)(tenant_id, handle))
            })
            .clone()
    }

    /// Detach the writer of `tenant_id` so the caller can close it
    pub fn remove(&self, tenant_id: Uuid) -> Option<Arc<BufferedWriter<T>>> {
        self.writers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&tenant_id)
    }

    /// Detach every writer
    pub fn drain(&self) -> Vec<Arc<BufferedWriter<T>>> {
        self.writers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, writer)| writer)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.writers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
