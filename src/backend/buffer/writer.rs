/**
 * Buffered Batch Writer
 *
 * Accumulates items in memory and hands them to a `BatchSink` in batches.
 * A batch is cut when the buffer grows past `max_size` or when the
 * background ticker fires, whichever comes first.
 *
 * # Locking
 *
 * One mutex guards the buffer. `add` appends under it and `flush` swaps the
 * whole buffer out under it, so an item is either in the snapshot or left
 * for the next batch, never both. The sink call runs after the lock is
 * released.
 *
 * Flushes are serialized by a second, async lock taken before the swap. A
 * `flush` that finds the buffer empty still waits for the batch in flight,
 * so once it returns every item added before the call has reached the sink.
 *
 * # Failure
 *
 * A failed batch is reported to the `on_error` hook and dropped. There is
 * no retry. Writes that must not be lost should bypass the buffer.
 */
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::shared::config::BatchPolicy;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Persists one batch of items
#[async_trait]
pub trait BatchSink<T>: Send + Sync {
    async fn persist(&self, batch: Vec<T>) -> Result<(), BoxError>;
}

type SuccessHook = Box<dyn Fn(usize) + Send + Sync>;
type ErrorHook = Box<dyn Fn(&BoxError, usize) + Send + Sync>;

struct Shared<T> {
    label: String,
    buffer: Mutex<Vec<T>>,
    persisting: AsyncMutex<()>,
    max_size: usize,
    sink: Arc<dyn BatchSink<T>>,
    on_success: SuccessHook,
    on_error: ErrorHook,
}

impl<T: Send + 'static> Shared<T> {
    async fn flush(&self) -> usize {
        let _persisting = self.persisting.lock().await;
        let batch = {
            let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
            if buffer.is_empty() {
                return 0;
            }
            std::mem::take(&mut *buffer)
        };

        let size = batch.len();
        match self.sink.persist(batch).await {
            Ok(()) => (self.on_success)(size),
            Err(err) => (self.on_error)(&err, size),
        }
        size
    }
}

pub struct BufferedWriter<T: Send + 'static> {
    shared: Arc<Shared<T>>,
    ticker: JoinHandle<()>,
}

impl<T: Send + 'static> BufferedWriter<T> {
    /// Start configuring a writer that persists through `sink`
    ///
    /// `label` only shows up in logs.
    pub fn builder(label: impl Into<String>, sink: Arc<dyn BatchSink<T>>) -> WriterBuilder<T> {
        WriterBuilder {
            label: label.into(),
            sink,
            policy: BatchPolicy::new(Duration::from_secs(5), 30),
            on_success: None,
            on_error: None,
        }
    }

    /// Append an item, cutting a batch in the background once the buffer
    /// holds more than `max_size` items
    pub fn add(&self, item: T) {
        let len = {
            let mut buffer = self.shared.buffer.lock().unwrap_or_else(PoisonError::into_inner);
            buffer.push(item);
            buffer.len()
        };

        if len > self.shared.max_size {
            let shared = self.shared.clone();
            tokio::spawn(async move {
                shared.flush().await;
            });
        }
    }

    /// Persist everything buffered so far, after any batch already in
    /// flight; returns the size of the batch this call cut
    pub async fn flush(&self) -> usize {
        self.shared.flush().await
    }

    /// Items waiting for the next batch
    pub fn pending(&self) -> usize {
        self.shared.buffer.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn label(&self) -> &str {
        &self.shared.label
    }

    /// Stop the ticker and persist what is left
    pub async fn close(&self) -> usize {
        self.ticker.abort();
        self.shared.flush().await
    }
}

impl<T: Send + 'static> Drop for BufferedWriter<T> {
    fn drop(&mut self) {
        self.ticker.abort();
    }
}

pub struct WriterBuilder<T> {
    label: String,
    sink: Arc<dyn BatchSink<T>>,
    policy: BatchPolicy,
    on_success: Option<SuccessHook>,
    on_error: Option<ErrorHook>,
}

impl<T: Send + 'static> WriterBuilder<T> {
    pub fn policy(mut self, policy: BatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Called with the batch size after a batch was persisted
    pub fn on_success(mut self, hook: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Box::new(hook));
        self
    }

    /// Called with the error and the size of the dropped batch
    pub fn on_error(mut self, hook: impl Fn(&BoxError, usize) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(hook));
        self
    }

    /// Build the writer and start its flush ticker
    ///
    /// Must be called inside a Tokio runtime.
    pub fn spawn(self) -> BufferedWriter<T> {
        let on_success: SuccessHook = match self.on_success {
            Some(hook) => hook,
            None => {
                let label = self.label.clone();
                Box::new(move |size: usize| tracing::debug!("[Buffer] {}: flushed {} items", label, size))
            }
        };
        let on_error: ErrorHook = match self.on_error {
            Some(hook) => hook,
            None => {
                let label = self.label.clone();
                Box::new(move |err: &BoxError, size: usize| {
                    tracing::error!("[Buffer] {}: dropped batch of {} items: {}", label, size, err)
                })
            }
        };

        let shared = Arc::new(Shared {
            label: self.label,
            buffer: Mutex::new(Vec::new()),
            persisting: AsyncMutex::new(()),
            max_size: self.policy.max_size,
            sink: self.sink,
            on_success,
            on_error,
        });

        let every = self.policy.flush_every;
        let weak = Arc::downgrade(&shared);
        let ticker = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + every, every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                shared.flush().await;
            }
        });

        BufferedWriter { shared, ticker }
    }
}
