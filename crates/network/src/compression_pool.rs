//! Batch compression off the tick thread
//!
//! Every compressed batch is represented by a [`CompressBatchPromise`]. A
//! broadcast submits one job per (buffer, codec) and queues the same promise
//! on every recipient; sessions send resolved promises strictly in queue order.

use crate::config::NetworkConfig;
use bytes::Bytes;
use parking_lot::Mutex;
use protobridge_core::{BridgeError, Result};
use protobridge_protocol::{Compressor, PacketBatch};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;

#[derive(Debug)]
enum PromiseState {
    Pending,
    Resolved(Bytes),
    Failed(String),
}

/// Shared result of one compression job
#[derive(Debug, Clone)]
pub struct CompressBatchPromise {
    state: Arc<Mutex<PromiseState>>,
}

impl CompressBatchPromise {
    pub fn pending() -> Self {
        Self {
            state: Arc::new(Mutex::new(PromiseState::Pending)),
        }
    }

    pub fn resolved(payload: Bytes) -> Self {
        Self {
            state: Arc::new(Mutex::new(PromiseState::Resolved(payload))),
        }
    }

    /// Settle the promise; later calls are ignored
    pub fn resolve(&self, result: Result<Bytes>) {
        let mut state = self.state.lock();
        if matches!(*state, PromiseState::Pending) {
            *state = match result {
                Ok(payload) => PromiseState::Resolved(payload),
                Err(e) => PromiseState::Failed(e.to_string()),
            };
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(*self.state.lock(), PromiseState::Pending)
    }

    /// Compressed payload, `None` while the job is running
    pub fn result(&self) -> Option<Result<Bytes>> {
        match &*self.state.lock() {
            PromiseState::Pending => None,
            PromiseState::Resolved(payload) => Some(Ok(payload.clone())),
            PromiseState::Failed(message) => Some(Err(BridgeError::Compression(message.clone()))),
        }
    }

    /// Whether both handles refer to the same job
    pub fn same_job(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

/// Runs compression jobs, inline or on the tokio blocking pool
#[derive(Debug)]
pub struct CompressionPool {
    async_enabled: bool,
    async_threshold: usize,
    runtime: Option<Handle>,
    submitted: AtomicUsize,
}

impl CompressionPool {
    /// Async jobs need a tokio runtime to be current when the pool is created;
    /// without one every job runs inline.
    pub fn new(async_enabled: bool, async_threshold: usize) -> Self {
        let runtime = Handle::try_current().ok();
        if async_enabled && runtime.is_none() {
            tracing::warn!("No tokio runtime available, compressing batches synchronously");
        }
        Self {
            async_enabled,
            async_threshold,
            runtime,
            submitted: AtomicUsize::new(0),
        }
    }

    pub fn synchronous() -> Self {
        Self::new(false, usize::MAX)
    }

    pub fn from_config(config: &NetworkConfig) -> Self {
        Self::new(config.async_compression, config.async_compression_threshold)
    }

    /// Number of jobs submitted so far
    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Submit one compression job for a batch
    pub fn prepare_batch(
        &self,
        batch: &PacketBatch,
        compressor: Arc<dyn Compressor>,
        force_sync: bool,
    ) -> CompressBatchPromise {
        self.submitted.fetch_add(1, Ordering::Relaxed);
        let buffer = batch.buffer().clone();

        let runtime = match &self.runtime {
            Some(runtime) if self.async_enabled && !force_sync && buffer.len() >= self.async_threshold => runtime,
            _ => {
                tracing::trace!("Compressing {} byte batch inline", buffer.len());
                let promise = CompressBatchPromise::pending();
                promise.resolve(compressor.compress(&buffer).map(Bytes::from));
                return promise;
            }
        };

        tracing::trace!("Compressing {} byte batch on the blocking pool", buffer.len());
        let promise = CompressBatchPromise::pending();
        let job = promise.clone();
        runtime.spawn_blocking(move || {
            job.resolve(compressor.compress(&buffer).map(Bytes::from));
        });
        promise
    }
}

impl Default for CompressionPool {
    fn default() -> Self {
        Self::synchronous()
    }
}
