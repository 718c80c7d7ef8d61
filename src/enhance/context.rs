//! Enhancement processing context
//!
//! Owns the dedicated worker pool the filter stages run on, kept separate
//! from any pool the host application may use so frame processing cannot
//! starve it. Construction is fallible; the engine treats a failed context
//! as a signal to run in permanent bypass mode.

use thiserror::Error;

/// Enhancement-internal errors; never surfaced through frame delivery
#[derive(Error, Debug)]
pub enum EnhanceError {
    #[error("processing context initialization failed: {0}")]
    ContextInit(String),
}

/// Dedicated execution context for the filter chain
pub struct ProcessingContext {
    pool: rayon::ThreadPool,
}

impl ProcessingContext {
    /// Build the context with a small dedicated pool, capped at four
    /// workers; the chain is row-parallel and memory-bound.
    pub fn new() -> Result<Self, EnhanceError> {
        let threads = std::thread::available_parallelism()
            .map(|n| n.get().min(4))
            .unwrap_or(2);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("nightlens-enhance-{i}"))
            .build()
            .map_err(|e| EnhanceError::ContextInit(e.to_string()))?;

        tracing::debug!("enhancement context ready with {} worker(s)", threads);
        Ok(Self { pool })
    }

    /// Run a closure inside the context's pool
    pub fn run<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        self.pool.install(op)
    }
}
