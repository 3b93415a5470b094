/*
 * sassling
 * Copyright (c) 2025 Posit, PBC
 *
 * Job orchestration and bidirectional callback bridge for driving a
 * synchronous, context-based style-sheet engine from an asynchronous host.
 *
 * The engine (see `sassling_engine::Engine`) is an opaque collaborator: it
 * compiles on the calling thread and may re-enter host code through
 * importer and function hooks that must return values immediately. This
 * crate owns the hard part of that arrangement:
 *
 * - materializing host configuration into engine option data with stable,
 *   job-owned buffer storage (`options`),
 * - presenting host callbacks to the engine as plain function pointers
 *   with opaque cookies, converting values in both directions and
 *   containing host-side faults (`bridge`),
 * - the job lifecycle and exactly-once release of the context handle,
 *   buffers, and bridges across the sync/async thread handoff (`job`,
 *   `scheduler`),
 * - reading results back out of the context before release (`result`).
 *
 * Async jobs run their compile step on a tokio blocking worker; completion
 * is delivered on the runtime, never on the worker, and strictly after
 * extraction finishes. Cancellation is not supported: once started, a job
 * runs to completion (the underlying engines have no abort path).
 */

mod bridge;
mod config;
mod error;
mod job;
mod options;
mod result;
mod scheduler;

pub use config::{
    FunctionCallback, ImportEntry, ImporterCallback, ImporterReply, IndentType, Linefeed,
    RenderConfig,
};
pub use error::RenderError;
pub use result::{CompileFailure, RenderResult, RenderStats};

// Host code builds configs against these engine-side types directly.
pub use sassling_engine::{Engine, ListSeparator, OutputStyle, Value};

use std::path::Path;
use std::sync::Arc;

use job::{Job, JobInput};
use scheduler::{run_async, run_sync};

/// Entry point for render jobs against one engine.
///
/// Cheap to clone; clones share the engine. Distinct jobs never share any
/// other state, so one renderer may run any number of jobs concurrently.
#[derive(Clone)]
pub struct Renderer {
    engine: Arc<dyn Engine>,
}

impl Renderer {
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Renderer { engine }
    }

    /// The engine's version string, pure passthrough.
    pub fn version(&self) -> String {
        self.engine.version().to_string()
    }

    /// Compile inline source text on the calling thread.
    ///
    /// Any importer or function callbacks in `config` are invoked on this
    /// thread before this returns; they must complete synchronously.
    pub fn render_sync(
        &self,
        source: impl Into<String>,
        config: &RenderConfig,
    ) -> Result<RenderResult, RenderError> {
        let job = Job::bind(self.engine.clone(), JobInput::Data(source.into()), config)?;
        run_sync(job)
    }

    /// Compile from a file path on the calling thread.
    pub fn render_file_sync(
        &self,
        path: impl AsRef<Path>,
        config: &RenderConfig,
    ) -> Result<RenderResult, RenderError> {
        let job = Job::bind(
            self.engine.clone(),
            JobInput::File(path.as_ref().to_path_buf()),
            config,
        )?;
        run_sync(job)
    }

    /// Compile inline source text on a blocking worker.
    ///
    /// Options are validated and bound on the calling task; the compile
    /// step (and every callback invocation it triggers) runs on one worker
    /// thread. The future resolves after compilation and extraction have
    /// finished; the job is released only after that.
    pub async fn render(
        &self,
        source: impl Into<String>,
        config: &RenderConfig,
    ) -> Result<RenderResult, RenderError> {
        let job = Job::bind(self.engine.clone(), JobInput::Data(source.into()), config)?;
        let (job, outcome) = run_async(job).await;
        drop(job);
        outcome
    }

    /// Compile from a file path on a blocking worker.
    pub async fn render_file(
        &self,
        path: impl AsRef<Path>,
        config: &RenderConfig,
    ) -> Result<RenderResult, RenderError> {
        let job = Job::bind(
            self.engine.clone(),
            JobInput::File(path.as_ref().to_path_buf()),
            config,
        )?;
        let (job, outcome) = run_async(job).await;
        drop(job);
        outcome
    }

    /// Callback-shaped async entry point: compile inline source and deliver
    /// the outcome to `on_complete`, exactly once, on the runtime (never on
    /// the compile worker).
    ///
    /// Must be called from within a tokio runtime.
    pub fn render_with_callback<F>(&self, source: impl Into<String>, config: RenderConfig, on_complete: F)
    where
        F: FnOnce(Result<RenderResult, RenderError>) + Send + 'static,
    {
        let renderer = self.clone();
        let source = source.into();
        tokio::spawn(async move {
            let result = renderer.render(source, &config).await;
            on_complete(result);
        });
    }

    /// Callback-shaped async entry point for file compiles. Same delivery
    /// contract as [`Renderer::render_with_callback`].
    pub fn render_file_with_callback<F>(&self, path: impl AsRef<Path>, config: RenderConfig, on_complete: F)
    where
        F: FnOnce(Result<RenderResult, RenderError>) + Send + 'static,
    {
        let renderer = self.clone();
        let path = path.as_ref().to_path_buf();
        tokio::spawn(async move {
            let result = renderer.render_file(&path, &config).await;
            on_complete(result);
        });
    }
}
