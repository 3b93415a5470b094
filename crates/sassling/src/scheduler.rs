//! Job scheduling: inline for sync jobs, a blocking worker for async jobs.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! The engine's compile entry point is synchronous and may re-enter host
//! callbacks, so the whole compile step — including every bridge
//! invocation it triggers — runs on a single thread: the caller's thread
//! for sync jobs, one `spawn_blocking` worker for async jobs. Jobs move by
//! unique ownership; nothing is shared between the event-loop side and the
//! worker while the compile runs.
//!
//! For async jobs the job is moved *back* across the await so that release
//! (context destruction, buffer and bridge teardown) happens only after
//! the completion path has observed the result, never on the worker.

use tracing::debug;

use crate::error::RenderError;
use crate::job::Job;
use crate::result::{RenderResult, extract};

/// Run a job to completion on the current thread and release it.
pub(crate) fn run_sync(mut job: Job) -> Result<RenderResult, RenderError> {
    job.compile()?;
    let outcome = extract(&mut job);
    drop(job);
    outcome
}

/// Run a job's compile step on a blocking worker. Returns the job together
/// with the outcome; the caller decides when release happens (after
/// completion delivery).
pub(crate) async fn run_async(job: Job) -> (Option<Job>, Result<RenderResult, RenderError>) {
    let handle = tokio::task::spawn_blocking(move || {
        let mut job = job;
        let outcome = match job.compile() {
            Ok(_status) => extract(&mut job),
            Err(e) => Err(e),
        };
        (job, outcome)
    });
    match handle.await {
        Ok((job, outcome)) => (Some(job), outcome),
        Err(join_error) => {
            // The worker panicked; the job was released by unwinding there.
            debug!(%join_error, "compile worker failed");
            (
                None,
                Err(RenderError::Internal(format!(
                    "compile worker failed: {}",
                    join_error
                ))),
            )
        }
    }
}
