//! The job context: one compilation request and everything it owns.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! A `Job` is the ownership-transfer record for the thread handoff: it owns
//! the engine context handle, the buffer bag the option block points into,
//! and the heap-pinned bridges the hook cookies point at. It moves by
//! unique ownership from bind, to the thread running the compile step, to
//! the completion path, and releases everything exactly once when dropped.

use std::ffi::CString;
use std::os::raw::c_void;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use sassling_engine::Engine;

use crate::bridge::{FunctionBridge, ImporterBridge};
use crate::config::RenderConfig;
use crate::error::RenderError;
use crate::options::{BufferBag, materialize};

/// What a job compiles.
#[derive(Debug, Clone)]
pub(crate) enum JobInput {
    /// Inline source text.
    Data(String),
    /// Path of the entry file.
    File(PathBuf),
}

/// Lifecycle of a job. Terminal misuse (driving a job past a terminal
/// state) is an internal fault, not a user error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JobState {
    OptionsBound,
    Running,
    Succeeded,
    Failed,
}

pub(crate) struct Job {
    engine: Arc<dyn Engine>,
    ctx: *mut c_void,
    state: JobState,
    // Held for the context's lifetime; the engine stores raw views into
    // these. Field order is irrelevant because `Drop` destroys the context
    // before any field is dropped.
    _buffers: BufferBag,
    _importer_bridges: Vec<Box<ImporterBridge>>,
    _function_bridges: Vec<Box<FunctionBridge>>,
}

// Safety: a Job is accessed by exactly one thread at a time. It is built on
// the caller's thread, moved (by unique ownership) to a worker for the
// compile step, and moved back for completion delivery. The raw pointers
// inside (context handle, option buffer views, bridge cookies) all point at
// memory owned by this Job or by the engine context it owns, so moving the
// Job between threads moves sole access to that memory with it.
unsafe impl Send for Job {}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Job {
    /// Validate configuration, materialize options, create the engine
    /// context, and bind options to it.
    ///
    /// Configuration errors are reported here, before any engine call.
    pub(crate) fn bind(
        engine: Arc<dyn Engine>,
        input: JobInput,
        config: &RenderConfig,
    ) -> Result<Job, RenderError> {
        config.validate()?;
        let materialized = materialize(config)?;
        let input_cstr = |text: &str| {
            CString::new(text).map_err(|_| {
                RenderError::InvalidOption("input contains an interior NUL byte".to_string())
            })
        };

        let ctx = match &input {
            JobInput::Data(source) => {
                let source = input_cstr(source)?;
                engine.make_data_context(source)
            }
            JobInput::File(path) => {
                let path = input_cstr(&path.to_string_lossy())?;
                engine.make_file_context(path)
            }
        };
        if ctx.is_null() {
            return Err(RenderError::Internal(
                "engine returned a null context handle".to_string(),
            ));
        }

        let kind = match &input {
            JobInput::Data(_) => "data",
            JobInput::File(_) => "file",
        };
        unsafe { engine.set_options(ctx, materialized.options) };
        debug!(kind, "job bound");

        Ok(Job {
            engine,
            ctx,
            state: JobState::OptionsBound,
            _buffers: materialized.buffers,
            _importer_bridges: materialized.importer_bridges,
            _function_bridges: materialized.function_bridges,
        })
    }

    /// Run the engine's compile entry point on the current thread. Any
    /// registered hook may be invoked re-entrantly before this returns.
    pub(crate) fn compile(&mut self) -> Result<i32, RenderError> {
        if self.state != JobState::OptionsBound {
            return Err(RenderError::Internal(format!(
                "compile called in state {:?}",
                self.state
            )));
        }
        self.state = JobState::Running;
        let status = unsafe { self.engine.compile(self.ctx) };
        self.state = if status == sassling_engine::STATUS_OK {
            JobState::Succeeded
        } else {
            JobState::Failed
        };
        debug!(status, state = ?self.state, "compile finished");
        Ok(status)
    }

    pub(crate) fn state(&self) -> JobState {
        self.state
    }

    pub(crate) fn engine(&self) -> &dyn Engine {
        self.engine.as_ref()
    }

    /// The live context handle. Valid until this Job is dropped.
    pub(crate) fn ctx(&self) -> *mut c_void {
        self.ctx
    }
}

impl Drop for Job {
    fn drop(&mut self) {
        // Exactly-once release on every exit path. The handle is nulled so
        // a hypothetical second drop (impossible under unique ownership)
        // would be a no-op rather than a double free.
        if !self.ctx.is_null() {
            unsafe { self.engine.destroy_context(self.ctx) };
            self.ctx = std::ptr::null_mut();
            debug!("job released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// An engine stub that records context churn without compiling.
    struct NullEngine;

    impl Engine for NullEngine {
        fn version(&self) -> &str {
            "null/0"
        }
        fn make_data_context(&self, source: CString) -> *mut c_void {
            Box::into_raw(Box::new(source)).cast()
        }
        fn make_file_context(&self, input_path: CString) -> *mut c_void {
            Box::into_raw(Box::new(input_path)).cast()
        }
        unsafe fn set_options(&self, _ctx: *mut c_void, _options: sassling_engine::EngineOptions) {
        }
        unsafe fn compile(&self, _ctx: *mut c_void) -> i32 {
            0
        }
        unsafe fn output_string(&self, _ctx: *mut c_void) -> Option<String> {
            Some(String::new())
        }
        unsafe fn source_map_string(&self, _ctx: *mut c_void) -> Option<String> {
            None
        }
        unsafe fn included_files(&self, _ctx: *mut c_void) -> Vec<String> {
            Vec::new()
        }
        unsafe fn error_status(&self, _ctx: *mut c_void) -> i32 {
            0
        }
        unsafe fn error_message(&self, _ctx: *mut c_void) -> Option<String> {
            None
        }
        unsafe fn error_file(&self, _ctx: *mut c_void) -> Option<String> {
            None
        }
        unsafe fn error_line(&self, _ctx: *mut c_void) -> Option<u32> {
            None
        }
        unsafe fn error_column(&self, _ctx: *mut c_void) -> Option<u32> {
            None
        }
        unsafe fn error_json(&self, _ctx: *mut c_void) -> Option<String> {
            None
        }
        unsafe fn destroy_context(&self, ctx: *mut c_void) {
            drop(unsafe { Box::from_raw(ctx.cast::<CString>()) });
        }
    }

    #[test]
    fn test_compile_twice_is_internal_fault() {
        let mut job = Job::bind(
            Arc::new(NullEngine),
            JobInput::Data("a{}".to_string()),
            &RenderConfig::default(),
        )
        .unwrap();
        job.compile().unwrap();
        let err = job.compile().unwrap_err();
        assert!(matches!(err, RenderError::Internal(_)));
    }

    #[test]
    fn test_interior_nul_in_source_is_invalid_option() {
        let err = Job::bind(
            Arc::new(NullEngine),
            JobInput::Data("a\0{}".to_string()),
            &RenderConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, RenderError::InvalidOption(_)));
    }

    #[test]
    fn test_state_transitions() {
        let mut job = Job::bind(
            Arc::new(NullEngine),
            JobInput::Data("a{}".to_string()),
            &RenderConfig::default(),
        )
        .unwrap();
        assert_eq!(job.state(), JobState::OptionsBound);
        job.compile().unwrap();
        assert_eq!(job.state(), JobState::Succeeded);
    }
}
