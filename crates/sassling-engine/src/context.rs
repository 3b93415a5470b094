//! The context-based engine trait.
//!
//! Copyright (c) 2025 Posit, PBC

use std::ffi::CString;
use std::os::raw::c_void;

use crate::options::EngineOptions;

/// A synchronous style-sheet compiler behind a context-based API.
///
/// The lifecycle is the classic C shape: create a context from source text
/// or an input path, bind options to it, run the blocking `compile` entry
/// point, read results back out, destroy the context. The handle is opaque;
/// only the engine that created it may interpret it.
///
/// # Safety contract
///
/// Every method taking a `*mut c_void` context handle requires that the
/// handle came from `make_data_context`/`make_file_context` on the same
/// engine and has not been passed to `destroy_context`. Option string
/// buffers referenced by the bound `EngineOptions` must stay alive until
/// `destroy_context`; hook cookies must stay alive for at least as long.
/// `compile` may invoke registered hooks re-entrantly, zero or more times,
/// on the calling thread only — engines never parallelize one compile pass.
pub trait Engine: Send + Sync {
    /// Engine version string, pure passthrough.
    fn version(&self) -> &str;

    /// Create a context that compiles inline source text. The engine takes
    /// ownership of `source`.
    fn make_data_context(&self, source: CString) -> *mut c_void;

    /// Create a context that compiles from a file path. The engine takes
    /// ownership of `input_path`.
    fn make_file_context(&self, input_path: CString) -> *mut c_void;

    /// Bind the option block to the context. Replaces any previous options.
    ///
    /// # Safety
    ///
    /// `ctx` must be a live handle from this engine. The buffers and cookies
    /// referenced by `options` must outlive the context.
    unsafe fn set_options(&self, ctx: *mut c_void, options: EngineOptions);

    /// Run the compile step to completion on the calling thread. Returns the
    /// engine status code (`STATUS_OK` on success).
    ///
    /// # Safety
    ///
    /// `ctx` must be a live handle from this engine with options bound.
    unsafe fn compile(&self, ctx: *mut c_void) -> i32;

    /// Generated output text, present after a successful compile.
    ///
    /// # Safety
    ///
    /// `ctx` must be a live handle from this engine.
    unsafe fn output_string(&self, ctx: *mut c_void) -> Option<String>;

    /// Generated source map, if one was requested and produced.
    ///
    /// # Safety
    ///
    /// `ctx` must be a live handle from this engine.
    unsafe fn source_map_string(&self, ctx: *mut c_void) -> Option<String>;

    /// Every file the compile touched, in resolution order. Empty is valid.
    ///
    /// # Safety
    ///
    /// `ctx` must be a live handle from this engine.
    unsafe fn included_files(&self, ctx: *mut c_void) -> Vec<String>;

    /// Status code of the last compile (0 = success).
    ///
    /// # Safety
    ///
    /// `ctx` must be a live handle from this engine.
    unsafe fn error_status(&self, ctx: *mut c_void) -> i32;

    /// Human-readable error message, present after a failed compile.
    ///
    /// # Safety
    ///
    /// `ctx` must be a live handle from this engine.
    unsafe fn error_message(&self, ctx: *mut c_void) -> Option<String>;

    /// Path of the file the error was reported in, when known.
    ///
    /// # Safety
    ///
    /// `ctx` must be a live handle from this engine.
    unsafe fn error_file(&self, ctx: *mut c_void) -> Option<String>;

    /// 1-based error line, when known.
    ///
    /// # Safety
    ///
    /// `ctx` must be a live handle from this engine.
    unsafe fn error_line(&self, ctx: *mut c_void) -> Option<u32>;

    /// 1-based error column, when known.
    ///
    /// # Safety
    ///
    /// `ctx` must be a live handle from this engine.
    unsafe fn error_column(&self, ctx: *mut c_void) -> Option<u32>;

    /// The engine's own structured error payload (a fixed JSON schema),
    /// passed through to the host opaquely.
    ///
    /// # Safety
    ///
    /// `ctx` must be a live handle from this engine.
    unsafe fn error_json(&self, ctx: *mut c_void) -> Option<String>;

    /// Destroy the context and everything the engine allocated for it.
    /// Calling this twice on the same handle is undefined behavior; the job
    /// layer guarantees exactly-once destruction.
    ///
    /// # Safety
    ///
    /// `ctx` must be a live handle from this engine, and must not be used
    /// again afterwards.
    unsafe fn destroy_context(&self, ctx: *mut c_void);
}
