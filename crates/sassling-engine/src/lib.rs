/*
 * sassling-engine
 * Copyright (c) 2025 Posit, PBC
 *
 * Collaborator-facing interface for synchronous style-sheet engines.
 *
 * A compiler engine is modeled the way the classic C libraries expose it:
 * an opaque context handle that options are bound to, a blocking compile
 * entry point, and getters that read results back out of the context. The
 * engine may call back into the host through plain function pointers paired
 * with opaque cookies (see `options::ImporterEntry` / `options::FunctionEntry`).
 *
 * Nothing in this crate owns the string buffers the option structure points
 * at. The caller (the sassling job layer) keeps them alive until the context
 * is destroyed; engines only ever borrow them during `compile`.
 */

mod context;
mod options;
mod value;

pub use context::Engine;
pub use options::{
    EngineOptions, FunctionEntry, FunctionHookFn, ImportRecord, ImporterEntry, ImporterHookFn,
    ImporterResult, OutputStyle, view_str,
};
pub use value::{ListSeparator, Value};

/// Status code an engine reports for a successful compile.
pub const STATUS_OK: i32 = 0;

/// Status code an engine reports for an ordinary compile error.
pub const STATUS_COMPILE_ERROR: i32 = 1;
