//! Error types for render operations.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! The taxonomy is deliberately small:
//! - `InvalidOption`: malformed configuration, always surfaced before any
//!   engine call is made.
//! - `Compile`: the engine reported a non-zero status; carries the engine's
//!   structured diagnostic.
//! - `Internal`: a bridge invariant was violated (e.g. a job driven past a
//!   terminal state). Indicates a bug in this crate, not in user input.
//!
//! Host-callback failures (panics or host-reported errors) never appear
//! here: the bridge converts them into engine error values, so they surface
//! as an ordinary `Compile` error.

use thiserror::Error;

use crate::result::CompileFailure;

/// Errors surfaced by the render entry points.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Malformed configuration, reported before any engine call.
    #[error("invalid option: {0}")]
    InvalidOption(String),

    /// The engine reported a compile failure.
    #[error("compilation failed: {}", .0.message)]
    Compile(CompileFailure),

    /// A bridge invariant was violated; not recoverable.
    #[error("internal bridge fault: {0}")]
    Internal(String),
}

impl RenderError {
    /// The engine's structured failure payload, when this is a compile error.
    pub fn compile_failure(&self) -> Option<&CompileFailure> {
        match self {
            RenderError::Compile(failure) => Some(failure),
            _ => None,
        }
    }
}
