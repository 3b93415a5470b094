//! Result extraction: read the engine's output out of the context.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! Extraction deep-copies everything the host will see, so the engine
//! context can be destroyed immediately afterwards without the result
//! referencing freed memory. It reads engine state but never mutates it,
//! and always runs before the owning job is released.

use serde::Serialize;

use crate::error::RenderError;
use crate::job::{Job, JobState};

/// Compilation statistics reported alongside the output.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderStats {
    /// Every file the compile touched, in resolution order. Empty is a
    /// valid outcome, not an error.
    pub included_files: Vec<String>,
}

/// Successful render output.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderResult {
    pub css: Vec<u8>,
    /// Source map text, when one was requested and produced.
    pub map: Option<Vec<u8>>,
    pub stats: RenderStats,
}

/// The engine's structured compile diagnostic.
///
/// `json` is the engine's own error payload (a fixed JSON-like schema the
/// engine defines), passed through opaquely; the other fields are the
/// commonly needed pieces pre-extracted from the context.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileFailure {
    pub status: i32,
    pub message: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub json: String,
}

/// Read the compile outcome out of a finished job's context.
pub(crate) fn extract(job: &mut Job) -> Result<RenderResult, RenderError> {
    match job.state() {
        JobState::Succeeded | JobState::Failed => {}
        other => {
            return Err(RenderError::Internal(format!(
                "extract called in state {:?}",
                other
            )));
        }
    }

    let engine = job.engine();
    let ctx = job.ctx();
    // Safety: ctx is the live handle owned by `job`; the job outlives this
    // call and is the only owner.
    unsafe {
        let status = engine.error_status(ctx);
        if status == sassling_engine::STATUS_OK {
            Ok(RenderResult {
                css: engine.output_string(ctx).unwrap_or_default().into_bytes(),
                map: engine.source_map_string(ctx).map(String::into_bytes),
                stats: RenderStats {
                    included_files: engine.included_files(ctx),
                },
            })
        } else {
            let message = engine
                .error_message(ctx)
                .unwrap_or_else(|| "compilation failed".to_string());
            let file = engine.error_file(ctx);
            let line = engine.error_line(ctx);
            let column = engine.error_column(ctx);
            let json = engine.error_json(ctx).unwrap_or_else(|| {
                // Engines normally supply their own payload; synthesize one
                // with the same fields when they don't.
                serde_json::json!({
                    "status": status,
                    "message": message,
                    "file": file,
                    "line": line,
                    "column": column,
                })
                .to_string()
            });
            Err(RenderError::Compile(CompileFailure {
                status,
                message,
                file,
                line,
                column,
                json,
            }))
        }
    }
}
