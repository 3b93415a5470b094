/*
 * sassling-mini
 * Copyright (c) 2025 Posit, PBC
 *
 * A deliberately small reference engine behind the sassling context
 * interface. It exists so the bridge layer (option buffers, importer and
 * function hooks, job lifecycle) can be exercised end-to-end without
 * linking a C library. It implements only the language slice the bridge
 * contract needs; see `eval.rs`.
 *
 * Contexts are boxed and handed out as raw pointers, exactly the way a C
 * engine hands out opaque handles. The caller owns every option buffer the
 * bound `EngineOptions` points at and destroys each context exactly once.
 */

mod eval;

use std::ffi::CString;
use std::os::raw::c_void;
use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use sassling_engine::{Engine, EngineOptions, STATUS_COMPILE_ERROR, STATUS_OK, view_str};

use eval::{EvalError, Evaluator};

/// Display name used for inline-data compiles, matching the convention of
/// the C engines this stands in for.
const DATA_ORIGIN: &str = "stdin";

#[derive(Debug)]
enum Input {
    Data(CString),
    File(CString),
}

struct ErrorInfo {
    status: i32,
    message: String,
    file: String,
    line: u32,
    column: u32,
}

struct MiniContext {
    input: Input,
    options: EngineOptions,
    output: Option<String>,
    source_map: Option<String>,
    included_files: Vec<String>,
    error: Option<ErrorInfo>,
}

impl MiniContext {
    fn new(input: Input) -> Self {
        MiniContext {
            input,
            options: EngineOptions::default(),
            output: None,
            source_map: None,
            included_files: Vec::new(),
            error: None,
        }
    }

    fn fail(&mut self, err: EvalError) {
        self.error = Some(ErrorInfo {
            status: STATUS_COMPILE_ERROR,
            message: err.message,
            file: err.file,
            line: err.line,
            column: err.column,
        });
    }
}

/// The reference engine. Stateless; one instance can serve any number of
/// concurrent contexts, each compiled on a single thread at a time.
#[derive(Debug, Default)]
pub struct MiniEngine;

impl MiniEngine {
    pub fn new() -> Self {
        MiniEngine
    }
}

/// Recover the context struct behind an opaque handle.
///
/// # Safety
///
/// `ctx` must be a live handle produced by this engine.
unsafe fn ctx_mut<'a>(ctx: *mut c_void) -> &'a mut MiniContext {
    unsafe { &mut *ctx.cast::<MiniContext>() }
}

impl Engine for MiniEngine {
    fn version(&self) -> &str {
        concat!("sassling-mini/", env!("CARGO_PKG_VERSION"))
    }

    fn make_data_context(&self, source: CString) -> *mut c_void {
        Box::into_raw(Box::new(MiniContext::new(Input::Data(source)))).cast()
    }

    fn make_file_context(&self, input_path: CString) -> *mut c_void {
        Box::into_raw(Box::new(MiniContext::new(Input::File(input_path)))).cast()
    }

    unsafe fn set_options(&self, ctx: *mut c_void, options: EngineOptions) {
        let ctx = unsafe { ctx_mut(ctx) };
        ctx.options = options;
    }

    unsafe fn compile(&self, ctx: *mut c_void) -> i32 {
        let ctx = unsafe { ctx_mut(ctx) };
        let (source, origin) = match &ctx.input {
            Input::Data(data) => match data.to_str() {
                Ok(text) => {
                    let origin = unsafe { view_str(ctx.options.input_path) }
                        .unwrap_or(DATA_ORIGIN)
                        .to_string();
                    (text.to_string(), origin)
                }
                Err(_) => {
                    ctx.fail(EvalError {
                        message: "source is not valid UTF-8".to_string(),
                        file: DATA_ORIGIN.to_string(),
                        line: 1,
                        column: 1,
                    });
                    return STATUS_COMPILE_ERROR;
                }
            },
            Input::File(path) => {
                let display = path.to_string_lossy().into_owned();
                match std::fs::read_to_string(Path::new(&display)) {
                    Ok(text) => (text, display),
                    Err(e) => {
                        ctx.fail(EvalError {
                            message: format!("unable to read {}: {}", display, e),
                            file: display,
                            line: 1,
                            column: 1,
                        });
                        return STATUS_COMPILE_ERROR;
                    }
                }
            }
        };

        let mut evaluator = unsafe { Evaluator::new(&ctx.options) };
        if matches!(ctx.input, Input::File(_)) {
            ctx.included_files.push(origin.clone());
        }
        match evaluator.run_root(&source, &origin) {
            Ok(()) => {
                let mut css = evaluator.render();
                ctx.included_files.extend(evaluator.take_included());
                self.attach_source_map(ctx, &origin, &mut css);
                ctx.output = Some(css);
                STATUS_OK
            }
            Err(err) => {
                ctx.fail(err);
                STATUS_COMPILE_ERROR
            }
        }
    }

    unsafe fn output_string(&self, ctx: *mut c_void) -> Option<String> {
        unsafe { ctx_mut(ctx) }.output.clone()
    }

    unsafe fn source_map_string(&self, ctx: *mut c_void) -> Option<String> {
        unsafe { ctx_mut(ctx) }.source_map.clone()
    }

    unsafe fn included_files(&self, ctx: *mut c_void) -> Vec<String> {
        unsafe { ctx_mut(ctx) }.included_files.clone()
    }

    unsafe fn error_status(&self, ctx: *mut c_void) -> i32 {
        unsafe { ctx_mut(ctx) }
            .error
            .as_ref()
            .map(|e| e.status)
            .unwrap_or(STATUS_OK)
    }

    unsafe fn error_message(&self, ctx: *mut c_void) -> Option<String> {
        unsafe { ctx_mut(ctx) }
            .error
            .as_ref()
            .map(|e| e.message.clone())
    }

    unsafe fn error_file(&self, ctx: *mut c_void) -> Option<String> {
        unsafe { ctx_mut(ctx) }.error.as_ref().map(|e| e.file.clone())
    }

    unsafe fn error_line(&self, ctx: *mut c_void) -> Option<u32> {
        unsafe { ctx_mut(ctx) }.error.as_ref().map(|e| e.line)
    }

    unsafe fn error_column(&self, ctx: *mut c_void) -> Option<u32> {
        unsafe { ctx_mut(ctx) }.error.as_ref().map(|e| e.column)
    }

    unsafe fn error_json(&self, ctx: *mut c_void) -> Option<String> {
        let error = unsafe { ctx_mut(ctx) }.error.as_ref()?;
        let formatted = format!(
            "Error: {}\n        on line {} of {}",
            error.message, error.line, error.file
        );
        Some(
            serde_json::json!({
                "status": error.status,
                "message": error.message,
                "file": error.file,
                "line": error.line,
                "column": error.column,
                "formatted": formatted,
            })
            .to_string(),
        )
    }

    unsafe fn destroy_context(&self, ctx: *mut c_void) {
        drop(unsafe { Box::from_raw(ctx.cast::<MiniContext>()) });
    }
}

impl MiniEngine {
    /// Build the (minimal) source map and append the URL comment per the
    /// source-map option flags.
    fn attach_source_map(&self, ctx: &mut MiniContext, origin: &str, css: &mut String) {
        let map_file = match unsafe { view_str(ctx.options.source_map_file) } {
            Some(f) if !f.is_empty() => f.to_string(),
            _ => return,
        };
        // File contexts already list the entry file in included_files.
        let mut sources = Vec::new();
        if ctx.included_files.first().map(String::as_str) != Some(origin) {
            sources.push(origin.to_string());
        }
        sources.extend(ctx.included_files.iter().cloned());
        let output_file = unsafe { view_str(ctx.options.output_path) }.unwrap_or("");
        let map = serde_json::json!({
            "version": 3,
            "file": output_file,
            "sources": sources,
            "names": [],
            "mappings": "",
        })
        .to_string();

        if !ctx.options.omit_source_map_url {
            let url = if ctx.options.source_map_embed {
                format!("data:application/json;base64,{}", BASE64.encode(&map))
            } else {
                map_file.clone()
            };
            css.push_str(&format!("\n/*# sourceMappingURL={} */", url));
        }
        ctx.source_map = Some(map);
    }
}
