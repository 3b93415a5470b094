/*
 * sassling-grass
 * Copyright (c) 2025 Posit, PBC
 *
 * Binds the grass crate (a pure-Rust sass implementation targeting
 * dart-sass) behind the sassling context interface, so the same job and
 * bridge layer can drive it interchangeably with a C engine.
 *
 * Importer hooks are surfaced through `grass::Fs`: grass probes candidate
 * paths while resolving `@use`/`@import`, and `BridgeFs` offers each probe
 * to the registered importers (highest priority first) before falling back
 * to the real file system. Hooks therefore see resolver candidates (e.g.
 * `theme.scss`, `_theme.scss`) rather than the literal import url; this is
 * inherent to the adapter and documented on `GrassEngine`.
 *
 * grass exposes no custom-function hook, so registering functions against
 * this engine reports a compile error up front. Nested and compact output
 * styles degrade to expanded (grass implements expanded and compressed),
 * and no source map is produced.
 */

use std::collections::HashMap;
use std::ffi::CString;
use std::fmt;
use std::io;
use std::os::raw::c_void;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use grass::{Fs, InputSyntax, Options, OutputStyle, StdFs};

use sassling_engine::{
    Engine, EngineOptions, ImporterEntry, ImporterResult, STATUS_COMPILE_ERROR, STATUS_OK,
    view_str,
};

#[derive(Debug)]
enum Input {
    Data(CString),
    File(CString),
}

struct ErrorInfo {
    message: String,
    file: String,
}

struct GrassContext {
    input: Input,
    options: EngineOptions,
    output: Option<String>,
    included_files: Vec<String>,
    error: Option<ErrorInfo>,
}

impl GrassContext {
    fn new(input: Input) -> Self {
        GrassContext {
            input,
            options: EngineOptions::default(),
            output: None,
            included_files: Vec::new(),
            error: None,
        }
    }
}

/// Adapter implementing `grass::Fs` over the registered importer hooks.
///
/// Resolved bodies are cached per probed path so grass's is_file/read pair
/// invokes each importer at most once per candidate, and every read is
/// recorded for included-files reporting. A record without a literal body
/// is a path redirect: the body is loaded from the redirect target through
/// the fallback file system, and the target is what gets reported.
struct BridgeFs {
    importers: Vec<ImporterEntry>,
    resolved: Mutex<HashMap<PathBuf, Resolved>>,
    reads: Mutex<Vec<String>>,
    importer_error: Mutex<Option<String>>,
    fallback: StdFs,
}

/// One import settled by the importer chain: the body grass will compile
/// and the path reported in included-files (the redirect target for
/// path-redirect replies, the display name for literal-content replies).
#[derive(Clone)]
struct Resolved {
    display: String,
    body: String,
}

impl BridgeFs {
    fn new(importers: Vec<ImporterEntry>) -> Self {
        BridgeFs {
            importers,
            resolved: Mutex::new(HashMap::new()),
            reads: Mutex::new(Vec::new()),
            importer_error: Mutex::new(None),
            fallback: StdFs,
        }
    }

    /// Offer a resolver probe to the importer chain. Returns the settled
    /// import if some importer handles the probe.
    fn probe(&self, path: &Path) -> Option<Resolved> {
        if let Some(hit) = self.resolved.lock().unwrap().get(path) {
            return Some(hit.clone());
        }
        let url = path.to_string_lossy();
        for entry in &self.importers {
            match (entry.hook)(&url, "", entry.cookie) {
                ImporterResult::NotHandled => continue,
                ImporterResult::Error(message) => {
                    *self.importer_error.lock().unwrap() = Some(message);
                    return None;
                }
                ImporterResult::Imports(records) => {
                    let resolved = records.into_iter().find_map(|r| self.settle(r))?;
                    self.resolved
                        .lock()
                        .unwrap()
                        .insert(path.to_path_buf(), resolved.clone());
                    return Some(resolved);
                }
            }
        }
        None
    }

    /// Turn one import record into a compilable body: literal contents are
    /// used as-is, a record without contents redirects to a path loaded
    /// through the fallback file system.
    fn settle(&self, record: sassling_engine::ImportRecord) -> Option<Resolved> {
        match record.contents {
            Some(body) => Some(Resolved {
                display: record.path,
                body,
            }),
            None => match self.fallback.read(Path::new(&record.path)) {
                Ok(bytes) => Some(Resolved {
                    body: String::from_utf8_lossy(&bytes).into_owned(),
                    display: record.path,
                }),
                Err(_) => {
                    *self.importer_error.lock().unwrap() = Some(format!(
                        "File to import not found or unreadable: {}",
                        record.path
                    ));
                    None
                }
            },
        }
    }

    fn take_reads(&self) -> Vec<String> {
        std::mem::take(&mut self.reads.lock().unwrap())
    }

    fn take_error(&self) -> Option<String> {
        self.importer_error.lock().unwrap().take()
    }
}

impl fmt::Debug for BridgeFs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeFs")
            .field("importers", &self.importers.len())
            .finish()
    }
}

impl Fs for BridgeFs {
    fn is_dir(&self, path: &Path) -> bool {
        self.fallback.is_dir(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        if self.probe(path).is_some() {
            return true;
        }
        self.fallback.is_file(path)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        if let Some(resolved) = self.probe(path) {
            self.reads.lock().unwrap().push(resolved.display);
            return Ok(resolved.body.into_bytes());
        }
        if let Some(message) = self.take_error() {
            return Err(io::Error::other(message));
        }
        let bytes = self.fallback.read(path)?;
        self.reads
            .lock()
            .unwrap()
            .push(path.to_string_lossy().into_owned());
        Ok(bytes)
    }
}

/// grass behind the sassling context interface.
#[derive(Debug, Default)]
pub struct GrassEngine;

impl GrassEngine {
    pub fn new() -> Self {
        GrassEngine
    }
}

/// # Safety
///
/// `ctx` must be a live handle produced by this engine.
unsafe fn ctx_mut<'a>(ctx: *mut c_void) -> &'a mut GrassContext {
    unsafe { &mut *ctx.cast::<GrassContext>() }
}

impl Engine for GrassEngine {
    fn version(&self) -> &str {
        concat!("sassling-grass/", env!("CARGO_PKG_VERSION"))
    }

    fn make_data_context(&self, source: CString) -> *mut c_void {
        Box::into_raw(Box::new(GrassContext::new(Input::Data(source)))).cast()
    }

    fn make_file_context(&self, input_path: CString) -> *mut c_void {
        Box::into_raw(Box::new(GrassContext::new(Input::File(input_path)))).cast()
    }

    unsafe fn set_options(&self, ctx: *mut c_void, options: EngineOptions) {
        unsafe { ctx_mut(ctx) }.options = options;
    }

    unsafe fn compile(&self, ctx: *mut c_void) -> i32 {
        let ctx = unsafe { ctx_mut(ctx) };
        let origin = match &ctx.input {
            Input::Data(_) => unsafe { view_str(ctx.options.input_path) }
                .unwrap_or("stdin")
                .to_string(),
            Input::File(path) => path.to_string_lossy().into_owned(),
        };

        if !ctx.options.functions.is_empty() {
            ctx.error = Some(ErrorInfo {
                message: "custom function hooks are not supported by the grass engine"
                    .to_string(),
                file: origin,
            });
            return STATUS_COMPILE_ERROR;
        }

        let style = match ctx.options.output_style {
            sassling_engine::OutputStyle::Compressed => OutputStyle::Compressed,
            _ => OutputStyle::Expanded,
        };
        let load_paths: Vec<PathBuf> = unsafe { view_str(ctx.options.include_path) }
            .map(|joined| {
                let sep = if cfg!(windows) { ';' } else { ':' };
                joined
                    .split(sep)
                    .filter(|p| !p.is_empty())
                    .map(PathBuf::from)
                    .collect()
            })
            .unwrap_or_default();

        let fs = BridgeFs::new(ctx.options.importers_by_priority());
        let mut options = Options::default()
            .fs(&fs)
            .style(style)
            .load_paths(&load_paths);
        if ctx.options.is_indented_syntax {
            options = options.input_syntax(InputSyntax::Sass);
        }

        let result = match &ctx.input {
            Input::Data(data) => match data.to_str() {
                Ok(text) => grass::from_string(text, &options),
                Err(_) => {
                    ctx.error = Some(ErrorInfo {
                        message: "source is not valid UTF-8".to_string(),
                        file: origin,
                    });
                    return STATUS_COMPILE_ERROR;
                }
            },
            Input::File(path) => grass::from_path(path.to_string_lossy().as_ref(), &options),
        };

        match result {
            Ok(css) => {
                if matches!(ctx.input, Input::File(_)) {
                    ctx.included_files.push(origin);
                }
                ctx.included_files.extend(fs.take_reads());
                ctx.output = Some(css);
                STATUS_OK
            }
            Err(e) => {
                let message = match fs.take_error() {
                    Some(importer_message) => importer_message,
                    None => e.to_string(),
                };
                ctx.error = Some(ErrorInfo {
                    message,
                    file: origin,
                });
                STATUS_COMPILE_ERROR
            }
        }
    }

    unsafe fn output_string(&self, ctx: *mut c_void) -> Option<String> {
        unsafe { ctx_mut(ctx) }.output.clone()
    }

    unsafe fn source_map_string(&self, _ctx: *mut c_void) -> Option<String> {
        // grass does not emit source maps
        None
    }

    unsafe fn included_files(&self, ctx: *mut c_void) -> Vec<String> {
        unsafe { ctx_mut(ctx) }.included_files.clone()
    }

    unsafe fn error_status(&self, ctx: *mut c_void) -> i32 {
        if unsafe { ctx_mut(ctx) }.error.is_some() {
            STATUS_COMPILE_ERROR
        } else {
            STATUS_OK
        }
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

    unsafe fn error_line(&self, _ctx: *mut c_void) -> Option<u32> {
        None
    }

    unsafe fn error_column(&self, _ctx: *mut c_void) -> Option<u32> {
        None
    }

    unsafe fn error_json(&self, ctx: *mut c_void) -> Option<String> {
        let error = unsafe { ctx_mut(ctx) }.error.as_ref()?;
        Some(
            serde_json::json!({
                "status": STATUS_COMPILE_ERROR,
                "message": error.message,
                "file": error.file,
                "formatted": format!("Error: {}", error.message),
            })
            .to_string(),
        )
    }

    unsafe fn destroy_context(&self, ctx: *mut c_void) {
        drop(unsafe { Box::from_raw(ctx.cast::<GrassContext>()) });
    }
}
