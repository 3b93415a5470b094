//! Engine option structure and hook registration entries.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! `EngineOptions` deliberately mirrors the C option block of a classic
//! synchronous engine: string-typed options are raw `*const c_char` views
//! into buffers the *caller* owns, and hooks are plain function pointers
//! paired with an opaque cookie the engine passes back unchanged. None of
//! the pointers here are owning; the job layer keeps every referenced buffer
//! and bridge object alive until the context handle is destroyed.

use std::ffi::CStr;
use std::os::raw::{c_char, c_void};
use std::ptr;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Output formatting style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStyle {
    #[default]
    Nested,
    Expanded,
    Compact,
    Compressed,
}

impl std::str::FromStr for OutputStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nested" => Ok(OutputStyle::Nested),
            "expanded" => Ok(OutputStyle::Expanded),
            "compact" => Ok(OutputStyle::Compact),
            "compressed" => Ok(OutputStyle::Compressed),
            other => Err(format!("unknown output style: {:?}", other)),
        }
    }
}

/// One resolved import produced by an importer hook.
///
/// `contents` of `None` means "load `path` through the engine's normal file
/// resolution"; `Some` means the body is supplied literally and `path` is
/// only a display/dedup name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRecord {
    pub path: String,
    pub contents: Option<String>,
    pub source_map: Option<String>,
}

impl ImportRecord {
    pub fn file(path: impl Into<String>) -> Self {
        ImportRecord {
            path: path.into(),
            contents: None,
            source_map: None,
        }
    }

    pub fn contents(path: impl Into<String>, contents: impl Into<String>) -> Self {
        ImportRecord {
            path: path.into(),
            contents: Some(contents.into()),
            source_map: None,
        }
    }
}

/// Result of invoking one importer hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImporterResult {
    /// This importer does not handle the import; the engine tries the next
    /// one and finally its default resolution.
    NotHandled,
    /// One-to-many resolved imports, evaluated in order.
    Imports(Vec<ImportRecord>),
    /// The importer failed; the engine reports a compile error.
    Error(String),
}

/// Importer hook: `(current_import_path, previous_import_path, cookie)`.
///
/// Called synchronously on whatever thread is executing the compile step.
/// Must return without unwinding; fault conversion is the caller's job.
pub type ImporterHookFn = fn(current: &str, previous: &str, cookie: *mut c_void) -> ImporterResult;

/// Function hook: the ordered argument list of the declared signature.
///
/// A returned `Value::Error` is reported by the engine as a compile error at
/// the call site.
pub type FunctionHookFn = fn(args: &[Value], cookie: *mut c_void) -> Value;

/// One registered importer.
///
/// Engines try importers in descending `priority` order until one returns
/// something other than `NotHandled`.
#[derive(Debug, Clone, Copy)]
pub struct ImporterEntry {
    pub hook: ImporterHookFn,
    pub cookie: *mut c_void,
    pub priority: f64,
}

/// One registered host function, keyed by its signature string
/// (e.g. `"double($n)"`).
#[derive(Debug, Clone)]
pub struct FunctionEntry {
    pub signature: String,
    pub hook: FunctionHookFn,
    pub cookie: *mut c_void,
}

impl FunctionEntry {
    /// The bare function name portion of the signature.
    pub fn name(&self) -> &str {
        match self.signature.find('(') {
            Some(idx) => self.signature[..idx].trim(),
            None => self.signature.trim(),
        }
    }
}

/// The engine option block for one compile.
///
/// String fields are non-owning views; null means "not set". The structure
/// is moved into the engine context by `Engine::set_options` and read only
/// while the compile step runs.
#[derive(Debug)]
pub struct EngineOptions {
    pub output_style: OutputStyle,
    pub precision: i32,
    /// Repeated-character indentation string (already expanded from
    /// width + kind by the caller).
    pub indent: *const c_char,
    pub linefeed: *const c_char,
    pub input_path: *const c_char,
    pub output_path: *const c_char,
    /// Platform-separator-joined include path list.
    pub include_path: *const c_char,
    pub source_map_file: *const c_char,
    pub source_map_root: *const c_char,
    pub source_map_embed: bool,
    pub source_map_contents: bool,
    pub omit_source_map_url: bool,
    pub is_indented_syntax: bool,
    pub source_comments: bool,
    pub importers: Vec<ImporterEntry>,
    pub functions: Vec<FunctionEntry>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            output_style: OutputStyle::default(),
            precision: 5,
            indent: ptr::null(),
            linefeed: ptr::null(),
            input_path: ptr::null(),
            output_path: ptr::null(),
            include_path: ptr::null(),
            source_map_file: ptr::null(),
            source_map_root: ptr::null(),
            source_map_embed: false,
            source_map_contents: false,
            omit_source_map_url: false,
            is_indented_syntax: false,
            source_comments: false,
            importers: Vec::new(),
            functions: Vec::new(),
        }
    }
}

impl EngineOptions {
    /// Importers sorted for invocation: highest priority first.
    pub fn importers_by_priority(&self) -> Vec<ImporterEntry> {
        let mut sorted = self.importers.clone();
        sorted.sort_by(|a, b| {
            b.priority
                .partial_cmp(&a.priority)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        sorted
    }
}

/// View a nullable engine option string.
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated buffer that outlives the
/// returned borrow. The job layer guarantees this for every pointer stored
/// in an `EngineOptions` until the owning context is destroyed.
pub unsafe fn view_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        None
    } else {
        unsafe { CStr::from_ptr(ptr) }.to_str().ok()
    }
}
