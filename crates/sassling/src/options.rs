//! Option materialization: host configuration → engine option block.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! Engines store raw references to string options rather than copies, so
//! every string-typed option is copied into a `CString` held by the buffer
//! bag, and the engine receives only a non-owning view. The bag is owned by
//! the job and outlives the engine context. Scalar options are copied by
//! value and need no retention.
//!
//! Importer registration order maps to engine priority here: the i-th
//! registered importer gets priority `i`, and engines invoke higher
//! priorities first. The last registration therefore acts as the
//! highest-priority override.

use std::ffi::CString;
use std::os::raw::c_char;
use std::path::Path;

use sassling_engine::{EngineOptions, FunctionEntry, ImporterEntry};

use crate::bridge::{FunctionBridge, ImporterBridge, function_trampoline, importer_trampoline};
use crate::config::RenderConfig;
use crate::error::RenderError;

/// Stable storage for every buffer the engine option block points at.
///
/// `CString` contents live on the heap, so pushing more entries never moves
/// previously handed-out pointers.
#[derive(Default)]
pub(crate) struct BufferBag {
    strings: Vec<CString>,
}

impl BufferBag {
    pub(crate) fn retain(&mut self, value: &str) -> Result<*const c_char, RenderError> {
        let owned = CString::new(value).map_err(|_| {
            RenderError::InvalidOption(format!(
                "option value contains an interior NUL byte: {:?}",
                value
            ))
        })?;
        let ptr = owned.as_ptr();
        self.strings.push(owned);
        Ok(ptr)
    }

    fn retain_path(&mut self, value: &Path) -> Result<*const c_char, RenderError> {
        self.retain(&value.to_string_lossy())
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.strings.len()
    }
}

/// Everything the materializer produces for one job: the engine option
/// block, the buffers it points at, and the heap-pinned bridges its hook
/// cookies point at.
pub(crate) struct Materialized {
    pub(crate) options: EngineOptions,
    pub(crate) buffers: BufferBag,
    pub(crate) importer_bridges: Vec<Box<ImporterBridge>>,
    pub(crate) function_bridges: Vec<Box<FunctionBridge>>,
}

impl std::fmt::Debug for Materialized {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Materialized").finish_non_exhaustive()
    }
}

/// Translate a validated configuration into engine-consumable option data.
///
/// Fails with `InvalidOption` before any engine call is made; the caller
/// validates the config first and creates the context only after this
/// returns.
pub(crate) fn materialize(config: &RenderConfig) -> Result<Materialized, RenderError> {
    let mut buffers = BufferBag::default();
    let mut options = EngineOptions::default();

    options.output_style = config.output_style;
    options.precision = config.precision;
    options.source_map_embed = config.source_map_embed;
    options.source_map_contents = config.source_map_contents;
    options.omit_source_map_url = config.omit_source_map_url;
    options.is_indented_syntax = config.indented_syntax;
    options.source_comments = config.source_comments;

    options.indent = buffers.retain(&config.indent_string())?;
    options.linefeed = buffers.retain(config.linefeed.as_str())?;
    if let Some(input_path) = &config.input_path {
        options.input_path = buffers.retain_path(input_path)?;
    }
    if let Some(output_path) = &config.output_path {
        options.output_path = buffers.retain_path(output_path)?;
    }
    if let Some(joined) = config.include_path_string() {
        options.include_path = buffers.retain(&joined)?;
    }
    if let Some(source_map) = &config.source_map {
        options.source_map_file = buffers.retain_path(source_map)?;
    }
    if let Some(root) = &config.source_map_root {
        options.source_map_root = buffers.retain(root)?;
    }

    let mut importer_bridges = Vec::with_capacity(config.importers.len());
    for (index, callback) in config.importers.iter().enumerate() {
        let bridge = ImporterBridge::new(callback.clone());
        let cookie = (&*bridge as *const ImporterBridge).cast_mut().cast();
        options.importers.push(ImporterEntry {
            hook: importer_trampoline,
            cookie,
            priority: index as f64,
        });
        importer_bridges.push(bridge);
    }

    let mut function_bridges = Vec::with_capacity(config.functions.len());
    for (signature, callback) in &config.functions {
        let bridge = FunctionBridge::new(callback.clone());
        let cookie = (&*bridge as *const FunctionBridge).cast_mut().cast();
        options.functions.push(FunctionEntry {
            signature: signature.clone(),
            hook: function_trampoline,
            cookie,
        });
        function_bridges.push(bridge);
    }

    Ok(Materialized {
        options,
        buffers,
        importer_bridges,
        function_bridges,
    })
}
