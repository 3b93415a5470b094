//! Shared test support: renderers and an instrumented engine wrapper.

#![allow(dead_code)]

use std::collections::HashSet;
use std::ffi::CString;
use std::os::raw::c_void;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use sassling::Renderer;
use sassling_engine::{Engine, EngineOptions};
use sassling_mini::MiniEngine;

pub fn mini_renderer() -> Renderer {
    Renderer::new(Arc::new(MiniEngine::new()))
}

/// Wraps an engine and counts context creation/destruction, panicking on a
/// double destroy. Used to verify exactly-once release.
pub struct CountingEngine {
    inner: MiniEngine,
    created: AtomicUsize,
    destroyed: AtomicUsize,
    live: Mutex<HashSet<usize>>,
}

impl CountingEngine {
    pub fn new() -> Self {
        CountingEngine {
            inner: MiniEngine::new(),
            created: AtomicUsize::new(0),
            destroyed: AtomicUsize::new(0),
            live: Mutex::new(HashSet::new()),
        }
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> usize {
        self.live.lock().unwrap().len()
    }

    fn track(&self, ctx: *mut c_void) -> *mut c_void {
        self.created.fetch_add(1, Ordering::SeqCst);
        let fresh = self.live.lock().unwrap().insert(ctx as usize);
        assert!(fresh, "engine handed out a live handle twice");
        ctx
    }
}

impl Engine for CountingEngine {
    fn version(&self) -> &str {
        self.inner.version()
    }

    fn make_data_context(&self, source: CString) -> *mut c_void {
        self.track(self.inner.make_data_context(source))
    }

    fn make_file_context(&self, input_path: CString) -> *mut c_void {
        self.track(self.inner.make_file_context(input_path))
    }

    unsafe fn set_options(&self, ctx: *mut c_void, options: EngineOptions) {
        unsafe { self.inner.set_options(ctx, options) }
    }

    unsafe fn compile(&self, ctx: *mut c_void) -> i32 {
        unsafe { self.inner.compile(ctx) }
    }

    unsafe fn output_string(&self, ctx: *mut c_void) -> Option<String> {
        unsafe { self.inner.output_string(ctx) }
    }

    unsafe fn source_map_string(&self, ctx: *mut c_void) -> Option<String> {
        unsafe { self.inner.source_map_string(ctx) }
    }

    unsafe fn included_files(&self, ctx: *mut c_void) -> Vec<String> {
        unsafe { self.inner.included_files(ctx) }
    }

    unsafe fn error_status(&self, ctx: *mut c_void) -> i32 {
        unsafe { self.inner.error_status(ctx) }
    }

    unsafe fn error_message(&self, ctx: *mut c_void) -> Option<String> {
        unsafe { self.inner.error_message(ctx) }
    }

    unsafe fn error_file(&self, ctx: *mut c_void) -> Option<String> {
        unsafe { self.inner.error_file(ctx) }
    }

    unsafe fn error_line(&self, ctx: *mut c_void) -> Option<u32> {
        unsafe { self.inner.error_line(ctx) }
    }

    unsafe fn error_column(&self, ctx: *mut c_void) -> Option<u32> {
        unsafe { self.inner.error_column(ctx) }
    }

    unsafe fn error_json(&self, ctx: *mut c_void) -> Option<String> {
        unsafe { self.inner.error_json(ctx) }
    }

    unsafe fn destroy_context(&self, ctx: *mut c_void) {
        let was_live = self.live.lock().unwrap().remove(&(ctx as usize));
        assert!(was_live, "context handle destroyed twice");
        self.destroyed.fetch_add(1, Ordering::SeqCst);
        unsafe { self.inner.destroy_context(ctx) }
    }
}
