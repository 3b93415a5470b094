//! Importer and function bridges.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! A bridge wraps one host callback and presents it to the engine as a
//! plain function pointer plus an opaque cookie. The trampoline functions
//! here match the engine hook signatures; the cookie is a non-owning
//! pointer to the heap-pinned bridge, which the owning job keeps alive
//! until its engine context is destroyed.
//!
//! The engine's side of the contract is "a hook returns a value, always":
//! unwinding through the engine's call frame is undefined behavior in the C
//! engines this layer targets. Both trampolines therefore run the host
//! callback under `catch_unwind` and convert panics and host-reported
//! errors into engine error values, which the engine reports as an
//! ordinary compile error.

use std::os::raw::c_void;
use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::trace;

use sassling_engine::{ImportRecord, ImporterResult, Value};

use crate::config::{FunctionCallback, ImporterCallback, ImporterReply};

/// One registered importer, pinned on the heap for the job's lifetime.
pub(crate) struct ImporterBridge {
    callback: ImporterCallback,
}

impl ImporterBridge {
    pub(crate) fn new(callback: ImporterCallback) -> Box<Self> {
        Box::new(ImporterBridge { callback })
    }

    fn invoke(&self, current: &str, previous: &str) -> ImporterResult {
        trace!(current, previous, "importer bridge invoked");
        match catch_unwind(AssertUnwindSafe(|| (self.callback)(current, previous))) {
            Ok(reply) => convert_reply(reply),
            Err(payload) => ImporterResult::Error(format!(
                "importer callback panicked: {}",
                panic_message(&payload)
            )),
        }
    }
}

/// One registered host function, pinned on the heap for the job's lifetime.
pub(crate) struct FunctionBridge {
    callback: FunctionCallback,
}

impl FunctionBridge {
    pub(crate) fn new(callback: FunctionCallback) -> Box<Self> {
        Box::new(FunctionBridge { callback })
    }

    fn invoke(&self, args: &[Value]) -> Value {
        trace!(argc = args.len(), "function bridge invoked");
        match catch_unwind(AssertUnwindSafe(|| (self.callback)(args))) {
            Ok(Ok(value)) => value,
            Ok(Err(message)) => Value::Error(message),
            Err(payload) => Value::Error(format!(
                "function callback panicked: {}",
                panic_message(&payload)
            )),
        }
    }
}

/// Engine-facing importer hook. `cookie` identifies the bridge.
pub(crate) fn importer_trampoline(
    current: &str,
    previous: &str,
    cookie: *mut c_void,
) -> ImporterResult {
    // Cookie installed by the materializer; points at a live ImporterBridge
    // owned by the job whose compile step is running.
    let bridge = unsafe { &*cookie.cast::<ImporterBridge>() };
    bridge.invoke(current, previous)
}

/// Engine-facing function hook. `cookie` identifies the bridge.
pub(crate) fn function_trampoline(args: &[Value], cookie: *mut c_void) -> Value {
    let bridge = unsafe { &*cookie.cast::<FunctionBridge>() };
    bridge.invoke(args)
}

fn convert_reply(reply: ImporterReply) -> ImporterResult {
    match reply {
        ImporterReply::Pass => ImporterResult::NotHandled,
        ImporterReply::File(path) => ImporterResult::Imports(vec![ImportRecord::file(
            path.to_string_lossy().into_owned(),
        )]),
        ImporterReply::Contents { file, contents } => {
            ImporterResult::Imports(vec![ImportRecord::contents(file, contents)])
        }
        ImporterReply::Multiple(entries) => ImporterResult::Imports(
            entries
                .into_iter()
                .map(|entry| ImportRecord {
                    path: entry.file,
                    contents: entry.contents,
                    source_map: None,
                })
                .collect(),
        ),
        ImporterReply::Error(message) => ImporterResult::Error(message),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic payload"
    }
}
