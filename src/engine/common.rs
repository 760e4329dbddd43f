// src/engine/common.rs
//
// Common utilities shared across engine modules.
// Codec libraries are fed attacker-controlled bytes; a panic inside one of
// them must surface as an error on this request, not unwind the caller.

use crate::error::IngestError;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

pub type EngineResult<T> = std::result::Result<T, IngestError>;

/// Run `f`, converting any panic into `IngestError::InternalPanic` tagged
/// with `stage`.
pub fn run_with_panic_policy<T, F>(stage: &'static str, f: F) -> EngineResult<T>
where
    F: FnOnce() -> EngineResult<T>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!(stage, %message, "codec panicked");
            Err(IngestError::internal_panic(format!("{stage}: {message}")))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
