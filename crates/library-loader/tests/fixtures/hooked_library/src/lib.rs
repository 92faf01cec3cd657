#![allow(non_snake_case)]

use std::ffi::{CStr, c_char};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

static INITIALIZE_CALLS: AtomicU32 = AtomicU32::new(0);
static JOURNAL_PATH: Mutex<Option<PathBuf>> = Mutex::new(None);

fn journal(line: &str) {
    let guard = JOURNAL_PATH
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let Some(path) = guard.as_ref() else {
        return;
    };
    if let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
    {
        let _ = writeln!(file, "{line}");
    }
}

#[unsafe(no_mangle)]
pub extern "C-unwind" fn pocoInitializeLibrary() {
    INITIALIZE_CALLS.fetch_add(1, Ordering::SeqCst);
    journal("initialize");
}

#[unsafe(no_mangle)]
pub extern "C-unwind" fn pocoUninitializeLibrary() {
    journal("uninitialize");
}

#[unsafe(no_mangle)]
pub extern "C" fn hooked_library_initialize_calls() -> u32 {
    INITIALIZE_CALLS.load(Ordering::SeqCst)
}

/// # Safety
///
/// `path` must be null or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hooked_library_set_journal(path: *const c_char) {
    let next = if path.is_null() {
        None
    } else {
        // SAFETY: guaranteed by the caller.
        let raw = unsafe { CStr::from_ptr(path) };
        Some(PathBuf::from(raw.to_string_lossy().into_owned()))
    };
    *JOURNAL_PATH
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner()) = next;
}
