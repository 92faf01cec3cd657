use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::module::LibraryHook;

/// Symbol a module may export to be initialized on first load.
pub const INITIALIZE_LIBRARY_SYMBOL: &str = "pocoInitializeLibrary";
/// Symbol a module may export to be uninitialized before its last unload.
pub const UNINITIALIZE_LIBRARY_SYMBOL: &str = "pocoUninitializeLibrary";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    Initialize,
    Uninitialize,
}

impl HookKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::Uninitialize => "uninitialize",
        }
    }
}

/// Extract a human-readable message from a panic payload.
pub fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        return (*msg).to_string();
    }
    if let Some(msg) = payload.downcast_ref::<String>() {
        return msg.clone();
    }
    "non-string panic payload".to_string()
}

/// Run `hook`, returning the panic message if it unwinds.
pub(crate) fn invoke_guarded(hook: &LibraryHook<'_>) -> Result<(), String> {
    catch_unwind(AssertUnwindSafe(|| hook.invoke())).map_err(panic_message)
}
