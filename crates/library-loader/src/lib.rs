//! Reference-counted loading of shared libraries at runtime.
//!
//! [`LibraryRegistry`] maps library paths to opened modules. Loading a path
//! that is already open only bumps its reference count; the module is closed
//! once every load has been matched by an unload. Modules may export
//! `pocoInitializeLibrary` and `pocoUninitializeLibrary`, which run on the
//! first load and the last unload respectively.
//!
//! ```no_run
//! use library_loader::{LibraryRegistry, ManifestHint};
//!
//! # fn main() -> library_loader::Result<()> {
//! let registry = LibraryRegistry::native();
//! registry.load("/opt/plugins/libcodec.so", ManifestHint::none())?;
//! assert!(registry.is_library_loaded("/opt/plugins/libcodec.so"));
//! registry.unload("/opt/plugins/libcodec.so")?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod hooks;
pub mod module;
pub mod native;
mod registry;

pub use config::{HookSymbols, RegistryConfig};
pub use error::{BoxError, Error, Result};
pub use hooks::{HookKind, INITIALIZE_LIBRARY_SYMBOL, UNINITIALIZE_LIBRARY_SYMBOL};
pub use module::{LibraryHook, ManifestHint, ModuleHandle, ModuleLoader};
pub use native::{NativeLibrary, NativeLoader, NativeOptions, library_file_name};
pub use registry::*;
