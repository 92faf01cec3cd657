use std::ffi::c_void;
use std::path::{Path, PathBuf};

use libloading::{Library, Symbol};
use serde::{Deserialize, Serialize};

use crate::error::BoxError;
use crate::module::{LibraryHook, ManifestHint, ModuleHandle, ModuleLoader};

/// ABI of `pocoInitializeLibrary` / `pocoUninitializeLibrary`.
pub type RawLibraryHook = unsafe extern "C-unwind" fn();

/// `dlopen` flags. Ignored on platforms without them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NativeOptions {
    /// Make the module's symbols available to modules opened later (`RTLD_GLOBAL`).
    pub global_symbols: bool,
    /// Resolve function symbols on first call instead of at open (`RTLD_LAZY`).
    pub lazy_binding: bool,
}

#[derive(Debug, Clone, Default)]
pub struct NativeLoader {
    options: NativeOptions,
}

impl NativeLoader {
    pub fn new(options: NativeOptions) -> Self {
        Self { options }
    }

    #[cfg(unix)]
    unsafe fn open_library(&self, path: &Path) -> Result<Library, libloading::Error> {
        use libloading::os::unix;

        let binding = if self.options.lazy_binding {
            unix::RTLD_LAZY
        } else {
            unix::RTLD_NOW
        };
        let visibility = if self.options.global_symbols {
            unix::RTLD_GLOBAL
        } else {
            unix::RTLD_LOCAL
        };
        // SAFETY: forwarded from the caller.
        unsafe { unix::Library::open(Some(path), binding | visibility) }.map(Library::from)
    }

    #[cfg(not(unix))]
    unsafe fn open_library(&self, path: &Path) -> Result<Library, libloading::Error> {
        // SAFETY: forwarded from the caller.
        unsafe { Library::new(path) }
    }
}

impl ModuleLoader for NativeLoader {
    type Module = NativeLibrary;

    fn open(&self, path: &Path, manifest: &ManifestHint) -> Result<NativeLibrary, BoxError> {
        if let Some(manifest) = manifest.as_str() {
            tracing::trace!(path = %path.display(), manifest, "native loader ignores manifest hint");
        }
        // SAFETY: opening a library runs its platform initializers. Which
        // libraries are trusted is decided by whoever calls the registry.
        let library = unsafe { self.open_library(path) }?;
        Ok(NativeLibrary { library })
    }
}

/// A shared library opened by [`NativeLoader`].
#[derive(Debug)]
pub struct NativeLibrary {
    library: Library,
}

impl NativeLibrary {
    /// Resolves an arbitrary symbol.
    ///
    /// # Safety
    ///
    /// `T` must match the actual type of the exported symbol, and the returned
    /// value must not be used after the library is unloaded.
    pub unsafe fn symbol<T>(&self, name: &str) -> Result<Symbol<'_, T>, libloading::Error> {
        // SAFETY: forwarded from the caller.
        unsafe { self.library.get(name.as_bytes()) }
    }
}

impl ModuleHandle for NativeLibrary {
    fn has_symbol(&self, name: &str) -> bool {
        // SAFETY: the pointer is only checked for presence, never dereferenced.
        unsafe { self.library.get::<*const c_void>(name.as_bytes()) }.is_ok()
    }

    fn hook(&self, name: &str) -> Result<LibraryHook<'_>, BoxError> {
        // SAFETY: lifecycle hooks are `extern "C-unwind" fn()` by contract.
        let hook: Symbol<'_, RawLibraryHook> = unsafe { self.library.get(name.as_bytes()) }?;
        Ok(LibraryHook::new(move || {
            // SAFETY: the symbol borrows the library, which stays mapped while
            // the hook exists.
            unsafe { hook() }
        }))
    }

    fn close(self) -> Result<(), BoxError> {
        self.library.close().map_err(Into::into)
    }
}

/// Platform file name of a library called `name`, e.g. `libcodec.so` or `codec.dll`.
pub fn library_file_name(name: &str) -> PathBuf {
    PathBuf::from(libloading::library_filename(name))
}

#[cfg(test)]
#[path = "tests/native_tests.rs"]
mod tests;
