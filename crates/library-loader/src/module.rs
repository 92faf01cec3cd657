use std::fmt;
use std::path::Path;

use crate::error::BoxError;

/// Opens modules by path.
pub trait ModuleLoader {
    type Module: ModuleHandle;

    /// Maps the module at `path` into the process.
    ///
    /// `manifest` is passed through untouched from the caller of
    /// [`LibraryRegistry::load`](crate::LibraryRegistry::load).
    fn open(&self, path: &Path, manifest: &ManifestHint) -> Result<Self::Module, BoxError>;
}

/// Exclusive ownership of one opened module.
pub trait ModuleHandle {
    fn has_symbol(&self, name: &str) -> bool;

    /// Resolves `name` as a zero-argument lifecycle hook.
    ///
    /// Callers check [`has_symbol`](Self::has_symbol) first; an error here
    /// means the symbol exists but cannot be used.
    fn hook(&self, name: &str) -> Result<LibraryHook<'_>, BoxError>;

    /// Unmaps the module. Consumes the handle so it cannot be used afterwards.
    fn close(self) -> Result<(), BoxError>
    where
        Self: Sized;
}

/// A resolved lifecycle entry point borrowed from its module.
pub struct LibraryHook<'lib> {
    call: Box<dyn Fn() + 'lib>,
}

impl<'lib> LibraryHook<'lib> {
    pub fn new(call: impl Fn() + 'lib) -> Self {
        Self {
            call: Box::new(call),
        }
    }

    pub fn invoke(&self) {
        (self.call)()
    }
}

impl fmt::Debug for LibraryHook<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryHook").finish_non_exhaustive()
    }
}

/// Auxiliary metadata handed to the loader when a module is first opened.
///
/// The registry does not interpret it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ManifestHint(Option<String>);

impl ManifestHint {
    pub fn none() -> Self {
        Self(None)
    }

    pub fn new(manifest: impl Into<String>) -> Self {
        let manifest = manifest.into();
        if manifest.is_empty() {
            return Self(None);
        }
        Self(Some(manifest))
    }

    pub fn as_str(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }
}

impl From<&str> for ManifestHint {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ManifestHint {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<Option<String>> for ManifestHint {
    fn from(value: Option<String>) -> Self {
        value.map(Self::new).unwrap_or_default()
    }
}
