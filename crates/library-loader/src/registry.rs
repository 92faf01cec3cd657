use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::config::{HookSymbols, RegistryConfig};
use crate::error::{Error, Result};
use crate::hooks::{self, HookKind};
use crate::module::{ManifestHint, ModuleHandle, ModuleLoader};
use crate::native::NativeLoader;

/// Identifies one open/close lifetime of a path.
///
/// Loading a path again after it was fully unloaded yields a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LibraryId(pub u64);

/// Snapshot of a registry entry. Holds no reference to the module itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedLibrary {
    pub path: PathBuf,
    pub id: LibraryId,
    pub ref_count: usize,
}

#[derive(Debug, Default)]
pub struct ShutdownReport {
    pub closed: usize,
    pub errors: Vec<Error>,
}

struct RegistryEntry<M> {
    id: LibraryId,
    module: M,
    ref_count: usize,
}

impl<M> RegistryEntry<M> {
    fn snapshot(&self, path: &Path) -> LoadedLibrary {
        LoadedLibrary {
            path: path.to_path_buf(),
            id: self.id,
            ref_count: self.ref_count,
        }
    }
}

/// Reference-counted map of opened modules behind a single mutex.
///
/// Lifecycle hooks run while the lock is held, so they must not call back
/// into the registry and must not block for long.
pub struct LibraryRegistry<L: ModuleLoader> {
    loader: L,
    hook_symbols: HookSymbols,
    next_id: AtomicU64,
    inner: Mutex<HashMap<PathBuf, RegistryEntry<L::Module>>>,
}

impl LibraryRegistry<NativeLoader> {
    /// Registry over the platform loader with default settings.
    pub fn native() -> Self {
        Self::new(NativeLoader::default())
    }

    pub fn from_config(config: &RegistryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(
            NativeLoader::new(config.native),
            config.hooks.clone(),
        ))
    }
}

impl<L: ModuleLoader> LibraryRegistry<L> {
    pub fn new(loader: L) -> Self {
        Self::build(loader, HookSymbols::default())
    }

    pub fn with_hook_symbols(loader: L, hook_symbols: HookSymbols) -> Result<Self> {
        hook_symbols.validate()?;
        Ok(Self::build(loader, hook_symbols))
    }

    fn build(loader: L, hook_symbols: HookSymbols) -> Self {
        Self {
            loader,
            hook_symbols,
            next_id: AtomicU64::new(0),
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub fn hook_symbols(&self) -> &HookSymbols {
        &self.hook_symbols
    }

    /// Loads `path`, or takes another reference if it is already loaded.
    ///
    /// The first load opens the module and runs its initialize hook if it
    /// exports one. If opening, resolving or running the hook fails, the
    /// module is closed again and the registry is left as it was. Every
    /// successful call must be balanced by one [`unload`](Self::unload).
    pub fn load(
        &self,
        path: impl AsRef<Path>,
        manifest: impl Into<ManifestHint>,
    ) -> Result<LoadedLibrary> {
        let path = path.as_ref();
        let mut map = self.lock();

        if let Some(entry) = map.get_mut(path) {
            entry.ref_count += 1;
            tracing::trace!(
                path = %path.display(),
                ref_count = entry.ref_count,
                "library reference acquired"
            );
            return Ok(entry.snapshot(path));
        }

        let manifest = manifest.into();
        let module = self
            .loader
            .open(path, &manifest)
            .map_err(|source| Error::open(path, source))?;

        if let Err(err) = self.run_hook(path, &module, HookKind::Initialize) {
            tracing::warn!(path = %path.display(), error = %err, "library initialization failed");
            if let Err(source) = module.close() {
                tracing::warn!(
                    path = %path.display(),
                    error = %source,
                    "failed to close library after initialization failure"
                );
            }
            return Err(err);
        }

        let id = LibraryId(
            self.next_id
                .fetch_add(1, Ordering::Relaxed)
                .saturating_add(1),
        );
        let entry = RegistryEntry {
            id,
            module,
            ref_count: 1,
        };
        let loaded = entry.snapshot(path);
        map.insert(path.to_path_buf(), entry);
        tracing::debug!(path = %path.display(), id = id.0, "library loaded");
        Ok(loaded)
    }

    /// Drops one reference to `path`, returning how many remain.
    ///
    /// When the last reference goes, the uninitialize hook runs (if exported)
    /// and the module is closed. The entry is removed even if the hook panics
    /// or the close fails; those failures are still returned.
    ///
    /// Code or data from the module that is still referenced elsewhere becomes
    /// invalid once the module is closed. The registry cannot detect this.
    pub fn unload(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let mut map = self.lock();

        let entry = match map.entry(path.to_path_buf()) {
            Entry::Vacant(_) => return Err(Error::not_found(path)),
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                entry.ref_count = entry.ref_count.saturating_sub(1);
                if entry.ref_count > 0 {
                    tracing::trace!(
                        path = %path.display(),
                        ref_count = entry.ref_count,
                        "library reference released"
                    );
                    return Ok(entry.ref_count);
                }
                occupied.remove()
            }
        };

        let hook_result = self.run_hook(path, &entry.module, HookKind::Uninitialize);
        if let Err(err) = &hook_result {
            tracing::warn!(path = %path.display(), error = %err, "library uninitialization failed");
        }
        let close_result = entry
            .module
            .close()
            .map_err(|source| Error::close(path, source));
        match &close_result {
            Ok(()) => tracing::debug!(path = %path.display(), id = entry.id.0, "library unloaded"),
            Err(err) => tracing::warn!(path = %path.display(), error = %err, "library close failed"),
        }

        hook_result?;
        close_result?;
        Ok(0)
    }

    /// Returns a snapshot of the entry for `path`, if it is loaded.
    pub fn find_library(&self, path: impl AsRef<Path>) -> Option<LoadedLibrary> {
        let path = path.as_ref();
        self.lock().get(path).map(|entry| entry.snapshot(path))
    }

    pub fn is_library_loaded(&self, path: impl AsRef<Path>) -> bool {
        self.find_library(path).is_some()
    }

    /// Runs `f` with a borrow of the live module for `path`.
    ///
    /// The registry lock is held while `f` runs, so `f` must not call back
    /// into the registry.
    pub fn with_library<R>(
        &self,
        path: impl AsRef<Path>,
        f: impl FnOnce(&L::Module) -> R,
    ) -> Option<R> {
        let map = self.lock();
        map.get(path.as_ref()).map(|entry| f(&entry.module))
    }

    pub fn ref_count(&self, path: impl AsRef<Path>) -> usize {
        self.lock()
            .get(path.as_ref())
            .map(|entry| entry.ref_count)
            .unwrap_or(0)
    }

    /// All loaded libraries, ordered by path.
    pub fn loaded_libraries(&self) -> Vec<LoadedLibrary> {
        let map = self.lock();
        let mut out: Vec<_> = map
            .iter()
            .map(|(path, entry)| entry.snapshot(path))
            .collect();
        out.sort_by(|a, b| a.path.cmp(&b.path));
        out
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Closes every loaded module regardless of its reference count.
    ///
    /// Uninitialize hooks are not run. The registry stays usable afterwards.
    pub fn shutdown(&self) -> ShutdownReport {
        let drained: Vec<_> = self.lock().drain().collect();
        let mut report = ShutdownReport::default();
        for (path, entry) in drained {
            match entry.module.close() {
                Ok(()) => report.closed += 1,
                Err(source) => report.errors.push(Error::close(&path, source)),
            }
        }
        if report.closed > 0 || !report.errors.is_empty() {
            tracing::debug!(
                closed = report.closed,
                failed = report.errors.len(),
                "library registry shut down"
            );
        }
        report
    }

    fn run_hook(&self, path: &Path, module: &L::Module, kind: HookKind) -> Result<bool> {
        let symbol = self.hook_symbols.symbol(kind);
        if !module.has_symbol(symbol) {
            return Ok(false);
        }
        let hook = module
            .hook(symbol)
            .map_err(|source| Error::symbol_lookup(path, symbol, source))?;
        hooks::invoke_guarded(&hook).map_err(|message| match kind {
            HookKind::Initialize => Error::initialize_hook(path, message),
            HookKind::Uninitialize => Error::uninitialize_hook(path, message),
        })?;
        tracing::trace!(path = %path.display(), hook = kind.as_str(), "library hook ran");
        Ok(true)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, RegistryEntry<L::Module>>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<L: ModuleLoader> Drop for LibraryRegistry<L> {
    fn drop(&mut self) {
        let map = self
            .inner
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for (path, entry) in map.drain() {
            tracing::debug!(
                path = %path.display(),
                ref_count = entry.ref_count,
                "force closing library on registry drop"
            );
            if let Err(err) = entry.module.close() {
                tracing::warn!(path = %path.display(), error = %err, "library close failed");
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/registry_tests.rs"]
mod tests;
