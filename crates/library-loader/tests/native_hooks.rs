use std::ffi::{CString, c_char};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Mutex, OnceLock};

use anyhow::{Context, Result};
use library_loader::{
    Error, LibraryRegistry, ManifestHint, NativeLibrary, NativeLoader, RegistryConfig,
    library_file_name,
};

static FIXTURE: OnceLock<PathBuf> = OnceLock::new();
// Every registry in this process shares the same OS-level mapping of the
// fixture, so tests that observe its globals must not overlap.
static TEST_MUTEX: Mutex<()> = Mutex::new(());

type InitializeCallsFn = unsafe extern "C" fn() -> u32;
type SetJournalFn = unsafe extern "C" fn(*const c_char);

#[test]
fn native_library_hooks_run_once_per_lifetime() -> Result<()> {
    let _guard = TEST_MUTEX.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let library = fixture_library();
    let temp = tempfile::tempdir().context("create temp dir")?;
    let journal = temp.path().join("hooks.log");
    let registry = LibraryRegistry::native();

    let first = registry.load(library, ManifestHint::none())?;
    let initialized = initialize_calls(&registry, library)?;
    assert!(initialized >= 1, "first load must run the initialize hook");

    let second = registry.load(library, ManifestHint::none())?;
    assert_eq!(first.id, second.id);
    assert_eq!(registry.ref_count(library), 2);
    assert_eq!(initialize_calls(&registry, library)?, initialized);

    set_journal(&registry, library, Some(&journal))?;

    assert_eq!(registry.unload(library)?, 1);
    assert!(registry.is_library_loaded(library));
    assert!(
        !journal.exists(),
        "uninitialize hook must not run before the last unload"
    );

    assert_eq!(registry.unload(library)?, 0);
    assert!(!registry.is_library_loaded(library));
    let lines = std::fs::read_to_string(&journal).context("read hook journal")?;
    assert_eq!(lines.lines().collect::<Vec<_>>(), vec!["uninitialize"]);

    assert!(matches!(
        registry.unload(library),
        Err(Error::NotFound { .. })
    ));
    Ok(())
}

#[test]
fn configured_hook_names_skip_default_hooks() -> Result<()> {
    let _guard = TEST_MUTEX.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let library = fixture_library();
    let temp = tempfile::tempdir().context("create temp dir")?;
    let journal = temp.path().join("hooks.log");

    let default_hooks = LibraryRegistry::native();
    default_hooks.load(library, ManifestHint::none())?;
    let initialized = initialize_calls(&default_hooks, library)?;
    set_journal(&default_hooks, library, Some(&journal))?;

    let config = RegistryConfig::from_json_str(
        r#"{ "hooks": { "initialize": "absent_init", "uninitialize": "absent_fini" } }"#,
    )?;
    let custom_hooks = LibraryRegistry::from_config(&config)?;
    custom_hooks.load(library, ManifestHint::none())?;
    assert_eq!(initialize_calls(&custom_hooks, library)?, initialized);
    custom_hooks.unload(library)?;
    assert!(!custom_hooks.is_library_loaded(library));
    assert!(!journal.exists(), "custom registry must not run default hooks");

    set_journal(&default_hooks, library, None)?;
    default_hooks.unload(library)?;
    Ok(())
}

#[test]
fn dropping_native_registry_closes_outstanding_libraries() -> Result<()> {
    let _guard = TEST_MUTEX.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let library = fixture_library();
    let registry = LibraryRegistry::native();
    registry.load(library, ManifestHint::none())?;
    registry.load(library, ManifestHint::none())?;
    assert_eq!(registry.loaded_libraries().len(), 1);
    assert_eq!(registry.shutdown().closed, 1);
    assert!(registry.is_empty());

    registry.load(library, ManifestHint::none())?;
    drop(registry);

    let fresh = LibraryRegistry::native();
    assert!(!fresh.is_library_loaded(library));
    Ok(())
}

fn initialize_calls(registry: &LibraryRegistry<NativeLoader>, library: &Path) -> Result<u32> {
    let calls = registry
        .with_library(library, |lib: &NativeLibrary| {
            // SAFETY: the fixture exports this symbol with this signature.
            unsafe { lib.symbol::<InitializeCallsFn>("hooked_library_initialize_calls") }
                .map(|f| unsafe { f() })
        })
        .context("fixture must be loaded")??;
    Ok(calls)
}

fn set_journal(
    registry: &LibraryRegistry<NativeLoader>,
    library: &Path,
    journal: Option<&Path>,
) -> Result<()> {
    let journal = journal
        .map(|path| CString::new(path.to_string_lossy().into_owned()))
        .transpose()
        .context("journal path contains NUL")?;
    let ptr = journal.as_ref().map_or(std::ptr::null(), |path| path.as_ptr());
    registry
        .with_library(library, |lib| {
            // SAFETY: the fixture exports this symbol with this signature and
            // copies the string before returning.
            unsafe { lib.symbol::<SetJournalFn>("hooked_library_set_journal") }
                .map(|f| unsafe { f(ptr) })
        })
        .context("fixture must be loaded")??;
    Ok(())
}

fn fixture_library() -> &'static Path {
    FIXTURE.get_or_init(|| {
        build_fixture_library("tests/fixtures/hooked_library/Cargo.toml", "hooked_library")
    })
}

fn build_fixture_library(manifest_rel: &str, crate_name: &str) -> PathBuf {
    let crate_root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let manifest_path = crate_root.join(manifest_rel);
    let manifest_dir = manifest_path
        .parent()
        .expect("fixture manifest must have parent dir");
    let target_dir = manifest_dir.join("target");

    let status = Command::new(cargo_bin())
        .arg("build")
        .arg("--manifest-path")
        .arg(&manifest_path)
        .arg("--target-dir")
        .arg(&target_dir)
        .current_dir(manifest_dir)
        .status()
        .expect("spawn cargo build for fixture library");
    assert!(
        status.success(),
        "fixture build failed: {}",
        manifest_path.display()
    );

    let file_name = library_file_name(&crate_name.replace('-', "_"))
        .to_string_lossy()
        .into_owned();
    let expected = target_dir.join("debug").join(&file_name);
    if expected.exists() {
        return expected;
    }
    find_file_recursive(&target_dir.join("debug"), &file_name)
        .unwrap_or_else(|| panic!("cannot locate fixture library {file_name}"))
}

fn cargo_bin() -> String {
    std::env::var("CARGO").unwrap_or_else(|_| "cargo".to_string())
}

fn find_file_recursive(root: &Path, file_name: &str) -> Option<PathBuf> {
    for entry in walkdir::WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
    {
        if !entry.file_type().is_file() {
            continue;
        }
        if entry
            .file_name()
            .to_string_lossy()
            .eq_ignore_ascii_case(file_name)
        {
            return Some(entry.path().to_path_buf());
        }
    }
    None
}
