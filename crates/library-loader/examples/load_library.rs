use anyhow::{Context, Result};
use library_loader::{LibraryRegistry, ManifestHint, RegistryConfig};
use tracing_subscriber::EnvFilter;

/// Loads every library given on the command line, lists them, then unloads
/// them again. `LIBRARY_LOADER_CONFIG` may point at a JSON registry config.
fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();

    let config = match std::env::var_os("LIBRARY_LOADER_CONFIG") {
        Some(path) => RegistryConfig::from_json_file(&path)
            .with_context(|| format!("load registry config from {}", path.to_string_lossy()))?,
        None => RegistryConfig::default(),
    };
    let registry = LibraryRegistry::from_config(&config)?;

    let paths: Vec<String> = std::env::args().skip(1).collect();
    if paths.is_empty() {
        eprintln!("usage: load_library <library>...");
        return Ok(());
    }

    let mut errors = Vec::new();
    for path in &paths {
        if let Err(err) = registry.load(path, ManifestHint::none()) {
            errors.push(err);
        }
    }
    if !errors.is_empty() {
        eprintln!("load errors:");
        for err in &errors {
            eprintln!("  - {err}");
        }
    }

    println!("Loaded libraries:");
    for lib in registry.loaded_libraries() {
        println!(
            "  - {} (id {}, refs {})",
            lib.path.display(),
            lib.id.0,
            lib.ref_count
        );
    }

    for lib in registry.loaded_libraries() {
        for _ in 0..lib.ref_count {
            registry
                .unload(&lib.path)
                .with_context(|| format!("unload {}", lib.path.display()))?;
        }
    }
    Ok(())
}
