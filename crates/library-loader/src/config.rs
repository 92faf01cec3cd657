use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::hooks::{HookKind, INITIALIZE_LIBRARY_SYMBOL, UNINITIALIZE_LIBRARY_SYMBOL};
use crate::native::NativeOptions;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub hooks: HookSymbols,
    pub native: NativeOptions,
}

/// Names of the optional lifecycle entry points looked up in each module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HookSymbols {
    pub initialize: String,
    pub uninitialize: String,
}

impl Default for HookSymbols {
    fn default() -> Self {
        Self {
            initialize: INITIALIZE_LIBRARY_SYMBOL.to_string(),
            uninitialize: UNINITIALIZE_LIBRARY_SYMBOL.to_string(),
        }
    }
}

impl HookSymbols {
    pub fn symbol(&self, kind: HookKind) -> &str {
        match kind {
            HookKind::Initialize => &self.initialize,
            HookKind::Uninitialize => &self.uninitialize,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for kind in [HookKind::Initialize, HookKind::Uninitialize] {
            let symbol = self.symbol(kind);
            if symbol.trim().is_empty() {
                return Err(Error::invalid_config(format!(
                    "{} hook symbol must not be empty",
                    kind.as_str()
                )));
            }
            if symbol.contains('\0') {
                return Err(Error::invalid_config(format!(
                    "{} hook symbol `{}` contains a NUL byte",
                    kind.as_str(),
                    symbol.escape_debug()
                )));
            }
        }
        Ok(())
    }
}

impl RegistryConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| Error::io_at(path, source))?;
        let config: Self =
            serde_json::from_str(&text).map_err(|source| Error::json_at(path, source))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.hooks.validate()
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
