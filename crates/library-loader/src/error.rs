use std::path::{Path, PathBuf};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Error type returned by the module capability traits.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to open library `{}`: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: BoxError,
    },
    #[error("failed to resolve `{symbol}` in `{}`: {source}", .path.display())]
    SymbolLookup {
        path: PathBuf,
        symbol: String,
        #[source]
        source: BoxError,
    },
    #[error("library not loaded: `{}`", .path.display())]
    NotFound { path: PathBuf },
    #[error("initialize hook of `{}` panicked: {message}", .path.display())]
    InitializeHook { path: PathBuf, message: String },
    #[error("uninitialize hook of `{}` panicked: {message}", .path.display())]
    UninitializeHook { path: PathBuf, message: String },
    #[error("failed to close library `{}`: {source}", .path.display())]
    Close {
        path: PathBuf,
        #[source]
        source: BoxError,
    },
    #[error("invalid config: {message}")]
    InvalidConfig { message: String },
    #[error("io failed at `{}`: {source}", .path.display())]
    IoAt {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("json failed at `{}`: {source}", .path.display())]
    JsonAt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn open(path: impl Into<PathBuf>, source: impl Into<BoxError>) -> Self {
        Self::Open {
            path: path.into(),
            source: source.into(),
        }
    }

    pub fn symbol_lookup(
        path: impl Into<PathBuf>,
        symbol: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::SymbolLookup {
            path: path.into(),
            symbol: symbol.into(),
            source: source.into(),
        }
    }

    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound { path: path.into() }
    }

    pub fn initialize_hook(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::InitializeHook {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn uninitialize_hook(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::UninitializeHook {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn close(path: impl Into<PathBuf>, source: impl Into<BoxError>) -> Self {
        Self::Close {
            path: path.into(),
            source: source.into(),
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    pub fn io_at(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::IoAt {
            path: path.into(),
            source,
        }
    }

    pub fn json_at(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::JsonAt {
            path: path.into(),
            source,
        }
    }

    /// Library path the error refers to, when there is one.
    pub fn library_path(&self) -> Option<&Path> {
        match self {
            Self::Open { path, .. }
            | Self::SymbolLookup { path, .. }
            | Self::NotFound { path }
            | Self::InitializeHook { path, .. }
            | Self::UninitializeHook { path, .. }
            | Self::Close { path, .. } => Some(path),
            Self::InvalidConfig { .. } | Self::IoAt { .. } | Self::JsonAt { .. } | Self::Json(_) => {
                None
            }
        }
    }
}
