//! Watermark store error types.

/// Errors produced by [`WatermarkStore`](crate::WatermarkStore) operations.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// Underlying `SQLite` failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// File-system I/O failure.
    #[error("i/o error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The state document could not be encoded.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal mutex was poisoned by a panicked thread.
    #[error("watermark store lock poisoned")]
    LockPoisoned,
}

impl StateError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, StateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_error_displays_context() {
        let inner = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(1),
            Some("table not found".into()),
        );
        let err = StateError::Sqlite(inner);
        assert!(err.to_string().contains("sqlite"));
    }

    #[test]
    fn io_error_names_path() {
        let err = StateError::io(
            std::path::Path::new("/tmp/state.json"),
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/tmp/state.json"), "got: {msg}");
        assert!(msg.contains("denied"), "got: {msg}");
    }

    #[test]
    fn lock_poisoned_displays() {
        assert_eq!(
            StateError::LockPoisoned.to_string(),
            "watermark store lock poisoned"
        );
    }
}
