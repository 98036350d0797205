use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("bbl-state.json not found in {dir:?}, ensure you're running this command in the proper state directory or create a new environment with bbl up")]
    NoState { dir: String },

    #[error("Existing bbl environment was created with a newer version of bbl (schema version {found}). Please upgrade to a version of bbl compatible with schema version {found}.")]
    NewerVersion { found: u64 },

    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("state migration failed: {0}")]
    Migration(String),

    #[error("internal store error: {0}")]
    Internal(String),
}

impl StoreError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        StoreError::Io { path: path.display().to_string(), source }
    }
}
