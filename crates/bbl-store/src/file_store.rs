use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bbl_domain::{State, STATE_VERSION};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::StoreError;
use crate::migrate::migrate;
use crate::paths::{StatePaths, GENERATED_DIRS};
use crate::store::StateStore;

/// Atomically write `data` to `path` through a temp file in the same directory.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<(), StoreError> {
    let dir = path.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
    tmp.write_all(data).map_err(|e| StoreError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| StoreError::io(path, e.error))?;
    Ok(())
}

/// [`StateStore`] backed by `bbl-state.json` inside a state directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    paths: StatePaths,
    tool_version: String,
}

impl FileStore {
    /// `tool_version` is stamped into `bblVersion` on every save.
    pub fn new(state_dir: impl Into<PathBuf>, tool_version: impl Into<String>) -> Self {
        FileStore {
            paths: StatePaths::new(state_dir),
            tool_version: tool_version.into(),
        }
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let state_file = self.paths.state_file();
        match tokio::fs::remove_file(&state_file).await {
            Ok(()) => debug!(path = %state_file.display(), "removed state file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::io(&state_file, e)),
        }

        for name in GENERATED_DIRS {
            let dir = self.paths.root().join(name);
            match tokio::fs::remove_dir_all(&dir).await {
                Ok(()) => debug!(path = %dir.display(), "removed generated dir"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(StoreError::io(&dir, e)),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl StateStore for FileStore {
    async fn get_state(&self) -> Result<State, StoreError> {
        let path = self.paths.state_file();
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NoState {
                    dir: self.paths.root().display().to_string(),
                });
            }
            Err(e) => return Err(StoreError::io(&path, e)),
        };

        let raw: serde_json::Value = serde_json::from_str(&content)?;
        let migrated = migrate(raw, &self.paths)?;
        Ok(serde_json::from_value(migrated)?)
    }

    async fn set(&self, state: &State) -> Result<(), StoreError> {
        if state.is_empty() {
            return self.clear().await;
        }

        let mut record = state.clone();
        record.version = STATE_VERSION;
        record.bbl_version.clone_from(&self.tool_version);

        let mut json = serde_json::to_string_pretty(&record)?;
        json.push('\n');

        let path = self.paths.state_file();
        tokio::task::spawn_blocking(move || atomic_write(&path, json.as_bytes()))
            .await
            .map_err(|e| StoreError::Internal(format!("state writer panicked: {e}")))?
    }

    fn paths(&self) -> &StatePaths {
        &self.paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bbl_domain::{Iaas, LbType};
    use tempfile::TempDir;

    fn sample_state() -> State {
        let mut state = State {
            iaas: Some(Iaas::Aws),
            env_id: "lake-env".into(),
            tf_state: "some-tf-state".into(),
            ..State::default()
        };
        state.aws.region = "us-east-1".into();
        state.lb.lb_type = Some(LbType::Concourse);
        state
    }

    #[tokio::test]
    async fn missing_file_is_no_state() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path(), "v1.0.0");
        let err = store.get_state().await.unwrap_err();
        assert!(matches!(err, StoreError::NoState { .. }));
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path(), "v1.0.0");

        store.set(&sample_state()).await.unwrap();
        let loaded = store.get_state().await.unwrap();

        assert_eq!(loaded.version, STATE_VERSION);
        assert_eq!(loaded.bbl_version, "v1.0.0");
        assert_eq!(loaded.env_id, "lake-env");
        assert_eq!(loaded.aws.region, "us-east-1");
        assert_eq!(loaded.lb.lb_type, Some(LbType::Concourse));
    }

    #[tokio::test]
    async fn reserializing_a_saved_record_is_byte_identical() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path(), "v1.0.0");
        store.set(&sample_state()).await.unwrap();
        let first = std::fs::read(store.paths().state_file()).unwrap();

        let loaded = store.get_state().await.unwrap();
        store.set(&loaded).await.unwrap();

        assert_eq!(std::fs::read(store.paths().state_file()).unwrap(), first);
    }

    #[tokio::test]
    async fn set_leaves_no_temp_files_behind() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path(), "v1.0.0");
        store.set(&sample_state()).await.unwrap();
        store.set(&sample_state()).await.unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["bbl-state.json".to_string()]);
    }

    #[tokio::test]
    async fn saving_empty_state_removes_file_and_generated_dirs() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path(), "v1.0.0");
        store.set(&sample_state()).await.unwrap();
        std::fs::create_dir_all(store.paths().vars_dir()).unwrap();
        std::fs::create_dir_all(store.paths().terraform_dir()).unwrap();
        std::fs::write(store.paths().tfstate(), "{}").unwrap();

        store.set(&State::default()).await.unwrap();

        assert!(!store.paths().state_file().exists());
        assert!(!store.paths().vars_dir().exists());
        assert!(!store.paths().terraform_dir().exists());
    }

    #[tokio::test]
    async fn clearing_an_absent_state_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path(), "v1.0.0");
        store.set(&State::default()).await.unwrap();
        assert!(!store.paths().state_file().exists());
    }

    #[tokio::test]
    async fn legacy_record_is_migrated_on_load() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("bbl-state.json"),
            r#"{"version": 13, "iaas": "gcp", "envID": "old", "jumpbox": {"enabled": true, "url": "10.0.0.5"}}"#,
        )
        .unwrap();
        let store = FileStore::new(dir.path(), "v1.0.0");

        let state = store.get_state().await.unwrap();

        assert_eq!(state.version, STATE_VERSION);
        assert_eq!(state.iaas, Some(Iaas::Gcp));
        assert_eq!(state.jumpbox.url, "10.0.0.5:22");
    }

    #[tokio::test]
    async fn newer_record_is_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("bbl-state.json"), r#"{"version": 99}"#).unwrap();
        let store = FileStore::new(dir.path(), "v1.0.0");

        let err = store.get_state().await.unwrap_err();
        assert!(err.to_string().contains("newer version of bbl"));
    }
}
