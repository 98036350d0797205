use async_trait::async_trait;
use bbl_domain::State;

use crate::error::StoreError;
use crate::paths::StatePaths;

/// Persistence for the environment record and the layout of its state directory.
#[async_trait]
pub trait StateStore: Send + Sync + 'static {
    /// Load and migrate the record. Fails with [`StoreError::NoState`] when
    /// the directory holds no `bbl-state.json`.
    async fn get_state(&self) -> Result<State, StoreError>;

    /// Atomically replace the record. Saving an empty state removes the
    /// record and every generated directory.
    async fn set(&self, state: &State) -> Result<(), StoreError>;

    fn paths(&self) -> &StatePaths;
}
