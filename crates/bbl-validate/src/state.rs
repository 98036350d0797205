use bbl_store::{StatePaths, StoreError};

use crate::error::ValidateError;

/// Confirms the state directory holds a `bbl-state.json`.
#[derive(Debug, Clone)]
pub struct StateValidator {
    paths: StatePaths,
}

impl StateValidator {
    pub fn new(paths: StatePaths) -> Self {
        StateValidator { paths }
    }

    pub fn validate(&self) -> Result<(), ValidateError> {
        if self.paths.state_file().is_file() {
            Ok(())
        } else {
            Err(StoreError::NoState { dir: self.paths.root().display().to_string() }.into())
        }
    }
}
