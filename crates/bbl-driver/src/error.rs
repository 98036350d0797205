use bbl_domain::State;
use bbl_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    /// Terraform failed part way; `state` holds what was captured.
    #[error("{message}")]
    Manager { state: Box<State>, message: String },

    /// `bosh create-env` failed; `state` holds the deployment state read back.
    #[error("{message}")]
    ManagerCreate { state: Box<State>, message: String },

    /// `bosh delete-env` failed; `state` holds the deployment state read back.
    #[error("{message}")]
    ManagerDelete { state: Box<State>, message: String },

    /// The BOSH CLI printed a version we could not parse.
    #[error("BOSH version could not be parsed: {0:?}")]
    BoshVersion(String),

    #[error("{tool} version must be at least v{minimum}, found v{found}")]
    VersionTooOld {
        tool: &'static str,
        minimum: &'static str,
        found: String,
    },

    #[error("terraform output {key:?} is not a {expected}")]
    OutputType { key: String, expected: &'static str },

    #[error("{binary} could not be found: {message}")]
    BinaryNotFound { binary: String, message: String },

    #[error("{command} exited with code {code}")]
    CommandFailed { command: String, code: i32 },

    #[error("{0}")]
    Api(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("internal driver error: {0}")]
    Internal(String),
}

impl DriverError {
    /// The state a failed manager call carried back, if any. Callers persist
    /// it before surfacing the error.
    pub fn partial_state(&self) -> Option<&State> {
        match self {
            DriverError::Manager { state, .. }
            | DriverError::ManagerCreate { state, .. }
            | DriverError::ManagerDelete { state, .. } => Some(state),
            _ => None,
        }
    }

    pub(crate) fn io(what: &str, e: std::io::Error) -> Self {
        DriverError::Internal(format!("{what}: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_manager_errors_carry_state() {
        let mut state = State::default();
        state.env_id = "env".into();

        let err = DriverError::ManagerCreate { state: Box::new(state), message: "boom".into() };
        assert_eq!(err.partial_state().map(|s| s.env_id.as_str()), Some("env"));
        assert_eq!(err.to_string(), "boom");

        assert!(DriverError::Api("nope".into()).partial_state().is_none());
    }
}
