use async_trait::async_trait;
use bbl_domain::State;
use tracing::debug;

use crate::error::{ProbeError, ValidateError};

/// Something that can ask a director whether it is alive.
#[async_trait]
pub trait DirectorProbe: Send + Sync {
    async fn director_info(&self, state: &State) -> Result<(), ProbeError>;
}

/// Confirms the environment's director is reachable before LB changes
/// touch a running director.
pub struct EnvironmentValidator<P> {
    probe: P,
}

impl<P: DirectorProbe> EnvironmentValidator<P> {
    pub fn new(probe: P) -> Self {
        EnvironmentValidator { probe }
    }

    pub async fn validate(&self, state: &State) -> Result<(), ValidateError> {
        if !state.has_director() {
            return Ok(());
        }
        self.probe.director_info(state).await.map_err(|e| {
            debug!(error = %e, address = %state.bosh.director_address, "director info failed");
            ValidateError::EnvironmentNotFound
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe(bool);

    #[async_trait]
    impl DirectorProbe for Probe {
        async fn director_info(&self, _state: &State) -> Result<(), ProbeError> {
            if self.0 {
                Ok(())
            } else {
                Err("connection refused".into())
            }
        }
    }

    fn state_with_director() -> State {
        let mut state = State::default();
        state.bosh.director_address = "https://10.0.0.6:25555".into();
        state
    }

    #[tokio::test]
    async fn reachable_director_passes() {
        let validator = EnvironmentValidator::new(Probe(true));
        assert!(validator.validate(&state_with_director()).await.is_ok());
    }

    #[tokio::test]
    async fn unreachable_director_is_reported() {
        let validator = EnvironmentValidator::new(Probe(false));
        let err = validator.validate(&state_with_director()).await.unwrap_err();
        assert!(matches!(err, ValidateError::EnvironmentNotFound));
    }

    #[tokio::test]
    async fn no_director_skips_probe() {
        let validator = EnvironmentValidator::new(Probe(false));
        let mut state = state_with_director();
        state.no_director = true;
        assert!(validator.validate(&state).await.is_ok());
        assert!(validator.validate(&State::default()).await.is_ok());
    }
}
