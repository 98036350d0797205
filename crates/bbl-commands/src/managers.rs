use std::sync::Arc;

use async_trait::async_trait;
use bbl_domain::State;
use bbl_driver::version::{check_minimum, MINIMUM_BOSH_VERSION};
use bbl_driver::{
    BoshManager, CloudClients, CloudConfigManager, DriverError, RuntimeConfigManager, SshManager,
    TerraformManager,
};
use bbl_store::StateStore;
use bbl_validate::{DirectorProbe, EnvironmentValidator, ProbeError};
use tracing::{debug, warn};

use crate::error::{step, CommandError};
use crate::interrupt::Interrupt;
use crate::prompt::{Output, Prompter};

/// Every collaborator a command may reach for, built once per invocation.
#[derive(Clone)]
pub struct Managers {
    pub store: Arc<dyn StateStore>,
    pub terraform: Arc<dyn TerraformManager>,
    pub bosh: Arc<dyn BoshManager>,
    pub cloud_config: Arc<dyn CloudConfigManager>,
    pub runtime_config: Arc<dyn RuntimeConfigManager>,
    pub clouds: CloudClients,
    pub ssh: Arc<dyn SshManager>,
    pub prompter: Arc<dyn Prompter>,
    pub output: Arc<dyn Output>,
    pub interrupt: Interrupt,
    pub tool_version: String,
    pub no_confirm: bool,
}

impl Managers {
    /// Save whatever state a failed driver call carried back (or `current`
    /// when it carried none), then hand the failure back for returning.
    pub async fn persist_on_failure(&self, current: &State, err: DriverError) -> CommandError {
        let state = err.partial_state().unwrap_or(current);
        let saved = self.store.set(state).await;
        match saved {
            Ok(()) => err.into(),
            Err(save) => CommandError::Multiple(vec![err.to_string(), save.to_string()]),
        }
    }

    /// Fails when the BOSH CLI is older than the supported minimum. A
    /// version string we cannot parse skips the check.
    pub async fn check_bosh_version(&self) -> Result<(), CommandError> {
        let found = match self.bosh.version().await {
            Ok(found) => found,
            Err(DriverError::BoshVersion(raw)) => {
                warn!(%raw, "BOSH version could not be parsed, skipping version check");
                return Ok(());
            }
            Err(e) => return Err(step("Bosh manager version")(e)),
        };
        debug!(%found, "bosh version");
        check_minimum("BOSH", &found, MINIMUM_BOSH_VERSION).map_err(step("Bosh manager version"))
    }

    /// The director must answer before a command changes anything it uses.
    pub async fn validate_environment(&self, state: &State) -> Result<(), CommandError> {
        EnvironmentValidator::new(BoshProbe(self.bosh.clone()))
            .validate(state)
            .await
            .map_err(Into::into)
    }
}

/// Lets the environment validator ask the BOSH manager.
pub struct BoshProbe(pub Arc<dyn BoshManager>);

#[async_trait]
impl DirectorProbe for BoshProbe {
    async fn director_info(&self, state: &State) -> Result<(), ProbeError> {
        self.0.director_info(state).await.map_err(Into::into)
    }
}
