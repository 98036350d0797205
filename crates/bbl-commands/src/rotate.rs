use async_trait::async_trait;
use bbl_domain::State;
use bbl_driver::{generate_ssh_key, VarsStore};
use bbl_validate::StateValidator;
use tracing::info;

use crate::command::Command;
use crate::error::CommandError;
use crate::managers::Managers;
use crate::plan::PlanConfig;
use crate::up::Up;

const JUMPBOX_SSH_VAR: &str = "jumpbox_ssh";
const DIRECTOR_CA_VAR: &str = "default_ca";

fn redeploy_config(state: &State) -> PlanConfig {
    PlanConfig { name: state.env_id.clone(), lb: None, no_director: state.no_director }
}

/// Replaces the jumpbox SSH key and redeploys.
pub struct Rotate {
    managers: Managers,
    up: Up,
}

impl Rotate {
    pub fn new(managers: Managers) -> Self {
        Rotate { up: Up::new(managers.clone()), managers }
    }
}

#[async_trait]
impl Command for Rotate {
    type Args = ();

    async fn check_fast_fails(&self, _args: &(), state: &State) -> Result<(), CommandError> {
        StateValidator::new(self.managers.store.paths().clone()).validate()?;
        if state.no_director || !state.jumpbox.enabled {
            return Err(CommandError::Usage("This environment has no jumpbox whose key can be rotated.".into()));
        }
        self.managers.check_bosh_version().await
    }

    async fn execute(&self, _args: (), mut state: State) -> Result<(), CommandError> {
        info!("step: generating new jumpbox ssh key");
        let key = generate_ssh_key()?;
        let mut vars = VarsStore::parse(&state.jumpbox.vars_store)?;
        vars.set_ssh_key(JUMPBOX_SSH_VAR, &key);
        state.jumpbox.vars_store = vars.to_yaml()?;
        self.managers.store.set(&state).await?;

        let config = redeploy_config(&state);
        self.up.apply(config, state).await?;
        Ok(())
    }
}

/// Drops the director CA and every certificate it signed, then redeploys
/// so `create-env` generates fresh ones.
pub struct RotateCa {
    managers: Managers,
    up: Up,
}

impl RotateCa {
    pub fn new(managers: Managers) -> Self {
        RotateCa { up: Up::new(managers.clone()), managers }
    }
}

#[async_trait]
impl Command for RotateCa {
    type Args = ();

    async fn check_fast_fails(&self, _args: &(), state: &State) -> Result<(), CommandError> {
        StateValidator::new(self.managers.store.paths().clone()).validate()?;
        if !state.has_director() {
            return Err(CommandError::NoDirector);
        }
        self.managers.check_bosh_version().await
    }

    async fn execute(&self, _args: (), mut state: State) -> Result<(), CommandError> {
        let mut vars = VarsStore::parse(&state.bosh.vars_store)?;
        let removed = vars.remove_ca_and_signed(DIRECTOR_CA_VAR)?;
        info!(removed = ?removed, "step: removed director CA and the certificates it signed");
        state.bosh.vars_store = vars.to_yaml()?;
        self.managers.store.set(&state).await?;

        let config = redeploy_config(&state);
        self.up.apply(config, state).await?;
        Ok(())
    }
}
