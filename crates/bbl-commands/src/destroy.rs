use async_trait::async_trait;
use bbl_domain::{Bosh, Iaas, Jumpbox, State};
use bbl_store::StoreError;
use bbl_validate::{StateValidator, ValidateError};
use tracing::{info, warn};

use crate::command::Command;
use crate::error::{step, CommandError};
use crate::managers::Managers;
use crate::plan::{Plan, PlanConfig};

#[derive(Debug, Clone, Copy, Default)]
pub struct DestroyArgs {
    pub skip_if_missing: bool,
}

/// Tears down the director, the jumpbox and the paved infrastructure, in
/// that order, then forgets the environment.
pub struct Destroy {
    managers: Managers,
    plan: Plan,
}

impl Destroy {
    pub fn new(managers: Managers) -> Self {
        Destroy { plan: Plan::new(managers.clone()), managers }
    }

    async fn check_network(&self, state: &State) -> Result<(), CommandError> {
        let key = match state.iaas {
            Some(Iaas::Aws) => "vpc_id",
            Some(Iaas::Gcp) => "network_name",
            Some(Iaas::Azure) => "bosh_network_name",
            Some(Iaas::Vsphere) | None => return Ok(()),
        };
        let m = &self.managers;
        m.terraform.setup(state).await.map_err(step("Terraform manager setup"))?;
        let outputs = m.terraform.get_outputs().await.map_err(step("Terraform manager get outputs"))?;
        let network = outputs.get_string(key)?;
        if network.is_empty() {
            return Ok(());
        }
        m.clouds.network.validate_safe_to_delete(&network, &state.env_id).await?;
        Ok(())
    }
}

#[async_trait]
impl Command for Destroy {
    type Args = DestroyArgs;

    async fn check_fast_fails(&self, args: &DestroyArgs, state: &State) -> Result<(), CommandError> {
        match StateValidator::new(self.managers.store.paths().clone()).validate() {
            Ok(()) => {}
            Err(ValidateError::Store(StoreError::NoState { dir })) => {
                if args.skip_if_missing {
                    info!("state file not found, and --skip-if-missing flag provided, exiting");
                } else {
                    warn!(%dir, "no bbl-state.json found, nothing to destroy");
                }
                return Err(CommandError::ExitSuccessfully);
            }
            Err(e) => return Err(e.into()),
        }

        if !state.no_director {
            self.managers.check_bosh_version().await?;
        }
        self.check_network(state).await
    }

    async fn execute(&self, _args: DestroyArgs, mut state: State) -> Result<(), CommandError> {
        let m = &self.managers;
        let store = m.store.as_ref();

        if !m.no_confirm {
            let question = format!(
                "Are you sure you want to delete infrastructure for {}? This operation cannot be undone!",
                state.env_id
            );
            if !m.prompter.confirm(&question) {
                info!("exiting");
                return Ok(());
            }
        }

        if !self.plan.is_initialized(&state) {
            let config = PlanConfig { name: state.env_id.clone(), lb: None, no_director: state.no_director };
            state = self.plan.initialize(config, state).await?;
        }

        m.terraform.setup(&state).await.map_err(step("Terraform manager setup"))?;
        if !m.terraform.is_paved().await.map_err(step("Terraform manager is paved"))? {
            info!("no infrastructure found, clearing state");
            m.store.set(&State::default()).await?;
            return Ok(());
        }

        let outputs = m.terraform.get_outputs().await.map_err(step("Terraform manager get outputs"))?;

        if !state.no_director {
            if state.has_director() {
                info!("step: cleaning up director");
                if let Err(e) = m.bosh.cleanup_director(&state).await {
                    warn!(error = %e, "director clean-up failed, continuing with delete");
                }
            }

            info!("step: deleting bosh director");
            if let Err(e) = m.bosh.delete_director(&state, &outputs).await {
                return Err(m.persist_on_failure(&state, e).await);
            }
            state.bosh = Bosh::default();
            m.interrupt.checkpoint(store, &state).await?;

            info!("step: deleting jumpbox");
            if let Err(e) = m.bosh.delete_jumpbox(&state, &outputs).await {
                return Err(m.persist_on_failure(&state, e).await);
            }
            state.jumpbox = Jumpbox::default();
        }

        m.store.set(&state).await?;
        m.interrupt.checkpoint(store, &state).await?;

        info!("step: destroying infrastructure");
        m.terraform.setup(&state).await.map_err(step("Terraform manager setup"))?;
        if let Err(e) = m.terraform.destroy(state.clone()).await {
            return Err(m.persist_on_failure(&state, e).await);
        }

        m.store.set(&State::default()).await?;
        Ok(())
    }
}
