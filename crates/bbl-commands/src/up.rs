use async_trait::async_trait;
use bbl_domain::State;
use tracing::info;

use crate::command::Command;
use crate::error::{step, CommandError};
use crate::managers::Managers;
use crate::plan::{Plan, PlanArgs, PlanConfig};

/// Paves infrastructure, then creates the jumpbox and director on it.
pub struct Up {
    managers: Managers,
    plan: Plan,
}

impl Up {
    pub fn new(managers: Managers) -> Self {
        Up { plan: Plan::new(managers.clone()), managers }
    }

    /// Apply terraform, then create-env the jumpbox and director. State is
    /// saved after every phase and on any failure.
    pub async fn apply(&self, config: PlanConfig, mut state: State) -> Result<State, CommandError> {
        let m = &self.managers;
        let store = m.store.as_ref();

        if !self.plan.is_initialized(&state) {
            state = self.plan.initialize(config, state).await?;
        } else {
            if let Some(lb) = config.lb {
                state.lb = lb.merged_with(&state.lb);
            }
            state.no_director |= config.no_director;
        }

        m.terraform.setup(&state).await.map_err(step("Terraform manager setup"))?;
        m.interrupt.checkpoint(store, &state).await?;

        info!("step: applying terraform template");
        state = match m.terraform.apply(state.clone()).await {
            Ok(applied) => applied,
            Err(e) => return Err(m.persist_on_failure(&state, e).await),
        };
        m.store.set(&state).await?;

        if state.no_director {
            info!("no director requested, skipping jumpbox and director");
            return Ok(state);
        }

        let outputs = m.terraform.get_outputs().await.map_err(step("Terraform manager get outputs"))?;
        m.interrupt.checkpoint(store, &state).await?;

        if state.jumpbox.enabled {
            info!("step: creating jumpbox");
            state = match m.bosh.create_jumpbox(state.clone(), &outputs).await {
                Ok(created) => created,
                Err(e) => return Err(m.persist_on_failure(&state, e).await),
            };
            m.store.set(&state).await?;
            m.interrupt.checkpoint(store, &state).await?;
        }

        info!("step: creating bosh director");
        state = match m.bosh.create_director(state.clone(), &outputs).await {
            Ok(created) => created,
            Err(e) => return Err(m.persist_on_failure(&state, e).await),
        };
        m.store.set(&state).await?;
        m.interrupt.checkpoint(store, &state).await?;

        info!("step: updating cloud config");
        m.cloud_config.update(&state).await.map_err(step("Cloud config manager update"))?;
        Ok(state)
    }
}

#[async_trait]
impl Command for Up {
    type Args = PlanArgs;

    async fn check_fast_fails(&self, args: &PlanArgs, state: &State) -> Result<(), CommandError> {
        self.plan.check_fast_fails(args, state).await
    }

    async fn execute(&self, args: PlanArgs, state: State) -> Result<(), CommandError> {
        let config = self.plan.parse_args(&args, &state)?;
        self.apply(config, state).await?;
        Ok(())
    }
}
