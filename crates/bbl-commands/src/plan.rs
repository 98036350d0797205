use async_trait::async_trait;
use bbl_domain::{Lb, State};
use tracing::info;

use crate::command::Command;
use crate::env_id::EnvIdManager;
use crate::error::{step, CommandError};
use crate::lb_args::{LbArgs, LbArgsHandler};
use crate::managers::Managers;
use crate::patch::PatchDetector;

/// Flags shared by `plan` and `up`.
#[derive(Debug, Clone, Default)]
pub struct PlanArgs {
    pub name: String,
    pub lb: LbArgs,
    pub no_director: bool,
}

/// `PlanArgs` with the load balancer resolved.
#[derive(Debug, Clone, Default)]
pub struct PlanConfig {
    pub name: String,
    pub lb: Option<Lb>,
    pub no_director: bool,
}

/// Writes every generated file the environment needs without creating
/// anything in the cloud.
pub struct Plan {
    managers: Managers,
    env_id: EnvIdManager,
    lb_args: LbArgsHandler,
}

impl Plan {
    pub fn new(managers: Managers) -> Self {
        Plan {
            env_id: EnvIdManager::new(managers.clouds.lookup.clone()),
            lb_args: LbArgsHandler::new(),
            managers,
        }
    }

    pub fn parse_args(&self, args: &PlanArgs, state: &State) -> Result<PlanConfig, CommandError> {
        let lb = if args.lb.is_empty() {
            None
        } else {
            Some(self.lb_args.get_lb_state(state.iaas, &args.lb)?)
        };
        Ok(PlanConfig { name: args.name.clone(), lb, no_director: args.no_director })
    }

    /// Generated files are present for this tool's state layout.
    pub fn is_initialized(&self, state: &State) -> bool {
        state.has_initialized_version() && self.managers.store.paths().terraform_template().is_file()
    }

    pub async fn initialize(&self, config: PlanConfig, mut state: State) -> Result<State, CommandError> {
        let m = &self.managers;

        state.bbl_version.clone_from(&m.tool_version);
        if let Some(lb) = config.lb {
            state.lb = lb;
        }
        state.no_director |= config.no_director;

        state = self.env_id.sync(state, &config.name).await?;
        state = m.clouds.preflight.prepare(state).await?;
        m.store.set(&state).await?;

        info!("step: generating terraform template");
        m.terraform.setup(&state).await.map_err(step("Terraform manager setup"))?;

        if !state.no_director {
            if state.jumpbox.enabled {
                info!("step: generating jumpbox deployment files");
                m.bosh
                    .initialize_jumpbox(&state)
                    .await
                    .map_err(step("Bosh manager initialize jumpbox"))?;
            }
            info!("step: generating director deployment files");
            m.bosh
                .initialize_director(&state)
                .await
                .map_err(step("Bosh manager initialize director"))?;
        }

        m.cloud_config
            .initialize(&state)
            .await
            .map_err(step("Cloud config manager initialize"))?;
        m.runtime_config
            .initialize(&state)
            .await
            .map_err(step("Runtime config manager initialize"))?;

        PatchDetector::new(m.store.paths().root()).log();
        Ok(state)
    }
}

#[async_trait]
impl Command for Plan {
    type Args = PlanArgs;

    async fn check_fast_fails(&self, args: &PlanArgs, state: &State) -> Result<(), CommandError> {
        if !args.name.is_empty() && !state.env_id.is_empty() && args.name != state.env_id {
            return Err(CommandError::Usage(format!(
                "director name cannot be changed for an existing environment. Current name is {}.",
                state.env_id
            )));
        }
        if !args.lb.is_empty() {
            self.lb_args.get_lb_state(state.iaas, &args.lb)?;
        }
        if !args.no_director && !state.no_director {
            self.managers.check_bosh_version().await?;
        }
        self.managers
            .terraform
            .validate_version()
            .await
            .map_err(step("Terraform manager validate version"))
    }

    async fn execute(&self, args: PlanArgs, state: State) -> Result<(), CommandError> {
        let config = self.parse_args(&args, &state)?;
        self.initialize(config, state).await?;
        Ok(())
    }
}
