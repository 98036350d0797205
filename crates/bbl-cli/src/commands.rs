use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use bbl_commands::{
    run, CleanupLeftovers, CommandError, CreateLbs, DeleteLbs, DeleteLbsArgs, Destroy, DestroyArgs, Field,
    Interrupt, Lbs, LbsArgs, LeftoversArgs, Managers, Plan, Print, PrintEnv, Rotate, RotateCa, ShellType, Ssh,
    SshArgs, Up,
};
use bbl_config::{merge_into_state, require_credentials, GlobalConfig};
use bbl_domain::State;
use bbl_driver::{
    BoshCli, BoshCloudConfig, CloudClients, EmbeddedRuntimeConfig, SshCli, TerraformCli, TerraformManager,
};
use bbl_store::{FileStore, StateStore, StoreError};
use tracing::{debug, warn};

use crate::cli::{Cli, Command};
use crate::output::{Stdout, TerminalPrompter};

pub const TOOL_VERSION: &str = concat!("v", env!("CARGO_PKG_VERSION"));

fn absolute(dir: &Path) -> Result<PathBuf> {
    if dir.is_absolute() {
        return Ok(dir.to_path_buf());
    }
    let cwd = std::env::current_dir().context("resolve current directory")?;
    Ok(cwd.join(dir))
}

/// Load the stored state, or start empty when the directory has none.
async fn load_state(store: &FileStore) -> Result<State> {
    match store.get_state().await {
        Ok(state) => Ok(state),
        Err(StoreError::NoState { dir }) => {
            debug!(%dir, "no bbl-state.json, starting from an empty state");
            Ok(State::default())
        }
        Err(e) => Err(e.into()),
    }
}

fn managers(config: &GlobalConfig, store: Arc<FileStore>, state: &State) -> Result<Managers> {
    let paths = store.paths().clone();
    let terraform: Arc<dyn TerraformManager> = Arc::new(TerraformCli::new(
        paths.clone(),
        config.terraform_binary.clone(),
        !config.disable_tf_auto_approve,
    ));

    let interrupt = Interrupt::new();
    let handle = interrupt.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current step");
            handle.trigger();
        }
    });

    Ok(Managers {
        clouds: CloudClients::for_state(state)?,
        bosh: Arc::new(BoshCli::new(paths.clone(), None)),
        cloud_config: Arc::new(BoshCloudConfig::new(paths.clone(), None, terraform.clone())),
        runtime_config: Arc::new(EmbeddedRuntimeConfig::new(paths.clone())),
        ssh: Arc::new(SshCli::new(paths)),
        terraform,
        store,
        prompter: Arc::new(TerminalPrompter),
        output: Arc::new(Stdout),
        interrupt,
        tool_version: TOOL_VERSION.into(),
        no_confirm: config.no_confirm,
    })
}

/// Resolve configuration and state, build the collaborators and run one command.
pub async fn dispatch(cli: Cli) -> Result<()> {
    if let Command::Version = cli.command {
        println!("bbl {TOOL_VERSION}");
        return Ok(());
    }

    let mut config = GlobalConfig::from(&cli.global);
    config.state_dir = absolute(&config.state_dir)?;
    debug!(state_dir = %config.state_dir.display(), "using state directory");

    let store = Arc::new(FileStore::new(&config.state_dir, TOOL_VERSION));
    let has_state = store.paths().state_file().is_file();
    let state = merge_into_state(&config, load_state(&store).await?)?;
    if cli.command.starts_fresh() || (has_state && cli.command.uses_iaas()) {
        require_credentials(&state)?;
    }

    let m = managers(&config, store, &state)?;
    let result = match cli.command {
        Command::Plan(flags) => run(&Plan::new(m), flags.into(), state).await,
        Command::Up(flags) => run(&Up::new(m), flags.into(), state).await,
        Command::Destroy { skip_if_missing } => {
            run(&Destroy::new(m), DestroyArgs { skip_if_missing }, state).await
        }
        Command::Rotate => run(&Rotate::new(m), (), state).await,
        Command::RotateCa => run(&RotateCa::new(m), (), state).await,
        Command::CreateLbs(flags) => run(&CreateLbs::new(m), flags.into(), state).await,
        Command::DeleteLbs { skip_if_missing } => {
            run(&DeleteLbs::new(m), DeleteLbsArgs { skip_if_missing }, state).await
        }
        Command::Lbs { json } => run(&Lbs::new(m), LbsArgs { json }, state).await,
        Command::Outputs => run(&Print::new(m), Field::Outputs, state).await,
        Command::LatestError => run(&Print::new(m), Field::LatestError, state).await,
        Command::SshKey => run(&Print::new(m), Field::SshKey, state).await,
        Command::DirectorSshKey => run(&Print::new(m), Field::DirectorSshKey, state).await,
        Command::JumpboxAddress => run(&Print::new(m), Field::JumpboxAddress, state).await,
        Command::DirectorAddress => run(&Print::new(m), Field::DirectorAddress, state).await,
        Command::DirectorUsername => run(&Print::new(m), Field::DirectorUsername, state).await,
        Command::DirectorPassword => run(&Print::new(m), Field::DirectorPassword, state).await,
        Command::DirectorCaCert => run(&Print::new(m), Field::DirectorCaCert, state).await,
        Command::EnvId => run(&Print::new(m), Field::EnvId, state).await,
        Command::CloudConfig => run(&Print::new(m), Field::CloudConfig, state).await,
        Command::BoshDeploymentVars => run(&Print::new(m), Field::BoshDeploymentVars, state).await,
        Command::JumpboxDeploymentVars => run(&Print::new(m), Field::JumpboxDeploymentVars, state).await,
        Command::PrintEnv { shell_type } => {
            let shell: ShellType = shell_type.parse()?;
            run(&PrintEnv::new(m), shell, state).await
        }
        Command::Ssh { jumpbox, director, cmd } => {
            run(&Ssh::new(m), SshArgs { jumpbox, director, cmd }, state).await
        }
        Command::CleanupLeftovers { filter, dry_run } => {
            run(&CleanupLeftovers::new(m), LeftoversArgs { filter, dry_run }, state).await
        }
        Command::Version => Ok(()),
    };

    match result {
        Ok(()) | Err(CommandError::ExitSuccessfully) => Ok(()),
        Err(e) => Err(e.into()),
    }
}
