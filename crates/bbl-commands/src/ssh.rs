use async_trait::async_trait;
use bbl_domain::State;
use bbl_validate::StateValidator;

use crate::command::Command;
use crate::error::{step, CommandError};
use crate::managers::Managers;

#[derive(Debug, Clone, Default)]
pub struct SshArgs {
    pub jumpbox: bool,
    pub director: bool,
    /// Run this instead of an interactive shell.
    pub cmd: String,
}

pub struct Ssh {
    managers: Managers,
}

impl Ssh {
    pub fn new(managers: Managers) -> Self {
        Ssh { managers }
    }
}

#[async_trait]
impl Command for Ssh {
    type Args = SshArgs;

    async fn check_fast_fails(&self, args: &SshArgs, _state: &State) -> Result<(), CommandError> {
        StateValidator::new(self.managers.store.paths().clone()).validate()?;
        if args.jumpbox == args.director {
            return Err(CommandError::Usage("This command requires exactly one of the --jumpbox or --director flags.".into()));
        }
        Ok(())
    }

    async fn execute(&self, args: SshArgs, state: State) -> Result<(), CommandError> {
        let cmd = Some(args.cmd.as_str()).filter(|c| !c.is_empty());
        if args.jumpbox {
            self.managers.ssh.jumpbox(&state, cmd).await.map_err(step("Ssh jumpbox"))
        } else {
            self.managers.ssh.director(&state, cmd).await.map_err(step("Ssh director"))
        }
    }
}
