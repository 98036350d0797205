use async_trait::async_trait;
use bbl_domain::State;

use crate::error::CommandError;

/// One `bbl` subcommand.
#[async_trait]
pub trait Command: Send + Sync {
    type Args: Send + Sync;

    /// Cheap checks that must pass before anything is written.
    async fn check_fast_fails(&self, args: &Self::Args, state: &State) -> Result<(), CommandError>;

    async fn execute(&self, args: Self::Args, state: State) -> Result<(), CommandError>;
}

/// Fast-fail checks, then the command itself.
pub async fn run<C: Command>(command: &C, args: C::Args, state: State) -> Result<(), CommandError> {
    command.check_fast_fails(&args, &state).await?;
    command.execute(args, state).await
}
