use async_trait::async_trait;
use bbl_domain::State;
use tracing::{info, warn};

use crate::command::Command;
use crate::error::CommandError;
use crate::managers::Managers;

#[derive(Debug, Clone, Default)]
pub struct LeftoversArgs {
    pub filter: String,
    pub dry_run: bool,
}

/// Deletes cloud resources left behind by environments that are gone.
pub struct CleanupLeftovers {
    managers: Managers,
}

impl CleanupLeftovers {
    pub fn new(managers: Managers) -> Self {
        CleanupLeftovers { managers }
    }
}

#[async_trait]
impl Command for CleanupLeftovers {
    type Args = LeftoversArgs;

    async fn check_fast_fails(&self, _args: &LeftoversArgs, state: &State) -> Result<(), CommandError> {
        if self.managers.clouds.cleaner.is_none() {
            let iaas = state.iaas.map(|i| i.as_str()).unwrap_or("this iaas");
            return Err(CommandError::Usage(format!("cleanup-leftovers is not supported for {iaas}")));
        }
        Ok(())
    }

    async fn execute(&self, args: LeftoversArgs, _state: State) -> Result<(), CommandError> {
        let m = &self.managers;
        let Some(cleaner) = m.clouds.cleaner.as_ref() else {
            return Err(CommandError::Usage("cleanup-leftovers is not supported for this iaas".into()));
        };

        let leftovers = cleaner.list(&args.filter).await?;
        if leftovers.is_empty() {
            info!(filter = %args.filter, "no leftovers found");
            return Ok(());
        }

        let mut failures = Vec::new();
        for leftover in &leftovers {
            let label = format!("{}: {}", leftover.kind, leftover.name);
            if args.dry_run {
                m.output.print(&format!("[DRY RUN] would delete {label}"));
                continue;
            }
            if !m.no_confirm && !m.prompter.confirm(&format!("Are you sure you want to delete {label}?")) {
                continue;
            }
            match cleaner.delete(leftover).await {
                Ok(()) => m.output.print(&format!("Deleted {label}")),
                Err(e) => {
                    warn!(kind = leftover.kind, name = %leftover.name, error = %e, "delete failed");
                    failures.push(format!("{label}: {e}"));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(CommandError::Multiple(failures))
        }
    }
}
