use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bbl_domain::State;
use bbl_store::StateStore;
use tracing::warn;

use crate::error::CommandError;

/// Set by the signal handler; commands look at it between phases.
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Phase boundary: once interrupted, save `state` and stop.
    pub async fn checkpoint(&self, store: &dyn StateStore, state: &State) -> Result<(), CommandError> {
        if !self.is_triggered() {
            return Ok(());
        }
        warn!("interrupt received, saving state before exiting");
        store.set(state).await?;
        Err(CommandError::Interrupted)
    }
}
