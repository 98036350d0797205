use bbl_domain::DomainError;
use bbl_driver::DriverError;
use bbl_store::StoreError;
use bbl_validate::ValidateError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommandError {
    /// Bad flags or a request that does not fit the environment.
    #[error("{0}")]
    Usage(String),

    /// Nothing to do; the process exits 0.
    #[error("exiting: nothing to do")]
    ExitSuccessfully,

    #[error("interrupted; state has been saved")]
    Interrupted,

    #[error("Could not retrieve {thing}, please make sure you are targeting the proper state dir.")]
    NotFound { thing: &'static str },

    #[error("Error BBL does not manage this director.")]
    NoDirector,

    #[error("{step}: {source}")]
    Step {
        step: &'static str,
        #[source]
        source: DriverError,
    },

    /// The original failure plus the failure to save state afterwards.
    #[error("{}", .0.join(",\n"))]
    Multiple(Vec<String>),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Validate(#[from] ValidateError),

    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl CommandError {
    pub fn is_exit_successfully(&self) -> bool {
        matches!(self, CommandError::ExitSuccessfully)
    }
}

/// Prefix a driver failure with the subsystem call that produced it.
pub(crate) fn step(step: &'static str) -> impl FnOnce(DriverError) -> CommandError {
    move |source| CommandError::Step { step, source }
}
