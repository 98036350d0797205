use thiserror::Error;

/// Failure reported by a cloud or director collaborator.
pub type ProbeError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum ValidateError {
    /// Every problem found with a certificate/key/chain set, one per line.
    #[error("{}", .0.join("\n"))]
    Certificate(Vec<String>),

    #[error("{0}")]
    Pkcs12(String),

    #[error("{kind} {network} is not safe to delete; vms still exist: [{}]", .vms.join(", "))]
    UnsafeNetwork {
        kind: &'static str,
        network: String,
        vms: Vec<String>,
    },

    #[error("A bbl environment could not be found, please create a new environment before running this command again.")]
    EnvironmentNotFound,

    #[error("list instances in {network}: {message}")]
    Lookup { network: String, message: String },

    #[error(transparent)]
    Store(#[from] bbl_store::StoreError),
}
