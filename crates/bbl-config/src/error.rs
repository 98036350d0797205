use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("error parsing gcp service account key: {source}")]
    ServiceAccountKey {
        #[source]
        source: serde_json::Error,
    },

    #[error("The iaas type cannot be changed for an existing environment. The current iaas type is {current}.")]
    IaasChanged { current: String },

    #[error("The region cannot be changed for an existing environment. The current region is {current}.")]
    RegionChanged { current: String },

    #[error("The project ID cannot be changed for an existing environment. The current project ID is {current}.")]
    ProjectChanged { current: String },

    #[error("--iaas [gcp, aws, azure, vsphere] must be provided or BBL_IAAS must be set")]
    MissingIaas,

    #[error("{}", .0.join("\n"))]
    MissingCredentials(Vec<String>),

    #[error("{0}")]
    Domain(#[from] bbl_domain::DomainError),
}
