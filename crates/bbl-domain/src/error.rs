use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("\"{0}\" is not a valid iaas, valid values are: aws, gcp, azure, vsphere")]
    InvalidIaas(String),

    #[error("\"{0}\" is not a valid lb type, valid lb types are: concourse, cf")]
    InvalidLbType(String),

    #[error("Names must start with a letter and be alphanumeric or hyphenated.")]
    InvalidEnvName(String),
}
