pub mod certificate;
pub mod environment;
pub mod error;
pub mod network;
pub mod state;

pub use certificate::{CertData, CertificateValidator, Pkcs12Data};
pub use environment::{DirectorProbe, EnvironmentValidator};
pub use error::{ProbeError, ValidateError};
pub use network::{
    check_network_instances, InstanceCountValidator, NetworkDeletionValidator, NetworkInstances,
    NoopNetworkValidator,
};
pub use state::StateValidator;
