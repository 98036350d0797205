use std::sync::Arc;

use async_trait::async_trait;
use bbl_domain::{Iaas, State};
use bbl_validate::{InstanceCountValidator, NetworkDeletionValidator, NoopNetworkValidator};

use crate::aws::AwsClient;
use crate::azure::AzureClient;
use crate::error::DriverError;
use crate::gcp::GcpClient;

/// Asks the IaaS whether an environment with this name already exists.
#[async_trait]
pub trait EnvironmentLookup: Send + Sync {
    async fn environment_exists(&self, name: &str) -> Result<bool, DriverError>;
}

/// A cloud resource that may have outlived its environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leftover {
    pub kind: &'static str,
    pub name: String,
    /// Provider identifier used to delete the resource.
    pub id: String,
}

#[async_trait]
pub trait LeftoverCleaner: Send + Sync {
    /// Resources whose name contains `filter`. An empty filter lists all.
    async fn list(&self, filter: &str) -> Result<Vec<Leftover>, DriverError>;
    async fn delete(&self, leftover: &Leftover) -> Result<(), DriverError>;
}

/// Cloud-side checks and lookups that run before terraform.
#[async_trait]
pub trait CloudPreflight: Send + Sync {
    async fn prepare(&self, state: State) -> Result<State, DriverError>;
}

/// Used for vSphere, where there is no API to ask.
pub struct NoCloud;

#[async_trait]
impl EnvironmentLookup for NoCloud {
    async fn environment_exists(&self, _name: &str) -> Result<bool, DriverError> {
        Ok(false)
    }
}

#[async_trait]
impl CloudPreflight for NoCloud {
    async fn prepare(&self, state: State) -> Result<State, DriverError> {
        Ok(state)
    }
}

/// The IaaS collaborators a command needs, built for one state.
#[derive(Clone)]
pub struct CloudClients {
    pub lookup: Arc<dyn EnvironmentLookup>,
    pub preflight: Arc<dyn CloudPreflight>,
    pub network: Arc<dyn NetworkDeletionValidator>,
    /// `None` where leftovers cannot be listed.
    pub cleaner: Option<Arc<dyn LeftoverCleaner>>,
}

impl CloudClients {
    /// Clients for the state's iaas. Credentials must already be merged in.
    pub fn for_state(state: &State) -> Result<Self, DriverError> {
        match state.iaas {
            Some(Iaas::Aws) => {
                let client = AwsClient::new(&state.aws);
                let network = Arc::new(InstanceCountValidator::new("vpc", client.clone()));
                let client = Arc::new(client);
                Ok(CloudClients {
                    lookup: client.clone(),
                    preflight: client.clone(),
                    network,
                    cleaner: Some(client),
                })
            }
            Some(Iaas::Gcp) => {
                let client = GcpClient::new(&state.gcp)?;
                let network = Arc::new(InstanceCountValidator::new("network", client.clone()));
                let client = Arc::new(client);
                Ok(CloudClients {
                    lookup: client.clone(),
                    preflight: client.clone(),
                    network,
                    cleaner: Some(client),
                })
            }
            Some(Iaas::Azure) => {
                let client = Arc::new(AzureClient::new(&state.azure));
                Ok(CloudClients {
                    lookup: client.clone(),
                    preflight: client.clone(),
                    network: Arc::new(NoopNetworkValidator),
                    cleaner: Some(client),
                })
            }
            Some(Iaas::Vsphere) | None => Ok(CloudClients {
                lookup: Arc::new(NoCloud),
                preflight: Arc::new(NoCloud),
                network: Arc::new(NoopNetworkValidator),
                cleaner: None,
            }),
        }
    }
}
