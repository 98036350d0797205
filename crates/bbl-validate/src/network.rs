use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{ProbeError, ValidateError};

/// Lists the names of VMs attached to a network. Unnamed VMs are reported
/// as `"unnamed"`.
#[async_trait]
pub trait NetworkInstances: Send + Sync {
    async fn instance_names(&self, network: &str) -> Result<Vec<String>, ProbeError>;
}

#[async_trait]
pub trait NetworkDeletionValidator: Send + Sync {
    async fn validate_safe_to_delete(&self, network: &str, env_id: &str)
        -> Result<(), ValidateError>;
}

/// Apply the leftover-VM rule to the instances found on `network`.
///
/// A network may be deleted while it still holds at most one each of `NAT`,
/// `bosh/0` and `jumpbox/0`, plus any number of `<env_id>-nat`. Anything
/// else means a deployment is still running.
pub fn check_network_instances(
    kind: &'static str,
    network: &str,
    env_id: &str,
    names: &[String],
) -> Result<(), ValidateError> {
    let env_nat = format!("{env_id}-nat");
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut leftovers = Vec::new();

    for name in names {
        if *name == env_nat {
            continue;
        }
        let seen = counts.entry(name.as_str()).or_default();
        *seen += 1;
        let allowed = matches!(name.as_str(), "NAT" | "bosh/0" | "jumpbox/0") && *seen == 1;
        if !allowed {
            leftovers.push(name.clone());
        }
    }

    if leftovers.is_empty() {
        Ok(())
    } else {
        Err(ValidateError::UnsafeNetwork {
            kind,
            network: network.to_string(),
            vms: leftovers,
        })
    }
}

/// Network-deletion check backed by a cloud instance listing.
pub struct InstanceCountValidator<L> {
    kind: &'static str,
    lister: L,
}

impl<L: NetworkInstances> InstanceCountValidator<L> {
    /// `kind` names the network construct in errors (`vpc`, `network`).
    pub fn new(kind: &'static str, lister: L) -> Self {
        InstanceCountValidator { kind, lister }
    }
}

#[async_trait]
impl<L: NetworkInstances> NetworkDeletionValidator for InstanceCountValidator<L> {
    async fn validate_safe_to_delete(
        &self,
        network: &str,
        env_id: &str,
    ) -> Result<(), ValidateError> {
        let names = self
            .lister
            .instance_names(network)
            .await
            .map_err(|e| ValidateError::Lookup { network: network.to_string(), message: e.to_string() })?;
        debug!(network, count = names.len(), "instances found on network");
        check_network_instances(self.kind, network, env_id, &names)
    }
}

/// Used where the IaaS offers no cheap instance listing per network.
pub struct NoopNetworkValidator;

#[async_trait]
impl NetworkDeletionValidator for NoopNetworkValidator {
    async fn validate_safe_to_delete(&self, _: &str, _: &str) -> Result<(), ValidateError> {
        Ok(())
    }
}
