use bbl_domain::{Iaas, State};

use crate::error::ConfigError;

/// Check that the merged state carries every credential the active iaas needs.
/// All missing values are reported together.
pub fn require_credentials(state: &State) -> Result<(), ConfigError> {
    let Some(iaas) = state.iaas else {
        return Err(ConfigError::MissingIaas);
    };

    let required: Vec<(&str, &str, &str)> = match iaas {
        Iaas::Aws => vec![
            (state.aws.access_key_id.as_str(), "--aws-access-key-id", "BBL_AWS_ACCESS_KEY_ID"),
            (state.aws.secret_access_key.as_str(), "--aws-secret-access-key", "BBL_AWS_SECRET_ACCESS_KEY"),
            (state.aws.region.as_str(), "--aws-region", "BBL_AWS_REGION"),
        ],
        Iaas::Gcp => vec![
            (state.gcp.service_account_key.as_str(), "--gcp-service-account-key", "BBL_GCP_SERVICE_ACCOUNT_KEY"),
            (state.gcp.region.as_str(), "--gcp-region", "BBL_GCP_REGION"),
        ],
        Iaas::Azure => vec![
            (state.azure.client_id.as_str(), "--azure-client-id", "BBL_AZURE_CLIENT_ID"),
            (state.azure.client_secret.as_str(), "--azure-client-secret", "BBL_AZURE_CLIENT_SECRET"),
            (state.azure.region.as_str(), "--azure-region", "BBL_AZURE_REGION"),
            (state.azure.subscription_id.as_str(), "--azure-subscription-id", "BBL_AZURE_SUBSCRIPTION_ID"),
            (state.azure.tenant_id.as_str(), "--azure-tenant-id", "BBL_AZURE_TENANT_ID"),
        ],
        Iaas::Vsphere => {
            let vs = &state.vsphere;
            vec![
                (vs.vcenter_user.as_str(), "--vsphere-vcenter-user", "BBL_VSPHERE_VCENTER_USER"),
                (vs.vcenter_password.as_str(), "--vsphere-vcenter-password", "BBL_VSPHERE_VCENTER_PASSWORD"),
                (vs.vcenter_ip.as_str(), "--vsphere-vcenter-ip", "BBL_VSPHERE_VCENTER_IP"),
                (vs.vcenter_dc.as_str(), "--vsphere-vcenter-dc", "BBL_VSPHERE_VCENTER_DC"),
                (vs.vcenter_cluster.as_str(), "--vsphere-vcenter-cluster", "BBL_VSPHERE_VCENTER_CLUSTER"),
                (vs.vcenter_rp.as_str(), "--vsphere-vcenter-rp", "BBL_VSPHERE_VCENTER_RP"),
                (vs.network.as_str(), "--vsphere-network", "BBL_VSPHERE_NETWORK"),
                (vs.vcenter_ds.as_str(), "--vsphere-vcenter-ds", "BBL_VSPHERE_VCENTER_DS"),
                (vs.subnet_cidr.as_str(), "--vsphere-subnet-cidr", "BBL_VSPHERE_SUBNET_CIDR"),
            ]
        }
    };

    let missing: Vec<String> = required
        .into_iter()
        .filter(|(value, _, _)| value.is_empty())
        .map(|(_, flag, env)| format!("{flag} must be provided or {env} must be set"))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::MissingCredentials(missing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_iaas() {
        let err = require_credentials(&State::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "--iaas [gcp, aws, azure, vsphere] must be provided or BBL_IAAS must be set"
        );
    }

    #[test]
    fn reports_every_missing_aws_credential() {
        let mut state = State { iaas: Some(Iaas::Aws), ..State::default() };
        state.aws.region = "us-east-1".into();

        let err = require_credentials(&state).unwrap_err();
        assert_eq!(
            err.to_string(),
            "--aws-access-key-id must be provided or BBL_AWS_ACCESS_KEY_ID must be set\n\
             --aws-secret-access-key must be provided or BBL_AWS_SECRET_ACCESS_KEY must be set"
        );
    }

    #[test]
    fn complete_gcp_credentials_pass() {
        let mut state = State { iaas: Some(Iaas::Gcp), ..State::default() };
        state.gcp.service_account_key = "{}".into();
        state.gcp.region = "us-west1".into();
        assert!(require_credentials(&state).is_ok());
    }
}
