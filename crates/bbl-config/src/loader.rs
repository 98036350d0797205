use std::path::Path;

use bbl_domain::{Iaas, State};
use serde::Deserialize;
use tracing::debug;

use crate::error::ConfigError;
use crate::flags::GlobalConfig;

/// The parts of a GCP service account key bbl cares about.
#[derive(Debug, Clone, Deserialize)]
pub struct GcpServiceAccountKey {
    pub project_id: String,
    #[serde(default)]
    pub client_email: String,
}

/// Resolve `--gcp-service-account-key`, which is either a path to a key file
/// or the key JSON itself. Returns the JSON contents and the parsed key.
pub fn load_gcp_service_account_key(
    value: &str,
) -> Result<(String, GcpServiceAccountKey), ConfigError> {
    let path = Path::new(value);
    let contents = if !value.trim_start().starts_with('{') && path.is_file() {
        debug!(path = %path.display(), "reading gcp service account key from file");
        std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?
    } else {
        value.to_string()
    };

    let key: GcpServiceAccountKey = serde_json::from_str(&contents)
        .map_err(|source| ConfigError::ServiceAccountKey { source })?;
    Ok((contents, key))
}

/// Overlay global flags onto the loaded state.
///
/// The iaas, region and GCP project of an existing environment are fixed:
/// a flag naming a different value fails before anything is written.
/// Credentials supplied on the command line replace stored ones.
pub fn merge_into_state(config: &GlobalConfig, mut state: State) -> Result<State, ConfigError> {
    if let Some(raw) = config.iaas.as_deref().filter(|s| !s.is_empty()) {
        let iaas: Iaas = raw.parse()?;
        match state.iaas {
            Some(current) if current != iaas => {
                return Err(ConfigError::IaasChanged { current: current.to_string() });
            }
            _ => state.iaas = Some(iaas),
        }
    }

    // ── AWS ───────────────────────────────────────────────────────────────────

    let aws = &config.aws;
    overlay(&mut state.aws.access_key_id, &aws.access_key_id);
    overlay(&mut state.aws.secret_access_key, &aws.secret_access_key);
    fixed_region(&mut state.aws.region, &aws.region)?;

    // ── GCP ───────────────────────────────────────────────────────────────────

    let gcp = &config.gcp;
    if let Some(value) = gcp.service_account_key.as_deref().filter(|s| !s.is_empty()) {
        let (contents, key) = load_gcp_service_account_key(value)?;
        if !state.gcp.project_id.is_empty() && state.gcp.project_id != key.project_id {
            return Err(ConfigError::ProjectChanged { current: state.gcp.project_id });
        }
        state.gcp.service_account_key = contents;
        state.gcp.project_id = key.project_id;
    }
    fixed_region(&mut state.gcp.region, &gcp.region)?;

    // ── Azure ─────────────────────────────────────────────────────────────────

    let azure = &config.azure;
    overlay(&mut state.azure.client_id, &azure.client_id);
    overlay(&mut state.azure.client_secret, &azure.client_secret);
    overlay(&mut state.azure.subscription_id, &azure.subscription_id);
    overlay(&mut state.azure.tenant_id, &azure.tenant_id);
    fixed_region(&mut state.azure.region, &azure.region)?;

    // ── vSphere ───────────────────────────────────────────────────────────────

    let vs = &config.vsphere;
    let target = &mut state.vsphere;
    overlay(&mut target.vcenter_user, &vs.vcenter_user);
    overlay(&mut target.vcenter_password, &vs.vcenter_password);
    overlay(&mut target.vcenter_ip, &vs.vcenter_ip);
    overlay(&mut target.vcenter_dc, &vs.vcenter_dc);
    overlay(&mut target.vcenter_cluster, &vs.vcenter_cluster);
    overlay(&mut target.vcenter_rp, &vs.vcenter_rp);
    overlay(&mut target.network, &vs.network);
    overlay(&mut target.vcenter_ds, &vs.vcenter_ds);
    overlay(&mut target.subnet_cidr, &vs.subnet_cidr);
    overlay(&mut target.vcenter_disks, &vs.vcenter_disks);
    overlay(&mut target.vcenter_templates, &vs.vcenter_templates);
    overlay(&mut target.vcenter_vms, &vs.vcenter_vms);

    Ok(state)
}

fn overlay(target: &mut String, flag: &Option<String>) {
    if let Some(value) = flag.as_deref().filter(|s| !s.is_empty()) {
        *target = value.to_string();
    }
}

fn fixed_region(target: &mut String, flag: &Option<String>) -> Result<(), ConfigError> {
    let Some(value) = flag.as_deref().filter(|s| !s.is_empty()) else {
        return Ok(());
    };
    if !target.is_empty() && target.as_str() != value {
        return Err(ConfigError::RegionChanged { current: target.clone() });
    }
    *target = value.to_string();
    Ok(())
}
