use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use bbl_domain::{Iaas, State};
use bbl_store::StatePaths;
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, info};

use crate::bosh::director_env;
use crate::error::DriverError;
use crate::files;
use crate::outputs::Outputs;
use crate::process::{resolve_binary, run_captured, run_stdout};
use crate::templates::{cloud_config, cloud_config_ops, runtime_config, CLOUD_CONFIG_FILE, CLOUD_CONFIG_OPS_FILE, RUNTIME_CONFIG_FILE};
use crate::terraform::TerraformManager;

#[async_trait]
pub trait CloudConfigManager: Send + Sync {
    /// Write the cloud-config template and IaaS ops into `cloud-config/`.
    async fn initialize(&self, state: &State) -> Result<(), DriverError>;

    /// Upload the interpolated cloud config to the director.
    async fn update(&self, state: &State) -> Result<(), DriverError>;

    /// The cloud config as it would be uploaded.
    async fn interpolate(&self, state: &State) -> Result<String, DriverError>;
}

#[async_trait]
pub trait RuntimeConfigManager: Send + Sync {
    async fn initialize(&self, state: &State) -> Result<(), DriverError>;
}

/// Cloud config rendered with the BOSH CLI from terraform outputs.
pub struct BoshCloudConfig {
    binary: String,
    paths: StatePaths,
    terraform: Arc<dyn TerraformManager>,
}

impl BoshCloudConfig {
    pub fn new(paths: StatePaths, binary: Option<String>, terraform: Arc<dyn TerraformManager>) -> Self {
        BoshCloudConfig {
            binary: binary.filter(|b| !b.is_empty()).unwrap_or_else(|| "bosh".into()),
            paths,
            terraform,
        }
    }

    /// Refresh the ops file and vars file, then return the args shared by
    /// `interpolate` and `update-cloud-config`.
    async fn prepare(&self, state: &State) -> Result<Vec<String>, DriverError> {
        self.initialize(state).await?;
        let outputs = self.terraform.get_outputs().await?;
        let vars_path = self.paths.cloud_config_vars();
        files::write_private(&vars_path, cloud_config_vars(state, &outputs)?).await?;

        let dir = self.paths.cloud_config_dir();
        Ok(vec![
            dir.join(CLOUD_CONFIG_FILE).display().to_string(),
            "-o".into(),
            dir.join(CLOUD_CONFIG_OPS_FILE).display().to_string(),
            "--vars-file".into(),
            vars_path.display().to_string(),
        ])
    }
}

#[async_trait]
impl CloudConfigManager for BoshCloudConfig {
    async fn initialize(&self, state: &State) -> Result<(), DriverError> {
        let iaas = state
            .iaas
            .ok_or_else(|| DriverError::Internal("iaas is not set".into()))?;
        let dir = self.paths.cloud_config_dir();
        files::write(&dir.join(CLOUD_CONFIG_FILE), cloud_config()).await?;
        files::write(&dir.join(CLOUD_CONFIG_OPS_FILE), cloud_config_ops(iaas, state.lb.lb_type)).await?;
        debug!(dir = %dir.display(), "cloud config initialized");
        Ok(())
    }

    async fn update(&self, state: &State) -> Result<(), DriverError> {
        let args = self.prepare(state).await?;
        info!("step: updating cloud config");
        let env = director_env(state, &self.paths).await?;
        let mut cmd = Command::new(resolve_binary(&self.binary)?);
        cmd.current_dir(self.paths.root())
            .arg("update-cloud-config")
            .args(&args)
            .arg("-n")
            .envs(env);
        let captured = run_captured(cmd, "bosh").await?;
        if !captured.success() {
            return Err(DriverError::CommandFailed { command: "bosh update-cloud-config".into(), code: captured.code });
        }
        info!("step: cloud config updated");
        Ok(())
    }

    async fn interpolate(&self, state: &State) -> Result<String, DriverError> {
        let args = self.prepare(state).await?;
        let mut cmd = Command::new(resolve_binary(&self.binary)?);
        cmd.current_dir(self.paths.root()).arg("interpolate").args(&args);
        run_stdout(cmd, "bosh interpolate").await
    }
}

/// Writes the embedded runtime config (bosh-dns) into `runtime-config/`.
pub struct EmbeddedRuntimeConfig {
    paths: StatePaths,
}

impl EmbeddedRuntimeConfig {
    pub fn new(paths: StatePaths) -> Self {
        EmbeddedRuntimeConfig { paths }
    }
}

#[async_trait]
impl RuntimeConfigManager for EmbeddedRuntimeConfig {
    async fn initialize(&self, _state: &State) -> Result<(), DriverError> {
        files::write(&self.paths.runtime_config_dir().join(RUNTIME_CONFIG_FILE), runtime_config()).await
    }
}

/// Every terraform output, plus the values the ops files take from state.
pub fn cloud_config_vars(state: &State, outputs: &Outputs) -> Result<String, DriverError> {
    let mut vars: BTreeMap<String, Value> = outputs.map().clone();
    match state.iaas {
        Some(Iaas::Gcp) => {
            vars.insert("zone".into(), Value::String(state.gcp.zone.clone()));
        }
        Some(Iaas::Vsphere) => {
            vars.insert("vcenter_cluster".into(), Value::String(state.vsphere.vcenter_cluster.clone()));
            vars.insert("vcenter_rp".into(), Value::String(state.vsphere.vcenter_rp.clone()));
            vars.insert("network_name".into(), Value::String(state.vsphere.network.clone()));
        }
        _ => {}
    }
    serde_yaml::to_string(&vars).map_err(|e| DriverError::Internal(format!("encode cloud config vars: {e}")))
}
