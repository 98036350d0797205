use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bbl_domain::{Iaas, State};
use bbl_store::{DeploymentPaths, StatePaths};
use bbl_validate::{DirectorProbe, ProbeError};
use serde_json::{Map, Value};
use serde_yaml::Value as Yaml;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::DriverError;
use crate::files;
use crate::outputs::Outputs;
use crate::process::{resolve_binary, run_captured, run_stdout};
use crate::templates::{
    cpi_ops_file, director_files, jumpbox_files, DeploymentFile, DIRECTOR_EXTERNAL_IP_FILE,
    DIRECTOR_JUMPBOX_USER_FILE, DIRECTOR_MANIFEST_FILE, JUMPBOX_MANIFEST_FILE,
};
use crate::vars_store::VarsStore;

pub const DIRECTOR_USERNAME: &str = "admin";
pub const DIRECTOR_PORT: u16 = 25555;

/// Adapter to the BOSH CLI.
#[async_trait]
pub trait BoshManager: Send + Sync {
    /// The CLI's version. `DriverError::BoshVersion` when it cannot be parsed.
    async fn version(&self) -> Result<String, DriverError>;

    fn path(&self) -> String;

    async fn initialize_jumpbox(&self, state: &State) -> Result<(), DriverError>;
    async fn initialize_director(&self, state: &State) -> Result<(), DriverError>;

    /// Failures carry the updated state in `DriverError::ManagerCreate`.
    async fn create_jumpbox(&self, state: State, outputs: &Outputs) -> Result<State, DriverError>;

    /// Failures carry the updated state in `DriverError::ManagerCreate`.
    async fn create_director(&self, state: State, outputs: &Outputs) -> Result<State, DriverError>;

    /// Failures carry the updated state in `DriverError::ManagerDelete`.
    async fn delete_director(&self, state: &State, outputs: &Outputs) -> Result<(), DriverError>;

    /// Failures carry the updated state in `DriverError::ManagerDelete`.
    async fn delete_jumpbox(&self, state: &State, outputs: &Outputs) -> Result<(), DriverError>;

    /// Remove unused releases, stemcells and disks from a running director.
    async fn cleanup_director(&self, state: &State) -> Result<(), DriverError>;

    fn director_deployment_vars(&self, state: &State, outputs: &Outputs) -> Result<String, DriverError>;
    fn jumpbox_deployment_vars(&self, state: &State, outputs: &Outputs) -> Result<String, DriverError>;

    async fn director_info(&self, state: &State) -> Result<(), DriverError>;
}

/// [`BoshManager`] that shells out to the `bosh` binary.
pub struct BoshCli {
    binary: String,
    paths: StatePaths,
}

impl BoshCli {
    pub fn new(paths: StatePaths, binary: Option<String>) -> Self {
        BoshCli {
            binary: binary.filter(|b| !b.is_empty()).unwrap_or_else(|| "bosh".into()),
            paths,
        }
    }

    fn command(&self) -> Result<Command, DriverError> {
        let mut cmd = Command::new(resolve_binary(&self.binary)?);
        cmd.current_dir(self.paths.root());
        Ok(cmd)
    }

    async fn write_deployment_files(&self, dir: &Path, deployment: Vec<DeploymentFile>) -> Result<(), DriverError> {
        for (relative, content) in deployment {
            files::write(&dir.join(relative), content).await?;
        }
        Ok(())
    }

    /// Write vars store, state and vars file ahead of `create-env`/`delete-env`.
    async fn stage(
        &self,
        deployment: &DeploymentPaths,
        vars_store: &str,
        bosh_state: &Map<String, Value>,
        vars_file: &str,
    ) -> Result<(), DriverError> {
        if !vars_store.is_empty() {
            files::write_private(&deployment.vars_store, vars_store).await?;
        }
        if !bosh_state.is_empty() {
            let json = serde_json::to_string_pretty(bosh_state)
                .map_err(|e| DriverError::Internal(format!("encode bosh state: {e}")))?;
            files::write_private(&deployment.state_file, json).await?;
        }
        files::write_private(&deployment.vars_file, vars_file).await
    }

    /// Read vars store and deployment state back after a BOSH run.
    async fn collect(&self, deployment: &DeploymentPaths) -> Result<(String, Map<String, Value>), DriverError> {
        let vars_store = files::read_optional(&deployment.vars_store).await?;
        let raw_state = files::read_optional(&deployment.state_file).await?;
        let bosh_state = if raw_state.trim().is_empty() {
            Map::new()
        } else {
            serde_json::from_str(&raw_state)
                .map_err(|e| DriverError::Internal(format!("parse {}: {e}", deployment.state_file.display())))?
        };
        Ok((vars_store, bosh_state))
    }

    fn env_args(deployment: &DeploymentPaths, manifest: &str) -> Vec<String> {
        vec![
            deployment.deployment_dir.join(manifest).display().to_string(),
            "--state".into(),
            deployment.state_file.display().to_string(),
            "--vars-store".into(),
            deployment.vars_store.display().to_string(),
            "--vars-file".into(),
            deployment.vars_file.display().to_string(),
        ]
    }

    fn ops_arg(args: &mut Vec<String>, path: &Path) {
        args.push("-o".into());
        args.push(path.display().to_string());
    }

    async fn director_args(&self, state: &State) -> Result<Vec<String>, DriverError> {
        let iaas = require_iaas(state)?;
        let deployment = self.paths.director();
        let dir = &deployment.deployment_dir;
        let mut args = Self::env_args(&deployment, DIRECTOR_MANIFEST_FILE);
        Self::ops_arg(&mut args, &dir.join(cpi_ops_file(iaas)));
        Self::ops_arg(&mut args, &dir.join(DIRECTOR_JUMPBOX_USER_FILE));
        if !state.jumpbox.enabled {
            Self::ops_arg(&mut args, &dir.join(DIRECTOR_EXTERNAL_IP_FILE));
        }
        if !state.bosh.user_ops_file.is_empty() {
            let user_ops = self.paths.user_ops_file();
            files::write(&user_ops, &state.bosh.user_ops_file).await?;
            Self::ops_arg(&mut args, &user_ops);
        }
        Ok(args)
    }

    fn jumpbox_args(state: &State, deployment: &DeploymentPaths) -> Result<Vec<String>, DriverError> {
        let iaas = require_iaas(state)?;
        let mut args = Self::env_args(deployment, JUMPBOX_MANIFEST_FILE);
        Self::ops_arg(&mut args, &deployment.deployment_dir.join(cpi_ops_file(iaas)));
        Ok(args)
    }

    async fn run_env(
        &self,
        verb: &str,
        args: &[String],
        proxy: Option<String>,
    ) -> Result<crate::process::Captured, DriverError> {
        let mut cmd = self.command()?;
        cmd.arg(verb).args(args);
        if let Some(proxy) = proxy {
            cmd.env("BOSH_ALL_PROXY", proxy);
        }
        run_captured(cmd, "bosh").await
    }

    /// `BOSH_ALL_PROXY` for `create-env`/`delete-env`, with the key rebuilt from state.
    async fn proxy(&self, state: &State) -> Result<Option<String>, DriverError> {
        if !state.jumpbox.enabled {
            return Ok(None);
        }
        write_jumpbox_key(state, &self.paths).await?;
        Ok(Some(all_proxy(state, &self.paths)))
    }
}

#[async_trait]
impl BoshManager for BoshCli {
    async fn version(&self) -> Result<String, DriverError> {
        let mut cmd = Command::new(resolve_binary(&self.binary)?);
        cmd.arg("-v");
        let raw = run_stdout(cmd, "bosh -v").await?;
        parse_bosh_version(&raw)
    }

    fn path(&self) -> String {
        resolve_binary(&self.binary)
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| self.binary.clone())
    }

    async fn initialize_jumpbox(&self, state: &State) -> Result<(), DriverError> {
        let iaas = require_iaas(state)?;
        let deployment = self.paths.jumpbox();
        self.write_deployment_files(&deployment.deployment_dir, jumpbox_files(iaas)).await?;
        debug!(dir = %deployment.deployment_dir.display(), "jumpbox deployment initialized");
        Ok(())
    }

    async fn initialize_director(&self, state: &State) -> Result<(), DriverError> {
        let iaas = require_iaas(state)?;
        let deployment = self.paths.director();
        self.write_deployment_files(&deployment.deployment_dir, director_files(iaas)).await?;
        debug!(dir = %deployment.deployment_dir.display(), "director deployment initialized");
        Ok(())
    }

    async fn create_jumpbox(&self, mut state: State, outputs: &Outputs) -> Result<State, DriverError> {
        let deployment = self.paths.jumpbox();
        let vars = self.jumpbox_deployment_vars(&state, outputs)?;
        self.stage(&deployment, &state.jumpbox.vars_store, &state.jumpbox.state, &vars).await?;

        info!("step: creating jumpbox");
        let args = Self::jumpbox_args(&state, &deployment)?;
        let captured = self.run_env("create-env", &args, None).await?;

        let (vars_store, bosh_state) = self.collect(&deployment).await?;
        state.jumpbox.vars_store = vars_store;
        state.jumpbox.state = bosh_state;
        state.jumpbox.manifest = files::read_optional(&deployment.deployment_dir.join(JUMPBOX_MANIFEST_FILE)).await?;

        if !captured.success() {
            return Err(DriverError::ManagerCreate {
                state: Box::new(state),
                message: format!("Create jumpbox: bosh create-env exited with code {}", captured.code),
            });
        }

        state.jumpbox.url = format!("{}:22", jumpbox_external_ip(&state, outputs)?);
        write_jumpbox_key(&state, &self.paths).await?;
        info!(url = %state.jumpbox.url, "step: created jumpbox");
        Ok(state)
    }

    async fn create_director(&self, mut state: State, outputs: &Outputs) -> Result<State, DriverError> {
        let deployment = self.paths.director();
        let vars = self.director_deployment_vars(&state, outputs)?;
        self.stage(&deployment, &state.bosh.vars_store, &state.bosh.state, &vars).await?;

        info!("step: creating bosh director");
        let args = self.director_args(&state).await?;
        let proxy = self.proxy(&state).await?;
        let captured = self.run_env("create-env", &args, proxy).await?;

        let (vars_store, bosh_state) = self.collect(&deployment).await?;
        state.bosh.vars_store = vars_store;
        state.bosh.state = bosh_state;
        state.bosh.manifest = files::read_optional(&deployment.deployment_dir.join(DIRECTOR_MANIFEST_FILE)).await?;

        if !captured.success() {
            return Err(DriverError::ManagerCreate {
                state: Box::new(state),
                message: format!("Create director: bosh create-env exited with code {}", captured.code),
            });
        }

        let director_ip = if state.jumpbox.enabled {
            outputs.get_string("director__internal_ip")?
        } else {
            outputs.get_string("external_ip")?
        };
        let store = VarsStore::parse(&state.bosh.vars_store)?;
        state.bosh.director_name = state.director_name();
        state.bosh.director_address = format!("https://{director_ip}:{DIRECTOR_PORT}");
        state.bosh.director_username = DIRECTOR_USERNAME.into();
        state.bosh.director_password = store.get_or_empty("admin_password");
        state.bosh.director_ssl_ca = store.get_or_empty("director_ssl.ca");
        state.bosh.director_ssl_certificate = store.get_or_empty("director_ssl.certificate");
        state.bosh.director_ssl_private_key = store.get_or_empty("director_ssl.private_key");
        info!(address = %state.bosh.director_address, "step: created bosh director");
        Ok(state)
    }

    async fn delete_director(&self, state: &State, outputs: &Outputs) -> Result<(), DriverError> {
        if state.bosh.state.is_empty() && state.bosh.vars_store.is_empty() {
            debug!("no director deployment to delete");
            return Ok(());
        }
        let deployment = self.paths.director();
        let vars = self.director_deployment_vars(state, outputs)?;
        self.stage(&deployment, &state.bosh.vars_store, &state.bosh.state, &vars).await?;

        info!("step: deleting bosh director");
        let args = self.director_args(state).await?;
        let proxy = self.proxy(state).await?;
        let captured = self.run_env("delete-env", &args, proxy).await?;
        if !captured.success() {
            let (vars_store, bosh_state) = self.collect(&deployment).await?;
            let mut partial = state.clone();
            partial.bosh.vars_store = vars_store;
            partial.bosh.state = bosh_state;
            return Err(DriverError::ManagerDelete {
                state: Box::new(partial),
                message: format!("Delete director: bosh delete-env exited with code {}", captured.code),
            });
        }
        files::remove_optional(&deployment.state_file).await
    }

    async fn delete_jumpbox(&self, state: &State, outputs: &Outputs) -> Result<(), DriverError> {
        if !state.jumpbox.enabled || (state.jumpbox.state.is_empty() && state.jumpbox.vars_store.is_empty()) {
            debug!("no jumpbox deployment to delete");
            return Ok(());
        }
        let deployment = self.paths.jumpbox();
        let vars = self.jumpbox_deployment_vars(state, outputs)?;
        self.stage(&deployment, &state.jumpbox.vars_store, &state.jumpbox.state, &vars).await?;

        info!("step: deleting jumpbox");
        let args = Self::jumpbox_args(state, &deployment)?;
        let captured = self.run_env("delete-env", &args, None).await?;
        if !captured.success() {
            let (vars_store, bosh_state) = self.collect(&deployment).await?;
            let mut partial = state.clone();
            partial.jumpbox.vars_store = vars_store;
            partial.jumpbox.state = bosh_state;
            return Err(DriverError::ManagerDelete {
                state: Box::new(partial),
                message: format!("Delete jumpbox: bosh delete-env exited with code {}", captured.code),
            });
        }
        files::remove_optional(&deployment.state_file).await
    }

    async fn cleanup_director(&self, state: &State) -> Result<(), DriverError> {
        if !state.has_director() {
            return Ok(());
        }
        info!("step: cleaning up director resources");
        let env = director_env(state, &self.paths).await?;
        let mut cmd = self.command()?;
        cmd.args(["clean-up", "--all", "-n"]).envs(env);
        let captured = run_captured(cmd, "bosh").await?;
        if !captured.success() {
            warn!(code = captured.code, "bosh clean-up failed");
            return Err(DriverError::CommandFailed { command: "bosh clean-up".into(), code: captured.code });
        }
        Ok(())
    }

    fn director_deployment_vars(&self, state: &State, outputs: &Outputs) -> Result<String, DriverError> {
        let vars = director_vars(state, outputs)?;
        to_yaml(&vars)
    }

    fn jumpbox_deployment_vars(&self, state: &State, outputs: &Outputs) -> Result<String, DriverError> {
        let vars = jumpbox_vars(state, outputs)?;
        to_yaml(&vars)
    }

    async fn director_info(&self, state: &State) -> Result<(), DriverError> {
        let env = director_env(state, &self.paths).await?;
        let mut cmd = self.command()?;
        cmd.arg("env").envs(env);
        run_stdout(cmd, "bosh env").await.map(|_| ())
    }
}

#[async_trait]
impl DirectorProbe for BoshCli {
    async fn director_info(&self, state: &State) -> Result<(), ProbeError> {
        BoshManager::director_info(self, state).await.map_err(Into::into)
    }
}

// ── Environment ───────────────────────────────────────────────────────────────

/// `ssh+socks5://` proxy through the jumpbox, using the key in `vars/`.
pub fn all_proxy(state: &State, paths: &StatePaths) -> String {
    format!(
        "ssh+socks5://jumpbox@{}?private-key={}",
        state.jumpbox.url,
        paths.jumpbox_private_key().display()
    )
}

/// Write the jumpbox SSH key from the jumpbox vars store to `vars/jumpbox.key`.
pub async fn write_jumpbox_key(state: &State, paths: &StatePaths) -> Result<PathBuf, DriverError> {
    let key = VarsStore::parse(&state.jumpbox.vars_store)?.get_or_empty("jumpbox_ssh.private_key");
    if key.is_empty() {
        return Err(DriverError::Internal("jumpbox private key is missing from the vars store".into()));
    }
    let path = paths.jumpbox_private_key();
    files::write_private(&path, key).await?;
    Ok(path)
}

/// Variables pointing the BOSH CLI at the environment's director. When the
/// director sits behind a jumpbox, the proxy key is written out first.
pub async fn director_env(state: &State, paths: &StatePaths) -> Result<Vec<(&'static str, String)>, DriverError> {
    let mut env = vec![
        ("BOSH_ENVIRONMENT", state.bosh.director_address.clone()),
        ("BOSH_CLIENT", state.bosh.director_username.clone()),
        ("BOSH_CLIENT_SECRET", state.bosh.director_password.clone()),
        ("BOSH_CA_CERT", state.bosh.director_ssl_ca.clone()),
    ];
    if state.jumpbox.enabled && !state.jumpbox.url.is_empty() {
        write_jumpbox_key(state, paths).await?;
        env.push(("BOSH_ALL_PROXY", all_proxy(state, paths)));
    }
    Ok(env)
}

/// Pull `2.0.48` out of `version 2.0.48-e94aeeb-2018-01-09T23:08:07Z`.
pub fn parse_bosh_version(raw: &str) -> Result<String, DriverError> {
    raw.split_whitespace()
        .skip_while(|word| *word != "version")
        .nth(1)
        .and_then(crate::version::parse_loose)
        .map(|v| v.to_string())
        .ok_or_else(|| DriverError::BoshVersion(raw.trim().to_string()))
}

// ── Deployment vars ───────────────────────────────────────────────────────────

fn require_iaas(state: &State) -> Result<Iaas, DriverError> {
    state
        .iaas
        .ok_or_else(|| DriverError::Internal("iaas is not set".into()))
}

fn jumpbox_external_ip(state: &State, outputs: &Outputs) -> Result<String, DriverError> {
    match state.iaas {
        Some(Iaas::Vsphere) => outputs.get_string("jumpbox__internal_ip"),
        _ => outputs.get_string("external_ip"),
    }
}

type Vars = BTreeMap<&'static str, Yaml>;

fn s(value: impl Into<String>) -> Yaml {
    Yaml::String(value.into())
}

fn list(values: Vec<String>) -> Yaml {
    Yaml::Sequence(values.into_iter().map(Yaml::String).collect())
}

fn to_yaml(vars: &Vars) -> Result<String, DriverError> {
    serde_yaml::to_string(vars).map_err(|e| DriverError::Internal(format!("encode deployment vars: {e}")))
}

fn network_vars(vars: &mut Vars, outputs: &Outputs) -> Result<(), DriverError> {
    vars.insert("internal_cidr", s(outputs.get_string("internal_cidr")?));
    vars.insert("internal_gw", s(outputs.get_string("internal_gw")?));
    Ok(())
}

fn iaas_vars(vars: &mut Vars, state: &State, outputs: &Outputs, security_group: &str, tag: &str) -> Result<(), DriverError> {
    match require_iaas(state)? {
        Iaas::Aws => {
            vars.insert("access_key_id", s(&state.aws.access_key_id));
            vars.insert("secret_access_key", s(&state.aws.secret_access_key));
            vars.insert("region", s(&state.aws.region));
            vars.insert("az", s(outputs.get_string("az")?));
            vars.insert("subnet_id", s(outputs.get_string("subnet_id")?));
            vars.insert("default_key_name", s(outputs.get_string("default_key_name")?));
            vars.insert("private_key", s(outputs.get_string("private_key")?));
            vars.insert("default_security_groups", list(vec![outputs.get_string(security_group)?]));
        }
        Iaas::Gcp => {
            vars.insert("zone", s(&state.gcp.zone));
            vars.insert("project_id", s(&state.gcp.project_id));
            vars.insert("gcp_credentials_json", s(&state.gcp.service_account_key));
            vars.insert("network", s(outputs.get_string("network_name")?));
            vars.insert("subnetwork", s(outputs.get_string("subnetwork_name")?));
            vars.insert("tags", list(vec![outputs.get_string(tag)?, outputs.get_string("internal_tag_name")?]));
        }
        Iaas::Azure => {
            vars.insert("environment", s("AzureCloud"));
            vars.insert("subscription_id", s(&state.azure.subscription_id));
            vars.insert("tenant_id", s(&state.azure.tenant_id));
            vars.insert("client_id", s(&state.azure.client_id));
            vars.insert("client_secret", s(&state.azure.client_secret));
            vars.insert("resource_group_name", s(outputs.get_string("bosh_resource_group_name")?));
            vars.insert("storage_account_name", s(outputs.get_string("bosh_storage_account_name")?));
            vars.insert("default_security_group", s(outputs.get_string("bosh_default_security_group")?));
            vars.insert("vnet_name", s(outputs.get_string("bosh_network_name")?));
            vars.insert("subnet_name", s(outputs.get_string("bosh_subnet_name")?));
        }
        Iaas::Vsphere => {
            let vs = &state.vsphere;
            vars.insert("network_name", s(&vs.network));
            vars.insert("vcenter_user", s(&vs.vcenter_user));
            vars.insert("vcenter_password", s(&vs.vcenter_password));
            vars.insert("vcenter_ip", s(&vs.vcenter_ip));
            vars.insert("vcenter_dc", s(&vs.vcenter_dc));
            vars.insert("vcenter_cluster", s(&vs.vcenter_cluster));
            vars.insert("vcenter_rp", s(&vs.vcenter_rp));
            vars.insert("vcenter_ds", s(&vs.vcenter_ds));
            vars.insert("vcenter_disks", s(&vs.vcenter_disks));
            vars.insert("vcenter_templates", s(&vs.vcenter_templates));
            vars.insert("vcenter_vms", s(&vs.vcenter_vms));
        }
    }
    Ok(())
}

fn director_vars(state: &State, outputs: &Outputs) -> Result<Vars, DriverError> {
    let mut vars = Vars::new();
    vars.insert("director_name", s(state.director_name()));
    vars.insert("internal_ip", s(outputs.get_string("director__internal_ip")?));
    network_vars(&mut vars, outputs)?;
    if !state.jumpbox.enabled {
        vars.insert("external_ip", s(outputs.get_string("external_ip")?));
    }
    iaas_vars(&mut vars, state, outputs, "bosh_security_group", "bosh_director_tag_name")?;
    Ok(vars)
}

fn jumpbox_vars(state: &State, outputs: &Outputs) -> Result<Vars, DriverError> {
    let mut vars = Vars::new();
    vars.insert("internal_ip", s(outputs.get_string("jumpbox__internal_ip")?));
    vars.insert("external_ip", s(jumpbox_external_ip(state, outputs)?));
    network_vars(&mut vars, outputs)?;
    iaas_vars(&mut vars, state, outputs, "jumpbox_security_group", "jumpbox_tag_name")?;
    Ok(vars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn aws_outputs() -> Outputs {
        let map = json!({
            "internal_cidr": "10.0.0.0/24",
            "internal_gw": "10.0.0.1",
            "director__internal_ip": "10.0.0.6",
            "jumpbox__internal_ip": "10.0.0.5",
            "external_ip": "52.1.2.3",
            "az": "us-east-1a",
            "subnet_id": "subnet-1",
            "default_key_name": "env_bosh_vms",
            "private_key": "PRIVATE",
            "bosh_security_group": "sg-bosh",
            "jumpbox_security_group": "sg-jumpbox",
        });
        Outputs::new(serde_json::from_value(map).unwrap())
    }

    fn aws_state() -> State {
        let mut state = State { iaas: Some(Iaas::Aws), env_id: "env".into(), ..State::default() };
        state.aws.access_key_id = "id".into();
        state.aws.secret_access_key = "secret".into();
        state.aws.region = "us-east-1".into();
        state.jumpbox.enabled = true;
        state
    }

    #[test]
    fn parses_bosh_versions() {
        assert_eq!(parse_bosh_version("version 2.0.48-e94aeeb-2018-01-09T23:08:07Z\n\nSucceeded\n").unwrap(), "2.0.48");
        assert_eq!(parse_bosh_version("version 7.5.2\n").unwrap(), "7.5.2");
        assert!(matches!(parse_bosh_version("version [DEV BUILD]"), Err(DriverError::BoshVersion(_))));
    }

    #[test]
    fn director_vars_through_jumpbox() {
        let vars = director_vars(&aws_state(), &aws_outputs()).unwrap();
        assert_eq!(vars["director_name"], s("bosh-env"));
        assert_eq!(vars["internal_ip"], s("10.0.0.6"));
        assert_eq!(vars["default_security_groups"], list(vec!["sg-bosh".into()]));
        assert!(!vars.contains_key("external_ip"));
    }

    #[test]
    fn director_vars_without_jumpbox_expose_external_ip() {
        let mut state = aws_state();
        state.jumpbox.enabled = false;
        let vars = director_vars(&state, &aws_outputs()).unwrap();
        assert_eq!(vars["external_ip"], s("52.1.2.3"));
    }

    #[test]
    fn jumpbox_vars_are_sorted_yaml() {
        let bosh = BoshCli::new(StatePaths::new("/tmp/unused"), None);
        let yaml = bosh.jumpbox_deployment_vars(&aws_state(), &aws_outputs()).unwrap();
        assert!(yaml.starts_with("access_key_id: id\n"));
        assert!(yaml.contains("external_ip: 52.1.2.3\n"));
        assert!(yaml.contains("internal_ip: 10.0.0.5\n"));
        assert!(yaml.contains("- sg-jumpbox\n"));
    }

    #[tokio::test]
    async fn director_env_adds_proxy_with_jumpbox() {
        let dir = TempDir::new().unwrap();
        let paths = StatePaths::new(dir.path());
        let mut state = aws_state();
        state.jumpbox.url = "52.1.2.3:22".into();
        state.jumpbox.vars_store = "jumpbox_ssh:\n  private_key: JUMPBOX-KEY\n".into();
        state.bosh.director_address = "https://10.0.0.6:25555".into();
        let env = director_env(&state, &paths).await.unwrap();
        assert!(env.contains(&("BOSH_ENVIRONMENT", "https://10.0.0.6:25555".to_string())));
        assert!(env.contains(&(
            "BOSH_ALL_PROXY",
            format!("ssh+socks5://jumpbox@52.1.2.3:22?private-key={}", paths.jumpbox_private_key().display())
        )));

        state.jumpbox.enabled = false;
        let env = director_env(&state, &paths).await.unwrap();
        assert!(env.iter().all(|(k, _)| *k != "BOSH_ALL_PROXY"));
    }

    #[tokio::test]
    async fn director_env_rebuilds_missing_proxy_key() {
        let dir = TempDir::new().unwrap();
        let paths = StatePaths::new(dir.path());
        let mut state = aws_state();
        state.jumpbox.url = "52.1.2.3:22".into();
        state.jumpbox.vars_store = "jumpbox_ssh:\n  private_key: JUMPBOX-KEY\n".into();
        assert!(!paths.jumpbox_private_key().exists());

        director_env(&state, &paths).await.unwrap();
        assert_eq!(std::fs::read_to_string(paths.jumpbox_private_key()).unwrap(), "JUMPBOX-KEY");

        state.jumpbox.vars_store.clear();
        assert!(director_env(&state, &paths).await.is_err());
    }

    #[tokio::test]
    async fn initialize_writes_manifests_and_cpi() {
        let dir = TempDir::new().unwrap();
        let paths = StatePaths::new(dir.path());
        let bosh = BoshCli::new(paths.clone(), None);
        let state = aws_state();

        bosh.initialize_director(&state).await.unwrap();
        bosh.initialize_jumpbox(&state).await.unwrap();

        assert!(paths.director().deployment_dir.join("bosh.yml").exists());
        assert!(paths.director().deployment_dir.join("aws/cpi.yml").exists());
        assert!(paths.jumpbox().deployment_dir.join("jumpbox.yml").exists());
        assert!(paths.jumpbox().deployment_dir.join("aws/cpi.yml").exists());
    }

    #[cfg(unix)]
    mod fake_binary {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        /// Stand-in for the bosh CLI. `create-env` writes a vars store and a
        /// state file, then exits with `exit_code`.
        fn fake_bosh(dir: &Path, exit_code: i32) -> String {
            let script = format!(
                r#"#!/bin/sh
here=$(dirname "$0")
echo "$@" >> "$here/calls.log"
echo "BOSH_ALL_PROXY=$BOSH_ALL_PROXY" >> "$here/calls.log"
case "$BOSH_ALL_PROXY" in
  *private-key=*)
    key="${{BOSH_ALL_PROXY#*private-key=}}"
    if [ -f "$key" ]; then echo "proxy-key:present" >> "$here/calls.log"; else echo "proxy-key:missing" >> "$here/calls.log"; fi
    ;;
esac
case "$1" in
  -v) echo "version 7.5.2-abcdef-2023-11-01T00:00:00Z"; echo; echo "Succeeded"; exit 0 ;;
  create-env|delete-env)
    shift
    while [ $# -gt 0 ]; do
      case "$1" in
        --state) state="$2"; shift ;;
        --vars-store) store="$2"; shift ;;
      esac
      shift
    done
    echo '{{"current_manifest_sha":"abc"}}' > "$state"
    printf 'admin_password: pw\ndirector_ssl:\n  ca: CA\n  certificate: CERT\n  private_key: KEY\njumpbox_ssh:\n  private_key: JUMPBOX-KEY\n' > "$store"
    exit {exit_code}
    ;;
esac
exit 0
"#
            );
            let path = dir.join("fake-bosh");
            std::fs::write(&path, script).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path.display().to_string()
        }

        fn cli(dir: &TempDir, exit_code: i32) -> (BoshCli, StatePaths) {
            let bin = dir.path().join("bin");
            std::fs::create_dir_all(&bin).unwrap();
            let binary = fake_bosh(&bin, exit_code);
            let paths = StatePaths::new(dir.path().join("state"));
            (BoshCli::new(paths.clone(), Some(binary)), paths)
        }

        #[tokio::test]
        async fn version_is_parsed() {
            let dir = TempDir::new().unwrap();
            let (bosh, _) = cli(&dir, 0);
            assert_eq!(bosh.version().await.unwrap(), "7.5.2");
        }

        #[tokio::test]
        async fn create_director_fills_credentials() {
            let dir = TempDir::new().unwrap();
            let (bosh, paths) = cli(&dir, 0);
            let mut state = aws_state();
            state.jumpbox.url = "52.1.2.3:22".into();
            state.jumpbox.vars_store = "jumpbox_ssh:\n  private_key: JUMPBOX-KEY\n".into();
            bosh.initialize_director(&state).await.unwrap();

            let state = bosh.create_director(state, &aws_outputs()).await.unwrap();
            assert_eq!(state.bosh.director_address, "https://10.0.0.6:25555");
            assert_eq!(state.bosh.director_username, "admin");
            assert_eq!(state.bosh.director_password, "pw");
            assert_eq!(state.bosh.director_ssl_ca, "CA");
            assert_eq!(state.bosh.state["current_manifest_sha"], "abc");
            assert!(state.bosh.manifest.contains("name: bosh"));

            let calls = std::fs::read_to_string(dir.path().join("bin/calls.log")).unwrap();
            assert!(calls.contains(&format!("-o {}", paths.director().deployment_dir.join("aws/cpi.yml").display())));
            assert!(calls.contains("BOSH_ALL_PROXY=ssh+socks5://jumpbox@52.1.2.3:22?private-key="));
            assert!(calls.contains("proxy-key:present"));
        }

        #[tokio::test]
        async fn delete_director_in_fresh_state_dir_writes_proxy_key() {
            let dir = TempDir::new().unwrap();
            let (bosh, paths) = cli(&dir, 0);
            let mut state = aws_state();
            state.jumpbox.url = "52.1.2.3:22".into();
            state.jumpbox.vars_store = "jumpbox_ssh:\n  private_key: JUMPBOX-KEY\n".into();
            state.bosh.vars_store = "admin_password: pw\n".into();
            state.bosh.director_address = "https://10.0.0.6:25555".into();
            bosh.initialize_director(&state).await.unwrap();
            assert!(!paths.jumpbox_private_key().exists());

            bosh.delete_director(&state, &aws_outputs()).await.unwrap();
            BoshManager::director_info(&bosh, &state).await.unwrap();

            let calls = std::fs::read_to_string(dir.path().join("bin/calls.log")).unwrap();
            assert!(calls.contains("proxy-key:present"));
            assert!(!calls.contains("proxy-key:missing"));
        }

        #[tokio::test]
        async fn create_jumpbox_records_url_and_key() {
            let dir = TempDir::new().unwrap();
            let (bosh, paths) = cli(&dir, 0);
            let state = aws_state();
            bosh.initialize_jumpbox(&state).await.unwrap();

            let state = bosh.create_jumpbox(state, &aws_outputs()).await.unwrap();
            assert_eq!(state.jumpbox.url, "52.1.2.3:22");
            assert_eq!(std::fs::read_to_string(paths.jumpbox_private_key()).unwrap(), "JUMPBOX-KEY");
        }

        #[tokio::test]
        async fn failed_create_carries_state_read_back() {
            let dir = TempDir::new().unwrap();
            let (bosh, _) = cli(&dir, 1);
            let mut state = aws_state();
            state.jumpbox.vars_store = "jumpbox_ssh:\n  private_key: JUMPBOX-KEY\n".into();
            bosh.initialize_director(&state).await.unwrap();

            let err = bosh.create_director(state, &aws_outputs()).await.unwrap_err();
            assert!(matches!(err, DriverError::ManagerCreate { .. }));
            let partial = err.partial_state().unwrap();
            assert_eq!(partial.bosh.state["current_manifest_sha"], "abc");
            assert!(partial.bosh.vars_store.contains("admin_password: pw"));
            assert!(partial.bosh.director_address.is_empty());
        }

        #[tokio::test]
        async fn failed_delete_is_a_manager_delete_error() {
            let dir = TempDir::new().unwrap();
            let (bosh, _) = cli(&dir, 1);
            let mut state = aws_state();
            state.jumpbox.vars_store = "jumpbox_ssh:\n  private_key: JUMPBOX-KEY\n".into();
            state.bosh.vars_store = "admin_password: pw\n".into();
            bosh.initialize_director(&state).await.unwrap();

            let err = bosh.delete_director(&state, &aws_outputs()).await.unwrap_err();
            assert!(matches!(err, DriverError::ManagerDelete { .. }));
            assert!(err.to_string().starts_with("Delete director:"));
        }
    }
}
