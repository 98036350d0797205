use async_trait::async_trait;
use bbl_domain::{Iaas, LbType, State};
use bbl_store::StatePaths;
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::DriverError;
use crate::files;
use crate::outputs::Outputs;
use crate::process::{resolve_binary, run_captured, run_interactive, run_stdout};
use crate::templates::terraform_template;
use crate::version::{check_minimum, MINIMUM_TERRAFORM_VERSION};

/// Adapter to the infrastructure provisioner.
#[async_trait]
pub trait TerraformManager: Send + Sync {
    async fn validate_version(&self) -> Result<(), DriverError>;

    /// Write the template, tfvars and any stored tfstate into the state dir.
    /// Idempotent.
    async fn setup(&self, state: &State) -> Result<(), DriverError>;

    async fn init(&self, state: &State) -> Result<(), DriverError>;

    /// Failures carry the updated state in `DriverError::Manager`.
    async fn apply(&self, state: State) -> Result<State, DriverError>;

    /// Failures carry the updated state in `DriverError::Manager`.
    async fn destroy(&self, state: State) -> Result<State, DriverError>;

    async fn validate(&self, state: State) -> Result<State, DriverError>;

    async fn get_outputs(&self) -> Result<Outputs, DriverError>;

    async fn is_paved(&self) -> Result<bool, DriverError>;
}

/// [`TerraformManager`] that shells out to a terraform-compatible binary.
///
/// Runs use `-chdir=<state-dir>/terraform` with the state file and tfvars
/// under `vars/`, and keep terraform's data dir in `vars/.terraform`.
pub struct TerraformCli {
    binary: String,
    paths: StatePaths,
    auto_approve: bool,
}

impl TerraformCli {
    /// `binary` defaults to `terraform` on `PATH`.
    pub fn new(paths: StatePaths, binary: Option<String>, auto_approve: bool) -> Self {
        TerraformCli {
            binary: binary.filter(|b| !b.is_empty()).unwrap_or_else(|| "terraform".into()),
            paths,
            auto_approve,
        }
    }

    fn command(&self, args: &[&str], env: &[(String, String)]) -> Result<Command, DriverError> {
        let binary = resolve_binary(&self.binary)?;
        let mut cmd = Command::new(binary);
        cmd.arg(format!("-chdir={}", self.paths.terraform_dir().display()))
            .args(args)
            .current_dir(self.paths.root())
            .env("TF_DATA_DIR", self.paths.vars_dir().join(".terraform"))
            .env("TF_IN_AUTOMATION", "1")
            .envs(env.iter().map(|(k, v)| (k, v)));
        Ok(cmd)
    }

    fn state_arg(&self) -> String {
        format!("-state={}", self.paths.tfstate().display())
    }

    fn var_file_arg(&self) -> String {
        format!("-var-file={}", self.paths.tfvars().display())
    }

    /// Shared body of apply and destroy.
    async fn run_operation(&self, mut state: State, operation: &'static str) -> Result<State, DriverError> {
        if let Err(e) = self.init(&state).await {
            return Err(DriverError::Manager {
                state: Box::new(state),
                message: format!("Terraform init: {e}"),
            });
        }

        let state_arg = self.state_arg();
        let var_file_arg = self.var_file_arg();
        let mut args = vec![operation, state_arg.as_str(), var_file_arg.as_str()];
        if self.auto_approve {
            args.extend(["-auto-approve", "-input=false"]);
        }

        info!(operation, "step: running terraform {operation}");
        let cmd = self.command(&args, &credential_env(&state))?;
        let code = if self.auto_approve {
            let captured = run_captured(cmd, "terraform").await?;
            state.latest_tf_output = captured.log;
            captured.code
        } else {
            run_interactive(cmd, "terraform").await?
        };

        state.tf_state = files::read_optional(&self.paths.tfstate()).await?;

        if code != 0 {
            return Err(DriverError::Manager {
                state: Box::new(state),
                message: format!("Terraform {operation} failed with exit code {code}; run `bbl latest-error` for details"),
            });
        }
        Ok(state)
    }
}

#[async_trait]
impl TerraformManager for TerraformCli {
    async fn validate_version(&self) -> Result<(), DriverError> {
        let mut cmd = Command::new(resolve_binary(&self.binary)?);
        cmd.args(["version", "-json"]);
        let raw = run_stdout(cmd, "terraform version").await?;
        let found = match serde_json::from_str::<Value>(&raw) {
            Ok(v) => v["terraform_version"].as_str().unwrap_or_default().to_string(),
            Err(_) => raw
                .split_whitespace()
                .find(|word| word.starts_with('v'))
                .unwrap_or_default()
                .to_string(),
        };
        debug!(version = %found, "terraform version");
        check_minimum("Terraform", &found, MINIMUM_TERRAFORM_VERSION)
    }

    async fn setup(&self, state: &State) -> Result<(), DriverError> {
        let iaas = state
            .iaas
            .ok_or_else(|| DriverError::Internal("cannot set up terraform without an iaas".into()))?;

        files::write(&self.paths.terraform_template(), terraform_template(iaas, state.lb.lb_type)).await?;
        files::write_private(&self.paths.tfvars(), tfvars(state)).await?;
        if !state.tf_state.is_empty() {
            files::write_private(&self.paths.tfstate(), &state.tf_state).await?;
        }
        debug!(dir = %self.paths.terraform_dir().display(), "terraform template written");
        Ok(())
    }

    async fn init(&self, state: &State) -> Result<(), DriverError> {
        let cmd = self.command(&["init", "-input=false"], &credential_env(state))?;
        let captured = run_captured(cmd, "terraform").await?;
        if !captured.success() {
            return Err(DriverError::CommandFailed { command: "terraform init".into(), code: captured.code });
        }
        Ok(())
    }

    async fn apply(&self, state: State) -> Result<State, DriverError> {
        self.run_operation(state, "apply").await
    }

    async fn destroy(&self, state: State) -> Result<State, DriverError> {
        self.run_operation(state, "destroy").await
    }

    async fn validate(&self, mut state: State) -> Result<State, DriverError> {
        if let Err(e) = self.init(&state).await {
            return Err(DriverError::Manager { state: Box::new(state), message: format!("Terraform init: {e}") });
        }
        let cmd = self.command(&["validate", "-no-color"], &credential_env(&state))?;
        let captured = run_captured(cmd, "terraform").await?;
        let (ok, code) = (captured.success(), captured.code);
        state.latest_tf_output = captured.log;
        if !ok {
            return Err(DriverError::Manager {
                state: Box::new(state),
                message: format!("Terraform validate failed with exit code {code}"),
            });
        }
        Ok(state)
    }

    async fn get_outputs(&self) -> Result<Outputs, DriverError> {
        if !self.paths.tfstate().exists() {
            return Ok(Outputs::default());
        }
        let state_arg = self.state_arg();
        let cmd = self.command(&["output", "-json", state_arg.as_str()], &[])?;
        let raw = run_stdout(cmd, "terraform output").await?;
        Outputs::from_terraform_json(&raw)
    }

    async fn is_paved(&self) -> Result<bool, DriverError> {
        let tfstate = self.paths.tfstate();
        if !tfstate.exists() {
            return Ok(false);
        }
        let state_arg = self.state_arg();
        let cmd = self.command(&["state", "list", state_arg.as_str()], &[])?;
        match run_stdout(cmd, "terraform state list").await {
            Ok(listing) => Ok(!listing.trim().is_empty()),
            Err(e) => {
                debug!(error = %e, "state list failed, reading tfstate directly");
                let raw = files::read_optional(&tfstate).await?;
                Ok(tfstate_has_resources(&raw))
            }
        }
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn tfstate_has_resources(raw: &str) -> bool {
    serde_json::from_str::<Value>(raw)
        .ok()
        .and_then(|v| v["resources"].as_array().map(|r| !r.is_empty()))
        .unwrap_or(false)
}

/// Credentials reach terraform as `TF_VAR_*` variables; they are never
/// written into tfvars.
pub fn credential_env(state: &State) -> Vec<(String, String)> {
    let vars: Vec<(&str, &str)> = match state.iaas {
        Some(Iaas::Aws) => vec![
            ("access_key", state.aws.access_key_id.as_str()),
            ("secret_key", state.aws.secret_access_key.as_str()),
        ],
        Some(Iaas::Gcp) => vec![("credentials", state.gcp.service_account_key.as_str())],
        Some(Iaas::Azure) => vec![
            ("client_id", state.azure.client_id.as_str()),
            ("client_secret", state.azure.client_secret.as_str()),
            ("subscription_id", state.azure.subscription_id.as_str()),
            ("tenant_id", state.azure.tenant_id.as_str()),
        ],
        Some(Iaas::Vsphere) | None => vec![],
    };
    vars.into_iter()
        .map(|(name, value)| (format!("TF_VAR_{name}"), value.to_string()))
        .collect()
}

/// Format a single HCL string variable assignment.
fn tfvar(key: &str, value: &str) -> String {
    let escaped = value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace("${", "$${")
        .replace("%{", "%%{");
    format!("{key} = \"{escaped}\"\n")
}

fn tfvar_list(key: &str, values: &[String]) -> String {
    let items: Vec<String> = values
        .iter()
        .map(|v| format!("\"{}\"", v.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect();
    format!("{key} = [{}]\n", items.join(", "))
}

/// Azure storage account names allow only lowercase letters and digits.
fn simple_env_id(env_id: &str) -> String {
    env_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .take(24)
        .collect()
}

/// Contents of `vars/bbl.tfvars` for the state's iaas and load balancer.
pub fn tfvars(state: &State) -> String {
    let mut content = String::from("# Generated by bbl, do not edit\n");
    content.push_str(&tfvar("env_id", &state.env_id));

    match state.iaas {
        Some(Iaas::Aws) => {
            content.push_str(&tfvar("region", &state.aws.region));
        }
        Some(Iaas::Gcp) => {
            content.push_str(&tfvar("project_id", &state.gcp.project_id));
            content.push_str(&tfvar("region", &state.gcp.region));
            content.push_str(&tfvar("zone", &state.gcp.zone));
            content.push_str(&tfvar_list("zones", &state.gcp.zones));
        }
        Some(Iaas::Azure) => {
            content.push_str(&tfvar("region", &state.azure.region));
            content.push_str(&tfvar("simple_env_id", &simple_env_id(&state.env_id)));
        }
        Some(Iaas::Vsphere) => {
            content.push_str(&tfvar("vsphere_subnet_cidr", &state.vsphere.subnet_cidr));
            content.push_str(&tfvar("network_name", &state.vsphere.network));
            content.push_str(&tfvar("vcenter_cluster", &state.vsphere.vcenter_cluster));
        }
        None => {}
    }

    let lb = &state.lb;
    match (state.iaas, lb.lb_type) {
        (Some(Iaas::Aws), Some(lb_type)) => {
            content.push_str(&tfvar("ssl_certificate", &lb.cert));
            content.push_str(&tfvar("ssl_certificate_private_key", &lb.key));
            content.push_str(&tfvar("ssl_certificate_chain", &lb.chain));
            if lb_type == LbType::Cf {
                content.push_str(&tfvar("system_domain", &lb.domain));
            }
        }
        (Some(Iaas::Gcp), Some(LbType::Cf)) => {
            content.push_str(&tfvar("ssl_certificate", &lb.cert));
            content.push_str(&tfvar("ssl_certificate_private_key", &lb.key));
            content.push_str(&tfvar("system_domain", &lb.domain));
        }
        (Some(Iaas::Azure), Some(LbType::Cf)) => {
            content.push_str(&tfvar("pfx_cert_base64", &lb.cert));
            content.push_str(&tfvar("pfx_password", &lb.key));
            content.push_str(&tfvar("system_domain", &lb.domain));
        }
        _ => {}
    }
    content
}
