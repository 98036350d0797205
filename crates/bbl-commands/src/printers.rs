use std::str::FromStr;

use async_trait::async_trait;
use bbl_domain::State;
use bbl_driver::{all_proxy, write_jumpbox_key, VarsStore};
use bbl_validate::StateValidator;

use crate::command::Command;
use crate::error::{step, CommandError};
use crate::managers::Managers;

/// Single values `bbl` can print from the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Outputs,
    LatestError,
    SshKey,
    DirectorSshKey,
    JumpboxAddress,
    DirectorAddress,
    DirectorUsername,
    DirectorPassword,
    DirectorCaCert,
    EnvId,
    CloudConfig,
    BoshDeploymentVars,
    JumpboxDeploymentVars,
}

fn non_empty(value: String, thing: &'static str) -> Result<String, CommandError> {
    if value.is_empty() {
        Err(CommandError::NotFound { thing })
    } else {
        Ok(value)
    }
}

fn require_director(state: &State) -> Result<(), CommandError> {
    if state.no_director {
        return Err(CommandError::NoDirector);
    }
    Ok(())
}

pub struct Print {
    managers: Managers,
}

impl Print {
    pub fn new(managers: Managers) -> Self {
        Print { managers }
    }

    /// The text printed for `field`.
    pub async fn render(&self, field: Field, state: &State) -> Result<String, CommandError> {
        let m = &self.managers;
        match field {
            Field::LatestError => Ok(state.latest_tf_output.clone()),
            Field::EnvId => non_empty(state.env_id.clone(), "environment id"),
            Field::JumpboxAddress => non_empty(state.jumpbox.url.clone(), "jumpbox address"),
            Field::SshKey => {
                let from_vars = VarsStore::parse(&state.jumpbox.vars_store)?.get_or_empty("jumpbox_ssh.private_key");
                let key = if from_vars.is_empty() { state.key_pair.private_key.clone() } else { from_vars };
                non_empty(key, "ssh key")
            }
            Field::DirectorSshKey => {
                require_director(state)?;
                let key = VarsStore::parse(&state.bosh.vars_store)?.get_or_empty("jumpbox_ssh.private_key");
                non_empty(key, "director ssh key")
            }
            Field::DirectorAddress => {
                require_director(state)?;
                non_empty(state.bosh.director_address.clone(), "director address")
            }
            Field::DirectorUsername => {
                require_director(state)?;
                non_empty(state.bosh.director_username.clone(), "director username")
            }
            Field::DirectorPassword => {
                require_director(state)?;
                non_empty(state.bosh.director_password.clone(), "director password")
            }
            Field::DirectorCaCert => {
                require_director(state)?;
                non_empty(state.bosh.director_ssl_ca.clone(), "director ca cert")
            }
            Field::Outputs => {
                m.terraform.setup(state).await.map_err(step("Terraform manager setup"))?;
                let outputs = m.terraform.get_outputs().await.map_err(step("Terraform manager get outputs"))?;
                if outputs.is_empty() {
                    return Err(CommandError::NotFound { thing: "terraform outputs" });
                }
                serde_yaml::to_string(outputs.map())
                    .map_err(|e| CommandError::Usage(format!("render outputs: {e}")))
            }
            Field::CloudConfig => {
                m.cloud_config.interpolate(state).await.map_err(step("Cloud config manager interpolate"))
            }
            Field::BoshDeploymentVars | Field::JumpboxDeploymentVars => {
                m.terraform.setup(state).await.map_err(step("Terraform manager setup"))?;
                let outputs = m.terraform.get_outputs().await.map_err(step("Terraform manager get outputs"))?;
                let vars = if field == Field::BoshDeploymentVars {
                    m.bosh.director_deployment_vars(state, &outputs)
                } else {
                    m.bosh.jumpbox_deployment_vars(state, &outputs)
                };
                vars.map_err(step("Bosh manager deployment vars"))
            }
        }
    }
}

#[async_trait]
impl Command for Print {
    type Args = Field;

    async fn check_fast_fails(&self, _field: &Field, _state: &State) -> Result<(), CommandError> {
        StateValidator::new(self.managers.store.paths().clone()).validate()?;
        Ok(())
    }

    async fn execute(&self, field: Field, state: State) -> Result<(), CommandError> {
        let text = self.render(field, &state).await?;
        self.managers.output.print(&text);
        Ok(())
    }
}

// ── print-env ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ShellType {
    #[default]
    Posix,
    Powershell,
}

impl FromStr for ShellType {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "posix" => Ok(ShellType::Posix),
            "powershell" => Ok(ShellType::Powershell),
            other => Err(CommandError::Usage(format!(
                "unsupported shell type {other:?}, valid values are: posix, powershell"
            ))),
        }
    }
}

impl ShellType {
    fn export(self, name: &str, value: &str) -> String {
        match self {
            ShellType::Posix => format!("export {name}='{}'", value.replace('\'', r"'\''")),
            ShellType::Powershell => format!("$env:{name}=\"{}\"", value.replace('"', "`\"")),
        }
    }
}

/// Host part of `https://10.0.0.6:25555`.
fn director_host(address: &str) -> &str {
    let without_scheme = address.trim_start_matches("https://");
    without_scheme.split(':').next().unwrap_or(without_scheme)
}

/// Shell exports that target the environment's director and credhub.
pub struct PrintEnv {
    managers: Managers,
}

impl PrintEnv {
    pub fn new(managers: Managers) -> Self {
        PrintEnv { managers }
    }

    pub async fn variables(&self, state: &State) -> Result<Vec<(&'static str, String)>, CommandError> {
        if !state.has_director() {
            return Err(CommandError::NoDirector);
        }

        let mut vars = vec![
            ("BOSH_CLIENT", state.bosh.director_username.clone()),
            ("BOSH_CLIENT_SECRET", state.bosh.director_password.clone()),
            ("BOSH_CA_CERT", state.bosh.director_ssl_ca.clone()),
            ("BOSH_ENVIRONMENT", state.bosh.director_address.clone()),
        ];

        let director_vars = VarsStore::parse(&state.bosh.vars_store)?;
        let credhub_secret = director_vars.get_or_empty("credhub_admin_client_secret");
        if !credhub_secret.is_empty() {
            let ca = [director_vars.get_or_empty("credhub_tls.ca"), director_vars.get_or_empty("uaa_ssl.ca")]
                .into_iter()
                .filter(|c| !c.is_empty())
                .collect::<Vec<_>>()
                .join("\n");
            vars.extend([
                ("CREDHUB_SERVER", format!("https://{}:8844", director_host(&state.bosh.director_address))),
                ("CREDHUB_CA_CERT", ca),
                ("CREDHUB_CLIENT", "credhub-admin".to_string()),
                ("CREDHUB_SECRET", credhub_secret),
            ]);
        }

        if state.jumpbox.enabled && !state.jumpbox.url.is_empty() {
            let paths = self.managers.store.paths();
            let key = write_jumpbox_key(state, paths).await?;
            let proxy = all_proxy(state, paths);
            vars.extend([
                ("JUMPBOX_PRIVATE_KEY", key.display().to_string()),
                ("BOSH_ALL_PROXY", proxy.clone()),
                ("CREDHUB_PROXY", proxy),
            ]);
        }
        Ok(vars)
    }
}

#[async_trait]
impl Command for PrintEnv {
    type Args = ShellType;

    async fn check_fast_fails(&self, _shell: &ShellType, _state: &State) -> Result<(), CommandError> {
        StateValidator::new(self.managers.store.paths().clone()).validate()?;
        Ok(())
    }

    async fn execute(&self, shell: ShellType, state: State) -> Result<(), CommandError> {
        let lines: Vec<String> = self
            .variables(&state)
            .await?
            .iter()
            .map(|(name, value)| shell.export(name, value))
            .collect();
        self.managers.output.print(&lines.join("\n"));
        Ok(())
    }
}
