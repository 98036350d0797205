use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bbl_domain::State;
use bbl_store::StatePaths;
use tokio::process::Command;
use tracing::debug;

use crate::bosh::write_jumpbox_key;
use crate::error::DriverError;
use crate::files;
use crate::process::{resolve_binary, run_interactive};
use crate::vars_store::VarsStore;

const SSH_OPTIONS: &[&str] = &["-o", "StrictHostKeyChecking=no", "-o", "ServerAliveInterval=300"];

/// Interactive SSH sessions into the environment's VMs.
#[async_trait]
pub trait SshManager: Send + Sync {
    async fn jumpbox(&self, state: &State, command: Option<&str>) -> Result<(), DriverError>;

    /// Session on the director, proxied through the jumpbox.
    async fn director(&self, state: &State, command: Option<&str>) -> Result<(), DriverError>;
}

pub struct SshCli {
    binary: String,
    paths: StatePaths,
}

impl SshCli {
    pub fn new(paths: StatePaths) -> Self {
        SshCli { binary: "ssh".into(), paths }
    }

    async fn write_director_key(&self, state: &State) -> Result<PathBuf, DriverError> {
        let key = VarsStore::parse(&state.bosh.vars_store)?.get_or_empty("jumpbox_ssh.private_key");
        if key.is_empty() {
            return Err(DriverError::Internal("director private key is missing from the vars store".into()));
        }
        let path = self.paths.vars_dir().join("director-jumpbox.key");
        files::write_private(&path, key).await?;
        Ok(path)
    }

    async fn run(&self, args: Vec<String>) -> Result<(), DriverError> {
        debug!(?args, "ssh");
        let mut cmd = Command::new(resolve_binary(&self.binary)?);
        cmd.args(args);
        let code = run_interactive(cmd, "ssh").await?;
        if code != 0 {
            return Err(DriverError::CommandFailed { command: "ssh".into(), code });
        }
        Ok(())
    }
}

fn require_jumpbox(state: &State) -> Result<(), DriverError> {
    if !state.jumpbox.enabled || state.jumpbox.url.is_empty() {
        return Err(DriverError::Internal("this environment has no jumpbox to ssh through".into()));
    }
    Ok(())
}

/// Host part of `https://10.0.0.6:25555`.
fn director_host(address: &str) -> &str {
    let without_scheme = address.trim_start_matches("https://");
    without_scheme.split(':').next().unwrap_or(without_scheme)
}

pub fn jumpbox_args(state: &State, key: &Path, command: Option<&str>) -> Vec<String> {
    let mut args: Vec<String> = SSH_OPTIONS.iter().map(|s| s.to_string()).collect();
    args.extend([
        format!("jumpbox@{}", state.jumpbox.host()),
        "-i".into(),
        key.display().to_string(),
    ]);
    args.extend(command.map(str::to_string));
    args
}

pub fn director_args(state: &State, jumpbox_key: &Path, director_key: &Path, command: Option<&str>) -> Vec<String> {
    let proxy = format!(
        "ProxyCommand=ssh -o StrictHostKeyChecking=no -i {} -W %h:%p jumpbox@{}",
        jumpbox_key.display(),
        state.jumpbox.host()
    );
    let mut args: Vec<String> = SSH_OPTIONS.iter().map(|s| s.to_string()).collect();
    args.extend([
        "-o".into(),
        proxy,
        format!("jumpbox@{}", director_host(&state.bosh.director_address)),
        "-i".into(),
        director_key.display().to_string(),
    ]);
    args.extend(command.map(str::to_string));
    args
}

#[async_trait]
impl SshManager for SshCli {
    async fn jumpbox(&self, state: &State, command: Option<&str>) -> Result<(), DriverError> {
        require_jumpbox(state)?;
        let key = write_jumpbox_key(state, &self.paths).await?;
        self.run(jumpbox_args(state, &key, command)).await
    }

    async fn director(&self, state: &State, command: Option<&str>) -> Result<(), DriverError> {
        require_jumpbox(state)?;
        if state.bosh.director_address.is_empty() {
            return Err(DriverError::Internal("this environment has no director".into()));
        }
        let jumpbox_key = write_jumpbox_key(state, &self.paths).await?;
        let director_key = self.write_director_key(state).await?;
        self.run(director_args(state, &jumpbox_key, &director_key, command)).await
    }
}
