use std::path::{Path, PathBuf};

pub const STATE_FILE: &str = "bbl-state.json";

/// Directories generated under the state dir. Removed when the state is cleared.
pub const GENERATED_DIRS: &[&str] = &[
    "vars",
    "terraform",
    "bosh-deployment",
    "jumpbox-deployment",
    "cloud-config",
    "runtime-config",
    ".bbl",
];

/// Deterministic layout of a state directory.
///
/// ```text
/// <root>/
///   bbl-state.json
///   vars/                 provisioner vars, tfstate, vars stores (secrets)
///   terraform/            generated template plus operator overrides
///   bosh-deployment/      director manifest and ops files
///   jumpbox-deployment/   jumpbox manifest and ops files
///   cloud-config/         cloud-config template and ops files
///   runtime-config/       runtime-config template
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    root: PathBuf,
}

/// Files belonging to one `bosh create-env` deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentPaths {
    pub deployment_dir: PathBuf,
    pub vars_store: PathBuf,
    pub vars_file: PathBuf,
    pub state_file: PathBuf,
}

impl StatePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        StatePaths { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state_file(&self) -> PathBuf {
        self.root.join(STATE_FILE)
    }

    pub fn vars_dir(&self) -> PathBuf {
        self.root.join("vars")
    }

    /// Pre-v13 name of the vars dir.
    pub fn legacy_vars_dir(&self) -> PathBuf {
        self.root.join(".bbl")
    }

    pub fn terraform_dir(&self) -> PathBuf {
        self.root.join("terraform")
    }

    pub fn terraform_template(&self) -> PathBuf {
        self.terraform_dir().join("bbl-template.tf")
    }

    pub fn tfvars(&self) -> PathBuf {
        self.vars_dir().join("bbl.tfvars")
    }

    pub fn tfstate(&self) -> PathBuf {
        self.vars_dir().join("terraform.tfstate")
    }

    pub fn cloud_config_dir(&self) -> PathBuf {
        self.root.join("cloud-config")
    }

    pub fn cloud_config_vars(&self) -> PathBuf {
        self.vars_dir().join("cloud-config-vars.yml")
    }

    pub fn runtime_config_dir(&self) -> PathBuf {
        self.root.join("runtime-config")
    }

    pub fn user_ops_file(&self) -> PathBuf {
        self.vars_dir().join("user-ops-file.yml")
    }

    pub fn director(&self) -> DeploymentPaths {
        let vars = self.vars_dir();
        DeploymentPaths {
            deployment_dir: self.root.join("bosh-deployment"),
            vars_store: vars.join("director-vars-store.yml"),
            vars_file: vars.join("director-vars-file.yml"),
            state_file: vars.join("bosh-state.json"),
        }
    }

    pub fn jumpbox(&self) -> DeploymentPaths {
        let vars = self.vars_dir();
        DeploymentPaths {
            deployment_dir: self.root.join("jumpbox-deployment"),
            vars_store: vars.join("jumpbox-vars-store.yml"),
            vars_file: vars.join("jumpbox-vars-file.yml"),
            state_file: vars.join("jumpbox-state.json"),
        }
    }

    /// Where `print-env` and `ssh` drop the jumpbox private key.
    pub fn jumpbox_private_key(&self) -> PathBuf {
        self.vars_dir().join("jumpbox.key")
    }
}
