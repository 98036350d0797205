pub mod aws;
pub mod azure;
pub mod bosh;
pub mod cloud;
pub mod cloud_config;
pub mod error;
mod files;
pub mod gcp;
pub mod keys;
pub mod outputs;
mod process;
pub mod ssh;
pub mod templates;
pub mod terraform;
pub mod vars_store;
pub mod version;

pub use bosh::{all_proxy, director_env, write_jumpbox_key, BoshCli, BoshManager};
pub use cloud::{CloudClients, CloudPreflight, EnvironmentLookup, Leftover, LeftoverCleaner, NoCloud};
pub use cloud_config::{BoshCloudConfig, CloudConfigManager, EmbeddedRuntimeConfig, RuntimeConfigManager};
pub use error::DriverError;
pub use keys::{generate_ssh_key, SshKey};
pub use outputs::Outputs;
pub use ssh::{SshCli, SshManager};
pub use terraform::{TerraformCli, TerraformManager};
pub use vars_store::VarsStore;
