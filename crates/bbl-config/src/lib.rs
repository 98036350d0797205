mod flags;
mod loader;
mod validate;
pub mod error;

pub use error::ConfigError;
pub use flags::{AwsFlags, AzureFlags, GcpFlags, GlobalConfig, VsphereFlags};
pub use loader::{load_gcp_service_account_key, merge_into_state, GcpServiceAccountKey};
pub use validate::require_credentials;
