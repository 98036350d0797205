use std::path::PathBuf;

/// Global options shared by every command, already resolved from flags and
/// `BBL_*` environment variables.
#[derive(Debug, Clone, Default)]
pub struct GlobalConfig {
    pub state_dir: PathBuf,
    pub debug: bool,
    pub no_confirm: bool,
    pub terraform_binary: Option<String>,
    pub disable_tf_auto_approve: bool,
    pub iaas: Option<String>,
    pub aws: AwsFlags,
    pub gcp: GcpFlags,
    pub azure: AzureFlags,
    pub vsphere: VsphereFlags,
}

#[derive(Debug, Clone, Default)]
pub struct AwsFlags {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub region: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct GcpFlags {
    /// Path to a service account key file, or the key JSON itself.
    pub service_account_key: Option<String>,
    pub region: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AzureFlags {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub region: Option<String>,
    pub subscription_id: Option<String>,
    pub tenant_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct VsphereFlags {
    pub vcenter_user: Option<String>,
    pub vcenter_password: Option<String>,
    pub vcenter_ip: Option<String>,
    pub vcenter_dc: Option<String>,
    pub vcenter_cluster: Option<String>,
    pub vcenter_rp: Option<String>,
    pub network: Option<String>,
    pub vcenter_ds: Option<String>,
    pub subnet_cidr: Option<String>,
    pub vcenter_disks: Option<String>,
    pub vcenter_templates: Option<String>,
    pub vcenter_vms: Option<String>,
}
