use std::path::PathBuf;

use bbl_commands::{LbArgs, PlanArgs};
use bbl_config::{AwsFlags, AzureFlags, GcpFlags, GlobalConfig, VsphereFlags};
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "bbl",
    about = "Stands up a BOSH director and the infrastructure under it on AWS, GCP, Azure or vSphere",
    version
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Directory holding bbl-state.json and the generated files.
    #[arg(long, short = 's', env = "BBL_STATE_DIRECTORY", default_value = ".", global = true)]
    pub state_dir: PathBuf,

    /// Print debug logs, including terraform and bosh output.
    #[arg(long, short = 'd', env = "BBL_DEBUG", global = true)]
    pub debug: bool,

    /// Do not ask for confirmation before destroying anything.
    #[arg(long, short = 'n', global = true)]
    pub no_confirm: bool,

    /// Terraform binary to use instead of the one on PATH.
    #[arg(long, env = "BBL_TERRAFORM_BINARY", global = true)]
    pub terraform_binary: Option<String>,

    /// Let terraform ask before applying.
    #[arg(long, env = "BBL_DISABLE_TF_AUTO_APPROVE", global = true)]
    pub disable_tf_auto_approve: bool,

    /// aws, gcp, azure or vsphere.
    #[arg(long, env = "BBL_IAAS", global = true)]
    pub iaas: Option<String>,

    #[command(flatten)]
    pub aws: AwsArgs,

    #[command(flatten)]
    pub gcp: GcpArgs,

    #[command(flatten)]
    pub azure: AzureArgs,

    #[command(flatten)]
    pub vsphere: VsphereArgs,
}

#[derive(Debug, Args)]
#[command(next_help_heading = "AWS")]
pub struct AwsArgs {
    #[arg(long, env = "BBL_AWS_ACCESS_KEY_ID", global = true)]
    pub aws_access_key_id: Option<String>,
    #[arg(long, env = "BBL_AWS_SECRET_ACCESS_KEY", global = true, hide_env_values = true)]
    pub aws_secret_access_key: Option<String>,
    #[arg(long, env = "BBL_AWS_REGION", global = true)]
    pub aws_region: Option<String>,
}

#[derive(Debug, Args)]
#[command(next_help_heading = "GCP")]
pub struct GcpArgs {
    /// Path to a service account key file, or the key JSON itself.
    #[arg(long, env = "BBL_GCP_SERVICE_ACCOUNT_KEY", global = true, hide_env_values = true)]
    pub gcp_service_account_key: Option<String>,
    #[arg(long, env = "BBL_GCP_REGION", global = true)]
    pub gcp_region: Option<String>,
}

#[derive(Debug, Args)]
#[command(next_help_heading = "Azure")]
pub struct AzureArgs {
    #[arg(long, env = "BBL_AZURE_CLIENT_ID", global = true)]
    pub azure_client_id: Option<String>,
    #[arg(long, env = "BBL_AZURE_CLIENT_SECRET", global = true, hide_env_values = true)]
    pub azure_client_secret: Option<String>,
    #[arg(long, env = "BBL_AZURE_REGION", global = true)]
    pub azure_region: Option<String>,
    #[arg(long, env = "BBL_AZURE_SUBSCRIPTION_ID", global = true)]
    pub azure_subscription_id: Option<String>,
    #[arg(long, env = "BBL_AZURE_TENANT_ID", global = true)]
    pub azure_tenant_id: Option<String>,
}

#[derive(Debug, Args)]
#[command(next_help_heading = "vSphere")]
pub struct VsphereArgs {
    #[arg(long, env = "BBL_VSPHERE_VCENTER_USER", global = true)]
    pub vsphere_vcenter_user: Option<String>,
    #[arg(long, env = "BBL_VSPHERE_VCENTER_PASSWORD", global = true, hide_env_values = true)]
    pub vsphere_vcenter_password: Option<String>,
    #[arg(long, env = "BBL_VSPHERE_VCENTER_IP", global = true)]
    pub vsphere_vcenter_ip: Option<String>,
    #[arg(long, env = "BBL_VSPHERE_VCENTER_DC", global = true)]
    pub vsphere_vcenter_dc: Option<String>,
    #[arg(long, env = "BBL_VSPHERE_VCENTER_CLUSTER", global = true)]
    pub vsphere_vcenter_cluster: Option<String>,
    #[arg(long, env = "BBL_VSPHERE_VCENTER_RP", global = true)]
    pub vsphere_vcenter_rp: Option<String>,
    #[arg(long, env = "BBL_VSPHERE_NETWORK", global = true)]
    pub vsphere_network: Option<String>,
    #[arg(long, env = "BBL_VSPHERE_VCENTER_DS", global = true)]
    pub vsphere_vcenter_ds: Option<String>,
    #[arg(long, env = "BBL_VSPHERE_SUBNET_CIDR", global = true)]
    pub vsphere_subnet_cidr: Option<String>,
    #[arg(long, env = "BBL_VSPHERE_VCENTER_DISKS", global = true)]
    pub vsphere_vcenter_disks: Option<String>,
    #[arg(long, env = "BBL_VSPHERE_VCENTER_TEMPLATES", global = true)]
    pub vsphere_vcenter_templates: Option<String>,
    #[arg(long, env = "BBL_VSPHERE_VCENTER_VMS", global = true)]
    pub vsphere_vcenter_vms: Option<String>,
}

impl From<&GlobalArgs> for GlobalConfig {
    fn from(args: &GlobalArgs) -> Self {
        GlobalConfig {
            state_dir: args.state_dir.clone(),
            debug: args.debug,
            no_confirm: args.no_confirm,
            terraform_binary: args.terraform_binary.clone(),
            disable_tf_auto_approve: args.disable_tf_auto_approve,
            iaas: args.iaas.clone(),
            aws: AwsFlags {
                access_key_id: args.aws.aws_access_key_id.clone(),
                secret_access_key: args.aws.aws_secret_access_key.clone(),
                region: args.aws.aws_region.clone(),
            },
            gcp: GcpFlags {
                service_account_key: args.gcp.gcp_service_account_key.clone(),
                region: args.gcp.gcp_region.clone(),
            },
            azure: AzureFlags {
                client_id: args.azure.azure_client_id.clone(),
                client_secret: args.azure.azure_client_secret.clone(),
                region: args.azure.azure_region.clone(),
                subscription_id: args.azure.azure_subscription_id.clone(),
                tenant_id: args.azure.azure_tenant_id.clone(),
            },
            vsphere: VsphereFlags {
                vcenter_user: args.vsphere.vsphere_vcenter_user.clone(),
                vcenter_password: args.vsphere.vsphere_vcenter_password.clone(),
                vcenter_ip: args.vsphere.vsphere_vcenter_ip.clone(),
                vcenter_dc: args.vsphere.vsphere_vcenter_dc.clone(),
                vcenter_cluster: args.vsphere.vsphere_vcenter_cluster.clone(),
                vcenter_rp: args.vsphere.vsphere_vcenter_rp.clone(),
                network: args.vsphere.vsphere_network.clone(),
                vcenter_ds: args.vsphere.vsphere_vcenter_ds.clone(),
                subnet_cidr: args.vsphere.vsphere_subnet_cidr.clone(),
                vcenter_disks: args.vsphere.vsphere_vcenter_disks.clone(),
                vcenter_templates: args.vsphere.vsphere_vcenter_templates.clone(),
                vcenter_vms: args.vsphere.vsphere_vcenter_vms.clone(),
            },
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct PlanFlags {
    /// Name to assign to the environment.
    #[arg(long, env = "BBL_ENV_NAME", default_value = "")]
    pub name: String,

    /// Load balancer to create: concourse or cf.
    #[arg(long, default_value = "")]
    pub lb_type: String,

    /// Load balancer certificate file.
    #[arg(long, default_value = "")]
    pub lb_cert: String,

    /// Load balancer private key file.
    #[arg(long, default_value = "")]
    pub lb_key: String,

    /// Load balancer certificate chain file.
    #[arg(long, default_value = "")]
    pub lb_chain: String,

    /// Domain for CF system routes.
    #[arg(long, default_value = "")]
    pub lb_domain: String,

    /// Pave infrastructure only; skip the jumpbox and director.
    #[arg(long)]
    pub no_director: bool,
}

impl From<PlanFlags> for PlanArgs {
    fn from(flags: PlanFlags) -> Self {
        PlanArgs {
            name: flags.name,
            lb: LbArgs {
                lb_type: flags.lb_type,
                cert_path: flags.lb_cert,
                key_path: flags.lb_key,
                chain_path: flags.lb_chain,
                domain: flags.lb_domain,
            },
            no_director: flags.no_director,
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct LbFlags {
    /// concourse or cf.
    #[arg(long = "type", default_value = "")]
    pub lb_type: String,
    #[arg(long, default_value = "")]
    pub cert: String,
    #[arg(long, default_value = "")]
    pub key: String,
    #[arg(long, default_value = "")]
    pub chain: String,
    #[arg(long, default_value = "")]
    pub domain: String,
}

impl From<LbFlags> for LbArgs {
    fn from(flags: LbFlags) -> Self {
        LbArgs {
            lb_type: flags.lb_type,
            cert_path: flags.cert,
            key_path: flags.key,
            chain_path: flags.chain,
            domain: flags.domain,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Write the terraform template, deployment manifests and configs without creating anything.
    Plan(PlanFlags),

    /// Create the infrastructure, jumpbox and director.
    Up(PlanFlags),

    /// Tear down the director, jumpbox and infrastructure.
    Destroy {
        /// Exit successfully when there is no state to destroy.
        #[arg(long)]
        skip_if_missing: bool,
    },

    /// Replace the jumpbox SSH key and redeploy.
    Rotate,

    /// Regenerate the director CA and every certificate it signs.
    RotateCa,

    /// Attach a load balancer to the environment.
    CreateLbs(LbFlags),

    /// Remove the environment's load balancers.
    DeleteLbs {
        /// Exit successfully when there are no load balancers.
        #[arg(long)]
        skip_if_missing: bool,
    },

    /// Print the load balancers' names and addresses.
    Lbs {
        #[arg(long)]
        json: bool,
    },

    /// Print the terraform outputs.
    Outputs,

    /// Print the output of the last terraform run.
    LatestError,

    /// Print the jumpbox SSH private key.
    SshKey,

    /// Print the director SSH private key.
    DirectorSshKey,

    JumpboxAddress,
    DirectorAddress,
    DirectorUsername,
    DirectorPassword,
    DirectorCaCert,
    EnvId,

    /// Print shell exports that target the director.
    PrintEnv {
        /// posix or powershell.
        #[arg(long, default_value = "posix")]
        shell_type: String,
    },

    /// Open an SSH session on the jumpbox or the director.
    Ssh {
        #[arg(long)]
        jumpbox: bool,
        #[arg(long)]
        director: bool,
        /// Run this command instead of a shell.
        #[arg(long, default_value = "")]
        cmd: String,
    },

    /// Print the interpolated cloud config.
    CloudConfig,

    /// Print the vars passed to the director's create-env.
    BoshDeploymentVars,

    /// Print the vars passed to the jumpbox's create-env.
    JumpboxDeploymentVars,

    /// Delete IaaS resources whose names contain the filter.
    CleanupLeftovers {
        #[arg(long, default_value = "")]
        filter: String,
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the bbl version.
    Version,
}

impl Command {
    /// Commands that may run against an empty state directory.
    pub fn starts_fresh(&self) -> bool {
        matches!(self, Command::Plan(_) | Command::Up(_) | Command::CleanupLeftovers { .. })
    }

    /// Commands that reach the IaaS when an environment exists.
    pub fn uses_iaas(&self) -> bool {
        matches!(
            self,
            Command::Destroy { .. }
                | Command::Rotate
                | Command::RotateCa
                | Command::CreateLbs(_)
                | Command::DeleteLbs { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_flags_become_lb_args() {
        let cli = Cli::try_parse_from([
            "bbl", "--iaas", "gcp", "plan", "--name", "my-env", "--lb-type", "concourse",
        ])
        .unwrap();
        let Command::Plan(flags) = cli.command else { panic!("expected plan") };
        let args = PlanArgs::from(flags);
        assert_eq!(args.name, "my-env");
        assert_eq!(args.lb.lb_type, "concourse");
        assert_eq!(cli.global.iaas.as_deref(), Some("gcp"));
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from(["bbl", "destroy", "--no-confirm", "-s", "/tmp/env"]).unwrap();
        assert!(cli.global.no_confirm);
        assert_eq!(cli.global.state_dir, PathBuf::from("/tmp/env"));
        assert!(matches!(cli.command, Command::Destroy { skip_if_missing: false }));
    }

    #[test]
    fn create_lbs_uses_short_names() {
        let cli = Cli::try_parse_from(["bbl", "create-lbs", "--type", "cf", "--cert", "c.pem", "--key", "k.pem"]).unwrap();
        let Command::CreateLbs(flags) = cli.command else { panic!("expected create-lbs") };
        let args = LbArgs::from(flags);
        assert_eq!((args.lb_type.as_str(), args.cert_path.as_str()), ("cf", "c.pem"));
    }
}
