//! Terraform, BOSH and cloud-config files compiled into the binary.

use bbl_domain::{Iaas, LbType};

// ── Terraform ─────────────────────────────────────────────────────────────────

const TF_AWS_BASE: &str = include_str!("../templates/terraform/aws/base.tf");
const TF_AWS_CF_LB: &str = include_str!("../templates/terraform/aws/cf-lb.tf");
const TF_AWS_CONCOURSE_LB: &str = include_str!("../templates/terraform/aws/concourse-lb.tf");
const TF_GCP_BASE: &str = include_str!("../templates/terraform/gcp/base.tf");
const TF_GCP_CF_LB: &str = include_str!("../templates/terraform/gcp/cf-lb.tf");
const TF_GCP_CONCOURSE_LB: &str = include_str!("../templates/terraform/gcp/concourse-lb.tf");
const TF_AZURE_BASE: &str = include_str!("../templates/terraform/azure/base.tf");
const TF_AZURE_CF_LB: &str = include_str!("../templates/terraform/azure/cf-lb.tf");
const TF_AZURE_CONCOURSE_LB: &str = include_str!("../templates/terraform/azure/concourse-lb.tf");
const TF_VSPHERE_BASE: &str = include_str!("../templates/terraform/vsphere/base.tf");

/// The single terraform file for an environment: the IaaS base plus the
/// load balancer fragment, if any.
pub fn terraform_template(iaas: Iaas, lb: Option<LbType>) -> String {
    let (base, cf, concourse) = match iaas {
        Iaas::Aws => (TF_AWS_BASE, TF_AWS_CF_LB, TF_AWS_CONCOURSE_LB),
        Iaas::Gcp => (TF_GCP_BASE, TF_GCP_CF_LB, TF_GCP_CONCOURSE_LB),
        Iaas::Azure => (TF_AZURE_BASE, TF_AZURE_CF_LB, TF_AZURE_CONCOURSE_LB),
        Iaas::Vsphere => (TF_VSPHERE_BASE, "", ""),
    };
    let fragment = match lb {
        Some(LbType::Cf) => cf,
        Some(LbType::Concourse) => concourse,
        None => "",
    };

    let mut template = String::from(base);
    if !fragment.is_empty() {
        template.push('\n');
        template.push_str(fragment);
    }
    template
}

// ── BOSH deployments ──────────────────────────────────────────────────────────

/// A file to place under a deployment directory, relative path first.
pub type DeploymentFile = (&'static str, &'static str);

const DIRECTOR_MANIFEST: &str = include_str!("../templates/bosh/director/bosh.yml");
const DIRECTOR_JUMPBOX_USER: &str = include_str!("../templates/bosh/director/jumpbox-user.yml");
const DIRECTOR_EXTERNAL_IP: &str = include_str!("../templates/bosh/director/external-ip.yml");
const JUMPBOX_MANIFEST: &str = include_str!("../templates/bosh/jumpbox/jumpbox.yml");

pub const DIRECTOR_MANIFEST_FILE: &str = "bosh.yml";
pub const DIRECTOR_JUMPBOX_USER_FILE: &str = "jumpbox-user.yml";
pub const DIRECTOR_EXTERNAL_IP_FILE: &str = "external-ip.yml";
pub const JUMPBOX_MANIFEST_FILE: &str = "jumpbox.yml";

fn director_cpi(iaas: Iaas) -> DeploymentFile {
    match iaas {
        Iaas::Aws => ("aws/cpi.yml", include_str!("../templates/bosh/director/aws/cpi.yml")),
        Iaas::Gcp => ("gcp/cpi.yml", include_str!("../templates/bosh/director/gcp/cpi.yml")),
        Iaas::Azure => ("azure/cpi.yml", include_str!("../templates/bosh/director/azure/cpi.yml")),
        Iaas::Vsphere => ("vsphere/cpi.yml", include_str!("../templates/bosh/director/vsphere/cpi.yml")),
    }
}

fn jumpbox_cpi(iaas: Iaas) -> DeploymentFile {
    match iaas {
        Iaas::Aws => ("aws/cpi.yml", include_str!("../templates/bosh/jumpbox/aws/cpi.yml")),
        Iaas::Gcp => ("gcp/cpi.yml", include_str!("../templates/bosh/jumpbox/gcp/cpi.yml")),
        Iaas::Azure => ("azure/cpi.yml", include_str!("../templates/bosh/jumpbox/azure/cpi.yml")),
        Iaas::Vsphere => ("vsphere/cpi.yml", include_str!("../templates/bosh/jumpbox/vsphere/cpi.yml")),
    }
}

pub fn director_files(iaas: Iaas) -> Vec<DeploymentFile> {
    vec![
        (DIRECTOR_MANIFEST_FILE, DIRECTOR_MANIFEST),
        (DIRECTOR_JUMPBOX_USER_FILE, DIRECTOR_JUMPBOX_USER),
        (DIRECTOR_EXTERNAL_IP_FILE, DIRECTOR_EXTERNAL_IP),
        director_cpi(iaas),
    ]
}

pub fn jumpbox_files(iaas: Iaas) -> Vec<DeploymentFile> {
    vec![(JUMPBOX_MANIFEST_FILE, JUMPBOX_MANIFEST), jumpbox_cpi(iaas)]
}

/// Path of the CPI ops file inside a deployment directory.
pub fn cpi_ops_file(iaas: Iaas) -> &'static str {
    director_cpi(iaas).0
}

// ── Cloud and runtime config ──────────────────────────────────────────────────

pub const CLOUD_CONFIG_FILE: &str = "cloud-config.yml";
pub const CLOUD_CONFIG_OPS_FILE: &str = "ops.yml";
pub const RUNTIME_CONFIG_FILE: &str = "runtime-config.yml";

const CLOUD_CONFIG: &str = include_str!("../templates/cloud-config/cloud-config.yml");
const RUNTIME_CONFIG: &str = include_str!("../templates/runtime-config/runtime-config.yml");

pub fn cloud_config() -> &'static str {
    CLOUD_CONFIG
}

pub fn runtime_config() -> &'static str {
    RUNTIME_CONFIG
}

/// IaaS ops for the base cloud config, followed by the load balancer's
/// vm extensions.
pub fn cloud_config_ops(iaas: Iaas, lb: Option<LbType>) -> String {
    let (base, cf, concourse) = match iaas {
        Iaas::Aws => (
            include_str!("../templates/cloud-config/aws/ops.yml"),
            include_str!("../templates/cloud-config/aws/cf-lb.yml"),
            include_str!("../templates/cloud-config/aws/concourse-lb.yml"),
        ),
        Iaas::Gcp => (
            include_str!("../templates/cloud-config/gcp/ops.yml"),
            include_str!("../templates/cloud-config/gcp/cf-lb.yml"),
            include_str!("../templates/cloud-config/gcp/concourse-lb.yml"),
        ),
        Iaas::Azure => (
            include_str!("../templates/cloud-config/azure/ops.yml"),
            include_str!("../templates/cloud-config/azure/cf-lb.yml"),
            include_str!("../templates/cloud-config/azure/concourse-lb.yml"),
        ),
        Iaas::Vsphere => (include_str!("../templates/cloud-config/vsphere/ops.yml"), "", ""),
    };
    let fragment = match lb {
        Some(LbType::Cf) => cf,
        Some(LbType::Concourse) => concourse,
        None => "",
    };

    let mut ops = String::from(base);
    if !fragment.is_empty() {
        ops.push('\n');
        ops.push_str(fragment);
    }
    ops
}
