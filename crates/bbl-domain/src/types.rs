use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::DomainError;

/// Schema version written by this release.
pub const STATE_VERSION: u32 = 14;

/// Records at or above this version were produced by a `plan`.
pub const INITIALIZED_VERSION: u32 = 13;

// ── Enums ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Iaas {
    Aws,
    Gcp,
    Azure,
    Vsphere,
}

impl Iaas {
    pub fn as_str(&self) -> &'static str {
        match self {
            Iaas::Aws => "aws",
            Iaas::Gcp => "gcp",
            Iaas::Azure => "azure",
            Iaas::Vsphere => "vsphere",
        }
    }
}

impl fmt::Display for Iaas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Iaas {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "aws" => Ok(Iaas::Aws),
            "gcp" => Ok(Iaas::Gcp),
            "azure" => Ok(Iaas::Azure),
            "vsphere" => Ok(Iaas::Vsphere),
            other => Err(DomainError::InvalidIaas(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LbType {
    Concourse,
    Cf,
}

impl LbType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LbType::Concourse => "concourse",
            LbType::Cf => "cf",
        }
    }
}

impl fmt::Display for LbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LbType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "concourse" => Ok(LbType::Concourse),
            "cf" => Ok(LbType::Cf),
            other => Err(DomainError::InvalidLbType(other.to_string())),
        }
    }
}

/// Serializes `None` as `""` so an unset enum round-trips as an empty string.
mod blank_as_none {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::fmt::Display;
    use std::str::FromStr;

    pub fn serialize<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Display,
        S: Serializer,
    {
        match value {
            Some(v) => serializer.collect_str(v),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        if raw.is_empty() {
            return Ok(None);
        }
        raw.parse().map(Some).map_err(serde::de::Error::custom)
    }
}

// ── Provider records ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Aws {
    #[serde(rename = "accessKeyID")]
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Gcp {
    /// Service account key JSON (contents, never a path).
    pub service_account_key: String,
    #[serde(rename = "projectID")]
    pub project_id: String,
    pub region: String,
    pub zone: String,
    pub zones: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Azure {
    #[serde(rename = "clientID")]
    pub client_id: String,
    pub client_secret: String,
    pub region: String,
    #[serde(rename = "subscriptionID")]
    pub subscription_id: String,
    #[serde(rename = "tenantID")]
    pub tenant_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Vsphere {
    pub vcenter_user: String,
    pub vcenter_password: String,
    #[serde(rename = "vcenterIP")]
    pub vcenter_ip: String,
    #[serde(rename = "vcenterDC")]
    pub vcenter_dc: String,
    pub vcenter_cluster: String,
    #[serde(rename = "vcenterRP")]
    pub vcenter_rp: String,
    pub network: String,
    #[serde(rename = "vcenterDS")]
    pub vcenter_ds: String,
    #[serde(rename = "subnetCIDR")]
    pub subnet_cidr: String,
    pub vcenter_disks: String,
    pub vcenter_templates: String,
    #[serde(rename = "vcenterVMs")]
    pub vcenter_vms: String,
}

/// Legacy AWS keypair, kept for environments created before the jumpbox
/// owned its own SSH key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeyPair {
    pub name: String,
    pub public_key: String,
    pub private_key: String,
}

// ── Director & jumpbox ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Jumpbox {
    pub enabled: bool,
    /// `host:port` of the jumpbox SSH endpoint.
    pub url: String,
    pub manifest: String,
    pub vars_store: String,
    /// Opaque `bosh create-env` state document.
    pub state: Map<String, Value>,
}

impl Jumpbox {
    pub fn is_deployed(&self) -> bool {
        !self.url.is_empty() || !self.state.is_empty()
    }

    /// The host part of `url`.
    pub fn host(&self) -> &str {
        self.url.rsplit_once(':').map_or(self.url.as_str(), |(host, _)| host)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Bosh {
    pub director_name: String,
    pub director_username: String,
    pub director_password: String,
    pub director_address: String,
    #[serde(rename = "directorSSLCA")]
    pub director_ssl_ca: String,
    #[serde(rename = "directorSSLCertificate")]
    pub director_ssl_certificate: String,
    #[serde(rename = "directorSSLPrivateKey")]
    pub director_ssl_private_key: String,
    /// Operator-supplied ops file applied on top of the director manifest.
    pub user_ops_file: String,
    pub manifest: String,
    pub vars_store: String,
    /// Opaque `bosh create-env` state document.
    pub state: Map<String, Value>,
}

impl Bosh {
    pub fn is_empty(&self) -> bool {
        self == &Bosh::default()
    }
}

// ── Load balancer ─────────────────────────────────────────────────────────────

/// Load balancer attachment. `lb_type == None` means no load balancer.
///
/// For Azure CF load balancers `cert` holds the base64 PKCS12 bundle and
/// `key` its password; everywhere else both are PEM.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Lb {
    #[serde(rename = "type", with = "blank_as_none")]
    pub lb_type: Option<LbType>,
    pub cert: String,
    pub key: String,
    pub chain: String,
    pub domain: String,
}

impl Lb {
    pub fn is_empty(&self) -> bool {
        self.lb_type.is_none()
    }

    /// Fill every empty field of `self` from `old`, provided `old` describes
    /// an existing load balancer. Concourse load balancers never keep a domain.
    pub fn merged_with(mut self, old: &Lb) -> Lb {
        if old.lb_type.is_none() {
            return self;
        }
        if self.lb_type.is_none() {
            self.lb_type = old.lb_type;
        }
        for (field, previous) in [
            (&mut self.cert, &old.cert),
            (&mut self.key, &old.key),
            (&mut self.chain, &old.chain),
            (&mut self.domain, &old.domain),
        ] {
            if field.is_empty() {
                field.clone_from(previous);
            }
        }
        if self.lb_type == Some(LbType::Concourse) {
            self.domain.clear();
        }
        self
    }
}

// ── State ─────────────────────────────────────────────────────────────────────

/// The single persistent record describing one environment.
///
/// Field order is the on-disk key order. Every field is always emitted so a
/// record written by this version re-serializes byte-for-byte.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct State {
    pub version: u32,
    pub bbl_version: String,
    #[serde(with = "blank_as_none")]
    pub iaas: Option<Iaas>,
    #[serde(rename = "envID")]
    pub env_id: String,
    pub no_director: bool,
    pub aws: Aws,
    pub gcp: Gcp,
    pub azure: Azure,
    pub vsphere: Vsphere,
    pub key_pair: KeyPair,
    pub jumpbox: Jumpbox,
    pub bosh: Bosh,
    pub lb: Lb,
    pub tf_state: String,
    #[serde(rename = "latestTFOutput")]
    pub latest_tf_output: String,
}

impl State {
    /// True for the record saved by `destroy`: nothing left to track.
    pub fn is_empty(&self) -> bool {
        self == &State::default()
    }

    pub fn has_initialized_version(&self) -> bool {
        self.version >= INITIALIZED_VERSION && !self.bbl_version.is_empty()
    }

    /// Region of the active IaaS; vSphere has none.
    pub fn region(&self) -> &str {
        match self.iaas {
            Some(Iaas::Aws) => &self.aws.region,
            Some(Iaas::Gcp) => &self.gcp.region,
            Some(Iaas::Azure) => &self.azure.region,
            Some(Iaas::Vsphere) | None => "",
        }
    }

    pub fn has_director(&self) -> bool {
        !self.no_director && !self.bosh.is_empty()
    }

    /// Default director name derived from the environment id.
    pub fn director_name(&self) -> String {
        if self.bosh.director_name.is_empty() {
            format!("bosh-{}", self.env_id)
        } else {
            self.bosh.director_name.clone()
        }
    }
}

/// Validate a user-supplied environment name against
/// `^[a-z]([-a-z0-9]*[a-z0-9])?$`.
pub fn validate_env_name(name: &str) -> Result<(), DomainError> {
    let bytes = name.as_bytes();
    let valid = match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) => {
            first.is_ascii_lowercase()
                && (last.is_ascii_lowercase() || last.is_ascii_digit())
                && bytes
                    .iter()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(DomainError::InvalidEnvName(name.to_string()))
    }
}
