//! Hand-written fakes for the manager traits, backed by a real `FileStore`
//! in a temp dir.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bbl_commands::{FixedAnswer, Interrupt, Managers, Output};
use bbl_domain::State;
use bbl_driver::{
    BoshManager, CloudClients, CloudConfigManager, DriverError, NoCloud, Outputs, RuntimeConfigManager,
    SshManager, TerraformManager,
};
use bbl_store::{FileStore, StatePaths, StateStore};
use bbl_validate::{NetworkDeletionValidator, NetworkInstances, NoopNetworkValidator, ProbeError};
use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::x509::{X509Builder, X509NameBuilder, X509};
use serde_json::Value;
use tempfile::TempDir;

pub const TOOL_VERSION: &str = "v9.9.9-test";

pub type Calls = Arc<Mutex<Vec<String>>>;

fn record(calls: &Calls, call: &str) {
    calls.lock().unwrap().push(call.to_string());
}

// ── Terraform ─────────────────────────────────────────────────────────────────

pub struct FakeTerraform {
    calls: Calls,
    paths: StatePaths,
    pub outputs: Mutex<Outputs>,
    pub paved: Mutex<bool>,
    /// When set, `apply` fails and carries a state whose tfstate is this value.
    pub apply_failure: Mutex<Option<String>>,
}

#[async_trait]
impl TerraformManager for FakeTerraform {
    async fn validate_version(&self) -> Result<(), DriverError> {
        record(&self.calls, "terraform.validate_version");
        Ok(())
    }

    async fn setup(&self, _state: &State) -> Result<(), DriverError> {
        record(&self.calls, "terraform.setup");
        let template = self.paths.terraform_template();
        std::fs::create_dir_all(template.parent().unwrap()).unwrap();
        std::fs::write(template, "# template").unwrap();
        Ok(())
    }

    async fn init(&self, _state: &State) -> Result<(), DriverError> {
        record(&self.calls, "terraform.init");
        Ok(())
    }

    async fn apply(&self, mut state: State) -> Result<State, DriverError> {
        record(&self.calls, "terraform.apply");
        if let Some(tf_state) = self.apply_failure.lock().unwrap().take() {
            state.tf_state = tf_state;
            state.latest_tf_output = "Error: quota exceeded".into();
            return Err(DriverError::Manager {
                state: Box::new(state),
                message: "Terraform apply failed with exit code 1".into(),
            });
        }
        state.tf_state = "applied-tf-state".into();
        state.latest_tf_output = "Apply complete!".into();
        *self.paved.lock().unwrap() = true;
        Ok(state)
    }

    async fn destroy(&self, mut state: State) -> Result<State, DriverError> {
        record(&self.calls, "terraform.destroy");
        state.tf_state.clear();
        Ok(state)
    }

    async fn validate(&self, state: State) -> Result<State, DriverError> {
        record(&self.calls, "terraform.validate");
        Ok(state)
    }

    async fn get_outputs(&self) -> Result<Outputs, DriverError> {
        record(&self.calls, "terraform.get_outputs");
        Ok(self.outputs.lock().unwrap().clone())
    }

    async fn is_paved(&self) -> Result<bool, DriverError> {
        record(&self.calls, "terraform.is_paved");
        Ok(*self.paved.lock().unwrap())
    }
}

// ── BOSH ──────────────────────────────────────────────────────────────────────

pub struct FakeBosh {
    calls: Calls,
    /// When set, `delete_director` fails carrying this state.
    pub delete_director_failure: Mutex<Option<State>>,
    /// When set, `create_jumpbox` fails after recording a half-built deployment.
    pub create_jumpbox_failure: Mutex<bool>,
    /// When set, `create_director` fails after recording a half-built deployment.
    pub create_director_failure: Mutex<bool>,
}

fn half_built(message: &str, state: State) -> DriverError {
    DriverError::ManagerCreate { state: Box::new(state), message: message.into() }
}

#[async_trait]
impl BoshManager for FakeBosh {
    async fn version(&self) -> Result<String, DriverError> {
        record(&self.calls, "bosh.version");
        Ok("2.0.48".into())
    }

    fn path(&self) -> String {
        "bosh".into()
    }

    async fn initialize_jumpbox(&self, _state: &State) -> Result<(), DriverError> {
        record(&self.calls, "bosh.initialize_jumpbox");
        Ok(())
    }

    async fn initialize_director(&self, _state: &State) -> Result<(), DriverError> {
        record(&self.calls, "bosh.initialize_director");
        Ok(())
    }

    async fn create_jumpbox(&self, mut state: State, _outputs: &Outputs) -> Result<State, DriverError> {
        record(&self.calls, "bosh.create_jumpbox");
        state.jumpbox.state.insert("current_manifest_sha".into(), "jumpbox-sha".into());
        if state.jumpbox.vars_store.is_empty() {
            state.jumpbox.vars_store = "jumpbox_ssh:\n  private_key: JUMPBOX-KEY\n".into();
        }
        if *self.create_jumpbox_failure.lock().unwrap() {
            return Err(half_built("Create jumpbox: bosh create-env exited with code 1", state));
        }
        state.jumpbox.url = "35.1.2.3:22".into();
        Ok(state)
    }

    async fn create_director(&self, mut state: State, _outputs: &Outputs) -> Result<State, DriverError> {
        record(&self.calls, "bosh.create_director");
        state.bosh.state.insert("current_manifest_sha".into(), "director-sha".into());
        if *self.create_director_failure.lock().unwrap() {
            return Err(half_built("Create director: bosh create-env exited with code 1", state));
        }
        state.bosh.director_name = state.director_name();
        state.bosh.director_address = "https://10.0.0.6:25555".into();
        state.bosh.director_username = "admin".into();
        state.bosh.director_password = "secret".into();
        Ok(state)
    }

    async fn delete_director(&self, _state: &State, _outputs: &Outputs) -> Result<(), DriverError> {
        record(&self.calls, "bosh.delete_director");
        match self.delete_director_failure.lock().unwrap().take() {
            Some(state) => Err(DriverError::ManagerDelete {
                state: Box::new(state),
                message: "Delete director: bosh delete-env exited with code 1".into(),
            }),
            None => Ok(()),
        }
    }

    async fn delete_jumpbox(&self, _state: &State, _outputs: &Outputs) -> Result<(), DriverError> {
        record(&self.calls, "bosh.delete_jumpbox");
        Ok(())
    }

    async fn cleanup_director(&self, _state: &State) -> Result<(), DriverError> {
        record(&self.calls, "bosh.cleanup_director");
        Ok(())
    }

    fn director_deployment_vars(&self, _state: &State, _outputs: &Outputs) -> Result<String, DriverError> {
        Ok("director_name: bosh\n".into())
    }

    fn jumpbox_deployment_vars(&self, _state: &State, _outputs: &Outputs) -> Result<String, DriverError> {
        Ok("external_ip: 35.1.2.3\n".into())
    }

    async fn director_info(&self, _state: &State) -> Result<(), DriverError> {
        record(&self.calls, "bosh.director_info");
        Ok(())
    }
}

// ── Configs, ssh, output ──────────────────────────────────────────────────────

pub struct FakeCloudConfig {
    calls: Calls,
}

#[async_trait]
impl CloudConfigManager for FakeCloudConfig {
    async fn initialize(&self, _state: &State) -> Result<(), DriverError> {
        record(&self.calls, "cloud_config.initialize");
        Ok(())
    }

    async fn update(&self, _state: &State) -> Result<(), DriverError> {
        record(&self.calls, "cloud_config.update");
        Ok(())
    }

    async fn interpolate(&self, _state: &State) -> Result<String, DriverError> {
        Ok("azs: []\n".into())
    }
}

pub struct FakeRuntimeConfig {
    calls: Calls,
}

#[async_trait]
impl RuntimeConfigManager for FakeRuntimeConfig {
    async fn initialize(&self, _state: &State) -> Result<(), DriverError> {
        record(&self.calls, "runtime_config.initialize");
        Ok(())
    }
}

pub struct FakeSsh {
    calls: Calls,
}

#[async_trait]
impl SshManager for FakeSsh {
    async fn jumpbox(&self, _state: &State, _command: Option<&str>) -> Result<(), DriverError> {
        record(&self.calls, "ssh.jumpbox");
        Ok(())
    }

    async fn director(&self, _state: &State, _command: Option<&str>) -> Result<(), DriverError> {
        record(&self.calls, "ssh.director");
        Ok(())
    }
}

#[derive(Default)]
pub struct CapturedOutput(pub Mutex<Vec<String>>);

impl Output for CapturedOutput {
    fn print(&self, text: &str) {
        self.0.lock().unwrap().push(text.to_string());
    }
}

/// Instance names reported for any network.
pub struct FixedInstances(pub Vec<&'static str>);

#[async_trait]
impl NetworkInstances for FixedInstances {
    async fn instance_names(&self, _network: &str) -> Result<Vec<String>, ProbeError> {
        Ok(self.0.iter().map(|s| s.to_string()).collect())
    }
}

// ── Harness ───────────────────────────────────────────────────────────────────

pub struct Harness {
    pub dir: TempDir,
    pub calls: Calls,
    pub store: Arc<FileStore>,
    pub terraform: Arc<FakeTerraform>,
    pub bosh: Arc<FakeBosh>,
    pub output: Arc<CapturedOutput>,
    pub network: Arc<dyn NetworkDeletionValidator>,
}

impl Harness {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let calls: Calls = Arc::default();
        Harness {
            store: Arc::new(FileStore::new(dir.path(), TOOL_VERSION)),
            terraform: Arc::new(FakeTerraform {
                calls: calls.clone(),
                paths: StatePaths::new(dir.path()),
                outputs: Mutex::new(Outputs::default()),
                paved: Mutex::new(false),
                apply_failure: Mutex::new(None),
            }),
            bosh: Arc::new(FakeBosh {
                calls: calls.clone(),
                delete_director_failure: Mutex::new(None),
                create_jumpbox_failure: Mutex::new(false),
                create_director_failure: Mutex::new(false),
            }),
            output: Arc::default(),
            network: Arc::new(NoopNetworkValidator),
            calls,
            dir,
        }
    }

    pub fn with_outputs(self, outputs: Value) -> Self {
        let map = outputs.as_object().unwrap().clone().into_iter().collect();
        *self.terraform.outputs.lock().unwrap() = Outputs::new(map);
        self
    }

    pub fn with_network(mut self, network: Arc<dyn NetworkDeletionValidator>) -> Self {
        self.network = network;
        self
    }

    pub fn managers(&self) -> Managers {
        Managers {
            store: self.store.clone(),
            terraform: self.terraform.clone(),
            bosh: self.bosh.clone(),
            cloud_config: Arc::new(FakeCloudConfig { calls: self.calls.clone() }),
            runtime_config: Arc::new(FakeRuntimeConfig { calls: self.calls.clone() }),
            clouds: CloudClients {
                lookup: Arc::new(NoCloud),
                preflight: Arc::new(NoCloud),
                network: self.network.clone(),
                cleaner: None,
            },
            ssh: Arc::new(FakeSsh { calls: self.calls.clone() }),
            prompter: Arc::new(FixedAnswer(true)),
            output: self.output.clone(),
            interrupt: Interrupt::new(),
            tool_version: TOOL_VERSION.into(),
            no_confirm: true,
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    pub fn position(&self, call: &str) -> usize {
        self.calls()
            .iter()
            .position(|c| c == call)
            .unwrap_or_else(|| panic!("{call} was never made: {:?}", self.calls()))
    }

    pub fn state_file(&self) -> String {
        std::fs::read_to_string(self.dir.path().join("bbl-state.json")).unwrap()
    }

    pub async fn saved(&self) -> State {
        self.store.get_state().await.unwrap()
    }

    /// Persist `state` the way an earlier `bbl` run would have.
    pub async fn seed(&self, state: &State) -> State {
        self.store.set(state).await.unwrap();
        self.saved().await
    }

    pub fn write_file(&self, name: &str, data: &[u8]) -> String {
        let path = self.dir.path().join(name);
        std::fs::write(&path, data).unwrap();
        path.display().to_string()
    }
}

fn rsa_key() -> PKey<Private> {
    PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap()
}

/// A certificate for `cn`, self-signed unless an issuer is given.
fn issue(cn: &str, key: &PKey<Private>, issuer: Option<(&X509, &PKey<Private>)>) -> X509 {
    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("CN", cn).unwrap();
    let name = name.build();

    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_pubkey(key).unwrap();
    builder.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
    builder.set_not_after(&Asn1Time::days_from_now(1).unwrap()).unwrap();
    builder.set_serial_number(&BigNum::from_u32(1).unwrap().to_asn1_integer().unwrap()).unwrap();
    match issuer {
        Some((ca, ca_key)) => {
            builder.set_issuer_name(ca.subject_name()).unwrap();
            builder.sign(ca_key, MessageDigest::sha256()).unwrap();
        }
        None => {
            builder.set_issuer_name(&name).unwrap();
            builder.sign(key, MessageDigest::sha256()).unwrap();
        }
    }
    builder.build()
}

/// A self-signed certificate and its key, PEM encoded.
pub fn self_signed() -> (Vec<u8>, Vec<u8>) {
    let key = rsa_key();
    let cert = issue("lb.example.com", &key, None);
    (cert.to_pem().unwrap(), key.private_key_to_pem_pkcs8().unwrap())
}

/// A director vars store holding `default_ca`, a certificate it signed, and
/// an unrelated self-signed certificate.
pub fn director_vars_store() -> String {
    let pem = |cert: &X509| String::from_utf8(cert.to_pem().unwrap()).unwrap();
    let ca_key = rsa_key();
    let ca = issue("default-ca", &ca_key, None);
    let leaf = issue("10.0.0.6", &rsa_key(), Some((&ca, &ca_key)));
    let other = issue("other", &rsa_key(), None);

    let mut store = serde_yaml::Mapping::new();
    let entry = |cert: String| {
        let mut m = serde_yaml::Mapping::new();
        m.insert("certificate".into(), cert.into());
        serde_yaml::Value::Mapping(m)
    };
    store.insert("admin_password".into(), "pw".into());
    store.insert("default_ca".into(), entry(pem(&ca)));
    store.insert("director_ssl".into(), entry(pem(&leaf)));
    store.insert("other_cert".into(), entry(pem(&other)));
    serde_yaml::to_string(&store).unwrap()
}
