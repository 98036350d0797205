use openssl::x509::X509;
use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::error::DriverError;
use crate::keys::SshKey;

/// A BOSH vars store: a YAML map of generated credentials.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VarsStore {
    entries: Mapping,
}

impl VarsStore {
    pub fn parse(raw: &str) -> Result<Self, DriverError> {
        if raw.trim().is_empty() {
            return Ok(VarsStore::default());
        }
        let entries: Mapping = serde_yaml::from_str(raw)
            .map_err(|e| DriverError::Internal(format!("parse vars store: {e}")))?;
        Ok(VarsStore { entries })
    }

    /// Look up `name` or `name.field`.
    pub fn get(&self, path: &str) -> Option<&str> {
        let (name, field) = match path.split_once('.') {
            Some((name, field)) => (name, Some(field)),
            None => (path, None),
        };
        let value = self.entries.get(name)?;
        match field {
            Some(field) => value.get(field)?.as_str(),
            None => value.as_str(),
        }
    }

    pub fn get_or_empty(&self, path: &str) -> String {
        self.get(path).unwrap_or_default().to_string()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn set_ssh_key(&mut self, name: &str, key: &SshKey) {
        let mut value = Mapping::new();
        value.insert("private_key".into(), key.private_key.clone().into());
        value.insert("public_key".into(), key.public_key.clone().into());
        value.insert("public_key_fingerprint".into(), key.public_key_fingerprint.clone().into());
        self.entries.insert(name.into(), Value::Mapping(value));
    }

    /// Drop the CA called `ca_name` and every certificate it signed, so the
    /// next `create-env` generates them afresh. Returns the removed names.
    pub fn remove_ca_and_signed(&mut self, ca_name: &str) -> Result<Vec<String>, DriverError> {
        let ca_pem = self
            .get(&format!("{ca_name}.certificate"))
            .ok_or_else(|| DriverError::Internal(format!("vars store has no certificate named {ca_name}")))?;
        let ca = X509::from_pem(ca_pem.as_bytes())
            .map_err(|e| DriverError::Internal(format!("parse {ca_name}: {e}")))?;
        let ca_key = ca
            .public_key()
            .map_err(|e| DriverError::Internal(format!("read {ca_name} public key: {e}")))?;

        let mut removed = vec![ca_name.to_string()];
        for (name, value) in &self.entries {
            let Some(name) = name.as_str().filter(|n| *n != ca_name) else {
                continue;
            };
            let Some(pem) = value.get("certificate").and_then(Value::as_str) else {
                continue;
            };
            let signed = X509::from_pem(pem.as_bytes())
                .ok()
                .and_then(|cert| cert.verify(&ca_key).ok())
                .unwrap_or(false);
            if signed {
                removed.push(name.to_string());
            }
        }

        for name in &removed {
            self.entries.remove(name.as_str());
        }
        debug!(?removed, "removed certificates from vars store");
        Ok(removed)
    }

    pub fn to_yaml(&self) -> Result<String, DriverError> {
        serde_yaml::to_string(&self.entries).map_err(|e| DriverError::Internal(format!("encode vars store: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openssl::asn1::Asn1Time;
    use openssl::hash::MessageDigest;
    use openssl::pkey::{PKey, Private};
    use openssl::rsa::Rsa;
    use openssl::x509::{X509Builder, X509NameBuilder};

    fn key() -> PKey<Private> {
        PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap()
    }

    fn cert(cn: &str, key: &PKey<Private>, issuer: Option<(&X509, &PKey<Private>)>) -> X509 {
        let mut name = X509NameBuilder::new().unwrap();
        name.append_entry_by_text("CN", cn).unwrap();
        let name = name.build();
        let mut builder = X509Builder::new().unwrap();
        builder.set_version(2).unwrap();
        builder.set_subject_name(&name).unwrap();
        builder.set_pubkey(key).unwrap();
        builder.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
        builder.set_not_after(&Asn1Time::days_from_now(1).unwrap()).unwrap();
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

    fn pem(cert: &X509) -> String {
        String::from_utf8(cert.to_pem().unwrap()).unwrap()
    }

    #[test]
    fn reads_nested_fields() {
        let store = VarsStore::parse("admin_password: pw\ndirector_ssl:\n  ca: CA\n").unwrap();
        assert_eq!(store.get("admin_password"), Some("pw"));
        assert_eq!(store.get("director_ssl.ca"), Some("CA"));
        assert_eq!(store.get("director_ssl.certificate"), None);
        assert_eq!(store.get_or_empty("missing"), "");
        assert!(VarsStore::parse("").unwrap().to_yaml().unwrap().trim() == "{}");
    }

    #[test]
    fn ssh_key_replaces_existing_entry() {
        let mut store = VarsStore::parse("jumpbox_ssh:\n  private_key: old\n").unwrap();
        store.set_ssh_key(
            "jumpbox_ssh",
            &SshKey {
                private_key: "new".into(),
                public_key: "ssh-rsa AAAA".into(),
                public_key_fingerprint: "aa:bb".into(),
            },
        );
        assert_eq!(store.get("jumpbox_ssh.private_key"), Some("new"));
        assert_eq!(store.get("jumpbox_ssh.public_key_fingerprint"), Some("aa:bb"));
    }

    #[test]
    fn ca_rotation_removes_only_signed_certificates() {
        let ca_key = key();
        let ca = cert("ca", &ca_key, None);
        let leaf_key = key();
        let leaf = cert("director", &leaf_key, Some((&ca, &ca_key)));
        let other_key = key();
        let other = cert("blobstore-ca", &other_key, None);

        let mut entries = Mapping::new();
        let mut ca_entry = Mapping::new();
        ca_entry.insert("certificate".into(), pem(&ca).into());
        entries.insert("default_ca".into(), Value::Mapping(ca_entry));
        let mut leaf_entry = Mapping::new();
        leaf_entry.insert("ca".into(), pem(&ca).into());
        leaf_entry.insert("certificate".into(), pem(&leaf).into());
        entries.insert("director_ssl".into(), Value::Mapping(leaf_entry));
        let mut other_entry = Mapping::new();
        other_entry.insert("certificate".into(), pem(&other).into());
        entries.insert("blobstore_ca".into(), Value::Mapping(other_entry));
        entries.insert("admin_password".into(), "pw".into());

        let mut store = VarsStore { entries };
        let removed = store.remove_ca_and_signed("default_ca").unwrap();

        assert_eq!(removed, ["default_ca", "director_ssl"]);
        assert!(!store.contains("default_ca"));
        assert!(!store.contains("director_ssl"));
        assert!(store.contains("blobstore_ca"));
        assert_eq!(store.get("admin_password"), Some("pw"));
    }

    #[test]
    fn missing_ca_is_an_error() {
        let mut store = VarsStore::parse("admin_password: pw\n").unwrap();
        assert!(store.remove_ca_and_signed("default_ca").is_err());
    }
}
