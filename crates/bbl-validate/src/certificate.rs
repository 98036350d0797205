use std::path::Path;

use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::x509::X509;
use tracing::debug;

use crate::error::ValidateError;

/// PEM material for a load balancer certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertData {
    pub cert: String,
    pub key: String,
    pub chain: String,
}

/// A PKCS12 bundle and the password that opens it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pkcs12Data {
    pub bundle: Vec<u8>,
    pub password: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CertificateValidator;

impl CertificateValidator {
    /// Read and cross-check a certificate, its private key and an optional
    /// chain. Every problem found is reported in one error.
    pub fn validate(
        &self,
        cert_path: &str,
        key_path: &str,
        chain_path: Option<&str>,
    ) -> Result<CertData, ValidateError> {
        let mut problems = Vec::new();

        let cert_pem = read_required(cert_path, "certificate", &mut problems);
        let key_pem = read_required(key_path, "key", &mut problems);
        let chain_pem = match chain_path.filter(|p| !p.is_empty()) {
            Some(path) => read_required(path, "chain", &mut problems),
            None => Some(String::new()),
        };

        let cert = cert_pem
            .as_deref()
            .and_then(|pem| parse_pem(pem, "certificate", &mut problems, X509::from_pem));
        let key = key_pem.as_deref().and_then(|pem| {
            parse_pem(pem, "key", &mut problems, PKey::<Private>::private_key_from_pem)
        });

        if let (Some(cert), Some(key)) = (&cert, &key) {
            let matches = cert
                .public_key()
                .map(|public| public.public_eq(key))
                .unwrap_or(false);
            if !matches {
                problems.push("certificate and key mismatch".to_string());
            }
        }

        if let (Some(cert), Some(chain)) = (&cert, chain_pem.as_deref().filter(|c| !c.is_empty())) {
            check_chain(cert, chain, &mut problems);
        }

        if !problems.is_empty() {
            return Err(ValidateError::Certificate(problems));
        }

        Ok(CertData {
            cert: cert_pem.unwrap_or_default(),
            key: key_pem.unwrap_or_default(),
            chain: chain_pem.unwrap_or_default(),
        })
    }

    /// Read a PKCS12 bundle and the file holding its password, and confirm
    /// the password opens a bundle carrying both a key and a certificate.
    pub fn validate_pkcs12(
        &self,
        bundle_path: &str,
        password_path: &str,
    ) -> Result<Pkcs12Data, ValidateError> {
        let bundle = std::fs::read(bundle_path)
            .map_err(|e| ValidateError::Pkcs12(format!("failed to read PKCS12 certificate {bundle_path}: {e}")))?;
        let password = std::fs::read_to_string(password_path)
            .map_err(|e| ValidateError::Pkcs12(format!("failed to read PKCS12 password {password_path}: {e}")))?
            .trim_end_matches(['\r', '\n'])
            .to_string();

        let parsed = Pkcs12::from_der(&bundle)
            .map_err(|e| ValidateError::Pkcs12(format!("failed to parse PKCS12 certificate: {e}")))?
            .parse2(&password)
            .map_err(|e| {
                debug!(error = %e, "pkcs12 decryption failed");
                ValidateError::Pkcs12("failed to decrypt PKCS12 certificate with the given password".into())
            })?;

        if parsed.pkey.is_none() {
            return Err(ValidateError::Pkcs12("PKCS12 certificate does not contain a private key".into()));
        }
        if parsed.cert.is_none() {
            return Err(ValidateError::Pkcs12("PKCS12 certificate does not contain a certificate".into()));
        }

        Ok(Pkcs12Data { bundle, password })
    }
}

fn read_required(path: &str, what: &str, problems: &mut Vec<String>) -> Option<String> {
    if path.is_empty() {
        problems.push(format!("{what} path is required"));
        return None;
    }
    match std::fs::read_to_string(Path::new(path)) {
        Ok(content) => Some(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            problems.push(format!("{what} file not found: {path}"));
            None
        }
        Err(e) => {
            problems.push(format!("failed to read {what} file {path}: {e}"));
            None
        }
    }
}

fn parse_pem<T, E: std::fmt::Display>(
    pem: &str,
    what: &str,
    problems: &mut Vec<String>,
    parse: impl FnOnce(&[u8]) -> Result<T, E>,
) -> Option<T> {
    if !pem.contains("-----BEGIN ") {
        problems.push(format!("{what} is not PEM encoded"));
        return None;
    }
    match parse(pem.as_bytes()) {
        Ok(v) => Some(v),
        Err(e) => {
            debug!(error = %e, what, "pem parse failed");
            problems.push(format!("failed to parse {what}"));
            None
        }
    }
}

fn check_chain(cert: &X509, chain: &str, problems: &mut Vec<String>) {
    if !chain.contains("-----BEGIN ") {
        problems.push("chain is not PEM encoded".to_string());
        return;
    }
    let Ok(authorities) = X509::stack_from_pem(chain.as_bytes()) else {
        problems.push("failed to parse chain".to_string());
        return;
    };
    let signed = authorities.iter().any(|ca| {
        ca.public_key()
            .and_then(|public| cert.verify(&public))
            .unwrap_or(false)
    });
    if !signed {
        problems.push("certificate is not signed by the provided chain".to_string());
    }
}
