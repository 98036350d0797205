use std::collections::BTreeMap;

use async_trait::async_trait;
use bbl_domain::{Aws, State};
use bbl_validate::{NetworkInstances, ProbeError};
use hmac::{Hmac, Mac};
use quick_xml::{events::Event as XmlEvent, Reader as XmlReader};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::cloud::{CloudPreflight, EnvironmentLookup, Leftover, LeftoverCleaner};
use crate::error::DriverError;

type HmacSha256 = Hmac<Sha256>;

const EC2_API_VERSION: &str = "2016-11-15";

// ── Base URLs (overridden in tests) ───────────────────────────────────────────

#[derive(Debug, Clone)]
pub(crate) struct BaseUrls {
    pub(crate) ec2: String,
}

impl BaseUrls {
    fn for_region(region: &str) -> Self {
        Self { ec2: format!("https://ec2.{region}.amazonaws.com") }
    }
}

#[derive(Clone)]
struct AwsCredentials {
    access_key_id: String,
    secret_access_key: String,
}

// ── SigV4 signing ─────────────────────────────────────────────────────────────

fn sha256_hex(data: &[u8]) -> String {
    Sha256::digest(data).iter().map(|b| format!("{b:02x}")).collect()
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, DriverError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| DriverError::Internal(format!("hmac key: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn signing_key(secret: &str, date: &str, region: &str) -> Result<Vec<u8>, DriverError> {
    let k_date = hmac_sha256(format!("AWS4{secret}").as_bytes(), date.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, b"ec2")?;
    hmac_sha256(&k_service, b"aws4_request")
}

fn url_host(url: &str) -> &str {
    let without_scheme = url.trim_start_matches("https://").trim_start_matches("http://");
    without_scheme.split('/').next().unwrap_or(without_scheme)
}

/// SigV4 headers for a form-encoded POST to `/`.
fn sigv4_headers(
    body: &[u8],
    content_type: &str,
    host: &str,
    creds: &AwsCredentials,
    region: &str,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<BTreeMap<&'static str, String>, DriverError> {
    let timestamp = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = now.format("%Y%m%d").to_string();
    let payload_hash = sha256_hex(body);

    let canonical_headers = format!(
        "content-type:{content_type}\nhost:{host}\nx-amz-content-sha256:{payload_hash}\nx-amz-date:{timestamp}\n"
    );
    let signed_headers = "content-type;host;x-amz-content-sha256;x-amz-date";
    let canonical_request = format!("POST\n/\n\n{canonical_headers}\n{signed_headers}\n{payload_hash}");

    let scope = format!("{date}/{region}/ec2/aws4_request");
    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{timestamp}\n{scope}\n{}",
        sha256_hex(canonical_request.as_bytes())
    );
    let signature: String = hmac_sha256(&signing_key(&creds.secret_access_key, &date, region)?, string_to_sign.as_bytes())?
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect();

    let mut headers = BTreeMap::new();
    headers.insert(
        "Authorization",
        format!(
            "AWS4-HMAC-SHA256 Credential={}/{scope},SignedHeaders={signed_headers},Signature={signature}",
            creds.access_key_id
        ),
    );
    headers.insert("x-amz-date", timestamp);
    headers.insert("x-amz-content-sha256", payload_hash);
    Ok(headers)
}

// ── XML helpers ───────────────────────────────────────────────────────────────

/// Text of every `<tag>` element, at any depth.
fn xml_all_texts(xml: &str, tag: &str) -> Vec<String> {
    let mut reader = XmlReader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut inside = false;
    let mut found = Vec::new();
    loop {
        match reader.read_event() {
            Ok(XmlEvent::Start(e)) => inside = e.local_name().as_ref() == tag.as_bytes(),
            Ok(XmlEvent::End(_)) => inside = false,
            Ok(XmlEvent::Text(e)) if inside => {
                if let Ok(text) = e.unescape() {
                    found.push(text.into_owned());
                }
            }
            Ok(XmlEvent::Eof) | Err(_) => break,
            _ => {}
        }
    }
    found
}

fn xml_error(xml: &str) -> String {
    let code = xml_all_texts(xml, "Code").into_iter().next().unwrap_or_else(|| "Unknown".into());
    let message = xml_all_texts(xml, "Message").into_iter().next().unwrap_or_else(|| "unknown error".into());
    format!("{code}: {message}")
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Instance {
    id: String,
    name: String,
}

/// Instances in a `DescribeInstances` response with their `Name` tags.
fn parse_instances(xml: &str) -> Vec<Instance> {
    let mut reader = XmlReader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut path: Vec<String> = Vec::new();
    let mut instances = Vec::new();
    let mut current = Instance::default();
    let mut tag = (String::new(), String::new());

    let ends_with = |path: &[String], suffix: &[&str]| {
        path.len() >= suffix.len() && path[path.len() - suffix.len()..].iter().zip(suffix).all(|(a, b)| a == b)
    };

    loop {
        match reader.read_event() {
            Ok(XmlEvent::Start(e)) => {
                path.push(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
                if ends_with(&path, &["instancesSet", "item"]) {
                    current = Instance::default();
                }
            }
            Ok(XmlEvent::End(_)) => {
                if ends_with(&path, &["instancesSet", "item"]) {
                    instances.push(std::mem::take(&mut current));
                } else if ends_with(&path, &["instancesSet", "item", "tagSet", "item"]) {
                    let (key, value) = std::mem::take(&mut tag);
                    if key == "Name" {
                        current.name = value;
                    }
                }
                path.pop();
            }
            Ok(XmlEvent::Text(e)) => {
                let Ok(text) = e.unescape() else { continue };
                if ends_with(&path, &["instancesSet", "item", "instanceId"]) {
                    current.id = text.into_owned();
                } else if ends_with(&path, &["tagSet", "item", "key"]) {
                    tag.0 = text.into_owned();
                } else if ends_with(&path, &["tagSet", "item", "value"]) {
                    tag.1 = text.into_owned();
                }
            }
            Ok(XmlEvent::Eof) | Err(_) => break,
            _ => {}
        }
    }
    instances
}

// ── Client ────────────────────────────────────────────────────────────────────

/// Minimal EC2 Query API client.
#[derive(Clone)]
pub struct AwsClient {
    client: reqwest::Client,
    creds: AwsCredentials,
    region: String,
    base: BaseUrls,
}

impl AwsClient {
    pub fn new(aws: &Aws) -> Self {
        Self::with_base(aws, BaseUrls::for_region(&aws.region))
    }

    pub(crate) fn with_base(aws: &Aws, base: BaseUrls) -> Self {
        AwsClient {
            client: reqwest::Client::new(),
            creds: AwsCredentials {
                access_key_id: aws.access_key_id.clone(),
                secret_access_key: aws.secret_access_key.clone(),
            },
            region: aws.region.clone(),
            base,
        }
    }

    /// POST an EC2 action, returning the raw XML response.
    async fn ec2(&self, action: &str, params: &[(String, String)]) -> Result<String, DriverError> {
        let mut body = format!("Action={action}&Version={EC2_API_VERSION}");
        for (k, v) in params {
            body.push('&');
            body.push_str(&urlencoding::encode(k));
            body.push('=');
            body.push_str(&urlencoding::encode(v));
        }

        let content_type = "application/x-www-form-urlencoded; charset=utf-8";
        let url = format!("{}/", self.base.ec2.trim_end_matches('/'));
        let headers = sigv4_headers(
            body.as_bytes(),
            content_type,
            url_host(&self.base.ec2),
            &self.creds,
            &self.region,
            chrono::Utc::now(),
        )?;

        debug!(action, "EC2 request");
        let mut req = self.client.post(&url).header("Content-Type", content_type).body(body);
        for (k, v) in headers {
            req = req.header(k, v);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| DriverError::Api(format!("{action}: {e}")))?;
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(DriverError::Api(format!("{action}: {}", xml_error(&text))));
        }
        Ok(text)
    }

    async fn describe_instances(&self, filters: &[(&str, &str)]) -> Result<Vec<Instance>, DriverError> {
        let mut params = Vec::new();
        for (i, (name, value)) in filters.iter().enumerate() {
            params.push((format!("Filter.{}.Name", i + 1), name.to_string()));
            params.push((format!("Filter.{}.Value.1", i + 1), value.to_string()));
        }
        let xml = self.ec2("DescribeInstances", &params).await?;
        Ok(parse_instances(&xml))
    }
}

#[async_trait]
impl EnvironmentLookup for AwsClient {
    async fn environment_exists(&self, name: &str) -> Result<bool, DriverError> {
        let params = [
            ("Filter.1.Name".to_string(), "tag:Name".to_string()),
            ("Filter.1.Value.1".to_string(), format!("{name}-vpc")),
        ];
        let xml = self.ec2("DescribeVpcs", &params).await?;
        Ok(!xml_all_texts(&xml, "vpcId").is_empty())
    }
}

#[async_trait]
impl NetworkInstances for AwsClient {
    async fn instance_names(&self, vpc_id: &str) -> Result<Vec<String>, ProbeError> {
        let instances = self
            .describe_instances(&[("vpc-id", vpc_id), ("instance-state-name", "pending")])
            .await?;
        let running = self
            .describe_instances(&[("vpc-id", vpc_id), ("instance-state-name", "running")])
            .await?;
        Ok(instances
            .into_iter()
            .chain(running)
            .map(|i| if i.name.is_empty() { "unnamed".to_string() } else { i.name })
            .collect())
    }
}

#[async_trait]
impl CloudPreflight for AwsClient {
    /// Fails fast on bad credentials or region.
    async fn prepare(&self, state: State) -> Result<State, DriverError> {
        let xml = self
            .ec2("DescribeAvailabilityZones", &[])
            .await
            .map_err(|e| DriverError::Api(format!("Validate AWS credentials: {e}")))?;
        debug!(zones = ?xml_all_texts(&xml, "zoneName"), "availability zones");
        Ok(state)
    }
}

#[async_trait]
impl LeftoverCleaner for AwsClient {
    async fn list(&self, filter: &str) -> Result<Vec<Leftover>, DriverError> {
        let instances = self.describe_instances(&[("instance-state-name", "running")]).await?;
        Ok(instances
            .into_iter()
            .filter(|i| i.name.contains(filter))
            .map(|i| Leftover {
                kind: "EC2 Instance",
                name: if i.name.is_empty() { "unnamed".into() } else { i.name },
                id: i.id,
            })
            .collect())
    }

    async fn delete(&self, leftover: &Leftover) -> Result<(), DriverError> {
        self.ec2("TerminateInstances", &[("InstanceId.1".to_string(), leftover.id.clone())])
            .await?;
        info!(kind = leftover.kind, name = %leftover.name, id = %leftover.id, "terminated");
        Ok(())
    }
}

mod urlencoding {
    pub fn encode(s: &str) -> String {
        let mut out = String::with_capacity(s.len());
        for byte in s.bytes() {
            match byte {
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(byte as char),
                b => out.push_str(&format!("%{b:02X}")),
            }
        }
        out
    }
}
