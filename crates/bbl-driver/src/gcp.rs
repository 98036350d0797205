use std::sync::Arc;

use async_trait::async_trait;
use bbl_domain::{Gcp, State};
use bbl_validate::{NetworkInstances, ProbeError};
use serde_json::Value;
use tracing::{debug, info};

use crate::cloud::{CloudPreflight, EnvironmentLookup, Leftover, LeftoverCleaner};
use crate::error::DriverError;

const SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

#[derive(Debug, Clone)]
struct BaseUrls {
    compute: String,
}

impl Default for BaseUrls {
    fn default() -> Self {
        Self { compute: "https://compute.googleapis.com/compute/v1".into() }
    }
}

// ── Token provider ────────────────────────────────────────────────────────────

#[async_trait]
trait TokenProvider: Send + Sync {
    async fn token(&self) -> Result<String, DriverError>;
}

/// Tokens minted from the environment's service account key.
struct ServiceAccountTokenProvider {
    inner: gcp_auth::CustomServiceAccount,
}

#[async_trait]
impl TokenProvider for ServiceAccountTokenProvider {
    async fn token(&self) -> Result<String, DriverError> {
        use gcp_auth::TokenProvider as _;
        let token = self
            .inner
            .token(&[SCOPE])
            .await
            .map_err(|e| DriverError::Api(format!("GCP auth failed: {e}")))?;
        Ok(token.as_str().to_string())
    }
}

#[cfg(test)]
struct StaticToken(String);

#[cfg(test)]
#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> Result<String, DriverError> {
        Ok(self.0.clone())
    }
}

/// `"NOT_FOUND: The resource was not found"` from a GCP error envelope.
fn extract_gcp_error(body: &Value) -> String {
    let err = &body["error"];
    let status = err["status"].as_str().unwrap_or("UNKNOWN");
    let message = err["message"].as_str().unwrap_or("unknown error");
    format!("{status}: {message}")
}

fn last_segment(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

/// The BOSH job name (`bosh/0`) from instance metadata, else the VM name.
fn display_name(instance: &Value) -> String {
    instance["metadata"]["items"]
        .as_array()
        .and_then(|items| items.iter().find(|i| i["key"] == "name"))
        .and_then(|i| i["value"].as_str())
        .or_else(|| instance["name"].as_str())
        .unwrap_or("unnamed")
        .to_string()
}

fn on_network(instance: &Value, network: &str) -> bool {
    instance["networkInterfaces"]
        .as_array()
        .is_some_and(|nics| nics.iter().any(|n| n["network"].as_str().is_some_and(|u| last_segment(u) == network)))
}

// ── Client ────────────────────────────────────────────────────────────────────

/// Compute Engine REST client scoped to one project.
#[derive(Clone)]
pub struct GcpClient {
    client: reqwest::Client,
    token: Arc<dyn TokenProvider>,
    project_id: String,
    region: String,
    base: BaseUrls,
}

impl GcpClient {
    pub fn new(gcp: &Gcp) -> Result<Self, DriverError> {
        let account = gcp_auth::CustomServiceAccount::from_json(&gcp.service_account_key)
            .map_err(|e| DriverError::Api(format!("GCP service account key: {e}")))?;
        Ok(GcpClient {
            client: reqwest::Client::new(),
            token: Arc::new(ServiceAccountTokenProvider { inner: account }),
            project_id: gcp.project_id.clone(),
            region: gcp.region.clone(),
            base: BaseUrls::default(),
        })
    }

    #[cfg(test)]
    fn with_static_token(gcp: &Gcp, base: BaseUrls) -> Self {
        GcpClient {
            client: reqwest::Client::new(),
            token: Arc::new(StaticToken("fake-token".into())),
            project_id: gcp.project_id.clone(),
            region: gcp.region.clone(),
            base,
        }
    }

    fn project_url(&self, rest: &str) -> String {
        format!("{}/projects/{}/{rest}", self.base.compute, self.project_id)
    }

    /// GET returning the status and decoded body.
    async fn get(&self, url: &str) -> Result<(u16, Value), DriverError> {
        let token = self.token.token().await?;
        debug!(url, "GCP GET");
        let resp = self
            .client
            .get(url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| DriverError::Api(format!("GET {url}: {e}")))?;
        let status = resp.status().as_u16();
        let body = resp.json().await.unwrap_or(Value::Null);
        Ok((status, body))
    }

    async fn get_ok(&self, url: &str) -> Result<Value, DriverError> {
        let (status, body) = self.get(url).await?;
        if !(200..300).contains(&status) {
            return Err(DriverError::Api(extract_gcp_error(&body)));
        }
        Ok(body)
    }

    /// Every instance in the project, following page tokens.
    async fn instances(&self) -> Result<Vec<Value>, DriverError> {
        let mut instances = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut url = self.project_url("aggregated/instances");
            if let Some(token) = &page_token {
                url.push_str(&format!("?pageToken={token}"));
            }
            let body = self.get_ok(&url).await?;
            if let Some(scopes) = body["items"].as_object() {
                for scope in scopes.values() {
                    if let Some(list) = scope["instances"].as_array() {
                        instances.extend(list.iter().cloned());
                    }
                }
            }
            match body["nextPageToken"].as_str() {
                Some(next) if !next.is_empty() => page_token = Some(next.to_string()),
                _ => return Ok(instances),
            }
        }
    }

    async fn zones(&self) -> Result<Vec<String>, DriverError> {
        let body = self.get_ok(&self.project_url(&format!("regions/{}", self.region))).await?;
        let mut zones: Vec<String> = body["zones"]
            .as_array()
            .map(|zones| zones.iter().filter_map(Value::as_str).map(|z| last_segment(z).to_string()).collect())
            .unwrap_or_default();
        zones.sort();
        Ok(zones)
    }
}

#[async_trait]
impl EnvironmentLookup for GcpClient {
    async fn environment_exists(&self, name: &str) -> Result<bool, DriverError> {
        let (status, body) = self.get(&self.project_url(&format!("global/networks/{name}-network"))).await?;
        match status {
            200..=299 => Ok(true),
            404 => Ok(false),
            _ => Err(DriverError::Api(extract_gcp_error(&body))),
        }
    }
}

#[async_trait]
impl NetworkInstances for GcpClient {
    async fn instance_names(&self, network: &str) -> Result<Vec<String>, ProbeError> {
        let instances = self.instances().await?;
        Ok(instances
            .iter()
            .filter(|i| on_network(i, network))
            .map(display_name)
            .collect())
    }
}

#[async_trait]
impl CloudPreflight for GcpClient {
    /// Fill in the region's zones, and the default zone when unset.
    async fn prepare(&self, mut state: State) -> Result<State, DriverError> {
        let zones = self.zones().await?;
        if zones.is_empty() {
            return Err(DriverError::Api(format!("no zones found in region {}", self.region)));
        }
        if state.gcp.zone.is_empty() {
            state.gcp.zone = zones[0].clone();
        }
        state.gcp.zones = zones;
        debug!(zone = %state.gcp.zone, "gcp zones resolved");
        Ok(state)
    }
}

#[async_trait]
impl LeftoverCleaner for GcpClient {
    async fn list(&self, filter: &str) -> Result<Vec<Leftover>, DriverError> {
        let instances = self.instances().await?;
        Ok(instances
            .iter()
            .filter_map(|i| {
                let name = i["name"].as_str()?;
                let zone = last_segment(i["zone"].as_str()?);
                name.contains(filter).then(|| Leftover {
                    kind: "Compute Instance",
                    name: name.to_string(),
                    id: format!("zones/{zone}/instances/{name}"),
                })
            })
            .collect())
    }

    async fn delete(&self, leftover: &Leftover) -> Result<(), DriverError> {
        let url = self.project_url(&leftover.id);
        let token = self.token.token().await?;
        let resp = self
            .client
            .delete(&url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| DriverError::Api(format!("DELETE {url}: {e}")))?;
        let status = resp.status().as_u16();
        if status != 404 && !(200..300).contains(&status) {
            let body = resp.json().await.unwrap_or(Value::Null);
            return Err(DriverError::Api(extract_gcp_error(&body)));
        }
        info!(kind = leftover.kind, name = %leftover.name, "deleted");
        Ok(())
    }
}
