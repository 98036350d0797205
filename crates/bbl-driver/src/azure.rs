use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bbl_domain::{Azure, State};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::cloud::{CloudPreflight, EnvironmentLookup, Leftover, LeftoverCleaner};
use crate::error::DriverError;

const RESOURCE_GROUPS_API_VERSION: &str = "2021-04-01";

#[derive(Debug, Clone)]
struct BaseUrls {
    management: String,
    login: String,
}

impl Default for BaseUrls {
    fn default() -> Self {
        Self {
            management: "https://management.azure.com".into(),
            login: "https://login.microsoftonline.com".into(),
        }
    }
}

// ── Token provider ────────────────────────────────────────────────────────────

#[async_trait]
trait TokenProvider: Send + Sync {
    async fn token(&self) -> Result<String, DriverError>;
}

/// Client-credentials grant for the environment's service principal.
struct ServicePrincipalTokenProvider {
    tenant_id: String,
    client_id: String,
    client_secret: String,
    login_base: String,
    client: reqwest::Client,
    cache: Mutex<Option<(String, Instant)>>,
}

#[async_trait]
impl TokenProvider for ServicePrincipalTokenProvider {
    async fn token(&self) -> Result<String, DriverError> {
        if let Some((token, expiry)) = self.cache.lock().await.as_ref() {
            if Instant::now() < *expiry {
                return Ok(token.clone());
            }
        }

        let url = format!("{}/{}/oauth2/v2.0/token", self.login_base, self.tenant_id);
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", "https://management.azure.com/.default"),
        ];
        let resp: Value = self
            .client
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(|e| DriverError::Api(format!("Azure token request: {e}")))?
            .json()
            .await
            .map_err(|e| DriverError::Api(format!("Azure token decode: {e}")))?;

        let token = resp["access_token"]
            .as_str()
            .ok_or_else(|| DriverError::Api(format!("Azure token: {}", parse_arm_error(&resp))))?
            .to_string();
        let expires_in = resp["expires_in"].as_u64().unwrap_or(3600);
        let expiry = Instant::now() + Duration::from_secs(expires_in.saturating_sub(60));
        *self.cache.lock().await = Some((token.clone(), expiry));
        Ok(token)
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

/// `code: message` from an ARM or AAD error body.
fn parse_arm_error(body: &Value) -> String {
    if let Some(description) = body["error_description"].as_str() {
        return description.lines().next().unwrap_or(description).to_string();
    }
    let err = body.get("error").or_else(|| body.get("Error")).unwrap_or(body);
    let code = err["code"].as_str().unwrap_or("Unknown");
    let message = err["message"].as_str().unwrap_or("unknown error");
    format!("{code}: {message}")
}

// ── Client ────────────────────────────────────────────────────────────────────

/// Resource Manager client scoped to one subscription.
#[derive(Clone)]
pub struct AzureClient {
    client: reqwest::Client,
    token: Arc<dyn TokenProvider>,
    subscription_id: String,
    base: BaseUrls,
}

impl AzureClient {
    pub fn new(azure: &Azure) -> Self {
        let base = BaseUrls::default();
        let client = reqwest::Client::new();
        AzureClient {
            token: Arc::new(ServicePrincipalTokenProvider {
                tenant_id: azure.tenant_id.clone(),
                client_id: azure.client_id.clone(),
                client_secret: azure.client_secret.clone(),
                login_base: base.login.clone(),
                client: client.clone(),
                cache: Mutex::new(None),
            }),
            client,
            subscription_id: azure.subscription_id.clone(),
            base,
        }
    }

    #[cfg(test)]
    fn with_static_token(subscription_id: &str, base: BaseUrls) -> Self {
        AzureClient {
            client: reqwest::Client::new(),
            token: Arc::new(StaticToken("fake-token".into())),
            subscription_id: subscription_id.into(),
            base,
        }
    }

    fn resource_groups_url(&self, name: Option<&str>) -> String {
        let mut url = format!("{}/subscriptions/{}/resourcegroups", self.base.management, self.subscription_id);
        if let Some(name) = name {
            url.push('/');
            url.push_str(name);
        }
        url.push_str(&format!("?api-version={RESOURCE_GROUPS_API_VERSION}"));
        url
    }

    async fn arm_get(&self, url: &str) -> Result<(u16, Value), DriverError> {
        let token = self.token.token().await?;
        debug!(url, "Azure ARM GET");
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
}

#[async_trait]
impl EnvironmentLookup for AzureClient {
    async fn environment_exists(&self, name: &str) -> Result<bool, DriverError> {
        let (status, body) = self.arm_get(&self.resource_groups_url(Some(&format!("{name}-bosh")))).await?;
        match status {
            200..=299 => Ok(true),
            404 => Ok(false),
            _ => Err(DriverError::Api(parse_arm_error(&body))),
        }
    }
}

#[async_trait]
impl CloudPreflight for AzureClient {
    /// Fails fast on bad service principal credentials.
    async fn prepare(&self, state: State) -> Result<State, DriverError> {
        self.token
            .token()
            .await
            .map_err(|e| DriverError::Api(format!("Validate Azure credentials: {e}")))?;
        Ok(state)
    }
}

#[async_trait]
impl LeftoverCleaner for AzureClient {
    async fn list(&self, filter: &str) -> Result<Vec<Leftover>, DriverError> {
        let (status, body) = self.arm_get(&self.resource_groups_url(None)).await?;
        if !(200..300).contains(&status) {
            return Err(DriverError::Api(parse_arm_error(&body)));
        }
        Ok(body["value"]
            .as_array()
            .map(|groups| {
                groups
                    .iter()
                    .filter_map(|g| g["name"].as_str())
                    .filter(|name| name.contains(filter))
                    .map(|name| Leftover { kind: "Resource Group", name: name.to_string(), id: name.to_string() })
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Starts deletion; ARM finishes it asynchronously.
    async fn delete(&self, leftover: &Leftover) -> Result<(), DriverError> {
        let url = self.resource_groups_url(Some(&leftover.id));
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
            return Err(DriverError::Api(parse_arm_error(&body)));
        }
        info!(kind = leftover.kind, name = %leftover.name, "deletion started");
        Ok(())
    }
}
