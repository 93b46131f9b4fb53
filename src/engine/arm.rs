//! Azure Resource Manager provider.
//!
//! Each resource is submitted as a `PUT` of its ARM body to the path derived
//! from its kind and address inputs. The provider then polls the resource
//! until `provisioningState` is terminal and returns the flattened
//! attributes: `id`, `name`, and every field of `properties`.

use async_trait::async_trait;
use reqwest::{Client, Response, header};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info, trace};

use crate::error::{AzureError, InfraError, Result};
use crate::graph::{ADDRESS_KEYS, ResourceKind};
use crate::output::Secret;

use super::provider::{AppliedResource, ApplyRequest, ResourceProvider};

/// Public ARM endpoint.
const ARM_BASE_URL: &str = "https://management.azure.com";

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default delay between provisioning polls.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Default number of polls before giving up.
const DEFAULT_MAX_POLLS: u32 = 180;

/// Azure Resource Manager client.
#[derive(Debug, Clone)]
pub struct ArmProvider {
    /// HTTP client.
    client: Client,
    /// Endpoint, without trailing slash.
    base_url: String,
    /// Subscription resources are created in.
    subscription_id: String,
    /// Bearer token.
    token: Secret<String>,
    /// Delay between provisioning polls.
    poll_interval: Duration,
    /// Polls before timing out.
    max_polls: u32,
}

impl ArmProvider {
    /// Creates a new ARM provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(subscription_id: &str, token: Secret<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| AzureError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: ARM_BASE_URL.to_string(),
            subscription_id: subscription_id.to_string(),
            token,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
        })
    }

    /// Overrides the endpoint.
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Overrides provisioning polling.
    #[must_use]
    pub const fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls;
        self
    }

    /// Returns the ARM path of a resource, without query string.
    ///
    /// # Errors
    ///
    /// Returns an error if an address input the kind needs is missing.
    pub fn resource_path(&self, request: &ApplyRequest) -> Result<String> {
        let name = required(request, "name")?;
        let subscription = format!("/subscriptions/{}", self.subscription_id);
        let scope = || -> Result<String> {
            Ok(format!(
                "{subscription}/resourceGroups/{}/providers",
                required(request, "resourceGroupName")?
            ))
        };
        let parent = || required(request, "parentName");

        let path = match request.kind {
            ResourceKind::ResourceGroup => format!("{subscription}/resourcegroups/{name}"),
            ResourceKind::AppServicePlan => {
                format!("{}/Microsoft.Web/serverfarms/{name}", scope()?)
            }
            ResourceKind::WebApp => format!("{}/Microsoft.Web/sites/{name}", scope()?),
            ResourceKind::HostNameBinding => format!(
                "{}/Microsoft.Web/sites/{}/hostNameBindings/{name}",
                scope()?,
                parent()?
            ),
            ResourceKind::Certificate => {
                format!("{}/Microsoft.Web/certificates/{name}", scope()?)
            }
            ResourceKind::PostgresServer => format!(
                "{}/Microsoft.DBforPostgreSQL/flexibleServers/{name}",
                scope()?
            ),
            ResourceKind::FirewallRule => format!(
                "{}/Microsoft.DBforPostgreSQL/flexibleServers/{}/firewallRules/{name}",
                scope()?,
                parent()?
            ),
            ResourceKind::Database => format!(
                "{}/Microsoft.DBforPostgreSQL/flexibleServers/{}/databases/{name}",
                scope()?,
                parent()?
            ),
            ResourceKind::DnsZone => format!("{}/Microsoft.Network/dnsZones/{name}", scope()?),
            ResourceKind::RecordSet => format!(
                "{}/Microsoft.Network/dnsZones/{}/{}/{name}",
                scope()?,
                parent()?,
                required(request, "recordType")?
            ),
        };
        Ok(path)
    }

    fn url(&self, path: &str, kind: ResourceKind) -> String {
        format!("{}{path}?api-version={}", self.base_url, api_version(kind))
    }

    /// Checks the response status and parses the body.
    async fn read_body(response: Response) -> Result<Value> {
        let status = response.status();

        if status.as_u16() == 401 || status.as_u16() == 403 {
            let body = response.text().await.unwrap_or_default();
            return Err(AzureError::AuthenticationFailed { message: body }.into());
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AzureError::api_error(status.as_u16(), body).into());
        }

        let text = response
            .text()
            .await
            .map_err(|e| AzureError::network(format!("Failed to read response: {e}")))?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| {
            InfraError::from(AzureError::InvalidResponse {
                message: format!("Failed to parse response: {e}"),
            })
        })
    }

    async fn put(&self, url: &str, body: &Value) -> Result<Value> {
        let response = self
            .client
            .put(url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token.expose()))
            .json(body)
            .send()
            .await
            .map_err(|e| AzureError::network(format!("Request failed: {e}")))?;
        Self::read_body(response).await
    }

    async fn get(&self, url: &str) -> Result<Value> {
        let response = self
            .client
            .get(url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token.expose()))
            .send()
            .await
            .map_err(|e| AzureError::network(format!("Request failed: {e}")))?;
        Self::read_body(response).await
    }

    /// Polls a resource until its provisioning state is terminal.
    async fn wait_provisioned(&self, path: &str, url: &str, mut body: Value) -> Result<Value> {
        for attempt in 0..=self.max_polls {
            let state = provisioning_state(&body).map(str::to_owned);
            match state.as_deref() {
                Some(state) if state.eq_ignore_ascii_case("Succeeded") => return Ok(body),
                Some(state)
                    if state.eq_ignore_ascii_case("Failed")
                        || state.eq_ignore_ascii_case("Canceled") =>
                {
                    return Err(AzureError::ProvisioningFailed {
                        resource: path.to_string(),
                        state: state.to_string(),
                    }
                    .into());
                }
                None if !body.is_null() => return Ok(body),
                _ => {}
            }
            if attempt == self.max_polls {
                break;
            }
            trace!("Waiting for {path} to finish provisioning");
            tokio::time::sleep(self.poll_interval).await;
            body = self.get(url).await?;
        }
        Err(AzureError::ProvisioningTimeout {
            resource: path.to_string(),
        }
        .into())
    }
}

#[async_trait]
impl ResourceProvider for ArmProvider {
    async fn apply(&self, request: &ApplyRequest) -> Result<AppliedResource> {
        let path = self.resource_path(request)?;
        let url = self.url(&path, request.kind);
        let body = request_body(request);

        info!("Applying {} {}", request.kind, path);
        debug!("Request inputs: {:?}", request.redacted_inputs());

        let response = self.put(&url, &body).await?;
        let response = self.wait_provisioned(&path, &url, response).await?;

        let attributes = flatten_attributes(&response);
        let resource_id = attributes
            .get("id")
            .and_then(Value::as_str)
            .map_or_else(|| path.clone(), ToString::to_string);

        Ok(AppliedResource {
            resource_id,
            attributes,
        })
    }

    fn name(&self) -> &'static str {
        "azure-resource-manager"
    }
}

fn required<'a>(request: &'a ApplyRequest, key: &str) -> Result<&'a str> {
    request.input_str(key).ok_or_else(|| {
        InfraError::internal(format!("{} has no '{key}' input", request.urn))
    })
}

/// Returns the API version used for a resource kind.
#[must_use]
pub const fn api_version(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::ResourceGroup => "2021-04-01",
        ResourceKind::AppServicePlan
        | ResourceKind::WebApp
        | ResourceKind::HostNameBinding
        | ResourceKind::Certificate => "2023-12-01",
        ResourceKind::PostgresServer | ResourceKind::FirewallRule | ResourceKind::Database => {
            "2024-08-01"
        }
        ResourceKind::DnsZone | ResourceKind::RecordSet => "2018-05-01",
    }
}

/// Builds the ARM body from non-address inputs, expanding dotted keys.
#[must_use]
pub fn request_body(request: &ApplyRequest) -> Value {
    let mut body = Map::new();
    for (key, value) in &request.inputs {
        if ADDRESS_KEYS.contains(&key.as_str()) {
            continue;
        }
        insert_path(&mut body, key, value.clone());
    }
    Value::Object(body)
}

fn insert_path(target: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            target.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = target
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(child) = entry {
                insert_path(child, rest, value);
            }
        }
    }
}

fn provisioning_state(body: &Value) -> Option<&str> {
    body.get("properties")
        .and_then(|p| p.get("provisioningState"))
        .and_then(Value::as_str)
}

/// Flattens an ARM response into attributes.
#[must_use]
pub fn flatten_attributes(body: &Value) -> Map<String, Value> {
    let mut attributes = Map::new();
    for key in ["id", "name", "location"] {
        if let Some(value) = body.get(key) {
            attributes.insert(key.to_string(), value.clone());
        }
    }
    if let Some(Value::Object(properties)) = body.get("properties") {
        for (key, value) in properties {
            attributes.insert(key.clone(), value.clone());
        }
    }
    attributes
}
