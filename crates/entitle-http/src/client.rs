//! Entitlement service client

use async_trait::async_trait;
use entitle_core::{
    EntitlementError, EntitlementResult, EntitlementSnapshot, PlanId, RemoteStore,
    SubscriptionPayload, UserId,
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::HttpStoreConfig;

/// Remote store over HTTP/JSON
pub struct HttpEntitlementStore {
    base_url: Url,
    api_key: Option<String>,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct CreditsRequest {
    credits: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionRequest<'a> {
    plan_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

impl HttpEntitlementStore {
    /// Build a client from `config`. Fails on an unusable base URL.
    pub fn new(config: &HttpStoreConfig) -> EntitlementResult<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| EntitlementError::Config(format!("invalid base url: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(EntitlementError::Config(format!(
                "base url cannot hold paths: {}",
                config.base_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| EntitlementError::Config(e.to_string()))?;

        Ok(Self {
            base_url,
            api_key: config.api_key.clone(),
            client,
        })
    }

    fn endpoint(&self, user_id: &UserId, resource: &str) -> EntitlementResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| EntitlementError::Config("base url cannot hold paths".into()))?
            .pop_if_empty()
            .push("users")
            .push(user_id.as_str())
            .push(resource);
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> EntitlementResult<reqwest::Response> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| EntitlementError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.message.or(b.error))
            .unwrap_or(body);

        tracing::debug!(%status, %detail, "entitlement service rejected request");

        Err(EntitlementError::Remote(if detail.is_empty() {
            format!("server returned {}", status)
        } else {
            format!("server returned {}: {}", status, detail)
        }))
    }
}

#[async_trait]
impl RemoteStore for HttpEntitlementStore {
    async fn fetch_entitlement(&self, user_id: &UserId) -> EntitlementResult<EntitlementSnapshot> {
        let url = self.endpoint(user_id, "entitlement")?;
        let response = self.send(self.client.get(url)).await?;

        response
            .json()
            .await
            .map_err(|e| EntitlementError::Decode(e.to_string()))
    }

    async fn update_credits(&self, user_id: &UserId, credits: u32) -> EntitlementResult<()> {
        let url = self.endpoint(user_id, "credits")?;
        self.send(self.client.put(url).json(&CreditsRequest { credits }))
            .await?;
        Ok(())
    }

    async fn create_subscription(
        &self,
        user_id: &UserId,
        plan_id: &PlanId,
    ) -> EntitlementResult<SubscriptionPayload> {
        let url = self.endpoint(user_id, "subscriptions")?;
        let body = SubscriptionRequest {
            plan_id: plan_id.as_str(),
        };
        let response = self.send(self.client.post(url).json(&body)).await?;

        response
            .json()
            .await
            .map_err(|e| EntitlementError::Decode(e.to_string()))
    }
}
