//! OneBot v11 HTTP transport.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, header::HeaderMap};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::MessagingTransport;
use crate::utils::http_client::build_client;
use crate::{Error, Result};

/// OneBot HTTP API configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneBotConfig {
    /// API base, e.g. `http://127.0.0.1:5700`.
    pub base_url: String,
    /// Sent as `Authorization: Bearer <token>` when set.
    pub access_token: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    10
}

impl Default for OneBotConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5700".to_string(),
            access_token: None,
            timeout_secs: default_timeout(),
        }
    }
}

/// Response envelope of every OneBot action.
#[derive(Debug, Deserialize)]
struct ActionResponse {
    status: String,
    #[serde(default)]
    retcode: i64,
    #[serde(default)]
    wording: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Sends messages through a OneBot v11 implementation's HTTP API.
pub struct OneBotTransport {
    config: OneBotConfig,
    client: Client,
}

impl OneBotTransport {
    pub fn new(config: OneBotConfig) -> Result<Self> {
        if !config.base_url.starts_with("http://") && !config.base_url.starts_with("https://") {
            return Err(Error::config(format!(
                "OneBot URL must start with http:// or https://, got '{}'",
                config.base_url
            )));
        }
        let client = build_client(Duration::from_secs(config.timeout_secs))?;
        Ok(Self { config, client })
    }

    fn action_url(&self, action: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), action)
    }

    fn build_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(token) = self.config.access_token.as_deref().filter(|t| !t.is_empty())
            && let Ok(value) = format!("Bearer {}", token).parse()
        {
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }
        headers
    }

    /// Build an action payload. Numeric ids are sent as numbers, which is
    /// what OneBot implementations expect; anything else is sent verbatim.
    fn build_payload(id_field: &str, id: &str, text: &str) -> Value {
        let id_value = id
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::from(id));
        let mut payload = json!({
            "message": text,
            "auto_escape": true,
        });
        payload[id_field] = id_value;
        payload
    }

    fn check_response(action: &str, body: &str) -> Result<()> {
        let response: ActionResponse = serde_json::from_str(body).map_err(|e| {
            Error::transport(format!("{} returned an unreadable body: {}", action, e))
        })?;
        if response.status == "ok" {
            return Ok(());
        }
        let detail = response
            .wording
            .or(response.message)
            .unwrap_or_else(|| response.status.clone());
        Err(Error::transport(format!(
            "{} failed: retcode {} ({})",
            action, response.retcode, detail
        )))
    }

    async fn call(&self, action: &str, payload: Value) -> Result<()> {
        let response = self
            .client
            .post(self.action_url(action))
            .headers(self.build_headers())
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::transport(format!("{} request failed: {}", action, e)))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            warn!("OneBot {} failed: {} - {}", action, status, body);
            return Err(Error::transport(format!(
                "{} failed: HTTP {} - {}",
                action, status, body
            )));
        }

        Self::check_response(action, &body)?;
        debug!("OneBot {} delivered", action);
        Ok(())
    }
}

#[async_trait]
impl MessagingTransport for OneBotTransport {
    fn transport_type(&self) -> &'static str {
        "onebot"
    }

    async fn send_to_group(&self, group_id: &str, text: &str) -> Result<()> {
        self.call("send_group_msg", Self::build_payload("group_id", group_id, text))
            .await
    }

    async fn send_to_user(&self, user_id: &str, text: &str) -> Result<()> {
        self.call("send_private_msg", Self::build_payload("user_id", user_id, text))
            .await
    }
}
