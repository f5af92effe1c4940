use bytes::Bytes;
use futures_util::Stream;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, error};

use crate::config::RelayConfig;
use crate::data::RoleTable;
use crate::error::RelayError;
use crate::models::{is_blank, ChatRequest, CompletionRequest, Message};

/// One validated chat turn, ready to be sent upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayRequest {
    pub system_prompt: String,
    pub user_message: String,
}

impl RelayRequest {
    /// Validates the raw inbound fields against the role table.
    pub fn new(
        roles: &RoleTable,
        role: Option<&str>,
        message: Option<&str>,
    ) -> Result<Self, RelayError> {
        let (role, message) = match (role, message) {
            (Some(role), Some(message)) if !role.is_empty() && !message.is_empty() => {
                (role, message)
            }
            _ => return Err(RelayError::MissingInput),
        };

        let system_prompt = roles.prompt_for(role).ok_or(RelayError::InvalidRole)?;

        Ok(RelayRequest {
            system_prompt: system_prompt.to_string(),
            user_message: message.to_string(),
        })
    }

    /// Validates a decoded inbound payload. Blank fields are missing input;
    /// a role that is not a string can never name a known role. A non-string
    /// message is forwarded as its JSON text.
    pub fn from_chat(roles: &RoleTable, payload: &ChatRequest) -> Result<Self, RelayError> {
        if is_blank(payload.role.as_ref()) || is_blank(payload.message.as_ref()) {
            return Err(RelayError::MissingInput);
        }

        let role = match &payload.role {
            Some(Value::String(role)) => role.as_str(),
            _ => return Err(RelayError::InvalidRole),
        };
        let message = match &payload.message {
            Some(Value::String(message)) => message.clone(),
            Some(other) => other.to_string(),
            None => return Err(RelayError::MissingInput),
        };

        Self::new(roles, Some(role), Some(&message))
    }

    pub fn to_body(&self, model: &str) -> CompletionRequest {
        CompletionRequest {
            model: model.to_string(),
            messages: vec![
                Message::system(&self.system_prompt),
                Message::user(&self.user_message),
            ],
            stream: true,
        }
    }
}

/// Client for the OpenAI-compatible completions endpoint.
#[derive(Debug, Clone)]
pub struct Upstream {
    client: Client,
    api_url: String,
    model: String,
    api_key: Option<String>,
}

impl Upstream {
    pub fn new(config: &RelayConfig) -> Result<Self, RelayError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.upstream_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| RelayError::Config(format!("http client: {}", e)))?;

        Ok(Upstream {
            client,
            api_url: config.api_url.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }

    /// Issues the streaming call and hands back the raw body stream.
    ///
    /// Fails before touching the network when no credential is configured.
    /// A non-success answer is logged with its body and returned as
    /// [`RelayError::Upstream`].
    pub async fn send_request(
        &self,
        request: &RelayRequest,
    ) -> Result<impl Stream<Item = reqwest::Result<Bytes>>, RelayError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(RelayError::MissingCredential)?;

        debug!("[UPSTREAM] POST {} model={}", self.api_url, self.model);

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(api_key)
            .json(&request.to_body(&self.model))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("[UPSTREAM] Groq API error {}: {}", status.as_u16(), body);
            return Err(RelayError::Upstream {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        Ok(response.bytes_stream())
    }
}
