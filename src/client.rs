//! Client side of the relay, used by the `chat` binary.

use std::env;

use futures_util::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::data::RoleTable;
use crate::models::{ChatRequest, ErrorBody};

pub const DEFAULT_RELAY_URL: &str = "http://127.0.0.1:3000";

#[derive(Error, Debug)]
pub enum ClientError {
    /// The relay answered with an error status before streaming
    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The stream broke after it had started
    #[error("stream aborted: {0}")]
    Aborted(String),
}

#[derive(Deserialize)]
struct RolesBody {
    roles: Vec<String>,
}

/// Decodes UTF-8 across chunk boundaries, holding back an incomplete
/// trailing sequence until the next chunk completes it.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut out = String::new();

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    return out;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    // valid_up_to always lands on a char boundary
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + bad);
                        }
                        None => {
                            self.pending.drain(..valid);
                            return out;
                        }
                    }
                }
            }
        }
    }

    /// Flushes whatever is left at end of stream.
    pub fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}

pub struct RelayClient {
    client: Client,
    base_url: String,
}

impl RelayClient {
    pub fn new(base_url: &str) -> Self {
        RelayClient {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_env() -> Self {
        let url = env::var("CHAT_RELAY_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_RELAY_URL.to_string());
        Self::new(&url)
    }

    /// Roles offered by the relay, or the built-in table when it cannot be asked.
    pub async fn roles(&self) -> Vec<String> {
        let fetched = async {
            let response = self
                .client
                .get(format!("{}/api/roles", self.base_url))
                .send()
                .await?
                .error_for_status()?;
            Ok::<_, reqwest::Error>(response.json::<RolesBody>().await?)
        }
        .await;

        match fetched {
            Ok(body) if !body.roles.is_empty() => body.roles,
            _ => RoleTable::default().names(),
        }
    }

    /// Sends one turn and returns the reply as a stream of text fragments.
    pub async fn send_message(
        &self,
        role: &str,
        message: &str,
    ) -> Result<ReceiverStream<Result<String, ClientError>>, ClientError> {
        let request = ChatRequest::new(role, message);

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|e| e.error)
                .unwrap_or_else(|_| format!("HTTP error! status: {}", status.as_u16()));
            return Err(ClientError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let (tx, rx) = mpsc::channel(100);
        let mut stream = response.bytes_stream();

        tokio::spawn(async move {
            let mut decoder = Utf8Decoder::default();
            while let Some(item) = stream.next().await {
                match item {
                    Ok(chunk) => {
                        let text = decoder.decode(&chunk);
                        if !text.is_empty() && tx.send(Ok(text)).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(ClientError::Aborted(e.to_string()))).await;
                        return;
                    }
                }
            }
            let rest = decoder.finish();
            if !rest.is_empty() {
                let _ = tx.send(Ok(rest)).await;
            }
        });

        Ok(ReceiverStream::new(rx))
    }
}
