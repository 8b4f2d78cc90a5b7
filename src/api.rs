//! REST clients for the platform API and the darkroom training host.

pub mod auth;
pub mod brands;
pub mod darkroom;
pub mod images;
pub mod personas;
pub mod videos;

#[cfg(test)]
mod tests;

use crate::config::Profile;
use crate::errors::Error;
use crate::logging::*;
use anyhow::{Context, Result};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Platform responses wrap their payload in `{ "data": ... }`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

/// Status shared by image and video generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

impl GenerationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, GenerationStatus::Completed | GenerationStatus::Failed)
    }
}

impl fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            GenerationStatus::Pending => "pending",
            GenerationStatus::Processing => "processing",
            GenerationStatus::Completed => "completed",
            GenerationStatus::Failed => "failed",
            GenerationStatus::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

pub struct ApiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

// key withheld
impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key: api_key.into(),
        }
    }

    /// Fails with [`Error::NotAuthenticated`] when the profile has no key.
    pub fn for_profile(profile: &Profile) -> Result<Self, Error> {
        match profile.api_key.as_deref() {
            Some(key) if !key.is_empty() => Ok(Self::new(&profile.api_url, key)),
            _ => Err(Error::NotAuthenticated),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(Method::GET, path, None::<&()>).await
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        self.send(Method::POST, path, Some(body)).await
    }

    async fn send<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T> {
        let log = DEFAULT.new(o!(
            "function" => "ApiClient::send",
            "method" => method.to_string(),
            "path" => path.to_owned(),
        ));
        let url = format!("{}{}", self.base_url, path);
        let mut request: RequestBuilder = self
            .client
            .request(method, &url)
            .bearer_auth(&self.api_key);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;
        let status = response.status();
        debug!(log, "response"; "status" => status.as_u16());

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::api(error_message(status, &text), Some(status.as_u16())).into());
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .with_context(|| format!("unexpected response from {path}"))?;
        Ok(envelope.data)
    }
}

/// The server's `message` (or `error`) field, else the status reason.
fn error_message(status: StatusCode, body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: Option<serde_json::Value>,
        error: Option<String>,
    }

    let from_body = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|body| match body.message {
            Some(serde_json::Value::String(message)) => Some(message),
            Some(serde_json::Value::Array(messages)) => Some(
                messages
                    .iter()
                    .map(|m| m.as_str().map(str::to_owned).unwrap_or_else(|| m.to_string()))
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            _ => body.error,
        });
    from_body.unwrap_or_else(|| {
        format!(
            "API request failed: {} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or_default()
        )
    })
}
