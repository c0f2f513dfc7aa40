//! Device control-plane transports.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use shared::{
    domain::{CommandArg, CommandId},
    protocol::{command_path, DeviceStatus},
};
use thiserror::Error;
use tracing::debug;
use url::Url;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid device url '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {path} failed: {source}")]
    Request {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("device answered {path} with status {status}")]
    Status { path: String, status: StatusCode },
    #[error("malformed status body from {path}: {source}")]
    Body {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

/// Sends commands to the device and returns its reported status.
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    /// Issues a command (`POST`).
    async fn send(
        &self,
        command: &CommandId,
        arg: Option<&CommandArg>,
    ) -> Result<DeviceStatus, TransportError>;

    /// Reads state for a command without acting on it (`GET`).
    async fn query(&self, command: &CommandId) -> Result<DeviceStatus, TransportError>;
}

/// Transport for the device's REST endpoint.
pub struct HttpTransport {
    http: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let parsed = Url::parse(base_url).map_err(|source| TransportError::InvalidUrl {
            url: base_url.to_string(),
            source,
        })?;
        // The amplifier sits on the local network; system proxies never apply.
        let http = Client::builder()
            .timeout(timeout)
            .no_proxy()
            .build()
            .map_err(TransportError::Client)?;
        Ok(Self {
            http,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn decode(path: String, response: Response) -> Result<DeviceStatus, TransportError> {
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status { path, status });
        }
        response
            .json::<DeviceStatus>()
            .await
            .map_err(|source| TransportError::Body { path, source })
    }
}

#[async_trait]
impl DeviceTransport for HttpTransport {
    async fn send(
        &self,
        command: &CommandId,
        arg: Option<&CommandArg>,
    ) -> Result<DeviceStatus, TransportError> {
        let path = command_path(command, arg);
        debug!(%path, "device: POST");
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .send()
            .await
            .map_err(|source| TransportError::Request {
                path: path.clone(),
                source,
            })?;
        Self::decode(path, response).await
    }

    async fn query(&self, command: &CommandId) -> Result<DeviceStatus, TransportError> {
        let path = command_path(command, None);
        debug!(%path, "device: GET");
        let response = self
            .http
            .get(format!("{}{path}", self.base_url))
            .send()
            .await
            .map_err(|source| TransportError::Request {
                path: path.clone(),
                source,
            })?;
        Self::decode(path, response).await
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
