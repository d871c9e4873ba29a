// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Keel Authors

//! JSON-over-HTTP management API client.
//!
//! | Operation          | Request                  |
//! |--------------------|--------------------------|
//! | `machine_status`   | `GET  /v1/machine/status`|
//! | `etcd_member_list` | `GET  /v1/etcd/members`  |
//! | `bootstrap`        | `POST /v1/bootstrap`     |
//! | `reset`            | `POST /v1/reset`         |
//!
//! [`HttpConnector::connect`] opens a TCP connection to the node within the
//! request timeout and drops it again, so an unreachable node fails there
//! with [`ConnectionError::Unreachable`]. Each handle builds its own client
//! with idle pooling disabled, so dropping the handle closes its connections.

use async_trait::async_trait;
use keel_core::{ApiConfig, NodeStatus};
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::trace;

use crate::client::{EtcdMemberListResponse, MachineClient, NodeConnector, ResetRequest};
use crate::error::{ApiError, ConnectionError};

const STATUS_PATH: &str = "/v1/machine/status";
const MEMBERS_PATH: &str = "/v1/etcd/members";
const BOOTSTRAP_PATH: &str = "/v1/bootstrap";
const RESET_PATH: &str = "/v1/reset";

/// Opens HTTP handles to node management APIs.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    config: ApiConfig,
}

impl HttpConnector {
    /// Creates a connector from the `[api]` configuration.
    #[must_use]
    pub fn new(config: ApiConfig) -> Self {
        Self { config }
    }

    fn base_url(&self, host: &str) -> Result<Url, ConnectionError> {
        let invalid = |message: String| ConnectionError::InvalidAddress {
            host: host.to_string(),
            message,
        };

        if host.trim().is_empty() {
            return Err(invalid("empty host".to_string()));
        }

        let url = Url::parse(&format!("{}://{}", self.config.scheme, host))
            .map_err(|e| invalid(e.to_string()))?;
        if url.host_str().is_none() {
            return Err(invalid("no host in address".to_string()));
        }

        if url.port_or_known_default().is_none() {
            return Err(invalid(format!("no port for scheme {}", self.config.scheme)));
        }

        Ok(url)
    }

    /// Opens and drops a TCP connection to the API address.
    async fn check_reachable(&self, host: &str, url: &Url) -> Result<(), ConnectionError> {
        let unreachable = |message: String| ConnectionError::Unreachable {
            host: host.to_string(),
            message,
        };

        // Bracketed IPv6 literals must be bare for address parsing
        let name = url.host_str().unwrap_or_default().trim_start_matches('[').trim_end_matches(']');
        let port = url.port_or_known_default().unwrap_or_default();
        let limit = self.config.request_timeout();

        match timeout(limit, TcpStream::connect((name, port))).await {
            Ok(Ok(_stream)) => Ok(()),
            Ok(Err(e)) => Err(unreachable(e.to_string())),
            Err(_) => Err(unreachable(format!("connect timed out after {limit:?}"))),
        }
    }
}

#[async_trait]
impl NodeConnector for HttpConnector {
    async fn connect(&self, host: &str) -> Result<Box<dyn MachineClient>, ConnectionError> {
        let base = self.base_url(host)?;
        self.check_reachable(host, &base).await?;

        let client = Client::builder()
            .timeout(self.config.request_timeout())
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| ConnectionError::Unreachable {
                host: host.to_string(),
                message: e.to_string(),
            })?;

        trace!(node = %host, url = %base, "Opened management API handle");
        Ok(Box::new(HttpMachineClient { client, base }))
    }
}

/// Handle to one node's HTTP management API.
#[derive(Debug)]
pub struct HttpMachineClient {
    client: Client,
    base: Url,
}

impl HttpMachineClient {
    fn url(&self, path: &str) -> Result<Url, ApiError> {
        self.base.join(path).map_err(|e| ApiError::Transport(e.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self
            .client
            .get(self.url(path)?)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let response = check_status(response).await?;
        response.json::<T>().await.map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: Option<&B>) -> Result<(), ApiError> {
        let mut request = self.client.post(self.url(path)?);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| ApiError::Transport(e.to_string()))?;
        check_status(response).await?;
        Ok(())
    }
}

async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = if body.trim().is_empty() {
        status.canonical_reason().unwrap_or("unknown status").to_string()
    } else {
        body.trim().to_string()
    };

    Err(ApiError::Status { code: status.as_u16(), message })
}

#[async_trait]
impl MachineClient for HttpMachineClient {
    async fn etcd_member_list(&self) -> Result<EtcdMemberListResponse, ApiError> {
        self.get_json(MEMBERS_PATH).await
    }

    async fn bootstrap(&self) -> Result<(), ApiError> {
        self.post::<()>(BOOTSTRAP_PATH, None).await
    }

    async fn reset(&self, request: &ResetRequest) -> Result<(), ApiError> {
        self.post(RESET_PATH, Some(request)).await
    }

    async fn machine_status(&self) -> Result<NodeStatus, ApiError> {
        self.get_json(STATUS_PATH).await
    }
}
