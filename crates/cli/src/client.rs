//! REST client for the LwM2M server and bootstrap server demo APIs

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, info};

use lwm2m_console_common::objects::{ObjectModel, ObjectSpecSource};
use lwm2m_console_common::types::{BootstrapConfig, ReadResponse, Registration};
use lwm2m_console_common::Lwm2mPath;

/// HTTP-level failures
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{url} answered {status}: {body}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Client for the server and bootstrap server REST APIs
pub struct ConsoleClient {
    http: Client,
    server_url: String,
    bootstrap_url: String,
}

impl ConsoleClient {
    pub fn new(server_url: &str, bootstrap_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            http,
            server_url: server_url.trim_end_matches('/').to_string(),
            bootstrap_url: bootstrap_url.trim_end_matches('/').to_string(),
        })
    }

    // Bootstrap server

    /// All bootstrap configurations, keyed by endpoint
    pub async fn list_bootstrap_configs(&self) -> Result<BTreeMap<String, BootstrapConfig>> {
        let url = format!("{}/api/bootstrap", self.bootstrap_url);
        self.get_json(&url).await
    }

    /// Bootstrap configuration of one endpoint, if any
    pub async fn get_bootstrap_config(&self, endpoint: &str) -> Result<Option<BootstrapConfig>> {
        Ok(self.list_bootstrap_configs().await?.remove(endpoint))
    }

    /// Store the configuration of an endpoint, replacing any previous one
    pub async fn put_bootstrap_config(
        &self,
        endpoint: &str,
        config: &BootstrapConfig,
    ) -> Result<()> {
        let url = endpoint_url(&self.bootstrap_url, "api/bootstrap", endpoint);
        info!(endpoint, "storing bootstrap configuration");
        let response = self
            .http
            .post(&url)
            .json(config)
            .send()
            .await
            .map_err(ClientError::from)?;
        check(&url, response).await?;
        Ok(())
    }

    pub async fn delete_bootstrap_config(&self, endpoint: &str) -> Result<()> {
        let url = endpoint_url(&self.bootstrap_url, "api/bootstrap", endpoint);
        info!(endpoint, "deleting bootstrap configuration");
        let response = self.http.delete(&url).send().await.map_err(ClientError::from)?;
        check(&url, response).await?;
        Ok(())
    }

    // LwM2M server

    /// Registered clients
    pub async fn list_clients(&self) -> Result<Vec<Registration>> {
        let url = format!("{}/api/clients", self.server_url);
        self.get_json(&url).await
    }

    pub async fn get_client(&self, endpoint: &str) -> Result<Registration> {
        let url = endpoint_url(&self.server_url, "api/clients", endpoint);
        self.get_json(&url).await
    }

    pub async fn object_specs(&self, endpoint: &str) -> Result<Vec<ObjectModel>> {
        let url = endpoint_url(&self.server_url, "api/objectspecs", endpoint);
        self.get_json(&url).await
    }

    /// Read a node on a registered client
    pub async fn read(&self, endpoint: &str, path: &Lwm2mPath) -> Result<ReadResponse> {
        let url = format!(
            "{}{}",
            endpoint_url(&self.server_url, "api/clients", endpoint),
            path
        );
        self.get_json(&url).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!(url, "GET");
        let response = self.http.get(url).send().await.map_err(ClientError::from)?;
        let response = check(url, response).await?;
        response
            .json::<T>()
            .await
            .with_context(|| format!("decoding response of {}", url))
    }
}

async fn check(url: &str, response: Response) -> std::result::Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Status {
        url: url.to_string(),
        status,
        body,
    })
}

/// `{base}/{resource}/{endpoint}` with the endpoint URL-encoded
pub fn endpoint_url(base: &str, resource: &str, endpoint: &str) -> String {
    format!(
        "{}/{}/{}",
        base.trim_end_matches('/'),
        resource,
        urlencoding::encode(endpoint)
    )
}

#[async_trait]
impl ObjectSpecSource for ConsoleClient {
    async fn fetch_object_specs(
        &self,
        endpoint: &str,
    ) -> lwm2m_console_common::Result<Vec<ObjectModel>> {
        self.object_specs(endpoint)
            .await
            .map_err(|e| lwm2m_console_common::Error::ObjectSpecUnavailable {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url_encoding() {
        assert_eq!(
            endpoint_url("http://localhost:8081/", "api/bootstrap", "urn:imei:123 456"),
            "http://localhost:8081/api/bootstrap/urn%3Aimei%3A123%20456"
        );
    }

    #[tokio::test]
    async fn test_client_trims_base_urls() {
        let client =
            ConsoleClient::new("http://srv/", "http://bs//", Duration::from_secs(1)).unwrap();
        assert_eq!(client.server_url, "http://srv");
        assert_eq!(client.bootstrap_url, "http://bs");
    }
}
