//! reqwest-backed `Transport`

use crate::config::RemoteServiceConfig;
use crate::error::HttpError;
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tabular_connector::{Result, Transport};
use tracing::{debug, warn};

/// HTTP client bound to one connector endpoint
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    api_version: String,
    headers: HashMap<String, String>,
}

impl HttpTransport {
    pub fn new(config: &RemoteServiceConfig) -> std::result::Result<Self, HttpError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            headers: config.headers.clone(),
        })
    }

    /// Absolute request URL for a path or an already absolute link
    pub fn url_for(&self, path_or_url: &str) -> String {
        if path_or_url.starts_with("http://") || path_or_url.starts_with("https://") {
            path_or_url.to_string()
        } else if path_or_url.starts_with('/') {
            format!("{}{}", self.base_url, path_or_url)
        } else {
            format!("{}/{}", self.base_url, path_or_url)
        }
    }

    async fn request(
        &self,
        path_or_url: &str,
        query: &[(String, String)],
    ) -> std::result::Result<String, HttpError> {
        let url = self.url_for(path_or_url);
        debug!("GET {}", url);

        let mut request = self.client.get(&url).header("Accept", "application/json");
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        // Next links already carry every option the server wants back
        if !url.contains("api-version=") {
            request = request.query(&[("api-version", self.api_version.as_str())]);
        }
        if !query.is_empty() {
            request = request.query(query);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("GET {} returned {}", url, status);
            return Err(HttpError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_text(&self, path_or_url: &str, query: &[(String, String)]) -> Result<String> {
        Ok(self.request(path_or_url, query).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_for() {
        let transport = HttpTransport::new(&RemoteServiceConfig::new("http://localhost:9000/apim/")).unwrap();
        assert_eq!(transport.base_url(), "http://localhost:9000/apim");
        assert_eq!(
            transport.url_for("/datasets/default/tables"),
            "http://localhost:9000/apim/datasets/default/tables"
        );
        assert_eq!(transport.url_for("datasets"), "http://localhost:9000/apim/datasets");
        assert_eq!(
            transport.url_for("https://other/items?$skiptoken=2"),
            "https://other/items?$skiptoken=2"
        );
    }
}
