//! Remote connector configuration

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_API_VERSION: &str = "2015-09-01";

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_pages() -> usize {
    1000
}

fn default_true() -> bool {
    true
}

/// Configuration for a remote connector-backed table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteServiceConfig {
    /// Connector endpoint, e.g. `https://host/apim/sql/connection-id`
    pub base_url: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Upper bound on followed `@odata.nextLink` pages per fetch
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    /// Whether the source accepts delegated queries
    #[serde(default = "default_true")]
    pub delegable: bool,
    /// Extra headers sent with every request
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl RemoteServiceConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_version: default_api_version(),
            timeout_secs: default_timeout_secs(),
            max_pages: default_max_pages(),
            delegable: true,
            headers: HashMap::new(),
        }
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_max_pages(mut self, pages: usize) -> Self {
        self.max_pages = pages;
        self
    }

    pub fn with_delegable(mut self, delegable: bool) -> Self {
        self.delegable = delegable;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}
