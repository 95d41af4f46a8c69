//! Configuration for table resolution

use serde::{Deserialize, Serialize};

/// Namespace path of the item schema inside a table metadata document
pub const DEFAULT_SCHEMA_PATH: &str = "schema/items";

/// Table resolver configuration
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Slash separated path to the row schema, e.g. `schema/items`
    #[serde(default = "default_schema_path")]
    pub schema_path: String,
    /// Prefix generated option set names with the table name
    #[serde(default = "default_true")]
    pub scope_option_sets: bool,
}

fn default_schema_path() -> String {
    DEFAULT_SCHEMA_PATH.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            schema_path: default_schema_path(),
            scope_option_sets: true,
        }
    }
}

impl ResolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema_path(mut self, path: impl Into<String>) -> Self {
        self.schema_path = path.into();
        self
    }

    pub fn with_scoped_option_sets(mut self, scoped: bool) -> Self {
        self.scope_option_sets = scoped;
        self
    }

    /// Non-empty segments of [`schema_path`](Self::schema_path)
    pub fn schema_path_segments(&self) -> Vec<&str> {
        self.schema_path.split('/').filter(|s| !s.is_empty()).collect()
    }
}
