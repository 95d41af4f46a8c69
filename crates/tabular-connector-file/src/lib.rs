//! Local file-backed implementation of the tabular-connector `TabularService`
//!
//! Rows are read from a JSON array file or a JSON Lines file (`.jsonl` /
//! `.ndjson`). The source never delegates: every query gets the complete row
//! set and the caller applies the residual locally.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tabular_connector::{FormulaType, RecordType, TableParameters, TableValue};
//! use tabular_connector_file::{FileServiceConfig, FileTabularService};
//!
//! # async fn example() -> tabular_connector::Result<()> {
//! let service = FileTabularService::open(
//!     TableParameters::new("local", "people"),
//!     FileServiceConfig::new("people.json"),
//! )
//! .await?;
//!
//! let table = TableValue::new(Arc::new(service));
//! table.set_record_type(RecordType::new().with_field("name", FormulaType::Text))?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tabular_connector::{
    CancellationToken, ConnectorError, FetchContext, QueryParameters, RecordValue, Result,
    RowResult, TableParameters, TabularService,
};
use tracing::{debug, warn};

fn default_page_size() -> usize {
    100
}

/// File source configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileServiceConfig {
    /// Row data file
    pub path: PathBuf,
    /// Optional table metadata document served as the schema source
    #[serde(default)]
    pub schema_path: Option<PathBuf>,
    /// Rows converted between cancellation checks
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl FileServiceConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            schema_path: None,
            page_size: default_page_size(),
        }
    }

    pub fn with_schema_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.schema_path = Some(path.into());
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }
}

/// Local JSON file data source
pub struct FileTabularService {
    table: TableParameters,
    config: FileServiceConfig,
}

impl FileTabularService {
    /// Open a file source; fails with `NotFound` when a configured file is missing
    pub async fn open(table: TableParameters, config: FileServiceConfig) -> Result<Self> {
        if config.page_size == 0 {
            return Err(ConnectorError::invalid_configuration("page_size must be positive"));
        }

        ensure_file(&config.path).await?;
        if let Some(schema_path) = &config.schema_path {
            ensure_file(schema_path).await?;
        }

        debug!("Opened file source {} for {}", config.path.display(), table);
        Ok(Self { table, config })
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    fn is_json_lines(&self) -> bool {
        matches!(
            self.config.path.extension().and_then(|e| e.to_str()),
            Some("jsonl") | Some("ndjson")
        )
    }

    async fn read(&self, path: &Path, cancel: &CancellationToken) -> Result<String> {
        tokio::select! {
            _ = cancel.cancelled() => Err(ConnectorError::Cancelled),
            read = tokio::fs::read_to_string(path) => read.map_err(|e| {
                warn!("Failed to read {}: {}", path.display(), e);
                io_error(path, e)
            }),
        }
    }

    /// Raw row values; unparsable JSON Lines entries become inline errors
    fn parse_rows(&self, text: &str) -> Result<Vec<std::result::Result<Value, ConnectorError>>> {
        if self.is_json_lines() {
            return Ok(text
                .lines()
                .enumerate()
                .filter(|(_, line)| !line.trim().is_empty())
                .map(|(number, line)| {
                    serde_json::from_str(line).map_err(|e| {
                        ConnectorError::Serialization(format!("line {}: {}", number + 1, e))
                    })
                })
                .collect());
        }

        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str::<Value>(text)? {
            Value::Array(rows) => Ok(rows.into_iter().map(Ok).collect()),
            other => Err(ConnectorError::Serialization(format!(
                "{} must contain a JSON array, found {}",
                self.config.path.display(),
                if other.is_object() { "an object" } else { "a scalar" }
            ))),
        }
    }
}

async fn ensure_file(path: &Path) -> Result<()> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(()),
        Ok(_) => Err(ConnectorError::not_found(format!("{} is not a file", path.display()))),
        Err(e) => Err(io_error(path, e)),
    }
}

fn io_error(path: &Path, err: std::io::Error) -> ConnectorError {
    if err.kind() == std::io::ErrorKind::NotFound {
        ConnectorError::not_found(path.display().to_string())
    } else {
        ConnectorError::Internal(format!("{}: {}", path.display(), err))
    }
}

#[async_trait]
impl TabularService for FileTabularService {
    fn service_type(&self) -> &'static str {
        "file"
    }

    fn table(&self) -> &TableParameters {
        &self.table
    }

    fn is_delegable(&self) -> bool {
        false
    }

    async fn load_schema_source(&self, cancel: &CancellationToken) -> Result<Option<String>> {
        match &self.config.schema_path {
            Some(path) => self.read(path, cancel).await.map(Some),
            None => Ok(None),
        }
    }

    async fn fetch_rows(
        &self,
        context: &FetchContext,
        query: &QueryParameters,
        cancel: &CancellationToken,
    ) -> Result<Vec<RowResult>> {
        if cancel.is_cancelled() {
            return Err(ConnectorError::Cancelled);
        }
        if !query.is_empty() {
            debug!("File source ignores delegated query for {}", self.table);
        }

        let text = self.read(&self.config.path, cancel).await?;
        let raw_rows = self.parse_rows(&text)?;

        let mut rows = Vec::with_capacity(raw_rows.len());
        for page in raw_rows.chunks(self.config.page_size) {
            if cancel.is_cancelled() {
                return Err(ConnectorError::Cancelled);
            }
            rows.extend(page.iter().map(|raw| match raw {
                Ok(value) => RecordValue::from_json(value, &context.record_type),
                Err(e) => Err(e.clone()),
            }));
            // Cancellation point between chunks
            tokio::task::yield_now().await;
        }

        debug!(
            "Read {} row(s) from {} [{}]",
            rows.len(),
            self.config.path.display(),
            context.correlation_id
        );
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config: FileServiceConfig = serde_json::from_str(r#"{ "path": "rows.json" }"#).unwrap();
        assert_eq!(config.page_size, 100);
        assert_eq!(config.schema_path, None);
        assert_eq!(config, FileServiceConfig::new("rows.json"));
    }

    #[tokio::test]
    async fn test_zero_page_size_rejected() {
        let result = FileTabularService::open(
            TableParameters::new("local", "t"),
            FileServiceConfig::new("whatever.json").with_page_size(0),
        )
        .await;
        assert!(matches!(result, Err(ConnectorError::InvalidConfiguration(_))));
    }
}
