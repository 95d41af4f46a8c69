use crate::error::Result;
use crate::query::QueryParameters;
use crate::types::{ConnectorType, RecordType, TableParameters};
use crate::value::RowResult;
use async_trait::async_trait;
use downcast_rs::{impl_downcast, DowncastSync};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Minimal network client a remote source needs
#[async_trait]
pub trait Transport: Send + Sync {
    /// Base URL requests are resolved against
    fn base_url(&self) -> &str;

    /// GET `path_or_url` and return the response body
    ///
    /// Absolute URLs (such as OData next links) are used as-is.
    async fn get_text(&self, path_or_url: &str, query: &[(String, String)]) -> Result<String>;
}

/// Per-request inputs for a row fetch
#[derive(Debug, Clone)]
pub struct FetchContext {
    /// Record type rows are converted to
    pub record_type: Arc<RecordType>,
    /// Correlates log lines and remote requests of one fetch
    pub correlation_id: Uuid,
}

impl FetchContext {
    pub fn new(record_type: Arc<RecordType>) -> Self {
        Self {
            record_type,
            correlation_id: Uuid::new_v4(),
        }
    }
}

/// One concrete tabular data source
///
/// Optional capabilities have no-op defaults so a local source only has to
/// say how it produces rows.
#[async_trait]
pub trait TabularService: DowncastSync {
    /// Get the type name of this service
    fn service_type(&self) -> &'static str;

    /// Table this service reads
    fn table(&self) -> &TableParameters;

    /// Whether filter/sort/top may be pushed to the source; fixed per instance
    fn is_delegable(&self) -> bool;

    /// Schema descriptor the service was built from
    fn connector_schema(&self) -> Option<&ConnectorType> {
        None
    }

    /// Network client, for services that have one
    fn transport(&self) -> Option<&dyn Transport> {
        None
    }

    /// Raw table schema document, when the service can fetch one
    async fn load_schema_source(&self, _cancel: &CancellationToken) -> Result<Option<String>> {
        Ok(None)
    }

    /// Fetch rows in source order
    ///
    /// Implementations check `cancel` before any I/O and between pages and
    /// return [`ConnectorError::Cancelled`](crate::ConnectorError::Cancelled)
    /// when it fires. An empty table is `Ok(vec![])`; per-row failures are
    /// inline `Err` entries.
    async fn fetch_rows(
        &self,
        context: &FetchContext,
        query: &QueryParameters,
        cancel: &CancellationToken,
    ) -> Result<Vec<RowResult>>;
}

impl_downcast!(sync TabularService);
