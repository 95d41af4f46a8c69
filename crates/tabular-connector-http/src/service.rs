//! Remote connector `TabularService`

use crate::config::RemoteServiceConfig;
use crate::transport::HttpTransport;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tabular_connector::{
    CancellationToken, CompatibilityMode, ConnectorError, ConnectorType, FetchContext,
    QueryParameters, RecordValue, Result, RowResult, TableParameters, TableResolver, TableValue,
    TabularService, Transport,
};
use tracing::{debug, info, warn};

/// One page of an OData items response
#[derive(Debug, Deserialize)]
struct ItemsPage {
    #[serde(default)]
    value: Vec<Value>,
    #[serde(rename = "@odata.nextLink", default)]
    next_link: Option<String>,
}

fn parse_page(body: &str) -> Result<ItemsPage> {
    serde_json::from_str(body)
        .map_err(|e| ConnectorError::Serialization(format!("invalid items page: {}", e)))
}

/// Table served by a remote connector over HTTP
pub struct RemoteTabularService {
    table: TableParameters,
    config: RemoteServiceConfig,
    transport: HttpTransport,
    connector_type: Option<Arc<ConnectorType>>,
}

impl RemoteTabularService {
    pub fn new(table: TableParameters, config: RemoteServiceConfig) -> Result<Self> {
        if config.max_pages == 0 {
            return Err(ConnectorError::invalid_configuration("max_pages must be positive"));
        }
        let transport = HttpTransport::new(&config)?;

        Ok(Self {
            table,
            config,
            transport,
            connector_type: None,
        })
    }

    /// Fetch and resolve the table schema, returning an initialized table
    ///
    /// Fields that fail to resolve are degraded and reported through
    /// [`TableValue::resolution_errors`]; only a table without any usable
    /// field is rejected. The returned service keeps the resolved connector
    /// type so callers can inspect display names and keys through
    /// [`TabularService::connector_schema`].
    pub async fn connect(
        table: TableParameters,
        config: RemoteServiceConfig,
        resolver: &TableResolver,
        mode: CompatibilityMode,
        cancel: &CancellationToken,
    ) -> Result<TableValue> {
        let mut service = Self::new(table, config)?;
        let resolved = resolver.resolve_for_service(&service, mode, cancel).await?;
        service.connector_type = Some(resolved.connector_type.clone());

        info!(
            "Connected to {} at {} ({} field(s), mode {})",
            service.table,
            service.transport.base_url(),
            resolved.record_type().len(),
            mode
        );
        TableValue::from_resolved(Arc::new(service), &resolved)
    }

    pub fn config(&self) -> &RemoteServiceConfig {
        &self.config
    }

    fn table_path(&self) -> String {
        format!(
            "datasets/{}/tables/{}",
            urlencoding::encode(&self.table.dataset),
            urlencoding::encode(&self.table.table)
        )
    }

    fn metadata_path(&self) -> String {
        format!("/$metadata.json/{}", self.table_path())
    }

    fn items_path(&self) -> String {
        format!("/{}/items", self.table_path())
    }

    async fn get(
        &self,
        path_or_url: &str,
        query: &[(String, String)],
        cancel: &CancellationToken,
    ) -> Result<String> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ConnectorError::Cancelled),
            body = self.transport.get_text(path_or_url, query) => body,
        }
    }
}

#[async_trait]
impl TabularService for RemoteTabularService {
    fn service_type(&self) -> &'static str {
        "http"
    }

    fn table(&self) -> &TableParameters {
        &self.table
    }

    fn is_delegable(&self) -> bool {
        self.config.delegable
    }

    fn connector_schema(&self) -> Option<&ConnectorType> {
        self.connector_type.as_deref()
    }

    fn transport(&self) -> Option<&dyn Transport> {
        Some(&self.transport)
    }

    async fn load_schema_source(&self, cancel: &CancellationToken) -> Result<Option<String>> {
        if cancel.is_cancelled() {
            return Err(ConnectorError::Cancelled);
        }
        debug!("Loading table metadata for {}", self.table);
        self.get(&self.metadata_path(), &[], cancel).await.map(Some)
    }

    async fn fetch_rows(
        &self,
        context: &FetchContext,
        query: &QueryParameters,
        cancel: &CancellationToken,
    ) -> Result<Vec<RowResult>> {
        let mut link = self.items_path();
        let mut params = if self.config.delegable {
            query.to_odata_pairs()
        } else {
            Vec::new()
        };
        let mut rows = Vec::new();

        for page in 0..self.config.max_pages {
            if cancel.is_cancelled() {
                return Err(ConnectorError::Cancelled);
            }

            let fetched = self
                .get(&link, &params, cancel)
                .await
                .and_then(|body| parse_page(&body));
            let items = match fetched {
                Ok(items) => items,
                Err(e) if page == 0 || e.is_cancelled() => return Err(e),
                Err(e) => {
                    warn!(
                        "Page {} of {} failed [{}]: {}",
                        page + 1,
                        self.table,
                        context.correlation_id,
                        e
                    );
                    rows.push(Err(e));
                    return Ok(rows);
                }
            };

            rows.extend(
                items
                    .value
                    .iter()
                    .map(|row| RecordValue::from_json(row, &context.record_type)),
            );

            match items.next_link {
                Some(next) => {
                    link = next;
                    params.clear();
                }
                None => {
                    debug!(
                        "Fetched {} row(s) in {} page(s) from {} [{}]",
                        rows.len(),
                        page + 1,
                        self.table,
                        context.correlation_id
                    );
                    return Ok(rows);
                }
            }
        }

        warn!(
            "Stopped paging {} after {} page(s) [{}]",
            self.table, self.config.max_pages, context.correlation_id
        );
        rows.push(Err(ConnectorError::remote(format!(
            "page limit of {} reached before the end of {}",
            self.config.max_pages, self.table
        ))));
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(table: TableParameters) -> RemoteTabularService {
        RemoteTabularService::new(table, RemoteServiceConfig::new("http://localhost:1")).unwrap()
    }

    #[test]
    fn test_paths_encode_segments() {
        let remote = service(TableParameters::new("default", "Sales Orders"));
        assert_eq!(
            remote.metadata_path(),
            "/$metadata.json/datasets/default/tables/Sales%20Orders"
        );
        assert_eq!(remote.items_path(), "/datasets/default/tables/Sales%20Orders/items");
    }

    #[test]
    fn test_zero_max_pages_rejected() {
        let result = RemoteTabularService::new(
            TableParameters::new("default", "t"),
            RemoteServiceConfig::new("http://localhost:1").with_max_pages(0),
        );
        assert!(matches!(result, Err(ConnectorError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_page_parsing() {
        let page = parse_page(r#"{ "value": [{ "a": 1 }], "@odata.nextLink": "http://x/next" }"#).unwrap();
        assert_eq!(page.value.len(), 1);
        assert_eq!(page.next_link.as_deref(), Some("http://x/next"));

        let last = parse_page(r#"{ "value": [] }"#).unwrap();
        assert!(last.value.is_empty());
        assert!(last.next_link.is_none());

        assert!(matches!(parse_page("[1, 2]"), Err(ConnectorError::Serialization(_))));
    }

    #[test]
    fn test_service_shape() {
        let remote = service(TableParameters::new("default", "t"));
        assert_eq!(remote.service_type(), "http");
        assert!(remote.is_delegable());
        assert!(remote.connector_schema().is_none());
        assert_eq!(remote.transport().unwrap().base_url(), "http://localhost:1");
    }
}
