//! Table-level schema resolution
//!
//! [`TableResolver`] turns a table metadata document (CDP shape: item schema
//! under `schema/items`, capabilities under `x-ms-capabilities`) into a
//! [`ResolvedTable`]. Errors are attached to the result instead of being
//! returned, so one broken table never fails unrelated callers.

use crate::cache::{CacheKey, MetadataCache};
use crate::compatibility::CompatibilityMode;
use crate::config::ResolverConfig;
use crate::error::{ConnectorError, Result};
use crate::option_set::OptionSetRegistry;
use crate::resolver::SchemaTypeResolver;
use crate::schema::SchemaNode;
use crate::traits::TabularService;
use crate::types::{
    ConnectorType, DelegationCapabilities, FormulaType, RecordType, RecordTypeBinding,
    TableParameters,
};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Result of resolving one table
#[derive(Debug, Clone)]
pub struct ResolvedTable {
    pub binding: RecordTypeBinding,
    pub connector_type: Arc<ConnectorType>,
    pub capabilities: DelegationCapabilities,
    /// Table title from the metadata document
    pub display_name: Option<String>,
    /// Table- and field-level problems; check before trusting the type
    pub errors: Vec<ConnectorError>,
}

impl ResolvedTable {
    fn failed(table: &TableParameters, error: ConnectorError) -> Self {
        Self {
            binding: RecordTypeBinding::new(table.clone(), RecordType::new(), Vec::new()),
            connector_type: Arc::new(ConnectorType::new(
                table.table.clone(),
                FormulaType::Record(RecordType::new()),
            )),
            capabilities: DelegationCapabilities::none(),
            display_name: None,
            errors: vec![error],
        }
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn record_type(&self) -> &Arc<RecordType> {
        self.binding.record_type()
    }

    /// First error, if any
    pub fn ensure_clean(&self) -> Result<()> {
        match self.errors.first() {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn without_delegation(&self) -> Self {
        Self {
            capabilities: DelegationCapabilities::none(),
            ..self.clone()
        }
    }
}

pub struct TableResolver {
    registry: Arc<OptionSetRegistry>,
    cache: Option<Arc<dyn MetadataCache>>,
    config: ResolverConfig,
}

impl TableResolver {
    pub fn new(registry: Arc<OptionSetRegistry>) -> Self {
        Self {
            registry,
            cache: None,
            config: ResolverConfig::default(),
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn MetadataCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(&self) -> &Arc<OptionSetRegistry> {
        &self.registry
    }

    /// Resolve a table from its raw metadata document
    pub async fn resolve_table(
        &self,
        table: &TableParameters,
        raw_schema: &str,
        mode: CompatibilityMode,
    ) -> Arc<ResolvedTable> {
        let key = CacheKey::new(table, mode);

        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(&key).await {
                debug!("Metadata cache hit for {}", key);
                return hit;
            }
            debug!("Metadata cache miss for {}", key);
        }

        let resolved = Arc::new(self.resolve_uncached(table, raw_schema, mode));

        match &self.cache {
            Some(cache) if resolved.is_clean() => cache.insert_if_absent(key, resolved).await,
            _ => resolved,
        }
    }

    /// Load the schema document from `service` and resolve it
    ///
    /// A service that is not delegable always yields empty capabilities.
    pub async fn resolve_for_service(
        &self,
        service: &dyn TabularService,
        mode: CompatibilityMode,
        cancel: &CancellationToken,
    ) -> Result<Arc<ResolvedTable>> {
        if cancel.is_cancelled() {
            return Err(ConnectorError::Cancelled);
        }

        let raw = service.load_schema_source(cancel).await?.ok_or_else(|| {
            ConnectorError::not_found(format!(
                "{} service has no schema source for {}",
                service.service_type(),
                service.table()
            ))
        })?;

        let resolved = self.resolve_table(service.table(), &raw, mode).await;
        if !service.is_delegable() && !resolved.capabilities.is_empty() {
            return Ok(Arc::new(resolved.without_delegation()));
        }
        Ok(resolved)
    }

    fn resolve_uncached(
        &self,
        table: &TableParameters,
        raw_schema: &str,
        mode: CompatibilityMode,
    ) -> ResolvedTable {
        let document: Value = match serde_json::from_str(raw_schema) {
            Ok(doc) => doc,
            Err(e) => {
                warn!("Table {} has malformed schema source: {}", table, e);
                return ResolvedTable::failed(
                    table,
                    ConnectorError::schema(format!("malformed schema source for {}: {}", table, e)),
                );
            }
        };

        let item_schema = match self.locate_item_schema(&document) {
            Some(schema) => schema,
            None => {
                warn!("Table {} has no schema at '{}'", table, self.config.schema_path);
                return ResolvedTable::failed(
                    table,
                    ConnectorError::schema(format!(
                        "no item schema at '{}' for {}",
                        self.config.schema_path, table
                    )),
                );
            }
        };

        let node = match SchemaNode::from_json(item_schema) {
            Ok(node) => node,
            Err(e) => return ResolvedTable::failed(table, e),
        };

        let mut resolver = SchemaTypeResolver::new(mode, &self.registry);
        if self.config.scope_option_sets {
            resolver = resolver.with_scope(table.table.clone());
        }
        let resolution = resolver.resolve(&table.table, &node);

        let record_type = resolution
            .connector_type
            .record_type()
            .cloned()
            .unwrap_or_default();
        let mut errors = resolution.errors;
        if resolution.connector_type.record_type().is_none() {
            errors.push(ConnectorError::schema(format!(
                "item schema of {} is not an object",
                table
            )));
        }

        let primary_keys = primary_keys(table, &resolution.connector_type);
        let capabilities = parse_capabilities(&document);
        let display_name = document
            .get("title")
            .or_else(|| document.get("x-ms-display-name"))
            .and_then(Value::as_str)
            .map(str::to_string);

        info!(
            "Resolved table {} under {} mode: {} field(s), {} error(s)",
            table,
            mode,
            record_type.len(),
            errors.len()
        );

        ResolvedTable {
            binding: RecordTypeBinding::new(table.clone(), record_type, primary_keys),
            connector_type: Arc::new(resolution.connector_type),
            capabilities,
            display_name,
            errors,
        }
    }

    fn locate_item_schema<'a>(&self, document: &'a Value) -> Option<&'a Value> {
        let nested = self
            .config
            .schema_path_segments()
            .into_iter()
            .try_fold(document, |node, segment| node.get(segment));

        match nested {
            Some(schema) => Some(schema),
            None if document.get("properties").is_some() => Some(document),
            None => None,
        }
    }
}

/// Explicit keys win; otherwise `x-ms-keyType: primary` fields by key order
fn primary_keys(table: &TableParameters, connector_type: &ConnectorType) -> Vec<String> {
    if !table.primary_keys.is_empty() {
        return table.primary_keys.clone();
    }

    let mut keys: Vec<&ConnectorType> = connector_type.fields().iter().filter(|f| f.is_key()).collect();
    keys.sort_by_key(|f| f.key_order().unwrap_or(u32::MAX));
    keys.into_iter().map(|f| f.name().to_string()).collect()
}

/// Read `x-ms-capabilities` from the document root or its `schema` object
pub fn parse_capabilities(document: &Value) -> DelegationCapabilities {
    let capabilities = document
        .get("x-ms-capabilities")
        .or_else(|| document.get("schema").and_then(|s| s.get("x-ms-capabilities")))
        .and_then(Value::as_object);

    let Some(caps) = capabilities else {
        return DelegationCapabilities::none();
    };

    if caps.get("isDelegable").and_then(Value::as_bool) == Some(false) {
        return DelegationCapabilities::none();
    }

    let flag = |section: &str, key: &str| {
        caps.get(section)
            .and_then(|s| s.get(key))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    };
    let names = |section: &str, key: &str| -> Vec<String> {
        caps.get(section)
            .and_then(|s| s.get(key))
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default()
    };

    let only_server_pageable = caps
        .get("isOnlyServerPagable")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    DelegationCapabilities {
        filter: flag("filterRestrictions", "filterable"),
        sort: flag("sortRestrictions", "sortable"),
        top: !only_server_pageable,
        non_filterable_fields: names("filterRestrictions", "nonFilterableProperties"),
        non_sortable_fields: names("sortRestrictions", "unsortableProperties"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_capabilities_parsing() {
        let caps = parse_capabilities(&json!({
            "x-ms-capabilities": {
                "filterRestrictions": { "filterable": true, "nonFilterableProperties": ["notes"] },
                "sortRestrictions": { "sortable": true, "unsortableProperties": ["tags"] }
            }
        }));
        assert!(caps.filter && caps.sort && caps.top);
        assert_eq!(caps.non_filterable_fields, vec!["notes".to_string()]);
        assert_eq!(caps.non_sortable_fields, vec!["tags".to_string()]);
    }

    #[test]
    fn test_non_delegable_declaration_wins() {
        let caps = parse_capabilities(&json!({
            "x-ms-capabilities": {
                "isDelegable": false,
                "filterRestrictions": { "filterable": true }
            }
        }));
        assert!(caps.is_empty());
        assert!(parse_capabilities(&json!({ "schema": {} })).is_empty());
    }

    #[test]
    fn test_server_only_paging_disables_top() {
        let caps = parse_capabilities(&json!({
            "schema": { "x-ms-capabilities": { "isOnlyServerPagable": true } }
        }));
        assert!(!caps.top);
        assert!(!caps.filter);
    }
}
