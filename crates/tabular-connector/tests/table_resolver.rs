use serde_json::json;
use std::sync::Arc;
use tabular_connector::{
    CacheKey, CompatibilityMode, ConnectorError, FormulaType, InMemoryMetadataCache,
    MetadataCache, OptionSetRegistry, ResolverConfig, TableParameters, TableResolver,
};

fn document(properties: serde_json::Value) -> String {
    json!({ "schema": { "items": { "type": "object", "properties": properties } } }).to_string()
}

fn two_fields() -> String {
    document(json!({
        "a": { "type": "string" },
        "b": { "type": "number" }
    }))
}

fn one_field() -> String {
    document(json!({ "a": { "type": "string" } }))
}

fn resolver() -> TableResolver {
    TableResolver::new(Arc::new(OptionSetRegistry::new()))
}

#[tokio::test]
async fn test_structural_equality_of_bindings() {
    let resolver = resolver();
    let mode = CompatibilityMode::Default;

    let first = resolver
        .resolve_table(&TableParameters::new("ds", "one"), &two_fields(), mode)
        .await;
    let renamed = resolver
        .resolve_table(&TableParameters::new("other", "two"), &two_fields(), mode)
        .await;
    let smaller = resolver
        .resolve_table(&TableParameters::new("ds", "three"), &one_field(), mode)
        .await;

    assert_eq!(first.binding, renamed.binding);
    assert_ne!(first.binding, smaller.binding);
}

#[tokio::test]
async fn test_cache_is_behavior_neutral() {
    let table = TableParameters::new("ds", "orders");
    let raw = two_fields();

    let uncached = resolver()
        .resolve_table(&table, &raw, CompatibilityMode::Default)
        .await;

    let cache = Arc::new(InMemoryMetadataCache::new());
    let cached_resolver = resolver().with_cache(cache.clone());
    let miss = cached_resolver
        .resolve_table(&table, &raw, CompatibilityMode::Default)
        .await;
    let hit = cached_resolver
        .resolve_table(&table, &raw, CompatibilityMode::Default)
        .await;

    assert_eq!(uncached.binding, miss.binding);
    assert_eq!(uncached.capabilities, miss.capabilities);
    assert!(Arc::ptr_eq(&miss, &hit));
    assert_eq!(cache.len().await, 1);
}

#[tokio::test]
async fn test_cache_hit_skips_parsing() {
    let table = TableParameters::new("ds", "orders");
    let cache = Arc::new(InMemoryMetadataCache::new());
    let resolver = resolver().with_cache(cache.clone());

    resolver
        .resolve_table(&table, &two_fields(), CompatibilityMode::Default)
        .await;
    let hit = resolver
        .resolve_table(&table, "this is not json", CompatibilityMode::Default)
        .await;
    assert!(hit.is_clean());
    assert_eq!(hit.record_type().len(), 2);

    // Modes are cached separately
    let other_mode = resolver
        .resolve_table(&table, "this is not json", CompatibilityMode::SwaggerCompatibility)
        .await;
    assert!(!other_mode.is_clean());

    cache
        .invalidate(&CacheKey::new(&table, CompatibilityMode::Default))
        .await;
    assert!(cache.is_empty().await);
}

#[tokio::test]
async fn test_malformed_source_is_attached_not_thrown() {
    let cache = Arc::new(InMemoryMetadataCache::new());
    let resolver = resolver().with_cache(cache.clone());
    let table = TableParameters::new("ds", "broken");

    let resolved = resolver
        .resolve_table(&table, "{ \"schema\": ", CompatibilityMode::Default)
        .await;
    assert!(matches!(resolved.errors[0], ConnectorError::SchemaParse(_)));
    assert!(resolved.record_type().is_empty());
    assert!(resolved.capabilities.is_empty());
    assert!(resolved.ensure_clean().is_err());

    let missing = resolver
        .resolve_table(&table, r#"{ "name": "broken" }"#, CompatibilityMode::Default)
        .await;
    assert!(!missing.is_clean());

    // Failed resolutions are never cached
    assert!(cache.is_empty().await);
}

#[tokio::test]
async fn test_root_schema_and_custom_path() {
    let flat = json!({ "type": "object", "properties": { "x": { "type": "boolean" } } }).to_string();
    let resolved = resolver()
        .resolve_table(&TableParameters::new("ds", "flat"), &flat, CompatibilityMode::Default)
        .await;
    assert_eq!(resolved.record_type().field_type("x"), Some(&FormulaType::Boolean));

    let nested = json!({
        "definitions": { "Row": { "type": "object", "properties": { "y": { "type": "string" } } } }
    })
    .to_string();
    let resolved = resolver()
        .with_config(ResolverConfig::new().with_schema_path("definitions/Row"))
        .resolve_table(&TableParameters::new("ds", "nested"), &nested, CompatibilityMode::Default)
        .await;
    assert!(resolved.is_clean());
    assert_eq!(resolved.record_type().field_names(), vec!["y"]);
}

#[tokio::test]
async fn test_explicit_primary_keys_win() {
    let raw = document(json!({
        "a": { "type": "string", "x-ms-keyType": "primary", "x-ms-keyOrder": 2 },
        "b": { "type": "string", "x-ms-keyType": "primary", "x-ms-keyOrder": 1 },
        "c": { "type": "string" }
    }));

    let derived = resolver()
        .resolve_table(&TableParameters::new("ds", "t"), &raw, CompatibilityMode::Default)
        .await;
    assert_eq!(derived.binding.primary_keys(), &["b".to_string(), "a".to_string()]);

    let explicit = resolver()
        .resolve_table(
            &TableParameters::new("ds", "t").with_primary_keys(["c"]),
            &raw,
            CompatibilityMode::Default,
        )
        .await;
    assert_eq!(explicit.binding.primary_keys(), &["c".to_string()]);
}

#[tokio::test]
async fn test_concurrent_resolutions_share_option_sets() {
    let registry = Arc::new(OptionSetRegistry::new());
    let resolver = Arc::new(TableResolver::new(registry.clone()));
    let raw = document(json!({
        "status": { "type": "string", "format": "enum", "enum": ["open", "closed"] }
    }));

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let resolver = resolver.clone();
            let raw = raw.clone();
            tokio::spawn(async move {
                resolver
                    .resolve_table(&TableParameters::new("ds", "issues"), &raw, CompatibilityMode::Default)
                    .await
            })
        })
        .collect();

    let results: Vec<_> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    assert_eq!(registry.len().unwrap(), 1);
    let first = results[0].record_type().field_type("status").unwrap().option_set().unwrap().clone();
    for resolved in &results {
        let set = resolved.record_type().field_type("status").unwrap().option_set().unwrap();
        assert!(Arc::ptr_eq(&first, set));
    }
}
