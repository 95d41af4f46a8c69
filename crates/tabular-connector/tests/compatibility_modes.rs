use serde_json::json;
use std::sync::Arc;
use tabular_connector::{
    CompatibilityMode, FormulaType, OptionSetRegistry, TableParameters, TableResolver,
};

fn tickets_document() -> String {
    json!({
        "name": "tickets",
        "title": "Tickets",
        "x-ms-capabilities": {
            "filterRestrictions": { "filterable": true },
            "sortRestrictions": { "sortable": true }
        },
        "schema": {
            "type": "array",
            "items": {
                "type": "object",
                "required": ["Id"],
                "properties": {
                    "Id": { "type": "integer", "x-ms-keyType": "primary", "x-ms-keyOrder": 1 },
                    "Id2": { "type": "integer", "x-ms-visibility": "internal" },
                    "Title": { "type": "string", "x-ms-display-name": "Ticket title" },
                    "priority": {
                        "type": "string",
                        "enum": ["1", "2", "3"],
                        "x-ms-enum-values": [
                            { "value": "1", "displayName": "High" },
                            { "value": "2", "displayName": "Normal" },
                            { "value": "3", "displayName": "Low" }
                        ]
                    },
                    "Opened": { "type": "string", "format": "date-time" },
                    "Closed": { "type": "boolean" }
                }
            }
        }
    })
    .to_string()
}

async fn resolve(mode: CompatibilityMode) -> Arc<tabular_connector::ResolvedTable> {
    let resolver = TableResolver::new(Arc::new(OptionSetRegistry::new()));
    resolver
        .resolve_table(&TableParameters::new("default", "tickets"), &tickets_document(), mode)
        .await
}

#[tokio::test]
async fn test_default_mode_hides_internal_and_infers_choice() {
    let resolved = resolve(CompatibilityMode::Default).await;
    assert!(resolved.is_clean(), "{:?}", resolved.errors);

    let record = resolved.record_type();
    assert_eq!(record.len(), 5);
    assert!(record.field("Id2").is_none());

    let priority = record.field_type("priority").unwrap();
    assert!(priority.is_choice());
    let set = priority.option_set().unwrap();
    assert_eq!(set.name(), "tickets (priority)");
    assert_eq!(set.names().display_name("1"), Some("High"));
}

#[tokio::test]
async fn test_swagger_mode_hides_internal_and_keeps_text() {
    let resolved = resolve(CompatibilityMode::SwaggerCompatibility).await;
    let record = resolved.record_type();

    assert_eq!(record.len(), 5);
    assert!(record.field("Id2").is_none());
    assert_eq!(record.field_type("priority"), Some(&FormulaType::Text));
}

#[tokio::test]
async fn test_powerapps_mode_includes_internal_and_keeps_text() {
    let resolved = resolve(CompatibilityMode::PowerAppsCompatibility).await;
    let record = resolved.record_type();

    assert_eq!(record.len(), 6);
    assert_eq!(record.field_type("Id2"), Some(&FormulaType::Number));
    assert!(resolved.connector_type.field("Id2").unwrap().is_hidden());
    assert_eq!(record.field_type("priority"), Some(&FormulaType::Text));
}

#[tokio::test]
async fn test_display_names_and_keys_in_every_mode() {
    for mode in CompatibilityMode::ALL {
        let resolved = resolve(mode).await;
        let title = resolved.connector_type.field("Title").unwrap();
        assert_eq!(title.display_name(), Some("Ticket title"));
        assert_eq!(title.label(), "Ticket title");
        assert_eq!(
            resolved.record_type().field_by_display_name("Ticket title").unwrap().name,
            "Title"
        );
        assert_eq!(resolved.binding.primary_keys(), &["Id".to_string()]);
        assert!(resolved.connector_type.field("Id").unwrap().is_required());
        assert_eq!(resolved.display_name.as_deref(), Some("Tickets"));
    }
}

#[tokio::test]
async fn test_modes_produce_unequal_bindings() {
    let default = resolve(CompatibilityMode::Default).await;
    let swagger = resolve(CompatibilityMode::SwaggerCompatibility).await;
    let powerapps = resolve(CompatibilityMode::PowerAppsCompatibility).await;

    // Same field names, different priority type
    assert_ne!(default.binding, swagger.binding);
    // Different field counts
    assert_ne!(swagger.binding, powerapps.binding);
}
