//! # tabular-connector
//!
//! Schema resolution and delegated row access for connector-hosted tables.
//!
//! A connector describes each table with an OpenAPI/Swagger schema document.
//! This crate turns that document into a typed record type and exposes the
//! table to an expression evaluator through a uniform, cancellable row API.
//!
//! ## Architecture
//!
//! - **SchemaNode**: lenient view over an OpenAPI schema object and its vendor extensions
//! - **CompatibilityMode**: `cdp`, `powerapps` or `swagger` rules for visibility and enums
//! - **OptionSetRegistry**: deduplicated, conflict-checked registry of enumerations
//! - **SchemaTypeResolver**: schema node → connector type tree
//! - **TableResolver**: table document → record type binding + delegation capabilities
//! - **TabularService**: trait every concrete data source implements
//! - **TableValue**: initialized-once handle the evaluator queries
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tabular_connector::{
//!     CompatibilityMode, OptionSetRegistry, TableParameters, TableResolver,
//! };
//!
//! # async fn example() {
//! let resolver = TableResolver::new(Arc::new(OptionSetRegistry::new()));
//! let document = r#"{
//!     "schema": { "items": { "type": "object", "properties": {
//!         "id": { "type": "integer" },
//!         "title": { "type": "string" }
//!     } } }
//! }"#;
//!
//! let table = TableParameters::new("default", "tasks");
//! let resolved = resolver
//!     .resolve_table(&table, document, CompatibilityMode::Default)
//!     .await;
//! assert!(resolved.is_clean());
//! assert_eq!(resolved.record_type().len(), 2);
//! # }
//! ```
//!
//! ## Backend Implementation
//!
//! To implement a new source, create a struct implementing [`TabularService`]
//! and override the optional methods it supports. Backend crates:
//! - `tabular-connector-http` - remote connector over HTTP
//! - `tabular-connector-file` - local JSON file

pub mod cache;
pub mod compatibility;
pub mod config;
pub mod error;
pub mod option_set;
pub mod query;
pub mod resolver;
pub mod schema;
pub mod table;
pub mod table_value;
pub mod traits;
pub mod types;
pub mod value;

// Re-export commonly used items
pub use cache::{CacheKey, InMemoryMetadataCache, MetadataCache};
pub use compatibility::{CompatibilityMode, FieldDecision};
pub use config::ResolverConfig;
pub use error::{ConnectorError, Result};
pub use option_set::{DisplayNameProvider, OptionSet, OptionSetRegistry};
pub use query::{ComparisonOp, FilterExpression, OrderBy, QueryParameters};
pub use resolver::{Resolution, SchemaTypeResolver};
pub use schema::{EnumValue, SchemaKind, SchemaNode};
pub use table::{ResolvedTable, TableResolver};
pub use table_value::{TableRows, TableValue};
pub use traits::{FetchContext, TabularService, Transport};
pub use types::{
    ConnectorType, DelegationCapabilities, FormulaType, RecordField, RecordType,
    RecordTypeBinding, TableParameters,
};
pub use value::{FormulaValue, RecordValue, RowResult};
pub use tokio_util::sync::CancellationToken;
