//! HTTP implementation of the tabular-connector `TabularService`
//!
//! Talks to a connector endpoint exposing CDP-style table metadata at
//! `$metadata.json/datasets/{dataset}/tables/{table}` and rows at
//! `datasets/{dataset}/tables/{table}/items`, following `@odata.nextLink`
//! until the last page.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tabular_connector::{
//!     CancellationToken, CompatibilityMode, OptionSetRegistry, QueryParameters, TableParameters,
//!     TableResolver,
//! };
//! use tabular_connector_http::{RemoteServiceConfig, RemoteTabularService};
//!
//! # async fn example() -> tabular_connector::Result<()> {
//! let resolver = TableResolver::new(Arc::new(OptionSetRegistry::new()));
//! let cancel = CancellationToken::new();
//! let table = RemoteTabularService::connect(
//!     TableParameters::new("default", "tickets"),
//!     RemoteServiceConfig::new("https://connector.example.com/apim/sql/conn-1"),
//!     &resolver,
//!     CompatibilityMode::Default,
//!     &cancel,
//! )
//! .await?;
//!
//! let rows = table.get_rows(&QueryParameters::new().with_top(10), &cancel).await?;
//! println!("{} row(s)", rows.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod service;
pub mod transport;

pub use config::{RemoteServiceConfig, DEFAULT_API_VERSION};
pub use error::HttpError;
pub use service::RemoteTabularService;
pub use transport::HttpTransport;
