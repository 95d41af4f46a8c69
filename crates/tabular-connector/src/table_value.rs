//! Queryable table handle handed to the evaluator
//!
//! A [`TableValue`] starts uninitialized and becomes initialized exactly once,
//! either through a [`TableResolver`] or through a local record type setter.
//! Row requests split the query against the table's delegation capabilities;
//! whatever the source cannot run comes back as [`TableRows::residual`].

use crate::compatibility::CompatibilityMode;
use crate::error::{ConnectorError, Result};
use crate::query::QueryParameters;
use crate::table::{ResolvedTable, TableResolver};
use crate::traits::{FetchContext, TabularService};
use crate::types::{DelegationCapabilities, RecordType, RecordTypeBinding};
use crate::value::{RecordValue, RowResult};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug)]
struct TableState {
    binding: RecordTypeBinding,
    capabilities: DelegationCapabilities,
    /// Field-level problems met while resolving; the affected fields are degraded
    errors: Vec<ConnectorError>,
}

pub struct TableValue {
    service: Arc<dyn TabularService>,
    state: OnceCell<TableState>,
}

impl std::fmt::Debug for TableValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableValue")
            .field("service", &self.service.service_type())
            .field("state", &self.state)
            .finish()
    }
}

impl TableValue {
    /// Uninitialized table bound to `service`
    pub fn new(service: Arc<dyn TabularService>) -> Self {
        Self {
            service,
            state: OnceCell::new(),
        }
    }

    /// Initialized table from an existing resolution
    pub fn from_resolved(service: Arc<dyn TabularService>, resolved: &ResolvedTable) -> Result<Self> {
        let table = Self::new(service);
        table.install(resolved)?;
        Ok(table)
    }

    /// Resolve the service's schema and initialize
    pub async fn initialize(
        &self,
        resolver: &TableResolver,
        mode: CompatibilityMode,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if self.is_initialized() {
            return Err(self.already_initialized());
        }
        let resolved = resolver
            .resolve_for_service(self.service.as_ref(), mode, cancel)
            .await?;
        self.install(&resolved)
    }

    /// Initialize with a record type built locally
    pub fn set_record_type(&self, record_type: RecordType) -> Result<()> {
        let capabilities = if self.service.is_delegable() {
            DelegationCapabilities::all()
        } else {
            DelegationCapabilities::none()
        };
        let binding = RecordTypeBinding::new(
            self.service.table().clone(),
            record_type,
            self.service.table().primary_keys.clone(),
        );
        self.set_state(TableState {
            binding,
            capabilities,
            errors: Vec::new(),
        })
    }

    fn install(&self, resolved: &ResolvedTable) -> Result<()> {
        // Field errors degrade single fields; a table without any field is unusable
        if resolved.record_type().is_empty() {
            if let Some(err) = resolved.errors.first() {
                return Err(err.clone());
            }
        }

        let capabilities = if self.service.is_delegable() {
            resolved.capabilities.clone()
        } else {
            DelegationCapabilities::none()
        };
        if !resolved.errors.is_empty() {
            warn!(
                "Table {} initialized with {} degraded field(s): {}",
                self.service.table(),
                resolved.errors.len(),
                resolved
                    .errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ")
            );
        }
        self.set_state(TableState {
            binding: resolved.binding.clone(),
            capabilities,
            errors: resolved.errors.clone(),
        })
    }

    fn set_state(&self, state: TableState) -> Result<()> {
        let fields = state.binding.record_type().len();
        self.state
            .set(state)
            .map_err(|_| self.already_initialized())?;
        info!(
            "Initialized table {} with {} field(s)",
            self.service.table(),
            fields
        );
        Ok(())
    }

    fn already_initialized(&self) -> ConnectorError {
        ConnectorError::AlreadyInitialized(self.service.table().to_string())
    }

    fn state(&self) -> Result<&TableState> {
        self.state
            .get()
            .ok_or_else(|| ConnectorError::NotInitialized(self.service.table().to_string()))
    }

    pub fn is_initialized(&self) -> bool {
        self.state.initialized()
    }

    pub fn row_type(&self) -> Result<Arc<RecordType>> {
        Ok(self.state()?.binding.record_type().clone())
    }

    pub fn binding(&self) -> Result<&RecordTypeBinding> {
        Ok(&self.state()?.binding)
    }

    pub fn delegation_capabilities(&self) -> Result<&DelegationCapabilities> {
        Ok(&self.state()?.capabilities)
    }

    /// Field errors from schema resolution; empty for a clean or locally set type
    pub fn resolution_errors(&self) -> Result<&[ConnectorError]> {
        Ok(&self.state()?.errors)
    }

    pub fn service(&self) -> &Arc<dyn TabularService> {
        &self.service
    }

    /// Fetch rows, delegating what the source supports
    pub async fn get_rows(
        &self,
        query: &QueryParameters,
        cancel: &CancellationToken,
    ) -> Result<TableRows> {
        let state = self.state()?;
        if cancel.is_cancelled() {
            return Err(ConnectorError::Cancelled);
        }

        let (delegated, residual) = query.split(&state.capabilities);
        if !residual.is_empty() {
            debug!(
                "Table {} returns a residual query to apply locally: {:?}",
                self.service.table(),
                residual
            );
        }

        let context = FetchContext::new(state.binding.record_type().clone());
        let rows = self.service.fetch_rows(&context, &delegated, cancel).await?;
        debug!(
            "Fetched {} row(s) from {} [{}]",
            rows.len(),
            self.service.table(),
            context.correlation_id
        );

        Ok(TableRows { rows, residual })
    }
}

/// Rows of one fetch plus the query part still to be applied locally
#[derive(Debug, Clone)]
pub struct TableRows {
    pub rows: Vec<RowResult>,
    pub residual: QueryParameters,
}

impl TableRows {
    /// The source already applied every requested operation
    pub fn is_complete(&self) -> bool {
        self.residual.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &RecordValue> {
        self.rows.iter().filter_map(|r| r.as_ref().ok())
    }

    pub fn errors(&self) -> impl Iterator<Item = &ConnectorError> {
        self.rows.iter().filter_map(|r| r.as_ref().err())
    }

    /// Apply the residual query to the successful rows
    ///
    /// Failed rows cannot be filtered or ordered; they follow the processed
    /// rows in their original order.
    pub fn apply_residual(self) -> Vec<RowResult> {
        if self.residual.is_empty() {
            return self.rows;
        }

        let (records, failures): (Vec<RowResult>, Vec<RowResult>) =
            self.rows.into_iter().partition(|r| r.is_ok());
        let records: Vec<RecordValue> = records.into_iter().filter_map(|r| r.ok()).collect();

        self.residual
            .apply(records)
            .into_iter()
            .map(Ok)
            .chain(failures)
            .collect()
    }
}
