use thiserror::Error;

/// Unified error type for schema resolution and row retrieval
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConnectorError {
    /// Malformed or unsupported schema fragment
    #[error("Schema error: {0}")]
    SchemaParse(String),

    /// Two option sets share a name but map different values
    #[error("Optionset name conflict ({0})")]
    NameConflict(String),

    /// Referenced resource (table, backing file, ...) does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The operation observed a cancellation signal
    #[error("Operation cancelled")]
    Cancelled,

    /// Transport or protocol failure while talking to a remote source
    #[error("Remote fetch failed: {0}")]
    RemoteFetch(String),

    /// Table value queried before its record type was resolved
    #[error("Table is not initialized: {0}")]
    NotInitialized(String),

    /// Table value initialized a second time
    #[error("Table is already initialized: {0}")]
    AlreadyInitialized(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A wire value could not be converted to the declared field type
    #[error("Cannot convert field '{field}': {message}")]
    ValueConversion { field: String, message: String },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConnectorError {
    /// Create a schema error with custom message
    pub fn schema(msg: impl Into<String>) -> Self {
        ConnectorError::SchemaParse(msg.into())
    }

    /// Create a "not found" error with custom message
    pub fn not_found(msg: impl Into<String>) -> Self {
        ConnectorError::NotFound(msg.into())
    }

    /// Create a remote fetch error
    pub fn remote(msg: impl Into<String>) -> Self {
        ConnectorError::RemoteFetch(msg.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        ConnectorError::InvalidConfiguration(msg.into())
    }

    pub fn conversion(field: impl Into<String>, msg: impl Into<String>) -> Self {
        ConnectorError::ValueConversion {
            field: field.into(),
            message: msg.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ConnectorError::Cancelled)
    }
}

impl From<serde_json::Error> for ConnectorError {
    fn from(err: serde_json::Error) -> Self {
        ConnectorError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ConnectorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_conflict_message() {
        let err = ConnectorError::NameConflict("Priority".to_string());
        assert_eq!(err.to_string(), "Optionset name conflict (Priority)");
    }

    #[test]
    fn test_cancelled_is_distinct_from_data_errors() {
        assert!(ConnectorError::Cancelled.is_cancelled());
        assert!(!ConnectorError::remote("503").is_cancelled());
    }
}
