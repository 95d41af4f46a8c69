use crate::error::{ConnectorError, Result};
use crate::option_set::OptionSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Closed set of types a resolved field can have
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum FormulaType {
    Text,
    Number,
    Boolean,
    Date,
    DateTime,
    Guid,
    /// Option-set backed choice; equal option sets share one instance
    Choice(Arc<OptionSet>),
    Record(RecordType),
    Sequence(Box<FormulaType>),
    /// Shape the resolver could not type
    Untyped,
}

impl FormulaType {
    pub fn is_choice(&self) -> bool {
        matches!(self, FormulaType::Choice(_))
    }

    pub fn as_record(&self) -> Option<&RecordType> {
        match self {
            FormulaType::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn option_set(&self) -> Option<&Arc<OptionSet>> {
        match self {
            FormulaType::Choice(set) => Some(set),
            _ => None,
        }
    }
}

impl fmt::Display for FormulaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormulaType::Text => write!(f, "Text"),
            FormulaType::Number => write!(f, "Number"),
            FormulaType::Boolean => write!(f, "Boolean"),
            FormulaType::Date => write!(f, "Date"),
            FormulaType::DateTime => write!(f, "DateTime"),
            FormulaType::Guid => write!(f, "Guid"),
            FormulaType::Choice(set) => write!(f, "Choice({})", set.name()),
            FormulaType::Record(record) => write!(f, "{}", record),
            FormulaType::Sequence(item) => write!(f, "Sequence({})", item),
            FormulaType::Untyped => write!(f, "Untyped"),
        }
    }
}

/// One field of a record type
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RecordField {
    pub name: String,
    pub display_name: Option<String>,
    pub field_type: FormulaType,
}

/// Record type: ordered fields, compared as a set of (name, type) pairs
#[derive(Debug, Clone, Default)]
pub struct RecordType {
    fields: Vec<RecordField>,
}

impl RecordType {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style add; duplicate names are ignored
    pub fn with_field(self, name: impl Into<String>, field_type: FormulaType) -> Self {
        self.with_display_field(name, None::<String>, field_type)
    }

    pub fn with_display_field(
        mut self,
        name: impl Into<String>,
        display_name: Option<impl Into<String>>,
        field_type: FormulaType,
    ) -> Self {
        let _ = self.add_field(RecordField {
            name: name.into(),
            display_name: display_name.map(Into::into),
            field_type,
        });
        self
    }

    /// Add a field, rejecting duplicate logical names
    pub fn add_field(&mut self, field: RecordField) -> Result<()> {
        if self.field(&field.name).is_some() {
            return Err(ConnectorError::schema(format!(
                "duplicate field name '{}'",
                field.name
            )));
        }
        self.fields.push(field);
        Ok(())
    }

    pub fn field(&self, name: &str) -> Option<&RecordField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Look up by display name, falling back to the logical name
    pub fn field_by_display_name(&self, display: &str) -> Option<&RecordField> {
        self.fields
            .iter()
            .find(|f| f.display_name.as_deref() == Some(display))
            .or_else(|| self.field(display))
    }

    pub fn field_type(&self, name: &str) -> Option<&FormulaType> {
        self.field(name).map(|f| &f.field_type)
    }

    pub fn fields(&self) -> &[RecordField] {
        &self.fields
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl PartialEq for RecordType {
    fn eq(&self, other: &Self) -> bool {
        self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .all(|f| other.field_type(&f.name) == Some(&f.field_type))
    }
}

impl Eq for RecordType {}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "![")?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}:{}", field.name, field.field_type)?;
        }
        write!(f, "]")
    }
}

/// Resolved description of one field or one table
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectorType {
    pub(crate) name: String,
    pub(crate) display_name: Option<String>,
    pub(crate) formula_type: FormulaType,
    pub(crate) fields: Vec<ConnectorType>,
    pub(crate) hidden: bool,
    pub(crate) is_key: bool,
    pub(crate) key_order: Option<u32>,
    pub(crate) required: bool,
    pub(crate) description: Option<String>,
}

impl ConnectorType {
    pub(crate) fn new(name: impl Into<String>, formula_type: FormulaType) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            formula_type,
            fields: Vec::new(),
            hidden: false,
            is_key: false,
            key_order: None,
            required: false,
            description: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// Display name when present, otherwise the logical name
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }

    pub fn formula_type(&self) -> &FormulaType {
        &self.formula_type
    }

    pub fn fields(&self) -> &[ConnectorType] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&ConnectorType> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Internal field surfaced by a mode that includes internal fields
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn is_key(&self) -> bool {
        self.is_key
    }

    pub fn key_order(&self) -> Option<u32> {
        self.key_order
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn option_set(&self) -> Option<&Arc<OptionSet>> {
        self.formula_type.option_set()
    }

    /// Record type of a record-shaped connector type
    pub fn record_type(&self) -> Option<&RecordType> {
        self.formula_type.as_record()
    }
}

/// Identifies one table of one dataset
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct TableParameters {
    pub dataset: String,
    pub table: String,
    #[serde(default)]
    pub primary_keys: Vec<String>,
}

impl TableParameters {
    pub fn new(dataset: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            table: table.into(),
            primary_keys: Vec::new(),
        }
    }

    pub fn with_primary_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_keys = keys.into_iter().map(Into::into).collect();
        self
    }
}

impl fmt::Display for TableParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.dataset, self.table)
    }
}

/// A table's resolved record type
///
/// Equality is decided by the record type alone; dataset, table name and keys
/// do not participate.
#[derive(Debug, Clone)]
pub struct RecordTypeBinding {
    table: TableParameters,
    record_type: Arc<RecordType>,
    primary_keys: Vec<String>,
}

impl RecordTypeBinding {
    pub fn new(table: TableParameters, record_type: RecordType, primary_keys: Vec<String>) -> Self {
        Self {
            table,
            record_type: Arc::new(record_type),
            primary_keys,
        }
    }

    pub fn table(&self) -> &TableParameters {
        &self.table
    }

    pub fn record_type(&self) -> &Arc<RecordType> {
        &self.record_type
    }

    pub fn primary_keys(&self) -> &[String] {
        &self.primary_keys
    }
}

impl PartialEq for RecordTypeBinding {
    fn eq(&self, other: &Self) -> bool {
        self.record_type == other.record_type
    }
}

impl Eq for RecordTypeBinding {}

/// Query shapes a table allows to be pushed to its source
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct DelegationCapabilities {
    pub filter: bool,
    pub sort: bool,
    pub top: bool,
    /// Fields that may not appear in a delegated filter
    #[serde(default)]
    pub non_filterable_fields: Vec<String>,
    /// Fields that may not appear in a delegated ordering
    #[serde(default)]
    pub non_sortable_fields: Vec<String>,
}

impl DelegationCapabilities {
    /// Nothing can be delegated
    pub fn none() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self {
            filter: true,
            sort: true,
            top: true,
            non_filterable_fields: Vec::new(),
            non_sortable_fields: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.filter && !self.sort && !self.top
    }

    pub fn can_filter_on(&self, field: &str) -> bool {
        self.filter && !self.non_filterable_fields.iter().any(|f| f == field)
    }

    pub fn can_sort_on(&self, field: &str) -> bool {
        self.sort && !self.non_sortable_fields.iter().any(|f| f == field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::option_set::DisplayNameProvider;

    #[test]
    fn test_record_type_equality_ignores_order_and_display_names() {
        let a = RecordType::new()
            .with_field("id", FormulaType::Number)
            .with_display_field("name", Some("Name"), FormulaType::Text);
        let b = RecordType::new()
            .with_field("name", FormulaType::Text)
            .with_field("id", FormulaType::Number);
        assert_eq!(a, b);

        let c = RecordType::new().with_field("id", FormulaType::Number);
        assert_ne!(a, c);

        let d = RecordType::new()
            .with_field("id", FormulaType::Text)
            .with_field("name", FormulaType::Text);
        assert_ne!(a, d);
    }

    #[test]
    fn test_binding_equality_ignores_table_metadata() {
        let fields = RecordType::new().with_field("id", FormulaType::Number);
        let a = RecordTypeBinding::new(TableParameters::new("ds1", "orders"), fields.clone(), vec![]);
        let b = RecordTypeBinding::new(
            TableParameters::new("ds2", "invoices"),
            fields,
            vec!["id".to_string()],
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let mut record = RecordType::new().with_field("id", FormulaType::Number);
        let err = record
            .add_field(RecordField {
                name: "id".to_string(),
                display_name: None,
                field_type: FormulaType::Text,
            })
            .unwrap_err();
        assert!(matches!(err, ConnectorError::SchemaParse(_)));
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn test_display_formatting() {
        let set = Arc::new(OptionSet::new(
            "Priority",
            DisplayNameProvider::new().with_pair("1", "High"),
        ));
        let record = RecordType::new()
            .with_field("p", FormulaType::Choice(set))
            .with_field("tags", FormulaType::Sequence(Box::new(FormulaType::Text)));
        assert_eq!(record.to_string(), "![p:Choice(Priority), tags:Sequence(Text)]");
    }

    #[test]
    fn test_capability_field_restrictions() {
        let caps = DelegationCapabilities {
            non_filterable_fields: vec!["notes".to_string()],
            ..DelegationCapabilities::all()
        };
        assert!(caps.can_filter_on("id"));
        assert!(!caps.can_filter_on("notes"));
        assert!(DelegationCapabilities::none().is_empty());
        assert!(!DelegationCapabilities::none().can_sort_on("id"));
    }
}
