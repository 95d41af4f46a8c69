//! Typed row values
//!
//! Wire rows arrive as JSON objects; [`RecordValue::from_json`] converts one
//! against the table's [`RecordType`]. A conversion failure fails only that
//! row, which is why rows travel as [`RowResult`].

use crate::error::{ConnectorError, Result};
use crate::option_set::OptionSet;
use crate::schema::json_kind;
use crate::types::{FormulaType, RecordType};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Outcome of reading one row
pub type RowResult = std::result::Result<RecordValue, ConnectorError>;

#[derive(Debug, Clone, PartialEq)]
pub enum FormulaValue {
    Blank,
    Text(String),
    Number(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    Guid(Uuid),
    Choice {
        option_set: Arc<OptionSet>,
        logical: String,
    },
    Record(RecordValue),
    Sequence(Vec<FormulaValue>),
    Untyped(Value),
}

impl FormulaValue {
    /// Convert a wire value to `field_type`; JSON null is always blank
    pub fn from_json(field: &str, value: &Value, field_type: &FormulaType) -> Result<Self> {
        if value.is_null() {
            return Ok(FormulaValue::Blank);
        }

        let mismatch = || {
            ConnectorError::conversion(
                field,
                format!("expected {}, found {}", field_type, json_kind(value)),
            )
        };

        match field_type {
            FormulaType::Text => match value {
                Value::String(s) => Ok(FormulaValue::Text(s.clone())),
                Value::Number(n) => Ok(FormulaValue::Text(n.to_string())),
                Value::Bool(b) => Ok(FormulaValue::Text(b.to_string())),
                _ => Err(mismatch()),
            },
            FormulaType::Number => match value {
                Value::Number(n) => n.as_f64().map(FormulaValue::Number).ok_or_else(mismatch),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(FormulaValue::Number)
                    .map_err(|_| ConnectorError::conversion(field, format!("'{}' is not a number", s))),
                _ => Err(mismatch()),
            },
            FormulaType::Boolean => match value {
                Value::Bool(b) => Ok(FormulaValue::Boolean(*b)),
                Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(FormulaValue::Boolean(true)),
                Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(FormulaValue::Boolean(false)),
                _ => Err(mismatch()),
            },
            FormulaType::DateTime => {
                let s = value.as_str().ok_or_else(mismatch)?;
                parse_datetime(s)
                    .map(FormulaValue::DateTime)
                    .ok_or_else(|| ConnectorError::conversion(field, format!("'{}' is not a date-time", s)))
            }
            FormulaType::Date => {
                let s = value.as_str().ok_or_else(mismatch)?;
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .ok()
                    .or_else(|| parse_datetime(s).map(|dt| dt.date_naive()))
                    .map(FormulaValue::Date)
                    .ok_or_else(|| ConnectorError::conversion(field, format!("'{}' is not a date", s)))
            }
            FormulaType::Guid => {
                let s = value.as_str().ok_or_else(mismatch)?;
                Uuid::parse_str(s)
                    .map(FormulaValue::Guid)
                    .map_err(|e| ConnectorError::conversion(field, e.to_string()))
            }
            FormulaType::Choice(option_set) => {
                // Some connectors wrap choices as { "Value": "..." }
                let raw = match value {
                    Value::Object(obj) => obj.get("Value").unwrap_or(value),
                    _ => value,
                };
                let logical = match raw {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    _ => return Err(mismatch()),
                };
                if !option_set.contains(&logical) {
                    return Err(ConnectorError::conversion(
                        field,
                        format!("'{}' is not a member of option set '{}'", logical, option_set.name()),
                    ));
                }
                Ok(FormulaValue::Choice {
                    option_set: option_set.clone(),
                    logical,
                })
            }
            FormulaType::Record(record_type) => {
                RecordValue::from_json(value, record_type).map(FormulaValue::Record)
            }
            FormulaType::Sequence(item_type) => {
                let items = value.as_array().ok_or_else(mismatch)?;
                items
                    .iter()
                    .map(|item| FormulaValue::from_json(field, item, item_type))
                    .collect::<Result<Vec<_>>>()
                    .map(FormulaValue::Sequence)
            }
            FormulaType::Untyped => Ok(FormulaValue::Untyped(value.clone())),
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, FormulaValue::Blank)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FormulaValue::Text(s) => Some(s),
            FormulaValue::Choice { logical, .. } => Some(logical),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FormulaValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Ordering used by local filtering and sorting; blank sorts first
    pub fn compare(&self, other: &FormulaValue) -> Option<Ordering> {
        use FormulaValue as V;
        match (self, other) {
            (V::Blank, V::Blank) => Some(Ordering::Equal),
            (V::Blank, _) => Some(Ordering::Less),
            (_, V::Blank) => Some(Ordering::Greater),
            (V::Number(a), V::Number(b)) => a.partial_cmp(b),
            (V::Boolean(a), V::Boolean(b)) => Some(a.cmp(b)),
            (V::Date(a), V::Date(b)) => Some(a.cmp(b)),
            (V::DateTime(a), V::DateTime(b)) => Some(a.cmp(b)),
            (V::DateTime(a), V::Date(b)) => Some(a.date_naive().cmp(b)),
            (V::Date(a), V::DateTime(b)) => Some(a.cmp(&b.date_naive())),
            (V::Guid(a), V::Guid(b)) => Some(a.cmp(b)),
            _ => match (self.as_text(), other.as_text()) {
                (Some(a), Some(b)) => Some(a.cmp(b)),
                _ => None,
            },
        }
    }
}

impl fmt::Display for FormulaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormulaValue::Blank => write!(f, "Blank()"),
            FormulaValue::Text(s) => write!(f, "\"{}\"", s),
            FormulaValue::Number(n) => write!(f, "{}", n),
            FormulaValue::Boolean(b) => write!(f, "{}", b),
            FormulaValue::Date(d) => write!(f, "{}", d),
            FormulaValue::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            FormulaValue::Guid(g) => write!(f, "{}", g),
            FormulaValue::Choice { option_set, logical } => {
                let display = option_set.names().display_name(logical).unwrap_or(logical);
                write!(f, "{}.'{}'", option_set.name(), display)
            }
            FormulaValue::Record(record) => write!(f, "{}", record),
            FormulaValue::Sequence(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            FormulaValue::Untyped(v) => write!(f, "{}", v),
        }
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

/// One typed row, fields in record type order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordValue {
    fields: Vec<(String, FormulaValue)>,
}

impl RecordValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, name: impl Into<String>, value: FormulaValue) -> Self {
        self.fields.push((name.into(), value));
        self
    }

    /// Convert a JSON object; fields absent from the object are blank and
    /// keys absent from the record type are ignored
    pub fn from_json(value: &Value, record_type: &RecordType) -> Result<Self> {
        let obj = value.as_object().ok_or_else(|| {
            ConnectorError::conversion("<row>", format!("expected an object, found {}", json_kind(value)))
        })?;

        let fields = record_type
            .fields()
            .iter()
            .map(|field| {
                let raw = obj.get(&field.name).unwrap_or(&Value::Null);
                FormulaValue::from_json(&field.name, raw, &field.field_type)
                    .map(|converted| (field.name.clone(), converted))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { fields })
    }

    pub fn get(&self, name: &str) -> Option<&FormulaValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FormulaValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for RecordValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}:{}", name, value)?;
        }
        write!(f, "}}")
    }
}
