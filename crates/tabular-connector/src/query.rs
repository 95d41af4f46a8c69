//! Delegated query parameters
//!
//! A [`QueryParameters`] value carries the filter, ordering and row limit a
//! caller wants. Against a table's [`DelegationCapabilities`] it splits into
//! the part the source runs and a residual the caller runs locally, always in
//! filter → sort → top order.

use crate::types::DelegationCapabilities;
use crate::value::{FormulaValue, RecordValue};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComparisonOp::Eq => write!(f, "eq"),
            ComparisonOp::Ne => write!(f, "ne"),
            ComparisonOp::Gt => write!(f, "gt"),
            ComparisonOp::Ge => write!(f, "ge"),
            ComparisonOp::Lt => write!(f, "lt"),
            ComparisonOp::Le => write!(f, "le"),
        }
    }
}

/// Small filter grammar: field/literal comparisons joined by and/or/not
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpression {
    Compare {
        field: String,
        op: ComparisonOp,
        value: FormulaValue,
    },
    And(Box<FilterExpression>, Box<FilterExpression>),
    Or(Box<FilterExpression>, Box<FilterExpression>),
    Not(Box<FilterExpression>),
}

impl FilterExpression {
    pub fn compare(field: impl Into<String>, op: ComparisonOp, value: FormulaValue) -> Self {
        FilterExpression::Compare {
            field: field.into(),
            op,
            value,
        }
    }

    pub fn eq(field: impl Into<String>, value: FormulaValue) -> Self {
        Self::compare(field, ComparisonOp::Eq, value)
    }

    pub fn and(self, other: FilterExpression) -> Self {
        FilterExpression::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: FilterExpression) -> Self {
        FilterExpression::Or(Box::new(self), Box::new(other))
    }

    pub fn negate(self) -> Self {
        FilterExpression::Not(Box::new(self))
    }

    /// Fields referenced anywhere in the expression
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            FilterExpression::Compare { field, .. } => {
                if !out.contains(&field.as_str()) {
                    out.push(field);
                }
            }
            FilterExpression::And(a, b) | FilterExpression::Or(a, b) => {
                a.collect_fields(out);
                b.collect_fields(out);
            }
            FilterExpression::Not(inner) => inner.collect_fields(out),
        }
    }

    /// Render as an OData `$filter` expression
    pub fn to_odata(&self) -> String {
        match self {
            FilterExpression::Compare { field, op, value } => {
                format!("{} {} {}", field, op, odata_literal(value))
            }
            FilterExpression::And(a, b) => format!("({} and {})", a.to_odata(), b.to_odata()),
            FilterExpression::Or(a, b) => format!("({} or {})", a.to_odata(), b.to_odata()),
            FilterExpression::Not(inner) => format!("not ({})", inner.to_odata()),
        }
    }

    /// Evaluate against one row; a missing field reads as blank
    pub fn matches(&self, row: &RecordValue) -> bool {
        match self {
            FilterExpression::Compare { field, op, value } => {
                let actual = row.get(field).unwrap_or(&FormulaValue::Blank);
                let ordering = actual.compare(value);
                match op {
                    ComparisonOp::Eq => ordering == Some(Ordering::Equal),
                    ComparisonOp::Ne => ordering != Some(Ordering::Equal),
                    ComparisonOp::Gt => ordering == Some(Ordering::Greater),
                    ComparisonOp::Ge => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
                    ComparisonOp::Lt => ordering == Some(Ordering::Less),
                    ComparisonOp::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
                }
            }
            FilterExpression::And(a, b) => a.matches(row) && b.matches(row),
            FilterExpression::Or(a, b) => a.matches(row) || b.matches(row),
            FilterExpression::Not(inner) => !inner.matches(row),
        }
    }
}

fn odata_literal(value: &FormulaValue) -> String {
    match value {
        FormulaValue::Blank => "null".to_string(),
        FormulaValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
        FormulaValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
        FormulaValue::Number(n) => n.to_string(),
        FormulaValue::Boolean(b) => b.to_string(),
        FormulaValue::Date(d) => d.format("%Y-%m-%d").to_string(),
        FormulaValue::DateTime(dt) => dt.to_rfc3339(),
        FormulaValue::Guid(g) => g.to_string(),
        FormulaValue::Choice { logical, .. } => format!("'{}'", logical.replace('\'', "''")),
        other => format!("'{}'", other.to_string().replace('\'', "''")),
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    #[serde(default)]
    pub descending: bool,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }
}

/// Filter, ordering and row limit for one row request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParameters {
    pub filter: Option<FilterExpression>,
    pub order_by: Vec<OrderBy>,
    pub top: Option<usize>,
}

impl QueryParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, filter: FilterExpression) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn with_top(mut self, top: usize) -> Self {
        self.top = Some(top);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.filter.is_none() && self.order_by.is_empty() && self.top.is_none()
    }

    /// OData system query options (`$filter`, `$orderby`, `$top`)
    pub fn to_odata_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(filter) = &self.filter {
            pairs.push(("$filter".to_string(), filter.to_odata()));
        }
        if !self.order_by.is_empty() {
            let order = self
                .order_by
                .iter()
                .map(|o| {
                    if o.descending {
                        format!("{} desc", o.field)
                    } else {
                        o.field.clone()
                    }
                })
                .collect::<Vec<_>>()
                .join(",");
            pairs.push(("$orderby".to_string(), order));
        }
        if let Some(top) = self.top {
            pairs.push(("$top".to_string(), top.to_string()));
        }
        pairs
    }

    /// Split into (delegated, residual)
    ///
    /// Once a stage stays local, every later stage stays local too: a limit
    /// pushed below an unapplied filter would drop matching rows.
    pub fn split(&self, capabilities: &DelegationCapabilities) -> (QueryParameters, QueryParameters) {
        let mut delegated = QueryParameters::new();
        let mut residual = QueryParameters::new();
        let mut pushed = true;

        if let Some(filter) = &self.filter {
            if capabilities.filter && filter.fields().iter().all(|f| capabilities.can_filter_on(f)) {
                delegated.filter = Some(filter.clone());
            } else {
                residual.filter = Some(filter.clone());
                pushed = false;
            }
        }

        if !self.order_by.is_empty() {
            if pushed && self.order_by.iter().all(|o| capabilities.can_sort_on(&o.field)) {
                delegated.order_by = self.order_by.clone();
            } else {
                residual.order_by = self.order_by.clone();
                pushed = false;
            }
        }

        if let Some(top) = self.top {
            if pushed && capabilities.top {
                delegated.top = Some(top);
            } else {
                residual.top = Some(top);
            }
        }

        (delegated, residual)
    }

    /// Run these parameters locally over already fetched rows
    pub fn apply(&self, rows: Vec<RecordValue>) -> Vec<RecordValue> {
        let mut rows: Vec<RecordValue> = match &self.filter {
            Some(filter) => rows.into_iter().filter(|r| filter.matches(r)).collect(),
            None => rows,
        };

        if !self.order_by.is_empty() {
            rows.sort_by(|a, b| {
                for order in &self.order_by {
                    let left = a.get(&order.field).unwrap_or(&FormulaValue::Blank);
                    let right = b.get(&order.field).unwrap_or(&FormulaValue::Blank);
                    let ordering = left.compare(right).unwrap_or(Ordering::Equal);
                    let ordering = if order.descending { ordering.reverse() } else { ordering };
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                Ordering::Equal
            });
        }

        if let Some(top) = self.top {
            rows.truncate(top);
        }
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: f64, name: &str) -> RecordValue {
        RecordValue::new()
            .with_field("id", FormulaValue::Number(id))
            .with_field("name", FormulaValue::Text(name.to_string()))
    }

    #[test]
    fn test_odata_rendering() {
        let query = QueryParameters::new()
            .with_filter(
                FilterExpression::compare("id", ComparisonOp::Gt, FormulaValue::Number(3.0))
                    .and(FilterExpression::eq("name", FormulaValue::Text("O'Neil".into()))),
            )
            .with_order_by(OrderBy::desc("id"))
            .with_order_by(OrderBy::asc("name"))
            .with_top(10);

        assert_eq!(
            query.to_odata_pairs(),
            vec![
                ("$filter".to_string(), "(id gt 3 and name eq 'O''Neil')".to_string()),
                ("$orderby".to_string(), "id desc,name".to_string()),
                ("$top".to_string(), "10".to_string()),
            ]
        );
    }

    #[test]
    fn test_split_without_capabilities_keeps_everything_local() {
        let query = QueryParameters::new()
            .with_filter(FilterExpression::eq("id", FormulaValue::Number(1.0)))
            .with_top(5);
        let (delegated, residual) = query.split(&DelegationCapabilities::none());
        assert!(delegated.is_empty());
        assert_eq!(residual, query);
    }

    #[test]
    fn test_split_local_filter_forces_local_top() {
        let caps = DelegationCapabilities {
            filter: false,
            ..DelegationCapabilities::all()
        };
        let query = QueryParameters::new()
            .with_filter(FilterExpression::eq("id", FormulaValue::Number(1.0)))
            .with_order_by(OrderBy::asc("id"))
            .with_top(5);
        let (delegated, residual) = query.split(&caps);
        assert!(delegated.is_empty());
        assert_eq!(residual.top, Some(5));
        assert_eq!(residual.order_by.len(), 1);
    }

    #[test]
    fn test_split_respects_non_filterable_fields() {
        let caps = DelegationCapabilities {
            non_filterable_fields: vec!["name".to_string()],
            ..DelegationCapabilities::all()
        };
        let query = QueryParameters::new()
            .with_filter(FilterExpression::eq("name", FormulaValue::Text("a".into())))
            .with_order_by(OrderBy::asc("id"));
        let (delegated, residual) = query.split(&caps);
        assert!(delegated.filter.is_none());
        assert!(residual.filter.is_some());
        assert!(delegated.order_by.is_empty());

        let (delegated, residual) = QueryParameters::new().with_top(3).split(&caps);
        assert_eq!(delegated.top, Some(3));
        assert!(residual.is_empty());
    }

    #[test]
    fn test_local_apply() {
        let rows = vec![row(1.0, "b"), row(2.0, "a"), row(3.0, "c"), row(4.0, "a")];
        let query = QueryParameters::new()
            .with_filter(
                FilterExpression::compare("id", ComparisonOp::Ge, FormulaValue::Number(2.0))
                    .and(FilterExpression::eq("name", FormulaValue::Text("c".into())).negate()),
            )
            .with_order_by(OrderBy::asc("name"))
            .with_order_by(OrderBy::desc("id"))
            .with_top(1);

        let result = query.apply(rows);
        assert_eq!(result, vec![row(4.0, "a")]);
    }
}
