//! Schema node → connector type resolution
//!
//! A [`SchemaTypeResolver`] walks a [`SchemaNode`] tree under one
//! [`CompatibilityMode`] and produces a [`ConnectorType`] tree plus a list of
//! per-field errors. Fields that cannot be typed degrade to
//! [`FormulaType::Untyped`]; resolution itself never fails.

use crate::compatibility::{decide, CompatibilityMode};
use crate::error::ConnectorError;
use crate::option_set::{DisplayNameProvider, OptionSet, OptionSetRegistry};
use crate::schema::{SchemaKind, SchemaNode};
use crate::types::{ConnectorType, FormulaType, RecordField, RecordType};
use tracing::{debug, warn};

/// Resolved connector type together with the field errors met on the way
#[derive(Debug, Clone)]
pub struct Resolution {
    pub connector_type: ConnectorType,
    pub errors: Vec<ConnectorError>,
}

impl Resolution {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

pub struct SchemaTypeResolver<'a> {
    mode: CompatibilityMode,
    registry: &'a OptionSetRegistry,
    scope: Option<String>,
}

impl<'a> SchemaTypeResolver<'a> {
    pub fn new(mode: CompatibilityMode, registry: &'a OptionSetRegistry) -> Self {
        Self {
            mode,
            registry,
            scope: None,
        }
    }

    /// Prefix generated option set names, usually with the table name
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn mode(&self) -> CompatibilityMode {
        self.mode
    }

    /// Resolve `node` as a value named `name`
    pub fn resolve(&self, name: &str, node: &SchemaNode) -> Resolution {
        let mut errors = Vec::new();
        let mut connector_type = self.resolve_node(name, node, "", &mut errors);
        let decision = decide(node, self.mode);
        connector_type.display_name = decision.display_name;
        connector_type.description = node.description.clone();

        if !errors.is_empty() {
            warn!(
                "Resolved '{}' under {} mode with {} field error(s)",
                name,
                self.mode,
                errors.len()
            );
        }

        Resolution {
            connector_type,
            errors,
        }
    }

    fn resolve_node(
        &self,
        name: &str,
        node: &SchemaNode,
        path: &str,
        errors: &mut Vec<ConnectorError>,
    ) -> ConnectorType {
        if let Some(problem) = &node.malformed {
            errors.push(ConnectorError::schema(format!("{}: {}", describe(path), problem)));
            return ConnectorType::new(name, FormulaType::Untyped);
        }

        if decide(node, self.mode).as_choice {
            if let Some(choice) = self.resolve_choice(node, path, errors) {
                return ConnectorType::new(name, choice);
            }
        }

        match node.kind {
            SchemaKind::String => ConnectorType::new(name, string_type(node.format.as_deref())),
            SchemaKind::Integer | SchemaKind::Number => ConnectorType::new(name, FormulaType::Number),
            SchemaKind::Boolean => ConnectorType::new(name, FormulaType::Boolean),
            SchemaKind::Object => self.resolve_object(name, node, path, errors),
            SchemaKind::Array => match &node.items {
                Some(items) => {
                    let item = self.resolve_node(name, items, &format!("{}[]", path), errors);
                    let mut connector_type =
                        ConnectorType::new(name, FormulaType::Sequence(Box::new(item.formula_type)));
                    connector_type.fields = item.fields;
                    connector_type
                }
                None => {
                    errors.push(ConnectorError::schema(format!(
                        "{}: array schema without 'items'",
                        describe(path)
                    )));
                    ConnectorType::new(name, FormulaType::Sequence(Box::new(FormulaType::Untyped)))
                }
            },
            SchemaKind::Unknown => {
                let message = match &node.declared_type {
                    Some(t) => format!("{}: unsupported type '{}'", describe(path), t),
                    None => format!("{}: schema has no type", describe(path)),
                };
                errors.push(ConnectorError::schema(message));
                ConnectorType::new(name, FormulaType::Untyped)
            }
        }
    }

    fn resolve_object(
        &self,
        name: &str,
        node: &SchemaNode,
        path: &str,
        errors: &mut Vec<ConnectorError>,
    ) -> ConnectorType {
        let mut record = RecordType::new();
        let mut children = Vec::with_capacity(node.properties.len());

        for (property, child) in &node.properties {
            let decision = decide(child, self.mode);
            if !decision.include {
                debug!("Skipping internal field '{}' under {} mode", property, self.mode);
                continue;
            }

            let child_path = if path.is_empty() {
                property.clone()
            } else {
                format!("{}.{}", path, property)
            };

            let mut resolved = self.resolve_node(property, child, &child_path, errors);
            resolved.display_name = decision.display_name;
            resolved.hidden = child.internal;
            resolved.is_key = child.is_key;
            resolved.key_order = child.key_order;
            resolved.required = node.is_required(property);
            resolved.description = child.description.clone();

            if let Err(e) = record.add_field(RecordField {
                name: resolved.name.clone(),
                display_name: resolved.display_name.clone(),
                field_type: resolved.formula_type.clone(),
            }) {
                errors.push(e);
                continue;
            }
            children.push(resolved);
        }

        let mut connector_type = ConnectorType::new(name, FormulaType::Record(record));
        connector_type.fields = children;
        connector_type
    }

    /// Register the node's option set; `None` degrades to the primitive type
    fn resolve_choice(
        &self,
        node: &SchemaNode,
        path: &str,
        errors: &mut Vec<ConnectorError>,
    ) -> Option<FormulaType> {
        if !node.has_enum_metadata() {
            errors.push(ConnectorError::schema(format!(
                "{}: enum format without enum values",
                describe(path)
            )));
            return None;
        }

        let names = node.enum_values.iter().fold(DisplayNameProvider::new(), |names, v| {
            let display = v.display_name.clone().unwrap_or_else(|| v.value.clone());
            names.with_pair(v.value.clone(), display)
        });

        let set_name = match (&node.enum_name, &self.scope) {
            (Some(explicit), _) => explicit.clone(),
            (None, Some(scope)) => format!("{} ({})", scope, path),
            (None, None) => path.to_string(),
        };

        match self.registry.try_add(OptionSet::new(set_name, names)) {
            Ok(set) => Some(FormulaType::Choice(set)),
            Err(e) => {
                warn!("{}: {}", describe(path), e);
                errors.push(e);
                None
            }
        }
    }
}

fn describe(path: &str) -> &str {
    if path.is_empty() {
        "<root>"
    } else {
        path
    }
}

fn string_type(format: Option<&str>) -> FormulaType {
    match format {
        Some("date-time") | Some("date-no-tz") => FormulaType::DateTime,
        Some("date") => FormulaType::Date,
        Some("uuid") | Some("guid") => FormulaType::Guid,
        _ => FormulaType::Text,
    }
}

/// Resolve a root schema node with an unnamed root
pub fn resolve(
    node: &SchemaNode,
    mode: CompatibilityMode,
    registry: &OptionSetRegistry,
) -> Resolution {
    SchemaTypeResolver::new(mode, registry).resolve("", node)
}
