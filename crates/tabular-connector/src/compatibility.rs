//! Compatibility modes and the field rules they apply

use crate::error::{ConnectorError, Result};
use crate::schema::SchemaNode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Named policy controlling field visibility and type inference
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum CompatibilityMode {
    /// Connector Data Platform shape
    #[serde(rename = "cdp")]
    Default,
    #[serde(rename = "powerapps")]
    PowerAppsCompatibility,
    #[serde(rename = "swagger")]
    SwaggerCompatibility,
}

impl CompatibilityMode {
    pub const ALL: [CompatibilityMode; 3] = [
        CompatibilityMode::Default,
        CompatibilityMode::PowerAppsCompatibility,
        CompatibilityMode::SwaggerCompatibility,
    ];

    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "cdp" | "default" => Ok(CompatibilityMode::Default),
            "powerapps" | "powerappscompatibility" => Ok(CompatibilityMode::PowerAppsCompatibility),
            "swagger" | "swaggercompatibility" => Ok(CompatibilityMode::SwaggerCompatibility),
            _ => Err(ConnectorError::invalid_configuration(format!(
                "unknown compatibility mode: {}",
                s
            ))),
        }
    }

    /// Internal (`x-ms-visibility: internal`) fields are part of the type
    pub fn includes_internal_fields(&self) -> bool {
        matches!(self, CompatibilityMode::PowerAppsCompatibility)
    }

    /// Enum metadata without `format: "enum"` still yields a choice type
    pub fn infers_choice_without_format(&self) -> bool {
        matches!(self, CompatibilityMode::Default)
    }
}

impl fmt::Display for CompatibilityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompatibilityMode::Default => write!(f, "cdp"),
            CompatibilityMode::PowerAppsCompatibility => write!(f, "powerapps"),
            CompatibilityMode::SwaggerCompatibility => write!(f, "swagger"),
        }
    }
}

/// Outcome of applying a mode to one property
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FieldDecision {
    pub include: bool,
    /// Resolve as an option-set backed choice rather than its primitive kind
    pub as_choice: bool,
    pub display_name: Option<String>,
}

/// Decide visibility, choice inference and display name for one property
pub fn decide(node: &SchemaNode, mode: CompatibilityMode) -> FieldDecision {
    let include = !node.internal || mode.includes_internal_fields();

    let as_choice = if node.has_enum_format() {
        true
    } else {
        node.has_enum_metadata() && mode.infers_choice_without_format()
    };

    FieldDecision {
        include,
        as_choice,
        display_name: node.display_name.clone(),
    }
}
