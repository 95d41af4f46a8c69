use crate::error::{ConnectorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard};
use tracing::debug;

/// Ordered logical ↔ display name mapping
#[derive(Debug, Clone, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct DisplayNameProvider {
    pairs: Vec<(String, String)>,
}

impl DisplayNameProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pair; a logical name already present keeps its first display name
    pub fn with_pair(mut self, logical: impl Into<String>, display: impl Into<String>) -> Self {
        let logical = logical.into();
        if !self.pairs.iter().any(|(l, _)| *l == logical) {
            self.pairs.push((logical, display.into()));
        }
        self
    }

    pub fn display_name(&self, logical: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(l, _)| l == logical)
            .map(|(_, d)| d.as_str())
    }

    pub fn logical_name(&self, display: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(_, d)| d == display)
            .map(|(l, _)| l.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(l, d)| (l.as_str(), d.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// A named enumeration
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct OptionSet {
    name: String,
    names: DisplayNameProvider,
}

impl OptionSet {
    pub fn new(name: impl Into<String>, names: DisplayNameProvider) -> Self {
        Self {
            name: name.into(),
            names,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn names(&self) -> &DisplayNameProvider {
        &self.names
    }

    pub fn contains(&self, logical: &str) -> bool {
        self.names.display_name(logical).is_some()
    }
}

/// Deduplicating registry of option sets, keyed by name
///
/// Shared across concurrent resolutions; insertion is insert-if-absent and a
/// conflicting insert leaves the registry untouched.
#[derive(Debug, Default)]
pub struct OptionSetRegistry {
    entries: RwLock<HashMap<String, Arc<OptionSet>>>,
}

impl OptionSetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an option set
    ///
    /// Returns the already registered instance when an equal option set
    /// exists, the newly inserted instance when the name is new, and
    /// [`ConnectorError::NameConflict`] when the name maps different values.
    pub fn try_add(&self, option_set: OptionSet) -> Result<Arc<OptionSet>> {
        if let Some(existing) = self.get(option_set.name())? {
            return Self::reconcile(existing, &option_set);
        }

        let mut entries = self.entries.write().map_err(|_| poisoned())?;

        // Another writer may have won the race since the read above
        if let Some(existing) = entries.get(option_set.name()) {
            return Self::reconcile(existing.clone(), &option_set);
        }

        let name = option_set.name().to_string();
        let entry = Arc::new(option_set);
        entries.insert(name.clone(), entry.clone());
        debug!("Registered option set: {}", name);
        Ok(entry)
    }

    fn reconcile(existing: Arc<OptionSet>, candidate: &OptionSet) -> Result<Arc<OptionSet>> {
        if *existing == *candidate {
            Ok(existing)
        } else {
            Err(ConnectorError::NameConflict(candidate.name().to_string()))
        }
    }

    pub fn get(&self, name: &str) -> Result<Option<Arc<OptionSet>>> {
        Ok(self.read()?.get(name).cloned())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read()?.is_empty())
    }

    /// Registered names, sorted
    pub fn names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.read()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Arc<OptionSet>>>> {
        self.entries.read().map_err(|_| poisoned())
    }
}

fn poisoned() -> ConnectorError {
    ConnectorError::Internal("option set registry lock poisoned".to_string())
}
