//! Runtime error registry.
//!
//! Maps a module error reference `(module index, error index)` to the
//! section, name and documentation declared by the runtime. It is normally
//! built from runtime metadata (`RuntimeInfo::error_registry`); a JSON
//! snapshot of the same tables can override it:
//!
//! ```json
//! { "modules": [
//!     { "index": 3, "name": "market",
//!       "errors": [ { "index": 1, "name": "FileTooLarge", "docs": ["..."] } ] }
//! ] }
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::chain::types::{ChainError, ChainResult};

/// A named runtime error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMetadata {
    pub section: String,
    pub name: String,
    pub documentation: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RegistryDocument {
    #[serde(default)]
    modules: Vec<ModuleErrors>,
}

#[derive(Debug, Deserialize)]
struct ModuleErrors {
    index: u8,
    name: String,
    #[serde(default)]
    errors: Vec<ErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct ErrorEntry {
    index: u8,
    name: String,
    #[serde(default, alias = "documentation")]
    docs: Vec<String>,
}

/// Lookup table from module error references to their metadata.
#[derive(Debug, Clone, Default)]
pub struct ErrorRegistry {
    errors: HashMap<(u8, u8), ErrorMetadata>,
}

impl ErrorRegistry {
    /// An empty registry. Every lookup misses.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from an already parsed JSON document.
    pub fn from_json(document: serde_json::Value) -> ChainResult<Self> {
        let document: RegistryDocument = serde_json::from_value(document)
            .map_err(|e| ChainError::Registry(e.to_string()))?;

        let mut registry = Self::empty();
        for module in document.modules {
            for entry in module.errors {
                registry.insert(
                    module.index,
                    entry.index,
                    ErrorMetadata {
                        section: module.name.clone(),
                        name: entry.name,
                        documentation: entry.docs,
                    },
                );
            }
        }
        Ok(registry)
    }

    /// Load a registry snapshot from a JSON file.
    pub fn from_file(path: &Path) -> ChainResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ChainError::Registry(format!("{}: {}", path.display(), e)))?;
        let document = serde_json::from_str(&content)
            .map_err(|e| ChainError::Registry(format!("{}: {}", path.display(), e)))?;
        Self::from_json(document)
    }

    pub fn insert(&mut self, module: u8, error: u8, metadata: ErrorMetadata) {
        self.errors.insert((module, error), metadata);
    }

    /// Find the error declared at `(module, error)`.
    pub fn find(&self, module: u8, error: u8) -> Option<&ErrorMetadata> {
        self.errors.get(&(module, error))
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}
