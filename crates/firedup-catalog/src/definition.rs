//! Catalog definition files
//!
//! Lets a catalog be authored as JSON or YAML instead of Rust code. Parsed
//! definitions go through the same [`CatalogBuilder`] as the built-in data.

use crate::builder::CatalogBuilder;
use crate::catalog::Catalog;
use crate::error::CatalogError;
use crate::node::{Cause, GoalNode};
use serde::{Deserialize, Serialize};

/// Serialized form of a whole catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogDefinition {
    /// Causes in registration order
    pub causes: Vec<CauseDefinition>,
}

/// One cause and its nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CauseDefinition {
    /// Cause metadata
    #[serde(flatten)]
    pub cause: Cause,
    /// Nodes in authoring order
    pub nodes: Vec<GoalNode>,
}

impl CatalogDefinition {
    /// Parse a JSON definition
    ///
    /// # Errors
    /// - `CatalogError::Definition` if the text is not a valid definition
    pub fn from_json(text: &str) -> Result<Self, CatalogError> {
        serde_json::from_str(text).map_err(|e| CatalogError::Definition(e.to_string()))
    }

    /// Parse a YAML definition
    ///
    /// # Errors
    /// - `CatalogError::Definition` if the text is not a valid definition
    pub fn from_yaml(text: &str) -> Result<Self, CatalogError> {
        serde_yaml::from_str(text).map_err(|e| CatalogError::Definition(e.to_string()))
    }

    /// Render as pretty JSON
    ///
    /// # Errors
    /// - `CatalogError::Definition` if serialization fails
    pub fn to_json(&self) -> Result<String, CatalogError> {
        serde_json::to_string_pretty(self).map_err(|e| CatalogError::Definition(e.to_string()))
    }

    /// Validate and build the catalog
    ///
    /// # Errors
    /// - `CatalogError::Integrity` if any tree is malformed
    pub fn into_catalog(self) -> Result<Catalog, CatalogError> {
        let mut builder = CatalogBuilder::new();
        for def in self.causes {
            builder.add_cause(def.cause, def.nodes);
        }
        builder.build()
    }
}

impl From<&Catalog> for CatalogDefinition {
    fn from(catalog: &Catalog) -> Self {
        Self {
            causes: catalog
                .trees
                .values()
                .map(|tree| CauseDefinition {
                    cause: tree.cause.clone(),
                    nodes: tree.nodes.values().cloned().collect(),
                })
                .collect(),
        }
    }
}
