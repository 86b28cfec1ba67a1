//! Fired Up goal-tree catalog
//!
//! Static, read-only definition of the charitable causes and the goal trees
//! users progress through:
//! - Causes and goal nodes with their thresholds
//! - Construction-time integrity checks (acyclic, rooted, resolvable parents)
//! - The built-in catalog and a reusable subcategory template
//! - JSON/YAML catalog definitions
//!
//! # Example
//!
//! ```rust,ignore
//! use firedup_catalog::{Catalog, CauseId};
//!
//! let catalog = Catalog::builtin()?;
//! for node in catalog.tree(&CauseId::from("environmental"))?.nodes() {
//!     println!("{} ({})", node.title, node.goal_type());
//! }
//! ```

pub mod builder;
pub mod builtin;
pub mod catalog;
pub mod definition;
pub mod error;
pub mod ids;
pub mod node;
pub mod template;

pub use builder::CatalogBuilder;
pub use catalog::{Catalog, CauseTree};
pub use definition::{CatalogDefinition, CauseDefinition};
pub use error::{CatalogError, IntegrityViolation};
pub use ids::{CauseId, NodeId, NonprofitId};
pub use node::{Cause, GoalKind, GoalNode, GoalType};
pub use template::{subcategory_branch, Branch};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
