//! Error types for the progression engine
//!
//! Every variant except `Catalog` is a local validation failure: it is
//! returned before any state is touched, so the ledger is left unchanged.

use firedup_catalog::{CatalogError, CauseId, GoalType, NodeId, NonprofitId};

/// Progression engine errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    /// Cause is not in the catalog
    #[error("unknown cause: {0}")]
    UnknownCause(CauseId),

    /// Node is not in the cause's tree
    #[error("unknown node '{node}' in cause '{cause}'")]
    UnknownNode {
        /// Cause that was searched
        cause: CauseId,
        /// Node that was not found
        node: NodeId,
    },

    /// Nonprofit is not eligible for the node
    #[error("nonprofit '{nonprofit}' is not eligible for node '{node}'")]
    UnknownNonprofit {
        /// Target node
        node: NodeId,
        /// Rejected nonprofit
        nonprofit: NonprofitId,
    },

    /// Amount is non-positive or non-finite, or would push a total past the
    /// largest finite value
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Operation does not apply to this node's goal type
    #[error("node '{node}' is a {actual} goal, expected {expected}")]
    WrongGoalType {
        /// Target node
        node: NodeId,
        /// Goal type the operation needs
        expected: GoalType,
        /// Goal type the node has
        actual: GoalType,
    },

    /// Any other catalog failure
    #[error("catalog error: {0}")]
    Catalog(CatalogError),
}

impl EngineError {
    /// Caller-input errors: rejected before mutating anything
    #[inline]
    #[must_use]
    pub fn is_input_error(&self) -> bool {
        !matches!(self, Self::Catalog(_))
    }
}

impl From<CatalogError> for EngineError {
    fn from(value: CatalogError) -> Self {
        match value {
            CatalogError::UnknownCause(cause) => Self::UnknownCause(cause),
            CatalogError::UnknownNode { cause, node } => Self::UnknownNode { cause, node },
            other => Self::Catalog(other),
        }
    }
}

/// Reject amounts that are not finite and strictly positive
pub(crate) fn validate_amount(amount_usd: f64) -> Result<(), EngineError> {
    if amount_usd.is_finite() && amount_usd > 0.0 {
        Ok(())
    } else {
        Err(EngineError::InvalidAmount(format!(
            "amount must be a finite number greater than zero (got {amount_usd})"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_lookups_map_onto_engine_errors() {
        let err: EngineError = CatalogError::UnknownCause(CauseId::from("x")).into();
        assert_eq!(err, EngineError::UnknownCause(CauseId::from("x")));
        assert!(err.is_input_error());
    }

    #[test]
    fn amounts_must_be_finite_and_positive() {
        assert!(validate_amount(25.0).is_ok());
        for bad in [0.0, -5.0, f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                validate_amount(bad),
                Err(EngineError::InvalidAmount(_))
            ));
        }
    }
}
