//! Typed failures raised while constructing lowered graphs.
//!
//! Every variant describes a caller logic error detected at graph-construction time. Nothing
//! here is transient, so callers should surface these rather than retry.

use thiserror::Error;

use crate::ops::graph::BuilderId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoweringError {
    /// Element-count, per-dimension or element-type disagreement.
    #[error("shape mismatch in {op}: {detail}")]
    ShapeMismatch { op: &'static str, detail: String },

    #[error("more than one incomplete dimension found: {first} and {second}")]
    AmbiguousShape { first: usize, second: usize },

    #[error("rank mismatch in {op}: expected {expected}, got {actual}")]
    RankMismatch {
        op: &'static str,
        expected: String,
        actual: usize,
    },

    #[error("dimension {dim} out of range for {op} (valid range {valid})")]
    InvalidDimension {
        op: &'static str,
        dim: usize,
        valid: String,
    },

    #[error("{op} expects matching list lengths: {left} vs {right}")]
    DimensionCountMismatch {
        op: &'static str,
        left: usize,
        right: usize,
    },

    #[error("{op} requires at least one input")]
    EmptyInputList { op: &'static str },

    #[error("cannot broadcast operand axis {axis} of size {operand} into result size {result}")]
    IncompatibleBroadcast {
        axis: usize,
        operand: usize,
        result: usize,
    },

    #[error("node belongs to builder {found} but was used with builder {expected}")]
    ForeignBuilder {
        expected: BuilderId,
        found: BuilderId,
    },

    #[error("{op} range [{start}, {limit}) exceeds axis {axis} of size {size}")]
    IndexOutOfBounds {
        op: &'static str,
        axis: usize,
        start: usize,
        limit: usize,
        size: usize,
    },

    #[error("invalid attribute for {op}: {detail}")]
    InvalidAttribute { op: &'static str, detail: String },

    #[error("element count overflow in {op}")]
    ElementCountOverflow { op: &'static str },
}

impl LoweringError {
    pub(crate) fn shape_mismatch(op: &'static str, detail: impl Into<String>) -> Self {
        LoweringError::ShapeMismatch {
            op,
            detail: detail.into(),
        }
    }

    pub(crate) fn invalid_dimension(op: &'static str, dim: usize, valid: impl Into<String>) -> Self {
        LoweringError::InvalidDimension {
            op,
            dim,
            valid: valid.into(),
        }
    }

    pub(crate) fn invalid_attribute(op: &'static str, detail: impl Into<String>) -> Self {
        LoweringError::InvalidAttribute {
            op,
            detail: detail.into(),
        }
    }
}

/// Convenience alias for results returned by lowering routines.
pub type LoweringResult<T> = Result<T, LoweringError>;
