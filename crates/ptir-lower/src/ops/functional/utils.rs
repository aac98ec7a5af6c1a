//! Dimension-list arithmetic shared by the lowerings.

use crate::backend::shape_helpers::checked_element_count_or_error;
use crate::backend::spec::ReshapeDim;
use crate::error::{LoweringError, LoweringResult};

/// Returns `product(dims)`; an empty list has one element.
pub fn element_count(dims: &[usize]) -> LoweringResult<usize> {
    checked_element_count_or_error(dims, || LoweringError::ElementCountOverflow {
        op: "element_count",
    })
}

/// Resolves a requested shape against the dims of the value being reshaped.
///
/// At most one entry may be [`ReshapeDim::Infer`]; it receives whatever extent makes the element
/// counts agree. A wildcard next to a zero-sized explicit dim cannot be inferred and is rejected.
pub fn complete_shape(output: &[ReshapeDim], input: &[usize]) -> LoweringResult<Vec<usize>> {
    let mut wildcards = output
        .iter()
        .enumerate()
        .filter(|(_, dim)| matches!(dim, ReshapeDim::Infer))
        .map(|(idx, _)| idx);
    let wildcard = wildcards.next();
    if let (Some(first), Some(second)) = (wildcard, wildcards.next()) {
        return Err(LoweringError::AmbiguousShape { first, second });
    }

    let total = element_count(input)?;
    let known = output
        .iter()
        .filter_map(|dim| match dim {
            ReshapeDim::Explicit(size) => Some(*size),
            ReshapeDim::Infer => None,
        })
        .try_fold(1usize, |acc, size| acc.checked_mul(size))
        .ok_or(LoweringError::ElementCountOverflow { op: "view" })?;

    let Some(slot) = wildcard else {
        if known != total {
            return Err(LoweringError::shape_mismatch(
                "view",
                format!("requested {known} elements, input {input:?} has {total}"),
            ));
        }
        return Ok(explicit_dims(output));
    };

    if known == 0 || total % known != 0 {
        return Err(LoweringError::shape_mismatch(
            "view",
            format!(
                "cannot infer dimension {slot}: {total} elements not divisible by {known}"
            ),
        ));
    }
    let mut dims = explicit_dims(output);
    dims[slot] = total / known;
    Ok(dims)
}

fn explicit_dims(output: &[ReshapeDim]) -> Vec<usize> {
    output
        .iter()
        .map(|dim| match dim {
            ReshapeDim::Explicit(size) => *size,
            ReshapeDim::Infer => 0,
        })
        .collect()
}

/// Inserts a size-1 entry at `dim`, which may equal `dims.len()`.
pub fn unsqueeze_dims(dims: &[usize], dim: usize) -> LoweringResult<Vec<usize>> {
    if dim > dims.len() {
        return Err(LoweringError::invalid_dimension(
            "unsqueeze",
            dim,
            format!("[0, {}]", dims.len()),
        ));
    }
    let mut out = Vec::with_capacity(dims.len() + 1);
    out.extend_from_slice(&dims[..dim]);
    out.push(1);
    out.extend_from_slice(&dims[dim..]);
    Ok(out)
}

/// Ensures `dim` names an existing axis of a rank-`rank` value.
pub(crate) fn ensure_axis(op: &'static str, dim: usize, rank: usize) -> LoweringResult<()> {
    if dim >= rank {
        return Err(LoweringError::invalid_dimension(
            op,
            dim,
            format!("[0, {rank})"),
        ));
    }
    Ok(())
}
