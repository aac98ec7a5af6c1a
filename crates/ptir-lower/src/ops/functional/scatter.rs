//! Scatter-write lowerings: update_slice and unselect.

use crate::backend::spec::{DType, Literal, PaddingSpec};
use crate::error::{LoweringError, LoweringResult};
use crate::ops::functional::utils::ensure_axis;
use crate::ops::graph::{GraphBuilder, Node};

/// Writes `source` into `target` at the window starting at `base_indices`.
///
/// `source` is reshaped to `target`'s rank by prepending size-1 axes. Offsets become scalar
/// constants of the builder's configured index dtype and must fit it. Bounds against `target`
/// are left to the dynamic update primitive, which clamps at run time.
pub fn update_slice(
    builder: &mut GraphBuilder,
    target: Node,
    source: Node,
    base_indices: &[usize],
) -> LoweringResult<Node> {
    let target_rank = builder.rank(target)?;
    let source_dims = builder.dims(source)?;
    if source_dims.len() > target_rank {
        return Err(LoweringError::RankMismatch {
            op: "update_slice",
            expected: format!("at most {target_rank}"),
            actual: source_dims.len(),
        });
    }
    let index_dtype = builder.options().index_dtype;
    let offsets = base_indices
        .iter()
        .map(|&index| index_literal(index_dtype, index))
        .collect::<LoweringResult<Vec<_>>>()?;
    tracing::debug!(
        op = "update_slice",
        source = ?source_dims,
        offsets = ?base_indices,
        index_dtype = ?index_dtype,
        "lowering"
    );

    let mut aligned = vec![1; target_rank - source_dims.len()];
    aligned.extend_from_slice(&source_dims);
    let reshaped = builder.reshape(source, &aligned)?;
    let indices: Vec<Node> = offsets
        .into_iter()
        .map(|offset| builder.scalar(index_dtype, offset))
        .collect();
    builder.dynamic_update_slice(target, reshaped, &indices)
}

/// Encodes an offset as a literal of `dtype`, rejecting values the dtype cannot hold.
fn index_literal(dtype: DType, index: usize) -> LoweringResult<Literal> {
    let bits = dtype.size_in_bytes() * 8;
    let value_bits = if dtype.is_signed_integer() {
        bits - 1
    } else if dtype.is_unsigned_integer() {
        bits
    } else {
        return Err(LoweringError::invalid_attribute(
            "update_slice",
            format!("index dtype {dtype:?} is not an integer type"),
        ));
    };
    let value = u64::try_from(index)
        .ok()
        .filter(|&value| u128::from(value) < 1u128 << value_bits)
        .ok_or_else(|| {
            LoweringError::invalid_attribute(
                "update_slice",
                format!("offset {index} does not fit index dtype {dtype:?}"),
            )
        })?;
    Ok(match i64::try_from(value) {
        Ok(signed) if dtype.is_signed_integer() => Literal::Signed(signed),
        _ => Literal::Unsigned(value),
    })
}

enum UnselectPlan {
    /// The selection covered the whole axis, so `source` already is the result.
    Identity,
    Scatter { padding: Vec<PaddingSpec> },
}

fn plan_unselect(
    target_dims: &[usize],
    source_dims: &[usize],
    dim: usize,
    start: usize,
    end: usize,
    stride: usize,
) -> LoweringResult<UnselectPlan> {
    ensure_axis("unselect", dim, target_dims.len())?;
    if source_dims.len() != target_dims.len() {
        return Err(LoweringError::RankMismatch {
            op: "unselect",
            expected: target_dims.len().to_string(),
            actual: source_dims.len(),
        });
    }
    if stride == 0 {
        return Err(LoweringError::invalid_attribute(
            "unselect",
            "stride must be positive",
        ));
    }

    let target_size = target_dims[dim];
    let source_size = source_dims[dim];
    if target_size == source_size {
        if start != 0 || stride != 1 || end != target_size {
            return Err(LoweringError::shape_mismatch(
                "unselect",
                format!(
                    "full-axis selection must be start=0 end={target_size} stride=1, got start={start} end={end} stride={stride}"
                ),
            ));
        }
        return Ok(UnselectPlan::Identity);
    }

    let mut padding = Vec::with_capacity(target_dims.len());
    let extents = target_dims.iter().zip(source_dims).enumerate();
    for (axis, (&target_extent, &source_extent)) in extents {
        if axis != dim {
            if target_extent != source_extent {
                return Err(LoweringError::shape_mismatch(
                    "unselect",
                    format!(
                        "axis {axis} differs: target {target_dims:?} vs source {source_dims:?}"
                    ),
                ));
            }
            padding.push(PaddingSpec::none());
            continue;
        }
        let interior = stride - 1;
        let occupied = source_extent
            .saturating_sub(1)
            .checked_mul(interior)
            .and_then(|gaps| gaps.checked_add(source_extent))
            .and_then(|span| span.checked_add(start))
            .ok_or(LoweringError::ElementCountOverflow { op: "unselect" })?;
        let high = target_extent.checked_sub(occupied).ok_or_else(|| {
            LoweringError::shape_mismatch(
                "unselect",
                format!(
                    "{source_extent} elements from {start} with stride {stride} need {occupied} slots, axis {axis} has {target_extent}"
                ),
            )
        })?;
        padding.push(PaddingSpec::new(start, interior, high));
    }
    Ok(UnselectPlan::Scatter { padding })
}

/// Inverts a strided selection along `dim`.
///
/// Positions `start, start + stride, ...` of `target` along `dim` receive the entries of
/// `source`; every other position keeps `target`'s value. `end` is only consulted when the
/// selection spans the whole axis. All shape checks run before anything is emitted.
pub fn unselect(
    builder: &mut GraphBuilder,
    target: Node,
    source: Node,
    dim: usize,
    start: usize,
    end: usize,
    stride: usize,
) -> LoweringResult<Node> {
    let target_spec = builder.spec(target)?.clone();
    let source_spec = builder.spec(source)?.clone();
    let plan = plan_unselect(
        target_spec.dims(),
        source_spec.dims(),
        dim,
        start,
        end,
        stride,
    )?;
    let padding = match plan {
        UnselectPlan::Identity => {
            tracing::debug!(op = "unselect", dim, path = "identity", "lowering");
            return Ok(source);
        }
        UnselectPlan::Scatter { padding } => padding,
    };
    if source_spec.dtype != target_spec.dtype {
        return Err(LoweringError::shape_mismatch(
            "unselect",
            format!("dtype {:?} vs {:?}", target_spec.dtype, source_spec.dtype),
        ));
    }
    tracing::debug!(
        op = "unselect",
        dim,
        start,
        stride,
        target = ?target_spec.dims(),
        source = ?source_spec.dims(),
        path = "scatter",
        "lowering"
    );

    let padded_source = builder.pad(source, source_spec.dtype.zero(), &padding)?;
    let on = builder.scalar(DType::I1, Literal::I1(true));
    let source_mask = builder.broadcast_in_dim(on, source_spec.dims(), &[])?;
    let mask = builder.pad(source_mask, Literal::I1(false), &padding)?;
    builder.select(mask, padded_source, target)
}
