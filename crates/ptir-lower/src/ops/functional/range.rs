//! Range extraction lowerings: split, slice and resize.

use std::cmp::Ordering;

use crate::backend::spec::PaddingSpec;
use crate::error::{LoweringError, LoweringResult};
use crate::ops::functional::utils::{element_count, ensure_axis};
use crate::ops::graph::{GraphBuilder, Node};

/// Counts the leading `split_sizes` whose running total fits inside `dim_size`.
pub fn split_count(dim_size: usize, split_sizes: &[usize]) -> usize {
    let mut remaining = dim_size;
    let mut count = 0;
    for &size in split_sizes {
        if size > remaining {
            break;
        }
        remaining -= size;
        count += 1;
    }
    count
}

/// Cuts `input` into consecutive pieces along `dim`.
///
/// Emission stops at the first piece that would run past the end of the axis; the returned list
/// then holds fewer entries than `split_sizes` (see [`split_count`]).
pub fn split(
    builder: &mut GraphBuilder,
    input: Node,
    split_sizes: &[usize],
    dim: usize,
) -> LoweringResult<Vec<Node>> {
    let dims = builder.dims(input)?;
    ensure_axis("split", dim, dims.len())?;
    let count = split_count(dims[dim], split_sizes);
    tracing::debug!(
        op = "split",
        dims = ?dims,
        dim,
        requested = split_sizes.len(),
        emitted = count,
        "lowering"
    );

    let mut starts = vec![0; dims.len()];
    let mut limits = dims.clone();
    let strides = vec![1; dims.len()];
    let mut offset = 0;
    let mut pieces = Vec::with_capacity(count);
    for &size in &split_sizes[..count] {
        starts[dim] = offset;
        limits[dim] = offset + size;
        pieces.push(builder.slice(input, &starts, &limits, &strides)?);
        offset += size;
    }
    Ok(pieces)
}

/// Extracts the contiguous window `[starts[i], starts[i] + sizes[i])` on every axis.
pub fn slice(
    builder: &mut GraphBuilder,
    input: Node,
    starts: &[usize],
    sizes: &[usize],
) -> LoweringResult<Node> {
    if starts.len() != sizes.len() {
        return Err(LoweringError::DimensionCountMismatch {
            op: "slice",
            left: starts.len(),
            right: sizes.len(),
        });
    }
    let limits = starts
        .iter()
        .zip(sizes)
        .map(|(&start, &size)| start.checked_add(size))
        .collect::<Option<Vec<_>>>()
        .ok_or(LoweringError::ElementCountOverflow { op: "slice" })?;
    tracing::debug!(op = "slice", starts = ?starts, limits = ?limits, "lowering");
    let strides = vec![1; starts.len()];
    builder.slice(input, starts, &limits, &strides)
}

/// Reinterprets `input` as `size` after truncating or zero-extending its flattened elements.
///
/// This works on the linear element order only: growing appends zeros after the last element
/// and shrinking keeps the leading elements, regardless of how the axes line up.
pub fn resize(builder: &mut GraphBuilder, input: Node, size: &[usize]) -> LoweringResult<Node> {
    let spec = builder.spec(input)?;
    let dtype = spec.dtype;
    let current = element_count(spec.dims())?;
    let target = element_count(size)?;
    tracing::debug!(op = "resize", from = current, to = target, dims = ?size, "lowering");

    let resized = match current.cmp(&target) {
        Ordering::Equal => input,
        Ordering::Greater => {
            let flat = builder.reshape(input, &[current])?;
            builder.slice(flat, &[0], &[target], &[1])?
        }
        Ordering::Less => {
            let flat = builder.reshape(input, &[current])?;
            builder.pad(
                flat,
                dtype.zero(),
                &[PaddingSpec::new(0, 0, target - current)],
            )?
        }
    };
    builder.reshape(resized, size)
}
