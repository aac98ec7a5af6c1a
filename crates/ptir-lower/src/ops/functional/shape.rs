//! Rank and shape rewrites that never move data: view, squeeze, unsqueeze, expand.

use crate::backend::spec::ReshapeDim;
use crate::error::{LoweringError, LoweringResult};
use crate::ops::functional::utils::{complete_shape, ensure_axis, unsqueeze_dims};
use crate::ops::graph::{GraphBuilder, Node};

/// Reinterprets `input` with `output`, resolving at most one [`ReshapeDim::Infer`] entry.
pub fn view(
    builder: &mut GraphBuilder,
    input: Node,
    output: &[ReshapeDim],
) -> LoweringResult<Node> {
    let input_dims = builder.dims(input)?;
    let dims = complete_shape(output, &input_dims)?;
    tracing::debug!(op = "view", from = ?input_dims, to = ?dims, "lowering");
    builder.reshape(input, &dims)
}

/// Drops axis `dim` when its extent is 1. Any other extent returns `input` untouched so callers
/// can probe without checking first.
pub fn squeeze_trivial_dim(
    builder: &mut GraphBuilder,
    input: Node,
    dim: usize,
) -> LoweringResult<Node> {
    let dims = builder.dims(input)?;
    ensure_axis("squeeze", dim, dims.len())?;
    if dims[dim] != 1 {
        return Ok(input);
    }
    let mut squeezed = dims.clone();
    squeezed.remove(dim);
    tracing::debug!(op = "squeeze", dim, from = ?dims, to = ?squeezed, "lowering");
    builder.reshape(input, &squeezed)
}

/// Drops every size-1 axis, keeping the remaining axes in order.
pub fn squeeze_all_trivial_dims(builder: &mut GraphBuilder, input: Node) -> LoweringResult<Node> {
    let dims = builder.dims(input)?;
    let squeezed: Vec<usize> = dims.iter().copied().filter(|&size| size != 1).collect();
    tracing::debug!(op = "squeeze_all", from = ?dims, to = ?squeezed, "lowering");
    builder.reshape(input, &squeezed)
}

/// Inserts a size-1 axis at `dim`; `dim == rank` appends it.
pub fn unsqueeze(builder: &mut GraphBuilder, input: Node, dim: usize) -> LoweringResult<Node> {
    let dims = builder.dims(input)?;
    let expanded = unsqueeze_dims(&dims, dim)?;
    tracing::debug!(op = "unsqueeze", dim, from = ?dims, to = ?expanded, "lowering");
    builder.reshape(input, &expanded)
}

/// Broadcasts `input` to `output_dims`, aligning trailing axes.
///
/// The input is first reshaped to the output rank by prepending 1s; each aligned axis `i` then
/// maps to output axis `i`. Extent conflicts are reported by the broadcast primitive.
pub fn expand(
    builder: &mut GraphBuilder,
    input: Node,
    output_dims: &[usize],
) -> LoweringResult<Node> {
    let dims = builder.dims(input)?;
    if output_dims.len() < dims.len() {
        return Err(LoweringError::RankMismatch {
            op: "expand",
            expected: format!("at least {}", dims.len()),
            actual: output_dims.len(),
        });
    }
    tracing::debug!(op = "expand", from = ?dims, to = ?output_dims, "lowering");

    let leading = output_dims.len() - dims.len();
    let mut aligned = vec![1; leading];
    aligned.extend_from_slice(&dims);
    let reshaped = builder.reshape(input, &aligned)?;
    let mapping: Vec<usize> = (0..output_dims.len()).collect();
    builder.broadcast_in_dim(reshaped, output_dims, &mapping)
}
