//! Lowerings that join values along an axis: stack, cat and repeat.

use crate::error::{LoweringError, LoweringResult};
use crate::ops::functional::shape::unsqueeze;
use crate::ops::graph::{GraphBuilder, Node};

/// Stacks `inputs` along a new axis `dim`.
///
/// `dim` may range over `[0, rank]` of the first input. Each input is unsqueezed at `dim` and the
/// results are concatenated, so mismatched inputs are rejected by the concatenate primitive.
pub fn stack(builder: &mut GraphBuilder, inputs: &[Node], dim: usize) -> LoweringResult<Node> {
    let first = *inputs
        .first()
        .ok_or(LoweringError::EmptyInputList { op: "stack" })?;
    let rank = builder.rank(first)?;
    if dim > rank {
        return Err(LoweringError::invalid_dimension(
            "stack",
            dim,
            format!("[0, {rank}]"),
        ));
    }
    tracing::debug!(op = "stack", inputs = inputs.len(), dim, "lowering");

    let mut expanded = Vec::with_capacity(inputs.len());
    for &input in inputs {
        expanded.push(unsqueeze(builder, input, dim)?);
    }
    builder.concat(&expanded, dim)
}

/// Concatenates `inputs` along the existing axis `dim`.
pub fn cat(builder: &mut GraphBuilder, inputs: &[Node], dim: usize) -> LoweringResult<Node> {
    if inputs.is_empty() {
        return Err(LoweringError::EmptyInputList { op: "cat" });
    }
    tracing::debug!(op = "cat", inputs = inputs.len(), dim, "lowering");
    builder.concat(inputs, dim)
}

/// Tiles `input` according to `repeats`.
///
/// The trailing `rank` factors tile the existing axes, left to right, by self-concatenation.
/// Any leading factors become new outer axes filled by broadcast after tiling. A zero factor on
/// an existing axis is rejected by the concatenate primitive.
pub fn repeat(builder: &mut GraphBuilder, input: Node, repeats: &[usize]) -> LoweringResult<Node> {
    let dims = builder.dims(input)?;
    let rank = dims.len();
    if repeats.len() < rank {
        return Err(LoweringError::RankMismatch {
            op: "repeat",
            expected: format!("at least {rank} repeat factors"),
            actual: repeats.len(),
        });
    }
    tracing::debug!(op = "repeat", dims = ?dims, repeats = ?repeats, "lowering");

    let extra = repeats.len() - rank;
    let mut tiled = input;
    for (axis, &factor) in repeats[extra..].iter().enumerate() {
        let copies = vec![tiled; factor];
        tiled = builder.concat(&copies, axis)?;
    }
    if extra == 0 {
        return Ok(tiled);
    }

    let mut result_dims = repeats[..extra].to_vec();
    result_dims.extend(builder.dims(tiled)?);
    let mapping: Vec<usize> = (extra..extra + rank).collect();
    builder.broadcast_in_dim(tiled, &result_dims, &mapping)
}
