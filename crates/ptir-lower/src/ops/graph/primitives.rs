//! Primitive PTIR emitters.
//!
//! Each emitter validates its operands against the recorded metadata, computes the result
//! spec, and appends exactly one instruction. Lowerings rely on these checks instead of
//! repeating them, so the error each primitive raises is part of its contract.

use crate::backend::ptir_utils::{scalar_literal_tensor, tensor_spec_static};
use crate::backend::spec::{
    BroadcastToSpec, ConcatSpec, DType, DynamicUpdateSliceSpec, Literal, Operand, Operation,
    PadSpec, PaddingSpec, ReshapeSpec, SliceSpec, TensorLiteral,
};
use crate::error::{LoweringError, LoweringResult};

use super::builder::{GraphBuilder, Node};

impl GraphBuilder {
    /// Embeds a literal tensor as a constant node.
    pub fn constant(&mut self, literal: TensorLiteral) -> Node {
        let spec = literal.spec.clone();
        self.emit(Operation::Constant(literal), Vec::new(), spec)
    }

    /// Embeds a rank-0 constant of `dtype`.
    pub fn scalar(&mut self, dtype: DType, value: Literal) -> Node {
        self.constant(scalar_literal_tensor(dtype, value))
    }

    /// Reinterprets `input` with `dims`; element order and count are preserved.
    pub fn reshape(&mut self, input: Node, dims: &[usize]) -> LoweringResult<Node> {
        let spec = self.spec(input)?;
        let dtype = spec.dtype;
        let src_elems = spec
            .element_count()
            .ok_or(LoweringError::ElementCountOverflow { op: "reshape" })?;
        let result_spec = tensor_spec_static(dtype, dims);
        let dst_elems = result_spec
            .element_count()
            .ok_or(LoweringError::ElementCountOverflow { op: "reshape" })?;
        if src_elems != dst_elems {
            return Err(LoweringError::shape_mismatch(
                "reshape",
                format!("{:?} has {src_elems} elements, {dims:?} has {dst_elems}", spec.dims()),
            ));
        }

        Ok(self.emit(
            Operation::Reshape(ReshapeSpec {
                new_shape: result_spec.shape.clone(),
            }),
            vec![Operand::Value(input.value_id())],
            result_spec,
        ))
    }

    /// Broadcasts `input` into `result_dims`, mapping operand axis `i` to result axis
    /// `broadcast_dims[i]`.
    pub fn broadcast_in_dim(
        &mut self,
        input: Node,
        result_dims: &[usize],
        broadcast_dims: &[usize],
    ) -> LoweringResult<Node> {
        let spec = self.spec(input)?;
        let operand_dims = spec.dims();
        if broadcast_dims.len() != operand_dims.len() {
            return Err(LoweringError::RankMismatch {
                op: "broadcast_in_dim",
                expected: format!("{} broadcast dims", operand_dims.len()),
                actual: broadcast_dims.len(),
            });
        }
        let mut previous: Option<usize> = None;
        for &mapped in broadcast_dims {
            if mapped >= result_dims.len() || previous.is_some_and(|prev| mapped <= prev) {
                return Err(LoweringError::invalid_dimension(
                    "broadcast_in_dim",
                    mapped,
                    format!(
                        "strictly increasing within [0, {})",
                        result_dims.len()
                    ),
                ));
            }
            previous = Some(mapped);
        }
        for (axis, (&operand, &mapped)) in operand_dims.iter().zip(broadcast_dims).enumerate() {
            let result = result_dims[mapped];
            if operand != 1 && operand != result {
                return Err(LoweringError::IncompatibleBroadcast {
                    axis,
                    operand,
                    result,
                });
            }
        }

        let result_spec = tensor_spec_static(spec.dtype, result_dims);
        Ok(self.emit(
            Operation::BroadcastTo(BroadcastToSpec {
                result_shape: result_spec.shape.clone(),
                broadcast_dims: broadcast_dims.to_vec(),
            }),
            vec![Operand::Value(input.value_id())],
            result_spec,
        ))
    }

    /// Concatenates `inputs` along `axis`. All other axes and the dtype must agree.
    pub fn concat(&mut self, inputs: &[Node], axis: usize) -> LoweringResult<Node> {
        let first = *inputs
            .first()
            .ok_or(LoweringError::EmptyInputList { op: "concat" })?;
        let first_spec = self.spec(first)?;
        let dtype = first_spec.dtype;
        let rank = first_spec.rank();
        if axis >= rank {
            return Err(LoweringError::invalid_dimension(
                "concat",
                axis,
                format!("[0, {rank})"),
            ));
        }
        let mut result_dims = first_spec.dims().to_vec();
        let mut operands = Vec::with_capacity(inputs.len());
        operands.push(Operand::Value(first.value_id()));

        for &input in &inputs[1..] {
            let spec = self.spec(input)?;
            if spec.rank() != rank {
                return Err(LoweringError::RankMismatch {
                    op: "concat",
                    expected: rank.to_string(),
                    actual: spec.rank(),
                });
            }
            if spec.dtype != dtype {
                return Err(LoweringError::shape_mismatch(
                    "concat",
                    format!("dtype {:?} vs {:?}", dtype, spec.dtype),
                ));
            }
            for (idx, (&lhs, &rhs)) in result_dims.iter().zip(spec.dims()).enumerate() {
                if idx != axis && lhs != rhs {
                    return Err(LoweringError::shape_mismatch(
                        "concat",
                        format!("axis {idx} has size {lhs} vs {rhs}"),
                    ));
                }
            }
            result_dims[axis] = result_dims[axis]
                .checked_add(spec.dims()[axis])
                .ok_or(LoweringError::ElementCountOverflow { op: "concat" })?;
            operands.push(Operand::Value(input.value_id()));
        }

        Ok(self.emit(
            Operation::Concat(ConcatSpec { axis }),
            operands,
            tensor_spec_static(dtype, &result_dims),
        ))
    }

    /// Extracts `[start, limit)` with `stride` on every axis.
    pub fn slice(
        &mut self,
        input: Node,
        starts: &[usize],
        limits: &[usize],
        strides: &[usize],
    ) -> LoweringResult<Node> {
        let spec = self.spec(input)?;
        let dims = spec.dims();
        for list in [starts.len(), limits.len(), strides.len()] {
            if list != dims.len() {
                return Err(LoweringError::DimensionCountMismatch {
                    op: "slice",
                    left: dims.len(),
                    right: list,
                });
            }
        }

        let mut result_dims = Vec::with_capacity(dims.len());
        for axis in 0..dims.len() {
            let (start, limit, stride) = (starts[axis], limits[axis], strides[axis]);
            if stride == 0 {
                return Err(LoweringError::invalid_attribute(
                    "slice",
                    format!("stride on axis {axis} must be positive"),
                ));
            }
            if start > limit || limit > dims[axis] {
                return Err(LoweringError::IndexOutOfBounds {
                    op: "slice",
                    axis,
                    start,
                    limit,
                    size: dims[axis],
                });
            }
            result_dims.push((limit - start).div_ceil(stride));
        }

        let result_spec = tensor_spec_static(spec.dtype, &result_dims);
        Ok(self.emit(
            Operation::Slice(SliceSpec {
                starts: starts.to_vec(),
                limits: limits.to_vec(),
                strides: strides.to_vec(),
            }),
            vec![Operand::Value(input.value_id())],
            result_spec,
        ))
    }

    /// Pads `input` with `pad_value` according to one [`PaddingSpec`] per axis.
    pub fn pad(
        &mut self,
        input: Node,
        pad_value: Literal,
        padding: &[PaddingSpec],
    ) -> LoweringResult<Node> {
        let spec = self.spec(input)?;
        if padding.len() != spec.rank() {
            return Err(LoweringError::DimensionCountMismatch {
                op: "pad",
                left: spec.rank(),
                right: padding.len(),
            });
        }
        let result_dims = spec
            .dims()
            .iter()
            .zip(padding)
            .map(|(&dim, pad)| pad.padded_size(dim))
            .collect::<Option<Vec<_>>>()
            .ok_or(LoweringError::ElementCountOverflow { op: "pad" })?;

        let result_spec = tensor_spec_static(spec.dtype, &result_dims);
        Ok(self.emit(
            Operation::Pad(PadSpec {
                padding: padding.to_vec(),
                pad_value,
            }),
            vec![Operand::Value(input.value_id())],
            result_spec,
        ))
    }

    /// Picks `on_true` where `mask` is set and `on_false` elsewhere.
    pub fn select(&mut self, mask: Node, on_true: Node, on_false: Node) -> LoweringResult<Node> {
        let mask_spec = self.spec(mask)?;
        if mask_spec.dtype != DType::I1 {
            return Err(LoweringError::shape_mismatch(
                "select",
                format!("mask must be I1, got {:?}", mask_spec.dtype),
            ));
        }
        let mask_dims = mask_spec.dims().to_vec();
        let true_spec = self.spec(on_true)?.clone();
        let false_spec = self.spec(on_false)?;
        if true_spec != *false_spec {
            return Err(LoweringError::shape_mismatch(
                "select",
                format!(
                    "branches differ: {:?}{:?} vs {:?}{:?}",
                    true_spec.dtype,
                    true_spec.dims(),
                    false_spec.dtype,
                    false_spec.dims()
                ),
            ));
        }
        if mask_dims != true_spec.dims() {
            return Err(LoweringError::shape_mismatch(
                "select",
                format!("mask {:?} vs branches {:?}", mask_dims, true_spec.dims()),
            ));
        }

        Ok(self.emit(
            Operation::Select,
            vec![
                Operand::Value(mask.value_id()),
                Operand::Value(on_true.value_id()),
                Operand::Value(on_false.value_id()),
            ],
            true_spec,
        ))
    }

    /// Overwrites an `update`-shaped window of `target` starting at the scalar `indices`.
    ///
    /// Index values are runtime data; backends clamp them so the window stays in bounds.
    pub fn dynamic_update_slice(
        &mut self,
        target: Node,
        update: Node,
        indices: &[Node],
    ) -> LoweringResult<Node> {
        let target_spec = self.spec(target)?.clone();
        let update_spec = self.spec(update)?;
        if update_spec.rank() != target_spec.rank() {
            return Err(LoweringError::RankMismatch {
                op: "dynamic_update_slice",
                expected: target_spec.rank().to_string(),
                actual: update_spec.rank(),
            });
        }
        if update_spec.dtype != target_spec.dtype {
            return Err(LoweringError::shape_mismatch(
                "dynamic_update_slice",
                format!("dtype {:?} vs {:?}", target_spec.dtype, update_spec.dtype),
            ));
        }
        for (axis, (&window, &size)) in update_spec.dims().iter().zip(target_spec.dims()).enumerate() {
            if window > size {
                return Err(LoweringError::shape_mismatch(
                    "dynamic_update_slice",
                    format!("update axis {axis} has size {window}, target only {size}"),
                ));
            }
        }
        let sizes = update_spec.dims().to_vec();
        if indices.len() != target_spec.rank() {
            return Err(LoweringError::DimensionCountMismatch {
                op: "dynamic_update_slice",
                left: target_spec.rank(),
                right: indices.len(),
            });
        }
        let mut operands = Vec::with_capacity(indices.len() + 2);
        operands.push(Operand::Value(target.value_id()));
        operands.push(Operand::Value(update.value_id()));
        for &index in indices {
            let index_spec = self.spec(index)?;
            if index_spec.rank() != 0 || !index_spec.dtype.is_integer() {
                return Err(LoweringError::shape_mismatch(
                    "dynamic_update_slice",
                    format!(
                        "indices must be integer scalars, got {:?}{:?}",
                        index_spec.dtype,
                        index_spec.dims()
                    ),
                ));
            }
            operands.push(Operand::Value(index.value_id()));
        }

        Ok(self.emit(
            Operation::DynamicUpdateSlice(DynamicUpdateSliceSpec { sizes }),
            operands,
            target_spec,
        ))
    }
}
