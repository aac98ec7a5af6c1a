use std::sync::Arc;

use half::{bf16, f16};

use crate::backend::spec::{DType, Literal, Shape, TensorLiteral, TensorSpec, ValueType};

/// Builds a static backend shape descriptor from explicit dimensions.
pub fn shape_static(dims: &[usize]) -> Shape {
    Shape::new(dims.to_vec())
}

/// Builds a tensor spec with fully static dimensions.
pub fn tensor_spec_static(dtype: DType, dims: &[usize]) -> TensorSpec {
    TensorSpec::new(dtype, shape_static(dims))
}

/// Wraps a tensor spec as a value type.
pub fn value_type_tensor(spec: TensorSpec) -> ValueType {
    ValueType::Tensor(spec)
}

/// Encodes a scalar literal as little-endian bytes of `dtype`.
///
/// Values are converted with Rust `as` semantics, so out-of-range floats saturate when
/// targeting integers and any non-zero value maps to `true` for `I1`.
pub fn literal_bytes(dtype: DType, literal: Literal) -> Vec<u8> {
    let (as_i64, as_u64, as_f64) = match literal {
        Literal::I1(flag) => (flag as i64, flag as u64, flag as u8 as f64),
        Literal::Signed(value) => (value, value as u64, value as f64),
        Literal::Unsigned(value) => (value as i64, value, value as f64),
        Literal::Float(value) => (value as i64, value as u64, value),
    };
    match dtype {
        DType::I1 => vec![u8::from(as_f64 != 0.0)],
        DType::Si8 => (as_i64 as i8).to_le_bytes().to_vec(),
        DType::Ui8 => (as_u64 as u8).to_le_bytes().to_vec(),
        DType::Si16 => (as_i64 as i16).to_le_bytes().to_vec(),
        DType::Ui16 => (as_u64 as u16).to_le_bytes().to_vec(),
        DType::Si32 => (as_i64 as i32).to_le_bytes().to_vec(),
        DType::Ui32 => (as_u64 as u32).to_le_bytes().to_vec(),
        DType::Si64 => as_i64.to_le_bytes().to_vec(),
        DType::Ui64 => as_u64.to_le_bytes().to_vec(),
        DType::F16 => f16::from_f64(as_f64).to_bits().to_le_bytes().to_vec(),
        DType::Bf16 => bf16::from_f64(as_f64).to_bits().to_le_bytes().to_vec(),
        DType::F32 => (as_f64 as f32).to_le_bytes().to_vec(),
        DType::F64 => as_f64.to_le_bytes().to_vec(),
    }
}

/// Builds a rank-0 literal tensor holding `literal` converted to `dtype`.
pub fn scalar_literal_tensor(dtype: DType, literal: Literal) -> TensorLiteral {
    TensorLiteral::new(
        tensor_spec_static(dtype, &[]),
        Arc::from(literal_bytes(dtype, literal).into_boxed_slice()),
    )
}

/// Builds a dense f32 literal; `values` must hold `product(dims)` entries.
pub fn tensor_literal_f32(dims: &[usize], values: &[f32]) -> TensorLiteral {
    let mut bytes = Vec::with_capacity(values.len() * 4);
    for value in values {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    TensorLiteral::new(
        tensor_spec_static(DType::F32, dims),
        Arc::from(bytes.into_boxed_slice()),
    )
}
