use std::sync::Arc;

use ptir_lower::backend::shape_helpers::{
    checked_element_count_or_error, contiguous_strides_or_error, unravel_index,
};
use ptir_lower::backend::spec::{
    BackendError, BackendResult, BroadcastToSpec, ConcatSpec, DType, DynamicUpdateSliceSpec,
    Instruction, Literal, Operation, PadSpec, PortableBackend, Shape, SliceSpec, TensorInit,
    TensorLiteral, TensorSpec,
};

#[derive(Debug, Clone, PartialEq)]
pub struct CpuTensor {
    pub spec: TensorSpec,
    pub data: TensorData,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    F32(Arc<[f32]>),
    Si32(Arc<[i32]>),
    Si64(Arc<[i64]>),
    Bool(Arc<[u8]>),
}

impl CpuTensor {
    pub fn from_f32(dims: &[usize], values: Vec<f32>) -> BackendResult<Self> {
        let spec = TensorSpec::new(DType::F32, Shape::new(dims.to_vec()));
        ensure_len(&spec, values.len())?;
        Ok(Self {
            spec,
            data: TensorData::F32(Arc::from(values)),
        })
    }

    pub fn from_i32(dims: &[usize], values: Vec<i32>) -> BackendResult<Self> {
        let spec = TensorSpec::new(DType::Si32, Shape::new(dims.to_vec()));
        ensure_len(&spec, values.len())?;
        Ok(Self {
            spec,
            data: TensorData::Si32(Arc::from(values)),
        })
    }

    pub fn dims(&self) -> &[usize] {
        self.spec.dims()
    }

    /// Returns the elements as `f32` when the tensor stores `F32` data.
    pub fn to_f32_vec(&self) -> Option<Vec<f32>> {
        match &self.data {
            TensorData::F32(values) => Some(values.to_vec()),
            _ => None,
        }
    }

    pub fn to_i32_vec(&self) -> Option<Vec<i32>> {
        match &self.data {
            TensorData::Si32(values) => Some(values.to_vec()),
            _ => None,
        }
    }

    pub fn to_bool_vec(&self) -> Option<Vec<bool>> {
        match &self.data {
            TensorData::Bool(values) => Some(values.iter().map(|&flag| flag != 0).collect()),
            _ => None,
        }
    }
}

/// Interprets PTIR programs one instruction at a time on host memory.
#[derive(Debug, Clone, Default)]
pub struct CpuPortableBackend;

impl CpuPortableBackend {
    pub fn new() -> Self {
        Self
    }
}

impl PortableBackend for CpuPortableBackend {
    type TensorHandle = CpuTensor;

    fn backend_name(&self) -> &str {
        "cpu-ref"
    }

    fn materialize(&self, init: TensorInit) -> BackendResult<Self::TensorHandle> {
        match init {
            TensorInit::Literal(lit) => literal_to_tensor(&lit),
            TensorInit::Zeroed(spec) => zeroed_tensor(&spec),
        }
    }

    fn to_literal(&self, tensor: &Self::TensorHandle) -> BackendResult<TensorLiteral> {
        Ok(tensor_to_literal(tensor))
    }

    fn execute_instruction(
        &self,
        instruction: &Instruction,
        inputs: &[Self::TensorHandle],
    ) -> BackendResult<Self::TensorHandle> {
        let output = instruction.output.tensor_spec();
        tracing::trace!(
            value = instruction.id.0,
            op = instruction.op.name(),
            dims = ?output.dims(),
            "execute"
        );
        let result = match &instruction.op {
            Operation::Constant(literal) => literal_to_tensor(literal)?,
            Operation::Reshape(_) => op_reshape(inputs, output)?,
            Operation::BroadcastTo(spec) => op_broadcast_to(inputs, output, spec)?,
            Operation::Slice(spec) => op_slice(inputs, output, spec)?,
            Operation::Concat(spec) => op_concat(inputs, output, spec)?,
            Operation::Pad(spec) => op_pad(inputs, output, spec)?,
            Operation::Select => op_select(inputs, output)?,
            Operation::DynamicUpdateSlice(spec) => op_dynamic_update_slice(inputs, output, spec)?,
        };
        if result.spec != *output {
            return Err(BackendError::execution(format!(
                "{} produced {:?}{:?}, expected {:?}{:?}",
                instruction.op.name(),
                result.spec.dtype,
                result.spec.dims(),
                output.dtype,
                output.dims()
            )));
        }
        Ok(result)
    }
}

/// Scalar types the interpreter stores natively.
trait Element: Copy + Send + Sync + 'static {
    fn from_literal(literal: Literal) -> Self;
    fn wrap(values: Vec<Self>) -> TensorData;
}

impl Element for f32 {
    fn from_literal(literal: Literal) -> Self {
        match literal {
            Literal::I1(flag) => f32::from(u8::from(flag)),
            Literal::Signed(value) => value as f32,
            Literal::Unsigned(value) => value as f32,
            Literal::Float(value) => value as f32,
        }
    }

    fn wrap(values: Vec<Self>) -> TensorData {
        TensorData::F32(Arc::from(values))
    }
}

impl Element for i32 {
    fn from_literal(literal: Literal) -> Self {
        match literal {
            Literal::I1(flag) => i32::from(flag),
            Literal::Signed(value) => value as i32,
            Literal::Unsigned(value) => value as i32,
            Literal::Float(value) => value as i32,
        }
    }

    fn wrap(values: Vec<Self>) -> TensorData {
        TensorData::Si32(Arc::from(values))
    }
}

impl Element for i64 {
    fn from_literal(literal: Literal) -> Self {
        match literal {
            Literal::I1(flag) => i64::from(flag),
            Literal::Signed(value) => value,
            Literal::Unsigned(value) => value as i64,
            Literal::Float(value) => value as i64,
        }
    }

    fn wrap(values: Vec<Self>) -> TensorData {
        TensorData::Si64(Arc::from(values))
    }
}

impl Element for u8 {
    fn from_literal(literal: Literal) -> Self {
        let set = match literal {
            Literal::I1(flag) => flag,
            Literal::Signed(value) => value != 0,
            Literal::Unsigned(value) => value != 0,
            Literal::Float(value) => value != 0.0,
        };
        u8::from(set)
    }

    fn wrap(values: Vec<Self>) -> TensorData {
        TensorData::Bool(Arc::from(values))
    }
}

/// Applies a generic kernel to whichever storage variant `$data` holds.
macro_rules! dispatch {
    ($data:expr, |$values:ident| $body:expr) => {
        match $data {
            TensorData::F32($values) => $body,
            TensorData::Si32($values) => $body,
            TensorData::Si64($values) => $body,
            TensorData::Bool($values) => $body,
        }
    };
}

fn literal_to_tensor(literal: &TensorLiteral) -> BackendResult<CpuTensor> {
    let bytes = literal.bytes.as_ref();
    let data = match literal.spec.dtype {
        DType::F32 => TensorData::F32(Arc::from(decode_le::<4, f32>(bytes, f32::from_le_bytes)?)),
        DType::Si32 => {
            TensorData::Si32(Arc::from(decode_le::<4, i32>(bytes, i32::from_le_bytes)?))
        }
        DType::Si64 => {
            TensorData::Si64(Arc::from(decode_le::<8, i64>(bytes, i64::from_le_bytes)?))
        }
        DType::I1 => TensorData::Bool(Arc::from(bytes.to_vec())),
        other => {
            return Err(BackendError::unimplemented(
                "constant",
                format!("literal dtype {other:?} unsupported"),
            ))
        }
    };
    let tensor = CpuTensor {
        spec: literal.spec.clone(),
        data,
    };
    ensure_len(&tensor.spec, data_len(&tensor.data))?;
    Ok(tensor)
}

fn zeroed_tensor(spec: &TensorSpec) -> BackendResult<CpuTensor> {
    let count = element_count(spec)?;
    let data = match spec.dtype {
        DType::F32 => f32::wrap(vec![0.0; count]),
        DType::Si32 => i32::wrap(vec![0; count]),
        DType::Si64 => i64::wrap(vec![0; count]),
        DType::I1 => u8::wrap(vec![0; count]),
        other => {
            return Err(BackendError::unimplemented(
                "zeroed",
                format!("dtype {other:?} unsupported"),
            ))
        }
    };
    Ok(CpuTensor {
        spec: spec.clone(),
        data,
    })
}

fn tensor_to_literal(tensor: &CpuTensor) -> TensorLiteral {
    let bytes: Vec<u8> = match &tensor.data {
        TensorData::F32(values) => values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        TensorData::Si32(values) => values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        TensorData::Si64(values) => values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        TensorData::Bool(values) => values.to_vec(),
    };
    TensorLiteral::new(tensor.spec.clone(), Arc::from(bytes.into_boxed_slice()))
}

fn op_reshape(inputs: &[CpuTensor], output: &TensorSpec) -> BackendResult<CpuTensor> {
    let input = expect_single(inputs)?;
    if element_count(&input.spec)? != element_count(output)? {
        return Err(BackendError::execution("reshape element count mismatch"));
    }
    Ok(CpuTensor {
        spec: output.clone(),
        data: input.data.clone(),
    })
}

fn op_broadcast_to(
    inputs: &[CpuTensor],
    output: &TensorSpec,
    spec: &BroadcastToSpec,
) -> BackendResult<CpuTensor> {
    let input = expect_single(inputs)?;
    let in_dims = input.dims();
    let out_dims = output.dims();
    if spec.broadcast_dims.len() != in_dims.len() {
        return Err(BackendError::execution("broadcast dims length mismatch"));
    }
    let in_strides = strides(in_dims)?;
    let count = element_count(output)?;
    let mut sources = Vec::with_capacity(count);
    for idx in 0..count {
        let coord = unravel_index(idx, out_dims);
        let mut src = 0usize;
        for (axis, &mapped) in spec.broadcast_dims.iter().enumerate() {
            let c = if in_dims[axis] == 1 { 0 } else { coord[mapped] };
            src += c * in_strides[axis];
        }
        sources.push(src);
    }
    Ok(CpuTensor {
        spec: output.clone(),
        data: dispatch!(&input.data, |values| gather(&values[..], &sources)),
    })
}

fn op_slice(inputs: &[CpuTensor], output: &TensorSpec, spec: &SliceSpec) -> BackendResult<CpuTensor> {
    let input = expect_single(inputs)?;
    let in_dims = input.dims();
    if spec.starts.len() != in_dims.len() || spec.strides.len() != in_dims.len() {
        return Err(BackendError::execution("slice rank mismatch"));
    }
    let in_strides = strides(in_dims)?;
    let out_dims = output.dims();
    let count = element_count(output)?;
    let mut sources = Vec::with_capacity(count);
    for idx in 0..count {
        let coord = unravel_index(idx, out_dims);
        let mut src = 0usize;
        for (axis, &c) in coord.iter().enumerate() {
            let position = spec.starts[axis] + c * spec.strides[axis];
            if position >= in_dims[axis] {
                return Err(BackendError::execution("slice out of bounds"));
            }
            src += position * in_strides[axis];
        }
        sources.push(src);
    }
    Ok(CpuTensor {
        spec: output.clone(),
        data: dispatch!(&input.data, |values| gather(&values[..], &sources)),
    })
}

fn op_concat(inputs: &[CpuTensor], output: &TensorSpec, spec: &ConcatSpec) -> BackendResult<CpuTensor> {
    if inputs.is_empty() {
        return Err(BackendError::execution("concat expects at least one input"));
    }
    let out_dims = output.dims();
    let axis = spec.axis;
    if axis >= out_dims.len() {
        return Err(BackendError::execution("concat axis out of range"));
    }
    let inner: usize = out_dims[axis + 1..].iter().product();
    let outer: usize = out_dims[..axis].iter().product();

    // Each output row along `axis` is the inputs' rows laid end to end.
    let count = element_count(output)?;
    let mut sources = Vec::with_capacity(count);
    let mut owners = Vec::with_capacity(count);
    for outer_idx in 0..outer {
        for (input_idx, tensor) in inputs.iter().enumerate() {
            if tensor.spec.dtype != output.dtype {
                return Err(BackendError::execution("concat requires matching dtypes"));
            }
            let chunk = tensor.dims()[axis] * inner;
            for offset in 0..chunk {
                owners.push(input_idx);
                sources.push(outer_idx * chunk + offset);
            }
        }
    }
    if sources.len() != count {
        return Err(BackendError::execution(
            "concat inputs do not match output axis length",
        ));
    }

    let data = match output.dtype {
        DType::F32 => f32::wrap(gather_many(inputs, &owners, &sources, as_f32)?),
        DType::Si32 => i32::wrap(gather_many(inputs, &owners, &sources, as_i32)?),
        DType::Si64 => i64::wrap(gather_many(inputs, &owners, &sources, as_i64)?),
        DType::I1 => u8::wrap(gather_many(inputs, &owners, &sources, as_bool)?),
        other => {
            return Err(BackendError::unimplemented(
                "concat",
                format!("dtype {other:?} unsupported"),
            ))
        }
    };
    Ok(CpuTensor {
        spec: output.clone(),
        data,
    })
}

fn op_pad(inputs: &[CpuTensor], output: &TensorSpec, spec: &PadSpec) -> BackendResult<CpuTensor> {
    let input = expect_single(inputs)?;
    let in_dims = input.dims();
    if spec.padding.len() != in_dims.len() {
        return Err(BackendError::execution("pad rank mismatch"));
    }
    let out_strides = strides(output.dims())?;
    let count = element_count(output)?;
    let input_count = element_count(&input.spec)?;
    let mut targets = Vec::with_capacity(input_count);
    for idx in 0..input_count {
        let coord = unravel_index(idx, in_dims);
        let mut dst = 0usize;
        for (axis, (&c, pad)) in coord.iter().zip(&spec.padding).enumerate() {
            dst += (pad.low + c * (pad.interior + 1)) * out_strides[axis];
        }
        targets.push(dst);
    }
    if targets.iter().any(|&dst| dst >= count) {
        return Err(BackendError::execution("pad output too small"));
    }
    Ok(CpuTensor {
        spec: output.clone(),
        data: dispatch!(&input.data, |values| scatter(
            &values[..],
            &targets,
            count,
            spec.pad_value
        )),
    })
}

fn op_select(inputs: &[CpuTensor], output: &TensorSpec) -> BackendResult<CpuTensor> {
    if inputs.len() != 3 {
        return Err(BackendError::execution("select expects three operands"));
    }
    let mask = match &inputs[0].data {
        TensorData::Bool(mask) => &mask[..],
        _ => return Err(BackendError::execution("select mask must be boolean")),
    };
    let data = match (&inputs[1].data, &inputs[2].data) {
        (TensorData::F32(t), TensorData::F32(f)) => f32::wrap(choose(mask, &t[..], &f[..])),
        (TensorData::Si32(t), TensorData::Si32(f)) => i32::wrap(choose(mask, &t[..], &f[..])),
        (TensorData::Si64(t), TensorData::Si64(f)) => i64::wrap(choose(mask, &t[..], &f[..])),
        (TensorData::Bool(t), TensorData::Bool(f)) => u8::wrap(choose(mask, &t[..], &f[..])),
        _ => {
            return Err(BackendError::execution(
                "select branches must share a dtype",
            ))
        }
    };
    Ok(CpuTensor {
        spec: output.clone(),
        data,
    })
}

fn op_dynamic_update_slice(
    inputs: &[CpuTensor],
    output: &TensorSpec,
    spec: &DynamicUpdateSliceSpec,
) -> BackendResult<CpuTensor> {
    let (base, update, indices) = match inputs {
        [base, update, indices @ ..] => (base, update, indices),
        _ => {
            return Err(BackendError::execution(
                "dynamic_update_slice expects (base, update, indices...)",
            ))
        }
    };
    let base_dims = base.dims();
    let update_dims = update.dims();
    if update_dims != spec.sizes.as_slice() || indices.len() != base_dims.len() {
        return Err(BackendError::execution(
            "dynamic_update_slice operand shapes disagree",
        ));
    }

    // Starts are clamped so the whole update window lands inside the base.
    let mut starts = Vec::with_capacity(base_dims.len());
    for (axis, index) in indices.iter().enumerate() {
        let raw = scalar_index(index)?;
        let max_start = base_dims[axis].saturating_sub(update_dims[axis]);
        starts.push(usize::try_from(raw.max(0)).unwrap_or(usize::MAX).min(max_start));
    }

    let base_strides = strides(base_dims)?;
    let update_count = element_count(&update.spec)?;
    let mut targets = Vec::with_capacity(update_count);
    for idx in 0..update_count {
        let coord = unravel_index(idx, update_dims);
        let dst = coord
            .iter()
            .enumerate()
            .map(|(axis, &c)| (starts[axis] + c) * base_strides[axis])
            .sum::<usize>();
        targets.push(dst);
    }

    let data = match (&base.data, &update.data) {
        (TensorData::F32(b), TensorData::F32(u)) => f32::wrap(overwrite(&b[..], &u[..], &targets)),
        (TensorData::Si32(b), TensorData::Si32(u)) => i32::wrap(overwrite(&b[..], &u[..], &targets)),
        (TensorData::Si64(b), TensorData::Si64(u)) => i64::wrap(overwrite(&b[..], &u[..], &targets)),
        (TensorData::Bool(b), TensorData::Bool(u)) => u8::wrap(overwrite(&b[..], &u[..], &targets)),
        _ => {
            return Err(BackendError::execution(
                "dynamic_update_slice dtype mismatch between base and update",
            ))
        }
    };
    Ok(CpuTensor {
        spec: output.clone(),
        data,
    })
}

fn gather<T: Element>(values: &[T], sources: &[usize]) -> TensorData {
    T::wrap(sources.iter().map(|&src| values[src]).collect())
}

fn scatter<T: Element>(values: &[T], targets: &[usize], len: usize, fill: Literal) -> TensorData {
    let mut out = vec![T::from_literal(fill); len];
    for (&dst, &value) in targets.iter().zip(values) {
        out[dst] = value;
    }
    T::wrap(out)
}

fn choose<T: Copy>(mask: &[u8], on_true: &[T], on_false: &[T]) -> Vec<T> {
    mask.iter()
        .zip(on_true.iter().zip(on_false))
        .map(|(&flag, (&t, &f))| if flag != 0 { t } else { f })
        .collect()
}

fn overwrite<T: Copy>(base: &[T], update: &[T], targets: &[usize]) -> Vec<T> {
    let mut out = base.to_vec();
    for (&dst, &value) in targets.iter().zip(update) {
        out[dst] = value;
    }
    out
}

fn gather_many<T: Copy>(
    inputs: &[CpuTensor],
    owners: &[usize],
    sources: &[usize],
    view: fn(&TensorData) -> Option<&[T]>,
) -> BackendResult<Vec<T>> {
    let slices = inputs
        .iter()
        .map(|tensor| view(&tensor.data))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| BackendError::execution("concat requires matching dtypes"))?;
    Ok(owners
        .iter()
        .zip(sources)
        .map(|(&owner, &src)| slices[owner][src])
        .collect())
}

fn as_f32(data: &TensorData) -> Option<&[f32]> {
    match data {
        TensorData::F32(values) => Some(&values[..]),
        _ => None,
    }
}

fn as_i32(data: &TensorData) -> Option<&[i32]> {
    match data {
        TensorData::Si32(values) => Some(&values[..]),
        _ => None,
    }
}

fn as_i64(data: &TensorData) -> Option<&[i64]> {
    match data {
        TensorData::Si64(values) => Some(&values[..]),
        _ => None,
    }
}

fn as_bool(data: &TensorData) -> Option<&[u8]> {
    match data {
        TensorData::Bool(values) => Some(&values[..]),
        _ => None,
    }
}

fn scalar_index(tensor: &CpuTensor) -> BackendResult<i64> {
    if !tensor.dims().is_empty() {
        return Err(BackendError::execution(
            "dynamic_update_slice indices must be scalars",
        ));
    }
    match &tensor.data {
        TensorData::Si32(values) if values.len() == 1 => Ok(i64::from(values[0])),
        TensorData::Si64(values) if values.len() == 1 => Ok(values[0]),
        _ => Err(BackendError::execution(
            "dynamic_update_slice indices must be si32 or si64",
        )),
    }
}

fn expect_single(inputs: &[CpuTensor]) -> BackendResult<&CpuTensor> {
    match inputs {
        [input] => Ok(input),
        _ => Err(BackendError::execution("operation expects single input")),
    }
}

fn element_count(spec: &TensorSpec) -> BackendResult<usize> {
    checked_element_count_or_error(spec.dims(), || {
        BackendError::execution("element count overflow")
    })
}

fn strides(dims: &[usize]) -> BackendResult<Vec<usize>> {
    contiguous_strides_or_error(dims, || BackendError::execution("stride overflow"))
}

fn data_len(data: &TensorData) -> usize {
    dispatch!(data, |values| values.len())
}

fn ensure_len(spec: &TensorSpec, len: usize) -> BackendResult<()> {
    let expected = element_count(spec)?;
    if expected != len {
        return Err(BackendError::execution(format!(
            "expected {expected} elements for {:?}, got {len}",
            spec.dims()
        )));
    }
    Ok(())
}

fn decode_le<const N: usize, T>(bytes: &[u8], decode: fn([u8; N]) -> T) -> BackendResult<Vec<T>> {
    if bytes.len() % N != 0 {
        return Err(BackendError::execution(format!(
            "literal byte length {} is not a multiple of {N}",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(N)
        .map(|chunk| {
            let mut word = [0u8; N];
            word.copy_from_slice(chunk);
            decode(word)
        })
        .collect())
}
