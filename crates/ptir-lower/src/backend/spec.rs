use std::{collections::HashMap, fmt, fs, io, path::Path, sync::Arc};

use serde::{ser::SerializeStruct, Deserialize, Serialize};
use thiserror::Error;

/// PTIR format version stamped on every emitted program.
pub const SPEC_VERSION: &str = "ptir.lower.v1";

fn default_spec_version() -> String {
    SPEC_VERSION.to_string()
}

/// Enumerates scalar element types a graph node may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(clippy::upper_case_acronyms)]
pub enum DType {
    I1,
    Si8,
    Ui8,
    Si16,
    Ui16,
    Si32,
    Ui32,
    Si64,
    Ui64,
    Bf16,
    F16,
    F32,
    F64,
}

impl DType {
    /// Returns `true` when the dtype is any signed or unsigned integer.
    pub fn is_integer(self) -> bool {
        self.is_signed_integer() || self.is_unsigned_integer()
    }

    pub fn is_signed_integer(self) -> bool {
        matches!(self, DType::Si8 | DType::Si16 | DType::Si32 | DType::Si64)
    }

    pub fn is_unsigned_integer(self) -> bool {
        matches!(self, DType::Ui8 | DType::Ui16 | DType::Ui32 | DType::Ui64)
    }

    /// Returns the storage size of one element in bytes. Booleans occupy a full byte.
    pub fn size_in_bytes(self) -> usize {
        match self {
            DType::I1 | DType::Si8 | DType::Ui8 => 1,
            DType::Si16 | DType::Ui16 | DType::Bf16 | DType::F16 => 2,
            DType::Si32 | DType::Ui32 | DType::F32 => 4,
            DType::Si64 | DType::Ui64 | DType::F64 => 8,
        }
    }

    /// Returns the additive identity for this dtype as a scalar literal.
    pub fn zero(self) -> Literal {
        match self {
            DType::I1 => Literal::I1(false),
            dtype if dtype.is_signed_integer() => Literal::Signed(0),
            dtype if dtype.is_unsigned_integer() => Literal::Unsigned(0),
            _ => Literal::Float(0.0),
        }
    }
}

/// Logical tensor shape as an ordered list of static extents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    pub fn new(dims: impl Into<Vec<usize>>) -> Self {
        Self { dims: dims.into() }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Returns the element count, or `None` when the product overflows.
    pub fn element_count(&self) -> Option<usize> {
        self.dims
            .iter()
            .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
    }
}

/// Tensor metadata coupling dtype and shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TensorSpec {
    pub dtype: DType,
    pub shape: Shape,
}

impl TensorSpec {
    pub fn new(dtype: DType, shape: Shape) -> Self {
        Self { dtype, shape }
    }

    pub fn rank(&self) -> usize {
        self.shape.rank()
    }

    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    pub fn element_count(&self) -> Option<usize> {
        self.shape.element_count()
    }

    /// Returns total byte length, or `None` when the size overflows.
    pub fn byte_len(&self) -> Option<usize> {
        self.element_count()?
            .checked_mul(self.dtype.size_in_bytes())
    }
}

/// Scalar literal used for attributes (e.g., padding values).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    I1(bool),
    Signed(i64),
    Unsigned(u64),
    Float(f64),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::I1(value) => write!(f, "{value}"),
            Literal::Signed(value) => write!(f, "{value}"),
            Literal::Unsigned(value) => write!(f, "{value}u"),
            Literal::Float(value) => write!(f, "{value:?}"),
        }
    }
}

/// Dense literal tensor payload stored as little-endian bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorLiteral {
    pub spec: TensorSpec,
    pub bytes: Arc<[u8]>,
}

impl TensorLiteral {
    pub fn new(spec: TensorSpec, bytes: Arc<[u8]>) -> Self {
        Self { spec, bytes }
    }

    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }
}

impl Serialize for TensorLiteral {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("TensorLiteral", 2)?;
        state.serialize_field("spec", &self.spec)?;
        state.serialize_field("bytes", &self.bytes.as_ref())?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for TensorLiteral {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct TensorLiteralHelper {
            spec: TensorSpec,
            bytes: Vec<u8>,
        }

        let helper = TensorLiteralHelper::deserialize(deserializer)?;
        Ok(TensorLiteral {
            spec: helper.spec,
            bytes: Arc::<[u8]>::from(helper.bytes),
        })
    }
}

/// Initialization payload when materialising tensors on a backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TensorInit {
    Literal(TensorLiteral),
    Zeroed(TensorSpec),
}

/// Entry in a requested output shape. `Infer` marks the single wildcard extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReshapeDim {
    Explicit(usize),
    Infer,
}

impl From<usize> for ReshapeDim {
    fn from(value: usize) -> Self {
        ReshapeDim::Explicit(value)
    }
}

impl fmt::Display for ReshapeDim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReshapeDim::Explicit(dim) => write!(f, "{dim}"),
            ReshapeDim::Infer => f.write_str("?"),
        }
    }
}

/// Attribute payload for `reshape`. The target shape is always fully resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReshapeSpec {
    pub new_shape: Shape,
}

/// Attribute payload for `broadcast_to`.
///
/// Operand axis `i` maps to result axis `broadcast_dims[i]`; every other result axis is
/// replicated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BroadcastToSpec {
    pub result_shape: Shape,
    pub broadcast_dims: Vec<usize>,
}

/// Attribute payload for `slice` over `[start, limit)` with a per-axis stride.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceSpec {
    pub starts: Vec<usize>,
    pub limits: Vec<usize>,
    pub strides: Vec<usize>,
}

/// Attribute payload for `concat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcatSpec {
    pub axis: usize,
}

/// Padding applied to one axis: `low` before the first element, `interior` between
/// neighbours, `high` after the last element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PaddingSpec {
    pub low: usize,
    pub interior: usize,
    pub high: usize,
}

impl PaddingSpec {
    pub fn new(low: usize, interior: usize, high: usize) -> Self {
        Self {
            low,
            interior,
            high,
        }
    }

    /// Padding that leaves an axis untouched.
    pub fn none() -> Self {
        Self::default()
    }

    /// Returns the padded extent for an axis of `size` elements.
    pub fn padded_size(&self, size: usize) -> Option<usize> {
        let interior = size.saturating_sub(1).checked_mul(self.interior)?;
        size.checked_add(interior)?
            .checked_add(self.low)?
            .checked_add(self.high)
    }
}

/// Attribute payload for `pad`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PadSpec {
    pub padding: Vec<PaddingSpec>,
    pub pad_value: Literal,
}

/// Attribute payload for `dynamic_update_slice`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicUpdateSliceSpec {
    pub sizes: Vec<usize>,
}

/// Unique identifier for SSA values in a PTIR program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValueId(pub u32);

/// Typing information for SSA values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueType {
    Tensor(TensorSpec),
}

impl ValueType {
    pub fn tensor_spec(&self) -> &TensorSpec {
        match self {
            ValueType::Tensor(spec) => spec,
        }
    }
}

/// Operand reference in an instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    Value(ValueId),
    Literal(TensorLiteral),
}

/// Declarative form of the primitive operations the lowering engine composes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    Constant(TensorLiteral),
    Reshape(ReshapeSpec),
    BroadcastTo(BroadcastToSpec),
    Slice(SliceSpec),
    Concat(ConcatSpec),
    Pad(PadSpec),
    Select,
    DynamicUpdateSlice(DynamicUpdateSliceSpec),
}

impl Operation {
    /// Short mnemonic used by the text printer and diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Constant(_) => "constant",
            Operation::Reshape(_) => "reshape",
            Operation::BroadcastTo(_) => "broadcast_to",
            Operation::Slice(_) => "slice",
            Operation::Concat(_) => "concat",
            Operation::Pad(_) => "pad",
            Operation::Select => "select",
            Operation::DynamicUpdateSlice(_) => "dynamic_update_slice",
        }
    }
}

/// Single SSA instruction in the declarative PTIR program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub id: ValueId,
    pub op: Operation,
    pub operands: Vec<Operand>,
    pub output: ValueType,
}

/// PTIR function describing a reusable computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub parameters: Vec<ValueType>,
    pub parameter_ids: Vec<ValueId>,
    pub results: Vec<ValueType>,
    pub body: Vec<Instruction>,
    pub result_ids: Vec<ValueId>,
}

/// Complete PTIR module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    #[serde(default = "default_spec_version")]
    pub spec_version: String,
    pub entry: String,
    pub functions: Vec<Function>,
}

#[derive(Debug, Error)]
pub enum ProgramSerdeError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("program spec version '{found}' does not match expected '{expected}'")]
    SpecVersionMismatch {
        found: String,
        expected: &'static str,
    },
}

#[derive(Debug, Error)]
pub enum ProgramIoError {
    #[error(transparent)]
    Serialization(#[from] ProgramSerdeError),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl Program {
    pub fn new(entry: impl Into<String>) -> Self {
        Self {
            spec_version: SPEC_VERSION.to_string(),
            entry: entry.into(),
            functions: Vec::new(),
        }
    }

    pub fn with_functions(mut self, functions: Vec<Function>) -> Self {
        self.functions = functions;
        self
    }

    /// Returns the function named by `entry`, if present.
    pub fn entry_function(&self) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == self.entry)
    }

    pub fn to_json_string(&self) -> Result<String, ProgramSerdeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json_str(src: &str) -> Result<Self, ProgramSerdeError> {
        serde_json::from_str::<Program>(src)?.checked_version()
    }

    pub fn to_bincode_bytes(&self) -> Result<Vec<u8>, ProgramSerdeError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bincode_slice(bytes: &[u8]) -> Result<Self, ProgramSerdeError> {
        bincode::deserialize::<Program>(bytes)?.checked_version()
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<(), ProgramIoError> {
        fs::write(path, self.to_json_string()?)?;
        Ok(())
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, ProgramIoError> {
        Ok(Program::from_json_str(&fs::read_to_string(path)?)?)
    }

    pub fn save_bincode<P: AsRef<Path>>(&self, path: P) -> Result<(), ProgramIoError> {
        fs::write(path, self.to_bincode_bytes()?)?;
        Ok(())
    }

    pub fn load_bincode<P: AsRef<Path>>(path: P) -> Result<Self, ProgramIoError> {
        Ok(Program::from_bincode_slice(&fs::read(path)?)?)
    }

    /// Human-readable listing, one instruction per line.
    pub fn to_text(&self) -> String {
        self.to_string()
    }

    /// Programs written before versioning carry an empty tag and are adopted as current.
    fn checked_version(mut self) -> Result<Self, ProgramSerdeError> {
        if self.spec_version.is_empty() {
            self.spec_version = SPEC_VERSION.to_string();
        }
        if self.spec_version != SPEC_VERSION {
            return Err(ProgramSerdeError::SpecVersionMismatch {
                found: self.spec_version,
                expected: SPEC_VERSION,
            });
        }
        Ok(self)
    }
}

/// Indenting line writer behind the `Display` impls of [`Program`] and [`Function`].
struct TextPrinter<'a, 'b> {
    out: &'a mut fmt::Formatter<'b>,
    depth: usize,
}

impl<'a, 'b> TextPrinter<'a, 'b> {
    fn new(out: &'a mut fmt::Formatter<'b>) -> Self {
        Self { out, depth: 0 }
    }

    fn line(&mut self, text: impl fmt::Display) -> fmt::Result {
        writeln!(self.out, "{:width$}{text}", "", width = self.depth * 2)
    }

    fn nested(&mut self, body: impl FnOnce(&mut Self) -> fmt::Result) -> fmt::Result {
        self.depth += 1;
        let result = body(self);
        self.depth -= 1;
        result
    }

    fn program(&mut self, program: &Program) -> fmt::Result {
        self.line(format_args!(
            "program @{} (spec_version = {}) {{",
            program.entry, program.spec_version
        ))?;
        self.nested(|p| program.functions.iter().try_for_each(|func| p.function(func)))?;
        self.line("}")
    }

    fn function(&mut self, function: &Function) -> fmt::Result {
        self.line(format_args!("func @{} {{", function.name))?;
        self.nested(|p| {
            p.typed_values("params:", &function.parameter_ids, &function.parameters)?;
            if !function.body.is_empty() {
                p.line("body:")?;
                p.nested(|p| function.body.iter().try_for_each(|inst| p.instruction(inst)))?;
            }
            p.typed_values("results:", &function.result_ids, &function.results)
        })?;
        self.line("}")
    }

    fn typed_values(&mut self, header: &str, ids: &[ValueId], types: &[ValueType]) -> fmt::Result {
        if ids.is_empty() {
            return Ok(());
        }
        self.line(header)?;
        self.nested(|p| {
            ids.iter()
                .zip(types)
                .try_for_each(|(id, ty)| p.line(format_args!("%{} : {ty}", id.0)))
        })
    }

    fn instruction(&mut self, inst: &Instruction) -> fmt::Result {
        let operands = inst
            .operands
            .iter()
            .map(|operand| match operand {
                Operand::Value(id) => format!("%{}", id.0),
                Operand::Literal(lit) => format!("literal({})", lit.spec),
            })
            .collect::<Vec<_>>()
            .join(", ");
        let attrs = inst.op.attributes();
        let attrs = if attrs.is_empty() {
            attrs
        } else {
            format!(" {{{attrs}}}")
        };
        self.line(format_args!(
            "%{} = {}({operands}){attrs} -> {}",
            inst.id.0,
            inst.op.name(),
            inst.output
        ))
    }
}

impl Operation {
    /// Attribute listing as printed between braces; empty for attribute-free ops.
    fn attributes(&self) -> String {
        match self {
            Operation::Constant(_) | Operation::Select => String::new(),
            Operation::Reshape(spec) => format!("shape = {}", spec.new_shape),
            Operation::BroadcastTo(spec) => format!(
                "shape = {}, dims = {:?}",
                spec.result_shape, spec.broadcast_dims
            ),
            Operation::Slice(spec) => format!(
                "starts = {:?}, limits = {:?}, strides = {:?}",
                spec.starts, spec.limits, spec.strides
            ),
            Operation::Concat(spec) => format!("axis = {}", spec.axis),
            Operation::Pad(spec) => {
                let padding = spec
                    .padding
                    .iter()
                    .map(|p| format!("{}:{}:{}", p.low, p.interior, p.high))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("padding = [{padding}], value = {}", spec.pad_value)
            }
            Operation::DynamicUpdateSlice(spec) => format!("sizes = {:?}", spec.sizes),
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        TextPrinter::new(f).program(self)
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        TextPrinter::new(f).function(self)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dims.is_empty() {
            return f.write_str("[]");
        }
        let dims = self
            .dims
            .iter()
            .map(usize::to_string)
            .collect::<Vec<_>>()
            .join("x");
        f.write_str(&dims)
    }
}

impl fmt::Display for TensorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tensor<{:?} x {}>", self.dtype, self.shape)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Tensor(spec) => fmt::Display::fmt(spec, f),
        }
    }
}

/// Failure reported by a [`PortableBackend`] while materialising or executing.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{op} is not implemented: {reason}")]
    Unimplemented { op: &'static str, reason: String },
    #[error("backend execution failure: {message}")]
    Execution { message: String },
}

impl BackendError {
    pub fn unimplemented(op: &'static str, reason: impl Into<String>) -> Self {
        BackendError::Unimplemented {
            op,
            reason: reason.into(),
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        BackendError::Execution {
            message: message.into(),
        }
    }
}

/// Convenience alias for results returned by backend routines.
pub type BackendResult<T> = Result<T, BackendError>;

/// External collaborator that turns lowered PTIR programs into values.
///
/// The lowering engine never calls this trait itself; it only describes the contract
/// emitted programs are written against.
pub trait PortableBackend: Send + Sync {
    type TensorHandle: Clone + Send + Sync + 'static;

    /// Returns a human-readable backend identifier (e.g., `"cpu"`).
    fn backend_name(&self) -> &str;

    /// Materialises a tensor handle from host initialisation data.
    fn materialize(&self, init: TensorInit) -> BackendResult<Self::TensorHandle>;

    /// Reads back a tensor handle into a dense literal.
    fn to_literal(&self, tensor: &Self::TensorHandle) -> BackendResult<TensorLiteral>;

    /// Executes a single instruction given already materialised operand handles.
    fn execute_instruction(
        &self,
        instruction: &Instruction,
        inputs: &[Self::TensorHandle],
    ) -> BackendResult<Self::TensorHandle>;

    /// Executes an entire PTIR program starting from the entry function.
    fn run_program(
        &self,
        program: &Program,
        entry_inputs: &[Self::TensorHandle],
    ) -> BackendResult<Vec<Self::TensorHandle>> {
        let function = program
            .entry_function()
            .ok_or_else(|| BackendError::execution("entry function not found"))?;
        if function.parameter_ids.len() != entry_inputs.len() {
            return Err(BackendError::execution("entry input arity mismatch"));
        }

        let mut values: HashMap<ValueId, Self::TensorHandle> = HashMap::new();
        for (param_id, handle) in function.parameter_ids.iter().zip(entry_inputs.iter()) {
            values.insert(*param_id, handle.clone());
        }

        for instruction in &function.body {
            let mut inputs = Vec::with_capacity(instruction.operands.len());
            for operand in &instruction.operands {
                let handle = match operand {
                    Operand::Value(id) => values
                        .get(id)
                        .cloned()
                        .ok_or_else(|| BackendError::execution("operand value missing"))?,
                    Operand::Literal(lit) => self.materialize(TensorInit::Literal(lit.clone()))?,
                };
                inputs.push(handle);
            }
            let output = self.execute_instruction(instruction, &inputs)?;
            values.insert(instruction.id, output);
        }

        function
            .result_ids
            .iter()
            .map(|id| {
                values
                    .get(id)
                    .cloned()
                    .ok_or_else(|| BackendError::execution("missing function result value"))
            })
            .collect()
    }
}
