//! Arena that owns every node minted while lowering one computation graph.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::backend::ptir_utils::{tensor_spec_static, value_type_tensor};
use crate::backend::spec::{
    DType, Function, Instruction, Operand, Operation, Program, TensorSpec, ValueId, ValueType,
};
use crate::env::LoweringOptions;
use crate::error::{LoweringError, LoweringResult};

static NEXT_BUILDER_ID: AtomicU64 = AtomicU64::new(0);

/// Identity tag stamped into every [`Node`] a builder mints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BuilderId(u64);

impl BuilderId {
    fn fresh() -> Self {
        BuilderId(NEXT_BUILDER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for BuilderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle to a value produced inside a [`GraphBuilder`].
///
/// Nodes are plain copyable tags. The shape lives in the owning builder and is looked up on
/// demand; using a node with any other builder fails with
/// [`LoweringError::ForeignBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Node {
    builder: BuilderId,
    value: ValueId,
}

impl Node {
    pub fn value_id(&self) -> ValueId {
        self.value
    }

    pub fn builder_id(&self) -> BuilderId {
        self.builder
    }
}

/// Append-only log of PTIR instructions plus the metadata of every value they produce.
///
/// Builders are single-owner: all mutation goes through `&mut self`, so two lowerings can
/// never race on the same graph. Independent builders share nothing but the id counter.
pub struct GraphBuilder {
    id: BuilderId,
    options: LoweringOptions,
    next_value: u32,
    parameters: Vec<(ValueId, ValueType)>,
    instructions: Vec<Instruction>,
    value_specs: HashMap<ValueId, TensorSpec>,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBuilder {
    /// Creates a builder configured from the process environment.
    pub fn new() -> Self {
        Self::with_options(LoweringOptions::from_env())
    }

    pub fn with_options(options: LoweringOptions) -> Self {
        Self {
            id: BuilderId::fresh(),
            options,
            next_value: 0,
            parameters: Vec::new(),
            instructions: Vec::new(),
            value_specs: HashMap::new(),
        }
    }

    pub fn id(&self) -> BuilderId {
        self.id
    }

    pub fn options(&self) -> &LoweringOptions {
        &self.options
    }

    /// Declares a graph input with the given metadata.
    pub fn add_parameter(&mut self, spec: TensorSpec) -> Node {
        let value = self.allocate_value();
        self.value_specs.insert(value, spec.clone());
        self.parameters.push((value, value_type_tensor(spec)));
        self.node(value)
    }

    /// Shorthand for [`add_parameter`](Self::add_parameter) with static dims.
    pub fn parameter(&mut self, dtype: DType, dims: &[usize]) -> Node {
        self.add_parameter(tensor_spec_static(dtype, dims))
    }

    /// Returns the metadata recorded for `node`.
    pub fn spec(&self, node: Node) -> LoweringResult<&TensorSpec> {
        self.check_owner(node)?;
        self.value_specs.get(&node.value).ok_or_else(|| {
            LoweringError::invalid_attribute(
                "spec",
                format!("value %{} is not registered", node.value.0),
            )
        })
    }

    pub fn dims(&self, node: Node) -> LoweringResult<Vec<usize>> {
        Ok(self.spec(node)?.dims().to_vec())
    }

    pub fn rank(&self, node: Node) -> LoweringResult<usize> {
        Ok(self.spec(node)?.rank())
    }

    pub fn dtype(&self, node: Node) -> LoweringResult<DType> {
        Ok(self.spec(node)?.dtype)
    }

    /// Instructions appended so far, in emission order.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn instruction_count(&self) -> usize {
        self.instructions.len()
    }

    /// Seals the builder into a function returning `results`.
    pub fn finish(self, name: impl Into<String>, results: &[Node]) -> LoweringResult<Function> {
        let mut result_ids = Vec::with_capacity(results.len());
        let mut result_types = Vec::with_capacity(results.len());
        for node in results {
            let spec = self.spec(*node)?.clone();
            result_ids.push(node.value);
            result_types.push(value_type_tensor(spec));
        }
        let name = name.into();
        tracing::debug!(
            function = %name,
            instructions = self.instructions.len(),
            results = result_ids.len(),
            "sealed lowered function"
        );
        let (parameter_ids, parameters): (Vec<_>, Vec<_>) = self.parameters.into_iter().unzip();
        Ok(Function {
            name,
            parameters,
            parameter_ids,
            results: result_types,
            body: self.instructions,
            result_ids,
        })
    }

    /// Seals the builder into a single-function program whose entry is `name`.
    pub fn into_program(self, name: impl Into<String>, results: &[Node]) -> LoweringResult<Program> {
        let name = name.into();
        let function = self.finish(name.clone(), results)?;
        Ok(Program::new(name).with_functions(vec![function]))
    }

    pub(crate) fn check_owner(&self, node: Node) -> LoweringResult<()> {
        if node.builder == self.id {
            Ok(())
        } else {
            Err(LoweringError::ForeignBuilder {
                expected: self.id,
                found: node.builder,
            })
        }
    }

    /// Appends an instruction and registers its output. Callers validate operands first.
    pub(crate) fn emit(&mut self, op: Operation, operands: Vec<Operand>, spec: TensorSpec) -> Node {
        let value = self.allocate_value();
        tracing::trace!(
            builder = %self.id,
            value = value.0,
            op = op.name(),
            dims = ?spec.dims(),
            "emit"
        );
        self.value_specs.insert(value, spec.clone());
        self.instructions.push(Instruction {
            id: value,
            op,
            operands,
            output: value_type_tensor(spec),
        });
        self.node(value)
    }

    fn node(&self, value: ValueId) -> Node {
        Node {
            builder: self.id,
            value,
        }
    }

    fn allocate_value(&mut self) -> ValueId {
        let value = ValueId(self.next_value);
        self.next_value += 1;
        value
    }
}
