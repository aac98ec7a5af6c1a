//! Shape lowering for portable tensor graphs.
//!
//! Higher-level tensor operations (view, squeeze, expand, stack, repeat, split, slice, resize,
//! update_slice, unselect) are lowered into a small PTIR primitive set recorded by a
//! [`GraphBuilder`]. All shape checks happen while the graph is built; executing the resulting
//! [`Program`](backend::spec::Program) is left to a [`PortableBackend`].

pub mod backend;
pub mod env;
pub mod error;
pub mod ops;

pub use backend::spec::{DType, PortableBackend, ReshapeDim, TensorSpec};
pub use env::LoweringOptions;
pub use error::{LoweringError, LoweringResult};
pub use ops::graph::{BuilderId, GraphBuilder, Node};
