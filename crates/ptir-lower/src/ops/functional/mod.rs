//! Shape-level lowerings composed from the primitive emitters in [`crate::ops::graph`].
//!
//! Every routine takes the owning [`GraphBuilder`](crate::ops::graph::GraphBuilder) plus node
//! handles and plain shape parameters, validates what the primitives cannot see, and appends
//! instructions. Nothing here executes tensors; the emitted graph is consumed by a
//! [`PortableBackend`](crate::backend::spec::PortableBackend).
//!
//! Validation that a primitive already performs (broadcast compatibility, concatenate agreement,
//! slice bounds) is not repeated here; those failures surface unchanged from the primitive.

pub mod combine;
pub mod range;
pub mod scatter;
pub mod shape;
pub mod utils;

pub use combine::*;
pub use range::*;
pub use scatter::*;
pub use shape::*;
pub use utils::{complete_shape, element_count, unsqueeze_dims};
