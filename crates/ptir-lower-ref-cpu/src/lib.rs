//! Host reference interpreter for programs emitted by `ptir-lower`.
//!
//! Intended for tests and debugging: every primitive is evaluated by explicit index mapping, with
//! no attempt at performance.

pub mod cpu;

pub use cpu::{CpuPortableBackend, CpuTensor, TensorData};
