//! Portable tensor IR model shared by the lowering engine and its backends.

pub mod ptir_utils;
pub mod shape_helpers;
pub mod spec;
