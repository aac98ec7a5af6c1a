//! Graph construction layer: the [`GraphBuilder`] arena and its primitive emitters.

mod builder;
mod primitives;

pub use builder::{BuilderId, GraphBuilder, Node};
