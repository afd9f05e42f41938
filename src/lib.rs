//! lazygrad: lazy reverse-mode automatic differentiation in Rust.
//!
//! Arithmetic on graph handles builds a directed expression graph instead of
//! computing values. The graph is evaluated on demand, forward results are
//! memoised, and exact gradients of any node with respect to any other node
//! come from a single backward traversal.
//!
//! # Features
//!
//! - Arena-backed graphs with `Copy` handles and operator overloading.
//! - Variables, placeholders fed later, primitive operations and composite
//!   operations with their own internal sub-graph.
//! - Chain-rule accumulation along a discovered path, with optional path
//!   caching and a per-graph gradient reset policy.
//! - NumPy-style broadcasting tensors with Rayon-parallel kernels.
//!
//! # Modules
//!
//! - [`tensors`]: Core tensor data structures and operations.
//! - [`ops`]: CPU kernels behind the tensor arithmetic.
//! - [`graph`]: The expression graph, forward evaluation and backward engine.
//! - [`backprop`]: Differentiable operations.
//! - [`config`]: Gradient lifecycle settings.
//! - [`optim`]: Gradient-descent updates over nested parameters.
//! - [`gradcheck`]: Finite-difference gradient checking.
//! - [`approx`]: Graded floating point equality.
//! - [`error`]: Error types.
//!
//! # Example
//!
//! ```rust
//! use lazygrad::prelude::*;
//!
//! let g = Graph::new();
//! let x = g.placeholder_named("x");
//! let y = x * x + x;
//!
//! x.assign(3.0).unwrap();
//! assert_eq!(y.evaluate().unwrap().item(), Some(12.0));
//! assert_eq!(y.grad(x).unwrap().item(), Some(7.0));
//! ```

pub mod approx;
pub mod backprop;
pub mod config;
pub mod error;
pub mod gradcheck;
pub mod graph;
pub mod ops;
pub mod optim;
pub mod tensors;

/// The everyday API in one import.
pub mod prelude {
    pub use crate::backprop::Operation;
    pub use crate::config::GradConfig;
    pub use crate::error::{GradError, Result, ShapeError};
    pub use crate::graph::{Graph, IntoVar, NodeId, Var};
    pub use crate::optim::{Params, sgd};
    pub use crate::tensor;
    pub use crate::tensors::{Ten64, Tensor};
}
