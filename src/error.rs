//! Error types for the numeric layer and the autodiff engine.
//!
//! Two levels are kept apart:
//!
//! - [`ShapeError`] is raised by tensor arithmetic (broadcasting, matmul,
//!   reshape). The engine never reinterprets it.
//! - [`GradError`] is raised by graph operations. Numeric failures surface as
//!   [`GradError::Shape`], which displays exactly like the wrapped
//!   [`ShapeError`].

use crate::graph::NodeId;
use thiserror::Error;

/// Errors produced by tensor operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    /// Flat data does not fill the requested shape.
    #[error("shape {shape:?} is incompatible with {len} data elements")]
    DataLength { shape: Vec<usize>, len: usize },

    /// Two operands cannot be broadcast against each other.
    #[error("operands with shapes {lhs:?} and {rhs:?} cannot be broadcast together")]
    Broadcast { lhs: Vec<usize>, rhs: Vec<usize> },

    /// A gradient cannot be reduced back onto an operand's shape.
    #[error("cannot reduce a tensor of shape {from:?} to shape {to:?}")]
    Reduce { from: Vec<usize>, to: Vec<usize> },

    /// Contracted dimensions differ.
    #[error("inner dimensions must match for {op}: {lhs:?} vs {rhs:?}")]
    InnerDimension {
        op: &'static str,
        lhs: Vec<usize>,
        rhs: Vec<usize>,
    },

    /// An operand has a rank the operation does not support.
    #[error("{op} expects a tensor of rank {expected}, got rank {actual}")]
    Rank {
        op: &'static str,
        expected: &'static str,
        actual: usize,
    },

    /// Element counts differ between the source and target shape.
    #[error("cannot reshape {from:?} into {to:?}")]
    Reshape { from: Vec<usize>, to: Vec<usize> },

    /// An operation received the wrong number of operands.
    #[error("{op} takes {expected} operand(s), got {actual}")]
    Arity {
        op: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Errors produced while building, evaluating or differentiating a graph.
#[derive(Debug, Error)]
pub enum GradError {
    /// A placeholder was read before [`assign`](crate::graph::Graph::assign).
    #[error("{name} is not assigned yet to a value")]
    PlaceholderNotAssigned { name: String },

    /// The backward target does not feed the root.
    #[error("no path found from node {root} to node {target}")]
    NoPathFound { root: NodeId, target: NodeId },

    /// A call was made with an argument outside its contract.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A numeric failure from the tensor layer, passed through unchanged.
    #[error(transparent)]
    Shape(#[from] ShapeError),
}

/// Result alias used throughout the engine.
pub type Result<T, E = GradError> = core::result::Result<T, E>;
