//! Differentiable operations.
//!
//! # Primitive Operation Catalog
//!
//! Every operation node in a [`Graph`](crate::graph::Graph) carries a boxed
//! [`Operation`]: a forward rule computing the output from the operand values
//! and a vector-Jacobian rule mapping an upstream gradient onto one operand.
//!
//! **Key Features:**
//! - **Arithmetic:** `add`, `subtract`, `multiply`, `divide`, `power`, with
//!   NumPy broadcasting. Gradients are summed back onto each operand's shape.
//! - **Elementwise functions:** `exp`, `sin`, `cos`, `sinh`, `cosh`, `relu`.
//! - **Linear algebra:** `dot`, `matmul` and the full reduction `sum`.
//! - **Sigmoid:** a composite built from `exp`, `add` and `divide` nodes, and
//!   a single-node `sigmoid_atomic` variant.
//!
//! ## Operation Pattern
//!
//! Each operation follows a simple pattern:
//! 1. **Inputs** arrive as borrowed operand values, in construction order.
//! 2. **Forward** computes an output [`Ten64`].
//! 3. **VJP** receives the inputs, the memoised output, the operand slot and
//!    the upstream gradient, and returns the gradient for that slot, shaped
//!    like the operand.
//!
//! The backward engine sums the results of every slot that refers to the same
//! node, so `x * x` differentiates to `2x` without special cases.
//!
//! ## Extending
//!
//! Implement [`Operation`] for a new type and add it to a graph with
//! [`Graph::apply`](crate::graph::Graph::apply).

mod arith;
mod composite;
mod elementwise;
mod linalg;

pub use self::arith::{Add, Divide, Multiply, Power, Subtract};
pub use self::elementwise::{Cos, Cosh, Exp, Relu, SigmoidAtomic, Sin, Sinh};
pub use self::linalg::{Dot, Matmul, Sum};

use crate::error::ShapeError;
use crate::graph::{IntoVar, Var};
use crate::tensors::Ten64;
use std::fmt;

/// A differentiable primitive.
pub trait Operation: fmt::Debug {
    /// Short lowercase name, used in logs, errors and `Display`.
    fn name(&self) -> &'static str;

    /// Computes the output from the operand values.
    ///
    /// # Errors
    /// Returns a [`ShapeError`] if the operands are incompatible.
    fn forward(&self, inputs: &[&Ten64]) -> Result<Ten64, ShapeError>;

    /// Gradient of the loss with respect to operand `wrt`, given the gradient
    /// of the loss with respect to `output`.
    ///
    /// The result must have the shape of `inputs[wrt]`.
    ///
    /// # Errors
    /// Returns a [`ShapeError`] if the shapes are incompatible.
    fn vjp(
        &self,
        inputs: &[&Ten64],
        output: &Ten64,
        wrt: usize,
        upstream: &Ten64,
    ) -> Result<Ten64, ShapeError>;
}

/// Multiplies a local derivative by the upstream gradient and folds the
/// broadcast dimensions back onto the operand's `shape`.
pub(crate) fn chain(local: &Ten64, upstream: &Ten64, shape: &[usize]) -> Result<Ten64, ShapeError> {
    local.mul(upstream)?.sum_to(shape)
}

pub(crate) const fn arity(op: &'static str, expected: usize, actual: usize) -> ShapeError {
    ShapeError::Arity {
        op,
        expected,
        actual,
    }
}

macro_rules! binary_fns {
    ($($(#[$meta:meta])* $name:ident => $op:expr;)*) => {
        $(
            $(#[$meta])*
            pub fn $name<'g>(x: Var<'g>, y: impl IntoVar<'g>) -> Var<'g> {
                let y = y.into_var(x.graph());
                x.graph().apply($op, &[x, y])
            }
        )*
    };
}

macro_rules! unary_fns {
    ($($(#[$meta:meta])* $name:ident => $op:expr;)*) => {
        $(
            $(#[$meta])*
            pub fn $name(x: Var<'_>) -> Var<'_> {
                x.graph().apply($op, &[x])
            }
        )*
    };
}

binary_fns! {
    /// `x + y`.
    add => Add;
    /// `x - y`.
    subtract => Subtract;
    /// `x * y`, elementwise.
    multiply => Multiply;
    /// `x / y`, elementwise.
    divide => Divide;
    /// Dot product; elementwise when either side is a scalar.
    dot => Dot;
    /// Matrix product.
    matmul => Matmul;
}

unary_fns! {
    /// Sum of all elements.
    sum => Sum;
    /// `e^x`.
    exp => Exp;
    /// `sin(x)`.
    sin => Sin;
    /// `cos(x)`.
    cos => Cos;
    /// `sinh(x)`.
    sinh => Sinh;
    /// `cosh(x)`.
    cosh => Cosh;
    /// `max(0, x)`.
    relu => Relu;
    /// Logistic function as one node.
    sigmoid_atomic => SigmoidAtomic;
}

/// `x^exponent`, elementwise.
pub fn power(x: Var<'_>, exponent: f64) -> Var<'_> {
    x.graph().apply(Power { exponent }, &[x])
}

/// `-x`, built as `-1 * x`.
pub fn neg(x: Var<'_>) -> Var<'_> {
    composite::neg(x)
}

/// Logistic function `1 / (1 + e^-x)` as a composite of primitive nodes.
pub fn sigmoid(x: Var<'_>) -> Var<'_> {
    composite::sigmoid(x)
}

impl<'g> Var<'g> {
    /// See [`add`](fn@add).
    #[allow(clippy::should_implement_trait)]
    pub fn add(self, other: impl IntoVar<'g>) -> Self {
        add(self, other)
    }

    /// See [`subtract`].
    pub fn subtract(self, other: impl IntoVar<'g>) -> Self {
        subtract(self, other)
    }

    /// See [`multiply`].
    pub fn multiply(self, other: impl IntoVar<'g>) -> Self {
        multiply(self, other)
    }

    /// See [`divide`].
    pub fn divide(self, other: impl IntoVar<'g>) -> Self {
        divide(self, other)
    }

    /// See [`power`].
    #[must_use]
    pub fn power(self, exponent: f64) -> Self {
        power(self, exponent)
    }

    /// See [`neg`].
    #[allow(clippy::should_implement_trait)]
    #[must_use]
    pub fn neg(self) -> Self {
        neg(self)
    }

    /// See [`dot`].
    pub fn dot(self, other: impl IntoVar<'g>) -> Self {
        dot(self, other)
    }

    /// See [`matmul`].
    pub fn matmul(self, other: impl IntoVar<'g>) -> Self {
        matmul(self, other)
    }

    /// See [`sum`].
    #[must_use]
    pub fn sum(self) -> Self {
        sum(self)
    }

    /// See [`exp`].
    #[must_use]
    pub fn exp(self) -> Self {
        exp(self)
    }

    /// See [`sin`].
    #[must_use]
    pub fn sin(self) -> Self {
        sin(self)
    }

    /// See [`cos`].
    #[must_use]
    pub fn cos(self) -> Self {
        cos(self)
    }

    /// See [`sinh`].
    #[must_use]
    pub fn sinh(self) -> Self {
        sinh(self)
    }

    /// See [`cosh`].
    #[must_use]
    pub fn cosh(self) -> Self {
        cosh(self)
    }

    /// See [`sigmoid`].
    #[must_use]
    pub fn sigmoid(self) -> Self {
        sigmoid(self)
    }

    /// See [`sigmoid_atomic`].
    #[must_use]
    pub fn sigmoid_atomic(self) -> Self {
        sigmoid_atomic(self)
    }

    /// See [`relu`].
    #[must_use]
    pub fn relu(self) -> Self {
        relu(self)
    }
}
