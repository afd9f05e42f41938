//! Finite-difference gradient checking.
//!
//! Estimates `d sum(root) / d leaf` with central differences and compares it
//! with the gradient the backward engine produces. Useful when adding a new
//! [`Operation`](crate::backprop::Operation).
//!
//! # Example
//!
//! ```rust
//! use lazygrad::gradcheck::{check_gradient, DEFAULT_EPSILON};
//! use lazygrad::graph::Graph;
//!
//! let g = Graph::new();
//! let x = g.variable(vec![0.3, -1.2, 2.0]);
//! let y = (x.sin() * x).sum();
//!
//! let report = check_gradient(y, x, DEFAULT_EPSILON).unwrap();
//! assert!(report.passed(1e-6));
//! ```

use crate::approx::{ApproxEquality, RelativeEq};
use crate::error::{GradError, Result};
use crate::graph::Var;
use crate::tensors::Ten64;
use log::debug;

/// Default step for central differences.
pub const DEFAULT_EPSILON: f64 = 1e-6;

/// Analytic and numeric gradients of one leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct GradCheck {
    /// Gradient from the backward engine.
    pub analytic: Ten64,
    /// Central-difference estimate.
    pub numeric: Ten64,
    /// Largest elementwise absolute difference.
    pub max_abs_error: f64,
}

impl GradCheck {
    /// Whether every element agrees to within `tolerance`.
    #[must_use]
    pub fn passed(&self, tolerance: f64) -> bool {
        self.max_abs_error <= tolerance
    }

    /// Graded agreement of the two gradients.
    #[must_use]
    pub fn equality(&self) -> ApproxEquality {
        self.analytic.approx_eq(&self.numeric)
    }
}

/// Central-difference estimate of `d sum(root) / d leaf`.
///
/// The leaf's data is restored and memoised outputs are dropped afterwards,
/// whether or not the estimate succeeded.
///
/// # Errors
/// - [`GradError::InvalidArgument`] if `leaf` does not hold data or `eps`
///   is not positive.
/// - Any error of evaluating `root`.
pub fn numerical_gradient(root: Var<'_>, leaf: Var<'_>, eps: f64) -> Result<Ten64> {
    if eps.is_nan() || eps <= 0.0 {
        return Err(GradError::InvalidArgument(format!(
            "finite-difference step must be positive, got {eps}"
        )));
    }
    let graph = root.graph();
    let original = graph.leaf_data(leaf)?;

    let result = probe(root, leaf, &original, eps);

    graph.replace_leaf_data(leaf, original.as_ref().clone())?;
    graph.clear_outputs();
    result
}

fn probe(root: Var<'_>, leaf: Var<'_>, original: &Ten64, eps: f64) -> Result<Ten64> {
    let graph = root.graph();
    let mut estimate = Vec::with_capacity(original.len());

    for i in 0..original.len() {
        let mut shifted = original.clone();

        shifted.data[i] = original.data[i] + eps;
        graph.replace_leaf_data(leaf, shifted.clone())?;
        graph.clear_outputs();
        let plus = root.evaluate()?.sum().data[0];

        shifted.data[i] = original.data[i] - eps;
        graph.replace_leaf_data(leaf, shifted)?;
        graph.clear_outputs();
        let minus = root.evaluate()?.sum().data[0];

        estimate.push((plus - minus) / (2.0 * eps));
    }

    Ok(Ten64::new(original.shape.clone(), estimate))
}

/// Compares the backward engine's gradient with [`numerical_gradient`].
///
/// The backward pass seeds `root` with ones, which is `d sum(root)` without
/// adding a node to the graph. It runs with the reset policy enabled so
/// earlier passes do not leak into the result; the graph's own policy is
/// restored afterwards.
///
/// # Errors
/// Same as [`numerical_gradient`] and [`Graph::backward`](crate::graph::Graph::backward).
pub fn check_gradient(root: Var<'_>, leaf: Var<'_>, eps: f64) -> Result<GradCheck> {
    let graph = root.graph();
    let policy = graph.reset_gradient_enabled();

    graph.enable_reset_gradients(true);
    let analytic = root.backward(leaf, false).map(|()| leaf.gradient());
    graph.enable_reset_gradients(policy);
    let analytic = analytic?;

    let numeric = numerical_gradient(root, leaf, eps)?;
    let max_abs_error = analytic
        .sub(&numeric)?
        .data
        .iter()
        .fold(0.0_f64, |acc, d| acc.max(d.abs()));

    debug!("gradient check of {} against {}: max error {max_abs_error:e}", root.id(), leaf.id());
    Ok(GradCheck {
        analytic,
        numeric,
        max_abs_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;

    #[test]
    fn estimate_restores_leaf_data() {
        let g = Graph::new();
        let x = g.variable(vec![1.0, 2.0]);
        let y = x * x;

        let numeric = numerical_gradient(y, x, 1e-5).unwrap();
        assert!((numeric.data[0] - 2.0).abs() < 1e-6);
        assert!((numeric.data[1] - 4.0).abs() < 1e-6);
        assert_eq!(x.evaluate().unwrap().data, vec![1.0, 2.0]);
        assert_eq!(y.evaluate().unwrap().data, vec![1.0, 4.0]);
    }

    #[test]
    fn non_positive_step_is_rejected() {
        let g = Graph::new();
        let x = g.variable(1.0);
        assert!(numerical_gradient(x.exp(), x, 0.0).is_err());
    }

    #[test]
    fn policy_is_restored() {
        let g = Graph::new();
        g.enable_reset_gradients(false);
        let x = g.variable(0.5);

        let report = check_gradient(x.cosh(), x, DEFAULT_EPSILON).unwrap();
        assert!(report.passed(1e-6));
        assert!(!g.reset_gradient_enabled());
    }

    #[test]
    fn checking_leaves_the_graph_unchanged() {
        let g = Graph::new();
        let x = g.variable(vec![0.4, -0.9]);
        let y = x.sin() * x;
        let nodes = g.len();

        let report = check_gradient(y, x, DEFAULT_EPSILON).unwrap();
        assert!(report.passed(1e-6));
        assert_eq!(g.len(), nodes);
        assert!(y.consumers().is_empty());
    }
}
