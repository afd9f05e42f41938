//! Gradient-descent parameter updates.
//!
//! # Optimization Helpers
//!
//! Parameters are leaves of one or more graphs, grouped however the caller
//! likes: a single variable, a list of them, or lists of lists (one per
//! layer, say). [`Params`] models that nesting and [`sgd`] walks it.
//!
//! Gradients are left as they are after an update; with the reset policy
//! enabled the next backward pass starts from zero anyway, otherwise call
//! [`Graph::reset_gradients`](crate::graph::Graph::reset_gradients).

use crate::error::{GradError, Result};
use crate::graph::Var;
use log::debug;
use std::collections::HashSet;

/// A leaf or an arbitrarily nested collection of leaves.
#[derive(Debug, Clone)]
pub enum Params<'g> {
    /// A single parameter.
    Leaf(Var<'g>),
    /// A group of parameters.
    Nested(Vec<Params<'g>>),
}

impl<'g> From<Var<'g>> for Params<'g> {
    fn from(var: Var<'g>) -> Self {
        Self::Leaf(var)
    }
}

impl<'g, P: Into<Params<'g>>> From<Vec<P>> for Params<'g> {
    fn from(items: Vec<P>) -> Self {
        Self::Nested(items.into_iter().map(Into::into).collect())
    }
}

impl<'g, P: Into<Params<'g>>, const N: usize> From<[P; N]> for Params<'g> {
    fn from(items: [P; N]) -> Self {
        Self::Nested(items.into_iter().map(Into::into).collect())
    }
}

impl<'g> Params<'g> {
    /// Every leaf, depth-first and in order.
    #[must_use]
    pub fn flatten(&self) -> Vec<Var<'g>> {
        let mut out = Vec::new();
        self.collect_into(&mut out);
        out
    }

    fn collect_into(&self, out: &mut Vec<Var<'g>>) {
        match self {
            Self::Leaf(var) => out.push(*var),
            Self::Nested(items) => {
                for item in items {
                    item.collect_into(out);
                }
            }
        }
    }
}

/// Flattens nested parameters into a list of leaves.
pub fn flatten<'g>(params: impl Into<Params<'g>>) -> Vec<Var<'g>> {
    params.into().flatten()
}

/// Performs one gradient-descent step: `w = w - lr * w.gradient` for every
/// leaf in `params`.
///
/// Memoised outputs of every touched graph are dropped so the next
/// evaluation sees the updated weights.
///
/// # Errors
/// - [`GradError::InvalidArgument`] if a parameter is not a variable or an
///   assigned placeholder. Parameters before it are already updated.
/// - [`GradError::Shape`] if a gradient does not fit its parameter.
pub fn sgd<'g>(params: impl Into<Params<'g>>, lr: f64) -> Result<()> {
    let leaves = params.into().flatten();
    let mut touched = HashSet::new();

    for var in &leaves {
        let graph = var.graph();
        if !var.is_leaf() {
            return Err(GradError::InvalidArgument(format!(
                "sgd can only update leaves, got a {} node",
                var.kind_name()
            )));
        }
        let weight = graph.leaf_data(*var)?;
        let step = var.gradient().scale(lr);
        let updated = weight.sub(&step)?.sum_to(&weight.shape)?;
        graph.replace_leaf_data(*var, updated)?;

        if touched.insert(graph.id()) {
            graph.clear_outputs();
        }
    }

    debug!("sgd updated {} parameters with lr {lr}", leaves.len());
    Ok(())
}
