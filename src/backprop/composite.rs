//! Operations assembled from other operations.

use crate::graph::Var;

/// `-1 * x`.
pub(super) fn neg(x: Var<'_>) -> Var<'_> {
    x.graph().variable(-1.0).multiply(x)
}

/// `1 / (1 + e^-x)` as a sub-graph of `multiply`, `exp`, `add` and `divide`
/// nodes. Gradients flow through the sub-graph's own derivative rules.
pub(super) fn sigmoid(x: Var<'_>) -> Var<'_> {
    let graph = x.graph();
    let builder = graph.begin_composite();

    let e = neg(x).exp();
    let denominator = graph.variable(1.0).add(e);
    let out = graph.variable(1.0).divide(denominator);

    builder.finish("sigmoid", &[x], out)
}
