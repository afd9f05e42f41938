//! `Var` handles and conversions into them.

use super::{Graph, NodeId, NodeKind};
use crate::error::Result;
use crate::tensors::Ten64;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ptr;

/// Handle to a node of a [`Graph`].
///
/// Handles are `Copy` and borrow the graph, so a node can never outlive the
/// graph that owns it. Two handles are equal when they name the same node of
/// the same graph.
#[derive(Clone, Copy)]
pub struct Var<'g> {
    pub(crate) graph: &'g Graph,
    pub(crate) id: NodeId,
}

impl<'g> Var<'g> {
    /// Id of the node inside its graph.
    #[must_use]
    pub const fn id(self) -> NodeId {
        self.id
    }

    /// The owning graph.
    #[must_use]
    pub const fn graph(self) -> &'g Graph {
        self.graph
    }

    /// Computes (or returns the memoised) value of this node.
    ///
    /// # Errors
    /// See [`Graph::evaluate`].
    pub fn evaluate(self) -> Result<Ten64> {
        self.graph.evaluate(self)
    }

    /// Shape of the node's value, evaluating it if needed.
    ///
    /// # Errors
    /// See [`Graph::evaluate`].
    pub fn shape(self) -> Result<Vec<usize>> {
        Ok(self.graph.evaluate_id(self.id)?.shape.clone())
    }

    /// Accumulated gradient.
    #[must_use]
    pub fn gradient(self) -> Ten64 {
        self.graph.gradient(self)
    }

    /// Gives this placeholder its data.
    ///
    /// # Errors
    /// See [`Graph::assign`].
    pub fn assign(self, data: impl Into<Ten64>) -> Result<()> {
        self.graph.assign(self, data)
    }

    /// Back-propagates from this node to `target`.
    ///
    /// # Errors
    /// See [`Graph::backward`].
    pub fn backward(self, target: Var<'g>, cache_path: bool) -> Result<()> {
        self.graph.backward(self, target, cache_path)
    }

    /// Back-propagates from this node to each of `targets` in turn.
    ///
    /// # Errors
    /// See [`Graph::backward_many`].
    pub fn backward_many(self, targets: &[Var<'g>], cache_path: bool) -> Result<()> {
        self.graph.backward_many(self, targets, cache_path)
    }

    /// Runs a backward pass to `target` and returns the gradient it received.
    ///
    /// # Errors
    /// See [`Graph::backward`].
    pub fn grad(self, target: Var<'g>) -> Result<Ten64> {
        self.graph.grad(self, target)
    }

    /// Whether this is a variable or a placeholder.
    #[must_use]
    pub fn is_leaf(self) -> bool {
        self.graph.with_node(self.id, super::Node::is_leaf)
    }

    /// Whether this is a placeholder, assigned or not.
    #[must_use]
    pub fn is_placeholder(self) -> bool {
        self.graph
            .with_node(self.id, |node| matches!(node.kind, NodeKind::Placeholder(_)))
    }

    /// Whether this is a placeholder that already holds data.
    #[must_use]
    pub fn is_assigned(self) -> bool {
        self.graph
            .with_node(self.id, |node| matches!(node.kind, NodeKind::Placeholder(Some(_))))
    }

    /// Whether this is a composite operation.
    #[must_use]
    pub fn is_composite(self) -> bool {
        self.graph
            .with_node(self.id, |node| matches!(node.kind, NodeKind::Composite { .. }))
    }

    /// `"variable"`, `"placeholder"`, or the operation's name.
    #[must_use]
    pub fn kind_name(self) -> &'static str {
        self.graph.with_node(self.id, super::Node::kind_name)
    }

    /// Label given at creation, if any.
    #[must_use]
    pub fn label(self) -> Option<String> {
        self.graph.with_node(self.id, |node| node.label.clone())
    }

    /// Operands, in order.
    #[must_use]
    pub fn inputs(self) -> Vec<Var<'g>> {
        self.graph.inputs(self)
    }

    /// Operations that read this node.
    #[must_use]
    pub fn consumers(self) -> Vec<Var<'g>> {
        self.graph.consumers(self)
    }
}

impl PartialEq for Var<'_> {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self.graph, other.graph) && self.id == other.id
    }
}

impl Eq for Var<'_> {}

impl Hash for Var<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.graph.id().hash(state);
        self.id.hash(state);
    }
}

impl fmt::Debug for Var<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Var")
            .field("graph", &self.graph.id())
            .field("id", &self.id)
            .field("kind", &self.kind_name())
            .finish()
    }
}

impl fmt::Display for Var<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.graph.with_node(self.id, |node| match &node.kind {
            NodeKind::Variable(data) => write!(f, "<Variable {:?}>", data.data),
            NodeKind::Placeholder(Some(data)) => write!(f, "<Placeholder {:?}>", data.data),
            NodeKind::Placeholder(None) => match &node.label {
                Some(label) => write!(f, "<Placeholder `{label}` unassigned>"),
                None => f.write_str("<Placeholder unassigned>"),
            },
            NodeKind::Operation { .. } | NodeKind::Composite { .. } => {
                write!(f, "<{} Operation>", capitalize(node.kind_name()))
            }
        })
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// Anything usable as an operand: a handle of the same graph, or a plain
/// value that becomes a new variable.
pub trait IntoVar<'g> {
    /// Converts `self` into a node of `graph`.
    ///
    /// # Panics
    /// Panics if `self` is a handle of another graph.
    fn into_var(self, graph: &'g Graph) -> Var<'g>;
}

impl<'g> IntoVar<'g> for Var<'g> {
    fn into_var(self, graph: &'g Graph) -> Var<'g> {
        graph.owns(self);
        self
    }
}

impl<'g> IntoVar<'g> for f64 {
    fn into_var(self, graph: &'g Graph) -> Var<'g> {
        graph.variable(self)
    }
}

impl<'g> IntoVar<'g> for Ten64 {
    fn into_var(self, graph: &'g Graph) -> Var<'g> {
        graph.variable(self)
    }
}

impl<'g> IntoVar<'g> for Vec<f64> {
    fn into_var(self, graph: &'g Graph) -> Var<'g> {
        graph.variable(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_follows_node_kind() {
        let g = Graph::new();
        let x = g.variable(2.0);
        let p = g.placeholder_named("input");
        let s = x + x;

        assert_eq!(x.to_string(), "<Variable [2.0]>");
        assert_eq!(p.to_string(), "<Placeholder `input` unassigned>");
        assert_eq!(s.to_string(), "<Add Operation>");
        assert_eq!(x.sigmoid().to_string(), "<Sigmoid Operation>");
    }

    #[test]
    fn handles_compare_by_graph_and_id() {
        let g = Graph::new();
        let h = Graph::new();
        let a = g.variable(1.0);
        let b = h.variable(1.0);

        assert_eq!(a, g.live()[0]);
        assert_ne!(a, b);
        assert_eq!(a.id(), b.id());
    }
}
