use crate::backprop::Operation;
use crate::tensors::Ten64;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Stable index of a node inside its [`Graph`](super::Graph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Position in the graph's arena.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// `(consumer, predecessor)`: gradient flows from the first to the second.
pub(crate) type Edge = (NodeId, NodeId);

/// Internal nodes of a composite operation.
#[derive(Debug, Clone)]
pub(crate) struct SubGraph {
    pub(crate) nodes: Vec<NodeId>,
    pub(crate) output: NodeId,
}

#[derive(Debug)]
pub(crate) enum NodeKind {
    Variable(Rc<Ten64>),
    Placeholder(Option<Rc<Ten64>>),
    Operation {
        op: Box<dyn Operation>,
        output: Option<Rc<Ten64>>,
    },
    Composite {
        name: &'static str,
        sub_graph: SubGraph,
    },
}

#[derive(Debug)]
pub(crate) struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) label: Option<String>,
    pub(crate) inputs: Vec<NodeId>,
    pub(crate) consumers: Vec<NodeId>,
    pub(crate) gradient: Ten64,
    /// Backward paths from this node, keyed by target.
    pub(crate) paths: HashMap<NodeId, Rc<[Edge]>>,
}

impl Node {
    /// Variables start with zeros shaped like their data; every other node
    /// with a scalar zero until its value is known.
    pub(crate) fn new(kind: NodeKind, inputs: Vec<NodeId>, label: Option<String>) -> Self {
        let mut node = Self {
            kind,
            label,
            inputs,
            consumers: Vec::new(),
            gradient: Ten64::scalar(0.0),
            paths: HashMap::new(),
        };
        node.gradient = node.zeroed_gradient();
        node
    }

    pub(crate) fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Variable(_) | NodeKind::Placeholder(_))
    }

    pub(crate) fn kind_name(&self) -> &'static str {
        match &self.kind {
            NodeKind::Variable(_) => "variable",
            NodeKind::Placeholder(_) => "placeholder",
            NodeKind::Operation { op, .. } => op.name(),
            NodeKind::Composite { name, .. } => *name,
        }
    }

    /// Leaf data or memoised forward output, whichever this node has.
    pub(crate) fn known_value(&self) -> Option<&Ten64> {
        match &self.kind {
            NodeKind::Variable(data) => Some(data.as_ref()),
            NodeKind::Placeholder(data) | NodeKind::Operation { output: data, .. } => {
                data.as_deref()
            }
            NodeKind::Composite { .. } => None,
        }
    }

    /// Zeros shaped like the node's value, or a scalar zero when unknown.
    pub(crate) fn zeroed_gradient(&self) -> Ten64 {
        self.known_value()
            .map_or_else(|| Ten64::scalar(0.0), Ten64::zeros_like)
    }

    /// Human-readable name used in error messages.
    pub(crate) fn describe(&self, id: NodeId) -> String {
        match &self.label {
            Some(label) => format!("{} `{label}` ({id})", self.kind_name()),
            None => format!("{} {id}", self.kind_name()),
        }
    }
}

/// Follows composite nodes down to the node that really computes their value.
pub(crate) fn resolve(nodes: &[Node], mut id: NodeId) -> NodeId {
    while let NodeKind::Composite { sub_graph, .. } = &nodes[id.0].kind {
        id = sub_graph.output;
    }
    id
}
