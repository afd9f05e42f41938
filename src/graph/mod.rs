//! Arena-backed expression graph.
//!
//! # Graph Model
//!
//! A [`Graph`] owns every value and operation built through it. Nodes live in
//! one arena and refer to each other by [`NodeId`], so the two-way links
//! between an operation and its operands (`inputs` one way, `consumers` the
//! other) are plain index lists with no ownership attached. Dropping the
//! graph drops everything.
//!
//! Users hold [`Var`] handles: `Copy` pairs of a graph reference and a node
//! id. Applying arithmetic to handles appends new nodes; nothing is computed
//! until [`Graph::evaluate`] or a backward pass asks for a value.
//!
//! ## Node Kinds
//!
//! - **Variable**: a leaf with fixed data.
//! - **Placeholder**: a leaf whose data is supplied later via [`Graph::assign`].
//! - **Operation**: a primitive from [`crate::backprop`] with a memoised output.
//! - **Composite**: an operation built from other operations. Its internal
//!   nodes form a sub-graph with one designated output, and every reference to
//!   the composite (evaluation, consumers, gradients) is redirected to that
//!   output.
//!
//! ## Threading
//!
//! A graph uses `RefCell` internally and is meant to be built and
//! differentiated on one thread. Graph ids come from a process-wide atomic
//! counter, so graphs created on different threads never share an id.
//!
//! ## Example
//!
//! ```rust
//! use lazygrad::graph::Graph;
//!
//! let g = Graph::new();
//! let x = g.variable(2.0);
//! let y = g.variable(3.0);
//! let z = g.variable(10.0);
//! let r = ((x + y) * z) ^ 2.0;
//!
//! assert_eq!(r.evaluate().unwrap().item(), Some(2500.0));
//! r.backward(x, false).unwrap();
//! assert_eq!(x.gradient().item(), Some(1000.0));
//! ```

mod backward;
mod forward;
mod node;
mod overload;
mod var;

pub use self::node::NodeId;
pub use self::var::{IntoVar, Var};

pub(crate) use self::node::{Edge, Node, NodeKind, SubGraph};

use crate::backprop::Operation;
use crate::config::{self, GradConfig};
use crate::error::{GradError, Result};
use crate::tensors::Ten64;
use log::{debug, trace};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::ptr;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Source of unique graph ids.
///
/// Relaxed ordering is enough: ids only need to be distinct, not ordered
/// with respect to any other memory.
static NEXT_GRAPH_ID: AtomicUsize = AtomicUsize::new(0);

/// Owner of an expression graph and its gradient lifecycle settings.
pub struct Graph {
    id: usize,
    config: Cell<GradConfig>,
    nodes: RefCell<Vec<Node>>,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("id", &self.id)
            .field("nodes", &self.len())
            .field("config", &self.config.get())
            .finish()
    }
}

impl Graph {
    /// Creates an empty graph with the default [`GradConfig`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(GradConfig::default())
    }

    /// Creates an empty graph with the given settings.
    #[must_use]
    pub fn with_config(config: GradConfig) -> Self {
        let id = NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed);
        debug!("created graph {id} with {config:?}");
        Self {
            id,
            config: Cell::new(config),
            nodes: RefCell::new(Vec::new()),
        }
    }

    /// Process-unique id of this graph.
    #[must_use]
    pub const fn id(&self) -> usize {
        self.id
    }

    /// Current settings.
    #[must_use]
    pub fn config(&self) -> GradConfig {
        self.config.get()
    }

    /// Turns the automatic reset before each backward pass on or off.
    pub fn enable_reset_gradients(&self, state: bool) {
        self.config
            .set(self.config.get().with_reset_on_backward(state));
    }

    /// Whether backward passes start from zeroed gradients.
    #[must_use]
    pub fn reset_gradient_enabled(&self) -> bool {
        self.config.get().reset_on_backward
    }

    /// Sets the reset policy from text such as a config file value.
    ///
    /// # Errors
    /// Returns [`GradError::InvalidArgument`] if `value` is not a boolean; the
    /// policy is left unchanged.
    pub fn set_reset_policy(&self, value: &str) -> Result<()> {
        let state = config::parse_flag(value)?;
        self.enable_reset_gradients(state);
        Ok(())
    }

    /// Number of nodes ever created in this graph.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.borrow().len()
    }

    /// Whether no node has been created yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Creates a leaf holding `data`.
    pub fn variable(&self, data: impl Into<Ten64>) -> Var<'_> {
        let id = self.push(NodeKind::Variable(Rc::new(data.into())), Vec::new(), None);
        self.handle(id)
    }

    /// Creates a labelled leaf holding `data`.
    pub fn variable_named(&self, name: impl Into<String>, data: impl Into<Ten64>) -> Var<'_> {
        let id = self.push(
            NodeKind::Variable(Rc::new(data.into())),
            Vec::new(),
            Some(name.into()),
        );
        self.handle(id)
    }

    /// Creates a leaf whose data is supplied later with [`assign`](Self::assign).
    pub fn placeholder(&self) -> Var<'_> {
        let id = self.push(NodeKind::Placeholder(None), Vec::new(), None);
        self.handle(id)
    }

    /// Creates a labelled placeholder; the label appears in error messages.
    pub fn placeholder_named(&self, name: impl Into<String>) -> Var<'_> {
        let id = self.push(NodeKind::Placeholder(None), Vec::new(), Some(name.into()));
        self.handle(id)
    }

    /// Gives a placeholder its data.
    ///
    /// The gradient is re-zeroed to the new shape when the shape changes and
    /// kept otherwise.
    ///
    /// Memoised outputs that already read an earlier value are not refreshed;
    /// call [`clear_outputs`](Self::clear_outputs) after re-assigning.
    ///
    /// # Errors
    /// Returns [`GradError::InvalidArgument`] if `var` is not a placeholder.
    pub fn assign(&self, var: Var<'_>, data: impl Into<Ten64>) -> Result<()> {
        self.owns(var);
        let mut nodes = self.nodes.borrow_mut();
        let node = &mut nodes[var.id.0];
        if let NodeKind::Placeholder(slot) = &mut node.kind {
            let data = data.into();
            if node.gradient.shape != data.shape {
                node.gradient = data.zeros_like();
            }
            *slot = Some(Rc::new(data));
            debug!("assigned placeholder {}", var.id);
            return Ok(());
        }
        Err(GradError::InvalidArgument(format!(
            "cannot assign data to {}; only placeholders accept assignment",
            node.describe(var.id)
        )))
    }

    /// Appends an operation node reading `inputs`.
    ///
    /// This is how every primitive in [`crate::backprop`] enters the graph, and
    /// it accepts user-defined [`Operation`]s the same way.
    ///
    /// # Panics
    /// Panics if an input belongs to another graph.
    pub fn apply(&self, op: impl Operation + 'static, inputs: &[Var<'_>]) -> Var<'_> {
        let ids = self.ids_of(inputs);
        let id = self.push(
            NodeKind::Operation {
                op: Box::new(op),
                output: None,
            },
            ids,
            None,
        );
        self.handle(id)
    }

    /// Starts recording the internal nodes of a composite operation.
    ///
    /// Every node created between this call and [`SubGraphBuilder::finish`]
    /// becomes part of the composite's sub-graph.
    pub fn begin_composite(&self) -> SubGraphBuilder<'_> {
        SubGraphBuilder {
            graph: self,
            first: self.len(),
        }
    }

    /// Operands of `var`, in order.
    pub fn inputs(&self, var: Var<'_>) -> Vec<Var<'_>> {
        self.owns(var);
        let ids = self.nodes.borrow()[var.id.0].inputs.clone();
        ids.into_iter().map(|id| self.handle(id)).collect()
    }

    /// Operations that read `var` (or, for a composite, its designated output).
    pub fn consumers(&self, var: Var<'_>) -> Vec<Var<'_>> {
        self.owns(var);
        let nodes = self.nodes.borrow();
        let id = node::resolve(&nodes, var.id);
        nodes[id.0]
            .consumers
            .iter()
            .map(|&c| self.handle(c))
            .collect()
    }

    /// Internal nodes and designated output of a composite, `None` otherwise.
    pub fn sub_graph(&self, var: Var<'_>) -> Option<(Vec<Var<'_>>, Var<'_>)> {
        self.owns(var);
        let nodes = self.nodes.borrow();
        match &nodes[var.id.0].kind {
            NodeKind::Composite { sub_graph, .. } => Some((
                sub_graph.nodes.iter().map(|&id| self.handle(id)).collect(),
                self.handle(sub_graph.output),
            )),
            _ => None,
        }
    }

    /// Every node in the graph, in creation order.
    pub fn live(&self) -> Vec<Var<'_>> {
        (0..self.len()).map(|i| self.handle(NodeId(i))).collect()
    }

    /// Accumulated gradient of `var`.
    ///
    /// A node no backward pass has touched reports a scalar zero.
    pub fn gradient(&self, var: Var<'_>) -> Ten64 {
        self.owns(var);
        let nodes = self.nodes.borrow();
        nodes[node::resolve(&nodes, var.id).0].gradient.clone()
    }

    /// Zeroes the gradient of every node in the graph.
    pub fn reset_gradients(&self) {
        let count = self.sweep(|_| true);
        debug!("zeroed {count} gradients in graph {}", self.id);
    }

    /// Zeroes the gradients of variables and placeholders only.
    pub fn reset_leaf_gradients(&self) {
        let count = self.sweep(Node::is_leaf);
        debug!("zeroed {count} leaf gradients in graph {}", self.id);
    }

    /// Zeroes the gradients of operation and composite nodes only.
    pub fn reset_intermediate_gradients(&self) {
        let count = self.sweep(|node| !node.is_leaf());
        debug!("zeroed {count} intermediate gradients in graph {}", self.id);
    }

    fn sweep(&self, select: impl Fn(&Node) -> bool) -> usize {
        let mut nodes = self.nodes.borrow_mut();
        let mut count = 0;
        for node in nodes.iter_mut().filter(|node| select(node)) {
            node.gradient = node.zeroed_gradient();
            count += 1;
        }
        count
    }

    /// Replaces the data of a variable or an assigned placeholder.
    pub(crate) fn replace_leaf_data(&self, var: Var<'_>, data: Ten64) -> Result<()> {
        self.owns(var);
        let mut nodes = self.nodes.borrow_mut();
        let node = &mut nodes[var.id.0];
        match &mut node.kind {
            NodeKind::Variable(slot) => *slot = Rc::new(data),
            NodeKind::Placeholder(Some(slot)) => *slot = Rc::new(data),
            _ => {
                return Err(GradError::InvalidArgument(format!(
                    "{} does not hold data of its own",
                    node.describe(var.id)
                )));
            }
        }
        Ok(())
    }

    /// Data of a leaf.
    pub(crate) fn leaf_data(&self, var: Var<'_>) -> Result<Rc<Ten64>> {
        self.owns(var);
        if !self.nodes.borrow()[var.id.0].is_leaf() {
            return Err(GradError::InvalidArgument(format!(
                "{} is not a leaf",
                self.nodes.borrow()[var.id.0].describe(var.id)
            )));
        }
        self.evaluate_id(var.id)
    }

    pub(crate) fn with_node<R>(&self, id: NodeId, f: impl FnOnce(&Node) -> R) -> R {
        f(&self.nodes.borrow()[id.0])
    }

    pub(crate) fn resolve(&self, id: NodeId) -> NodeId {
        node::resolve(&self.nodes.borrow(), id)
    }

    pub(crate) const fn handle(&self, id: NodeId) -> Var<'_> {
        Var { graph: self, id }
    }

    /// Asserts that `var` was created by this graph.
    pub(crate) fn owns(&self, var: Var<'_>) {
        assert!(
            ptr::eq(var.graph, self),
            "node {} belongs to graph {}, not graph {}",
            var.id,
            var.graph.id,
            self.id
        );
    }

    fn ids_of(&self, vars: &[Var<'_>]) -> Vec<NodeId> {
        vars.iter()
            .map(|&var| {
                self.owns(var);
                var.id
            })
            .collect()
    }

    /// Appends a node and registers it as a consumer of each distinct input.
    fn push(&self, kind: NodeKind, inputs: Vec<NodeId>, label: Option<String>) -> NodeId {
        let mut nodes = self.nodes.borrow_mut();
        let id = NodeId(nodes.len());

        for &input in &inputs {
            let attach = node::resolve(&nodes, input);
            let consumers = &mut nodes[attach.0].consumers;
            if !consumers.contains(&id) {
                consumers.push(id);
            }
        }

        let node = Node::new(kind, inputs, label);
        trace!("created {} node {id} with inputs {:?}", node.kind_name(), node.inputs);
        nodes.push(node);
        id
    }
}

/// Records the internal nodes of a composite operation.
///
/// Obtained from [`Graph::begin_composite`].
///
/// # Example
///
/// ```rust
/// use lazygrad::graph::Graph;
///
/// let g = Graph::new();
/// let x = g.variable(3.0);
///
/// let builder = g.begin_composite();
/// let square = x * x;
/// let out = square + x;
/// let f = builder.finish("square_plus", &[x], out);
///
/// assert_eq!(f.evaluate().unwrap().item(), Some(12.0));
/// assert_eq!(f.grad(x).unwrap().item(), Some(7.0));
/// ```
#[derive(Debug)]
#[must_use = "the composite is only registered by `finish`"]
pub struct SubGraphBuilder<'g> {
    graph: &'g Graph,
    first: usize,
}

impl<'g> SubGraphBuilder<'g> {
    /// The graph being built into.
    #[must_use]
    pub const fn graph(&self) -> &'g Graph {
        self.graph
    }

    /// Registers the composite node.
    ///
    /// `inputs` are the composite's outer operands; `output` is the internal
    /// node whose value is the composite's value.
    ///
    /// # Panics
    /// Panics if `output` was not created after [`Graph::begin_composite`].
    pub fn finish(self, name: &'static str, inputs: &[Var<'g>], output: Var<'g>) -> Var<'g> {
        let graph = self.graph;
        graph.owns(output);

        let nodes: Vec<NodeId> = (self.first..graph.len()).map(NodeId).collect();
        assert!(
            nodes.contains(&output.id),
            "composite `{name}` must designate one of its own internal nodes as output"
        );

        let ids = graph.ids_of(inputs);
        let id = graph.push(
            NodeKind::Composite {
                name,
                sub_graph: SubGraph {
                    nodes,
                    output: output.id,
                },
            },
            ids,
            None,
        );
        graph.handle(id)
    }
}
