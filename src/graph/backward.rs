//! Reverse-mode gradient accumulation.
//!
//! A backward pass from `root` to `target` runs in two phases.
//!
//! 1. **Path discovery**: a post-order walk over `inputs` starting at the
//!    root records every `(consumer, predecessor)` edge whose predecessor is
//!    the target or another operation. Reversing that list gives an order in
//!    which every consumer is finished before its predecessors are visited.
//! 2. **Accumulation**: gradients of the nodes on the path are (optionally)
//!    zeroed, the root is seeded with ones, and each edge adds
//!    `vjp(consumer, predecessor, consumer.gradient)` into the predecessor.
//!
//! Gradients are written back only once the whole pass has succeeded, so a
//! failing pass leaves every gradient as it was.

use super::node::resolve;
use super::{Edge, Graph, NodeId, NodeKind, Var};
use crate::error::{GradError, Result};
use crate::tensors::Ten64;
use log::{debug, trace};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

impl Graph {
    /// Accumulates `d root / d target` into the gradients along the path.
    ///
    /// With the reset policy enabled (the default) every node on the path
    /// starts from zero; otherwise this pass adds on top of earlier ones.
    /// When `cache_path` is set the discovered path is stored on the root and
    /// reused by later passes to the same target.
    ///
    /// # Errors
    /// - [`GradError::NoPathFound`] if `target` does not feed `root`. No
    ///   gradient is changed.
    /// - Any error of [`evaluate`](Self::evaluate) or of an operation's
    ///   derivative rule.
    ///
    /// # Panics
    /// Panics if either handle belongs to another graph.
    pub fn backward(&self, root: Var<'_>, target: Var<'_>, cache_path: bool) -> Result<()> {
        self.backward_many(root, &[target], cache_path)
    }

    /// Runs one pass per target, in order, as a single call.
    ///
    /// Every path is discovered before any accumulation starts, and all
    /// passes work on one snapshot of the gradients that is written back
    /// only when the last of them succeeds. Later targets therefore see the
    /// gradients earlier ones produced, exactly as separate calls would.
    ///
    /// # Errors
    /// Same as [`backward`](Self::backward). On error no gradient is changed,
    /// whichever target failed.
    ///
    /// # Panics
    /// Panics if any handle belongs to another graph.
    pub fn backward_many(&self, root: Var<'_>, targets: &[Var<'_>], cache_path: bool) -> Result<()> {
        self.owns(root);
        let root = self.resolve(root.id);
        let paths = targets
            .iter()
            .map(|&target| {
                self.owns(target);
                let target = self.resolve(target.id);
                debug!("backward {root} -> {target} (cache_path: {cache_path})");
                self.path(root, target, cache_path)
            })
            .collect::<Result<Vec<_>>>()?;

        let root_value = self.evaluate_id(root)?;
        let mut scratch: HashMap<NodeId, Ten64> = HashMap::new();
        for path in &paths {
            self.accumulate(root, &root_value, path, &mut scratch)?;
        }

        let touched = scratch.len();
        let mut nodes = self.nodes.borrow_mut();
        for (id, gradient) in scratch {
            nodes[id.0].gradient = gradient;
        }
        debug!(
            "backward from {root} updated {touched} gradients over {} targets",
            paths.len()
        );
        Ok(())
    }

    /// Runs a backward pass and returns the gradient `target` ended up with.
    ///
    /// # Errors
    /// Same as [`backward`](Self::backward).
    pub fn grad(&self, root: Var<'_>, target: Var<'_>) -> Result<Ten64> {
        self.backward(root, target, false)?;
        Ok(self.gradient(target))
    }

    /// Derivative of `consumer` with respect to `wrt` alone, with a unit
    /// upstream gradient.
    ///
    /// Returns a scalar zero when `wrt` is not an operand of `consumer`.
    ///
    /// # Errors
    /// - [`GradError::InvalidArgument`] if `consumer` is a leaf.
    /// - Any error of [`evaluate`](Self::evaluate).
    pub fn local_gradient(&self, consumer: Var<'_>, wrt: Var<'_>) -> Result<Ten64> {
        self.owns(consumer);
        self.owns(wrt);
        let consumer = self.resolve(consumer.id);
        if self.with_node(consumer, super::Node::is_leaf) {
            return Err(GradError::InvalidArgument(format!(
                "{} has no local derivative",
                self.with_node(consumer, |node| node.describe(consumer))
            )));
        }

        let upstream = self.evaluate_id(consumer)?.ones_like();
        self.contribution(consumer, self.resolve(wrt.id), &upstream)
    }

    /// Forgets every cached backward path.
    pub fn clear_path_cache(&self) {
        for node in self.nodes.borrow_mut().iter_mut() {
            node.paths.clear();
        }
        debug!("cleared path cache of graph {}", self.id);
    }

    fn path(&self, root: NodeId, target: NodeId, cache_path: bool) -> Result<Rc<[Edge]>> {
        if cache_path {
            if let Some(path) = self.nodes.borrow()[root.0].paths.get(&target) {
                debug!("path cache hit {root} -> {target}");
                return Ok(Rc::clone(path));
            }
            debug!("path cache miss {root} -> {target}");
        }

        let mut search = PathSearch {
            target,
            visited: HashSet::new(),
            recorded: HashSet::new(),
            edges: Vec::new(),
        };
        search.run(&self.nodes.borrow(), root);

        if !search.edges.iter().any(|&(_, predecessor)| predecessor == target) {
            return Err(GradError::NoPathFound { root, target });
        }

        debug!("discovered {} edges from {root} to {target}", search.edges.len());
        let path: Rc<[Edge]> = search.edges.into();
        if cache_path {
            self.nodes.borrow_mut()[root.0]
                .paths
                .insert(target, Rc::clone(&path));
        }
        Ok(path)
    }

    /// Runs one pass over `path` inside `scratch`, which holds the pending
    /// gradients of every node an earlier pass of the same call touched.
    fn accumulate(
        &self,
        root: NodeId,
        root_value: &Ten64,
        path: &[Edge],
        scratch: &mut HashMap<NodeId, Ten64>,
    ) -> Result<()> {
        let reset = self.reset_gradient_enabled();
        {
            let nodes = self.nodes.borrow();
            let mut seen = HashSet::new();
            for &(consumer, predecessor) in path {
                for id in [consumer, predecessor] {
                    if !seen.insert(id) {
                        continue;
                    }
                    let start = if reset {
                        nodes[id.0].zeroed_gradient()
                    } else {
                        scratch
                            .get(&id)
                            .cloned()
                            .unwrap_or_else(|| nodes[id.0].gradient.clone())
                    };
                    scratch.insert(id, start);
                }
            }
        }
        scratch.insert(root, root_value.ones_like());

        for &(consumer, predecessor) in path.iter().rev() {
            let contribution = self.contribution(consumer, predecessor, &scratch[&consumer])?;
            trace!("accumulating {consumer} -> {predecessor}");
            if let Some(gradient) = scratch.get_mut(&predecessor) {
                *gradient = gradient.add(&contribution)?;
            }
        }
        trace!("pass from {root} covered {} edges", path.len());
        Ok(())
    }

    /// Sum of the consumer's vector-Jacobian products over every operand slot
    /// that refers to `predecessor`.
    fn contribution(&self, consumer: NodeId, predecessor: NodeId, upstream: &Ten64) -> Result<Ten64> {
        let inputs = self.with_node(consumer, |node| node.inputs.clone());
        let values = inputs
            .iter()
            .map(|&input| self.evaluate_id(input))
            .collect::<Result<Vec<_>>>()?;
        let refs: Vec<&Ten64> = values.iter().map(AsRef::as_ref).collect();
        let output = self.evaluate_id(consumer)?;

        let nodes = self.nodes.borrow();
        let NodeKind::Operation { op, .. } = &nodes[consumer.0].kind else {
            unreachable!("only operations consume other nodes")
        };

        let mut total: Option<Ten64> = None;
        for (slot, &input) in inputs.iter().enumerate() {
            if resolve(&nodes, input) != predecessor {
                continue;
            }
            let part = op.vjp(&refs, &output, slot, upstream)?;
            total = Some(match total {
                Some(sum) => sum.add(&part)?,
                None => part,
            });
        }
        Ok(total.unwrap_or_else(|| Ten64::scalar(0.0)))
    }
}

struct PathSearch {
    target: NodeId,
    visited: HashSet<NodeId>,
    recorded: HashSet<Edge>,
    edges: Vec<Edge>,
}

/// Post-order walk state: the node, the index of its next input and whether
/// that input has already been descended into.
type Frame = (NodeId, usize, bool);

impl PathSearch {
    /// Iterative post-order walk from `root`; an edge is recorded once its
    /// predecessor's own inputs are done.
    fn run(&mut self, nodes: &[super::Node], root: NodeId) {
        self.visited.insert(root);
        let mut stack: Vec<Frame> = vec![(root, 0, false)];

        while let Some(frame) = stack.last_mut() {
            let (id, next, descended) = *frame;
            let Some(&input) = nodes[id.0].inputs.get(next) else {
                stack.pop();
                continue;
            };
            let input = resolve(nodes, input);

            if !descended {
                frame.2 = true;
                if input != self.target && self.visited.insert(input) {
                    stack.push((input, 0, false));
                }
                continue;
            }

            *frame = (id, next + 1, false);
            let relevant =
                input == self.target || matches!(nodes[input.0].kind, NodeKind::Operation { .. });
            if relevant && self.recorded.insert((id, input)) {
                self.edges.push((id, input));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn path_is_recorded_in_post_order() {
        init();
        let g = Graph::new();
        let x = g.variable(2.0);
        let y = g.variable(3.0);
        let s = x + y;
        let r = s * x;

        let path = g.path(r.id, x.id, false).unwrap();
        assert_eq!(path.as_ref(), &[(s.id, x.id), (r.id, s.id), (r.id, x.id)]);
    }

    #[test]
    fn unreachable_target_leaves_gradients_untouched() {
        init();
        let g = Graph::new();
        let x = g.variable(2.0);
        let stray = g.variable(7.0);
        let r = x * x;

        r.backward(x, false).unwrap();
        assert_eq!(x.gradient().item(), Some(4.0));

        let err = r.backward(stray, false).unwrap_err();
        assert!(matches!(err, GradError::NoPathFound { .. }));
        assert_eq!(x.gradient().item(), Some(4.0));
        assert_eq!(stray.gradient().item(), Some(0.0));
    }

    #[test]
    fn cached_paths_are_reused_until_cleared() {
        init();
        let g = Graph::new();
        let x = g.variable(1.5);
        let r = x.sin() * x;

        r.backward(x, true).unwrap();
        assert!(g.with_node(r.id, |node| node.paths.contains_key(&x.id)));

        g.clear_path_cache();
        assert!(g.with_node(r.id, |node| node.paths.is_empty()));
    }

    #[test]
    fn local_gradient_of_non_operand_is_zero() {
        let g = Graph::new();
        let a = g.variable(2.0);
        let b = g.variable(5.0);
        let c = g.variable(1.0);
        let p = a * b;

        assert_eq!(g.local_gradient(p, a).unwrap().item(), Some(5.0));
        assert_eq!(g.local_gradient(p, c).unwrap().item(), Some(0.0));
        assert!(g.local_gradient(a, b).is_err());
    }

    #[test]
    fn failing_pass_commits_nothing() {
        let g = Graph::new();
        let x = g.variable(vec![1.0, 2.0]);
        let y = g.variable(vec![3.0, 4.0]);
        let r = (x * y).sum();

        r.backward(x, false).unwrap();
        assert_eq!(x.gradient().data, vec![3.0, 4.0]);

        g.enable_reset_gradients(false);
        g.replace_leaf_data(y, Ten64::from(vec![1.0, 2.0, 3.0])).unwrap();
        g.clear_outputs();
        assert!(r.backward(x, false).is_err());
        assert_eq!(x.gradient().data, vec![3.0, 4.0]);
    }

    #[test]
    fn many_targets_match_separate_passes() {
        fn build(g: &Graph) -> (Var<'_>, Var<'_>, Var<'_>) {
            let x = g.variable(2.0);
            let y = g.variable(5.0);
            let r = (x * y).sin() * x;
            (x, y, r)
        }

        for reset in [true, false] {
            let joint = Graph::new();
            joint.enable_reset_gradients(reset);
            let (jx, jy, jr) = build(&joint);
            jr.backward_many(&[jx, jy, jx], false).unwrap();

            let split = Graph::new();
            split.enable_reset_gradients(reset);
            let (sx, sy, sr) = build(&split);
            for target in [sx, sy, sx] {
                sr.backward(target, false).unwrap();
            }

            for (a, b) in joint.live().into_iter().zip(split.live()) {
                assert_eq!(a.gradient(), b.gradient(), "reset {reset}, node {}", a.id());
            }
        }
    }

    #[test]
    fn deep_paths_are_discovered_iteratively() {
        let g = Graph::new();
        let x = g.variable(1.0);
        let mut acc = x;
        for _ in 0..20_000 {
            acc = acc + x;
        }

        let path = g.path(acc.id, x.id, false).unwrap();
        assert_eq!(path.len(), 39_999);
        assert_eq!(path[0], (g.live()[1].id, x.id));
    }
}
