//! Lazy, memoised forward evaluation.

use super::{Graph, NodeId, NodeKind, Var};
use crate::error::{GradError, Result};
use crate::tensors::Ten64;
use log::trace;
use std::rc::Rc;

impl Graph {
    /// Computes the value of `var`.
    ///
    /// Operation outputs are memoised: the first evaluation computes every
    /// input it needs and later evaluations reuse the stored result. Changing
    /// leaf data does not invalidate memoised outputs on its own; call
    /// [`clear_outputs`](Self::clear_outputs) afterwards.
    ///
    /// # Errors
    /// - [`GradError::PlaceholderNotAssigned`] if a placeholder the value
    ///   depends on has no data.
    /// - [`GradError::Shape`] if an operation rejects its operand shapes.
    pub fn evaluate(&self, var: Var<'_>) -> Result<Ten64> {
        self.owns(var);
        Ok(self.evaluate_id(var.id)?.as_ref().clone())
    }

    /// Drops every memoised operation output so the next evaluation recomputes.
    pub fn clear_outputs(&self) {
        let mut nodes = self.nodes.borrow_mut();
        for node in nodes.iter_mut() {
            if let NodeKind::Operation { output, .. } = &mut node.kind {
                *output = None;
            }
        }
        trace!("cleared memoised outputs of graph {}", self.id);
    }

    /// Evaluates with an explicit work stack, so graph depth is bounded only
    /// by memory.
    pub(crate) fn evaluate_id(&self, id: NodeId) -> Result<Rc<Ten64>> {
        let id = self.resolve(id);
        if let Some(value) = self.known(id)? {
            return Ok(value);
        }

        // `(node, ready)`: a node is computed once popped with its inputs done.
        let mut stack = vec![(id, false)];
        while let Some((current, ready)) = stack.pop() {
            if ready {
                self.compute(current)?;
                continue;
            }
            if self.known(current)?.is_some() {
                continue;
            }
            stack.push((current, true));
            let inputs = self.with_node(current, |node| node.inputs.clone());
            for &input in inputs.iter().rev() {
                let input = self.resolve(input);
                if self.known(input)?.is_none() {
                    stack.push((input, false));
                }
            }
        }

        match self.known(id)? {
            Some(value) => Ok(value),
            None => unreachable!("{id} is evaluated by the loop above"),
        }
    }

    /// Leaf data or memoised output; `None` for an operation not run yet.
    fn known(&self, id: NodeId) -> Result<Option<Rc<Ten64>>> {
        let nodes = self.nodes.borrow();
        let node = &nodes[id.0];
        match &node.kind {
            NodeKind::Variable(data) | NodeKind::Placeholder(Some(data)) => {
                Ok(Some(Rc::clone(data)))
            }
            NodeKind::Placeholder(None) => Err(GradError::PlaceholderNotAssigned {
                name: node.describe(id),
            }),
            NodeKind::Operation { output, .. } => Ok(output.clone()),
            NodeKind::Composite { .. } => unreachable!("composite nodes are resolved"),
        }
    }

    /// Runs the forward rule of an operation whose inputs are all known.
    fn compute(&self, id: NodeId) -> Result<()> {
        if self.known(id)?.is_some() {
            return Ok(());
        }
        let inputs = self.with_node(id, |node| node.inputs.clone());
        let values = inputs
            .iter()
            .map(|&input| match self.known(self.resolve(input))? {
                Some(value) => Ok(value),
                None => unreachable!("inputs are evaluated before their consumers"),
            })
            .collect::<Result<Vec<_>>>()?;
        let refs: Vec<&Ten64> = values.iter().map(AsRef::as_ref).collect();

        let mut nodes = self.nodes.borrow_mut();
        let NodeKind::Operation { op, output } = &mut nodes[id.0].kind else {
            unreachable!("only operations reach evaluation")
        };
        let value = op.forward(&refs)?;
        trace!("evaluated {} {id} to shape {:?}", op.name(), value.shape);
        *output = Some(Rc::new(value));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outputs_are_memoised_until_cleared() {
        let g = Graph::new();
        let x = g.variable(2.0);
        let y = x * 3.0;

        assert_eq!(y.evaluate().unwrap().item(), Some(6.0));
        g.replace_leaf_data(x, Ten64::scalar(5.0)).unwrap();
        assert_eq!(y.evaluate().unwrap().item(), Some(6.0));

        g.clear_outputs();
        assert_eq!(y.evaluate().unwrap().item(), Some(15.0));
    }

    #[test]
    fn unassigned_placeholder_is_reported_by_name() {
        let g = Graph::new();
        let p = g.placeholder_named("batch");
        let y = p + 1.0;

        match y.evaluate() {
            Err(GradError::PlaceholderNotAssigned { name }) => assert!(name.contains("batch")),
            other => panic!("unexpected result: {other:?}"),
        }

        p.assign(1.5).unwrap();
        assert_eq!(y.evaluate().unwrap().item(), Some(2.5));
    }

    #[test]
    fn shape_errors_propagate() {
        let g = Graph::new();
        let a = g.variable(vec![1.0, 2.0, 3.0]);
        let b = g.variable(vec![1.0, 2.0]);

        assert!(matches!((a + b).evaluate(), Err(GradError::Shape(_))));
    }

    #[test]
    fn deep_chains_do_not_exhaust_the_stack() {
        let g = Graph::new();
        let x = g.variable(1.0);
        let mut acc = x;
        for _ in 0..20_000 {
            acc = acc + x;
        }

        assert_eq!(acc.evaluate().unwrap().item(), Some(20_001.0));
    }

    #[test]
    fn shared_inputs_reuse_the_memoised_value() {
        let g = Graph::new();
        let x = g.variable(2.0);
        let shared = x.exp();
        let y = shared * shared + shared;

        assert!(y.evaluate().is_ok());
        g.replace_leaf_data(x, Ten64::scalar(0.0)).unwrap();
        assert_eq!(shared.evaluate().unwrap().item(), Some(2.0_f64.exp()));
    }
}
