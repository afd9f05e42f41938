//! Products and reductions.

use super::{Multiply, Operation, arity, chain};
use crate::error::ShapeError;
use crate::tensors::Ten64;

/// Matrix product with NumPy promotion of rank-1 operands.
#[derive(Debug, Clone, Copy, Default)]
pub struct Matmul;

/// Dot product: [`Multiply`] when either operand is a scalar, [`Matmul`]
/// otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dot;

/// Sum of every element, as a scalar.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sum;

fn operands<'a>(op: &'static str, inputs: &[&'a Ten64]) -> Result<(&'a Ten64, &'a Ten64), ShapeError> {
    match *inputs {
        [a, b] => Ok((a, b)),
        _ => Err(arity(op, 2, inputs.len())),
    }
}

/// Views `t` as a matrix the way `matmul` promoted it.
fn as_matrix(t: &Ten64, left: bool) -> Result<Ten64, ShapeError> {
    match t.shape.as_slice() {
        &[k] if left => t.reshape([1, k]),
        &[k] => t.reshape([k, 1]),
        _ => Ok(t.clone()),
    }
}

/// `dA = G Bᵀ` and `dB = Aᵀ G`, computed on the promoted matrices and
/// reshaped back onto the operands.
fn matmul_vjp(a: &Ten64, b: &Ten64, output: &Ten64, wrt: usize, upstream: &Ten64) -> Result<Ten64, ShapeError> {
    let a2 = as_matrix(a, true)?;
    let b2 = as_matrix(b, false)?;
    let g = output.ones_like().mul(upstream)?;
    let g2 = g.reshape([a2.shape[0], b2.shape[1]])?;

    if wrt == 0 {
        g2.matmul(&b2.transpose()?)?.reshape(a.shape.clone())
    } else {
        a2.transpose()?.matmul(&g2)?.reshape(b.shape.clone())
    }
}

impl Operation for Matmul {
    fn name(&self) -> &'static str {
        "matmul"
    }

    fn forward(&self, inputs: &[&Ten64]) -> Result<Ten64, ShapeError> {
        let (a, b) = operands(self.name(), inputs)?;
        a.matmul(b)
    }

    fn vjp(&self, inputs: &[&Ten64], output: &Ten64, wrt: usize, upstream: &Ten64) -> Result<Ten64, ShapeError> {
        let (a, b) = operands(self.name(), inputs)?;
        matmul_vjp(a, b, output, wrt, upstream)
    }
}

impl Operation for Dot {
    fn name(&self) -> &'static str {
        "dot"
    }

    fn forward(&self, inputs: &[&Ten64]) -> Result<Ten64, ShapeError> {
        let (a, b) = operands(self.name(), inputs)?;
        a.dot(b)
    }

    fn vjp(&self, inputs: &[&Ten64], output: &Ten64, wrt: usize, upstream: &Ten64) -> Result<Ten64, ShapeError> {
        let (a, b) = operands(self.name(), inputs)?;
        if a.ndim() == 0 || b.ndim() == 0 {
            Multiply.vjp(inputs, output, wrt, upstream)
        } else {
            matmul_vjp(a, b, output, wrt, upstream)
        }
    }
}

impl Operation for Sum {
    fn name(&self) -> &'static str {
        "sum"
    }

    fn forward(&self, inputs: &[&Ten64]) -> Result<Ten64, ShapeError> {
        match *inputs {
            [x] => Ok(x.sum()),
            _ => Err(arity(self.name(), 1, inputs.len())),
        }
    }

    fn vjp(&self, inputs: &[&Ten64], _: &Ten64, _: usize, upstream: &Ten64) -> Result<Ten64, ShapeError> {
        let [x] = *inputs else {
            return Err(arity(self.name(), 1, inputs.len()));
        };
        chain(&x.ones_like(), upstream, &x.shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor;

    #[test]
    fn matmul_gradients_match_outer_products() {
        let a = tensor!([[1.0, 2.0], [3.0, 4.0]]);
        let b = tensor!([[5.0, 6.0], [7.0, 8.0]]);
        let out = Matmul.forward(&[&a, &b]).unwrap();
        let up = Ten64::ones(&[2, 2]);

        // dA = 1 Bᵀ: row sums of B
        let da = Matmul.vjp(&[&a, &b], &out, 0, &up).unwrap();
        assert_eq!(da, tensor!([[11.0, 15.0], [11.0, 15.0]]));

        // dB = Aᵀ 1: column sums of A
        let db = Matmul.vjp(&[&a, &b], &out, 1, &up).unwrap();
        assert_eq!(db, tensor!([[4.0, 4.0], [6.0, 6.0]]));
    }

    #[test]
    fn vector_operands_keep_their_shape() {
        let v = Ten64::from(vec![1.0, 2.0]);
        let m = tensor!([[1.0, 2.0], [3.0, 4.0]]);
        let out = Matmul.forward(&[&v, &m]).unwrap();
        let up = Ten64::ones(&[2]);

        let dv = Matmul.vjp(&[&v, &m], &out, 0, &up).unwrap();
        assert_eq!(dv.shape, vec![2]);
        assert_eq!(dv.data, vec![3.0, 7.0]);

        let inner = Dot.forward(&[&v, &v]).unwrap();
        let dv = Dot.vjp(&[&v, &v], &inner, 1, &Ten64::scalar(1.0)).unwrap();
        assert_eq!(dv.data, vec![1.0, 2.0]);
    }

    #[test]
    fn scalar_dot_is_multiplication() {
        let s = Ten64::scalar(3.0);
        let v = Ten64::from(vec![1.0, 2.0]);
        let out = Dot.forward(&[&s, &v]).unwrap();

        assert_eq!(out.data, vec![3.0, 6.0]);
        assert_eq!(Dot.vjp(&[&s, &v], &out, 0, &v.ones_like()).unwrap(), Ten64::scalar(3.0));
    }

    #[test]
    fn sum_spreads_upstream() {
        let x = tensor!([[1.0, 2.0], [3.0, 4.0]]);
        let out = Sum.forward(&[&x]).unwrap();

        assert_eq!(out.item(), Some(10.0));
        assert_eq!(Sum.vjp(&[&x], &out, 0, &Ten64::scalar(2.0)).unwrap(), Ten64::full(&[2, 2], 2.0));
    }
}
