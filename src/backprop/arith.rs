//! Broadcasting arithmetic.

use super::{Operation, arity, chain};
use crate::error::ShapeError;
use crate::tensors::Ten64;

/// Elementwise sum.
#[derive(Debug, Clone, Copy, Default)]
pub struct Add;

/// Elementwise difference.
#[derive(Debug, Clone, Copy, Default)]
pub struct Subtract;

/// Elementwise product.
#[derive(Debug, Clone, Copy, Default)]
pub struct Multiply;

/// Elementwise quotient.
#[derive(Debug, Clone, Copy, Default)]
pub struct Divide;

/// Raises every element to a constant power.
#[derive(Debug, Clone, Copy)]
pub struct Power {
    /// The constant exponent `p` in `x^p`.
    pub exponent: f64,
}

fn operands<'a>(op: &'static str, inputs: &[&'a Ten64]) -> Result<(&'a Ten64, &'a Ten64), ShapeError> {
    match *inputs {
        [a, b] => Ok((a, b)),
        _ => Err(arity(op, 2, inputs.len())),
    }
}

impl Operation for Add {
    fn name(&self) -> &'static str {
        "add"
    }

    fn forward(&self, inputs: &[&Ten64]) -> Result<Ten64, ShapeError> {
        let (a, b) = operands(self.name(), inputs)?;
        a.add(b)
    }

    fn vjp(&self, inputs: &[&Ten64], _: &Ten64, wrt: usize, upstream: &Ten64) -> Result<Ten64, ShapeError> {
        let (a, b) = operands(self.name(), inputs)?;
        let operand = if wrt == 0 { a } else { b };
        chain(&operand.ones_like(), upstream, &operand.shape)
    }
}

impl Operation for Subtract {
    fn name(&self) -> &'static str {
        "subtract"
    }

    fn forward(&self, inputs: &[&Ten64]) -> Result<Ten64, ShapeError> {
        let (a, b) = operands(self.name(), inputs)?;
        a.sub(b)
    }

    fn vjp(&self, inputs: &[&Ten64], _: &Ten64, wrt: usize, upstream: &Ten64) -> Result<Ten64, ShapeError> {
        let (a, b) = operands(self.name(), inputs)?;
        if wrt == 0 {
            chain(&a.ones_like(), upstream, &a.shape)
        } else {
            chain(&Ten64::full(&b.shape, -1.0), upstream, &b.shape)
        }
    }
}

impl Operation for Multiply {
    fn name(&self) -> &'static str {
        "multiply"
    }

    fn forward(&self, inputs: &[&Ten64]) -> Result<Ten64, ShapeError> {
        let (a, b) = operands(self.name(), inputs)?;
        a.mul(b)
    }

    fn vjp(&self, inputs: &[&Ten64], _: &Ten64, wrt: usize, upstream: &Ten64) -> Result<Ten64, ShapeError> {
        let (a, b) = operands(self.name(), inputs)?;
        if wrt == 0 {
            chain(b, upstream, &a.shape)
        } else {
            chain(a, upstream, &b.shape)
        }
    }
}

impl Operation for Divide {
    fn name(&self) -> &'static str {
        "divide"
    }

    fn forward(&self, inputs: &[&Ten64]) -> Result<Ten64, ShapeError> {
        let (a, b) = operands(self.name(), inputs)?;
        a.div(b)
    }

    fn vjp(&self, inputs: &[&Ten64], _: &Ten64, wrt: usize, upstream: &Ten64) -> Result<Ten64, ShapeError> {
        let (a, b) = operands(self.name(), inputs)?;
        if wrt == 0 {
            chain(&b.map(f64::recip), upstream, &a.shape)
        } else {
            // d(a/b)/db = -a / b^2
            let local = a.zip_with(b, |a, b| -a / (b * b))?;
            chain(&local, upstream, &b.shape)
        }
    }
}

impl Operation for Power {
    fn name(&self) -> &'static str {
        "power"
    }

    fn forward(&self, inputs: &[&Ten64]) -> Result<Ten64, ShapeError> {
        match *inputs {
            [x] => Ok(x.powf(self.exponent)),
            _ => Err(arity(self.name(), 1, inputs.len())),
        }
    }

    fn vjp(&self, inputs: &[&Ten64], _: &Ten64, _: usize, upstream: &Ten64) -> Result<Ten64, ShapeError> {
        let [x] = *inputs else {
            return Err(arity(self.name(), 1, inputs.len()));
        };
        let p = self.exponent;
        let local = x.map(|v| p * v.powf(p - 1.0));
        chain(&local, upstream, &x.shape)
    }
}
