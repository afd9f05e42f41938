//! Unary elementwise functions.

use super::{Operation, arity, chain};
use crate::error::ShapeError;
use crate::tensors::Ten64;

fn operand<'a>(op: &'static str, inputs: &[&'a Ten64]) -> Result<&'a Ten64, ShapeError> {
    match *inputs {
        [x] => Ok(x),
        _ => Err(arity(op, 1, inputs.len())),
    }
}

/// Declares a unary operation from its forward map and a local derivative
/// computed from the input `x` and output `y`.
macro_rules! unary_op {
    ($(#[$meta:meta])* $ty:ident, $name:literal, forward: $f:expr, local: |$x:ident, $y:ident| $local:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $ty;

        impl Operation for $ty {
            fn name(&self) -> &'static str {
                $name
            }

            fn forward(&self, inputs: &[&Ten64]) -> Result<Ten64, ShapeError> {
                Ok(operand($name, inputs)?.map($f))
            }

            #[allow(unused_variables)]
            fn vjp(
                &self,
                inputs: &[&Ten64],
                output: &Ten64,
                _: usize,
                upstream: &Ten64,
            ) -> Result<Ten64, ShapeError> {
                let $x = operand($name, inputs)?;
                let $y = output;
                let local: Ten64 = $local;
                chain(&local, upstream, &$x.shape)
            }
        }
    };
}

unary_op!(
    /// `e^x`; its derivative is its own output.
    Exp, "exp", forward: f64::exp, local: |x, y| y.clone()
);

unary_op!(
    /// `sin(x)`.
    Sin, "sin", forward: f64::sin, local: |x, y| x.cos()
);

unary_op!(
    /// `cos(x)`.
    Cos, "cos", forward: f64::cos, local: |x, y| x.sin().scale(-1.0)
);

unary_op!(
    /// `sinh(x)`.
    Sinh, "sinh", forward: f64::sinh, local: |x, y| x.cosh()
);

unary_op!(
    /// `cosh(x)`.
    Cosh, "cosh", forward: f64::cosh, local: |x, y| x.sinh()
);

unary_op!(
    /// `max(0, x)`; gradient passes only where the output is positive.
    Relu, "relu", forward: |v: f64| v.max(0.0), local: |x, y| y.map(|v| if v > 0.0 { 1.0 } else { 0.0 })
);

unary_op!(
    /// Logistic function computed in one step; derivative `s * (1 - s)`.
    SigmoidAtomic, "sigmoid_atomic", forward: |v: f64| 1.0 / (1.0 + (-v).exp()), local: |x, y| y.map(|s| s * (1.0 - s))
);

#[cfg(test)]
mod tests {
    use super::*;
    use ::approx::assert_relative_eq;

    fn vjp_at(op: &dyn Operation, x: f64) -> f64 {
        let x = Ten64::scalar(x);
        let y = op.forward(&[&x]).unwrap();
        op.vjp(&[&x], &y, 0, &Ten64::scalar(1.0))
            .unwrap()
            .item()
            .unwrap()
    }

    #[test]
    fn trigonometric_derivatives() {
        assert_relative_eq!(vjp_at(&Sin, 0.3), 0.3f64.cos());
        assert_relative_eq!(vjp_at(&Cos, 0.3), -(0.3f64.sin()));
        assert_relative_eq!(vjp_at(&Sinh, 0.3), 0.3f64.cosh());
        assert_relative_eq!(vjp_at(&Cosh, 0.3), 0.3f64.sinh());
        assert_relative_eq!(vjp_at(&Exp, 1.0), std::f64::consts::E);
    }

    #[test]
    fn relu_masks_by_output() {
        let x = Ten64::from(vec![-1.0, 0.0, 2.0]);
        let y = Relu.forward(&[&x]).unwrap();
        let up = Ten64::from(vec![5.0, 5.0, 5.0]);

        assert_eq!(y.data, vec![0.0, 0.0, 2.0]);
        assert_eq!(Relu.vjp(&[&x], &y, 0, &up).unwrap().data, vec![0.0, 0.0, 5.0]);
    }

    #[test]
    fn atomic_sigmoid_matches_closed_form() {
        assert_relative_eq!(vjp_at(&SigmoidAtomic, 0.2), 0.247_516_572_711_86, epsilon = 1e-12);
    }
}
