//! `std::ops` sugar over the builder functions in [`crate::backprop`].
//!
//! Literals on either side of an operator become fresh variables of the
//! handle's graph, so `2.0 * x - 1.0` builds four nodes.

use super::Var;
use crate::backprop;
use crate::tensors::Ten64;
use std::ops::{Add, BitXor, Div, Mul, Neg, Sub};

macro_rules! impl_binary {
    ($($trait:ident :: $method:ident => $build:path;)*) => {
        $(
            impl<'g> $trait<Var<'g>> for Var<'g> {
                type Output = Var<'g>;

                fn $method(self, rhs: Var<'g>) -> Var<'g> {
                    $build(self, rhs)
                }
            }

            impl<'g> $trait<f64> for Var<'g> {
                type Output = Var<'g>;

                fn $method(self, rhs: f64) -> Var<'g> {
                    $build(self, rhs)
                }
            }

            impl<'g> $trait<Ten64> for Var<'g> {
                type Output = Var<'g>;

                fn $method(self, rhs: Ten64) -> Var<'g> {
                    $build(self, rhs)
                }
            }

            impl<'g> $trait<Var<'g>> for f64 {
                type Output = Var<'g>;

                fn $method(self, rhs: Var<'g>) -> Var<'g> {
                    $build(rhs.graph().variable(self), rhs)
                }
            }

            impl<'g> $trait<Var<'g>> for Ten64 {
                type Output = Var<'g>;

                fn $method(self, rhs: Var<'g>) -> Var<'g> {
                    $build(rhs.graph().variable(self), rhs)
                }
            }
        )*
    };
}

impl_binary! {
    Add::add => backprop::add;
    Sub::sub => backprop::subtract;
    Mul::mul => backprop::multiply;
    Div::div => backprop::divide;
}

impl<'g> Neg for Var<'g> {
    type Output = Var<'g>;

    fn neg(self) -> Var<'g> {
        backprop::neg(self)
    }
}

/// `x ^ p` raises to a constant power.
impl<'g> BitXor<f64> for Var<'g> {
    type Output = Var<'g>;

    fn bitxor(self, exponent: f64) -> Var<'g> {
        backprop::power(self, exponent)
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::Graph;

    #[test]
    fn literals_keep_operand_order() {
        let g = Graph::new();
        let x = g.variable(4.0);

        assert_eq!((10.0 - x).evaluate().unwrap().item(), Some(6.0));
        assert_eq!((x - 10.0).evaluate().unwrap().item(), Some(-6.0));
        assert_eq!((2.0 / x).evaluate().unwrap().item(), Some(0.5));
        assert_eq!((-x).evaluate().unwrap().item(), Some(-4.0));
        assert_eq!((x ^ 0.5).evaluate().unwrap().item(), Some(2.0));
    }

    #[test]
    fn reflected_subtraction_differentiates_to_minus_one() {
        let g = Graph::new();
        let x = g.variable(4.0);
        let y = 10.0 - x;

        assert_eq!(y.grad(x).unwrap().item(), Some(-1.0));
    }
}
