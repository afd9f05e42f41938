use approx::{assert_abs_diff_eq, assert_relative_eq};
use lazygrad::approx::ApproxEquality;
use lazygrad::gradcheck::{DEFAULT_EPSILON, check_gradient, numerical_gradient};
use lazygrad::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const TOLERANCE: f64 = 1e-5;

/// Values in `[-2, 2]` kept at least `0.1` away from zero so kinks and poles
/// stay out of the finite-difference window.
fn sample(rng: &mut StdRng, len: usize) -> Vec<f64> {
    (0..len)
        .map(|_| {
            let v: f64 = rng.random_range(-2.0..2.0);
            if v.abs() < 0.1 { v.signum() * 0.1 + v } else { v }
        })
        .collect()
}

#[test]
fn test_elementwise_chain_matches_finite_differences() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..5 {
        let g = Graph::new();
        let x = g.variable(sample(&mut rng, 4));
        let y = (x.sin() * x.cosh() + x.exp() / (x * x + 1.0)).sum();

        let report = check_gradient(y, x, DEFAULT_EPSILON).unwrap();
        assert!(report.passed(TOLERANCE), "max error {}", report.max_abs_error);
        assert_ne!(report.equality(), ApproxEquality::Scarce);
    }
}

#[test]
fn test_composite_and_atomic_sigmoid_have_equal_gradients() {
    let mut rng = StdRng::seed_from_u64(11);
    let g = Graph::new();
    let x = g.variable(sample(&mut rng, 6));

    let composite = x.sigmoid().sum().grad(x).unwrap();
    let atomic = x.sigmoid_atomic().sum().grad(x).unwrap();

    for (c, a) in composite.data.iter().zip(&atomic.data) {
        assert_relative_eq!(c, a, epsilon = 1e-12);
    }
    assert!(check_gradient(x.sigmoid(), x, DEFAULT_EPSILON).unwrap().passed(TOLERANCE));
}

#[test]
fn test_linear_layer_gradients() {
    let mut rng = StdRng::seed_from_u64(3);
    let g = Graph::new();
    let w = g.variable(Tensor::new(vec![3, 2], sample(&mut rng, 6)));
    let b = g.variable(sample(&mut rng, 2));
    let x = g.variable(sample(&mut rng, 3));

    let hidden = x.matmul(w) + b;
    let loss = (hidden.relu() ^ 2.0).sum();

    for param in [w, b, x] {
        let report = check_gradient(loss, param, DEFAULT_EPSILON).unwrap();
        assert!(report.passed(TOLERANCE), "max error {}", report.max_abs_error);
        assert_eq!(report.analytic.shape, param.shape().unwrap());
    }
}

#[test]
fn test_division_and_powers() {
    let g = Graph::new();
    let a = g.variable(vec![1.5, 2.5, 0.75]);
    let b = g.variable(vec![0.5, -1.25, 2.0]);
    let y = (a / b - (a ^ 3.0) * b.cos() + a.dot(b)).sum();

    for param in [a, b] {
        let report = check_gradient(y, param, DEFAULT_EPSILON).unwrap();
        assert!(report.passed(TOLERANCE), "max error {}", report.max_abs_error);
    }
}

#[test]
fn test_placeholder_gradients_follow_assignment() {
    let g = Graph::new();
    let p = g.placeholder();
    let y = (p.sinh() * 2.0).sum();

    p.assign(vec![0.1, 0.2]).unwrap();
    let numeric = numerical_gradient(y, p, 1e-5).unwrap();
    let analytic = y.grad(p).unwrap();

    for (n, a) in numeric.data.iter().zip(&analytic.data) {
        assert_abs_diff_eq!(n, a, epsilon = 1e-8);
    }
}
