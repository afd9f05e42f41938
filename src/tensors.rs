//! Core tensor data structures and operations.
//!
//! # Core Tensor Utilities
//!
//! This module is the numeric layer underneath the autodiff graph: it stores
//! concrete values and does the arithmetic every graph operation delegates to.
//!
//! It supports:
//! - Construction of N-dimensional tensors with shape and row-major data layout
//! - Rank-0 tensors as scalars, so plain numbers and arrays share one type
//! - Elementwise arithmetic with NumPy-style broadcasting
//! - Reduction of broadcast gradients back onto operand shapes
//! - Matrix products for rank-1 and rank-2 operands
//! - Compile-time tensor literals via [`tensor!`](crate::tensor)
//!
//! ## Design Highlights
//! - Tensors are strongly typed: `Tensor<T>` for any element type; the engine
//!   works with [`Ten64`]
//! - Shape is stored as a `Vec<usize>` and checked at runtime
//! - Binary operations return [`ShapeError`] instead of panicking, so the
//!   engine can pass numeric failures through unchanged
//!
//! ## Example
//!
//! ```rust
//! use lazygrad::tensors::Tensor;
//! let t = Tensor::new(vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
//! assert_eq!(t.shape, vec![2, 3]);
//! ```

use crate::error::ShapeError;
use crate::ops::cpu;

/// Represents an N-dimensional tensor with a shape and flat row-major data.
///
/// - All elements must be the same type (`T`).
/// - `shape` defines the structure, e.g., `[2, 3]` for a 2×3 matrix.
/// - `data` holds the flattened content in row-major order.
/// - An empty `shape` is a scalar holding exactly one element.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<T> {
    pub shape: Vec<usize>,
    pub data: Vec<T>,
}

/// The tensor type the autodiff engine computes with.
pub type Ten64 = Tensor<f64>;

impl<T> Tensor<T> {
    /// Creates a new tensor with the given shape and flat data.
    ///
    /// # Panics
    /// Panics if the number of elements in `data` does not match the shape product.
    pub fn new(shape: impl Into<Vec<usize>>, data: Vec<T>) -> Self {
        let shape = shape.into();
        assert_eq!(
            shape.iter().product::<usize>(),
            data.len(),
            "shape {:?} is incompatible with {} data elements",
            shape,
            data.len()
        );
        Self { shape, data }
    }

    /// Creates a new tensor, reporting a shape/data mismatch instead of panicking.
    ///
    /// # Errors
    /// Returns [`ShapeError::DataLength`] if `data` does not fill `shape`.
    pub fn try_new(shape: impl Into<Vec<usize>>, data: Vec<T>) -> Result<Self, ShapeError> {
        let shape = shape.into();
        if shape.iter().product::<usize>() != data.len() {
            return Err(ShapeError::DataLength {
                len: data.len(),
                shape,
            });
        }
        Ok(Self { shape, data })
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the tensor holds no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of dimensions (`0` for a scalar).
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }
}

impl Ten64 {
    /// A rank-0 tensor holding `value`.
    pub fn scalar(value: f64) -> Self {
        Self {
            shape: Vec::new(),
            data: vec![value],
        }
    }

    /// A tensor of `shape` with every element set to `value`.
    pub fn full(shape: &[usize], value: f64) -> Self {
        Self::new(shape.to_vec(), vec![value; shape.iter().product()])
    }

    /// A tensor of zeros.
    pub fn zeros(shape: &[usize]) -> Self {
        Self::full(shape, 0.0)
    }

    /// A tensor of ones.
    pub fn ones(shape: &[usize]) -> Self {
        Self::full(shape, 1.0)
    }

    /// Zeros shaped like `self`.
    pub fn zeros_like(&self) -> Self {
        Self::zeros(&self.shape)
    }

    /// Ones shaped like `self`.
    pub fn ones_like(&self) -> Self {
        Self::ones(&self.shape)
    }

    /// The single element of a one-element tensor.
    pub fn item(&self) -> Option<f64> {
        match self.data.as_slice() {
            [v] => Some(*v),
            _ => None,
        }
    }

    /// Same data under a new shape.
    ///
    /// # Errors
    /// Returns [`ShapeError::Reshape`] if the element counts differ.
    pub fn reshape(&self, shape: impl Into<Vec<usize>>) -> Result<Self, ShapeError> {
        let shape = shape.into();
        if shape.iter().product::<usize>() != self.len() {
            return Err(ShapeError::Reshape {
                from: self.shape.clone(),
                to: shape,
            });
        }
        Ok(Self {
            shape,
            data: self.data.clone(),
        })
    }

    /// Applies `f` elementwise.
    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(f64) -> f64 + Sync + Send,
    {
        cpu::map(self, f)
    }

    /// Combines with `other` elementwise under broadcasting.
    ///
    /// # Errors
    /// Returns [`ShapeError::Broadcast`] if the shapes are incompatible.
    pub fn zip_with<F>(&self, other: &Self, f: F) -> Result<Self, ShapeError>
    where
        F: Fn(f64, f64) -> f64 + Sync + Send,
    {
        cpu::zip_broadcast(self, other, f)
    }

    /// Elementwise `self + other`.
    ///
    /// # Errors
    /// Fails if the shapes do not broadcast.
    pub fn add(&self, other: &Self) -> Result<Self, ShapeError> {
        self.zip_with(other, |a, b| a + b)
    }

    /// Elementwise `self - other`.
    ///
    /// # Errors
    /// Fails if the shapes do not broadcast.
    pub fn sub(&self, other: &Self) -> Result<Self, ShapeError> {
        self.zip_with(other, |a, b| a - b)
    }

    /// Elementwise `self * other`.
    ///
    /// # Errors
    /// Fails if the shapes do not broadcast.
    pub fn mul(&self, other: &Self) -> Result<Self, ShapeError> {
        self.zip_with(other, |a, b| a * b)
    }

    /// Elementwise `self / other`.
    ///
    /// # Errors
    /// Fails if the shapes do not broadcast.
    pub fn div(&self, other: &Self) -> Result<Self, ShapeError> {
        self.zip_with(other, |a, b| a / b)
    }

    /// Multiplies every element by `k`.
    pub fn scale(&self, k: f64) -> Self {
        self.map(|x| x * k)
    }

    /// Raises every element to `p`.
    pub fn powf(&self, p: f64) -> Self {
        self.map(|x| x.powf(p))
    }

    /// Elementwise `e^x`.
    pub fn exp(&self) -> Self {
        self.map(f64::exp)
    }

    /// Elementwise sine.
    pub fn sin(&self) -> Self {
        self.map(f64::sin)
    }

    /// Elementwise cosine.
    pub fn cos(&self) -> Self {
        self.map(f64::cos)
    }

    /// Elementwise hyperbolic sine.
    pub fn sinh(&self) -> Self {
        self.map(f64::sinh)
    }

    /// Elementwise hyperbolic cosine.
    pub fn cosh(&self) -> Self {
        self.map(f64::cosh)
    }

    /// Sum of all elements as a scalar tensor.
    pub fn sum(&self) -> Self {
        Self::scalar(self.data.iter().sum())
    }

    /// Reduces a broadcast result back down to `shape`.
    ///
    /// # Errors
    /// Returns [`ShapeError::Reduce`] if `shape` does not broadcast to `self.shape`.
    pub fn sum_to(&self, shape: &[usize]) -> Result<Self, ShapeError> {
        cpu::sum_to(self, shape)
    }

    /// Transposes a matrix. Rank-0 and rank-1 tensors are returned as-is.
    ///
    /// # Errors
    /// Returns [`ShapeError::Rank`] for tensors of rank 3 or more.
    pub fn transpose(&self) -> Result<Self, ShapeError> {
        match self.shape.as_slice() {
            [] | [_] => Ok(self.clone()),
            &[rows, cols] => Ok(Self::new(
                vec![cols, rows],
                cpu::transpose(&self.data, rows, cols),
            )),
            _ => Err(ShapeError::Rank {
                op: "transpose",
                expected: "at most 2",
                actual: self.ndim(),
            }),
        }
    }

    /// Matrix product following NumPy `matmul` promotion for rank-1 operands.
    ///
    /// A rank-1 left operand is treated as a row vector and a rank-1 right
    /// operand as a column vector; the promoted dimension is removed from the
    /// result, so two vectors give their inner product as a scalar.
    ///
    /// # Errors
    /// - [`ShapeError::Rank`] if either operand is not rank 1 or 2.
    /// - [`ShapeError::InnerDimension`] if the contracted dimensions differ.
    pub fn matmul(&self, other: &Self) -> Result<Self, ShapeError> {
        let (m, k, row) = match self.shape.as_slice() {
            &[k] => (1, k, true),
            &[m, k] => (m, k, false),
            _ => {
                return Err(ShapeError::Rank {
                    op: "matmul",
                    expected: "1 or 2",
                    actual: self.ndim(),
                });
            }
        };
        let (k2, n, column) = match other.shape.as_slice() {
            &[k] => (k, 1, true),
            &[k, n] => (k, n, false),
            _ => {
                return Err(ShapeError::Rank {
                    op: "matmul",
                    expected: "1 or 2",
                    actual: other.ndim(),
                });
            }
        };
        if k != k2 {
            return Err(ShapeError::InnerDimension {
                op: "matmul",
                lhs: self.shape.clone(),
                rhs: other.shape.clone(),
            });
        }

        let data = cpu::matmul(&self.data, &other.data, m, k, n);
        let shape = match (row, column) {
            (true, true) => vec![],
            (true, false) => vec![n],
            (false, true) => vec![m],
            (false, false) => vec![m, n],
        };
        Ok(Self::new(shape, data))
    }

    /// Dot product: elementwise multiplication when either side is a scalar,
    /// otherwise [`matmul`](Self::matmul).
    ///
    /// # Errors
    /// Same as [`matmul`](Self::matmul).
    pub fn dot(&self, other: &Self) -> Result<Self, ShapeError> {
        if self.ndim() == 0 || other.ndim() == 0 {
            self.mul(other)
        } else {
            self.matmul(other)
        }
    }
}

impl From<f64> for Ten64 {
    fn from(value: f64) -> Self {
        Self::scalar(value)
    }
}

impl From<Vec<f64>> for Ten64 {
    fn from(data: Vec<f64>) -> Self {
        Self::new(vec![data.len()], data)
    }
}

impl From<&[f64]> for Ten64 {
    fn from(data: &[f64]) -> Self {
        Self::from(data.to_vec())
    }
}

impl<const N: usize> From<[f64; N]> for Ten64 {
    fn from(data: [f64; N]) -> Self {
        Self::from(data.to_vec())
    }
}

/// Defines a tensor from nested literal arrays.
///
/// Supports arbitrary dimensionality as long as sublists are uniform in shape.
///
/// # Example
/// ```
/// use lazygrad::tensor;
/// let t = tensor!([[1.0, 2.0], [3.0, 4.0]]);
/// assert_eq!(t.shape, vec![2, 2]);
/// ```
#[macro_export]
macro_rules! tensor {
    ($lit:literal) => {
        $crate::tensors::Tensor::new(::std::vec::Vec::<usize>::new(), vec![$lit])
    };

    ([ $( $inner:tt ),+ $(,)? ]) => {{
        let children = vec![ $( $crate::tensor!($inner) ),+ ];
        let first_shape = &children[0].shape;
        assert!(children.iter().all(|c| c.shape == *first_shape),
            "ragged tensor literal (rows have mismatched shapes)");
        let mut shape = vec![children.len()];
        shape.extend_from_slice(first_shape);
        let mut data = Vec::with_capacity(children.len() * children[0].data.len());
        for c in children { data.extend(c.data); }
        $crate::tensors::Tensor::new(shape, data)
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcasting_add_stretches_rows() {
        let m = Tensor::new(vec![2, 2], vec![1.0, 2.0, 3.0, 4.0]);
        let row = Ten64::from(vec![10.0, 20.0]);
        assert_eq!(m.add(&row).unwrap().data, vec![11.0, 22.0, 13.0, 24.0]);

        let s = Ten64::scalar(2.0);
        assert_eq!(m.mul(&s).unwrap().data, vec![2.0, 4.0, 6.0, 8.0]);
    }

    #[test]
    fn incompatible_shapes_are_reported() {
        let a = Ten64::from(vec![1.0, 2.0, 3.0]);
        let b = Ten64::from(vec![1.0, 2.0]);
        assert!(matches!(a.add(&b), Err(ShapeError::Broadcast { .. })));
    }

    #[test]
    fn matmul_promotes_vectors() {
        let v = Ten64::from(vec![1.0, 2.0]);
        let m = tensor!([[1.0, 2.0], [3.0, 4.0]]);

        assert_eq!(v.matmul(&v).unwrap(), Ten64::scalar(5.0));
        assert_eq!(m.matmul(&v).unwrap().data, vec![5.0, 11.0]);
        assert_eq!(v.matmul(&m).unwrap().data, vec![7.0, 10.0]);
        assert!(matches!(
            m.matmul(&Ten64::from(vec![1.0, 2.0, 3.0])),
            Err(ShapeError::InnerDimension { .. })
        ));
    }

    #[test]
    fn dot_with_scalar_is_elementwise() {
        let v = Ten64::from(vec![1.0, 2.0]);
        assert_eq!(v.dot(&Ten64::scalar(3.0)).unwrap().data, vec![3.0, 6.0]);
    }

    #[test]
    fn try_new_reports_length_mismatch() {
        assert!(Tensor::try_new(vec![2, 2], vec![1.0, 2.0, 3.0]).is_err());
        assert!(Tensor::try_new(vec![3], vec![1.0, 2.0, 3.0]).is_ok());
    }

    #[test]
    fn scalar_literal_has_empty_shape() {
        let t = tensor!(4.0);
        assert!(t.shape.is_empty());
        assert_eq!(t.item(), Some(4.0));
    }
}
