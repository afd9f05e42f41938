//! Parallel CPU tensor kernels
//!
//! # CPU Backend
//!
//! This module provides the CPU implementations behind every numeric method on
//! [`Ten64`]. The autodiff engine never calls it directly; it only sees the
//! tensor API.
//!
//! ## Features
//!
//! - Parallel execution using [`rayon`](https://docs.rs/rayon)
//! - Optional SIMD acceleration using AVX2 (enabled via `simd` feature flag)
//! - Pure Rust fallback path when SIMD is disabled or unavailable
//!
//! ## Implemented Kernels
//!
//! - `map`: elementwise unary function
//! - `zip_broadcast`: elementwise binary function with NumPy broadcasting
//! - `sum_to`: reduction of a broadcast result back onto an operand shape
//! - `matmul`: row-parallel matrix multiplication
//! - `transpose`: 2D transpose
//!
//! ## Safety
//!
//! - SIMD paths use `unsafe` blocks and assume 64-bit AVX2-capable CPUs

use crate::error::ShapeError;
use crate::tensors::{Ten64, Tensor};
use rayon::prelude::*;

#[cfg(all(feature = "simd", target_arch = "x86_64", target_feature = "avx2"))]
use core::arch::x86_64::{
    _mm256_fmadd_pd, _mm256_loadu_pd, _mm256_set_pd, _mm256_setzero_pd, _mm256_storeu_pd,
};

/// Row-major strides for `shape`.
pub fn strides(shape: &[usize]) -> Vec<usize> {
    let mut out = vec![1; shape.len()];
    for d in (0..shape.len().saturating_sub(1)).rev() {
        out[d] = out[d + 1] * shape[d + 1];
    }
    out
}

/// Computes the shape two operands broadcast to.
///
/// Trailing dimensions are aligned; a dimension of `1` stretches to match the
/// other operand.
///
/// # Errors
/// Returns [`ShapeError::Broadcast`] when two aligned dimensions differ and
/// neither is `1`.
pub fn broadcast_shape(lhs: &[usize], rhs: &[usize]) -> Result<Vec<usize>, ShapeError> {
    let ndim = lhs.len().max(rhs.len());
    let lhs_offset = ndim - lhs.len();
    let rhs_offset = ndim - rhs.len();

    (0..ndim)
        .map(|d| {
            let a = if d >= lhs_offset { lhs[d - lhs_offset] } else { 1 };
            let b = if d >= rhs_offset { rhs[d - rhs_offset] } else { 1 };
            match (a, b) {
                (a, b) if a == b => Ok(a),
                (1, b) => Ok(b),
                (a, 1) => Ok(a),
                _ => Err(ShapeError::Broadcast {
                    lhs: lhs.to_vec(),
                    rhs: rhs.to_vec(),
                }),
            }
        })
        .collect()
}

/// Strides of `shape` when viewed through the broadcast shape `target`.
///
/// Stretched and missing leading dimensions get a stride of `0`.
fn broadcast_strides(shape: &[usize], target: &[usize]) -> Vec<usize> {
    let own = strides(shape);
    let offset = target.len() - shape.len();
    (0..target.len())
        .map(|d| {
            if d < offset || shape[d - offset] == 1 {
                0
            } else {
                own[d - offset]
            }
        })
        .collect()
}

/// Maps a flat index of the broadcast shape onto an operand's flat index.
#[inline]
fn source_offset(flat: usize, target: &[usize], target_strides: &[usize], src_strides: &[usize]) -> usize {
    let mut offset = 0;
    for d in 0..target.len() {
        let coord = (flat / target_strides[d]) % target[d];
        offset += coord * src_strides[d];
    }
    offset
}

/// Applies `f` to every element in parallel.
pub fn map<F>(input: &Ten64, f: F) -> Ten64
where
    F: Fn(f64) -> f64 + Sync + Send,
{
    let data = input.data.par_iter().map(|&x| f(x)).collect();
    Tensor::new(input.shape.clone(), data)
}

/// Combines two tensors elementwise with NumPy-style broadcasting.
///
/// # Errors
/// Returns [`ShapeError::Broadcast`] if the shapes are incompatible.
pub fn zip_broadcast<F>(lhs: &Ten64, rhs: &Ten64, f: F) -> Result<Ten64, ShapeError>
where
    F: Fn(f64, f64) -> f64 + Sync + Send,
{
    if lhs.shape == rhs.shape {
        let data = lhs
            .data
            .par_iter()
            .zip(rhs.data.par_iter())
            .map(|(&a, &b)| f(a, b))
            .collect();
        return Ok(Tensor::new(lhs.shape.clone(), data));
    }

    let shape = broadcast_shape(&lhs.shape, &rhs.shape)?;
    let out_strides = strides(&shape);
    let lhs_strides = broadcast_strides(&lhs.shape, &shape);
    let rhs_strides = broadcast_strides(&rhs.shape, &shape);
    let len = shape.iter().product::<usize>();

    let data = (0..len)
        .into_par_iter()
        .map(|i| {
            let a = lhs.data[source_offset(i, &shape, &out_strides, &lhs_strides)];
            let b = rhs.data[source_offset(i, &shape, &out_strides, &rhs_strides)];
            f(a, b)
        })
        .collect();

    Ok(Tensor::new(shape, data))
}

/// Sums a broadcast tensor back down to `shape`.
///
/// This is the adjoint of broadcasting: every element of `input` is added into
/// the element of the result it was broadcast from.
///
/// # Errors
/// Returns [`ShapeError::Reduce`] if `shape` does not broadcast to
/// `input.shape`.
pub fn sum_to(input: &Ten64, shape: &[usize]) -> Result<Ten64, ShapeError> {
    if input.shape == shape {
        return Ok(input.clone());
    }

    let reducible = shape.len() <= input.shape.len()
        && broadcast_shape(shape, &input.shape).is_ok_and(|s| s == input.shape);
    if !reducible {
        return Err(ShapeError::Reduce {
            from: input.shape.clone(),
            to: shape.to_vec(),
        });
    }

    let src_strides = strides(&input.shape);
    let dst_strides = broadcast_strides(shape, &input.shape);
    let mut out = vec![0.0; shape.iter().product()];
    for (i, &v) in input.data.iter().enumerate() {
        out[source_offset(i, &input.shape, &src_strides, &dst_strides)] += v;
    }

    Ok(Tensor::new(shape.to_vec(), out))
}

/// Multiplies a row-major `m×k` matrix by a row-major `k×n` matrix.
///
/// # Optimizations
/// - Uses `rayon` for parallel row computation
/// - Uses AVX2 SIMD for fused multiply-adds (if enabled via `--features=simd`)
pub fn matmul(a_data: &[f64], b_data: &[f64], m: usize, k: usize, n: usize) -> Vec<f64> {
    let mut out_data = vec![0.0; m * n];
    if m == 0 || n == 0 {
        return out_data;
    }

    out_data.par_chunks_mut(n).enumerate().for_each(|(i, row)| {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = {
                #[cfg(all(feature = "simd", target_arch = "x86_64", target_feature = "avx2"))]
                {
                    let mut idx = 0;
                    let mut temp = [0.0; 4];
                    unsafe {
                        let mut acc = _mm256_setzero_pd();
                        while idx + 4 <= k {
                            let a_chunk = _mm256_loadu_pd(&a_data[i * k + idx]);
                            let b_chunk = _mm256_set_pd(
                                b_data[(idx + 3) * n + j],
                                b_data[(idx + 2) * n + j],
                                b_data[(idx + 1) * n + j],
                                b_data[idx * n + j],
                            );
                            acc = _mm256_fmadd_pd(a_chunk, b_chunk, acc);
                            idx += 4;
                        }
                        _mm256_storeu_pd(temp.as_mut_ptr(), acc);
                    }

                    let mut sum: f64 = temp.iter().sum();
                    for l in idx..k {
                        sum += a_data[i * k + l] * b_data[l * n + j];
                    }
                    sum
                }

                #[cfg(not(all(feature = "simd", target_arch = "x86_64", target_feature = "avx2")))]
                {
                    let mut sum = 0.0;
                    for l in 0..k {
                        sum += a_data[i * k + l] * b_data[l * n + j];
                    }
                    sum
                }
            };
        }
    });

    out_data
}

/// Transposes a row-major `rows×cols` matrix.
pub fn transpose(data: &[f64], rows: usize, cols: usize) -> Vec<f64> {
    (0..rows * cols)
        .into_par_iter()
        .map(|idx| {
            let (c, r) = (idx / rows, idx % rows);
            data[r * cols + c]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matmul_produces_correct_values() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]; // 2x3
        let b = [7.0, 8.0, 9.0, 10.0, 11.0, 12.0]; // 3x2

        let out = matmul(&a, &b, 2, 3, 2);

        let expected = [
            1.0 * 7.0 + 2.0 * 9.0 + 3.0 * 11.0,
            1.0 * 8.0 + 2.0 * 10.0 + 3.0 * 12.0,
            4.0 * 7.0 + 5.0 * 9.0 + 6.0 * 11.0,
            4.0 * 8.0 + 5.0 * 10.0 + 6.0 * 12.0,
        ];
        assert_eq!(out, expected);
    }

    #[test]
    fn matmul_handles_empty_rows() {
        assert!(matmul(&[], &[1.0, 2.0], 0, 1, 2).is_empty());
        assert_eq!(matmul(&[], &[], 2, 0, 2), vec![0.0; 4]);
    }

    #[test]
    fn broadcast_shape_aligns_trailing_dimensions() {
        assert_eq!(broadcast_shape(&[2, 3], &[3]).unwrap(), vec![2, 3]);
        assert_eq!(broadcast_shape(&[4, 1], &[1, 5]).unwrap(), vec![4, 5]);
        assert_eq!(broadcast_shape(&[], &[2, 2]).unwrap(), vec![2, 2]);
        assert!(matches!(
            broadcast_shape(&[2, 3], &[2]),
            Err(ShapeError::Broadcast { .. })
        ));
    }

    #[test]
    fn sum_to_reverses_broadcasting() {
        let grad = Tensor::new(vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

        let rows = sum_to(&grad, &[3]).unwrap();
        assert_eq!(rows.data, vec![5.0, 7.0, 9.0]);

        let cols = sum_to(&grad, &[2, 1]).unwrap();
        assert_eq!(cols.data, vec![6.0, 15.0]);

        let scalar = sum_to(&grad, &[]).unwrap();
        assert_eq!(scalar.data, vec![21.0]);

        assert!(sum_to(&grad, &[2]).is_err());
    }

    #[test]
    fn transpose_swaps_axes() {
        let t = transpose(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2, 3);
        assert_eq!(t, vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }
}
