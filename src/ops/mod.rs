//! # Numeric Kernels
//!
//! Backend implementations of the tensor arithmetic in [`crate::tensors`].
//!
//! ## Submodules
//!
//! - [`cpu`]: Multi-threaded + SIMD CPU kernels (the only backend)
//!
//! ## Extending
//!
//! To add a new tensor operation:
//!
//! 1. Implement the kernel in `cpu`
//! 2. Expose it as a method on [`Ten64`](crate::tensors::Ten64) with shape checks
//! 3. Wrap it in an [`Operation`](crate::backprop::Operation) if it must be
//!    differentiable
//!
//! ## Feature Flags
//!
//! - `simd`: Enables AVX2-accelerated CPU paths

pub mod cpu;
