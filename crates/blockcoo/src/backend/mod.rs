//! Compute backends.
//!
//! # faer Integration
//!
//! The `faer_interop` module provides zero-copy views of dense tensors and
//! block tiles as faer matrices; GEMM and SVD go through faer.
//!
//! # Accelerators
//!
//! The `accelerator` module defines the boundary to a hardware sparse-dense
//! multiply: the [`CustomOpRequest`] attribute contract, the
//! [`SparseAccelerator`] trait, and a software [`ReferenceAccelerator`].

mod accelerator;
mod faer_interop;

pub use accelerator::{
    CUSTOM_OP_DOMAIN, CUSTOM_OP_VERSION, CustomOpRequest, DYNAMIC_SPARSE_OP, IndexUnit,
    ReferenceAccelerator, STATIC_SPARSE_OP, SparseAccelerator, accelerator_spmm, dynamic_spmm,
};
pub use faer_interop::{AsFaerMat, tensor_from_faer_mat, tile_as_faer_mat};
