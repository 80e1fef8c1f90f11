/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use thiserror::Error;

use crate::range::Range;

/// Result type alias using [`TensorError`].
pub type Result<T, E = TensorError> = std::result::Result<T, E>;

/// Errors produced by access patterns, tensors and reductions.
///
/// Running off the end of an iterator is not an error; iterators
/// signal exhaustion with `None`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TensorError {
    /// A reduction or transpose referenced a dimension `>= rank`.
    #[error("axis {axis} out of bounds for tensor of rank {rank}")]
    AxisOutOfBounds { axis: usize, rank: usize },

    /// The number of ranges, coordinates or permutation entries does
    /// not match the dimensionality.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// The operation requires an owning tensor.
    #[error("{op} is not supported on views; materialize the view first")]
    UnsupportedOnView { op: &'static str },

    /// The operation would lay out a buffer differently while other
    /// handles still read it with the old layout.
    #[error("{op} changes the layout of a buffer shared with live views; drop them first")]
    SharedBuffer { op: &'static str },

    /// A transpose is pending and the operation would discard it.
    #[error("{op} is not supported on a transposed tensor; untranspose or materialize it first")]
    PendingTranspose { op: &'static str },

    /// Some coordinate of a layout maps below the start of its buffer.
    #[error("layout reaches offset {reach} below the start of the {buffer} buffer")]
    NegativeOffset { buffer: &'static str, reach: isize },

    /// A reduction result was consumed in the wrong representation.
    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        expected: &'static str,
        got: &'static str,
    },

    /// A buffer length does not agree with the shape it backs.
    #[error("shape mismatch: {shape:?} requires {expected} elements, got {got}")]
    ShapeMismatch {
        shape: Vec<usize>,
        expected: usize,
        got: usize,
    },

    #[error("index {index} out of range for dimension {dim} of size {size}")]
    IndexOutOfRange {
        dim: usize,
        index: usize,
        size: usize,
    },

    #[error("invalid range {range} for dimension of size {size}")]
    InvalidRange { range: Range, size: usize },

    #[error("invalid permutation {perm:?}")]
    InvalidPermutation { perm: Vec<usize> },
}
