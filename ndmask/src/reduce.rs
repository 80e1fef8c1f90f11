/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Mask-aware reductions.
//!
//! [`masked_reduce`] lifts a reducer over whole tensors into an
//! axis-wise reduction. For every coordinate of the output (the input
//! shape with `axis` removed) the input is sliced down to the single
//! line running along `axis` through that coordinate, and the reducer
//! is evaluated on the resulting view:
//!
//! ```text
//! input (2, 3, 2), axis = 2
//!
//!   out[i, j] = reducer(input[i:i+1, j:j+1, :])
//! ```
//!
//! The reducers in this module inspect the mask only. They mirror
//! `numpy.ma.getmask(a).any(axis)` and friends, not the data-level
//! `numpy.ma` reductions.

use std::fmt;

use crate::access::AccessPattern;
use crate::config;
use crate::dense::Dense;
use crate::dense::Element;
use crate::error::Result;
use crate::error::TensorError;
use crate::iter::FlatIterator;
use crate::iter::MultIterator;
use crate::range::Range;

/// The result of a [`masked_reduce`]: a single value when the whole
/// tensor was reduced, or a tensor of values otherwise.
#[derive(Debug)]
pub enum Reduced<T> {
    Scalar(T),
    Tensor(Dense<T>),
}

impl<T: Element> Reduced<T> {
    pub fn is_scalar(&self) -> bool {
        matches!(self, Reduced::Scalar(_))
    }

    /// The scalar result; `TypeMismatch` if a tensor was produced.
    pub fn into_scalar(self) -> Result<T> {
        match self {
            Reduced::Scalar(value) => Ok(value),
            Reduced::Tensor(_) => Err(TensorError::TypeMismatch {
                expected: "scalar",
                got: "tensor",
            }),
        }
    }

    /// The tensor result; `TypeMismatch` if a scalar was produced.
    pub fn into_tensor(self) -> Result<Dense<T>> {
        match self {
            Reduced::Tensor(tensor) => Ok(tensor),
            Reduced::Scalar(_) => Err(TensorError::TypeMismatch {
                expected: "tensor",
                got: "scalar",
            }),
        }
    }
}

impl<T: Element> fmt::Display for Reduced<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reduced::Scalar(value) => write!(f, "{:?}", value),
            Reduced::Tensor(tensor) => write!(f, "{:?} {:?}", tensor.shape(), tensor.to_vec()),
        }
    }
}

/// Applies `reducer` to `t` as a whole (`axis == None`) or to every
/// line of `t` along `axis`.
///
/// A rank-1 tensor reduces to a scalar for any valid axis.
pub fn masked_reduce<T, R, F>(t: &Dense<T>, reducer: F, axis: Option<usize>) -> Result<Reduced<R>>
where
    T: Element,
    R: Element,
    F: Fn(&Dense<T>) -> R,
{
    let Some(axis) = axis else {
        return Ok(Reduced::Scalar(reducer(t)));
    };
    let rank = t.rank();
    if axis >= rank {
        return Err(TensorError::AxisOutOfBounds { axis, rank });
    }
    if rank == 1 {
        return Ok(Reduced::Scalar(reducer(t)));
    }

    let mut out_shape = t.shape().to_vec();
    out_shape.remove(axis);
    tracing::trace!(axis, ?out_shape, "masked reduce");

    let mut coords = FlatIterator::new(&AccessPattern::row_major(out_shape.clone()));
    let mut ranges = vec![None; rank];
    let mut values = Vec::with_capacity(out_shape.iter().product());
    while coords.next().is_some() {
        let coord = coords.coord();
        for (dim, range) in ranges.iter_mut().enumerate() {
            *range = match dim.cmp(&axis) {
                std::cmp::Ordering::Less => Some(Range::single(coord[dim])),
                std::cmp::Ordering::Equal => None,
                std::cmp::Ordering::Greater => Some(Range::single(coord[dim - 1])),
            };
        }
        values.push(reducer(&t.slice(&ranges)?));
    }

    Ok(Reduced::Tensor(Dense::from_vec(out_shape, values)?))
}

// The mask entries of `t`, in logical order, when they sit in one
// contiguous run of `mask`.
fn contiguous_mask<'m, T: Element>(t: &Dense<T>, mask: &'m [bool]) -> Option<&'m [bool]> {
    let ap = t.info();
    if !config::global::get().contiguous_fast_path || !ap.is_mask_contiguous() {
        return None;
    }
    let start = ap.mask_offset();
    mask.get(start..start + ap.size())
}

/// Whether any element of `t` is masked. `false` for an unmasked
/// tensor.
pub fn mask_any<T: Element>(t: &Dense<T>) -> bool {
    let mut it = MultIterator::new(t);
    if it.mask().is_empty() {
        return false;
    }
    if let Some(mask) = contiguous_mask(t, it.mask()) {
        return mask.iter().any(|&m| m);
    }
    it.next_invalid().is_some()
}

/// Whether every element of `t` is masked. `false` for an unmasked
/// tensor.
pub fn mask_all<T: Element>(t: &Dense<T>) -> bool {
    let mut it = MultIterator::new(t);
    if it.mask().is_empty() {
        return false;
    }
    if let Some(mask) = contiguous_mask(t, it.mask()) {
        return mask.iter().all(|&m| m);
    }
    while it.advance().is_some() {
        if !it.is_masked() {
            return false;
        }
    }
    true
}

/// Number of masked elements of `t`.
pub fn mask_count<T: Element>(t: &Dense<T>) -> usize {
    let mut it = MultIterator::new(t);
    if it.mask().is_empty() {
        return 0;
    }
    if let Some(mask) = contiguous_mask(t, it.mask()) {
        return mask.iter().filter(|&&m| m).count();
    }
    std::iter::from_fn(|| it.next_invalid()).count()
}

/// Number of unmasked elements of `t`.
pub fn non_mask_count<T: Element>(t: &Dense<T>) -> usize {
    t.size() - mask_count(t)
}

impl<T: Element> Dense<T> {
    /// Whether any element is masked, over the whole tensor or along
    /// `axis`.
    pub fn masked_any(&self, axis: Option<usize>) -> Result<Reduced<bool>> {
        masked_reduce(self, mask_any, axis)
    }

    /// Whether all elements are masked, over the whole tensor or
    /// along `axis`.
    pub fn masked_all(&self, axis: Option<usize>) -> Result<Reduced<bool>> {
        masked_reduce(self, mask_all, axis)
    }

    /// Number of masked elements, over the whole tensor or along
    /// `axis`.
    pub fn masked_count(&self, axis: Option<usize>) -> Result<Reduced<usize>> {
        masked_reduce(self, mask_count, axis)
    }

    /// Number of unmasked elements, over the whole tensor or along
    /// `axis`.
    pub fn non_masked_count(&self, axis: Option<usize>) -> Result<Reduced<usize>> {
        masked_reduce(self, non_mask_count, axis)
    }
}
