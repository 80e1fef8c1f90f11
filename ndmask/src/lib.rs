/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Strided, optionally masked, multidimensional arrays.
//!
//! A [`Dense`] tensor pairs a data buffer with an independent boolean
//! mask, both read through an [`AccessPattern`]. A mask entry of
//! `true` marks the element invalid (missing). Slicing, transposing
//! and viewing derive new access patterns over the same shared
//! buffers without copying.
//!
//! The mask may be broadcast along some dimensions (zero mask stride),
//! in which case one mask entry covers a whole line of elements.
//!
//! On top of the access patterns sit:
//!
//! - iterators ([`FlatIterator`], [`MultIterator`]) that walk a tensor
//!   in logical order and can seek to the next valid or invalid
//!   element in either direction;
//! - [`masked_reduce`], which turns a whole-tensor reducer into an
//!   axis-wise one, and the mask reducers built on it
//!   ([`Dense::masked_any`], [`Dense::masked_count`], ...);
//! - region finders ([`Dense::flat_not_masked_contiguous`],
//!   [`Dense::flat_masked_edges`], ...).
//!
//! ```
//! use ndmask::Dense;
//! use ndmask::Range;
//!
//! let mut t = Dense::<f64>::new(vec![1, 10]);
//! t.reset_mask(false).unwrap();
//! t.slice(&[None, Some(Range::new(2, 5))])
//!     .unwrap()
//!     .reset_mask(true)
//!     .unwrap();
//!
//! assert_eq!(t.masked_count(None).unwrap().into_scalar().unwrap(), 3);
//! assert_eq!(t.flat_masked_contiguous(), vec![Range::new(2, 5)]);
//! ```

mod access;
mod affine;
pub mod config;
mod contiguous;
mod dense;
mod error;
mod iter;
mod range;
mod reduce;
mod reshape;
mod view;

/// Property-based generators for randomized tests.
#[cfg(test)]
pub mod strategy;

pub use access::AccessPattern;
pub use affine::AffineMap;
pub use affine::MaskMap;
pub use dense::Dense;
pub use dense::Element;
pub use error::Result;
pub use error::TensorError;
pub use iter::FlatIterator;
pub use iter::MultIterator;
pub use iter::Validity;
pub use range::Range;
pub use reduce::Reduced;
pub use reduce::mask_all;
pub use reduce::mask_any;
pub use reduce::mask_count;
pub use reduce::masked_reduce;
pub use reduce::non_mask_count;
pub use reshape::Order;
pub use reshape::strides_for;
