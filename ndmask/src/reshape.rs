/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Canonical layouts and in-place reshaping of owned tensors.
//!
//! A tensor can only be reshaped when it owns its buffers. Any pending
//! transpose is materialized first, so the buffers hold the elements in
//! logical row-major order, and a broadcast mask is expanded to a
//! full one. The new shape then gets canonical strides for both
//! buffers. Those two rewrites are refused while views are alive;
//! a plain reshape of a row-major tensor leaves existing views valid.
//!
//! See [`Dense::reshape`] and [`Dense::materialize_transpose`].

use crate::access::AccessPattern;
use crate::dense::Dense;
use crate::dense::Element;
use crate::error::Result;
use crate::error::TensorError;

/// Memory layout order used to compute strides.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Order {
    /// Row-major layout (C-style): last index varies fastest.
    RowMajor,

    /// Column-major layout (Fortran-style): first index varies
    /// fastest.
    ColumnMajor,
}

/// Canonical strides for a dense buffer of `shape` laid out in
/// `order`.
pub fn strides_for(shape: &[usize], order: Order) -> Vec<isize> {
    let mut strides = vec![0; shape.len()];
    let mut stride = 1isize;
    match order {
        Order::RowMajor => {
            for (i, &size) in shape.iter().enumerate().rev() {
                strides[i] = stride;
                stride *= size as isize;
            }
        }
        Order::ColumnMajor => {
            for (i, &size) in shape.iter().enumerate() {
                strides[i] = stride;
                stride *= size as isize;
            }
        }
    }
    strides
}

impl<T: Element> Dense<T> {
    /// Reshapes an owning tensor in place. The element count must not
    /// change.
    pub fn reshape(&mut self, shape: Vec<usize>) -> Result<()> {
        self.ensure_owner("reshape")?;
        let expected = self.size();
        let got = shape.iter().product();
        if got != expected {
            return Err(TensorError::ShapeMismatch {
                shape,
                expected,
                got,
            });
        }

        self.materialize_transpose()?;
        if self.mask_len > 0 && self.info().is_mask_broadcast() {
            self.expand_mask()?;
        }

        let strides = strides_for(&shape, Order::RowMajor);
        let mask_strides = if self.mask_len == 0 {
            vec![0; shape.len()]
        } else {
            strides.clone()
        };
        self.ap = AccessPattern::new(0, shape, strides, 0, mask_strides)?;
        tracing::debug!(ap = %self.ap, "reshaped tensor");
        Ok(())
    }

    /// Moves the data (and mask) of a transposed tensor so that the
    /// buffers hold its elements in logical row-major order, then
    /// drops the saved pre-transpose layout. The mask ends up covering
    /// every element. A no-op when no transpose is pending.
    ///
    /// Fails with `SharedBuffer` while views of the tensor are alive,
    /// since they would read the rearranged buffers through their old
    /// strides.
    pub fn materialize_transpose(&mut self) -> Result<()> {
        self.ensure_owner("materialize_transpose")?;
        if self.old.is_none() {
            return Ok(());
        }
        self.ensure_unshared("materialize_transpose")?;

        let data = self.to_vec();
        let masked = self.is_masked();
        let mask = if masked { self.mask_to_vec() } else { Vec::new() };
        *self.data.write() = data;
        *self.mask.write() = mask;

        let shape = self.shape().to_vec();
        let strides = strides_for(&shape, Order::RowMajor);
        self.ap = AccessPattern::new(0, shape, strides.clone(), 0, strides)?;
        self.mask_len = self.size();
        self.old = None;
        self.transpose_with = None;
        tracing::debug!(ap = %self.ap, masked, "materialized transpose");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::Range;

    fn arange(shape: Vec<usize>) -> Dense<i64> {
        let size: usize = shape.iter().product();
        Dense::from_vec(shape, (0..size as i64).collect()).unwrap()
    }

    #[test]
    fn test_strides_for() {
        assert_eq!(strides_for(&[2, 3, 4], Order::RowMajor), vec![12, 4, 1]);
        assert_eq!(strides_for(&[2, 3, 4], Order::ColumnMajor), vec![1, 2, 6]);
        assert_eq!(strides_for(&[], Order::RowMajor), Vec::<isize>::new());
    }

    #[test]
    fn test_reshape_owner() {
        let mut t = arange(vec![2, 6]);
        t.reshape(vec![3, 4]).unwrap();
        assert_eq!(t.shape(), &[3, 4]);
        assert_eq!(t.strides(), &[4, 1]);
        assert_eq!(t.get(&[2, 1]).unwrap(), 9);
    }

    #[test]
    fn test_reshape_rejects_views_and_bad_sizes() {
        let mut t = arange(vec![2, 6]);
        let mut v = t.slice(&[Some(Range::single(0))]).unwrap();
        assert_eq!(
            v.reshape(vec![6]).unwrap_err(),
            TensorError::UnsupportedOnView { op: "reshape" }
        );
        assert_eq!(
            t.reshape(vec![5]).unwrap_err(),
            TensorError::ShapeMismatch {
                shape: vec![5],
                expected: 12,
                got: 5
            }
        );
    }

    #[test]
    fn test_reshape_materializes_transpose() {
        let mut t = arange(vec![2, 3]);
        t.transpose(&[1, 0]).unwrap();
        t.reshape(vec![6]).unwrap();
        assert!(!t.is_materializable());
        assert_eq!(t.to_vec(), vec![0, 3, 1, 4, 2, 5]);
    }

    #[test]
    fn test_materialize_transpose_moves_mask() {
        let mut t = arange(vec![2, 3])
            .with_mask(vec![true, false, false, false, false, true])
            .unwrap();
        t.transpose(&[1, 0]).unwrap();
        let before = t.mask_to_vec();
        t.materialize_transpose().unwrap();
        assert_eq!(t.mask_data(), before);
        assert_eq!(t.mask_to_vec(), before);
        assert_eq!(t.to_vec(), vec![0, 3, 1, 4, 2, 5]);
        assert!(t.info().is_contiguous());
    }

    #[test]
    fn test_materialize_transpose_refuses_live_views() {
        let mut t = arange(vec![2, 3]);
        t.transpose(&[1, 0]).unwrap();
        let v = t.slice(&[Some(Range::single(2))]).unwrap();
        assert_eq!(
            t.materialize_transpose().unwrap_err(),
            TensorError::SharedBuffer {
                op: "materialize_transpose"
            }
        );
        assert_eq!(
            t.reshape(vec![6]).unwrap_err(),
            TensorError::SharedBuffer {
                op: "materialize_transpose"
            }
        );
        assert_eq!(v.to_vec(), vec![2, 5]);
        drop(v);

        t.reshape(vec![6]).unwrap();
        assert_eq!(t.to_vec(), vec![0, 3, 1, 4, 2, 5]);
    }

    #[test]
    fn test_reshape_keeps_views_of_row_major_tensor() {
        let mut t = arange(vec![2, 3]);
        let v = t.slice(&[Some(Range::single(1))]).unwrap();
        t.reshape(vec![3, 2]).unwrap();
        assert_eq!(v.to_vec(), vec![3, 4, 5]);
        assert_eq!(t.get(&[2, 0]).unwrap(), 4);
    }

    #[test]
    fn test_reshape_expands_broadcast_mask() {
        let mut t = arange(vec![2, 3])
            .with_mask_dims(&[false, true])
            .unwrap()
            .with_mask(vec![false, true, false])
            .unwrap();
        t.reshape(vec![3, 2]).unwrap();
        assert_eq!(t.mask_data(), vec![false, true, false, false, true, false]);
        assert_eq!(t.masked_count(None).unwrap().into_scalar().unwrap(), 2);
    }
}
