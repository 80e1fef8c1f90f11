/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Access patterns: how logical coordinates reach the data and mask
//! buffers.

use std::fmt;

use itertools::Itertools;
use serde::Deserialize;
use serde::Serialize;

use crate::affine::AffineMap;
use crate::affine::MaskMap;
use crate::error::Result;
use crate::error::TensorError;
use crate::range::Range;
use crate::reshape::strides_for;
use crate::reshape::Order;

/// Shape, data strides and mask strides of a tensor, together with
/// the base offsets of its logical origin in both buffers.
///
/// A zero mask stride broadcasts the mask along that dimension: every
/// index of the dimension reads the same mask entry, so the mask
/// buffer is smaller than the data buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessPattern {
    offset: usize,
    mask_offset: usize,
    shape: Vec<usize>,
    strides: Vec<isize>,
    mask_strides: Vec<isize>,
}

impl AccessPattern {
    /// Creates a pattern from its parts. All three vectors must have
    /// the same length, and no coordinate may map below offset 0 in
    /// either buffer.
    pub fn new(
        offset: usize,
        shape: Vec<usize>,
        strides: Vec<isize>,
        mask_offset: usize,
        mask_strides: Vec<isize>,
    ) -> Result<Self> {
        for len in [strides.len(), mask_strides.len()] {
            if len != shape.len() {
                return Err(TensorError::DimensionMismatch {
                    expected: shape.len(),
                    got: len,
                });
            }
        }
        // Every coordinate must land at or after the start of both
        // buffers. A layout with an empty dimension addresses nothing.
        if shape.iter().all(|&n| n > 0) {
            let layouts = [
                ("data", offset, &strides),
                ("mask", mask_offset, &mask_strides),
            ];
            for (buffer, base, steps) in layouts {
                let reach = base as isize
                    + shape
                        .iter()
                        .zip(steps)
                        .map(|(&n, &s)| ((n - 1) as isize * s).min(0))
                        .sum::<isize>();
                if reach < 0 {
                    return Err(TensorError::NegativeOffset { buffer, reach });
                }
            }
        }
        Ok(Self {
            offset,
            mask_offset,
            shape,
            strides,
            mask_strides,
        })
    }

    /// A canonical row-major pattern whose mask covers every element.
    pub fn row_major(shape: Vec<usize>) -> Self {
        let strides = strides_for(&shape, Order::RowMajor);
        Self {
            offset: 0,
            mask_offset: 0,
            mask_strides: strides.clone(),
            strides,
            shape,
        }
    }

    /// A row-major pattern whose mask only varies along the dimensions
    /// flagged in `mask_dims`. The mask is laid out row-major over
    /// those dimensions and broadcast over the others.
    pub fn with_mask_dims(shape: Vec<usize>, mask_dims: &[bool]) -> Result<Self> {
        if mask_dims.len() != shape.len() {
            return Err(TensorError::DimensionMismatch {
                expected: shape.len(),
                got: mask_dims.len(),
            });
        }
        let strides = strides_for(&shape, Order::RowMajor);
        let mut mask_strides = vec![0; shape.len()];
        let mut step = 1isize;
        for (i, &size) in shape.iter().enumerate().rev() {
            if mask_dims[i] {
                mask_strides[i] = step;
                step *= size as isize;
            }
        }
        Ok(Self {
            offset: 0,
            mask_offset: 0,
            shape,
            strides,
            mask_strides,
        })
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn mask_offset(&self) -> usize {
        self.mask_offset
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    pub fn mask_strides(&self) -> &[isize] {
        &self.mask_strides
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn is_scalar(&self) -> bool {
        self.shape.is_empty()
    }

    /// Number of logical elements.
    pub fn size(&self) -> usize {
        self.shape.iter().product()
    }

    /// Number of distinct mask entries this pattern addresses: the
    /// product of the extents whose mask stride is non-zero. A pattern
    /// of rank ≥ 1 with no such dimension carries no mask at all.
    pub fn mask_size(&self) -> usize {
        if !self.is_scalar() && self.mask_strides.iter().all(|&s| s == 0) {
            return 0;
        }
        self.shape
            .iter()
            .zip(&self.mask_strides)
            .filter(|&(_, &s)| s != 0)
            .map(|(&n, _)| n)
            .product()
    }

    /// Whether some dimension broadcasts the mask.
    pub fn is_mask_broadcast(&self) -> bool {
        self.mask_size() != self.size()
    }

    /// Whether the data strides are canonical row-major, so the
    /// elements occupy `[offset, offset + size)` in order.
    pub fn is_contiguous(&self) -> bool {
        is_row_major(&self.shape, &self.strides)
    }

    /// Whether the mask strides are canonical row-major, so the mask
    /// entries occupy `[mask_offset, mask_offset + size)` in order.
    pub fn is_mask_contiguous(&self) -> bool {
        is_row_major(&self.shape, &self.mask_strides)
    }

    /// Offset of `coord` in the data buffer.
    pub fn offset_of(&self, coord: &[usize]) -> Result<usize> {
        AffineMap::offset_of(self, coord)
    }

    /// Offset of `coord` in the mask buffer. Broadcast dimensions do
    /// not contribute.
    pub fn mask_offset_of(&self, coord: &[usize]) -> Result<usize> {
        self.mask_map().offset_of(coord)
    }

    /// The mask buffer layout as an affine map.
    pub fn mask_map(&self) -> MaskMap<'_> {
        MaskMap(self)
    }

    /// Derives the pattern selecting `ranges`, one per dimension
    /// (`None` selects the whole dimension). Rank is preserved; a
    /// single-index range leaves a dimension of size 1.
    pub fn slice_into(&self, ranges: &[Option<Range>]) -> Result<AccessPattern> {
        if ranges.len() != self.rank() {
            return Err(TensorError::DimensionMismatch {
                expected: self.rank(),
                got: ranges.len(),
            });
        }

        let mut offset = self.offset as isize;
        let mut mask_offset = self.mask_offset as isize;
        let mut shape = Vec::with_capacity(self.rank());
        let mut strides = Vec::with_capacity(self.rank());
        let mut mask_strides = Vec::with_capacity(self.rank());

        for (dim, range) in ranges.iter().enumerate() {
            let size = self.shape[dim];
            let (start, end, step) = range.unwrap_or(Range(0, None, 1)).resolve(size)?;
            let len = (end - start).div_ceil(step);
            // An empty selection never dereferences its origin.
            if len > 0 {
                offset += start as isize * self.strides[dim];
                mask_offset += start as isize * self.mask_strides[dim];
            }
            shape.push(len);
            strides.push(self.strides[dim] * step as isize);
            mask_strides.push(self.mask_strides[dim] * step as isize);
        }

        Ok(AccessPattern {
            offset: offset as usize,
            mask_offset: mask_offset as usize,
            shape,
            strides,
            mask_strides,
        })
    }

    /// Permutes shape, strides and mask strides together: dimension
    /// `i` of the result is dimension `perm[i]` of `self`.
    pub fn transpose(&self, perm: &[usize]) -> Result<AccessPattern> {
        validate_permutation(perm, self.rank())?;
        Ok(AccessPattern {
            offset: self.offset,
            mask_offset: self.mask_offset,
            shape: perm.iter().map(|&p| self.shape[p]).collect(),
            strides: perm.iter().map(|&p| self.strides[p]).collect(),
            mask_strides: perm.iter().map(|&p| self.mask_strides[p]).collect(),
        })
    }

    /// Replaces the mask layout with a full row-major mask over the
    /// current shape.
    pub(crate) fn with_full_mask(&self) -> AccessPattern {
        self.with_mask_strides(strides_for(&self.shape, Order::RowMajor))
    }

    pub(crate) fn with_mask_strides(&self, mask_strides: Vec<isize>) -> AccessPattern {
        debug_assert_eq!(mask_strides.len(), self.rank());
        AccessPattern {
            offset: self.offset,
            mask_offset: 0,
            shape: self.shape.clone(),
            strides: self.strides.clone(),
            mask_strides,
        }
    }
}

impl fmt::Display for AccessPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AccessPattern {{ [off={} sz=({}) st=({}) moff={} mst=({})] }}",
            self.offset,
            self.shape.iter().join(", "),
            self.strides.iter().join(", "),
            self.mask_offset,
            self.mask_strides.iter().join(", "),
        )
    }
}

fn is_row_major(shape: &[usize], strides: &[isize]) -> bool {
    let mut expected = 1isize;
    for (&size, &stride) in shape.iter().zip(strides).rev() {
        if size == 1 {
            continue;
        }
        if stride != expected {
            return false;
        }
        expected *= size as isize;
    }
    true
}

pub(crate) fn validate_permutation(perm: &[usize], rank: usize) -> Result<()> {
    if perm.len() != rank {
        return Err(TensorError::DimensionMismatch {
            expected: rank,
            got: perm.len(),
        });
    }
    let mut seen = vec![false; rank];
    for &axis in perm {
        if axis >= rank {
            return Err(TensorError::AxisOutOfBounds { axis, rank });
        }
        if std::mem::replace(&mut seen[axis], true) {
            return Err(TensorError::InvalidPermutation {
                perm: perm.to_vec(),
            });
        }
    }
    Ok(())
}
