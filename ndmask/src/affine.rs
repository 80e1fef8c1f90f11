/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use crate::access::AccessPattern;
use crate::error::Result;
use crate::error::TensorError;

mod sealed {
    // Private trait; only types in this module can implement it.
    pub trait Sealed {}
}

/// A trait for affine maps from integer coordinates to linear buffer
/// offsets.
///
/// A masked tensor addresses two buffers with the same coordinates:
/// the data buffer through [`AccessPattern`] itself and the mask
/// buffer through [`MaskMap`]. Both are affine transformations
/// `f(x) = base + dot(steps, x)` over the same shape, and differ only
/// in base and steps. Steps are signed so that reversed views and
/// broadcast (zero-step) mask dimensions share one formula.
pub trait AffineMap: sealed::Sealed {
    /// The shape of the domain (number of elements per dimension).
    fn shape(&self) -> &[usize];

    /// The offset of the logical origin.
    fn base(&self) -> usize;

    /// The signed step taken per unit of each coordinate.
    fn steps(&self) -> &[isize];

    /// The number of dimensions in the domain of the map.
    fn rank(&self) -> usize {
        self.shape().len()
    }

    /// Maps a multidimensional coordinate to a linear offset.
    fn offset_of(&self, coord: &[usize]) -> Result<usize> {
        if coord.len() != self.rank() {
            return Err(TensorError::DimensionMismatch {
                expected: self.rank(),
                got: coord.len(),
            });
        }
        if let Some((dim, (&index, &size))) = coord
            .iter()
            .zip(self.shape())
            .enumerate()
            .find(|(_, (index, size))| index >= size)
        {
            return Err(TensorError::IndexOutOfRange { dim, index, size });
        }

        // base + ∑ᵢ (stepᵢ × coordᵢ)
        let linear = self
            .steps()
            .iter()
            .zip(coord)
            .map(|(&s, &i)| s * i as isize)
            .sum::<isize>();

        let offset = self.base() as isize + linear;
        debug_assert!(offset >= 0, "affine map produced negative offset");
        Ok(offset as usize)
    }
}

/// The mask-buffer view of an [`AccessPattern`].
#[derive(Debug, Clone, Copy)]
pub struct MaskMap<'a>(pub(crate) &'a AccessPattern);

impl sealed::Sealed for AccessPattern {}
impl sealed::Sealed for MaskMap<'_> {}

impl AffineMap for AccessPattern {
    fn shape(&self) -> &[usize] {
        self.shape()
    }

    fn base(&self) -> usize {
        self.offset()
    }

    fn steps(&self) -> &[isize] {
        self.strides()
    }
}

impl AffineMap for MaskMap<'_> {
    fn shape(&self) -> &[usize] {
        self.0.shape()
    }

    fn base(&self) -> usize {
        self.0.mask_offset()
    }

    fn steps(&self) -> &[isize] {
        self.0.mask_strides()
    }
}
