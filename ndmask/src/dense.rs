/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Dense tensors with an optional mask.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use parking_lot::RwLockReadGuard;

use crate::access::validate_permutation;
use crate::access::AccessPattern;
use crate::error::Result;
use crate::error::TensorError;
use crate::iter::Cursor;
use crate::iter::FlatIterator;
use crate::range::Range;

/// Element payloads a [`Dense`] tensor can hold.
pub trait Element: Copy + Default + fmt::Debug + PartialEq + Send + Sync + 'static {}

impl<T> Element for T where T: Copy + Default + fmt::Debug + PartialEq + Send + Sync + 'static {}

pub(crate) type Buffer<T> = Arc<RwLock<Vec<T>>>;

/// A dense tensor: a data buffer and an optional mask buffer, read
/// through an [`AccessPattern`].
///
/// Both buffers are shared with every view derived from the tensor,
/// so a write through any handle is visible through all of them. An
/// empty mask buffer means no element is masked. A mask entry of
/// `true` marks the element invalid.
#[derive(Debug)]
pub struct Dense<T> {
    pub(crate) ap: AccessPattern,
    pub(crate) data: Buffer<T>,
    pub(crate) mask: Buffer<bool>,
    // Length of the shared mask buffer once allocated.
    pub(crate) mask_len: usize,
    pub(crate) view: bool,
    // Layout before the first pending transpose, and the permutation
    // leading from it to `ap`.
    pub(crate) old: Option<AccessPattern>,
    pub(crate) transpose_with: Option<Vec<usize>>,
}

impl<T: Element> Dense<T> {
    /// A row-major tensor of `T::default()` whose mask, once seeded,
    /// covers every element.
    pub fn new(shape: Vec<usize>) -> Self {
        let size = shape.iter().product();
        Self::from_parts(AccessPattern::row_major(shape), vec![T::default(); size])
    }

    /// A row-major tensor over `data`.
    pub fn from_vec(shape: Vec<usize>, data: Vec<T>) -> Result<Self> {
        let expected = shape.iter().product();
        if data.len() != expected {
            return Err(TensorError::ShapeMismatch {
                shape,
                expected,
                got: data.len(),
            });
        }
        Ok(Self::from_parts(AccessPattern::row_major(shape), data))
    }

    pub(crate) fn from_parts(ap: AccessPattern, data: Vec<T>) -> Self {
        Self {
            mask_len: ap.mask_size(),
            ap,
            data: Arc::new(RwLock::new(data)),
            mask: Arc::new(RwLock::new(Vec::new())),
            view: false,
            old: None,
            transpose_with: None,
        }
    }

    /// Restricts the mask to the dimensions flagged in `mask_dims`; it
    /// is broadcast along the others. Any existing mask is dropped.
    ///
    /// Fails with `PendingTranspose` on a transposed tensor and with
    /// `SharedBuffer` while views of the tensor are alive.
    pub fn with_mask_dims(mut self, mask_dims: &[bool]) -> Result<Self> {
        self.ensure_owner("with_mask_dims")?;
        if self.old.is_some() {
            return Err(TensorError::PendingTranspose {
                op: "with_mask_dims",
            });
        }
        self.ensure_unshared("with_mask_dims")?;
        let ap = AccessPattern::with_mask_dims(self.ap.shape().to_vec(), mask_dims)?;
        self.mask_len = ap.mask_size();
        self.ap = ap;
        self.mask.write().clear();
        Ok(self)
    }

    /// Installs `mask` as the mask buffer. Its length must equal
    /// [`Dense::mask_size`]; an empty mask removes masking.
    pub fn with_mask(self, mask: Vec<bool>) -> Result<Self> {
        self.ensure_owner("with_mask")?;
        if !mask.is_empty() && mask.len() != self.mask_len {
            return Err(TensorError::ShapeMismatch {
                shape: self.ap.shape().to_vec(),
                expected: self.mask_len,
                got: mask.len(),
            });
        }
        *self.mask.write() = mask;
        Ok(self)
    }

    /// The access pattern describing this tensor.
    pub fn info(&self) -> &AccessPattern {
        &self.ap
    }

    pub fn shape(&self) -> &[usize] {
        self.ap.shape()
    }

    pub fn strides(&self) -> &[isize] {
        self.ap.strides()
    }

    pub fn rank(&self) -> usize {
        self.ap.rank()
    }

    /// Number of logical elements.
    pub fn size(&self) -> usize {
        self.ap.size()
    }

    /// Number of mask entries addressed by this tensor.
    pub fn mask_size(&self) -> usize {
        self.ap.mask_size()
    }

    /// Whether a mask buffer is present.
    pub fn is_masked(&self) -> bool {
        !self.mask.read().is_empty()
    }

    /// Whether this tensor shares another tensor's buffers.
    pub fn is_view(&self) -> bool {
        self.view
    }

    /// Whether the logical layout differs from the owned buffer, i.e.
    /// the tensor is a view or carries a pending transpose.
    pub fn is_materializable(&self) -> bool {
        self.view || self.old.is_some()
    }

    pub fn get(&self, coord: &[usize]) -> Result<T> {
        let offset = self.ap.offset_of(coord)?;
        Ok(self.data.read()[offset])
    }

    pub fn set_at(&self, coord: &[usize], value: T) -> Result<()> {
        let offset = self.ap.offset_of(coord)?;
        self.data.write()[offset] = value;
        Ok(())
    }

    /// Whether the element at `coord` is masked (invalid).
    pub fn is_masked_at(&self, coord: &[usize]) -> Result<bool> {
        let offset = self.ap.mask_offset_of(coord)?;
        let mask = self.mask.read();
        Ok(!mask.is_empty() && mask[offset])
    }

    /// The logical elements in row-major order.
    pub fn to_vec(&self) -> Vec<T> {
        let data = self.data.read();
        FlatIterator::new(&self.ap).map(|offset| data[offset]).collect()
    }

    /// The per-element mask in row-major order, broadcast dimensions
    /// expanded. All `false` when the tensor carries no mask.
    pub fn mask_to_vec(&self) -> Vec<bool> {
        let mask = self.mask.read();
        if mask.is_empty() {
            return vec![false; self.size()];
        }
        let mut cursor = Cursor::new(&self.ap);
        let mut out = Vec::with_capacity(self.size());
        while cursor.advance().is_some() {
            out.push(mask[cursor.mask_offset()]);
        }
        out
    }

    /// A copy of the raw shared mask buffer.
    pub fn mask_data(&self) -> Vec<bool> {
        self.mask.read().clone()
    }

    pub(crate) fn mask_guard(&self) -> RwLockReadGuard<'_, Vec<bool>> {
        self.mask.read()
    }

    /// Returns a view selecting `ranges`. Missing trailing ranges, and
    /// `None` entries, select the whole dimension.
    pub fn slice(&self, ranges: &[Option<Range>]) -> Result<Dense<T>> {
        if ranges.len() > self.rank() {
            return Err(TensorError::DimensionMismatch {
                expected: self.rank(),
                got: ranges.len(),
            });
        }
        let mut full = ranges.to_vec();
        full.resize(self.rank(), None);
        Ok(self.derive(self.ap.slice_into(&full)?))
    }

    pub(crate) fn derive(&self, ap: AccessPattern) -> Dense<T> {
        Dense {
            ap,
            data: Arc::clone(&self.data),
            mask: Arc::clone(&self.mask),
            mask_len: self.mask_len,
            view: true,
            old: None,
            transpose_with: None,
        }
    }

    /// Permutes the dimensions in place without moving data. The
    /// layout before the first pending transpose is kept so that
    /// [`Dense::untranspose`] can restore it.
    pub fn transpose(&mut self, perm: &[usize]) -> Result<()> {
        validate_permutation(perm, self.rank())?;
        let composed = match &self.transpose_with {
            Some(with) => perm.iter().map(|&p| with[p]).collect(),
            None => perm.to_vec(),
        };
        let ap = self.ap.transpose(perm)?;
        self.old.get_or_insert_with(|| self.ap.clone());
        self.transpose_with = Some(composed);
        self.ap = ap;
        Ok(())
    }

    /// Restores the layout saved by the first pending transpose.
    pub fn untranspose(&mut self) {
        if let Some(old) = self.old.take() {
            self.ap = old;
            self.transpose_with = None;
        }
    }

    /// The permutation applied by pending transposes, if any.
    pub fn transposed_with(&self) -> Option<&[usize]> {
        self.transpose_with.as_deref()
    }

    /// Seeds the mask with `value`.
    ///
    /// On an owning tensor the mask buffer is reallocated and every
    /// entry set; a tensor without mask dimensions first switches to a
    /// full row-major mask, which fails with `SharedBuffer` while
    /// views of it are alive. On a view only the entries the view
    /// addresses are written, allocating the shared buffer (unmasked)
    /// if needed, which is how a sub-region is marked valid or invalid.
    pub fn reset_mask(&mut self, value: bool) -> Result<()> {
        if !self.view {
            if self.mask_len == 0 && self.size() > 0 {
                self.ensure_unshared("reset_mask")?;
                self.adopt_full_mask();
            }
            let mut mask = self.mask.write();
            mask.clear();
            mask.resize(self.mask_len, value);
            tracing::debug!(value, len = self.mask_len, "reset owner mask");
            return Ok(());
        }

        if self.mask_len == 0 || self.ap.mask_size() == 0 {
            return Err(TensorError::UnsupportedOnView { op: "reset_mask" });
        }
        let mut mask = self.mask.write();
        if mask.is_empty() {
            mask.resize(self.mask_len, false);
        }
        let mut cursor = Cursor::new(&self.ap);
        while cursor.advance().is_some() {
            mask[cursor.mask_offset()] = value;
        }
        tracing::debug!(value, region = %self.ap, "reset view mask");
        Ok(())
    }

    // Switches an owner to a full row-major mask, keeping any pending
    // transpose consistent.
    fn adopt_full_mask(&mut self) {
        if let (Some(old), Some(with)) = (self.old.as_mut(), self.transpose_with.as_ref()) {
            *old = old.with_full_mask();
            let mask_strides = with.iter().map(|&p| old.mask_strides()[p]).collect();
            self.ap = self.ap.with_mask_strides(mask_strides);
        } else {
            self.ap = self.ap.with_full_mask();
        }
        self.mask_len = self.size();
    }

    pub(crate) fn ensure_owner(&self, op: &'static str) -> Result<()> {
        if self.view {
            return Err(TensorError::UnsupportedOnView { op });
        }
        Ok(())
    }

    // Views resolve the shared buffers through the layout they were
    // derived with, so the layout may only change while no view is
    // alive.
    pub(crate) fn ensure_unshared(&self, op: &'static str) -> Result<()> {
        if Arc::strong_count(&self.data) > 1 || Arc::strong_count(&self.mask) > 1 {
            return Err(TensorError::SharedBuffer { op });
        }
        Ok(())
    }
}
