/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Views and materialization
//!
//! A [`Dense`] tensor is a pair of shared buffers read through an
//! [`AccessPattern`]. Slicing, transposing and viewing never copy:
//! they derive a new access pattern and clone the `Arc` handles to
//! the same data and mask buffers.
//!
//! # Aliasing
//!
//! ```text
//!   owner ──┐
//!           ├──► Arc<RwLock<Vec<T>>>      data
//!   view  ──┤
//!           └──► Arc<RwLock<Vec<bool>>>   mask
//! ```
//!
//! Every handle sees every write. Buffers live until the last handle
//! is dropped, so a view may outlive the tensor it was derived from.
//! Operations that reallocate or reinterpret buffers (`reshape`,
//! `with_mask`, `expand_mask`, ...) are only available on the owner
//! and fail with [`TensorError::UnsupportedOnView`] on a view.
//!
//! # Materialization
//!
//! [`Dense::materialize`] copies the logical contents of any handle
//! into a fresh owner with canonical row-major layout for both
//! buffers:
//!
//! ```text
//! shape:        [3, 2]           (transposed 2×3)
//! strides:      [1, 3]     ──►   [2, 1]
//! mask strides: [0, 1]     ──►   [2, 1]
//! ```
//!
//! A broadcast mask is expanded on the way, so the copy carries one
//! mask entry per element.
//!
//! [`Dense::expand_mask`] performs the mask half of that conversion in
//! place on an owner.
//!
//! # Layout changes
//!
//! A view resolves the shared buffers through the access pattern it
//! was derived with. Owner operations that rewrite a buffer in a new
//! layout (`expand_mask`, `materialize_transpose`, `with_mask_dims`,
//! and `reset_mask` on a tensor without mask dimensions) would leave
//! such views reading the wrong entries, so they fail with
//! [`TensorError::SharedBuffer`] until every view has been dropped.
//! Operations that keep the layout (`with_mask`, `reset_mask` on a
//! tensor with mask dimensions, writes through any handle) are
//! visible through all views.

use crate::access::AccessPattern;
use crate::dense::Dense;
use crate::dense::Element;
use crate::error::Result;
#[cfg(doc)]
use crate::error::TensorError;

impl<T: Element> Dense<T> {
    /// A view sharing both buffers with the same access pattern.
    pub fn view(&self) -> Dense<T> {
        self.derive(self.ap.clone())
    }

    /// Copies the logical elements and per-element mask into a new
    /// owning tensor with row-major layout.
    pub fn materialize(&self) -> Dense<T> {
        let out = Dense::from_parts(AccessPattern::row_major(self.shape().to_vec()), self.to_vec());
        if self.is_masked() {
            *out.mask.write() = self.mask_to_vec();
        }
        out
    }

    /// Replaces a broadcast mask by a full one with an entry for every
    /// element. Pending transposes are materialized first. Fails with
    /// `SharedBuffer` while views of the tensor are alive.
    pub fn expand_mask(&mut self) -> Result<()> {
        self.ensure_owner("expand_mask")?;
        if self.old.is_some() {
            return self.materialize_transpose();
        }
        if !self.ap.is_mask_broadcast() {
            return Ok(());
        }
        self.ensure_unshared("expand_mask")?;

        if self.is_masked() {
            let mask = self.mask_to_vec();
            *self.mask.write() = mask;
        }
        self.ap = self.ap.with_full_mask();
        self.mask_len = self.size();
        tracing::debug!(ap = %self.ap, "expanded mask");
        Ok(())
    }
}
