/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::error::Result;
use crate::error::TensorError;

/// A half-open range `[start, end)` over one dimension, with a step.
///
/// `Range(start, None, step)` extends to the end of the dimension.
/// Slicing APIs take `Option<Range>`, where `None` selects the whole
/// dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Range(pub usize, pub Option<usize>, pub usize);

impl Range {
    /// The range `[start, end)` with unit step.
    pub fn new(start: usize, end: usize) -> Self {
        Range(start, Some(end), 1)
    }

    /// The range holding exactly `index`.
    pub fn single(index: usize) -> Self {
        Range(index, Some(index + 1), 1)
    }

    pub fn start(&self) -> usize {
        self.0
    }

    pub fn end(&self) -> Option<usize> {
        self.1
    }

    pub fn step(&self) -> usize {
        self.2
    }

    /// Resolves this range against a dimension of `size` elements,
    /// returning `(start, end, step)`.
    pub fn resolve(&self, size: usize) -> Result<(usize, usize, usize)> {
        let Range(start, end, step) = *self;
        let end = end.unwrap_or(size);
        if step == 0 || start > end || end > size {
            return Err(TensorError::InvalidRange { range: *self, size });
        }
        Ok((start, end, step))
    }

    /// Number of indices this range selects from a dimension of
    /// `size` elements.
    pub fn len(&self, size: usize) -> Result<usize> {
        let (start, end, step) = self.resolve(size)?;
        Ok((end - start).div_ceil(step))
    }

    pub fn is_empty(&self, size: usize) -> Result<bool> {
        Ok(self.len(size)? == 0)
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Range(start, None, 1) => write!(f, "{}:", start),
            Range(start, Some(end), 1) => write!(f, "{}:{}", start, end),
            Range(start, None, step) => write!(f, "{}::{}", start, step),
            Range(start, Some(end), step) => write!(f, "{}:{}:{}", start, end, step),
        }
    }
}

impl From<usize> for Range {
    fn from(index: usize) -> Self {
        Range::single(index)
    }
}

impl From<std::ops::Range<usize>> for Range {
    fn from(r: std::ops::Range<usize>) -> Self {
        Range(r.start, Some(r.end), 1)
    }
}

impl From<std::ops::RangeFrom<usize>> for Range {
    fn from(r: std::ops::RangeFrom<usize>) -> Self {
        Range(r.start, None, 1)
    }
}

impl From<std::ops::RangeFull> for Range {
    fn from(_: std::ops::RangeFull) -> Self {
        Range(0, None, 1)
    }
}
