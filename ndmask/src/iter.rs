/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Strided traversal of tensors.
//!
//! Two iterators share one cursor over an [`AccessPattern`]:
//!
//! - [`FlatIterator`] ignores the mask and yields data-buffer offsets
//!   in logical row-major order.
//! - [`MultIterator`] additionally tracks the mask-buffer index of
//!   every element and can seek forwards or backwards to the next
//!   valid or invalid element.
//!
//! The cursor moves incrementally: each step adjusts the data and mask
//! offsets by one stride, and a carry rewinds the exhausted dimension.
//! Zero mask strides therefore revisit the same mask entry across a
//! broadcast dimension without any special casing.

use parking_lot::RwLockReadGuard;

use crate::access::AccessPattern;
use crate::dense::Dense;
use crate::dense::Element;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Fresh,
    Active,
    Exhausted,
}

/// Traversal state over one access pattern.
#[derive(Debug, Clone)]
pub(crate) struct Cursor {
    shape: Vec<usize>,
    strides: Vec<isize>,
    mask_strides: Vec<isize>,
    base: isize,
    mask_base: isize,
    size: usize,

    coord: Vec<usize>,
    offset: isize,
    mask_offset: isize,
    position: usize,
    reverse: bool,
    state: State,
}

impl Cursor {
    pub(crate) fn new(ap: &AccessPattern) -> Self {
        Self {
            shape: ap.shape().to_vec(),
            strides: ap.strides().to_vec(),
            mask_strides: ap.mask_strides().to_vec(),
            base: ap.offset() as isize,
            mask_base: ap.mask_offset() as isize,
            size: ap.size(),
            coord: vec![0; ap.rank()],
            offset: ap.offset() as isize,
            mask_offset: ap.mask_offset() as isize,
            position: 0,
            reverse: false,
            state: State::Fresh,
        }
    }

    /// Restarts the traversal from the last element, moving backwards.
    pub(crate) fn set_reverse(&mut self) {
        self.reverse = true;
        self.state = State::Fresh;
    }

    pub(crate) fn exhaust(&mut self) {
        self.state = State::Exhausted;
    }

    /// Moves to the next element and returns its logical row-major
    /// position, or `None` once every element has been visited.
    pub(crate) fn advance(&mut self) -> Option<usize> {
        match self.state {
            State::Exhausted => None,
            State::Fresh => {
                if self.size == 0 {
                    self.state = State::Exhausted;
                    return None;
                }
                self.seek_start();
                self.state = State::Active;
                Some(self.position)
            }
            State::Active => {
                let moved = if self.reverse {
                    self.decrement()
                } else {
                    self.increment()
                };
                if moved {
                    Some(self.position)
                } else {
                    self.state = State::Exhausted;
                    None
                }
            }
        }
    }

    fn seek_start(&mut self) {
        self.offset = self.base;
        self.mask_offset = self.mask_base;
        if self.reverse {
            for d in 0..self.shape.len() {
                let last = self.shape[d] - 1;
                self.coord[d] = last;
                self.offset += last as isize * self.strides[d];
                self.mask_offset += last as isize * self.mask_strides[d];
            }
            self.position = self.size - 1;
        } else {
            self.coord.fill(0);
            self.position = 0;
        }
    }

    fn increment(&mut self) -> bool {
        for d in (0..self.shape.len()).rev() {
            if self.coord[d] + 1 < self.shape[d] {
                self.coord[d] += 1;
                self.offset += self.strides[d];
                self.mask_offset += self.mask_strides[d];
                self.position += 1;
                return true;
            }
            // Carry: rewind this dimension to 0.
            let back = self.coord[d] as isize;
            self.offset -= back * self.strides[d];
            self.mask_offset -= back * self.mask_strides[d];
            self.coord[d] = 0;
        }
        false
    }

    fn decrement(&mut self) -> bool {
        for d in (0..self.shape.len()).rev() {
            if self.coord[d] > 0 {
                self.coord[d] -= 1;
                self.offset -= self.strides[d];
                self.mask_offset -= self.mask_strides[d];
                self.position -= 1;
                return true;
            }
            // Borrow: wind this dimension to its last index.
            let last = self.shape[d] - 1;
            self.offset += last as isize * self.strides[d];
            self.mask_offset += last as isize * self.mask_strides[d];
            self.coord[d] = last;
        }
        false
    }

    pub(crate) fn coord(&self) -> &[usize] {
        &self.coord
    }

    pub(crate) fn offset(&self) -> usize {
        self.offset as usize
    }

    pub(crate) fn mask_offset(&self) -> usize {
        self.mask_offset as usize
    }
}

/// Mask-oblivious traversal of an access pattern.
///
/// Yields the data-buffer offset of each element in logical row-major
/// order; [`FlatIterator::coord`] returns the coordinate just visited.
/// To restart, create a new iterator.
#[derive(Debug, Clone)]
pub struct FlatIterator {
    cursor: Cursor,
}

impl FlatIterator {
    pub fn new(ap: &AccessPattern) -> Self {
        Self {
            cursor: Cursor::new(ap),
        }
    }

    /// Traverse from the last element backwards.
    pub fn reverse(mut self) -> Self {
        self.cursor.set_reverse();
        self
    }

    /// The coordinate of the element last yielded.
    pub fn coord(&self) -> &[usize] {
        self.cursor.coord()
    }
}

impl Iterator for FlatIterator {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        self.cursor.advance().map(|_| self.cursor.offset())
    }
}

/// The validity state of an element. Masked elements are invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Validity {
    Valid,
    Invalid,
}

impl Validity {
    fn matches(self, masked: bool) -> bool {
        match self {
            Validity::Valid => !masked,
            Validity::Invalid => masked,
        }
    }
}

impl std::ops::Not for Validity {
    type Output = Validity;

    fn not(self) -> Validity {
        match self {
            Validity::Valid => Validity::Invalid,
            Validity::Invalid => Validity::Valid,
        }
    }
}

/// Mask-aware traversal of one tensor.
///
/// The iterator holds a read guard on the tensor's mask buffer for
/// its whole lifetime; dropping it releases the guard. Writing the
/// same mask through another handle while an iterator is alive
/// deadlocks.
///
/// Positions returned by [`advance`](Self::advance) and the seek
/// methods are logical row-major indices into the tensor's shape.
pub struct MultIterator<'a> {
    cursor: Cursor,
    mask: RwLockReadGuard<'a, Vec<bool>>,
    last_mask_index: Option<usize>,
}

impl<'a> MultIterator<'a> {
    pub fn new<T: Element>(t: &'a Dense<T>) -> Self {
        Self {
            cursor: Cursor::new(t.info()),
            mask: t.mask_guard(),
            last_mask_index: None,
        }
    }

    /// Restarts the traversal at the last element, moving backwards.
    pub fn set_reverse(&mut self) {
        self.cursor.set_reverse();
        self.last_mask_index = None;
    }

    /// Moves to the next element, returning its position.
    pub fn advance(&mut self) -> Option<usize> {
        let position = self.cursor.advance()?;
        self.last_mask_index = (!self.mask.is_empty()).then(|| self.cursor.mask_offset());
        Some(position)
    }

    /// Advances to the next unmasked element.
    pub fn next_valid(&mut self) -> Option<usize> {
        self.seek(Validity::Valid)
    }

    /// Advances to the next masked element. Never matches when the
    /// tensor carries no mask.
    pub fn next_invalid(&mut self) -> Option<usize> {
        self.seek(Validity::Invalid)
    }

    /// Advances to the next element in the `wanted` state.
    pub fn seek(&mut self, wanted: Validity) -> Option<usize> {
        if wanted == Validity::Invalid && self.mask.is_empty() {
            self.cursor.exhaust();
            return None;
        }
        while let Some(position) = self.advance() {
            if wanted.matches(self.is_masked()) {
                return Some(position);
            }
        }
        None
    }

    /// Whether the current element is masked.
    pub fn is_masked(&self) -> bool {
        self.last_mask_index.is_some_and(|i| self.mask[i])
    }

    /// Mask-buffer index of the current element; `None` before the
    /// first advance or when the tensor carries no mask.
    pub fn last_mask_index(&self) -> Option<usize> {
        self.last_mask_index
    }

    /// Data-buffer offset of the current element.
    pub fn last_index(&self) -> usize {
        self.cursor.offset()
    }

    pub fn coord(&self) -> &[usize] {
        self.cursor.coord()
    }

    /// The guarded mask buffer, indexed by
    /// [`last_mask_index`](Self::last_mask_index).
    pub fn mask(&self) -> &[bool] {
        &self.mask
    }
}

impl Iterator for MultIterator<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        self.advance()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::Range;

    #[test]
    fn test_flat_iterator_row_major() {
        let ap = AccessPattern::row_major(vec![2, 3]);
        let mut it = FlatIterator::new(&ap);
        let mut coords = Vec::new();
        let mut offsets = Vec::new();
        while let Some(offset) = it.next() {
            offsets.push(offset);
            coords.push(it.coord().to_vec());
        }
        assert_eq!(offsets, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(coords[4], vec![1, 1]);
        assert_eq!(it.next(), None);
    }

    #[test]
    fn test_flat_iterator_strided() {
        let ap = AccessPattern::row_major(vec![2, 3]).transpose(&[1, 0]).unwrap();
        assert_eq!(FlatIterator::new(&ap).collect::<Vec<_>>(), vec![0, 3, 1, 4, 2, 5]);

        let ap = AccessPattern::row_major(vec![4, 5])
            .slice_into(&[Some(Range(0, None, 2)), Some(Range::new(1, 3))])
            .unwrap();
        assert_eq!(FlatIterator::new(&ap).collect::<Vec<_>>(), vec![1, 2, 11, 12]);
    }

    #[test]
    fn test_flat_iterator_reverse() {
        let ap = AccessPattern::row_major(vec![2, 2]);
        assert_eq!(
            FlatIterator::new(&ap).reverse().collect::<Vec<_>>(),
            vec![3, 2, 1, 0]
        );
    }

    #[test]
    fn test_flat_iterator_degenerate() {
        let scalar = AccessPattern::row_major(vec![]);
        assert_eq!(FlatIterator::new(&scalar).collect::<Vec<_>>(), vec![0]);
        let empty = AccessPattern::row_major(vec![3, 0]);
        assert_eq!(FlatIterator::new(&empty).count(), 0);
    }

    #[test]
    fn test_mult_iterator_unmasked() {
        let t = Dense::<u8>::new(vec![3]);
        let mut it = MultIterator::new(&t);
        assert_eq!(it.next_invalid(), None);
        assert_eq!(it.advance(), None);

        let mut it = MultIterator::new(&t);
        assert_eq!(it.next_valid(), Some(0));
        assert_eq!(it.last_mask_index(), None);
        assert_eq!(it.next_valid(), Some(1));
        assert_eq!(it.next_valid(), Some(2));
        assert_eq!(it.next_valid(), None);
    }

    #[test]
    fn test_mult_iterator_seeks() {
        let t = Dense::<u8>::new(vec![6])
            .with_mask(vec![true, false, false, true, true, false])
            .unwrap();
        let mut it = MultIterator::new(&t);
        assert_eq!(it.next_valid(), Some(1));
        assert_eq!(it.next_invalid(), Some(3));
        assert_eq!(it.last_mask_index(), Some(3));
        assert_eq!(it.next_valid(), Some(5));
        assert_eq!(it.next_invalid(), None);

        let mut it = MultIterator::new(&t);
        it.set_reverse();
        assert_eq!(it.next_valid(), Some(5));
        assert_eq!(it.next_invalid(), Some(4));
        assert_eq!(it.next_valid(), Some(2));
        assert_eq!(it.next_invalid(), Some(0));
        assert_eq!(it.next_valid(), None);
    }

    #[test]
    fn test_mult_iterator_broadcast_mask() {
        // Mask varies along the last dimension only.
        let t = Dense::<u8>::new(vec![2, 3, 2])
            .with_mask_dims(&[false, false, true])
            .unwrap()
            .with_mask(vec![true, false])
            .unwrap();
        let mut it = MultIterator::new(&t);
        let mut invalid = Vec::new();
        while let Some(p) = it.next_invalid() {
            assert_eq!(it.last_mask_index(), Some(0));
            invalid.push(p);
        }
        assert_eq!(invalid, vec![0, 2, 4, 6, 8, 10]);

        let mut it = MultIterator::new(&t);
        it.set_reverse();
        assert_eq!(it.next_invalid(), Some(10));
        assert_eq!(it.coord(), &[1, 2, 0]);
        assert_eq!(it.last_index(), 10);
    }

    #[test]
    fn test_mult_iterator_view_positions() {
        let t = Dense::<u8>::new(vec![4, 4])
            .with_mask((0..16).map(|i| i % 5 == 0).collect())
            .unwrap();
        // Rows 1..3, columns 1..3: elements 5, 6, 9, 10.
        let v = t
            .slice(&[Some(Range::new(1, 3)), Some(Range::new(1, 3))])
            .unwrap();
        let mut it = MultIterator::new(&v);
        assert_eq!(it.next_invalid(), Some(0));
        assert_eq!(it.last_index(), 5);
        assert_eq!(it.next_invalid(), Some(3));
        assert_eq!(it.last_index(), 10);
        assert_eq!(it.next_invalid(), None);
    }

    #[test]
    fn test_mult_iterator_reads_mask_through_guard() {
        let t = Dense::<u8>::new(vec![2, 2])
            .with_mask(vec![false, true, true, true])
            .unwrap();
        let mut it = MultIterator::new(&t);
        let mut seen = Vec::new();
        while it.advance().is_some() {
            let i = it.last_mask_index().unwrap();
            seen.push(it.mask()[i]);
        }
        assert_eq!(seen, vec![false, true, true, true]);
    }
}
