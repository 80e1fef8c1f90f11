/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Runs of masked and unmasked elements.
//!
//! All functions here work on the tensor flattened in logical
//! row-major order, so positions and ranges index into
//! `0..t.size()` regardless of the underlying strides.

use crate::config;
use crate::dense::Dense;
use crate::dense::Element;
use crate::iter::MultIterator;
use crate::iter::Validity;
use crate::range::Range;

// Maximal runs of elements in the `wanted` state, as half-open
// ranges in ascending order.
fn runs<T: Element>(t: &Dense<T>, wanted: Validity) -> Vec<Range> {
    let mut runs = Vec::with_capacity(config::global::get().region_capacity);
    let mut it = MultIterator::new(t);
    while let Some(start) = it.seek(wanted) {
        let end = it.seek(!wanted).unwrap_or(t.size());
        runs.push(Range::new(start, end));
    }
    tracing::trace!(?wanted, runs = runs.len(), "found contiguous runs");
    runs
}

// First and last position in the `wanted` state.
fn edges<T: Element>(t: &Dense<T>, wanted: Validity) -> Option<(usize, usize)> {
    let first = MultIterator::new(t).seek(wanted)?;
    let mut backward = MultIterator::new(t);
    backward.set_reverse();
    let last = backward.seek(wanted)?;
    Some((first, last))
}

impl<T: Element> Dense<T> {
    /// The maximal runs of unmasked elements. An unmasked tensor is
    /// one run covering everything.
    pub fn flat_not_masked_contiguous(&self) -> Vec<Range> {
        runs(self, Validity::Valid)
    }

    /// The maximal runs of masked elements.
    pub fn flat_masked_contiguous(&self) -> Vec<Range> {
        runs(self, Validity::Invalid)
    }

    /// Same as [`Dense::flat_not_masked_contiguous`].
    pub fn clump_unmasked(&self) -> Vec<Range> {
        self.flat_not_masked_contiguous()
    }

    /// Same as [`Dense::flat_masked_contiguous`].
    pub fn clump_masked(&self) -> Vec<Range> {
        self.flat_masked_contiguous()
    }

    /// Positions of the first and last unmasked elements, or `None`
    /// if there are none.
    pub fn flat_not_masked_edges(&self) -> Option<(usize, usize)> {
        if !self.is_masked() {
            return self.unmasked_edges();
        }
        edges(self, Validity::Valid)
    }

    /// Positions of the first and last masked elements, or `None` if
    /// there are none. An unmasked tensor reports its full extent.
    pub fn flat_masked_edges(&self) -> Option<(usize, usize)> {
        if !self.is_masked() {
            return self.unmasked_edges();
        }
        edges(self, Validity::Invalid)
    }

    fn unmasked_edges(&self) -> Option<(usize, usize)> {
        self.size().checked_sub(1).map(|last| (0, last))
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::strategy::gen_disjoint_ranges;

    // A (1, n) tensor whose elements in `ranges` are unmasked and all
    // others masked.
    fn seeded(n: usize, ranges: &[Range]) -> Dense<f64> {
        let mut t = Dense::new(vec![1, n]);
        t.reset_mask(true).unwrap();
        for &r in ranges {
            t.slice(&[None, Some(r)]).unwrap().reset_mask(false).unwrap();
        }
        t
    }

    #[test]
    fn test_runs() {
        let valid = [
            Range::new(3, 9),
            Range::new(14, 27),
            Range::new(51, 72),
            Range::new(93, 100),
        ];
        let t = seeded(100, &valid);
        assert_eq!(t.flat_not_masked_contiguous(), valid);
        assert_eq!(t.clump_unmasked(), valid);
        assert_eq!(
            t.flat_masked_contiguous(),
            vec![
                Range::new(0, 3),
                Range::new(9, 14),
                Range::new(27, 51),
                Range::new(72, 93),
            ]
        );
        assert_eq!(t.clump_masked(), t.flat_masked_contiguous());
        assert_eq!(t.flat_not_masked_edges(), Some((3, 99)));
        assert_eq!(t.flat_masked_edges(), Some((0, 92)));
    }

    #[test]
    fn test_unmasked() {
        let t = Dense::<u8>::new(vec![2, 5]);
        assert_eq!(t.flat_not_masked_contiguous(), vec![Range::new(0, 10)]);
        assert!(t.flat_masked_contiguous().is_empty());
        assert_eq!(t.flat_not_masked_edges(), Some((0, 9)));
        assert_eq!(t.flat_masked_edges(), Some((0, 9)));

        let empty = Dense::<u8>::new(vec![3, 0]);
        assert!(empty.flat_not_masked_contiguous().is_empty());
        assert_eq!(empty.flat_not_masked_edges(), None);
        assert_eq!(empty.flat_masked_edges(), None);
    }

    #[test]
    fn test_fully_masked() {
        let mut t = Dense::<u8>::new(vec![6]);
        t.reset_mask(true).unwrap();
        assert!(t.flat_not_masked_contiguous().is_empty());
        assert_eq!(t.flat_masked_contiguous(), vec![Range::new(0, 6)]);
        assert_eq!(t.flat_not_masked_edges(), None);
        assert_eq!(t.flat_masked_edges(), Some((0, 5)));
    }

    #[test]
    fn test_runs_on_transposed_tensor() {
        let mut t = Dense::<u8>::new(vec![2, 3])
            .with_mask(vec![true, true, true, false, false, false])
            .unwrap();
        t.transpose(&[1, 0]).unwrap();
        assert_eq!(
            t.flat_masked_contiguous(),
            vec![Range::new(0, 1), Range::new(2, 3), Range::new(4, 5)]
        );
        assert_eq!(t.flat_not_masked_edges(), Some((1, 5)));
    }

    proptest! {
        #[test]
        fn seeded_ranges_come_back((n, valid) in (1usize..64).prop_flat_map(|n| (Just(n), gen_disjoint_ranges(n)))) {
            let t = seeded(n, &valid);
            prop_assert_eq!(t.flat_not_masked_contiguous(), valid.clone());

            let expected = valid.first().zip(valid.last()).map(|(first, last)| {
                (first.start(), last.end().unwrap_or(n) - 1)
            });
            prop_assert_eq!(t.flat_not_masked_edges(), expected);
        }
    }
}
