/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Property-based generators for shapes, masked tensors and range
//! lists.
//!
//! These strategies are used in `proptest`-based tests of the
//! reductions and region finders.
//!
//! Example usage:
//!
//! ```ignore
//! use proptest::prelude::*;
//!
//! use crate::strategy::gen_masked_tensor;
//!
//! proptest! {
//!     #[test]
//!     fn test_tensor(t in gen_masked_tensor(3, 4)) {
//!         // Reduce `t` along each axis.
//!     }
//! }
//! ```
//!
//! This module is only included in test builds (`#[cfg(test)]`).

use proptest::prelude::*;

use crate::access::AccessPattern;
use crate::dense::Dense;
use crate::range::Range;

/// Shapes of rank `1..=max_rank` with extents in `1..=max_extent`.
pub fn gen_shape(max_rank: usize, max_extent: usize) -> BoxedStrategy<Vec<usize>> {
    prop::collection::vec(1..=max_extent, 1..=max_rank).boxed()
}

/// Tensors with a random shape, a random choice of mask dimensions
/// and a random mask over them. When no dimension is chosen the
/// tensor is left unmasked.
pub fn gen_masked_tensor(max_rank: usize, max_extent: usize) -> BoxedStrategy<Dense<u8>> {
    gen_shape(max_rank, max_extent)
        .prop_flat_map(|shape| {
            let rank = shape.len();
            (Just(shape), prop::collection::vec(any::<bool>(), rank))
        })
        .prop_flat_map(|(shape, dims)| {
            let mask_size = AccessPattern::with_mask_dims(shape.clone(), &dims)
                .map(|ap| ap.mask_size())
                .unwrap_or(0);
            (
                Just(shape),
                Just(dims),
                prop::collection::vec(any::<bool>(), mask_size),
            )
        })
        .prop_map(|(shape, dims, mask)| {
            Dense::new(shape)
                .with_mask_dims(&dims)
                .and_then(|t| t.with_mask(mask))
                .unwrap()
        })
        .boxed()
}

/// Sorted, disjoint, non-adjacent, non-empty ranges within `0..len`.
pub fn gen_disjoint_ranges(len: usize) -> BoxedStrategy<Vec<Range>> {
    prop::collection::btree_set(0..=len, 0..=8)
        .prop_map(|bounds| {
            let bounds: Vec<_> = bounds.into_iter().collect();
            bounds
                .chunks_exact(2)
                .map(|pair| Range::new(pair[0], pair[1]))
                .collect()
        })
        .boxed()
}

mod tests {
    use proptest::test_runner::Config;
    use proptest::test_runner::TestRunner;

    use super::*;

    #[test]
    fn sample_many() {
        let mut runner = TestRunner::new(Config::default());

        for _ in 0..64 {
            let value = gen_masked_tensor(3, 4)
                .new_tree(&mut runner)
                .unwrap()
                .current();
            assert!(value.mask_data().is_empty() || value.mask_data().len() == value.mask_size());
        }
    }

    proptest! {
        #[test]
        fn ranges_are_disjoint(ranges in gen_disjoint_ranges(32)) {
            for pair in ranges.windows(2) {
                prop_assert!(pair[0].end().unwrap() < pair[1].start());
            }
            for r in &ranges {
                prop_assert!(!r.is_empty(32).unwrap());
            }
        }
    }
}
