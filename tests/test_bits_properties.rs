//! Property-based tests for the bit utilities

use bitmend::bits::{bitdist, diff_positions, frames};
use proptest::collection::vec;
use proptest::prelude::*;

fn same_len_triple() -> impl Strategy<Value = (Vec<u8>, Vec<u8>, Vec<u8>)> {
    (0usize..48).prop_flat_map(|n| {
        (
            vec(any::<u8>(), n),
            vec(any::<u8>(), n),
            vec(any::<u8>(), n),
        )
    })
}

proptest! {
    #[test]
    fn bitdist_zero_on_self(a in vec(any::<u8>(), 0..48)) {
        prop_assert_eq!(bitdist(&a, &a), 0);
    }

    #[test]
    fn bitdist_symmetric((a, b, _) in same_len_triple()) {
        prop_assert_eq!(bitdist(&a, &b), bitdist(&b, &a));
    }

    #[test]
    fn bitdist_triangle_inequality((a, b, c) in same_len_triple()) {
        prop_assert!(bitdist(&a, &c) <= bitdist(&a, &b) + bitdist(&b, &c));
    }

    #[test]
    fn bitdist_counts_diff_positions((a, b, _) in same_len_triple()) {
        prop_assert_eq!(bitdist(&a, &b), diff_positions(&a, &b).len() as u64);
    }

    #[test]
    fn diff_positions_strictly_ascending((a, b, _) in same_len_triple()) {
        let positions = diff_positions(&a, &b);
        prop_assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn frames_pattern_count(width in 1u32..14) {
        let expected = if width <= 2 { 1 } else { 1u64 << (width - 2) };
        prop_assert_eq!(frames(width).count() as u64, expected);
    }

    #[test]
    fn frames_patterns_have_exact_width(width in 1u32..14) {
        for pattern in frames(width) {
            prop_assert_eq!(pattern & 1, 1);
            prop_assert_eq!(64 - pattern.leading_zeros(), width);
        }
    }

    #[test]
    fn frames_distinct_widths_disjoint(a in 1u32..14, b in 1u32..14) {
        prop_assume!(a != b);
        let patterns: Vec<u64> = frames(a).collect();
        for pattern in frames(b) {
            prop_assert!(!patterns.contains(&pattern));
        }
    }
}
