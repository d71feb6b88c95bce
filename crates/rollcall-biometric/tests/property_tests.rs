//! Property-based tests for template matching.
//!
//! These tests use proptest to generate random templates and verify the
//! matching rules hold for every input, not just hand-picked fixtures.

use proptest::prelude::*;
use rollcall_biometric::{ByteEqualityMatcher, TemplateMatcher, similarity};
use rollcall_core::Template;
use rollcall_core::constants::TEMPLATE_SIZE;

/// Strategy for generating raw 512-byte templates.
fn raw_template() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), TEMPLATE_SIZE)
}

/// Strategy for a set of byte positions large enough to push similarity
/// below 40% (at least 308 of 512 positions changed).
fn below_threshold_positions() -> impl Strategy<Value = Vec<usize>> {
    prop::sample::subsequence((0..TEMPLATE_SIZE).collect::<Vec<_>>(), 308..=TEMPLATE_SIZE)
}

/// Copy of `base` with every byte at `positions` changed.
fn mutate(base: &[u8], positions: &[usize]) -> Vec<u8> {
    let mut out = base.to_vec();
    for &p in positions {
        out[p] = out[p].wrapping_add(1);
    }
    out
}

proptest! {
    /// Property: With no enrolled templates there is never a match.
    #[test]
    fn prop_empty_store_never_matches(raw in raw_template()) {
        let probe = Template::from_bytes(&raw).unwrap();
        let candidates: Vec<(i64, Vec<u8>)> = Vec::new();
        prop_assert!(ByteEqualityMatcher::default().best_match(&probe, candidates).is_none());
    }

    /// Property: A stored template identical to the probe matches with score 100.
    #[test]
    fn prop_identical_template_scores_100(
        raw in raw_template(),
        others in prop::collection::vec(raw_template(), 0..5),
    ) {
        let probe = Template::from_bytes(&raw).unwrap();
        let mut candidates: Vec<(usize, Vec<u8>)> =
            others.into_iter().enumerate().map(|(i, t)| (i + 1, t)).collect();
        candidates.push((0, raw.clone()));

        let found = ByteEqualityMatcher::default().best_match(&probe, candidates).unwrap();
        prop_assert_eq!(found.score, 100.0);
        prop_assert_eq!(found.confidence(), 100);
        prop_assert_eq!(similarity(probe.as_bytes(), &raw), Some(100.0));
    }

    /// Property: If every stored template is below 40% similar, there is no
    /// match regardless of which one scores higher.
    #[test]
    fn prop_all_below_threshold_never_match(
        raw in raw_template(),
        a in below_threshold_positions(),
        b in below_threshold_positions(),
    ) {
        let probe = Template::from_bytes(&raw).unwrap();
        let candidates = vec![(1, mutate(&raw, &a)), (2, mutate(&raw, &b))];

        let matcher = ByteEqualityMatcher::default();
        prop_assert!(matcher.best_candidate(&probe, candidates.clone()).is_some());
        prop_assert!(matcher.best_match(&probe, candidates).is_none());
    }

    /// Property: Similarity is symmetric and bounded.
    #[test]
    fn prop_similarity_symmetric(a in raw_template(), b in raw_template()) {
        let ta = Template::from_bytes(&a).unwrap();
        let tb = Template::from_bytes(&b).unwrap();
        let ab = similarity(ta.as_bytes(), &b).unwrap();
        let ba = similarity(tb.as_bytes(), &a).unwrap();
        prop_assert_eq!(ab, ba);
        prop_assert!((0.0..=100.0).contains(&ab));
    }
}
