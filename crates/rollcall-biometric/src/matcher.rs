//! Template similarity and best-match search.

use rollcall_core::Template;
use rollcall_core::constants::{MATCH_THRESHOLD_PERCENT, TEMPLATE_SIZE};
use tracing::trace;

/// Best candidate found for a probe template.
#[derive(Debug, Clone, PartialEq)]
pub struct Match<K> {
    /// Caller-supplied identifier of the matched candidate.
    pub key: K,
    /// Similarity in percent (0.0 to 100.0).
    pub score: f64,
}

impl<K> Match<K> {
    /// Score rounded to a whole percentage, as recorded on attendance.
    #[must_use]
    pub fn confidence(&self) -> i64 {
        self.score.round() as i64
    }
}

/// Percentage of byte positions at which `candidate` equals `probe`.
///
/// Returns `None` when the candidate is not a full 512-byte template.
///
/// # Examples
///
/// ```
/// use rollcall_biometric::similarity;
///
/// let a = [1u8; 512];
/// let mut b = [1u8; 512];
/// b[..256].fill(0);
/// assert_eq!(similarity(&a, &b), Some(50.0));
/// assert_eq!(similarity(&a, &b[..10]), None);
/// ```
#[must_use]
pub fn similarity(probe: &[u8; TEMPLATE_SIZE], candidate: &[u8]) -> Option<f64> {
    if candidate.len() != TEMPLATE_SIZE {
        return None;
    }
    let equal = probe
        .iter()
        .zip(candidate)
        .filter(|(a, b)| a == b)
        .count();
    Some(equal as f64 / TEMPLATE_SIZE as f64 * 100.0)
}

/// Strategy for scoring fingerprint templates against each other.
///
/// The search itself is shared: candidates are visited in the order the
/// caller supplies them, and a later candidate only replaces the current
/// best with a strictly higher score. Equal scores therefore resolve to the
/// earliest candidate.
pub trait TemplateMatcher: Send + Sync {
    /// Similarity of `candidate` to `probe` in percent, or `None` if the
    /// candidate cannot be compared.
    fn score(&self, probe: &Template, candidate: &[u8]) -> Option<f64>;

    /// Minimum score for a candidate to be accepted.
    fn threshold(&self) -> f64;

    /// Highest-scoring candidate regardless of the threshold.
    fn best_candidate<K, I, T>(&self, probe: &Template, candidates: I) -> Option<Match<K>>
    where
        I: IntoIterator<Item = (K, T)>,
        T: AsRef<[u8]>,
    {
        let mut best: Option<Match<K>> = None;
        for (key, template) in candidates {
            let Some(score) = self.score(probe, template.as_ref()) else {
                trace!(len = template.as_ref().len(), "skipping malformed template");
                continue;
            };
            if best.as_ref().is_none_or(|b| score > b.score) {
                best = Some(Match { key, score });
            }
        }
        best
    }

    /// Highest-scoring candidate, if it reaches the threshold.
    fn best_match<K, I, T>(&self, probe: &Template, candidates: I) -> Option<Match<K>>
    where
        I: IntoIterator<Item = (K, T)>,
        T: AsRef<[u8]>,
    {
        self.best_candidate(probe, candidates)
            .filter(|m| m.score >= self.threshold())
    }
}

/// Byte-position equality matcher used by deployed scanners
#[derive(Debug, Clone, Copy)]
pub struct ByteEqualityMatcher {
    threshold: f64,
}

impl ByteEqualityMatcher {
    /// Create a matcher with a custom acceptance threshold (percent).
    #[must_use]
    pub fn with_threshold(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl Default for ByteEqualityMatcher {
    fn default() -> Self {
        Self {
            threshold: MATCH_THRESHOLD_PERCENT,
        }
    }
}

impl TemplateMatcher for ByteEqualityMatcher {
    fn score(&self, probe: &Template, candidate: &[u8]) -> Option<f64> {
        similarity(probe.as_bytes(), candidate)
    }

    fn threshold(&self) -> f64 {
        self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn template(fill: u8) -> Template {
        Template::from_bytes(&[fill; TEMPLATE_SIZE]).unwrap()
    }

    /// Copy of `base` with the first `n` bytes changed.
    fn differing_in(base: u8, n: usize) -> Vec<u8> {
        let mut bytes = vec![base; TEMPLATE_SIZE];
        for b in bytes.iter_mut().take(n) {
            *b = base.wrapping_add(1);
        }
        bytes
    }

    #[rstest]
    #[case(0, 100.0)]
    #[case(256, 50.0)]
    #[case(512, 0.0)]
    fn test_similarity_counts_equal_positions(#[case] changed: usize, #[case] expected: f64) {
        let probe = [9u8; TEMPLATE_SIZE];
        assert_eq!(similarity(&probe, &differing_in(9, changed)), Some(expected));
    }

    #[test]
    fn test_similarity_is_bytewise_not_bitwise() {
        // 0x00 vs 0x01 differ in one bit but count as a full mismatch
        let probe = [0u8; TEMPLATE_SIZE];
        assert_eq!(similarity(&probe, &[1u8; TEMPLATE_SIZE]), Some(0.0));
    }

    #[test]
    fn test_no_candidates_no_match() {
        let matcher = ByteEqualityMatcher::default();
        let none: Vec<(i64, Vec<u8>)> = Vec::new();
        assert!(matcher.best_match(&template(1), none).is_none());
    }

    #[test]
    fn test_threshold_is_inclusive() {
        // 205 of 512 equal bytes is 40.04%, 204 is 39.84%
        let matcher = ByteEqualityMatcher::default();
        let accepted = differing_in(3, TEMPLATE_SIZE - 205);
        let rejected = differing_in(3, TEMPLATE_SIZE - 204);

        assert!(matcher.best_match(&template(3), vec![(1, accepted)]).is_some());
        assert!(matcher.best_match(&template(3), vec![(1, rejected)]).is_none());
    }

    #[test]
    fn test_best_candidate_wins() {
        let matcher = ByteEqualityMatcher::default();
        let candidates = vec![
            (1, differing_in(5, 200)),
            (2, differing_in(5, 10)),
            (3, differing_in(5, 100)),
        ];
        let found = matcher.best_match(&template(5), candidates).unwrap();
        assert_eq!(found.key, 2);
    }

    #[test]
    fn test_tie_resolves_to_first_candidate() {
        let matcher = ByteEqualityMatcher::default();
        let candidates = vec![(10, differing_in(5, 50)), (11, differing_in(5, 50))];
        assert_eq!(matcher.best_match(&template(5), candidates).unwrap().key, 10);
    }

    #[test]
    fn test_malformed_candidates_are_skipped() {
        let matcher = ByteEqualityMatcher::default();
        let candidates = vec![(1, vec![5u8; 511]), (2, vec![5u8; TEMPLATE_SIZE])];
        let found = matcher.best_match(&template(5), candidates).unwrap();
        assert_eq!(found.key, 2);
        assert_eq!(found.confidence(), 100);
    }

    #[test]
    fn test_best_candidate_ignores_threshold() {
        let matcher = ByteEqualityMatcher::with_threshold(90.0);
        let candidates = vec![(1, differing_in(2, 256))];
        let best = matcher.best_candidate(&template(2), candidates.clone()).unwrap();
        assert_eq!(best.score, 50.0);
        assert!(matcher.best_match(&template(2), candidates).is_none());
    }

    #[test]
    fn test_confidence_rounds() {
        let m = Match { key: (), score: 40.04 };
        assert_eq!(m.confidence(), 40);
        let m = Match { key: (), score: 79.5 };
        assert_eq!(m.confidence(), 80);
    }
}
