//! New-vs-duplicate decision for canonical plates.

use crate::registry::VehicleId;

/// Fraction of positions holding the same character. Plates of different
/// length never resemble each other.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let matches = a.bytes().zip(b.bytes()).filter(|(x, y)| x == y).count();
    matches as f64 / a.len() as f64
}

/// Finds which registered vehicle, if any, a canonical plate belongs to.
#[derive(Debug, Clone, Copy)]
pub struct SimilarityMatcher {
    threshold: f64,
}

impl SimilarityMatcher {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Best registered plate at or above the threshold. `registered` must be
    /// ordered by ascending id: on equal similarity the earlier vehicle wins.
    pub fn best_match<'a, I>(&self, candidate: &str, registered: I) -> Option<VehicleId>
    where
        I: IntoIterator<Item = (VehicleId, &'a str)>,
    {
        let mut best: Option<(VehicleId, f64)> = None;
        for (id, plate) in registered {
            let score = similarity(candidate, plate);
            if score < self.threshold {
                continue;
            }
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((id, score)),
            }
        }
        best.map(|(id, _)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_similarity() {
        assert_relative_eq!(similarity("DL01AB1234", "DL01AB1234"), 1.0);
        assert_relative_eq!(similarity("DL01AB1234", "DL01AB1299"), 0.8);
        assert_relative_eq!(similarity("DL7CM3702", "DL07CM3702"), 0.0);
        assert_relative_eq!(similarity("", ""), 0.0);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let matcher = SimilarityMatcher::new(0.8);
        let registered = vec![(1, "DL01AB1234")];
        assert_eq!(matcher.best_match("DL01AB1299", registered.clone()), Some(1));
        assert_eq!(matcher.best_match("DL01AB9999", registered), None);
    }

    #[test]
    fn test_length_gate() {
        // the 9-char plate is a prefix-shift of the 10-char one
        let matcher = SimilarityMatcher::new(0.5);
        let registered = vec![(1, "DL07CM3702")];
        assert_eq!(matcher.best_match("DL7CM3702", registered), None);
    }

    #[test]
    fn test_highest_similarity_wins() {
        let matcher = SimilarityMatcher::new(0.8);
        let registered = vec![(1, "DL01AB1299"), (2, "DL01AB1239")];
        assert_eq!(matcher.best_match("DL01AB1234", registered), Some(2));
    }

    #[test]
    fn test_tie_goes_to_lowest_id() {
        let matcher = SimilarityMatcher::new(0.8);
        let registered = vec![(1, "DL01AB1235"), (2, "DL01AB1236"), (3, "DL01AB1237")];
        assert_eq!(matcher.best_match("DL01AB1234", registered), Some(1));
    }

    #[test]
    fn test_empty_registry() {
        let matcher = SimilarityMatcher::new(0.8);
        assert_eq!(matcher.best_match("DL01AB1234", Vec::new()), None);
    }
}
