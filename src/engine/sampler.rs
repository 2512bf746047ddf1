//! Random sampling for `/random`

use rand::Rng;

use crate::models::types::parse_leading_int;

/// Result of a sampling request
#[derive(Debug)]
pub struct Sample<'a, T> {
    pub items: Vec<&'a T>,
    /// The caller asked for more than the maximum
    pub exceeded_max: bool,
}

/// Resolve the raw `count` parameter into the number of items to return.
///
/// Absent, non-numeric, zero or negative requests fall back to `default`.
/// Returns the effective count and whether the request was above `max`.
pub fn resolve_count(raw: Option<&str>, default: usize, max: usize) -> (usize, bool) {
    let requested = raw.and_then(parse_leading_int);
    let max = max.max(1);

    match requested {
        Some(n) if n > 0 => {
            let exceeded = n > max as i64;
            let count = if exceeded { max } else { n as usize };
            (count, exceeded)
        }
        _ => (default.clamp(1, max), false),
    }
}

/// Uniform subset of `count` items via Fisher-Yates over a working copy of
/// references. `source` is left untouched.
pub fn sample_with<'a, T, R: Rng + ?Sized>(source: &'a [T], count: usize, rng: &mut R) -> Vec<&'a T> {
    let mut working: Vec<&T> = source.iter().collect();

    for i in (1..working.len()).rev() {
        let j = rng.gen_range(0..=i);
        working.swap(i, j);
    }

    working.truncate(count.min(source.len()));
    working
}

/// Sample `source` for a raw `count` parameter using the thread RNG.
pub fn sample<'a, T>(source: &'a [T], raw_count: Option<&str>, default: usize, max: usize) -> Sample<'a, T> {
    let (count, exceeded_max) = resolve_count(raw_count, default, max);
    Sample {
        items: sample_with(source, count, &mut rand::thread_rng()),
        exceeded_max,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn test_resolve_count_defaults() {
        assert_eq!(resolve_count(None, 100, 1000), (100, false));
        assert_eq!(resolve_count(Some("0"), 100, 1000), (100, false));
        assert_eq!(resolve_count(Some("-5"), 100, 1000), (100, false));
        assert_eq!(resolve_count(Some("lots"), 100, 1000), (100, false));
        assert_eq!(resolve_count(Some(""), 100, 1000), (100, false));
    }

    #[test]
    fn test_resolve_count_clamps() {
        assert_eq!(resolve_count(Some("7"), 100, 1000), (7, false));
        assert_eq!(resolve_count(Some("12abc"), 100, 1000), (12, false));
        assert_eq!(resolve_count(Some("1000"), 100, 1000), (1000, false));
        assert_eq!(resolve_count(Some("1001"), 100, 1000), (1000, true));
    }

    #[test]
    fn test_sample_is_subset_without_duplicates() {
        let source: Vec<u32> = (0..50).collect();
        let mut rng = StdRng::seed_from_u64(7);
        let picked = sample_with(&source, 20, &mut rng);

        assert_eq!(picked.len(), 20);
        let unique: HashSet<u32> = picked.iter().map(|v| **v).collect();
        assert_eq!(unique.len(), 20);
        assert!(unique.iter().all(|v| *v < 50));
        // Source order untouched
        assert_eq!(source, (0..50).collect::<Vec<u32>>());
    }

    #[test]
    fn test_sample_capped_by_available() {
        let source = vec!["a", "b", "c"];
        let mut rng = StdRng::seed_from_u64(1);
        let picked = sample_with(&source, 10, &mut rng);
        assert_eq!(picked.len(), 3);

        let empty: Vec<u8> = Vec::new();
        assert!(sample_with(&empty, 10, &mut rng).is_empty());
    }

    #[test]
    fn test_sample_reports_truncation() {
        let source: Vec<u32> = (0..2000).collect();
        let result = sample(&source, Some("5000"), 100, 1000);
        assert_eq!(result.items.len(), 1000);
        assert!(result.exceeded_max);

        let result = sample(&source, None, 100, 1000);
        assert_eq!(result.items.len(), 100);
        assert!(!result.exceeded_max);
    }

    #[test]
    fn test_shuffle_reaches_every_position() {
        let source: Vec<u32> = (0..5).collect();
        let mut rng = StdRng::seed_from_u64(42);
        let mut seen_first = HashSet::new();
        for _ in 0..500 {
            seen_first.insert(*sample_with(&source, 1, &mut rng)[0]);
        }
        assert_eq!(seen_first.len(), 5);
    }
}
