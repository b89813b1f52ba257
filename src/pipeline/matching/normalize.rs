//! Clause label normalization and similarity scoring.

/// Canonical comparable form of a clause label: lower-cased, trimmed, and
/// stripped of everything except word characters and `.`.
///
/// Total and idempotent.
pub fn normalize(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '.')
        .collect()
}

/// Common-prefix ratio of two normalized labels, in `[0, 1]`.
///
/// Length of the shared leading run of characters divided by the length of
/// the longer string. Order-sensitive: `"8.2.1"` vs `"x8.2.1"` scores 0.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let shared = a
        .chars()
        .zip(b.chars())
        .take_while(|(x, y)| x == y)
        .count();
    let longest = a.chars().count().max(b.chars().count());
    shared as f64 / longest as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn strips_case_whitespace_and_punctuation() {
        assert_eq!(normalize("  Clause 8.2.1 "), "clause8.2.1");
        assert_eq!(normalize("§4.1(a)"), "4.1a");
        assert_eq!(normalize("A-1_b"), "a1_b");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn keeps_non_ascii_word_characters() {
        assert_eq!(normalize("제 5 조"), "제5조");
    }

    #[test]
    fn similarity_bounds() {
        assert_eq!(similarity("", "8.2"), 0.0);
        assert_eq!(similarity("8.2", ""), 0.0);
        assert_eq!(similarity("8.2.1", "8.2.1"), 1.0);
        assert_eq!(similarity("abc", "xyz"), 0.0);
    }

    #[test]
    fn similarity_is_common_prefix_over_longer() {
        // "10.1.2" vs "10.1.3": 5 shared of 6
        let s = similarity("10.1.2", "10.1.3");
        assert!((s - 5.0 / 6.0).abs() < 1e-9);
        assert_eq!(similarity("8.2.1", "x8.2.1"), 0.0);
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(s in "[a-zA-Z0-9 ._\\-/()§:,제조항]{0,40}") {
            let once = normalize(&s);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn similarity_stays_in_unit_range(a in "[a-z0-9.]{0,12}", b in "[a-z0-9.]{0,12}") {
            let s = similarity(&a, &b);
            prop_assert!((0.0..=1.0).contains(&s));
        }
    }
}
