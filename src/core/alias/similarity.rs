//! String-similarity ratio for near-duplicate name detection
//!
//! Patient names arrive typed by hand, so the alias store warns when a new
//! name looks like a close misspelling of one it already holds. The ratio is
//! a normalized Levenshtein distance over lowercased input: 1.0 for equal
//! strings, 0.0 for completely disjoint ones.

/// Similarity ratio in `[0.0, 1.0]` between two names, case-insensitive.
pub fn ratio(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    if a == b {
        return 1.0;
    }
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let max_len = a_chars.len().max(b_chars.len());
    if max_len == 0 {
        return 1.0;
    }
    let distance = levenshtein(&a_chars, &b_chars);
    1.0 - (distance as f64 / max_len as f64)
}

/// Classic two-row Levenshtein edit distance.
fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr: Vec<usize> = vec![0; b.len() + 1];

    for (i, &ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_identical_names() {
        assert_eq!(ratio("Doe John", "Doe John"), 1.0);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(ratio("DOE JOHN", "doe john"), 1.0);
    }

    #[test]
    fn test_empty_strings() {
        assert_eq!(ratio("", ""), 1.0);
        assert_eq!(ratio("abc", ""), 0.0);
    }

    #[test_case("John Doe", "John Döe", true; "single substitution passes")]
    #[test_case("Smith^Jane", "Smith Jane", true; "separator difference passes")]
    #[test_case("John Doe", "Jane Smith", false; "different names fail")]
    fn test_threshold(a: &str, b: &str, passes: bool) {
        assert_eq!(ratio(a, b) >= 0.7, passes);
    }

    #[test]
    fn test_known_ratios() {
        // one edit over eight characters
        assert!((ratio("John Doe", "John Döe") - 0.875).abs() < 1e-9);
        // "abcd" vs "axyd": two substitutions over four characters
        assert!((ratio("abcd", "axyd") - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_symmetry() {
        assert_eq!(ratio("Garcia Maria", "Gracia Maria"), ratio("Gracia Maria", "Garcia Maria"));
    }
}
