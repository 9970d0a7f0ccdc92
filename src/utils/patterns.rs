/// Shared helpers for candidate filtering and pattern construction.
pub struct PatternUtils;

impl PatternUtils {
    /// Check if a string has minimum Shannon entropy (primary false-positive
    /// suppression for generic-looking tokens).
    pub fn has_min_entropy(s: &str, min_entropy: f64) -> bool {
        Self::shannon_entropy(s) >= min_entropy
    }

    /// Shannon entropy in bits per character.
    pub fn shannon_entropy(s: &str) -> f64 {
        use std::collections::HashMap;

        if s.is_empty() {
            return 0.0;
        }

        let mut char_counts = HashMap::new();
        for c in s.chars() {
            *char_counts.entry(c).or_insert(0usize) += 1;
        }

        let len = s.chars().count() as f64;
        let mut entropy = 0.0;
        for count in char_counts.values() {
            let p = (*count as f64) / len;
            entropy -= p * p.log2();
        }

        entropy
    }
}

/// Build a regex prefix requiring one of `keywords` within 40 characters
/// before the secret group, to anchor generic-shaped tokens to provider
/// context.
pub fn prefix_regex(keywords: &[&str]) -> String {
    format!(r"(?i:{})(?:.|[\n\r]){{0,40}}?", keywords.join("|"))
}

const FALSE_POSITIVE_WORDS: &[&str] = &[
    "example",
    "sample",
    "placeholder",
    "password",
    "changeme",
    "deadbeef",
    "xxxxxxxx",
    "00000000",
];

/// Default false-positive check shared by detectors that don't override it.
pub fn is_common_false_positive(raw: &str) -> bool {
    let lower = raw.to_lowercase();
    FALSE_POSITIVE_WORDS.iter().any(|w| lower.contains(w))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entropy_calculation() {
        // Low entropy (all same character)
        assert!(PatternUtils::shannon_entropy("aaaaaaa") < 1.0);

        // High entropy (random-looking)
        assert!(PatternUtils::shannon_entropy("aB3xY9zQ2m") > 3.0);

        assert_eq!(PatternUtils::shannon_entropy(""), 0.0);
    }

    #[test]
    fn test_min_entropy_threshold() {
        assert!(PatternUtils::has_min_entropy("oykKBEq2KRySU33OxizNkOir5PgHpMLv", 4.0));
        assert!(!PatternUtils::has_min_entropy("aaaabbbbccccdddd", 4.0));
    }

    #[test]
    fn test_prefix_regex_matches_nearby_keyword() {
        let pattern = regex::Regex::new(&(prefix_regex(&["gitlab"]) + r"\b([a-z0-9]{20})\b")).unwrap();
        assert!(pattern.is_match("GITLAB_TOKEN = abcdef0123456789abcd"));
        assert!(!pattern.is_match("other_token = abcdef0123456789abcd"));
    }

    #[test]
    fn test_common_false_positives() {
        assert!(is_common_false_positive("ExampleKey1234567890"));
        assert!(!is_common_false_positive("oykKBEq2KRySU33OxizN"));
    }
}
