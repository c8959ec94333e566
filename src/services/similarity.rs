// Lexical Similarity
// Bag-of-words overlap used by adapters to judge remote snippets locally.
// Downstream acceptance thresholds (0.3, 0.4) are tuned against this exact metric.

use std::collections::HashSet;

fn token_set(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .filter(|t| t.chars().count() > 3)
        .map(str::to_string)
        .collect()
}

/// Tokens of `a` found in `b`, over the larger token-set size. Always in [0, 1].
pub fn similarity(a: &str, b: &str) -> f64 {
    let left = token_set(a);
    let right = token_set(b);
    let denom = left.len().max(right.len());
    if denom == 0 {
        return 0.0;
    }
    let shared = left.iter().filter(|t| right.contains(*t)).count();
    shared as f64 / denom as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_text_scores_one() {
        let s = "Mitochondria produce energy inside cells";
        assert_eq!(similarity(s, s), 1.0);
    }

    #[test]
    fn test_short_tokens_are_ignored() {
        assert_eq!(similarity("a an the of", "a an the of"), 0.0);
        assert_eq!(similarity("", "anything here"), 0.0);
    }

    #[test]
    fn test_divides_by_larger_set() {
        // left {quick, brown}, right {quick, brown, jumps, over}
        let score = similarity("the quick brown fox", "quick brown fox jumps over");
        assert!((score - 0.5).abs() < 1e-9);
        assert_eq!(score, similarity("quick brown fox jumps over", "the quick brown fox"));
    }

    #[test]
    fn test_case_and_repetition() {
        assert_eq!(similarity("Energy ENERGY energy", "energy"), 1.0);
        let score = similarity("Photosynthesis converts sunlight", "nothing related whatsoever");
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_range() {
        let pairs = [
            ("alpha beta gamma delta", "beta delta epsilon"),
            ("single", "single single words"),
            ("punctuation, matters.", "punctuation matters"),
        ];
        for (a, b) in pairs {
            let s = similarity(a, b);
            assert!((0.0..=1.0).contains(&s), "{} vs {} -> {}", a, b, s);
        }
    }
}
