//! Fuzzy string scores on a 0-100 scale.
//!
//! Both scores compare lowercased text with normalized Levenshtein
//! similarity.

use strsim::normalized_levenshtein;

/// Longest keyword accepted for fuzzy matching.
pub const MAX_KEYWORD_CHARS: usize = 64;

/// Similarity of two whole strings.
pub fn ratio(a: &str, b: &str) -> f64 {
    let (a, b) = (a.to_lowercase(), b.to_lowercase());
    if a.is_empty() && b.is_empty() {
        return 100.0;
    }
    normalized_levenshtein(&a, &b) * 100.0
}

/// Best [`ratio`] of the shorter string against every same-length window of
/// the longer one.
///
/// Cost grows with the square of the shorter string, so callers should keep
/// it short (keywords are capped at [`MAX_KEYWORD_CHARS`]).
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };

    if short.is_empty() {
        return 0.0;
    }

    let needle: String = short.iter().collect();
    let mut candidate = String::with_capacity(needle.len());
    let mut best = 0.0f64;
    for window in long.windows(short.len()) {
        candidate.clear();
        candidate.extend(window);
        let score = normalized_levenshtein(&needle, &candidate) * 100.0;
        if score > best {
            best = score;
            if best >= 100.0 {
                break;
            }
        }
    }
    best
}

/// Best keyword score for a chunk: per-token [`ratio`] or whole-text
/// [`partial_ratio`], whichever is higher.
pub fn keyword_score(keyword: &str, text: &str) -> f64 {
    let token_best = text
        .split_whitespace()
        .map(|token| token.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|token| !token.is_empty())
        .map(|token| ratio(keyword, token))
        .fold(0.0f64, f64::max);

    token_best.max(partial_ratio(keyword, text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_ratio_values() {
        assert!(close(ratio("Mitochondria", "mitochondria"), 100.0));
        assert!(close(ratio("kitten", "sitting"), (1.0 - 3.0 / 7.0) * 100.0));
        assert!(close(ratio("abc", "xyz"), 0.0));
        assert!(close(ratio("", ""), 100.0));
    }

    #[test]
    fn test_partial_ratio_values() {
        assert!(close(partial_ratio("cat", "the cat sat"), 100.0));
        assert!(close(partial_ratio("the cat sat", "CAT"), 100.0));
        // "cot" against its best window "cat"
        assert!(close(partial_ratio("cot", "a cat"), (1.0 - 1.0 / 3.0) * 100.0));
        assert!(close(partial_ratio("", "anything"), 0.0));
        assert!(close(partial_ratio("énergie", "l'ÉNERGIE solaire"), 100.0));
    }

    #[test]
    fn test_keyword_score_ignores_punctuation() {
        assert!(close(
            keyword_score("mitochondria", "It lives in the mitochondria."),
            100.0
        ));
        assert!(keyword_score("mitocondria", "the mitochondria") > 90.0);
        assert!(keyword_score("photosynthesis", "Stars are far") < 70.0);
    }
}
