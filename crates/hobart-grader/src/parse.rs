//! Score extraction from grader response pages.
//!
//! The service answers submissions with a human-readable page rather
//! than structured JSON. Somewhere in it, a successful grading carries
//! `<label> = <decimal>`. Parsing is isolated here so the transport
//! layer never has to guess about page formats.

/// Scan `body` for a decimal following `label = `.
///
/// Whitespace around the equals sign is tolerated, as is trailing
/// punctuation after the number (a sentence-ending dot, a comma). Every
/// occurrence of the label is tried in order; the first one followed by
/// a parsable number wins. No usable number means `None`.
pub fn parse_score(body: &str, label: &str) -> Option<f64> {
    if label.is_empty() {
        return None;
    }
    let mut rest = body;
    while let Some(pos) = rest.find(label) {
        let after = &rest[pos + label.len()..];
        if let Some(value) = number_after_equals(after) {
            return Some(value);
        }
        rest = after;
    }
    None
}

fn number_after_equals(after: &str) -> Option<f64> {
    let rest = after.trim_start().strip_prefix('=')?.trim_start();
    let token = rest.split_whitespace().next()?;
    let token = token.trim_end_matches(|c: char| !c.is_ascii_digit());
    token.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_label() {
        assert_eq!(parse_score("your score = 0.5321 today", "score"), Some(0.5321));
    }

    #[test]
    fn test_whitespace_variants() {
        assert_eq!(parse_score("score=0.1", "score"), Some(0.1));
        assert_eq!(parse_score("score   =   0.1", "score"), Some(0.1));
        assert_eq!(parse_score("score =\n0.25", "score"), Some(0.25));
    }

    #[test]
    fn test_trailing_punctuation_trimmed() {
        assert_eq!(parse_score("Final score = 0.5.", "score"), Some(0.5));
        assert_eq!(parse_score("score = 42, thanks", "score"), Some(42.0));
    }

    #[test]
    fn test_negative_and_integer_values() {
        assert_eq!(parse_score("score = -0.03", "score"), Some(-0.03));
        assert_eq!(parse_score("score = 1", "score"), Some(1.0));
    }

    #[test]
    fn test_label_absent() {
        assert_eq!(parse_score("thanks for your submission", "score"), None);
    }

    #[test]
    fn test_garbage_after_equals() {
        assert_eq!(parse_score("score = pending", "score"), None);
        assert_eq!(parse_score("score = ", "score"), None);
    }

    #[test]
    fn test_later_occurrence_recovers() {
        // The first mention has no number; the second does.
        let body = "score pending... final score = 0.7";
        assert_eq!(parse_score(body, "score"), Some(0.7));
    }

    #[test]
    fn test_custom_label() {
        assert_eq!(parse_score("accuracy = 0.9", "accuracy"), Some(0.9));
        assert_eq!(parse_score("accuracy = 0.9", "score"), None);
    }

    #[test]
    fn test_empty_label_never_matches() {
        assert_eq!(parse_score("= 0.5", ""), None);
    }
}
