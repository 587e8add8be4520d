//! Text utilities for recognized labels
//!
//! Edit-distance matching and the shape checks applied to recognizer output.

/// Levenshtein distance between two strings, counted in chars
pub fn edit_distance(a: &str, b: &str) -> usize {
    strsim::levenshtein(a, b)
}

/// Whether two texts are equal up to `max_distance` edits
pub fn fuzzy_eq(a: &str, b: &str, max_distance: usize) -> bool {
    if a == b {
        return true;
    }
    // Cheap reject: the length difference is a lower bound on the distance
    let len_a = a.chars().count();
    let len_b = b.chars().count();
    if len_a.abs_diff(len_b) > max_distance {
        return false;
    }
    edit_distance(a, b) <= max_distance
}

/// Trim and collapse internal whitespace runs to a single space
pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Number of non-whitespace characters
pub fn valid_char_count(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

pub fn has_alphanumeric(text: &str) -> bool {
    text.chars().any(|c| c.is_alphanumeric())
}

pub fn has_letter_or_digit(text: &str) -> bool {
    text.chars().any(|c| c.is_alphabetic() || c.is_ascii_digit())
}

/// Share of characters that are alphanumeric (0.0 for empty text)
pub fn alphanumeric_ratio(text: &str) -> f32 {
    let total = text.chars().count();
    if total == 0 {
        return 0.0;
    }
    let alnum = text.chars().filter(|c| c.is_alphanumeric()).count();
    alnum as f32 / total as f32
}

/// Format check applied to recognized text for classes that do not go
/// through the fast path.
pub trait TextShapeValidator: Send + Sync {
    fn is_valid(&self, text: &str) -> bool;
}

/// Default validator for breaker model numbers such as `BJA36050` or `QO120`.
///
/// Accepts 4-16 characters from `[A-Z0-9-/ ]`, requiring at least one letter
/// and one digit.
#[derive(Debug, Clone, Default)]
pub struct BreakerModelValidator;

impl TextShapeValidator for BreakerModelValidator {
    fn is_valid(&self, text: &str) -> bool {
        let len = text.chars().count();
        if !(4..=16).contains(&len) {
            return false;
        }

        let allowed = text
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || matches!(c, '-' | '/' | ' '));
        let has_letter = text.chars().any(|c| c.is_ascii_uppercase());
        let has_digit = text.chars().any(|c| c.is_ascii_digit());

        allowed && has_letter && has_digit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_distance_basics() {
        assert_eq!(edit_distance("", ""), 0);
        assert_eq!(edit_distance("abc", ""), 3);
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("BJA36050", "BJA360S0"), 1);
    }

    #[test]
    fn test_edit_distance_symmetric_and_reflexive() {
        let samples = ["", "A", "BJA36050", "BJA360S0", "QO120", "main 200A", "ÄBC"];
        for a in samples {
            assert_eq!(edit_distance(a, a), 0);
            for b in samples {
                assert_eq!(edit_distance(a, b), edit_distance(b, a), "{a:?} vs {b:?}");
            }
        }
    }

    #[test]
    fn test_fuzzy_eq() {
        assert!(fuzzy_eq("BJA36050", "BJA360S0", 2));
        assert!(fuzzy_eq("BJA36050", "BJA36050", 0));
        assert!(!fuzzy_eq("BJA36050", "QO120", 2));
        assert!(!fuzzy_eq("AB", "ABCDE", 2));
    }

    #[test]
    fn test_shape_helpers() {
        assert_eq!(normalize("  MAIN   200A \n"), "MAIN 200A");
        assert_eq!(valid_char_count(" a b "), 2);
        assert!(!has_alphanumeric("--//"));
        assert!(has_letter_or_digit("x-"));
        assert!((alphanumeric_ratio("AB--") - 0.5).abs() < 1e-6);
        assert_eq!(alphanumeric_ratio(""), 0.0);
    }

    #[test]
    fn test_breaker_model_validator() {
        let v = BreakerModelValidator;
        assert!(v.is_valid("BJA36050"));
        assert!(v.is_valid("QO120"));
        assert!(v.is_valid("THQL 2120"));
        assert!(!v.is_valid("ABCDEF"));
        assert!(!v.is_valid("12345"));
        assert!(!v.is_valid("bja36050"));
        assert!(!v.is_valid("A1"));
        assert!(!v.is_valid("BJA36050BJA36050X"));
    }
}
