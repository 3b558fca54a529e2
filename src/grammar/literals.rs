//! Scalar literal parsing shared by the Element grammar and the coercion
//! table.

/// Parse a decimal integer literal with optional sign and underscore digit
/// separators (`1_000`). Underscores must sit between digits.
pub fn parse_int_literal(s: &str) -> Option<i64> {
    let digits = s.strip_prefix(['+', '-']).unwrap_or(s);
    if digits.is_empty() || !valid_underscores(digits) {
        return None;
    }
    if !digits.chars().all(|c| c.is_ascii_digit() || c == '_') {
        return None;
    }
    let cleaned: String = s.chars().filter(|&c| c != '_').collect();
    cleaned.parse().ok()
}

/// Parse a float literal: decimal, scientific, or the reserved tokens
/// `inf`/`-inf`/`nan` (case-insensitive). Underscore separators allowed
/// between digits.
pub fn parse_float_literal(s: &str) -> Option<f64> {
    let lower = s.to_ascii_lowercase();
    match lower.trim_start_matches(['+', '-']) {
        "inf" | "infinity" => {
            let v = f64::INFINITY;
            return Some(if lower.starts_with('-') { -v } else { v });
        }
        "nan" => return Some(f64::NAN),
        _ => {}
    }
    if s.contains('_') && !valid_underscores(s.trim_start_matches(['+', '-'])) {
        return None;
    }
    let cleaned: String = s.chars().filter(|&c| c != '_').collect();
    // Reject forms Rust accepts but the grammar does not spell this way.
    if cleaned.is_empty() || cleaned.ends_with(['e', 'E', '+', '-']) {
        return None;
    }
    cleaned.parse().ok()
}

/// Parse a strict boolean literal (`true`/`false`, case-insensitive).
pub fn parse_bool_literal(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Parse a boolean per the coercion table: additionally accepts
/// `on`/`off`/`yes`/`no` (case-insensitive).
pub fn parse_bool_relaxed(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" => Some(true),
        "false" | "off" | "no" => Some(false),
        _ => None,
    }
}

/// Check for the null literal (case-insensitive).
pub fn is_null_literal(s: &str) -> bool {
    s.eq_ignore_ascii_case("null")
}

/// Underscores only between digits: no leading/trailing underscore, no runs.
fn valid_underscores(s: &str) -> bool {
    let chars: Vec<char> = s.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if c == '_' {
            let prev_digit = i > 0 && chars[i - 1].is_ascii_digit();
            let next_digit = i + 1 < chars.len() && chars[i + 1].is_ascii_digit();
            if !prev_digit || !next_digit {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("0", 0)]
    #[case("-12", -12)]
    #[case("+7", 7)]
    #[case("1_000", 1000)]
    #[case("9_2_3", 923)]
    fn test_int_ok(#[case] src: &str, #[case] expected: i64) {
        assert_eq!(parse_int_literal(src), Some(expected));
    }

    #[rstest]
    #[case("")]
    #[case("_1")]
    #[case("1_")]
    #[case("1__0")]
    #[case("1.5")]
    #[case("abc")]
    #[case("0x10")]
    fn test_int_rejected(#[case] src: &str) {
        assert_eq!(parse_int_literal(src), None);
    }

    #[rstest]
    #[case("1.5", 1.5)]
    #[case("-0.25", -0.25)]
    #[case("1e3", 1000.0)]
    #[case("2.5E-1", 0.25)]
    #[case(".5", 0.5)]
    #[case("5.", 5.0)]
    #[case("1_000.5", 1000.5)]
    fn test_float_ok(#[case] src: &str, #[case] expected: f64) {
        assert_eq!(parse_float_literal(src), Some(expected));
    }

    #[test]
    fn test_float_reserved_tokens() {
        assert_eq!(parse_float_literal("inf"), Some(f64::INFINITY));
        assert_eq!(parse_float_literal("-INF"), Some(f64::NEG_INFINITY));
        assert!(parse_float_literal("NaN").unwrap().is_nan());
    }

    #[rstest]
    #[case("")]
    #[case("1e")]
    #[case("1e+")]
    #[case("abc")]
    #[case("1._5")]
    fn test_float_rejected(#[case] src: &str) {
        assert_eq!(parse_float_literal(src), None);
    }

    #[test]
    fn test_bools() {
        assert_eq!(parse_bool_literal("TRUE"), Some(true));
        assert_eq!(parse_bool_literal("on"), None);
        assert_eq!(parse_bool_relaxed("On"), Some(true));
        assert_eq!(parse_bool_relaxed("no"), Some(false));
        assert_eq!(parse_bool_relaxed("2"), None);
    }

    #[test]
    fn test_null() {
        assert!(is_null_literal("null"));
        assert!(is_null_literal("NULL"));
        assert!(!is_null_literal("nil"));
    }
}
