//! Dotted/bracketed path notation.
//!
//! Paths use the mixed form `a.b[0].c`. Bracket segments hold a list index,
//! an integer map key, or a quoted string key (`a['dotted.key']`).

use smol_str::SmolStr;

use crate::errors::{ConfigError, Result};

/// One step of a navigation path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathPart {
    /// A map key (string form).
    Key(SmolStr),
    /// A list index or integer map key.
    Index(i64),
}

/// Tokenize a path string into parts.
///
/// The empty string addresses the root and yields no parts.
pub fn parse_path(path: &str) -> Result<Vec<PathPart>> {
    let mut parts = Vec::new();
    let mut chars = path.char_indices().peekable();
    let mut expect_key = true;

    while let Some(&(at, ch)) = chars.peek() {
        match ch {
            '.' => {
                chars.next();
                if expect_key {
                    return Err(bad_path(path, at, "empty key segment"));
                }
                expect_key = true;
            }
            '[' => {
                chars.next();
                let part = parse_bracket(path, &mut chars)?;
                parts.push(part);
                expect_key = false;
            }
            ']' => return Err(bad_path(path, at, "unmatched ']'")),
            _ => {
                let start = at;
                let mut end = at;
                while let Some(&(i, c)) = chars.peek() {
                    if c == '.' || c == '[' || c == ']' {
                        break;
                    }
                    end = i + c.len_utf8();
                    chars.next();
                }
                if !expect_key {
                    return Err(bad_path(path, start, "expected '.' or '[' between keys"));
                }
                parts.push(PathPart::Key(SmolStr::new(&path[start..end])));
                expect_key = false;
            }
        }
    }
    if expect_key && !path.is_empty() {
        return Err(bad_path(path, path.len(), "trailing '.'"));
    }
    Ok(parts)
}

fn parse_bracket(
    path: &str,
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
) -> Result<PathPart> {
    // Quoted key?
    if let Some(&(_, quote)) = chars.peek() {
        if quote == '\'' || quote == '"' {
            chars.next();
            let mut key = String::new();
            loop {
                match chars.next() {
                    Some((_, c)) if c == quote => break,
                    Some((_, c)) => key.push(c),
                    None => return Err(bad_path(path, path.len(), "unterminated quoted key")),
                }
            }
            match chars.next() {
                Some((_, ']')) => return Ok(PathPart::Key(SmolStr::new(key))),
                Some((at, _)) => return Err(bad_path(path, at, "expected ']' after quoted key")),
                None => return Err(bad_path(path, path.len(), "expected ']' after quoted key")),
            }
        }
    }

    let mut body = String::new();
    loop {
        match chars.next() {
            Some((_, ']')) => break,
            Some((_, c)) => body.push(c),
            None => return Err(bad_path(path, path.len(), "unterminated '['")),
        }
    }
    if body.is_empty() {
        return Err(bad_path(path, path.len(), "empty bracket segment"));
    }
    match body.parse::<i64>() {
        Ok(i) => Ok(PathPart::Index(i)),
        Err(_) => Ok(PathPart::Key(SmolStr::new(body))),
    }
}

fn bad_path(path: &str, at: usize, message: &str) -> ConfigError {
    ConfigError::key(path, format!("invalid path ({message} at offset {at})"))
}

/// Append a part to a path buffer in canonical notation.
pub fn push_part(buf: &mut String, part: &PathPart) {
    match part {
        PathPart::Key(key) => {
            if !buf.is_empty() {
                buf.push('.');
            }
            buf.push_str(key);
        }
        PathPart::Index(i) => {
            buf.push('[');
            buf.push_str(&i.to_string());
            buf.push(']');
        }
    }
}

/// Format a part sequence back into path notation.
pub fn format_path(parts: &[PathPart]) -> String {
    let mut buf = String::new();
    for part in parts {
        push_part(&mut buf, part);
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_dotted() {
        let parts = parse_path("a.b.c").unwrap();
        assert_eq!(
            parts,
            vec![
                PathPart::Key("a".into()),
                PathPart::Key("b".into()),
                PathPart::Key("c".into()),
            ]
        );
    }

    #[test]
    fn test_mixed_notation() {
        let parts = parse_path("a.b[0].c").unwrap();
        assert_eq!(
            parts,
            vec![
                PathPart::Key("a".into()),
                PathPart::Key("b".into()),
                PathPart::Index(0),
                PathPart::Key("c".into()),
            ]
        );
    }

    #[test]
    fn test_quoted_bracket_key() {
        let parts = parse_path("a['dotted.key']").unwrap();
        assert_eq!(
            parts,
            vec![PathPart::Key("a".into()), PathPart::Key("dotted.key".into())]
        );
    }

    #[test]
    fn test_negative_index() {
        let parts = parse_path("xs[-1]").unwrap();
        assert_eq!(parts[1], PathPart::Index(-1));
    }

    #[test]
    fn test_empty_path_is_root() {
        assert!(parse_path("").unwrap().is_empty());
    }

    #[test]
    fn test_bad_paths() {
        assert!(parse_path("a..b").is_err());
        assert!(parse_path("a.").is_err());
        assert!(parse_path("a[1").is_err());
        assert!(parse_path("a]").is_err());
        assert!(parse_path("a[]").is_err());
    }

    #[test]
    fn test_round_trip() {
        let parts = parse_path("servers[2].host").unwrap();
        assert_eq!(format_path(&parts), "servers[2].host");
    }
}
