//! Extraction of object and array literals embedded in page and script text
//!
//! Regular expressions cannot balance nested delimiters of unbounded depth, so
//! the bounds of a literal are found with a small context stack instead.

use crate::error::RtubeError;
use serde_json::Value;
use tracing::debug;

fn context_closer(context: u8) -> u8 {
    match context {
        b'{' => b'}',
        b'[' => b']',
        _ => b'"',
    }
}

/// Find the literal starting at `start` and return its full text.
///
/// `text[start..]` must begin with `{` or `[`. Braces and brackets inside
/// double-quoted strings do not count towards nesting, and a backslash inside
/// a string escapes exactly one following character.
pub fn find_object_bounds(text: &str, start: usize) -> Result<&str, RtubeError> {
    let rest = text.get(start..).ok_or_else(|| {
        RtubeError::MalformedInput(format!("invalid start point {}", start))
    })?;

    let bytes = text.as_bytes();
    let first = match rest.as_bytes().first() {
        Some(&b) if b == b'{' || b == b'[' => b,
        _ => {
            let preview: String = rest.chars().take(20).collect();
            return Err(RtubeError::MalformedInput(format!(
                "invalid start point, text begins with: {:?}",
                preview
            )));
        }
    };

    let mut stack = vec![first];
    let mut i = start + 1;

    while let Some(&context) = stack.last() {
        if i >= bytes.len() {
            return Err(RtubeError::MalformedInput(format!(
                "unterminated object starting at {}",
                start
            )));
        }

        let current = bytes[i];
        if current == context_closer(context) {
            stack.pop();
            i += 1;
            continue;
        }

        if context == b'"' {
            if current == b'\\' {
                i += 2;
                continue;
            }
        } else if matches!(current, b'{' | b'[' | b'"') {
            stack.push(current);
        }

        i += 1;
    }

    Ok(&text[start..i])
}

/// Extract the literal starting at `start` and parse it into a JSON value.
///
/// Strict JSON is tried first. Literals that only differ from JSON at the value
/// level (single-quoted strings, trailing commas, `True`/`False`/`None`,
/// `undefined`) are accepted through a permissive rewrite. Unquoted keys are not.
pub fn parse_object(text: &str, start: usize) -> Result<Value, RtubeError> {
    let raw = find_object_bounds(text, start)?;

    match serde_json::from_str(raw) {
        Ok(value) => Ok(value),
        Err(strict_error) => {
            debug!("Strict JSON parsing failed ({}), trying literal form", strict_error);
            relax_literal(raw)
                .and_then(|relaxed| serde_json::from_str(&relaxed).ok())
                .ok_or_else(|| {
                    RtubeError::ParseError(format!("could not parse object: {}", strict_error))
                })
        }
    }
}

/// Rewrite value-level literal syntax into JSON. Returns `None` on an
/// unterminated string.
fn relax_literal(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                out.push('"');
                loop {
                    let c = chars.next()?;
                    out.push(c);
                    match c {
                        '\\' => out.push(chars.next()?),
                        '"' => break,
                        _ => {}
                    }
                }
            }
            '\'' => {
                out.push('"');
                loop {
                    match chars.next()? {
                        '\\' => match chars.next()? {
                            '\'' => out.push('\''),
                            other => {
                                out.push('\\');
                                out.push(other);
                            }
                        },
                        '\'' => break,
                        '"' => out.push_str("\\\""),
                        other => out.push(other),
                    }
                }
                out.push('"');
            }
            '}' | ']' => {
                let trimmed = out.trim_end().len();
                out.truncate(trimmed);
                if out.ends_with(',') {
                    out.pop();
                }
                out.push(ch);
            }
            c if c.is_ascii_alphabetic() => {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        word.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match word.as_str() {
                    "True" => out.push_str("true"),
                    "False" => out.push_str("false"),
                    "None" | "undefined" => out.push_str("null"),
                    _ => out.push_str(&word),
                }
            }
            _ => out.push(ch),
        }
    }

    Some(out)
}

/// Split the inside of a literal on commas at nesting depth zero.
///
/// Parentheses, braces, brackets and quoted strings (`"`, `'`, `` ` ``) all
/// protect their contents. Each piece is trimmed and empty pieces are dropped.
pub fn split_top_level(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut parts = Vec::new();
    let mut depth: usize = 0;
    let mut quote: Option<u8> = None;
    let mut piece_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'"' | b'\'' | b'`' => quote = Some(b),
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => depth = depth.saturating_sub(1),
                b',' if depth == 0 => {
                    parts.push(&text[piece_start..i]);
                    piece_start = i + 1;
                }
                _ => {}
            },
        }
        i += 1;
    }
    parts.push(&text[piece_start..]);

    parts
        .into_iter()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_find_object_bounds_ignores_delimiters_in_strings() {
        let text = r#"{"a":1,"b":[1,2,"x}y"]} trailing"#;
        assert_eq!(
            find_object_bounds(text, 0).unwrap(),
            r#"{"a":1,"b":[1,2,"x}y"]}"#
        );
    }

    #[test]
    fn test_find_object_bounds_escaped_quote() {
        let text = r#"{"a":"he said \"}\" twice"},{"b":2}"#;
        assert_eq!(
            find_object_bounds(text, 0).unwrap(),
            r#"{"a":"he said \"}\" twice"}"#
        );
    }

    #[test]
    fn test_find_object_bounds_from_offset() {
        let text = "var x = [1, [2, 3], {\"k\": [4]}]; var y = 5;";
        let start = text.find('[').unwrap();
        assert_eq!(
            find_object_bounds(text, start).unwrap(),
            "[1, [2, 3], {\"k\": [4]}]"
        );
    }

    #[test]
    fn test_find_object_bounds_rejects_bad_start() {
        let result = find_object_bounds("var x = {};", 0);
        assert!(matches!(result, Err(RtubeError::MalformedInput(_))));

        let result = find_object_bounds("{}", 10);
        assert!(matches!(result, Err(RtubeError::MalformedInput(_))));
    }

    #[test]
    fn test_find_object_bounds_unterminated() {
        let result = find_object_bounds("{\"a\": [1, 2}", 0);
        assert!(matches!(result, Err(RtubeError::MalformedInput(_))));
    }

    #[test]
    fn test_parse_object_strict_json() {
        let html = r#"var ytInitialPlayerResponse = {"videoDetails":{"title":"T"},"n":[1,2]};</script>"#;
        let start = html.find('{').unwrap();
        let value = parse_object(html, start).unwrap();
        assert_eq!(value["videoDetails"]["title"], "T");
        assert_eq!(value["n"], json!([1, 2]));
    }

    #[test]
    fn test_parse_object_literal_fallback() {
        let text = r#"{"a": 'it\'s "quoted"', "b": [True, False, None,], "c": undefined,}"#;
        let value = parse_object(text, 0).unwrap();
        assert_eq!(value["a"], "it's \"quoted\"");
        assert_eq!(value["b"], json!([true, false, null]));
        assert_eq!(value["c"], Value::Null);
    }

    #[test]
    fn test_parse_object_unquoted_keys_fail() {
        let result = parse_object("{a: 1}", 0);
        assert!(matches!(result, Err(RtubeError::ParseError(_))));
    }

    #[test]
    fn test_split_top_level() {
        let parts = split_top_level(r#"1, "a,b", function(d,e){d.push(e)}, [1,2], 'x,y',"#);
        assert_eq!(
            parts,
            vec!["1", "\"a,b\"", "function(d,e){d.push(e)}", "[1,2]", "'x,y'"]
        );
    }

    #[test]
    fn test_split_top_level_escaped_quote() {
        let parts = split_top_level(r#""a\",b",c"#);
        assert_eq!(parts, vec![r#""a\",b""#, "c"]);
    }
}
