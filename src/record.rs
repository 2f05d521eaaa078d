//! Record body parser.
//!
//! A record body is a set of newline-separated `key: value` lines, one
//! attribute per line. Values may contain colons (times, URLs); only the
//! first colon separates key from value. A value rendered as a bracketed
//! list (`['AI', 'ML']`) is handed to a dedicated sub-parser.

use crate::error::AdvisorError;
use crate::models::{AttrValue, Attributes};

/// Parse a record body into its attribute map.
///
/// Blank and whitespace-only lines are skipped. A non-blank line without a
/// colon fails the whole record with [`AdvisorError::Parse`]; the caller
/// decides whether to skip the record or abort the load.
pub fn parse_record(body: &str) -> Result<Attributes, AdvisorError> {
    let mut attributes = Attributes::new();

    for line in body.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let (key, value) = line.split_once(':').ok_or_else(|| {
            AdvisorError::Parse(format!("line without key separator: {:?}", truncate(line, 80)))
        })?;

        let key = key.trim();
        let value = value.trim();

        if value.starts_with('[') {
            attributes.insert(key.to_string(), AttrValue::List(parse_list(value)));
        } else {
            attributes.insert(key.to_string(), AttrValue::Scalar(value.to_string()));
        }
    }

    Ok(attributes)
}

/// Parse a serialized list value.
///
/// Grammar: outer square brackets, elements separated by the literal
/// sequence `', '` (comma-quote-space), each element stripped of
/// surrounding whitespace and quote characters.
///
/// Best-effort by design: an element that itself contains the separator
/// sequence splits wrong, and no input makes this function fail. The empty
/// list `[]` yields an empty vector, not a single empty element.
pub fn parse_list(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    let inner = trimmed.strip_prefix('[').unwrap_or(trimmed);
    let inner = inner.strip_suffix(']').unwrap_or(inner);

    if inner.trim().is_empty() {
        return Vec::new();
    }

    inner
        .split("', '")
        .map(|item| item.trim().trim_matches(|c| c == '\'' || c == '"').to_string())
        .collect()
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_lines() {
        let attrs = parse_record("Course Name: CS101\nDescription: Intro to Programming").unwrap();
        assert_eq!(
            attrs.get("Course Name"),
            Some(&AttrValue::Scalar("CS101".to_string()))
        );
        assert_eq!(
            attrs.get("Description"),
            Some(&AttrValue::Scalar("Intro to Programming".to_string()))
        );
    }

    #[test]
    fn test_value_containing_colons() {
        let attrs = parse_record("Time: Mon 18:30 - 21:00").unwrap();
        assert_eq!(
            attrs.get("Time"),
            Some(&AttrValue::Scalar("Mon 18:30 - 21:00".to_string()))
        );
    }

    #[test]
    fn test_whitespace_trimmed() {
        let attrs = parse_record("  Location :  Ingersoll Hall  ").unwrap();
        assert_eq!(
            attrs.get("Location"),
            Some(&AttrValue::Scalar("Ingersoll Hall".to_string()))
        );
    }

    #[test]
    fn test_blank_lines_skipped() {
        let attrs = parse_record("A: 1\n\n   \nB: 2\n").unwrap();
        assert_eq!(attrs.len(), 2);
    }

    #[test]
    fn test_line_without_colon_fails_record() {
        let err = parse_record("Course Name: CS101\nnot a field line").unwrap_err();
        assert!(matches!(err, AdvisorError::Parse(_)));
    }

    #[test]
    fn test_list_value() {
        let attrs = parse_record("Tags: ['AI', 'ML']").unwrap();
        assert_eq!(
            attrs.get("Tags"),
            Some(&AttrValue::List(vec!["AI".to_string(), "ML".to_string()]))
        );
    }

    #[test]
    fn test_list_empty() {
        assert_eq!(parse_list("[]"), Vec::<String>::new());
        assert_eq!(parse_list("[ ]"), Vec::<String>::new());
    }

    #[test]
    fn test_list_single_element() {
        assert_eq!(parse_list("['AI']"), vec!["AI".to_string()]);
    }

    #[test]
    fn test_list_double_quotes_stripped() {
        assert_eq!(
            parse_list("[\"AI\", \"ML\"]"),
            // No `', '` separator present, so this is one best-effort element
            // with the quotes and comma preserved minus the outer pair.
            vec!["AI\", \"ML".to_string()]
        );
    }

    #[test]
    fn test_list_elements_containing_commas_survive() {
        // A bare comma inside an element is not the separator; only the
        // quote-comma-space sequence splits.
        let items = parse_list("['Mon, Wed', 'Fri']");
        assert_eq!(items, vec!["Mon, Wed", "Fri"]);
    }

    #[test]
    fn test_list_embedded_separator_is_best_effort() {
        // An element containing the separator sequence itself splits wrong;
        // the parser tolerates it without failing.
        let items = parse_list("[\"a', 'b\"]");
        assert_eq!(items, vec!["a", "b"]);
    }

    #[test]
    fn test_bracket_later_in_value_stays_scalar() {
        let attrs = parse_record("Note: see [1] for details").unwrap();
        assert_eq!(
            attrs.get("Note"),
            Some(&AttrValue::Scalar("see [1] for details".to_string()))
        );
    }
}
