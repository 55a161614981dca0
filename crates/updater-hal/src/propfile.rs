//! Parsing helpers for getprop-style `key=value` files (`build.prop`, `default.prop`).

/// A non-comment, non-blank line without `=`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedLine(pub String);

/// Looks up `key` in prop-file `content`.
///
/// Blank lines and lines starting with `#` (after leading whitespace) are skipped.
/// Whitespace around the key and the value is trimmed. Scanning stops at the first
/// match, so a malformed line after the matching one is never reported.
pub fn find_property(content: &str, key: &str) -> Result<Option<String>, MalformedLine> {
    for raw in content.lines() {
        let line = raw.trim_start();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (name, value) = line
            .split_once('=')
            .ok_or_else(|| MalformedLine(line.to_string()))?;
        if name.trim_end() != key {
            continue;
        }
        return Ok(Some(value.trim().to_string()));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_property_trims_key_and_value() {
        let content = "# build props\n\n  ro.product.device =  tuna  \nro.build.id=GRJ22\n";
        assert_eq!(
            find_property(content, "ro.product.device").unwrap(),
            Some("tuna".to_string())
        );
        assert_eq!(
            find_property(content, "ro.build.id").unwrap(),
            Some("GRJ22".to_string())
        );
    }

    #[test]
    fn find_property_missing_key_is_none() {
        assert_eq!(find_property("a=b\n", "c").unwrap(), None);
    }

    #[test]
    fn find_property_rejects_malformed_line_before_match() {
        let err = find_property("garbage\nkey=value\n", "key").unwrap_err();
        assert_eq!(err, MalformedLine("garbage".to_string()));
    }

    #[test]
    fn find_property_stops_at_first_match() {
        assert_eq!(
            find_property("key=first\nnot a prop\n", "key").unwrap(),
            Some("first".to_string())
        );
    }

    #[test]
    fn find_property_allows_empty_value() {
        assert_eq!(find_property("key=\n", "key").unwrap(), Some(String::new()));
    }
}
