use crate::ParseError;

/// One segment of a restricted JSONPath: an identifier, optionally marked as
/// traversing the elements of an array with `[*]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegment {
    pub name: String,
    pub is_array: bool,
}

/// Parse the restricted JSONPath sublanguage:
/// absolute paths of the form `$.foo.bar[*].baz`, where each segment is
/// `identifier` or `identifier[*]`. No filters, no `..`, no bracketed names.
/// `$` alone parses to the empty segment list.
pub fn parse_json_path(json_path: &str) -> Result<Vec<PathSegment>, ParseError> {
    let trimmed = json_path.trim();

    let Some(rest) = trimmed.strip_prefix('$') else {
        return Err(ParseError::NotAbsolute(json_path.to_string()));
    };
    let inner = match rest {
        "" => return Ok(Vec::new()),
        dotted => match dotted.strip_prefix('.') {
            Some(inner) => inner,
            None => return Err(ParseError::NotAbsolute(json_path.to_string())),
        },
    };
    if inner.is_empty() {
        return Ok(Vec::new());
    }

    let mut segments = Vec::new();
    for raw in inner.split('.') {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ParseError::EmptySegment(json_path.to_string()));
        }
        segments.push(parse_segment(raw)?);
    }
    Ok(segments)
}

fn parse_segment(raw: &str) -> Result<PathSegment, ParseError> {
    let (name, is_array) = match raw.strip_suffix("[*]") {
        Some(name) => (name, true),
        None => (raw, false),
    };

    let mut chars = name.chars();
    let leading_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !leading_ok || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ParseError::UnsupportedSegment(raw.to_string()));
    }

    Ok(PathSegment {
        name: name.to_string(),
        is_array,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    fn seg(name: &str, is_array: bool) -> PathSegment {
        PathSegment {
            name: name.to_string(),
            is_array,
        }
    }

    #[test]
    fn root_only() {
        assert_eq!(parse_json_path("$").unwrap(), Vec::new());
    }

    #[test]
    fn simple_path() {
        assert_eq!(
            parse_json_path("$.foo.bar").unwrap(),
            vec![seg("foo", false), seg("bar", false)],
        );
    }

    #[test]
    fn array_segment() {
        assert_eq!(
            parse_json_path("$.foo[*].bar").unwrap(),
            vec![seg("foo", true), seg("bar", false)],
        );
    }

    #[test]
    fn alternating_arrays() {
        assert_eq!(
            parse_json_path("$.test1.test2[*].test3.test4[*].test5").unwrap(),
            vec![
                seg("test1", false),
                seg("test2", true),
                seg("test3", false),
                seg("test4", true),
                seg("test5", false),
            ],
        );
    }

    #[test]
    fn rejects_relative_path() {
        assert!(matches!(
            parse_json_path("foo.bar"),
            Err(ParseError::NotAbsolute(_))
        ));
    }

    #[test]
    fn rejects_empty_segment() {
        assert!(matches!(
            parse_json_path("$.foo..bar"),
            Err(ParseError::EmptySegment(_))
        ));
    }

    #[test]
    fn rejects_filters_and_bracketed_names() {
        for bad in ["$.items[?(@.x)]", "$['name']", "$.a[0]", "$..b", "$.1abc"] {
            assert!(parse_json_path(bad).is_err(), "{bad:?} should be rejected");
        }
    }
}
