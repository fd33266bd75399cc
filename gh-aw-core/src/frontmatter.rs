//! Splits a source file into a YAML frontmatter header and a Markdown body.

use crate::diagnostics::{Diagnostic, ErrorCode};
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct ParsedSource {
    pub frontmatter: Value,
    pub body: String,
    /// Line number (1-based) in the original file where `body` starts, for
    /// diagnostics emitted against positions inside the body.
    pub body_line_offset: usize,
}

const DELIM: &str = "---";

/// A file begins with frontmatter iff its first non-empty line is exactly
/// `---`. The header ends at the next line that is exactly `---`. Absent
/// header means the whole file is body.
pub fn parse(path: &std::path::Path, source: &str) -> Result<ParsedSource, Diagnostic> {
    let mut lines = source.lines();
    let mut consumed = 0usize;

    // Find the first non-empty line.
    let first_non_empty = loop {
        match lines.next() {
            Some(line) => {
                consumed += 1;
                if !line.trim().is_empty() {
                    break Some(line);
                }
            }
            None => break None,
        }
    };

    let Some(first_line) = first_non_empty else {
        return Ok(ParsedSource {
            frontmatter: Value::Map(Default::default()),
            body: String::new(),
            body_line_offset: 1,
        });
    };

    if first_line.trim_end() != DELIM {
        return Ok(ParsedSource {
            frontmatter: Value::Map(Default::default()),
            body: source.to_string(),
            body_line_offset: 1,
        });
    }

    let mut header_lines = Vec::new();
    let mut terminated = false;
    let mut body_start = consumed;
    for line in lines {
        consumed += 1;
        if line.trim_end() == DELIM {
            terminated = true;
            body_start = consumed;
            break;
        }
        header_lines.push(line);
    }

    if !terminated {
        return Err(Diagnostic::error(
            ErrorCode::FrontmatterUnterminated,
            path,
            "frontmatter header opened with '---' but never closed",
        ));
    }

    let header_text = header_lines.join("\n");
    let parsed: serde_yaml::Value = serde_yaml::from_str(&header_text).map_err(|e| {
        Diagnostic::error(
            ErrorCode::YamlSyntax,
            path,
            format!("invalid YAML in frontmatter header: {e}"),
        )
        .with_line(2)
    })?;

    let frontmatter = Value::from(parsed);
    if !matches!(frontmatter, Value::Map(_)) && !frontmatter.is_null() {
        return Err(Diagnostic::error(
            ErrorCode::FrontmatterNotMapping,
            path,
            "frontmatter header must be a YAML mapping",
        ));
    }
    let frontmatter = if frontmatter.is_null() {
        Value::Map(Default::default())
    } else {
        frontmatter
    };

    let body = source[nth_line_start(source, body_start)..].to_string();

    Ok(ParsedSource {
        frontmatter,
        body,
        body_line_offset: body_start + 1,
    })
}

/// Byte offset of the start of the `n`th line (0-based line count of
/// preceding newlines), so the body can be sliced from the original source
/// instead of rejoined from `.lines()` (which would drop a trailing `\n`).
fn nth_line_start(source: &str, n: usize) -> usize {
    if n == 0 {
        return 0;
    }
    let mut seen = 0usize;
    for (i, b) in source.bytes().enumerate() {
        if b == b'\n' {
            seen += 1;
            if seen == n {
                return i + 1;
            }
        }
    }
    source.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn p(src: &str) -> ParsedSource {
        parse(Path::new("wf.md"), src).unwrap()
    }

    #[test]
    fn no_header_is_all_body() {
        let parsed = p("# Hello\nSay hi.\n");
        assert!(parsed.frontmatter.as_map().unwrap().is_empty());
        assert_eq!(parsed.body, "# Hello\nSay hi.\n");
    }

    #[test]
    fn minimal_header_and_body() {
        let parsed = p("---\non: workflow_dispatch\nengine: copilot\n---\n# Hello\nSay hi.\n");
        assert_eq!(
            parsed.frontmatter.get("on").unwrap().as_str(),
            Some("workflow_dispatch")
        );
        assert_eq!(
            parsed.frontmatter.get("engine").unwrap().as_str(),
            Some("copilot")
        );
        assert_eq!(parsed.body, "# Hello\nSay hi.\n");
        assert_eq!(parsed.body_line_offset, 4);
    }

    #[test]
    fn unterminated_header_is_error() {
        let err = parse(Path::new("wf.md"), "---\non: push\n").unwrap_err();
        assert_eq!(err.code, ErrorCode::FrontmatterUnterminated);
    }

    #[test]
    fn non_mapping_header_is_error() {
        let err = parse(Path::new("wf.md"), "---\n- a\n- b\n---\nbody\n").unwrap_err();
        assert_eq!(err.code, ErrorCode::FrontmatterNotMapping);
    }

    #[test]
    fn leading_blank_lines_before_delimiter_are_tolerated() {
        let parsed = p("\n\n---\non: push\n---\nbody\n");
        assert_eq!(parsed.frontmatter.get("on").unwrap().as_str(), Some("push"));
    }

    #[test]
    fn empty_header_yields_empty_mapping() {
        let parsed = p("---\n---\nbody\n");
        assert!(parsed.frontmatter.as_map().unwrap().is_empty());
    }

    #[test]
    fn trailing_blank_line_in_body_is_preserved() {
        let parsed = p("---\non: push\n---\nbody\n\n");
        assert_eq!(parsed.body, "body\n\n");
    }
}
