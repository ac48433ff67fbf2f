//! Markdown-safe text normalization.
//!
//! Upstream fragments arrive with inconsistent spacing around headings and
//! paragraphs. [`normalize`] rewrites a text segment into a canonical form:
//!
//! - no trailing spaces or tabs at the end of a line
//! - every heading line separated from its neighbours by one blank line
//! - runs of whitespace-only lines collapsed to a single blank line
//! - no leading or trailing whitespace overall
//!
//! The canonical form is a fixed point: normalizing it again changes nothing.

use regex::Regex;
use std::sync::LazyLock;

/// A Markdown ATX heading: one or more `#`, a space, then at least one character.
static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#+ .+$").expect("heading pattern is valid"));

fn is_heading(line: &str) -> bool {
    HEADING.is_match(line)
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// Normalize a text segment for Markdown rendering.
///
/// Works line by line rather than through chained substitutions. The input
/// is trimmed up front so that a heading exposed by trimming is treated the
/// same on every pass.
pub fn normalize(text: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        return String::new();
    }

    let mut lines: Vec<&str> = Vec::new();
    for raw in text.split('\n') {
        let line = raw.trim_end_matches([' ', '\t']);

        if is_blank(line) {
            if lines.last().is_some_and(|prev| !prev.is_empty()) {
                lines.push("");
            }
            continue;
        }

        if let Some(prev) = lines.last() {
            let needs_gap = !prev.is_empty() && (is_heading(line) || is_heading(prev));
            if needs_gap {
                lines.push("");
            }
        }
        lines.push(line);
    }

    lines.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_plain_text_unchanged() {
        assert_eq!(normalize("Hello world"), "Hello world");
    }

    #[test]
    fn test_trailing_spaces_stripped_before_newline() {
        assert_eq!(normalize("first line  \t\nsecond"), "first line\nsecond");
    }

    #[test]
    fn test_blank_line_after_heading() {
        assert_eq!(normalize("# Title\nBody text"), "# Title\n\nBody text");
    }

    #[test]
    fn test_blank_line_before_heading() {
        assert_eq!(
            normalize("Intro paragraph\n## Section"),
            "Intro paragraph\n\n## Section"
        );
    }

    #[test]
    fn test_heading_between_paragraphs() {
        assert_eq!(
            normalize("Intro\n### Details\nMore text"),
            "Intro\n\n### Details\n\nMore text"
        );
    }

    #[test]
    fn test_existing_blank_lines_not_doubled() {
        assert_eq!(normalize("# Title\n\nBody"), "# Title\n\nBody");
        assert_eq!(normalize("Body\n\n# Title"), "Body\n\n# Title");
    }

    #[test]
    fn test_paragraph_breaks_collapsed() {
        assert_eq!(normalize("one\n\n\n\ntwo"), "one\n\ntwo");
        assert_eq!(normalize("one\n  \n\t\n two"), "one\n\n two");
    }

    #[test]
    fn test_hash_without_space_is_not_heading() {
        assert_eq!(normalize("#hashtag\nnext"), "#hashtag\nnext");
    }

    #[test]
    fn test_bare_marker_is_not_heading() {
        // "# " followed by nothing is not a heading once trailing space is gone
        assert_eq!(normalize("text\n# \nmore"), "text\n#\nmore");
    }

    #[test]
    fn test_outer_whitespace_trimmed() {
        assert_eq!(normalize("  \n\n  padded \n\n"), "padded");
        assert_eq!(normalize("   "), "");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_leading_whitespace_before_heading() {
        let once = normalize("\t\n ## Heading\nbody");
        assert_eq!(once, "## Heading\n\nbody");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn test_consecutive_headings() {
        assert_eq!(normalize("# A\n# B"), "# A\n\n# B");
    }

    #[test]
    fn test_idempotent_on_samples() {
        let samples = [
            "# Title\nBody",
            " # #\r\nb#\n\rab\t\r\n\t\r aa#\n#a\r#a\t",
            "\t# #\t\r\t\tb###\na\n# \rbba##a\ra\tab",
            "a\n\n\n# h\n\n\n\nb  \n  c",
            "## \n##  x\n",
        ];
        for sample in samples {
            let once = normalize(sample);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", sample);
        }
    }

    proptest! {
        #[test]
        fn prop_normalize_idempotent(text in "[ab #\t\r\n]{0,64}") {
            let once = normalize(&text);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn prop_normalize_idempotent_any_text(text in "\\PC{0,48}") {
            let once = normalize(&text);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn prop_normalize_preserves_non_whitespace(text in "[ab #\t\n]{0,64}") {
            let strip = |s: &str| s.chars().filter(|c| !c.is_whitespace()).collect::<String>();
            prop_assert_eq!(strip(&normalize(&text)), strip(&text));
        }
    }
}
