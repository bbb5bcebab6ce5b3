use std::{borrow::Cow, sync::LazyLock};

use itertools::Itertools as _;

use super::extract::Fragment;

pub const SEPARATOR: &str = "\n\n";

static BLOCK_TAG: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?i)^<(?:p|h[1-6]|ul|ol|div|section|article|blockquote|figure|table|img)\b")
        .unwrap()
});

/// Wrap `html` in a paragraph unless it already opens with a block-level tag.
pub fn wrap_as_block(html: &str) -> Cow<'_, str> {
    if BLOCK_TAG.is_match(html.trim_start()) {
        Cow::Borrowed(html)
    } else {
        Cow::Owned(format!("<p>{html}</p>"))
    }
}

/// Join fragments into one document, separated by blank lines.
pub fn assemble(fragments: &[Fragment]) -> String {
    fragments
        .iter()
        .map(|fragment| match fragment {
            Fragment::Text(text) => wrap_as_block(text),
            Fragment::Image(block) => Cow::Borrowed(block.as_str()),
        })
        .join(SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_inline_text_only() {
        assert_eq!(wrap_as_block("hello"), "<p>hello</p>");
        assert_eq!(wrap_as_block("<h2>Title</h2>"), "<h2>Title</h2>");
        assert_eq!(wrap_as_block("\n  <UL><li>x</li></UL>"), "\n  <UL><li>x</li></UL>");
        assert_eq!(wrap_as_block("<pre>code</pre>"), "<p><pre>code</pre></p>");
        assert_eq!(wrap_as_block("<strong>Hi</strong>"), "<p><strong>Hi</strong></p>");
    }

    #[test]
    fn joins_in_order_with_blank_lines() {
        let fragments = [
            Fragment::Text("one".into()),
            Fragment::Image("<figure>img</figure>".into()),
            Fragment::Text("<p>three</p>".into()),
        ];
        assert_eq!(
            assemble(&fragments),
            "<p>one</p>\n\n<figure>img</figure>\n\n<p>three</p>"
        );
    }

    #[test]
    fn empty_input_is_empty_document() {
        assert_eq!(assemble(&[]), "");
    }
}
