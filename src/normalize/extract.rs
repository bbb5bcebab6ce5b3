use std::sync::LazyLock;

use html_escape::encode_double_quoted_attribute;
use tracing::debug;
use url::Url;

use super::tree::ItemNode;
use crate::sanitize::plain_text;

pub const IMAGE_CLASS: &str = "migrated-image";

static RELATIVE_BASE: LazyLock<Url> =
    LazyLock::new(|| Url::parse("http://localhost/").unwrap());

/// Raw markup produced from one builder item, in reading order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// Rich text copied verbatim from `attr.content`.
    Text(String),
    /// Self-contained `<figure>` block built from an image item.
    Image(String),
}

/// Accept an image source if it is an absolute http(s) URL or a root- or
/// protocol-relative reference. Absolute URLs come back normalized.
pub fn validate_src(raw: &str) -> Option<String> {
    let raw = raw.trim();
    match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => Some(url.into()),
        Ok(_) => None,
        Err(url::ParseError::RelativeUrlWithoutBase) if raw.starts_with('/') => {
            let unsafe_char = raw
                .chars()
                .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '"' | '\'' | '<' | '>'));
            if unsafe_char || !RELATIVE_BASE.join(raw).is_ok_and(|url| url.has_host()) {
                return None;
            }
            Some(raw.to_owned())
        }
        Err(_) => None,
    }
}

fn image_block(src: &str, alt: &str) -> String {
    format!(
        r#"<figure class="{IMAGE_CLASS}"><img src="{}" alt="{}" loading="lazy" decoding="async" /></figure>"#,
        encode_double_quoted_attribute(src),
        encode_double_quoted_attribute(alt),
    )
}

/// Fragments carried by one item: its rich text, then its image.
///
/// Layout and styling attributes are ignored, as are item kinds other than
/// text-bearing ones and images.
pub fn extract(item: ItemNode<'_>) -> Vec<Fragment> {
    let mut fragments = Vec::new();
    if let Some(content) = item.attr_str("content") {
        fragments.push(Fragment::Text(content.to_owned()));
    }
    if item.kind.eq_ignore_ascii_case("image") {
        if let Some(raw) = item.attr_str("src") {
            match validate_src(raw) {
                Some(src) => {
                    let alt = item.field_str("title").map(plain_text).unwrap_or_default();
                    fragments.push(Fragment::Image(image_block(&src, &alt)));
                }
                None => debug!(src = raw, "discarding image with unusable source"),
            }
        }
    }
    fragments
}
