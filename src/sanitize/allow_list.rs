use indexmap::{IndexMap, IndexSet};

/// Attributes accepted on every allowed element.
const GLOBAL_ATTRIBUTES: [&str; 6] = ["class", "id", "title", "lang", "dir", "role"];

/// Tags and per-tag attributes that survive sanitization.
///
/// Attribute sets are ordered; sanitized tags list their attributes in this
/// order whatever order the input used.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    tags: IndexMap<String, IndexSet<String>>,
}

impl AllowList {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Allow `tag` with the given attributes on top of the global ones.
    /// Calling it again for the same tag widens its attribute set.
    pub fn allow<'a>(mut self, tag: &str, attributes: impl IntoIterator<Item = &'a str>) -> Self {
        let entry = self
            .tags
            .entry(tag.to_ascii_lowercase())
            .or_insert_with(|| GLOBAL_ATTRIBUTES.iter().map(ToString::to_string).collect());
        entry.extend(attributes.into_iter().map(str::to_ascii_lowercase));
        self
    }

    /// Baseline set for persisted rich content: paragraphs, headings, lists,
    /// links, images, tables, quotes and divisions.
    pub fn rich_content() -> Self {
        let inline = [
            "abbr", "acronym", "b", "big", "br", "code", "dfn", "em", "i", "kbd", "mark", "s",
            "samp", "small", "span", "strike", "strong", "sub", "sup", "tt", "u", "var",
        ];
        let blocks = [
            "address", "article", "aside", "div", "footer", "header", "hr", "p", "pre",
            "section", "h1", "h2", "h3", "h4", "h5", "h6", "dl", "dt", "dd", "ul", "caption",
            "thead", "tbody", "tfoot", "tr", "table",
        ];
        let list = inline
            .into_iter()
            .chain(blocks)
            .fold(Self::empty(), |list, tag| list.allow(tag, []));
        list.allow("a", ["href", "rel", "rev", "name", "target", "hreflang", "download"])
            .allow("blockquote", ["cite"])
            .allow("q", ["cite"])
            .allow("cite", [])
            .allow("del", ["cite", "datetime"])
            .allow("ins", ["cite", "datetime"])
            .allow("ol", ["start", "type", "reversed"])
            .allow("li", ["value"])
            .allow("img", ["src", "alt", "width", "height"])
            .allow("colgroup", ["span"])
            .allow("col", ["span"])
            .allow("th", ["colspan", "rowspan", "scope", "headers", "abbr"])
            .allow("td", ["colspan", "rowspan", "headers"])
    }

    /// Extension needed by migrated image blocks: `figure`/`figcaption` and
    /// the loading, decoding and responsive attributes on `img`.
    pub fn with_migrated_media(self) -> Self {
        self.allow("figure", [])
            .allow("figcaption", [])
            .allow("img", ["loading", "decoding", "sizes", "srcset"])
    }

    /// Allowed attributes of a lower-cased tag name, `None` when the tag is
    /// not allowed at all.
    pub fn attributes(&self, tag: &str) -> Option<&IndexSet<String>> {
        self.tags.get(tag)
    }

    pub fn allows_tag(&self, tag: &str) -> bool {
        self.tags.contains_key(tag)
    }
}
