//! Allow-list HTML filtering.
//!
//! Input is parsed as an HTML fragment. Disallowed elements are unwrapped
//! (their text survives), script-like bodies are dropped, and disallowed
//! attributes are removed. The output is stable under re-sanitization.

use std::fmt::Write as _;

use itertools::Itertools as _;
use scraper::{Html, Node, node::Element};
use tracing::trace;

mod allow_list;

pub use allow_list::AllowList;

const VOID_ELEMENTS: [&str; 6] = ["br", "col", "hr", "img", "source", "wbr"];

/// Elements whose whole subtree is discarded rather than unwrapped.
const DISCARDED_ELEMENTS: [&str; 12] = [
    "script", "style", "template", "noscript", "iframe", "noembed", "noframes", "xmp",
    "textarea", "title", "svg", "math",
];

const URL_ATTRIBUTES: [&str; 3] = ["href", "src", "cite"];

const ALLOWED_PROTOCOLS: [&str; 22] = [
    "http", "https", "ftp", "ftps", "mailto", "news", "irc", "irc6", "ircs", "gopher", "nntp",
    "feed", "telnet", "mms", "rtsp", "sms", "svn", "tel", "fax", "xmpp", "webcal", "urn",
];

fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

/// `true` for relative references and for absolute ones whose scheme is on
/// the protocol allow-list. Whitespace and control characters are ignored
/// while looking for the scheme, as browsers do.
fn allowed_url(value: &str) -> bool {
    let cleaned = value
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>();
    match cleaned.find(|c| matches!(c, ':' | '/' | '?' | '#')) {
        Some(at) if cleaned[at..].starts_with(':') => {
            let scheme = cleaned[..at].to_ascii_lowercase();
            ALLOWED_PROTOCOLS.contains(&scheme.as_str())
        }
        _ => true,
    }
}

fn allowed_srcset(value: &str) -> bool {
    value
        .split(',')
        .filter_map(|candidate| candidate.split_whitespace().next())
        .all(allowed_url)
}

enum Visit<'a> {
    Text(&'a str),
    Open {
        element: &'a Element,
        /// First child is text starting with a line feed.
        leading_newline: bool,
    },
    Close(&'a Element),
}

/// Document-order walk over a parsed fragment, skipping comments and
/// discarded subtrees. Iterative, so nesting depth is bounded by the heap.
fn visit_fragment<'a>(fragment: &'a Html, mut visit: impl FnMut(Visit<'a>)) {
    let mut stack = vec![(fragment.root_element().children(), None)];
    while let Some((children, _)) = stack.last_mut() {
        match children.next() {
            Some(node) => match node.value() {
                Node::Text(text) => visit(Visit::Text(&**text)),
                Node::Element(element) if !DISCARDED_ELEMENTS.contains(&element.name()) => {
                    let leading_newline = node
                        .first_child()
                        .and_then(|child| child.value().as_text())
                        .is_some_and(|text| text.starts_with('\n'));
                    visit(Visit::Open {
                        element,
                        leading_newline,
                    });
                    stack.push((node.children(), Some(element)));
                }
                _ => {}
            },
            None => {
                if let Some((_, Some(element))) = stack.pop() {
                    visit(Visit::Close(element));
                }
            }
        }
    }
}

/// Reduce markup to a single line of plain text: tags dropped, character
/// references decoded, whitespace collapsed.
pub fn plain_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut text = String::new();
    visit_fragment(&fragment, |visit| {
        if let Visit::Text(chunk) = visit {
            text.push_str(chunk);
        }
    });
    text.split_whitespace().join(" ")
}

pub struct Sanitizer {
    allow_list: AllowList,
}

impl Sanitizer {
    pub fn new(allow_list: AllowList) -> Self {
        Self { allow_list }
    }

    fn write_start_tag(&self, out: &mut String, element: &Element, leading_newline: bool) {
        let name = element.name();
        let Some(allowed) = self.allow_list.attributes(name) else {
            trace!(tag = %name, "stripping disallowed tag");
            return;
        };
        out.push('<');
        out.push_str(name);
        for attr_name in allowed {
            let Some(value) = element.attr(attr_name) else {
                continue;
            };
            let safe = match attr_name.as_str() {
                "srcset" => allowed_srcset(value),
                url if URL_ATTRIBUTES.contains(&url) => allowed_url(value),
                _ => true,
            };
            if !safe {
                trace!(tag = %name, attr = %attr_name, "dropping unsafe url");
                continue;
            }
            let _ = write!(
                out,
                " {attr_name}=\"{}\"",
                html_escape::encode_double_quoted_attribute(value)
            );
        }
        out.push_str(if is_void(name) { " />" } else { ">" });
        // The parser eats one line feed right after `<pre>`.
        if leading_newline && name == "pre" {
            out.push('\n');
        }
    }

    pub fn sanitize(&self, html: &str) -> String {
        let fragment = Html::parse_fragment(html);
        let mut out = String::with_capacity(html.len());
        visit_fragment(&fragment, |visit| match visit {
            Visit::Text(text) => out.push_str(&html_escape::encode_text(text)),
            Visit::Open {
                element,
                leading_newline,
            } => self.write_start_tag(&mut out, element, leading_newline),
            Visit::Close(element) => {
                let name = element.name();
                if self.allow_list.allows_tag(name) && !is_void(name) {
                    let _ = write!(out, "</{name}>");
                }
            }
        });
        out
    }
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new(AllowList::rich_content().with_migrated_media())
    }
}
