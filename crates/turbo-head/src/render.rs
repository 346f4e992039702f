//! Head serialization for server output.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::descriptor::TagEntry;
use crate::merge::ResolvedHead;

/// Attributes rendered first, in this order. Others follow alphabetically.
const ATTR_ORDER: [&str; 7] = [
    "charset",
    "name",
    "property",
    "http-equiv",
    "rel",
    "href",
    "content",
];

/// Serialized head, ready to be spliced into a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SerializedHead {
    /// Markup for inside `<head>`, one tag per line.
    pub head_tags: String,
    /// Attributes for the `<html>` tag, with a leading space when non-empty.
    pub html_attrs: String,
    /// Attributes for the `<body>` tag, with a leading space when non-empty.
    pub body_attrs: String,
}

/// Render a resolved head to markup.
///
/// Charset meta comes first so it lands within the first bytes of the
/// document, then the title, the remaining meta tags and links.
pub fn render_head(head: &ResolvedHead) -> SerializedHead {
    let mut html = String::new();

    let (charset, meta): (Vec<&TagEntry>, Vec<&TagEntry>) = head
        .meta
        .iter()
        .partition(|m| m.attributes.contains_key("charset"));

    for entry in charset {
        push_tag(&mut html, "meta", entry);
    }

    if let Some(title) = &head.title {
        html.push_str(&format!("<title>{}</title>\n", escape_text(title)));
    }

    for entry in meta {
        push_tag(&mut html, "meta", entry);
    }

    for entry in &head.link {
        push_tag(&mut html, "link", entry);
    }

    SerializedHead {
        head_tags: html,
        html_attrs: render_attrs(&head.html_attrs),
        body_attrs: render_attrs(&head.body_attrs),
    }
}

/// Render an attribute map as ` name="value"` pairs.
pub fn render_attrs(attrs: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    for (name, value) in ordered(attrs) {
        out.push_str(&format!(r#" {}="{}""#, name, escape_attr(value)));
    }
    out
}

/// Escape text content.
pub fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Escape a double-quoted attribute value.
pub fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}

fn push_tag(html: &mut String, tag: &str, entry: &TagEntry) {
    html.push('<');
    html.push_str(tag);
    html.push_str(&render_attrs(&entry.attributes));
    html.push_str(">\n");
}

fn ordered(attrs: &BTreeMap<String, String>) -> Vec<(&str, &str)> {
    let mut known: Vec<(&str, &str)> = ATTR_ORDER
        .iter()
        .filter_map(|name| attrs.get(*name).map(|value| (*name, value.as_str())))
        .collect();
    known.extend(
        attrs
            .iter()
            .filter(|(name, _)| !ATTR_ORDER.contains(&name.as_str()))
            .map(|(name, value)| (name.as_str(), value.as_str())),
    );
    known
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{HeadDescriptor, TitleTemplate};
    use crate::merge::resolve;

    #[test]
    fn test_render_order() {
        let descriptors = [
            HeadDescriptor::new()
                .with_title("Home")
                .with_meta(TagEntry::named("description", "Shop"))
                .with_link(TagEntry::link("icon", "/favicon.ico")),
            HeadDescriptor::new().with_charset("utf-8"),
        ];
        let head = resolve(descriptors.iter(), None);

        let rendered = render_head(&head);
        assert_eq!(
            rendered.head_tags,
            "<meta charset=\"utf-8\">\n\
             <title>Home</title>\n\
             <meta name=\"description\" content=\"Shop\">\n\
             <link rel=\"icon\" href=\"/favicon.ico\">\n"
        );
    }

    #[test]
    fn test_render_templated_title() {
        let template = TitleTemplate::new("%s - Site");
        let descriptors = [HeadDescriptor::new().with_title("Home")];
        let head = resolve(descriptors.iter(), Some(&template));
        assert!(render_head(&head)
            .head_tags
            .contains("<title>Home - Site</title>"));
    }

    #[test]
    fn test_render_escapes() {
        let descriptors = [HeadDescriptor::new()
            .with_title("Tom & <Jerry>")
            .with_meta(TagEntry::named("description", r#"say "hi""#))];
        let head = resolve(descriptors.iter(), None);
        let html = render_head(&head).head_tags;
        assert!(html.contains("<title>Tom &amp; &lt;Jerry&gt;</title>"));
        assert!(html.contains(r#"content="say &quot;hi&quot;""#));
    }

    #[test]
    fn test_render_attrs() {
        let descriptors = [HeadDescriptor::new()
            .with_html_attr("lang", "en")
            .with_html_attr("dir", "ltr")
            .with_body_attr("class", "dark")];
        let head = resolve(descriptors.iter(), None);
        let rendered = render_head(&head);
        assert_eq!(rendered.html_attrs, r#" dir="ltr" lang="en""#);
        assert_eq!(rendered.body_attrs, r#" class="dark""#);
    }

    #[test]
    fn test_unknown_attributes_follow_known_ones() {
        let entry = TagEntry::new()
            .attr("media", "print")
            .attr("href", "/print.css")
            .attr("rel", "stylesheet");
        assert_eq!(
            render_attrs(&entry.attributes),
            r#" rel="stylesheet" href="/print.css" media="print""#
        );
    }

    #[test]
    fn test_render_empty_head() {
        let rendered = render_head(&ResolvedHead::default());
        assert_eq!(rendered, SerializedHead::default());
    }

    #[test]
    fn test_render_is_deterministic() {
        let descriptors = [
            HeadDescriptor::new().with_viewport("width=device-width"),
            HeadDescriptor::new().with_meta(TagEntry::named("keywords", "a").with_key("kw")),
        ];
        let first = render_head(&resolve(descriptors.iter(), None));
        let second = render_head(&resolve(descriptors.iter(), None));
        assert_eq!(first, second);
    }
}
