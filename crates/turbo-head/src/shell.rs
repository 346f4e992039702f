//! Document shell around a serialized head.

use crate::render::SerializedHead;

/// Complete HTML document split into streamable halves.
#[derive(Debug, Clone)]
pub struct DocumentShell {
    /// Include doctype declaration.
    pub doctype: bool,
    /// Serialized head.
    pub head: SerializedHead,
    /// HTML emitted right after the opening `<body>` tag.
    pub body_start: String,
    /// HTML emitted before the closing `</body>` tag.
    pub body_end: String,
}

impl DocumentShell {
    /// Create a shell with an empty body wrapper.
    pub fn new(head: SerializedHead) -> Self {
        Self {
            doctype: true,
            head,
            body_start: String::new(),
            body_end: String::new(),
        }
    }

    /// Set custom body start HTML.
    pub fn with_body_start(mut self, html: impl Into<String>) -> Self {
        self.body_start = html.into();
        self
    }

    /// Set custom body end HTML.
    pub fn with_body_end(mut self, html: impl Into<String>) -> Self {
        self.body_end = html.into();
        self
    }

    /// Omit the doctype declaration.
    pub fn without_doctype(mut self) -> Self {
        self.doctype = false;
        self
    }

    /// Render everything up to the page body.
    pub fn render_opening(&self) -> String {
        let mut html = String::new();

        if self.doctype {
            html.push_str("<!DOCTYPE html>\n");
        }

        html.push_str(&format!("<html{}>\n<head>\n", self.head.html_attrs));
        html.push_str(&self.head.head_tags);
        html.push_str("</head>\n");
        html.push_str(&format!("<body{}>\n", self.head.body_attrs));
        html.push_str(&self.body_start);

        html
    }

    /// Render everything after the page body.
    pub fn render_closing(&self) -> String {
        format!("{}</body>\n</html>", self.body_end)
    }

    /// Render the full document around `body`.
    pub fn render(&self, body: &str) -> String {
        let mut html = self.render_opening();
        html.push_str(body);
        if !body.is_empty() && !body.ends_with('\n') {
            html.push('\n');
        }
        html.push_str(&self.render_closing());
        html
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn head() -> SerializedHead {
        SerializedHead {
            head_tags: "<title>Home</title>\n".to_string(),
            html_attrs: r#" lang="en""#.to_string(),
            body_attrs: String::new(),
        }
    }

    #[test]
    fn test_render_opening() {
        let shell = DocumentShell::new(head());
        assert_eq!(
            shell.render_opening(),
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<title>Home</title>\n</head>\n<body>\n"
        );
    }

    #[test]
    fn test_render_full_document() {
        let shell = DocumentShell::new(head())
            .with_body_start("<main>\n")
            .with_body_end("</main>\n");
        let html = shell.render("<h1>Hi</h1>");
        assert!(html.ends_with("<main>\n<h1>Hi</h1>\n</main>\n</body>\n</html>"));
    }

    #[test]
    fn test_without_doctype() {
        let shell = DocumentShell::new(SerializedHead::default()).without_doctype();
        assert!(shell.render_opening().starts_with("<html>\n"));
        assert_eq!(shell.render(""), "<html>\n<head>\n</head>\n<body>\n</body>\n</html>");
    }
}
