//! Output formatting for the CLI.

use console::style;
use serde::Serialize;

use turbo_head::{render_attrs, HeadElement, HeadPatch};

/// Output handler for CLI messages.
#[derive(Clone)]
pub struct Output {
    verbose: bool,
    json: bool,
}

impl Output {
    /// Create a new output handler.
    pub fn new(verbose: bool, json: bool) -> Self {
        Self { verbose, json }
    }

    /// Print an info message.
    pub fn info(&self, msg: &str) {
        if self.json {
            return;
        }
        println!("{} {}", style("ℹ").blue(), msg);
    }

    /// Print a success message.
    pub fn success(&self, msg: &str) {
        if self.json {
            return;
        }
        println!("{} {}", style("✓").green(), msg);
    }

    /// Print an error message.
    pub fn error(&self, msg: &str) {
        if self.json {
            let body = serde_json::json!({ "error": msg });
            eprintln!("{}", body);
            return;
        }
        eprintln!("{} {}", style("✗").red(), style(msg).red());
    }

    /// Print a debug message (only in verbose mode).
    pub fn debug(&self, msg: &str) {
        if !self.verbose || self.json {
            return;
        }
        eprintln!("{} {}", style("→").dim(), style(msg).dim());
    }

    /// Print a header/title.
    pub fn header(&self, msg: &str) {
        if self.json {
            return;
        }
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a step in a process.
    pub fn step(&self, num: usize, total: usize, msg: &str) {
        if self.json {
            return;
        }
        println!(
            "{} {}",
            style(format!("[{}/{}]", num, total)).dim(),
            msg
        );
    }

    /// Print a key-value pair.
    pub fn kv(&self, key: &str, value: &str) {
        if self.json {
            return;
        }
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print raw text (markup) unchanged.
    pub fn raw(&self, text: &str) {
        if self.json {
            return;
        }
        print!("{}", text);
        if !text.ends_with('\n') {
            println!();
        }
    }

    /// Print a document patch, one line per mutation.
    pub fn patch(&self, patch: &HeadPatch, title: Option<&str>) {
        if self.json {
            return;
        }
        if patch.is_empty() {
            println!("  {}", style("(no changes)").dim());
            return;
        }
        if patch.title_changed {
            println!(
                "  {} title = {}",
                style("~").yellow(),
                title.unwrap_or("(none)")
            );
        }
        for element in &patch.removed {
            println!("  {} {}", style("-").red(), element_markup(element));
        }
        for element in &patch.added {
            println!("  {} {}", style("+").green(), element_markup(element));
        }
        if patch.html_attrs_changed {
            println!("  {} <html> attributes", style("~").yellow());
        }
        if patch.body_attrs_changed {
            println!("  {} <body> attributes", style("~").yellow());
        }
    }

    /// Print JSON output.
    pub fn json<T: Serialize>(&self, value: &T) {
        if let Ok(json) = serde_json::to_string_pretty(value) {
            println!("{}", json);
        }
    }

    /// Check if JSON mode is enabled.
    pub fn is_json(&self) -> bool {
        self.json
    }
}

/// Markup for a managed head element.
pub fn element_markup(element: &HeadElement) -> String {
    format!(
        "<{}{}>",
        element.kind.as_str(),
        render_attrs(&element.attributes)
    )
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use turbo_head::TagKind;

    use super::*;

    #[test]
    fn test_element_markup() {
        let element = HeadElement::new(
            TagKind::Link,
            BTreeMap::from([
                ("href".to_string(), "/a.css".to_string()),
                ("rel".to_string(), "stylesheet".to_string()),
            ]),
        );
        assert_eq!(
            element_markup(&element),
            r#"<link rel="stylesheet" href="/a.css">"#
        );
    }
}
