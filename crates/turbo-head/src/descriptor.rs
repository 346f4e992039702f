//! Head descriptors contributed by components.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde::{de, ser, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{HeadError, HeadResult};

/// Placeholder replaced by the raw title in string templates.
pub const TITLE_PLACEHOLDER: &str = "%s";

/// Rule turning a raw page title into the displayed title.
#[derive(Clone)]
pub enum TitleTemplate {
    /// Template string; every `%s` is replaced by the raw title.
    Static(String),
    /// Function applied to the raw title.
    Function(Rc<dyn Fn(&str) -> String>),
}

impl TitleTemplate {
    /// Create a `%s` string template.
    pub fn new(template: impl Into<String>) -> Self {
        Self::Static(template.into())
    }

    /// Create a function template.
    pub fn from_fn(f: impl Fn(&str) -> String + 'static) -> Self {
        Self::Function(Rc::new(f))
    }

    /// Apply the template to a raw title.
    pub fn apply(&self, title: &str) -> String {
        match self {
            Self::Static(template) => template.replace(TITLE_PLACEHOLDER, title),
            Self::Function(f) => f(title),
        }
    }

    /// Whether this is a string template.
    pub fn is_static(&self) -> bool {
        matches!(self, Self::Static(_))
    }
}

impl fmt::Debug for TitleTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(template) => f.debug_tuple("Static").field(template).finish(),
            Self::Function(_) => f.write_str("Function(..)"),
        }
    }
}

// Function templates compare by identity.
impl PartialEq for TitleTemplate {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Static(a), Self::Static(b)) => a == b,
            (Self::Function(a), Self::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<&str> for TitleTemplate {
    fn from(template: &str) -> Self {
        Self::new(template)
    }
}

impl From<String> for TitleTemplate {
    fn from(template: String) -> Self {
        Self::Static(template)
    }
}

impl Serialize for TitleTemplate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Static(template) => serializer.serialize_str(template),
            Self::Function(_) => Err(ser::Error::custom(
                "function title templates cannot be serialized",
            )),
        }
    }
}

impl<'de> Deserialize<'de> for TitleTemplate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TemplateVisitor;

        impl de::Visitor<'_> for TemplateVisitor {
            type Value = TitleTemplate;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a title template string containing %s")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(TitleTemplate::new(v))
            }
        }

        deserializer.deserialize_str(TemplateVisitor)
    }
}

/// A single `<meta>` or `<link>` contribution.
///
/// Entries carrying a `key` are deduplicated across contributions; entries
/// without one are concatenated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagEntry {
    /// Deduplication key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Tag attributes.
    #[serde(flatten)]
    pub attributes: BTreeMap<String, String>,
}

/// A `<meta>` entry.
pub type MetaEntry = TagEntry;

/// A `<link>` entry.
pub type LinkEntry = TagEntry;

impl TagEntry {
    /// Create an empty entry.
    pub fn new() -> Self {
        Self::default()
    }

    /// `<meta name=".." content="..">`.
    pub fn named(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new().attr("name", name).attr("content", content)
    }

    /// `<meta property=".." content="..">`.
    pub fn property(property: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new()
            .attr("property", property)
            .attr("content", content)
    }

    /// `<meta charset="..">` keyed as `charset`.
    pub fn charset(charset: impl Into<String>) -> Self {
        Self::new().with_key("charset").attr("charset", charset)
    }

    /// `<link rel=".." href="..">`.
    pub fn link(rel: impl Into<String>, href: impl Into<String>) -> Self {
        Self::new().attr("rel", rel).attr("href", href)
    }

    /// Set the deduplication key.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set an attribute.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Get an attribute value.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|s| s.as_str())
    }

    /// Check the entry against the tag contract.
    pub fn validate(&self) -> HeadResult<()> {
        if matches!(self.key.as_deref(), Some("")) {
            return Err(HeadError::contract("entry key must not be empty"));
        }
        if self.attributes.is_empty() {
            return Err(HeadError::contract(match &self.key {
                Some(key) => format!("entry '{}' has no attributes", key),
                None => "entry has no attributes".to_string(),
            }));
        }
        validate_attr_names(self.attributes.keys())
    }
}

/// A component's desired contribution to the document head.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HeadDescriptor {
    /// Raw page title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Title template declared by this contribution.
    #[serde(
        default,
        alias = "title_template",
        skip_serializing_if = "Option::is_none"
    )]
    pub title_template: Option<TitleTemplate>,
    /// Document charset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charset: Option<String>,
    /// Viewport meta content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<String>,
    /// Meta entries in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub meta: Vec<MetaEntry>,
    /// Link entries in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub link: Vec<LinkEntry>,
    /// Attributes for the `<html>` element.
    #[serde(default, alias = "html_attrs", skip_serializing_if = "BTreeMap::is_empty")]
    pub html_attrs: BTreeMap<String, String>,
    /// Attributes for the `<body>` element.
    #[serde(default, alias = "body_attrs", skip_serializing_if = "BTreeMap::is_empty")]
    pub body_attrs: BTreeMap<String, String>,
}

impl HeadDescriptor {
    /// Create an empty descriptor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a descriptor from untyped JSON.
    ///
    /// Shape errors (a non-string title, numeric attribute values, unknown
    /// fields) are contract violations.
    pub fn from_json(json: &str) -> HeadResult<Self> {
        let descriptor: Self = serde_json::from_str(json)
            .map_err(|e| HeadError::contract(format!("malformed head descriptor: {}", e)))?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Convert an already parsed JSON value.
    pub fn from_value(value: serde_json::Value) -> HeadResult<Self> {
        let descriptor: Self = serde_json::from_value(value)
            .map_err(|e| HeadError::contract(format!("malformed head descriptor: {}", e)))?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Declare a title template.
    pub fn with_title_template(mut self, template: impl Into<TitleTemplate>) -> Self {
        self.title_template = Some(template.into());
        self
    }

    /// Set the charset.
    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    /// Set the viewport.
    pub fn with_viewport(mut self, viewport: impl Into<String>) -> Self {
        self.viewport = Some(viewport.into());
        self
    }

    /// Append a meta entry.
    pub fn with_meta(mut self, entry: MetaEntry) -> Self {
        self.meta.push(entry);
        self
    }

    /// Append a link entry.
    pub fn with_link(mut self, entry: LinkEntry) -> Self {
        self.link.push(entry);
        self
    }

    /// Set an `<html>` attribute.
    pub fn with_html_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.html_attrs.insert(name.into(), value.into());
        self
    }

    /// Set a `<body>` attribute.
    pub fn with_body_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.body_attrs.insert(name.into(), value.into());
        self
    }

    /// Whether this descriptor declares a title template.
    pub fn declares_template(&self) -> bool {
        self.title_template.is_some()
    }

    /// Whether the descriptor contributes nothing.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.title_template.is_none()
            && self.charset.is_none()
            && self.viewport.is_none()
            && self.meta.is_empty()
            && self.link.is_empty()
            && self.html_attrs.is_empty()
            && self.body_attrs.is_empty()
    }

    /// Check the descriptor against the head contract.
    pub fn validate(&self) -> HeadResult<()> {
        for entry in self.meta.iter().chain(self.link.iter()) {
            entry.validate()?;
        }
        validate_attr_names(self.html_attrs.keys())?;
        validate_attr_names(self.body_attrs.keys())
    }
}

fn validate_attr_names<'a>(names: impl IntoIterator<Item = &'a String>) -> HeadResult<()> {
    for name in names {
        if !is_valid_attr_name(name) {
            return Err(HeadError::contract(format!(
                "invalid attribute name '{}'",
                name
            )));
        }
    }
    Ok(())
}

fn is_valid_attr_name(name: &str) -> bool {
    !name.is_empty()
        && name.chars().all(|c| {
            !c.is_whitespace()
                && !c.is_control()
                && !matches!(c, '"' | '\'' | '<' | '>' | '/' | '=')
        })
}
