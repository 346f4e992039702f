//! Live document head synchronization.
//!
//! [`HeadDocument`] is the seam to whatever owns the rendered head (a
//! browser DOM binding, a test double). [`apply_head`] diffs the managed
//! elements against a [`ResolvedHead`] and issues the minimal removals and
//! insertions, so that afterwards the document's managed elements are in
//! one-to-one correspondence with the resolved head.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::merge::ResolvedHead;

/// Kind of managed head element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TagKind {
    Meta,
    Link,
}

impl TagKind {
    /// HTML tag name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Meta => "meta",
            Self::Link => "link",
        }
    }
}

/// A managed `<meta>` or `<link>` element as it exists in the document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct HeadElement {
    /// Element kind.
    pub kind: TagKind,
    /// Element attributes.
    pub attributes: BTreeMap<String, String>,
}

impl HeadElement {
    /// Create an element.
    pub fn new(kind: TagKind, attributes: BTreeMap<String, String>) -> Self {
        Self { kind, attributes }
    }
}

/// Element whose attributes the head manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrTarget {
    Html,
    Body,
}

/// Mutable view of a rendered document head.
pub trait HeadDocument {
    /// Current document title.
    fn title(&self) -> Option<String>;

    /// Set or clear the title.
    fn set_title(&mut self, title: Option<&str>);

    /// Managed elements in document order.
    fn elements(&self) -> Vec<HeadElement>;

    /// Append a managed element.
    fn append(&mut self, element: HeadElement);

    /// Remove one managed element equal to `element`.
    fn remove(&mut self, element: &HeadElement) -> bool;

    /// Managed attributes of `<html>` or `<body>`.
    fn attrs(&self, target: AttrTarget) -> BTreeMap<String, String>;

    /// Replace the managed attributes of `<html>` or `<body>`.
    fn set_attrs(&mut self, target: AttrTarget, attrs: &BTreeMap<String, String>);
}

/// Mutations performed by one application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HeadPatch {
    /// The title was changed.
    pub title_changed: bool,
    /// Elements removed from the document.
    pub removed: Vec<HeadElement>,
    /// Elements added to the document.
    pub added: Vec<HeadElement>,
    /// `<html>` attributes were rewritten.
    pub html_attrs_changed: bool,
    /// `<body>` attributes were rewritten.
    pub body_attrs_changed: bool,
}

impl HeadPatch {
    /// Whether the application changed nothing.
    pub fn is_empty(&self) -> bool {
        !self.title_changed
            && self.removed.is_empty()
            && self.added.is_empty()
            && !self.html_attrs_changed
            && !self.body_attrs_changed
    }
}

/// Elements a resolved head should produce, in render order.
///
/// Dedup keys are bookkeeping only and never reach the document.
pub fn desired_elements(head: &ResolvedHead) -> Vec<HeadElement> {
    let meta = head
        .meta
        .iter()
        .map(|m| HeadElement::new(TagKind::Meta, m.attributes.clone()));
    let link = head
        .link
        .iter()
        .map(|l| HeadElement::new(TagKind::Link, l.attributes.clone()));
    meta.chain(link).collect()
}

/// Bring `document` in line with `head`.
pub fn apply_head<D: HeadDocument + ?Sized>(document: &mut D, head: &ResolvedHead) -> HeadPatch {
    let mut patch = HeadPatch::default();

    if document.title() != head.title {
        document.set_title(head.title.as_deref());
        patch.title_changed = true;
    }

    let current = document.elements();
    let desired = desired_elements(head);

    // Multiset difference: equal elements are interchangeable.
    let mut available: HashMap<&HeadElement, usize> = HashMap::new();
    for element in &current {
        *available.entry(element).or_insert(0) += 1;
    }
    for element in &desired {
        match available.get_mut(element) {
            Some(count) if *count > 0 => *count -= 1,
            _ => patch.added.push(element.clone()),
        }
    }
    for element in &current {
        if let Some(count) = available.get_mut(element) {
            if *count > 0 {
                *count -= 1;
                patch.removed.push(element.clone());
            }
        }
    }

    for element in &patch.removed {
        document.remove(element);
    }
    for element in &patch.added {
        document.append(element.clone());
    }

    if document.attrs(AttrTarget::Html) != head.html_attrs {
        document.set_attrs(AttrTarget::Html, &head.html_attrs);
        patch.html_attrs_changed = true;
    }
    if document.attrs(AttrTarget::Body) != head.body_attrs {
        document.set_attrs(AttrTarget::Body, &head.body_attrs);
        patch.body_attrs_changed = true;
    }

    patch
}

/// In-memory [`HeadDocument`] for tests, tooling and non-browser hosts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MemoryDocument {
    title: Option<String>,
    elements: Vec<HeadElement>,
    html_attrs: BTreeMap<String, String>,
    body_attrs: BTreeMap<String, String>,
    #[serde(skip)]
    mutations: usize,
}

impl MemoryDocument {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a document that already contains server-rendered elements.
    pub fn hydrated(title: Option<&str>, elements: Vec<HeadElement>) -> Self {
        Self {
            title: title.map(str::to_string),
            elements,
            ..Self::default()
        }
    }

    /// Number of mutations applied so far.
    pub fn mutations(&self) -> usize {
        self.mutations
    }

    /// Sorted copy of the managed elements, for order-insensitive comparison.
    pub fn snapshot(&self) -> Vec<HeadElement> {
        let mut elements = self.elements.clone();
        elements.sort();
        elements
    }
}

impl HeadDocument for MemoryDocument {
    fn title(&self) -> Option<String> {
        self.title.clone()
    }

    fn set_title(&mut self, title: Option<&str>) {
        self.title = title.map(str::to_string);
        self.mutations += 1;
    }

    fn elements(&self) -> Vec<HeadElement> {
        self.elements.clone()
    }

    fn append(&mut self, element: HeadElement) {
        self.elements.push(element);
        self.mutations += 1;
    }

    fn remove(&mut self, element: &HeadElement) -> bool {
        match self.elements.iter().position(|e| e == element) {
            Some(index) => {
                self.elements.remove(index);
                self.mutations += 1;
                true
            }
            None => false,
        }
    }

    fn attrs(&self, target: AttrTarget) -> BTreeMap<String, String> {
        match target {
            AttrTarget::Html => self.html_attrs.clone(),
            AttrTarget::Body => self.body_attrs.clone(),
        }
    }

    fn set_attrs(&mut self, target: AttrTarget, attrs: &BTreeMap<String, String>) {
        match target {
            AttrTarget::Html => self.html_attrs = attrs.clone(),
            AttrTarget::Body => self.body_attrs = attrs.clone(),
        }
        self.mutations += 1;
    }
}
