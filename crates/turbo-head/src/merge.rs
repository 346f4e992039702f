//! Merging active contributions into one resolved head.
//!
//! Merging is pure: the same contributions and template always produce an
//! equal [`ResolvedHead`], which lets consumers skip redundant applications.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::descriptor::{HeadDescriptor, LinkEntry, MetaEntry, TagEntry, TitleTemplate};

/// Identity used for charset meta entries.
pub const CHARSET_KEY: &str = "charset";

/// Identity used for viewport meta entries.
pub const VIEWPORT_KEY: &str = "viewport";

/// The single merged head document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedHead {
    /// Effective title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Meta entries; charset and viewport appear at most once each.
    pub meta: Vec<MetaEntry>,
    /// Link entries.
    pub link: Vec<LinkEntry>,
    /// Merged `<html>` attributes.
    pub html_attrs: BTreeMap<String, String>,
    /// Merged `<body>` attributes.
    pub body_attrs: BTreeMap<String, String>,
}

impl ResolvedHead {
    /// Effective charset, if any.
    pub fn charset(&self) -> Option<&str> {
        self.meta.iter().find_map(|m| m.get("charset"))
    }

    /// Content of the first meta entry with the given `name`.
    pub fn meta_content(&self, name: &str) -> Option<&str> {
        self.meta
            .iter()
            .find(|m| m.get("name") == Some(name))
            .and_then(|m| m.get("content"))
    }

    /// Whether nothing would be rendered.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.meta.is_empty()
            && self.link.is_empty()
            && self.html_attrs.is_empty()
            && self.body_attrs.is_empty()
    }
}

/// Derived fields that take precedence over raw entries.
///
/// Rebuilt on every merge; never stored as a contribution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideLayer {
    /// Title produced by the template.
    pub title: Option<String>,
    /// Charset and viewport entries.
    pub meta: Vec<MetaEntry>,
}

/// Compute the override layer for contributions in registration order.
pub fn override_layer(
    descriptors: &[&HeadDescriptor],
    template: Option<&TitleTemplate>,
) -> OverrideLayer {
    let title = template.and_then(|template| {
        descriptors
            .iter()
            .rev()
            .find_map(|d| d.title.as_deref().filter(|t| !t.is_empty()))
            .map(|raw| template.apply(raw))
    });

    let mut meta = Vec::new();
    if let Some(charset) = first_non_empty(descriptors, |d| d.charset.as_deref()) {
        meta.push(TagEntry::charset(charset));
    }
    if let Some(viewport) = first_non_empty(descriptors, |d| d.viewport.as_deref()) {
        meta.push(TagEntry::named(VIEWPORT_KEY, viewport));
    }

    OverrideLayer { title, meta }
}

/// Merge contributions (in registration order) into a resolved head.
pub fn resolve<'a>(
    contributions: impl IntoIterator<Item = &'a HeadDescriptor>,
    template: Option<&TitleTemplate>,
) -> ResolvedHead {
    let descriptors: Vec<&HeadDescriptor> = contributions.into_iter().collect();
    let overrides = override_layer(&descriptors, template);

    let mut meta: Vec<MetaEntry> = Vec::new();
    let mut link: Vec<LinkEntry> = Vec::new();
    let mut html_attrs = BTreeMap::new();
    let mut body_attrs = BTreeMap::new();

    for descriptor in &descriptors {
        for entry in &descriptor.meta {
            upsert(&mut meta, entry.clone(), meta_identity);
        }
        for entry in &descriptor.link {
            upsert(&mut link, entry.clone(), link_identity);
        }
        html_attrs.extend(descriptor.html_attrs.clone());
        body_attrs.extend(descriptor.body_attrs.clone());
    }

    // Override entries replace their raw counterpart in place, otherwise lead.
    let mut leading = Vec::new();
    for entry in overrides.meta {
        let identity = meta_identity(&entry).map(str::to_string);
        match meta
            .iter()
            .position(|m| identity.is_some() && meta_identity(m) == identity.as_deref())
        {
            Some(slot) => meta[slot] = entry,
            None => leading.push(entry),
        }
    }
    leading.extend(meta);

    let title = overrides
        .title
        .or_else(|| descriptors.iter().rev().find_map(|d| d.title.clone()));

    ResolvedHead {
        title,
        meta: leading,
        link,
        html_attrs,
        body_attrs,
    }
}

/// Deduplication identity of a meta entry.
///
/// Charset and viewport entries always share a fixed identity, whatever
/// their key, so that each appears at most once. Other entries use their
/// explicit key.
pub fn meta_identity(entry: &MetaEntry) -> Option<&str> {
    if entry.attributes.contains_key("charset") {
        return Some(CHARSET_KEY);
    }
    if entry.get("name") == Some(VIEWPORT_KEY) {
        return Some(VIEWPORT_KEY);
    }
    entry.key.as_deref()
}

/// Deduplication identity of a link entry.
pub fn link_identity(entry: &LinkEntry) -> Option<&str> {
    entry.key.as_deref()
}

fn upsert(entries: &mut Vec<TagEntry>, entry: TagEntry, identity: fn(&TagEntry) -> Option<&str>) {
    if let Some(id) = identity(&entry) {
        if let Some(existing) = entries.iter_mut().find(|e| identity(e) == Some(id)) {
            *existing = entry;
            return;
        }
    }
    entries.push(entry);
}

fn first_non_empty<'a>(
    descriptors: &[&'a HeadDescriptor],
    field: impl Fn(&'a HeadDescriptor) -> Option<&'a str>,
) -> Option<&'a str> {
    descriptors
        .iter()
        .find_map(|d| field(*d).filter(|v| !v.is_empty()))
}
