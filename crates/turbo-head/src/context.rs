//! Explicit per-render head context.
//!
//! A [`HeadContext`] bundles the store, the binder and the configuration for
//! one page render. The server builds one per request and serializes it
//! once; the client builds one per application and mounts it against the
//! live document.

use std::cell::Ref;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::binder::{
    BinderPhase, DocumentSync, HeadConsumer, ReactiveBinder, RenderMode, ServerRenderer,
};
use crate::config::HeadConfig;
use crate::document::{HeadDocument, HeadPatch};
use crate::error::HeadResult;
use crate::handle::ContributionHandle;
use crate::merge::ResolvedHead;
use crate::owner::Owner;
use crate::render::SerializedHead;
use crate::shell::DocumentShell;
use crate::store::{HeadSource, HeadStore};

/// Head state for one page render.
pub struct HeadContext<C: HeadConsumer + 'static> {
    config: HeadConfig,
    store: HeadStore,
    binder: ReactiveBinder<C>,
    base: Option<ContributionHandle>,
}

/// Server-side context.
pub type ServerHeadContext = HeadContext<ServerRenderer>;

/// Client-side context over a live document.
pub type ClientHeadContext<D> = HeadContext<DocumentSync<D>>;

impl<C: HeadConsumer + 'static> HeadContext<C> {
    /// Build a context around any consumer.
    ///
    /// Configured charset and viewport are registered as the first
    /// contribution; the fallback title goes to the store.
    pub fn new(config: HeadConfig, consumer: C) -> HeadResult<Self> {
        let mut store = match config.template() {
            Some(template) => HeadStore::with_template(template),
            None => HeadStore::new(),
        };
        if let Some(title) = &config.fallback_title {
            store = store.with_fallback_title(title.clone());
        }
        let base = config
            .base_descriptor()
            .map(|descriptor| store.register(descriptor))
            .transpose()?;
        let binder = ReactiveBinder::new(store.clone(), consumer, config.sync);

        debug!(mode = ?binder.mode(), sync = ?config.sync, "created head context");
        Ok(Self {
            config,
            store,
            binder,
            base,
        })
    }

    /// Register a contribution for a component.
    ///
    /// On the client the contribution is withdrawn when `owner` is torn
    /// down. Server contributions live as long as the request.
    pub fn use_head(
        &self,
        owner: Option<&Owner>,
        source: impl Into<HeadSource>,
    ) -> HeadResult<ContributionHandle> {
        let handle = self.store.register(source)?;

        match (self.mode(), owner) {
            (RenderMode::Client, Some(owner)) => {
                let store = self.store.downgrade();
                let id = handle.id();
                owner.on_cleanup(move || {
                    if let Some(store) = store.upgrade() {
                        store.withdraw(id);
                    }
                });
            }
            (RenderMode::Server, Some(owner)) => {
                trace!(owner = owner.label(), handle = %handle.id(), "server contribution not bound to owner");
            }
            (_, None) => {}
        }

        Ok(handle)
    }

    /// Signal that the component tree has mounted.
    pub fn mount(&self) -> bool {
        self.binder.mount()
    }

    /// Stop synchronizing. Contributions stay registered.
    pub fn unmount(&self) {
        self.binder.unbind();
    }

    /// Start a new render pass; see [`HeadStore::begin_pass`].
    pub fn begin_pass(&self) {
        self.store.begin_pass();
    }

    /// The merged head right now.
    pub fn resolved(&self) -> Rc<ResolvedHead> {
        self.store.resolve()
    }

    pub fn store(&self) -> &HeadStore {
        &self.store
    }

    pub fn config(&self) -> &HeadConfig {
        &self.config
    }

    pub fn mode(&self) -> RenderMode {
        self.binder.mode()
    }

    pub fn phase(&self) -> BinderPhase {
        self.binder.phase()
    }

    /// Handle of the configured defaults, if any were registered.
    pub fn base(&self) -> Option<&ContributionHandle> {
        self.base.as_ref()
    }

    pub fn binder(&self) -> &ReactiveBinder<C> {
        &self.binder
    }
}

impl HeadContext<ServerRenderer> {
    /// Fresh server context for one request.
    pub fn server(config: HeadConfig) -> HeadResult<Self> {
        Self::new(config, ServerRenderer::new())
    }

    /// Serialize the head. Call once, after all registrations.
    pub fn render_head(&self) -> SerializedHead {
        self.binder.serialize()
    }

    /// Shell for a streamed response.
    pub fn shell(&self) -> DocumentShell {
        DocumentShell::new(self.render_head())
    }

    /// Render a full HTML document around `body`.
    pub fn render_document(&self, body: &str) -> String {
        self.shell().render(body)
    }
}

impl<D: HeadDocument + 'static> HeadContext<DocumentSync<D>> {
    /// Client context over a live document.
    pub fn client(config: HeadConfig, document: D) -> HeadResult<Self> {
        Self::new(config, DocumentSync::new(document))
    }

    /// Borrow the live document.
    pub fn document(&self) -> Ref<'_, D> {
        Ref::map(self.binder.consumer(), |sync| sync.document())
    }

    /// Patch produced by the most recent application.
    pub fn last_patch(&self) -> Option<HeadPatch> {
        self.binder.consumer().last_patch().cloned()
    }

    /// Apply batched changes now.
    pub fn flush(&self) -> bool {
        self.binder.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::SyncPolicy;
    use crate::descriptor::HeadDescriptor;
    use crate::document::MemoryDocument;

    #[test]
    fn test_server_context_renders_defaults() {
        let ctx = HeadContext::server(HeadConfig::recommended().with_fallback_title("Shop")).unwrap();
        let head = ctx.render_head();
        assert!(head.head_tags.starts_with("<meta charset=\"utf-8\">\n<title>Shop</title>\n"));
        assert!(head.head_tags.contains("name=\"viewport\""));
    }

    #[test]
    fn test_page_title_replaces_fallback() {
        let ctx = HeadContext::server(
            HeadConfig::new()
                .with_fallback_title("Shop")
                .with_title_template("%s | Shop"),
        )
        .unwrap();
        ctx.use_head(None, HeadDescriptor::new().with_title("Cart")).unwrap();
        assert_eq!(ctx.resolved().title.as_deref(), Some("Cart | Shop"));
    }

    #[test]
    fn test_fallback_title_is_not_templated() {
        let ctx = HeadContext::server(
            HeadConfig::new()
                .with_fallback_title("Shop")
                .with_title_template("%s | Shop"),
        )
        .unwrap();
        ctx.use_head(None, HeadDescriptor::new().with_charset("utf-8")).unwrap();
        assert_eq!(ctx.resolved().title.as_deref(), Some("Shop"));
        assert!(ctx.base().is_none());
        assert!(ctx.render_head().head_tags.contains("<title>Shop</title>"));
    }

    #[test]
    fn test_fallback_title_returns_after_page_withdraws() {
        let ctx = HeadContext::client(
            HeadConfig::new()
                .with_fallback_title("Shop")
                .with_title_template("%s | Shop"),
            MemoryDocument::new(),
        )
        .unwrap();
        let owner = Owner::new("page");
        ctx.use_head(Some(&owner), HeadDescriptor::new().with_title("Cart"))
            .unwrap();
        ctx.mount();
        assert_eq!(ctx.document().title().as_deref(), Some("Cart | Shop"));

        owner.teardown();
        assert_eq!(ctx.document().title().as_deref(), Some("Shop"));
    }

    #[test]
    fn test_config_charset_wins_over_components() {
        let ctx = HeadContext::server(HeadConfig::recommended()).unwrap();
        ctx.use_head(None, HeadDescriptor::new().with_charset("latin1")).unwrap();
        assert_eq!(ctx.resolved().charset(), Some("utf-8"));
    }

    #[test]
    fn test_server_never_withdraws_on_teardown() {
        let ctx = HeadContext::server(HeadConfig::new()).unwrap();
        let owner = Owner::new("page");
        ctx.use_head(Some(&owner), HeadDescriptor::new().with_title("Home")).unwrap();
        owner.teardown();
        assert_eq!(ctx.resolved().title.as_deref(), Some("Home"));
        assert_eq!(ctx.phase(), BinderPhase::Idle);
    }

    #[test]
    fn test_client_teardown_withdraws() {
        let ctx = HeadContext::client(HeadConfig::new(), MemoryDocument::new()).unwrap();
        let owner = Owner::new("page");
        let handle = ctx
            .use_head(Some(&owner), HeadDescriptor::new().with_title("Home"))
            .unwrap();
        ctx.mount();
        assert_eq!(ctx.document().title().as_deref(), Some("Home"));

        owner.teardown();
        assert!(!handle.is_active());
        assert!(ctx.document().title().is_none());
    }

    #[test]
    fn test_client_batched_flush() {
        let ctx = HeadContext::client(
            HeadConfig::new().with_sync(SyncPolicy::Batched),
            MemoryDocument::new(),
        )
        .unwrap();
        ctx.mount();
        ctx.use_head(None, HeadDescriptor::new().with_title("Later")).unwrap();
        assert!(ctx.document().title().is_none());
        assert!(ctx.flush());
        assert_eq!(ctx.document().title().as_deref(), Some("Later"));
        assert!(ctx.last_patch().unwrap().title_changed);
    }

    #[test]
    fn test_render_document() {
        let ctx = HeadContext::server(HeadConfig::new()).unwrap();
        ctx.use_head(None, HeadDescriptor::new().with_html_attr("lang", "en"))
            .unwrap();
        let html = ctx.render_document("<p>hi</p>");
        assert!(html.starts_with("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n</head>\n<body>\n<p>hi</p>\n"));
    }
}
