//! Pushing resolved heads to their consumer.
//!
//! A [`ReactiveBinder`] connects a [`HeadStore`] to one [`HeadConsumer`]:
//! the server renderer, which serializes on demand, or a live document,
//! which is kept in sync as the store changes.

use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::document::{apply_head, HeadDocument, HeadPatch};
use crate::merge::ResolvedHead;
use crate::render::{render_head, SerializedHead};
use crate::signal::Subscription;
use crate::store::{HeadStore, StoreChange};

/// When store changes reach a live document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPolicy {
    /// Apply after every change.
    #[default]
    Immediate,
    /// Mark dirty and apply on `flush`. Withdrawals still apply at once.
    Batched,
}

impl SyncPolicy {
    /// Check if a change should be applied without waiting for a flush.
    pub fn applies_immediately(&self, change: &StoreChange) -> bool {
        matches!(self, Self::Immediate) || change.is_withdrawal()
    }
}

/// Binder lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BinderPhase {
    /// Not subscribed to the store.
    Idle,
    /// Tree mounted, changes flow to the consumer.
    Bound,
    /// Detached for good.
    Unbound,
}

/// Where a head ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    Server,
    Client,
}

/// Receiver of resolved heads.
pub trait HeadConsumer {
    /// Render mode this consumer serves.
    fn mode(&self) -> RenderMode;

    /// Take the latest resolved head.
    fn consume(&mut self, head: &ResolvedHead);
}

/// Server-side consumer that serializes the head to markup.
#[derive(Debug, Clone, Default)]
pub struct ServerRenderer {
    output: Option<SerializedHead>,
    renders: usize,
}

impl ServerRenderer {
    /// Renderer that has not serialized anything yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Last serialized head.
    pub fn output(&self) -> Option<&SerializedHead> {
        self.output.as_ref()
    }

    /// Number of serializations performed.
    pub fn renders(&self) -> usize {
        self.renders
    }
}

impl HeadConsumer for ServerRenderer {
    fn mode(&self) -> RenderMode {
        RenderMode::Server
    }

    fn consume(&mut self, head: &ResolvedHead) {
        self.output = Some(render_head(head));
        self.renders += 1;
    }
}

/// Client-side consumer that keeps a live document in sync.
#[derive(Debug)]
pub struct DocumentSync<D> {
    document: D,
    last: Option<ResolvedHead>,
    last_patch: Option<HeadPatch>,
    applications: usize,
}

impl<D: HeadDocument> DocumentSync<D> {
    /// Wrap a document. Existing managed elements are adopted on first apply.
    pub fn new(document: D) -> Self {
        Self {
            document,
            last: None,
            last_patch: None,
            applications: 0,
        }
    }

    /// The document being synchronized.
    pub fn document(&self) -> &D {
        &self.document
    }

    /// Mutable access to the document, bypassing synchronization.
    pub fn document_mut(&mut self) -> &mut D {
        &mut self.document
    }

    /// Consume the sync and return the document.
    pub fn into_document(self) -> D {
        self.document
    }

    /// Patch produced by the most recent application.
    pub fn last_patch(&self) -> Option<&HeadPatch> {
        self.last_patch.as_ref()
    }

    /// Number of applications that reached the document.
    pub fn applications(&self) -> usize {
        self.applications
    }
}

impl<D: HeadDocument> HeadConsumer for DocumentSync<D> {
    fn mode(&self) -> RenderMode {
        RenderMode::Client
    }

    fn consume(&mut self, head: &ResolvedHead) {
        if self.last.as_ref() == Some(head) {
            trace!("resolved head unchanged, skipping apply");
            return;
        }

        let patch = apply_head(&mut self.document, head);
        debug!(
            added = patch.added.len(),
            removed = patch.removed.len(),
            title_changed = patch.title_changed,
            "applied head to document"
        );
        self.applications += 1;
        self.last = Some(head.clone());
        self.last_patch = Some(patch);
    }
}

struct BinderInner<C> {
    store: HeadStore,
    consumer: RefCell<C>,
    policy: SyncPolicy,
    phase: Cell<BinderPhase>,
    dirty: Cell<bool>,
    subscription: RefCell<Option<Subscription>>,
}

impl<C: HeadConsumer> BinderInner<C> {
    fn apply(&self) {
        let head = self.store.resolve();
        self.dirty.set(false);
        self.consumer.borrow_mut().consume(&head);
    }

    fn on_change(&self, change: &StoreChange) {
        if self.phase.get() != BinderPhase::Bound {
            return;
        }
        if self.policy.applies_immediately(change) {
            self.apply();
        } else {
            trace!(?change, "head change deferred until flush");
            self.dirty.set(true);
        }
    }
}

/// Connects a store to a consumer.
pub struct ReactiveBinder<C> {
    inner: Rc<BinderInner<C>>,
}

impl<C: HeadConsumer + 'static> ReactiveBinder<C> {
    /// Create an idle binder.
    pub fn new(store: HeadStore, consumer: C, policy: SyncPolicy) -> Self {
        Self {
            inner: Rc::new(BinderInner {
                store,
                consumer: RefCell::new(consumer),
                policy,
                phase: Cell::new(BinderPhase::Idle),
                dirty: Cell::new(false),
                subscription: RefCell::new(None),
            }),
        }
    }

    /// Handle the "tree mounted" signal.
    ///
    /// Client consumers subscribe to the store and receive the current head
    /// at once. Server consumers never bind. Returns whether this call bound.
    pub fn mount(&self) -> bool {
        if self.inner.phase.get() != BinderPhase::Idle {
            trace!(phase = ?self.inner.phase.get(), "mount ignored");
            return false;
        }
        if self.mode() == RenderMode::Server {
            trace!("server binder stays idle on mount");
            return false;
        }

        let weak: Weak<BinderInner<C>> = Rc::downgrade(&self.inner);
        let subscription = self.inner.store.subscribe(move |change| {
            if let Some(inner) = weak.upgrade() {
                inner.on_change(change);
            }
        });
        *self.inner.subscription.borrow_mut() = Some(subscription);
        self.inner.phase.set(BinderPhase::Bound);
        debug!(policy = ?self.inner.policy, "head binder bound");

        self.inner.apply();
        true
    }

    /// Apply pending batched changes. Returns whether anything was applied.
    pub fn flush(&self) -> bool {
        if self.inner.phase.get() != BinderPhase::Bound || !self.inner.dirty.get() {
            return false;
        }
        self.inner.apply();
        true
    }

    /// Stop listening to the store.
    pub fn unbind(&self) {
        if self.inner.phase.get() == BinderPhase::Unbound {
            return;
        }
        let subscription = self.inner.subscription.borrow_mut().take();
        drop(subscription);
        self.inner.phase.set(BinderPhase::Unbound);
        self.inner.dirty.set(false);
        debug!("head binder unbound");
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> BinderPhase {
        self.inner.phase.get()
    }

    /// Sync policy fixed at construction.
    pub fn policy(&self) -> SyncPolicy {
        self.inner.policy
    }

    /// Whether batched changes are waiting for a flush.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    /// Render mode of the consumer.
    pub fn mode(&self) -> RenderMode {
        self.inner.consumer.borrow().mode()
    }

    /// Borrow the consumer.
    ///
    /// Do not hold the borrow across store mutations while bound.
    pub fn consumer(&self) -> Ref<'_, C> {
        self.inner.consumer.borrow()
    }

    /// Mutate the consumer.
    pub fn with_consumer<R>(&self, f: impl FnOnce(&mut C) -> R) -> R {
        f(&mut *self.inner.consumer.borrow_mut())
    }

    /// The bound store.
    pub fn store(&self) -> &HeadStore {
        &self.inner.store
    }
}

impl ReactiveBinder<ServerRenderer> {
    /// Serialize the current head.
    ///
    /// Meant to run once per request after all registrations; repeated calls
    /// work but are logged.
    pub fn serialize(&self) -> SerializedHead {
        let head = self.inner.store.resolve();
        let mut renderer = self.inner.consumer.borrow_mut();
        if renderer.renders() > 0 {
            warn!(
                renders = renderer.renders() + 1,
                "head serialized more than once for the same request"
            );
        }
        renderer.consume(&head);
        renderer.output().cloned().unwrap_or_default()
    }
}

impl<C> Drop for ReactiveBinder<C> {
    fn drop(&mut self) {
        self.inner.subscription.borrow_mut().take();
    }
}

impl<C> fmt::Debug for ReactiveBinder<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveBinder")
            .field("phase", &self.inner.phase.get())
            .field("policy", &self.inner.policy)
            .field("dirty", &self.inner.dirty.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{HeadDescriptor, TagEntry};
    use crate::document::MemoryDocument;

    fn client(store: &HeadStore, policy: SyncPolicy) -> ReactiveBinder<DocumentSync<MemoryDocument>> {
        ReactiveBinder::new(store.clone(), DocumentSync::new(MemoryDocument::new()), policy)
    }

    fn title(binder: &ReactiveBinder<DocumentSync<MemoryDocument>>) -> Option<String> {
        binder.consumer().document().title()
    }

    // === Policy Tests ===

    #[test]
    fn test_sync_policy_default() {
        assert_eq!(SyncPolicy::default(), SyncPolicy::Immediate);
    }

    #[test]
    fn test_batched_applies_withdrawals_immediately() {
        let id = HeadStore::new()
            .register(HeadDescriptor::new())
            .unwrap()
            .id();
        assert!(SyncPolicy::Batched.applies_immediately(&StoreChange::Withdrawn(id)));
        assert!(!SyncPolicy::Batched.applies_immediately(&StoreChange::Registered(id)));
        assert!(SyncPolicy::Immediate.applies_immediately(&StoreChange::Updated(id)));
    }

    #[test]
    fn test_sync_policy_serde() {
        let policy: SyncPolicy = serde_json::from_str(r#""batched""#).unwrap();
        assert_eq!(policy, SyncPolicy::Batched);
    }

    // === Lifecycle Tests ===

    #[test]
    fn test_mount_binds_and_applies() {
        let store = HeadStore::new();
        store.register(HeadDescriptor::new().with_title("Home")).unwrap();
        let binder = client(&store, SyncPolicy::Immediate);

        assert_eq!(binder.phase(), BinderPhase::Idle);
        assert!(title(&binder).is_none());

        assert!(binder.mount());
        assert_eq!(binder.phase(), BinderPhase::Bound);
        assert_eq!(title(&binder).as_deref(), Some("Home"));
    }

    #[test]
    fn test_mount_fires_once() {
        let store = HeadStore::new();
        let binder = client(&store, SyncPolicy::Immediate);
        assert!(binder.mount());
        assert!(!binder.mount());
        assert_eq!(binder.consumer().applications(), 1);
    }

    #[test]
    fn test_changes_before_mount_are_not_applied() {
        let store = HeadStore::new();
        let binder = client(&store, SyncPolicy::Immediate);
        store.register(HeadDescriptor::new().with_title("Early")).unwrap();
        assert!(title(&binder).is_none());
    }

    #[test]
    fn test_immediate_applies_every_change() {
        let store = HeadStore::new();
        let binder = client(&store, SyncPolicy::Immediate);
        binder.mount();

        let handle = store.register(HeadDescriptor::new().with_title("A")).unwrap();
        assert_eq!(title(&binder).as_deref(), Some("A"));

        handle.update(HeadDescriptor::new().with_title("B")).unwrap();
        assert_eq!(title(&binder).as_deref(), Some("B"));

        handle.withdraw();
        assert!(title(&binder).is_none());
    }

    #[test]
    fn test_batched_waits_for_flush() {
        let store = HeadStore::new();
        let binder = client(&store, SyncPolicy::Batched);
        binder.mount();

        store.register(HeadDescriptor::new().with_title("A")).unwrap();
        store
            .register(HeadDescriptor::new().with_meta(TagEntry::named("description", "x")))
            .unwrap();
        assert!(binder.is_dirty());
        assert!(title(&binder).is_none());

        assert!(binder.flush());
        assert_eq!(title(&binder).as_deref(), Some("A"));
        assert_eq!(binder.consumer().document().elements().len(), 1);
        assert!(!binder.flush());
    }

    #[test]
    fn test_batched_withdrawal_applies_latest_state() {
        let store = HeadStore::new();
        let binder = client(&store, SyncPolicy::Batched);
        binder.mount();

        let a = store.register(HeadDescriptor::new().with_title("A")).unwrap();
        store.register(HeadDescriptor::new().with_title("B")).unwrap();
        a.withdraw();

        assert!(!binder.is_dirty());
        assert_eq!(title(&binder).as_deref(), Some("B"));
    }

    #[test]
    fn test_unbind_stops_updates() {
        let store = HeadStore::new();
        let binder = client(&store, SyncPolicy::Immediate);
        binder.mount();
        binder.unbind();

        store.register(HeadDescriptor::new().with_title("Late")).unwrap();
        assert_eq!(binder.phase(), BinderPhase::Unbound);
        assert!(title(&binder).is_none());
        assert!(!binder.mount());
    }

    #[test]
    fn test_unchanged_head_is_not_reapplied() {
        let store = HeadStore::new();
        let binder = client(&store, SyncPolicy::Immediate);
        binder.mount();

        let handle = store.register(HeadDescriptor::new().with_title("A")).unwrap();
        let applications = binder.consumer().applications();
        // A keyless empty contribution changes nothing in the merged head.
        store.register(HeadDescriptor::new()).unwrap();
        handle.update(HeadDescriptor::new().with_title("A")).unwrap();
        assert_eq!(binder.consumer().applications(), applications);
    }

    // === Server Tests ===

    #[test]
    fn test_server_never_binds() {
        let store = HeadStore::new();
        let binder = ReactiveBinder::new(store.clone(), ServerRenderer::new(), SyncPolicy::Immediate);
        assert!(!binder.mount());
        assert_eq!(binder.phase(), BinderPhase::Idle);

        store.register(HeadDescriptor::new().with_title("A")).unwrap();
        assert_eq!(binder.consumer().renders(), 0);
    }

    #[test]
    fn test_server_serialize() {
        let store = HeadStore::new();
        store.register(HeadDescriptor::new().with_title("Home")).unwrap();
        let binder = ReactiveBinder::new(store, ServerRenderer::new(), SyncPolicy::Immediate);

        let head = binder.serialize();
        assert_eq!(head.head_tags, "<title>Home</title>\n");
        assert_eq!(binder.consumer().renders(), 1);

        assert_eq!(binder.serialize(), head);
        assert_eq!(binder.consumer().renders(), 2);
    }
}
