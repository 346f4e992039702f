//! Per-render registry of head contributions.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use serde::Serialize;
use tracing::{debug, trace};

use crate::descriptor::{HeadDescriptor, TitleTemplate};
use crate::error::HeadResult;
use crate::handle::ContributionHandle;
use crate::merge::{self, ResolvedHead};
use crate::signal::{Notifier, Subscription};

/// Identifies one registration within a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct HandleId(u64);

impl HandleId {
    /// Raw numeric value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "head-{}", self.0)
    }
}

/// Where a contribution's descriptor comes from.
#[derive(Clone)]
pub enum HeadSource {
    /// A fixed descriptor.
    Static(HeadDescriptor),
    /// A getter re-evaluated on `refresh` or when a tracked signal changes.
    Getter(Rc<dyn Fn() -> HeadDescriptor>),
}

impl HeadSource {
    /// Wrap a reactive getter.
    pub fn getter(f: impl Fn() -> HeadDescriptor + 'static) -> Self {
        Self::Getter(Rc::new(f))
    }

    /// Current descriptor.
    pub fn evaluate(&self) -> HeadDescriptor {
        match self {
            Self::Static(descriptor) => descriptor.clone(),
            Self::Getter(getter) => getter(),
        }
    }

    /// Whether the source can produce new values.
    pub fn is_reactive(&self) -> bool {
        matches!(self, Self::Getter(_))
    }
}

impl From<HeadDescriptor> for HeadSource {
    fn from(descriptor: HeadDescriptor) -> Self {
        Self::Static(descriptor)
    }
}

impl fmt::Debug for HeadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(descriptor) => f.debug_tuple("Static").field(descriptor).finish(),
            Self::Getter(_) => f.write_str("Getter(..)"),
        }
    }
}

/// Change broadcast to store subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreChange {
    /// A contribution was registered.
    Registered(HandleId),
    /// A contribution's descriptor changed.
    Updated(HandleId),
    /// A contribution was withdrawn.
    Withdrawn(HandleId),
    /// The title template was replaced by the host.
    TemplateChanged,
}

impl StoreChange {
    /// Whether this change removed a contribution.
    pub fn is_withdrawal(&self) -> bool {
        matches!(self, Self::Withdrawn(_))
    }
}

struct Contribution {
    id: HandleId,
    source: HeadSource,
    descriptor: HeadDescriptor,
    subscriptions: Vec<Subscription>,
}

#[derive(Default)]
struct StoreState {
    next_id: u64,
    contributions: Vec<Contribution>,
    template: Option<TitleTemplate>,
    /// Raw title used when no contribution supplies one.
    fallback_title: Option<String>,
    /// Set once a registration captured the template in the current pass.
    template_captured: bool,
    pass: u64,
    revision: u64,
    cache: Option<(u64, Rc<ResolvedHead>)>,
}

struct StoreShared {
    state: RefCell<StoreState>,
    changes: Notifier<StoreChange>,
}

/// Registry of active head contributions for one page render.
///
/// Cloning shares the registry. A server builds one per request; a client
/// keeps one for the lifetime of the application. The type is `!Send`, so a
/// store cannot leak across request threads.
#[derive(Clone)]
pub struct HeadStore {
    shared: Rc<StoreShared>,
}

/// Non-owning reference to a [`HeadStore`].
#[derive(Clone)]
pub struct WeakHeadStore {
    shared: Weak<StoreShared>,
}

impl WeakHeadStore {
    /// Upgrade if the store is still alive.
    pub fn upgrade(&self) -> Option<HeadStore> {
        self.shared.upgrade().map(|shared| HeadStore { shared })
    }
}

impl Default for HeadStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HeadStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.borrow();
        f.debug_struct("HeadStore")
            .field("contributions", &state.contributions.len())
            .field("template", &state.template)
            .field("pass", &state.pass)
            .field("revision", &state.revision)
            .finish()
    }
}

impl HeadStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            shared: Rc::new(StoreShared {
                state: RefCell::new(StoreState::default()),
                changes: Notifier::new(),
            }),
        }
    }

    /// Create a store seeded with a title template.
    ///
    /// The seed does not count as a capture: the first registration that
    /// declares its own template still replaces it.
    pub fn with_template(template: TitleTemplate) -> Self {
        let store = Self::new();
        store.shared.state.borrow_mut().template = Some(template);
        store
    }

    /// Set the title used when no contribution supplies one.
    ///
    /// The fallback is emitted as-is; the title template never applies to it.
    pub fn with_fallback_title(self, title: impl Into<String>) -> Self {
        {
            let mut state = self.shared.state.borrow_mut();
            state.fallback_title = Some(title.into());
            state.revision += 1;
        }
        self
    }

    /// Register a contribution and return its handle.
    pub fn register(&self, source: impl Into<HeadSource>) -> HeadResult<ContributionHandle> {
        let source = source.into();
        let descriptor = source.evaluate();
        descriptor.validate()?;

        let (id, captured) = {
            let mut state = self.shared.state.borrow_mut();
            let id = HandleId(state.next_id);
            state.next_id += 1;

            let captured = match &descriptor.title_template {
                Some(template) if !state.template_captured => {
                    state.template = Some(template.clone());
                    state.template_captured = true;
                    true
                }
                _ => false,
            };

            state.contributions.push(Contribution {
                id,
                source,
                descriptor,
                subscriptions: Vec::new(),
            });
            state.revision += 1;
            (id, captured)
        };

        debug!(handle = %id, template_captured = captured, "registered head contribution");
        self.shared.changes.notify(&StoreChange::Registered(id));
        Ok(ContributionHandle::new(self.clone(), id))
    }

    /// Replace a contribution's descriptor.
    ///
    /// Returns `Ok(false)` when the handle is withdrawn or nothing changed.
    /// The new descriptor becomes the contribution's static source.
    pub fn update(&self, id: HandleId, descriptor: HeadDescriptor) -> HeadResult<bool> {
        if !self.is_active(id) {
            return Ok(false);
        }
        descriptor.validate()?;
        let changed = self.replace(id, HeadSource::Static(descriptor.clone()), descriptor);
        if changed {
            debug!(handle = %id, "updated head contribution");
            self.shared.changes.notify(&StoreChange::Updated(id));
        }
        Ok(changed)
    }

    /// Re-evaluate a reactive contribution.
    ///
    /// Returns `Ok(true)` only when the getter produced a different
    /// descriptor. Static and withdrawn contributions are left alone.
    pub fn refresh(&self, id: HandleId) -> HeadResult<bool> {
        let source = {
            let state = self.shared.state.borrow();
            match state.contributions.iter().find(|c| c.id == id) {
                Some(c) if c.source.is_reactive() => c.source.clone(),
                _ => return Ok(false),
            }
        };

        let descriptor = source.evaluate();
        descriptor.validate()?;

        let changed = {
            let mut guard = self.shared.state.borrow_mut();
            let state = &mut *guard;
            match state.contributions.iter_mut().find(|c| c.id == id) {
                Some(c) if c.descriptor != descriptor => {
                    c.descriptor = descriptor;
                    state.revision += 1;
                    true
                }
                _ => false,
            }
        };

        if changed {
            debug!(handle = %id, "refreshed reactive head contribution");
            self.shared.changes.notify(&StoreChange::Updated(id));
        }
        Ok(changed)
    }

    /// Remove a contribution. Returns `false` if it was already gone.
    pub fn withdraw(&self, id: HandleId) -> bool {
        let removed = {
            let mut state = self.shared.state.borrow_mut();
            match state.contributions.iter().position(|c| c.id == id) {
                Some(index) => {
                    state.revision += 1;
                    Some(state.contributions.remove(index))
                }
                None => None,
            }
        };

        // Dropped outside the borrow: releasing subscriptions touches signals.
        match removed {
            Some(contribution) => {
                drop(contribution);
                debug!(handle = %id, "withdrew head contribution");
                self.shared.changes.notify(&StoreChange::Withdrawn(id));
                true
            }
            None => {
                trace!(handle = %id, "withdraw ignored, contribution already gone");
                false
            }
        }
    }

    /// Replace the title template from outside the registration path.
    pub fn set_title_template(&self, template: Option<TitleTemplate>) {
        {
            let mut state = self.shared.state.borrow_mut();
            state.template = template;
            state.template_captured = true;
            state.revision += 1;
        }
        debug!("title template replaced");
        self.shared.changes.notify(&StoreChange::TemplateChanged);
    }

    /// Start a new render pass.
    ///
    /// The captured template is kept, but the next registration declaring
    /// one may capture again.
    pub fn begin_pass(&self) {
        let mut state = self.shared.state.borrow_mut();
        state.template_captured = false;
        state.pass += 1;
        debug!(pass = state.pass, "began head render pass");
    }

    /// The merged head for the current state.
    ///
    /// Cached per revision, so repeated calls without intervening changes
    /// return the same allocation.
    pub fn resolve(&self) -> Rc<ResolvedHead> {
        let mut guard = self.shared.state.borrow_mut();
        let state = &mut *guard;
        if let Some((revision, head)) = &state.cache {
            if *revision == state.revision {
                return Rc::clone(head);
            }
        }

        let mut head = merge::resolve(
            state.contributions.iter().map(|c| &c.descriptor),
            state.template.as_ref(),
        );
        if head.title.is_none() {
            head.title = state.fallback_title.clone();
        }
        let head = Rc::new(head);
        trace!(
            revision = state.revision,
            contributions = state.contributions.len(),
            "merged head"
        );
        state.cache = Some((state.revision, Rc::clone(&head)));
        head
    }

    /// Active contributions in registration order.
    pub fn contributions(&self) -> Vec<(HandleId, HeadDescriptor)> {
        self.shared
            .state
            .borrow()
            .contributions
            .iter()
            .map(|c| (c.id, c.descriptor.clone()))
            .collect()
    }

    /// Current descriptor of a contribution.
    pub fn descriptor(&self, id: HandleId) -> Option<HeadDescriptor> {
        self.shared
            .state
            .borrow()
            .contributions
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.descriptor.clone())
    }

    /// Whether a contribution is still registered.
    pub fn is_active(&self, id: HandleId) -> bool {
        self.shared
            .state
            .borrow()
            .contributions
            .iter()
            .any(|c| c.id == id)
    }

    /// Number of active contributions.
    pub fn len(&self) -> usize {
        self.shared.state.borrow().contributions.len()
    }

    /// Whether no contributions are active.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The title template visible to the merge.
    pub fn title_template(&self) -> Option<TitleTemplate> {
        self.shared.state.borrow().template.clone()
    }

    /// Monotonic counter bumped on every state change.
    pub fn revision(&self) -> u64 {
        self.shared.state.borrow().revision
    }

    /// Subscribe to store changes.
    pub fn subscribe(&self, listener: impl Fn(&StoreChange) + 'static) -> Subscription {
        self.shared.changes.subscribe(listener)
    }

    /// Non-owning reference for callbacks.
    pub fn downgrade(&self) -> WeakHeadStore {
        WeakHeadStore {
            shared: Rc::downgrade(&self.shared),
        }
    }

    /// Keep a subscription alive for as long as the contribution is.
    ///
    /// Returns `false` (and drops the subscription) if it is already gone.
    pub(crate) fn attach_subscription(&self, id: HandleId, subscription: Subscription) -> bool {
        let rejected = {
            let mut state = self.shared.state.borrow_mut();
            match state.contributions.iter_mut().find(|c| c.id == id) {
                Some(c) => {
                    c.subscriptions.push(subscription);
                    None
                }
                None => Some(subscription),
            }
        };
        rejected.is_none()
    }

    fn replace(&self, id: HandleId, source: HeadSource, descriptor: HeadDescriptor) -> bool {
        let mut state = self.shared.state.borrow_mut();
        let Some(contribution) = state.contributions.iter_mut().find(|c| c.id == id) else {
            return false;
        };
        let changed = contribution.descriptor != descriptor || contribution.source.is_reactive();
        contribution.source = source;
        contribution.descriptor = descriptor;
        if changed {
            state.revision += 1;
        }
        changed
    }
}
