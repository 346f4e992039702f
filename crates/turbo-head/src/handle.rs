//! Caller-held handle for one head contribution.

use std::fmt;

use tracing::warn;

use crate::descriptor::HeadDescriptor;
use crate::error::HeadResult;
use crate::signal::Signal;
use crate::store::{HandleId, HeadStore};

/// Token used to update or withdraw one registration.
///
/// Clones refer to the same contribution. Once withdrawn, `update`,
/// `refresh`, `track` and `withdraw` are all no-ops.
#[derive(Clone)]
pub struct ContributionHandle {
    store: HeadStore,
    id: HandleId,
}

impl ContributionHandle {
    pub(crate) fn new(store: HeadStore, id: HandleId) -> Self {
        Self { store, id }
    }

    /// Identifier within the owning store.
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Whether the contribution is still registered.
    pub fn is_active(&self) -> bool {
        self.store.is_active(self.id)
    }

    /// Current descriptor, if still registered.
    pub fn descriptor(&self) -> Option<HeadDescriptor> {
        self.store.descriptor(self.id)
    }

    /// Replace the descriptor and trigger recomputation.
    pub fn update(&self, descriptor: HeadDescriptor) -> HeadResult<()> {
        self.store.update(self.id, descriptor).map(|_| ())
    }

    /// Re-evaluate a reactive source. Returns whether the descriptor changed.
    pub fn refresh(&self) -> HeadResult<bool> {
        self.store.refresh(self.id)
    }

    /// Remove the contribution. Returns `true` only for the call that
    /// actually removed it.
    pub fn withdraw(&self) -> bool {
        self.store.withdraw(self.id)
    }

    /// Re-evaluate this contribution whenever `signal` changes.
    ///
    /// The subscription lives as long as the contribution. Returns `false`
    /// when the contribution is already withdrawn.
    pub fn track<T: 'static>(&self, signal: &Signal<T>) -> bool {
        let store = self.store.downgrade();
        let id = self.id;
        let subscription = signal.subscribe(move || {
            let Some(store) = store.upgrade() else {
                return;
            };
            if let Err(err) = store.refresh(id) {
                warn!(handle = %id, error = %err, "rejected reactive head update");
            }
        });
        self.store.attach_subscription(self.id, subscription)
    }
}

impl fmt::Debug for ContributionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContributionHandle")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::TagEntry;
    use crate::store::HeadSource;

    #[test]
    fn test_handle_update_and_withdraw() {
        let store = HeadStore::new();
        let handle = store.register(HeadDescriptor::new().with_title("A")).unwrap();

        handle.update(HeadDescriptor::new().with_title("B")).unwrap();
        assert_eq!(handle.descriptor().unwrap().title.as_deref(), Some("B"));

        assert!(handle.withdraw());
        assert!(!handle.is_active());
        assert!(handle.descriptor().is_none());
    }

    #[test]
    fn test_calls_after_withdraw_are_noops() {
        let store = HeadStore::new();
        let handle = store.register(HeadDescriptor::new().with_title("A")).unwrap();
        let clone = handle.clone();

        assert!(handle.withdraw());
        assert!(!clone.withdraw());
        assert!(clone.update(HeadDescriptor::new().with_title("B")).is_ok());
        assert!(!clone.refresh().unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn test_update_with_malformed_descriptor_errors() {
        let store = HeadStore::new();
        let handle = store.register(HeadDescriptor::new().with_title("A")).unwrap();
        let err = handle
            .update(HeadDescriptor::new().with_meta(TagEntry::new()))
            .unwrap_err();
        assert!(err.is_contract_violation());
        assert_eq!(handle.descriptor().unwrap().title.as_deref(), Some("A"));
    }

    #[test]
    fn test_track_signal_updates_contribution() {
        let store = HeadStore::new();
        let title = Signal::new("Cart".to_string());
        let handle = {
            let title = title.clone();
            store
                .register(HeadSource::getter(move || {
                    HeadDescriptor::new().with_title(title.get())
                }))
                .unwrap()
        };
        assert!(handle.track(&title));

        title.set("Cart (2)".to_string());
        assert_eq!(store.resolve().title.as_deref(), Some("Cart (2)"));
    }

    #[test]
    fn test_withdraw_releases_signal_subscription() {
        let store = HeadStore::new();
        let title = Signal::new("A".to_string());
        let handle = {
            let title = title.clone();
            store
                .register(HeadSource::getter(move || {
                    HeadDescriptor::new().with_title(title.get())
                }))
                .unwrap()
        };
        handle.track(&title);
        assert_eq!(title.subscriber_count(), 1);

        handle.withdraw();
        assert_eq!(title.subscriber_count(), 0);
        assert!(!handle.track(&title));
        assert_eq!(title.subscriber_count(), 0);
    }
}
