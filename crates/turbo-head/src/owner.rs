//! Component ownership scopes.
//!
//! An [`Owner`] stands in for a rendering component instance: it collects
//! cleanups (such as withdrawing head contributions) and fires them exactly
//! once when the host tears the component down.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

type Cleanup = Box<dyn FnOnce()>;

#[derive(Default)]
struct OwnerState {
    cleanups: Vec<Cleanup>,
    children: Vec<Owner>,
    disposed: bool,
}

struct OwnerInner {
    label: String,
    state: RefCell<OwnerState>,
}

/// Teardown scope for one component instance.
#[derive(Clone)]
pub struct Owner {
    inner: Rc<OwnerInner>,
}

impl Owner {
    /// Create a root owner.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            inner: Rc::new(OwnerInner {
                label: label.into(),
                state: RefCell::new(OwnerState::default()),
            }),
        }
    }

    /// Create a child owner torn down together with this one.
    ///
    /// A child of an already disposed owner starts out disposed.
    pub fn child(&self, label: impl Into<String>) -> Owner {
        let child = Owner::new(label);
        let parent_disposed = {
            let mut state = self.inner.state.borrow_mut();
            if !state.disposed {
                state.children.push(child.clone());
            }
            state.disposed
        };
        if parent_disposed {
            child.teardown();
        }
        child
    }

    /// Run `f` on teardown. Runs immediately if already torn down.
    pub fn on_cleanup(&self, f: impl FnOnce() + 'static) {
        let mut state = self.inner.state.borrow_mut();
        if !state.disposed {
            state.cleanups.push(Box::new(f));
            return;
        }
        drop(state);
        f();
    }

    /// Fire the teardown signal.
    ///
    /// Children go first (most recent first), then this owner's cleanups in
    /// reverse registration order. Subsequent calls do nothing.
    pub fn teardown(&self) {
        let (children, cleanups) = {
            let mut state = self.inner.state.borrow_mut();
            if state.disposed {
                return;
            }
            state.disposed = true;
            (
                std::mem::take(&mut state.children),
                std::mem::take(&mut state.cleanups),
            )
        };

        trace!(
            owner = %self.inner.label,
            children = children.len(),
            cleanups = cleanups.len(),
            "tearing down owner"
        );

        for child in children.into_iter().rev() {
            child.teardown();
        }
        for cleanup in cleanups.into_iter().rev() {
            cleanup();
        }
    }

    /// Whether teardown has fired.
    pub fn is_disposed(&self) -> bool {
        self.inner.state.borrow().disposed
    }

    /// Diagnostic label.
    pub fn label(&self) -> &str {
        &self.inner.label
    }
}

impl fmt::Debug for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("Owner")
            .field("label", &self.inner.label)
            .field("children", &state.children.len())
            .field("cleanups", &state.cleanups.len())
            .field("disposed", &state.disposed)
            .finish()
    }
}
