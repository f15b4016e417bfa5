//! Shared context: the views a host has loaded and the one transition controller.
//!
//! A [`TransitionContext`] replaces process-wide lookups. It tracks the active view
//! roots, owns the [`ViewLoadNotifier`], and holds at most one live
//! [`ControllerHandle`]. Cloning the context yields another handle to the same
//! state.

use crate::config::TransitionConfig;
use crate::controller::{ControllerHandle, TransitionController};
use crate::host::{
    LoadMode, SharedBackend, ViewId, ViewLoadNotifier, ViewLoaded, ViewRootLocator,
    ViewRootLookup,
};
use crate::ui::ViewRootHandle;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

#[derive(Default)]
struct ContextInner {
    views: RefCell<Vec<(ViewId, ViewRootHandle)>>,
    notifier: ViewLoadNotifier,
    controller: RefCell<Option<ControllerHandle>>,
}

#[derive(Clone, Default)]
pub struct TransitionContext {
    inner: Rc<ContextInner>,
}

impl TransitionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifier(&self) -> ViewLoadNotifier {
        self.inner.notifier.clone()
    }

    /// Make `root` the displayed view and announce it.
    ///
    /// [`LoadMode::Single`] replaces every active view; [`LoadMode::Additive`]
    /// keeps them and appends the new one.
    pub fn activate_view(&self, id: impl Into<ViewId>, mode: LoadMode, root: ViewRootHandle) {
        let id = id.into();
        {
            let mut views = self.inner.views.borrow_mut();
            if mode == LoadMode::Single {
                views.clear();
            }
            views.push((id.clone(), root));
        }
        log::debug!(target: "snapfade", "view '{id}' activated ({mode:?})");
        self.inner.notifier.notify(&ViewLoaded { view: id, mode });
    }

    /// The first active view root, if any.
    pub fn active_view_root(&self) -> Option<ViewRootHandle> {
        first_view_root(&self.inner)
    }

    /// Root of a specific active view.
    pub fn view_root(&self, id: &ViewId) -> Option<ViewRootHandle> {
        find_view_root(&self.inner, id)
    }

    /// Identifiers of the active views, oldest first.
    pub fn active_views(&self) -> Vec<ViewId> {
        self.inner
            .views
            .borrow()
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// A locator that returns the first active view root of this context.
    ///
    /// The locator holds the context weakly and finds nothing once every context
    /// handle is gone.
    pub fn default_locator(&self) -> ViewRootLocator {
        let weak: Weak<ContextInner> = Rc::downgrade(&self.inner);
        Box::new(move || weak.upgrade().and_then(|inner| first_view_root(&inner)))
    }

    /// A lookup that resolves view ids against this context's active views.
    ///
    /// Like [`default_locator`](Self::default_locator) it holds the context weakly.
    pub fn default_view_lookup(&self) -> ViewRootLookup {
        let weak: Weak<ContextInner> = Rc::downgrade(&self.inner);
        Box::new(move |id: &ViewId| weak.upgrade().and_then(|inner| find_view_root(&inner, id)))
    }

    /// Create the context's transition controller.
    ///
    /// If a live controller is already registered the new one is never built and
    /// `None` is returned; nothing is allocated or subscribed. The surviving
    /// controller is marked persistent, so it keeps running across view changes.
    pub fn spawn_controller(
        &self,
        backend: SharedBackend,
        config: TransitionConfig,
    ) -> Option<ControllerHandle> {
        if let Some(existing) = self.controller() {
            log::debug!(target: "snapfade", "transition controller already exists; retiring new one");
            existing.mark_persistent();
            return None;
        }

        let controller = TransitionController::new(
            config,
            backend,
            self.default_locator(),
            self.default_view_lookup(),
            self.notifier(),
        );
        let handle = ControllerHandle::new(controller);
        handle.mark_persistent();
        *self.inner.controller.borrow_mut() = Some(handle.clone());
        Some(handle)
    }

    /// The registered controller, if it is still live.
    pub fn controller(&self) -> Option<ControllerHandle> {
        let mut slot = self.inner.controller.borrow_mut();
        if slot.as_ref().is_some_and(ControllerHandle::is_shut_down) {
            *slot = None;
        }
        slot.clone()
    }

    /// Shut the registered controller down and clear the slot.
    pub fn shutdown_controller(&self) {
        let controller = self.inner.controller.borrow_mut().take();
        if let Some(controller) = controller {
            controller.shutdown();
        }
    }
}

fn find_view_root(inner: &ContextInner, id: &ViewId) -> Option<ViewRootHandle> {
    inner
        .views
        .borrow()
        .iter()
        .find(|(view, _)| view == id)
        .map(|(_, root)| Rc::clone(root))
}

fn first_view_root(inner: &ContextInner) -> Option<ViewRootHandle> {
    inner
        .views
        .borrow()
        .first()
        .map(|(_, root)| Rc::clone(root))
}

impl std::fmt::Debug for TransitionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransitionContext")
            .field("views", &self.active_views())
            .field("has_controller", &self.inner.controller.borrow().is_some())
            .finish()
    }
}
