//! Capabilities the host environment provides to a transition.
//!
//! A transition never loads content or renders on its own. It talks to the host
//! through these seams:
//!
//! - a [`ViewRootLocator`] that finds the view currently on screen,
//! - a [`ViewRootLookup`] that finds the root of a view by id,
//! - a [`ViewLoadNotifier`] that announces when a new view became active,
//! - a [`RenderBackend`] that owns offscreen buffers and still images.

use crate::error::TransitionError;
use crate::ui::ViewRootHandle;
use glam::UVec2;
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

/// Finds the active view root. Returns `None` when nothing is displayed.
pub type ViewRootLocator = Box<dyn Fn() -> Option<ViewRootHandle>>;

/// Finds the root of a specific loaded view.
pub type ViewRootLookup = Box<dyn Fn(&ViewId) -> Option<ViewRootHandle>>;

/// Shared, dynamically dispatched render backend.
pub type SharedBackend = Rc<RefCell<dyn RenderBackend>>;

/// Handle to an offscreen render buffer owned by a [`RenderBackend`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(u64);

/// Handle to a still image owned by a [`RenderBackend`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(u64);

macro_rules! raw_handle {
    ($name:ident) => {
        impl $name {
            /// Wrap a backend-assigned raw value.
            pub const fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            pub const fn raw(self) -> u64 {
                self.0
            }
        }
    };
}

raw_handle!(BufferId);
raw_handle!(ImageId);

/// Offscreen rendering and still-image storage.
///
/// Buffers receive a view's rendering while it is redirected. Still images are
/// standalone copies that stay valid after the buffer is reused. Handles are never
/// reused by one backend, so a stale handle can always be told apart.
pub trait RenderBackend {
    /// Current size of the presentation surface in pixels.
    fn viewport_size(&self) -> UVec2;

    /// Allocate an offscreen buffer of the given size.
    fn create_offscreen_buffer(&mut self, size: UVec2) -> BufferId;

    /// Size of a live buffer, `None` if the handle is unknown.
    fn buffer_size(&self, buffer: BufferId) -> Option<UVec2>;

    /// Send `root`'s rendering output to `buffer` instead of the screen.
    ///
    /// Output lands in the buffer with the backend's usual latency, so callers wait
    /// a fixed number of frames before reading it.
    fn redirect(&mut self, root: &ViewRootHandle, buffer: BufferId)
    -> Result<(), TransitionError>;

    /// Stop redirecting any view into `buffer`.
    fn end_redirect(&mut self, buffer: BufferId);

    /// Copy the buffer's current contents into a new still image.
    fn copy_to_still_image(&mut self, buffer: BufferId) -> Result<ImageId, TransitionError>;

    /// Free a still image. Returns `false` if the handle was not live.
    fn release_still_image(&mut self, image: ImageId) -> bool;

    /// Free an offscreen buffer. Returns `false` if the handle was not live.
    fn release_buffer(&mut self, buffer: BufferId) -> bool;
}

/// Unique identifier of a loaded view.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ViewId(String);

impl ViewId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ViewId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ViewId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ViewId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// How a view was loaded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoadMode {
    /// The new view replaces every view that was active.
    #[default]
    Single,
    /// The new view is added next to the active ones.
    Additive,
}

/// Event emitted when a new view becomes active.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewLoaded {
    pub view: ViewId,
    pub mode: LoadMode,
}

/// Identifier returned by [`ViewLoadNotifier::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = (SubscriptionId, Box<dyn FnMut(&ViewLoaded)>);

#[derive(Default)]
struct NotifierInner {
    subscribers: Vec<Subscriber>,
    next_id: u64,
    dispatching: bool,
    cancelled: HashSet<SubscriptionId>,
}

/// Broadcasts [`ViewLoaded`] events to subscribers.
///
/// Cloning yields another handle to the same subscriber list. Subscribers may
/// subscribe or unsubscribe from inside a callback; the change applies after the
/// current dispatch.
#[derive(Clone, Default)]
pub struct ViewLoadNotifier {
    inner: Rc<RefCell<NotifierInner>>,
}

impl ViewLoadNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, callback: impl FnMut(&ViewLoaded) + 'static) -> SubscriptionId {
        let mut inner = self.inner.borrow_mut();
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        inner.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Remove a subscriber. Returns `false` if it was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.inner.borrow_mut();
        let before = inner.subscribers.len();
        inner.subscribers.retain(|(sub, _)| *sub != id);
        if inner.subscribers.len() != before {
            return true;
        }
        // The subscriber may be detached for the duration of a dispatch.
        inner.dispatching && inner.cancelled.insert(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().subscribers.len()
    }

    /// Deliver `event` to every subscriber, in subscription order.
    pub fn notify(&self, event: &ViewLoaded) {
        let mut subscribers = {
            let mut inner = self.inner.borrow_mut();
            inner.dispatching = true;
            std::mem::take(&mut inner.subscribers)
        };

        for (id, callback) in subscribers.iter_mut() {
            if self.inner.borrow().cancelled.contains(id) {
                continue;
            }
            callback(event);
        }

        let mut inner = self.inner.borrow_mut();
        let inner = &mut *inner;
        subscribers.retain(|(id, _)| !inner.cancelled.remove(id));
        subscribers.append(&mut inner.subscribers);
        inner.subscribers = subscribers;
        inner.cancelled.clear();
        inner.dispatching = false;
    }
}

impl std::fmt::Debug for ViewLoadNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewLoadNotifier")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
