//! The transition state machine.
//!
//! A [`TransitionController`] turns one call to
//! [`animate_change_to_scene`](TransitionController::animate_change_to_scene) into
//! the full sequence:
//!
//! ```text
//! Idle -> CapturePending -> AwaitingLoad -> Overlaying -> Animating -> Idle
//! ```
//!
//! Nothing happens on its own: the host calls [`tick`](TransitionController::tick)
//! once per frame and the controller advances as far as that frame allows.

use crate::animation::{self, Animator};
use crate::config::TransitionConfig;
use crate::error::TransitionError;
use crate::host::{
    BufferId, ImageId, SharedBackend, SubscriptionId, ViewId, ViewLoadNotifier, ViewLoaded,
    ViewRootLocator, ViewRootLookup,
};
use crate::overlay::OverlayHandle;
use crate::snapshot::SnapshotCapturer;
use crate::ui::ViewRootHandle;
use std::cell::{Cell, Ref, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

/// Loads the next view. Runs once, after the frame delay.
pub type LoadAction = Box<dyn FnOnce()>;

/// Animates the overlay away instead of the default fade.
///
/// The routine receives the overlay and the controller's animator, which keeps
/// ticking across view changes. It is responsible for removing the overlay when it
/// is done; the controller returns to idle once the overlay is detached.
pub type CustomAnimation = Box<dyn FnOnce(OverlayHandle, &mut Animator)>;

/// Phase of the transition lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionState {
    /// No transition running.
    Idle,
    /// The old view renders offscreen; waiting for the buffer to fill.
    CapturePending,
    /// The load action ran; waiting for the new view to be announced.
    AwaitingLoad,
    /// The overlay was appended to the new view.
    Overlaying,
    /// The overlay is being animated away.
    Animating,
}

struct TransitionRequest {
    load: Option<LoadAction>,
    animation: Option<CustomAnimation>,
}

/// Lifecycle flags shared with every [`ControllerHandle`], so they can be read
/// while the controller itself is borrowed.
#[derive(Debug, Default)]
struct ControllerFlags {
    persistent: Cell<bool>,
    shut_down: Cell<bool>,
}

pub struct TransitionController {
    config: TransitionConfig,
    backend: SharedBackend,
    locator: ViewRootLocator,
    lookup: ViewRootLookup,
    notifier: ViewLoadNotifier,
    subscription: Option<SubscriptionId>,
    inbox: Rc<RefCell<VecDeque<ViewLoaded>>>,
    capturer: SnapshotCapturer,
    animator: Animator,
    state: TransitionState,
    request: Option<TransitionRequest>,
    snapshot_pending: bool,
    overlay: Option<OverlayHandle>,
    flags: Rc<ControllerFlags>,
}

impl TransitionController {
    /// Create a controller, subscribe to view loads and allocate the offscreen
    /// buffer at the current viewport size.
    pub(crate) fn new(
        config: TransitionConfig,
        backend: SharedBackend,
        locator: ViewRootLocator,
        lookup: ViewRootLookup,
        notifier: ViewLoadNotifier,
    ) -> Self {
        let inbox = Rc::new(RefCell::new(VecDeque::new()));
        let sink = Rc::clone(&inbox);
        let subscription = notifier.subscribe(move |event: &ViewLoaded| {
            sink.borrow_mut().push_back(event.clone());
        });

        let mut capturer = SnapshotCapturer::new(config.frame_delay);
        {
            let mut backend = backend.borrow_mut();
            let viewport = backend.viewport_size();
            capturer.ensure_buffer(&mut *backend, viewport);
        }

        Self {
            config,
            backend,
            locator,
            lookup,
            notifier,
            subscription: Some(subscription),
            inbox,
            capturer,
            animator: Animator::new(),
            state: TransitionState::Idle,
            request: None,
            snapshot_pending: false,
            overlay: None,
            flags: Rc::default(),
        }
    }

    /// Capture the current view, run `load`, and animate the snapshot away once the
    /// new view is announced.
    ///
    /// Without a `custom` animation the overlay fades out over the configured
    /// duration. Fails with [`TransitionError::ViewRootNotFound`] if no view is
    /// active, and with [`TransitionError::TransitionInProgress`] while a previous
    /// request is still capturing or loading.
    pub fn animate_change_to_scene(
        &mut self,
        load: impl FnOnce() + 'static,
        custom: Option<CustomAnimation>,
    ) -> Result<(), TransitionError> {
        if self.is_shut_down() {
            return Err(TransitionError::ControllerShutDown);
        }
        if matches!(
            self.state,
            TransitionState::CapturePending
                | TransitionState::AwaitingLoad
                | TransitionState::Overlaying
        ) {
            return Err(TransitionError::TransitionInProgress);
        }

        let root = (self.locator)().ok_or(TransitionError::ViewRootNotFound)?;
        {
            let mut backend = self.backend.borrow_mut();
            let viewport = backend.viewport_size();
            self.capturer.capture(&mut *backend, Some(&root), viewport)?;
        }

        self.request = Some(TransitionRequest {
            load: Some(Box::new(load)),
            animation: custom,
        });
        self.snapshot_pending = true;
        self.set_state(TransitionState::CapturePending);

        if self.capturer.is_populated() {
            self.fire_load();
        }
        Ok(())
    }

    /// Advance by one frame boundary at time `now` (seconds).
    pub fn tick(&mut self, now: f32) -> Result<(), TransitionError> {
        if self.is_shut_down() {
            return Ok(());
        }

        self.animator.tick(now);

        if self.state == TransitionState::CapturePending {
            self.capturer.frame();
            if self.capturer.is_populated() {
                self.fire_load();
            }
        }

        self.process_notifications()?;

        if self.state == TransitionState::Animating
            && !self.overlay.as_ref().is_some_and(OverlayHandle::is_attached)
        {
            self.finish();
        }
        Ok(())
    }

    fn fire_load(&mut self) {
        self.set_state(TransitionState::AwaitingLoad);
        if let Some(load) = self.request.as_mut().and_then(|r| r.load.take()) {
            load();
        }
    }

    fn process_notifications(&mut self) -> Result<(), TransitionError> {
        loop {
            let Some(event) = self.inbox.borrow().front().cloned() else {
                return Ok(());
            };
            if self.state == TransitionState::AwaitingLoad && self.snapshot_pending {
                // Unresolved events stay queued and are retried next tick.
                let root = self
                    .resolve_root(&event.view)
                    .ok_or(TransitionError::ViewRootNotFound)?;
                self.inbox.borrow_mut().pop_front();
                self.show_overlay(&event, root)?;
            } else {
                self.inbox.borrow_mut().pop_front();
                log::debug!(
                    target: "snapfade",
                    "ignoring load of '{}' in state {:?}",
                    event.view,
                    self.state
                );
            }
        }
    }

    /// Root of the announced view, or the locator's pick if the view is unknown.
    fn resolve_root(&self, view: &ViewId) -> Option<ViewRootHandle> {
        (self.lookup)(view).or_else(|| (self.locator)())
    }

    fn show_overlay(
        &mut self,
        event: &ViewLoaded,
        root: ViewRootHandle,
    ) -> Result<(), TransitionError> {
        // An overlay still animating from the previous request gives way.
        if let Some(previous) = self.overlay.take() {
            previous.remove();
        }

        let taken = {
            let mut backend = self.backend.borrow_mut();
            self.capturer.take_snapshot(&mut *backend)
        };
        let snapshot = match taken {
            Ok(snapshot) => snapshot,
            Err(err) => {
                self.abandon();
                return Err(err);
            }
        };
        self.snapshot_pending = false;

        let overlay = OverlayHandle::attach(&root, snapshot.image, self.config.picking_mode);
        if self.config.clear_suppression {
            root.borrow_mut().suppress_clear_for(1);
        }
        self.overlay = Some(overlay.clone());
        self.set_state(TransitionState::Overlaying);
        log::debug!(
            target: "snapfade",
            "overlay {:?} shown over '{}' ({}x{})",
            snapshot.image,
            event.view,
            snapshot.size.x,
            snapshot.size.y
        );

        let custom = self.request.take().and_then(|r| r.animation);
        self.set_state(TransitionState::Animating);
        match custom {
            Some(animate) => animate(overlay, &mut self.animator),
            None => animation::fade_out(
                &mut self.animator,
                overlay,
                self.config.fade_duration,
                self.config.easing,
            ),
        }
        Ok(())
    }

    /// Give up on the current request and return to idle.
    fn abandon(&mut self) {
        log::warn!(target: "snapfade", "abandoning transition in state {:?}", self.state);
        if let Ok(mut backend) = self.backend.try_borrow_mut() {
            self.capturer.cancel(&mut *backend);
        }
        self.request = None;
        self.snapshot_pending = false;
        self.set_state(TransitionState::Idle);
    }

    fn finish(&mut self) {
        self.overlay = None;
        if let Ok(mut backend) = self.backend.try_borrow_mut() {
            self.capturer.release_image(&mut *backend);
        }
        self.set_state(TransitionState::Idle);
    }

    fn set_state(&mut self, state: TransitionState) {
        if self.state != state {
            log::debug!(target: "snapfade", "transition {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }

    /// Stop everything and free every resource.
    ///
    /// In-flight animations are halted without running their completions, then
    /// the overlay is removed, then the still image and finally the offscreen
    /// buffer are released. Further requests fail with
    /// [`TransitionError::ControllerShutDown`].
    pub fn shutdown(&mut self) {
        if self.is_shut_down() {
            return;
        }
        self.flags.shut_down.set(true);

        let halted = self.animator.halt_all();
        if let Some(id) = self.subscription.take() {
            self.notifier.unsubscribe(id);
        }
        if let Some(overlay) = self.overlay.take() {
            overlay.remove();
        }
        self.request = None;
        self.snapshot_pending = false;
        self.inbox.borrow_mut().clear();

        match self.backend.try_borrow_mut() {
            Ok(mut backend) => self.capturer.shutdown(&mut *backend),
            Err(_) => log::warn!(
                target: "snapfade",
                "backend busy during shutdown; offscreen resources not released"
            ),
        }
        self.set_state(TransitionState::Idle);
        log::debug!(target: "snapfade", "controller shut down ({halted} animation(s) halted)");
    }

    pub fn state(&self) -> TransitionState {
        self.state
    }

    pub fn config(&self) -> &TransitionConfig {
        &self.config
    }

    /// The overlay currently on screen, if any.
    pub fn overlay(&self) -> Option<OverlayHandle> {
        self.overlay.clone()
    }

    /// Whether a capture is waiting for the new view to be announced.
    pub fn snapshot_pending(&self) -> bool {
        self.snapshot_pending
    }

    pub fn offscreen_buffer(&self) -> Option<BufferId> {
        self.capturer.buffer()
    }

    pub fn still_image(&self) -> Option<ImageId> {
        self.capturer.image()
    }

    pub fn animator(&self) -> &Animator {
        &self.animator
    }

    /// Whether this controller outlives view changes.
    pub fn is_persistent(&self) -> bool {
        self.flags.persistent.get()
    }

    pub fn is_shut_down(&self) -> bool {
        self.flags.shut_down.get()
    }

    /// Replace how the active view root is found.
    pub fn set_locator(&mut self, locator: impl Fn() -> Option<ViewRootHandle> + 'static) {
        self.locator = Box::new(locator);
    }

    /// Replace how the root of an announced view is found.
    ///
    /// When the lookup finds nothing the overlay goes to the locator's root.
    pub fn set_view_lookup(
        &mut self,
        lookup: impl Fn(&ViewId) -> Option<ViewRootHandle> + 'static,
    ) {
        self.lookup = Box::new(lookup);
    }
}

impl Drop for TransitionController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for TransitionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransitionController")
            .field("state", &self.state)
            .field("snapshot_pending", &self.snapshot_pending)
            .field("persistent", &self.is_persistent())
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

/// Shared handle to the controller registered in a
/// [`TransitionContext`](crate::TransitionContext).
///
/// Most methods borrow the controller for their duration. Load actions and
/// animation callbacks run inside [`tick`](Self::tick), so they must not drive the
/// same handle; [`is_persistent`](Self::is_persistent),
/// [`is_shut_down`](Self::is_shut_down) and [`ptr_eq`](Self::ptr_eq) never borrow
/// and are safe to call from anywhere.
#[derive(Clone, Debug)]
pub struct ControllerHandle {
    inner: Rc<RefCell<TransitionController>>,
    flags: Rc<ControllerFlags>,
}

impl ControllerHandle {
    pub(crate) fn new(controller: TransitionController) -> Self {
        let flags = Rc::clone(&controller.flags);
        Self {
            inner: Rc::new(RefCell::new(controller)),
            flags,
        }
    }

    pub fn animate_change_to_scene(
        &self,
        load: impl FnOnce() + 'static,
        custom: Option<CustomAnimation>,
    ) -> Result<(), TransitionError> {
        self.inner.borrow_mut().animate_change_to_scene(load, custom)
    }

    pub fn tick(&self, now: f32) -> Result<(), TransitionError> {
        self.inner.borrow_mut().tick(now)
    }

    pub fn shutdown(&self) {
        self.inner.borrow_mut().shutdown();
    }

    pub fn state(&self) -> TransitionState {
        self.inner.borrow().state()
    }

    pub fn overlay(&self) -> Option<OverlayHandle> {
        self.inner.borrow().overlay()
    }

    pub fn is_persistent(&self) -> bool {
        self.flags.persistent.get()
    }

    pub fn is_shut_down(&self) -> bool {
        self.flags.shut_down.get()
    }

    /// Borrow the controller for inspection.
    pub fn borrow(&self) -> Ref<'_, TransitionController> {
        self.inner.borrow()
    }

    pub fn set_locator(&self, locator: impl Fn() -> Option<ViewRootHandle> + 'static) {
        self.inner.borrow_mut().set_locator(locator);
    }

    pub fn set_view_lookup(&self, lookup: impl Fn(&ViewId) -> Option<ViewRootHandle> + 'static) {
        self.inner.borrow_mut().set_view_lookup(lookup);
    }

    pub(crate) fn mark_persistent(&self) {
        self.flags.persistent.set(true);
    }

    /// Whether two handles refer to the same controller.
    pub fn ptr_eq(&self, other: &ControllerHandle) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}
