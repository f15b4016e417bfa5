//! End-to-end transitions against the headless backend.

use snapfade::*;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

const VIEWPORT: UVec2 = UVec2::new(8, 8);
// Exact in binary, so elapsed times compare exactly.
const DT: f32 = 0.125;

const RED: [u8; 4] = [255, 0, 0, 255];
const BLUE: [u8; 4] = [0, 0, 255, 255];

struct Harness {
    ctx: TransitionContext,
    backend: Rc<RefCell<HeadlessBackend>>,
    controller: ControllerHandle,
    time: f32,
}

impl Harness {
    fn new(config: TransitionConfig) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let ctx = TransitionContext::new();
        let backend = HeadlessBackend::shared(VIEWPORT);
        let controller = ctx
            .spawn_controller(backend.clone(), config)
            .expect("first controller is created");
        ctx.activate_view("menu", LoadMode::Single, ViewRoot::shared(Color::RED));

        Self {
            ctx,
            backend,
            controller,
            time: 0.0,
        }
    }

    fn loader(&self, name: &'static str, color: Color) -> impl FnOnce() + 'static {
        let ctx = self.ctx.clone();
        move || ctx.activate_view(name, LoadMode::Single, ViewRoot::shared(color))
    }

    fn present(&self) {
        if let Some(root) = self.ctx.active_view_root() {
            self.backend.borrow_mut().present(&root);
        }
    }

    fn tick(&mut self) {
        self.time += DT;
        self.controller.tick(self.time).unwrap();
    }

    /// Render, then advance the controller at the end of the frame.
    fn frame(&mut self) {
        self.present();
        self.tick();
    }

    fn frames(&mut self, count: usize) {
        for _ in 0..count {
            self.frame();
        }
    }

    fn screen(&self) -> [u8; 4] {
        self.backend.borrow().screen_pixel(4, 4)
    }
}

#[test]
fn load_fires_after_exactly_two_frames() {
    let mut h = Harness::new(TransitionConfig::default());
    let loaded = Rc::new(Cell::new(false));
    let flag = Rc::clone(&loaded);
    let load = h.loader("level", Color::BLUE);

    h.controller
        .animate_change_to_scene(
            move || {
                flag.set(true);
                load();
            },
            None,
        )
        .unwrap();
    assert_eq!(h.controller.state(), TransitionState::CapturePending);
    assert!(!loaded.get());

    h.frame();
    assert!(!loaded.get());
    assert_eq!(h.controller.state(), TransitionState::CapturePending);

    h.frame();
    assert!(loaded.get());
    assert_eq!(h.controller.state(), TransitionState::Animating);
}

#[test]
fn default_fade_reveals_new_view() {
    let mut h = Harness::new(TransitionConfig::default());
    h.present();
    assert_eq!(h.screen(), RED);

    let load = h.loader("level", Color::BLUE);
    h.controller.animate_change_to_scene(load, None).unwrap();
    h.frames(2);

    let overlay = h.controller.overlay().expect("overlay is shown");
    assert!(overlay.is_attached());
    assert_eq!(overlay.opacity(), Some(1.0));
    assert!(!h.controller.borrow().snapshot_pending());

    // The overlay shows the captured menu on top of the new view.
    h.present();
    assert_eq!(h.screen(), RED);

    h.tick(); // 0.125 s into the fade
    assert_eq!(overlay.opacity(), Some(0.75));
    h.tick(); // 0.25 s
    assert_eq!(overlay.opacity(), Some(0.5));
    h.present();
    assert_eq!(h.screen(), [128, 0, 128, 255]);

    h.tick(); // 0.375 s
    assert_eq!(overlay.opacity(), Some(0.25));
    h.tick(); // 0.5 s, fade complete
    assert!(!overlay.is_attached());
    assert_eq!(h.controller.state(), TransitionState::Idle);
    assert!(h.controller.overlay().is_none());

    h.present();
    assert_eq!(h.screen(), BLUE);
    assert_eq!(h.backend.borrow().live_images(), 0);
}

#[test]
fn fade_ends_near_transparent() {
    let mut h = Harness::new(TransitionConfig::default());
    let load = h.loader("level", Color::BLUE);
    h.controller.animate_change_to_scene(load, None).unwrap();
    h.frames(2);
    let overlay = h.controller.overlay().unwrap();

    let mut last = 1.0;
    let mut time = h.time;
    while overlay.is_attached() {
        last = overlay.opacity().unwrap();
        time += 1.0 / 64.0;
        h.controller.tick(time).unwrap();
    }
    assert!(last <= 1.0 / 32.0 + f32::EPSILON, "last opacity {last}");
    assert_eq!(h.controller.state(), TransitionState::Idle);
}

#[test]
fn repeated_transitions_do_not_leak_images() {
    let mut h = Harness::new(TransitionConfig::default());

    let load = h.loader("level", Color::BLUE);
    h.controller.animate_change_to_scene(load, None).unwrap();
    h.frames(2);
    let first = h.controller.overlay().unwrap().image();
    h.frames(8);
    assert_eq!(h.controller.state(), TransitionState::Idle);

    let load = h.loader("menu", Color::RED);
    h.controller.animate_change_to_scene(load, None).unwrap();
    h.frames(2);
    let second = h.controller.overlay().unwrap().image();
    assert_ne!(first, second);
    h.frames(8);

    let backend = h.backend.borrow();
    assert_eq!(backend.live_images(), 0);
    assert_eq!(backend.images_created(), 2);
    assert_eq!(backend.images_released(), 2);
    assert_eq!(backend.live_buffers(), 1);

    let events = backend.events();
    let released = events
        .iter()
        .position(|e| *e == ResourceEvent::ImageReleased(first))
        .unwrap();
    let created = events
        .iter()
        .position(|e| *e == ResourceEvent::ImageCreated(second))
        .unwrap();
    assert!(released < created);
}

#[test]
fn second_controller_retires_and_survivor_persists() {
    let mut h = Harness::new(TransitionConfig::default());
    let other = HeadlessBackend::shared(VIEWPORT);
    assert!(
        h.ctx
            .spawn_controller(other.clone(), TransitionConfig::default())
            .is_none()
    );
    // The retired instance allocated nothing.
    assert_eq!(other.borrow().live_buffers(), 0);

    h.ctx
        .activate_view("level", LoadMode::Single, ViewRoot::shared(Color::BLUE));
    let survivor = h.ctx.controller().expect("controller survives view change");
    assert!(survivor.ptr_eq(&h.controller));
    assert!(survivor.is_persistent());

    // And it still works in the new view.
    let load = h.loader("menu", Color::RED);
    survivor.animate_change_to_scene(load, None).unwrap();
    h.frames(2);
    assert_eq!(survivor.state(), TransitionState::Animating);
}

#[test]
fn custom_animation_replaces_default_fade() {
    let mut h = Harness::new(TransitionConfig::default());
    let started = Rc::new(Cell::new(false));
    let flag = Rc::clone(&started);
    let custom: CustomAnimation = Box::new(move |overlay, animator| {
        flag.set(true);
        slide_to_top(animator, overlay, 0.5, Easing::Linear);
    });

    let load = h.loader("level", Color::BLUE);
    h.controller.animate_change_to_scene(load, Some(custom)).unwrap();
    h.frames(2);
    assert!(started.get());
    // First present of the new view keeps the old frame.
    h.present();

    let overlay = h.controller.overlay().unwrap();
    h.tick();
    h.tick();
    assert_eq!(overlay.opacity(), Some(1.0));
    assert_eq!(overlay.bottom(), Some(Length::Percent(50.0)));

    // Lower half shows the new view, upper half the sliding snapshot.
    h.present();
    let backend = h.backend.borrow();
    assert_eq!(backend.screen_pixel(4, 1), RED);
    assert_eq!(backend.screen_pixel(4, 6), BLUE);
    drop(backend);

    h.tick();
    h.tick();
    assert!(!overlay.is_attached());
    assert_eq!(h.controller.state(), TransitionState::Idle);
    assert_eq!(h.backend.borrow().live_images(), 0);
}

#[test]
fn unfinished_custom_overlay_gives_way_to_next_transition() {
    let mut h = Harness::new(TransitionConfig::default());
    let custom: CustomAnimation = Box::new(|_, _| {});
    let load = h.loader("level", Color::BLUE);
    h.controller.animate_change_to_scene(load, Some(custom)).unwrap();
    h.frames(4);
    let stale = h.controller.overlay().unwrap();
    assert_eq!(h.controller.state(), TransitionState::Animating);

    let load = h.loader("menu", Color::RED);
    h.controller.animate_change_to_scene(load, None).unwrap();
    h.frames(2);

    let fresh = h.controller.overlay().unwrap();
    assert!(!stale.is_attached());
    assert!(fresh.is_attached());
    assert_ne!(stale.image(), fresh.image());
    assert_eq!(h.backend.borrow().live_images(), 1);
}

#[test]
fn missing_view_root_is_an_error() {
    let ctx = TransitionContext::new();
    let backend = HeadlessBackend::shared(VIEWPORT);
    let controller = ctx
        .spawn_controller(backend, TransitionConfig::default())
        .unwrap();

    let err = controller.animate_change_to_scene(|| {}, None).unwrap_err();
    assert!(matches!(err, TransitionError::ViewRootNotFound));
    assert_eq!(controller.state(), TransitionState::Idle);
}

#[test]
fn custom_locator_is_used() {
    let h = Harness::new(TransitionConfig::default());
    h.controller.set_locator(|| None);
    let err = h
        .controller
        .animate_change_to_scene(|| {}, None)
        .unwrap_err();
    assert!(matches!(err, TransitionError::ViewRootNotFound));
}

#[test]
fn overlapping_requests_are_rejected() {
    let mut h = Harness::new(TransitionConfig::default());
    let load = h.loader("level", Color::BLUE);
    h.controller.animate_change_to_scene(load, None).unwrap();

    let err = h
        .controller
        .animate_change_to_scene(|| {}, None)
        .unwrap_err();
    assert!(matches!(err, TransitionError::TransitionInProgress));

    h.frames(2);
    // Once animating, a new request is accepted.
    let load = h.loader("menu", Color::RED);
    h.controller.animate_change_to_scene(load, None).unwrap();
}

#[test]
fn unrelated_view_loads_are_ignored() {
    let mut h = Harness::new(TransitionConfig::default());
    h.ctx
        .activate_view("hud", LoadMode::Additive, ViewRoot::shared(Color::BLACK));
    h.frames(3);

    let menu = h.ctx.active_view_root().unwrap();
    assert!(menu.borrow().is_empty());
    assert_eq!(h.controller.state(), TransitionState::Idle);
    assert_eq!(h.backend.borrow().live_images(), 0);
}

#[test]
fn overlay_options_follow_config() {
    let mut h = Harness::new(
        TransitionConfig::new()
            .picking_mode(PickingMode::Blocking)
            .clear_suppression(false),
    );
    let load = h.loader("level", Color::BLUE);
    h.controller.animate_change_to_scene(load, None).unwrap();
    h.frames(2);

    let overlay = h.controller.overlay().unwrap();
    assert_eq!(overlay.picking_mode(), Some(PickingMode::Blocking));
    let root = overlay.root().unwrap();
    assert_eq!(root.borrow().pick(Vec2::new(1.0, 1.0), VIEWPORT), Some(overlay.element()));
    assert!(!root.borrow_mut().take_clear_suppression());
}

#[test]
fn default_overlay_is_click_through_and_suppresses_one_clear() {
    let mut h = Harness::new(TransitionConfig::default());
    let load = h.loader("level", Color::BLUE);
    h.controller.animate_change_to_scene(load, None).unwrap();
    h.frames(2);

    let overlay = h.controller.overlay().unwrap();
    assert_eq!(overlay.picking_mode(), Some(PickingMode::ClickThrough));
    let root = overlay.root().unwrap();
    assert_eq!(root.borrow().pick(Vec2::new(1.0, 1.0), VIEWPORT), None);
    assert!(root.borrow_mut().take_clear_suppression());
    assert!(!root.borrow_mut().take_clear_suppression());
}

#[test]
fn shutdown_mid_fade_disposes_everything() {
    let mut h = Harness::new(TransitionConfig::default());
    let load = h.loader("level", Color::BLUE);
    h.controller.animate_change_to_scene(load, None).unwrap();
    h.frames(3);
    let overlay = h.controller.overlay().unwrap();
    assert!(overlay.is_attached());

    h.ctx.shutdown_controller();
    assert!(!overlay.is_attached());
    assert!(h.controller.is_shut_down());
    assert_eq!(h.controller.borrow().animator().active_runs(), 0);

    let backend = h.backend.borrow();
    assert_eq!(backend.live_images(), 0);
    assert_eq!(backend.live_buffers(), 0);
    // Image goes before the buffer.
    let events = backend.events();
    assert!(matches!(events[events.len() - 2], ResourceEvent::ImageReleased(_)));
    assert!(matches!(events[events.len() - 1], ResourceEvent::BufferReleased(_)));
    drop(backend);

    let err = h.controller.animate_change_to_scene(|| {}, None).unwrap_err();
    assert!(matches!(err, TransitionError::ControllerShutDown));
}

#[test]
fn snapshot_matches_viewport_after_resize() {
    let mut h = Harness::new(TransitionConfig::default());
    let resized = UVec2::new(16, 4);
    h.backend.borrow_mut().set_viewport(resized);

    let load = h.loader("level", Color::BLUE);
    h.controller.animate_change_to_scene(load, None).unwrap();
    h.frames(2);

    let buffer = h.controller.borrow().offscreen_buffer().unwrap();
    assert_eq!(h.backend.borrow().buffer_size(buffer), Some(resized));
    assert_eq!(h.backend.borrow().live_buffers(), 1);
}

#[test]
fn controller_spawned_by_incoming_view_retires() {
    let mut h = Harness::new(TransitionConfig::default());
    let ctx = h.ctx.clone();
    let extra = HeadlessBackend::shared(VIEWPORT);
    let extra_backend = extra.clone();
    let spawned = Rc::new(Cell::new(None));
    let result = Rc::clone(&spawned);

    h.controller
        .animate_change_to_scene(
            move || {
                ctx.activate_view("level", LoadMode::Single, ViewRoot::shared(Color::BLUE));
                // The new view brings its own controller, which gives way.
                let fresh = ctx.spawn_controller(extra_backend, TransitionConfig::default());
                let survivor = ctx.controller().is_some_and(|c| c.is_persistent());
                result.set(Some((fresh.is_some(), survivor)));
            },
            None,
        )
        .unwrap();
    h.frames(3);

    assert_eq!(spawned.get(), Some((false, true)));
    assert_eq!(extra.borrow().live_buffers(), 0);
    assert!(h.ctx.controller().unwrap().ptr_eq(&h.controller));
    assert_eq!(h.controller.state(), TransitionState::Animating);
    assert_eq!(h.ctx.notifier().subscriber_count(), 1);
}

#[test]
fn unresolved_view_is_retried_once_it_can_be_found() {
    let mut h = Harness::new(TransitionConfig::default());
    let load = h.loader("level", Color::BLUE);
    h.controller.animate_change_to_scene(load, None).unwrap();
    h.frame();

    h.controller.set_view_lookup(|_| None);
    h.controller.set_locator(|| None);
    h.present();
    h.time += DT;
    let err = h.controller.tick(h.time).unwrap_err();
    assert!(matches!(err, TransitionError::ViewRootNotFound));
    assert_eq!(h.controller.state(), TransitionState::AwaitingLoad);
    assert!(h.controller.borrow().snapshot_pending());

    h.controller.set_view_lookup(h.ctx.default_view_lookup());
    h.controller.set_locator(h.ctx.default_locator());
    h.tick();
    assert_eq!(h.controller.state(), TransitionState::Animating);
    let level = h.ctx.view_root(&ViewId::from("level")).unwrap();
    let overlay = h.controller.overlay().unwrap();
    assert!(Rc::ptr_eq(&overlay.root().unwrap(), &level));

    h.frames(6);
    assert_eq!(h.controller.state(), TransitionState::Idle);
    assert_eq!(h.backend.borrow().live_images(), 0);

    let load = h.loader("menu", Color::RED);
    h.controller.animate_change_to_scene(load, None).unwrap();
}

#[test]
fn additive_load_puts_overlay_on_new_view() {
    let mut h = Harness::new(TransitionConfig::default());
    let level = ViewRoot::shared(Color::BLUE);
    let ctx = h.ctx.clone();
    let incoming = Rc::clone(&level);

    h.controller
        .animate_change_to_scene(
            move || ctx.activate_view("level", LoadMode::Additive, incoming),
            None,
        )
        .unwrap();
    h.frames(2);

    let overlay = h.controller.overlay().unwrap();
    assert!(Rc::ptr_eq(&overlay.root().unwrap(), &level));
    let menu = h.ctx.view_root(&ViewId::from("menu")).unwrap();
    assert!(menu.borrow().is_empty());
    assert!(level.borrow_mut().take_clear_suppression());
}

#[test]
fn unknown_view_falls_back_to_locator() {
    let mut h = Harness::new(TransitionConfig::default());
    let notifier = h.ctx.notifier();

    h.controller
        .animate_change_to_scene(
            move || {
                notifier.notify(&ViewLoaded {
                    view: ViewId::from("elsewhere"),
                    mode: LoadMode::Single,
                })
            },
            None,
        )
        .unwrap();
    h.frames(2);

    let menu = h.ctx.view_root(&ViewId::from("menu")).unwrap();
    let overlay = h.controller.overlay().unwrap();
    assert!(Rc::ptr_eq(&overlay.root().unwrap(), &menu));
}
