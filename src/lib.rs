//! # Snapfade
//!
//! **Hide the seam when a view is swapped.**
//!
//! Snapfade takes a still snapshot of the outgoing view, lays it over the freshly
//! loaded one, and animates it away (fade, slide, or anything you write) so the
//! switch looks continuous.
//!
//! ## Quick Start
//!
//! ```
//! use snapfade::*;
//!
//! let ctx = TransitionContext::new();
//! let backend = HeadlessBackend::shared(UVec2::new(320, 180));
//! let controller = ctx
//!     .spawn_controller(backend.clone(), TransitionConfig::default())
//!     .expect("first controller");
//!
//! ctx.activate_view("menu", LoadMode::Single, ViewRoot::shared(Color::RED));
//!
//! let loader = ctx.clone();
//! controller
//!     .animate_change_to_scene(
//!         move || loader.activate_view("level", LoadMode::Single, ViewRoot::shared(Color::BLUE)),
//!         None,
//!     )
//!     .unwrap();
//!
//! // Drive it from the frame loop.
//! let mut time = 0.0;
//! for _ in 0..60 {
//!     time += 1.0 / 60.0;
//!     controller.tick(time).unwrap();
//! }
//! assert_eq!(controller.state(), TransitionState::Idle);
//! ```
//!
//! ## Pieces
//!
//! - [`Animator`]: percent-based time driver, one tick per frame.
//! - [`SnapshotCapturer`]: redirects a view offscreen and copies it to a still image.
//! - [`TransitionController`]: the capture → load → overlay → animate state machine.
//! - [`TransitionContext`]: shared views, notifier, and the single live controller.
//! - [`HeadlessBackend`] / [`GpuBackend`]: CPU and wgpu [`RenderBackend`]s.

pub mod animation;
mod config;
mod context;
mod controller;
mod error;
mod gpu;
mod gpu_backend;
mod headless;
pub mod host;
mod overlay;
mod overlay_pass;
mod render_target;
mod snapshot;
mod texture;
pub mod ui;

pub use animation::{Animator, Easing, fade_out, slide_to_top};
pub use config::{DEFAULT_FADE_DURATION, TransitionConfig};
pub use context::TransitionContext;
pub use controller::{
    ControllerHandle, CustomAnimation, LoadAction, TransitionController, TransitionState,
};
pub use error::TransitionError;
pub use gpu::GpuContext;
pub use gpu_backend::GpuBackend;
pub use headless::{HeadlessBackend, ResourceEvent};
pub use host::{
    BufferId, ImageId, LoadMode, RenderBackend, SharedBackend, SubscriptionId, ViewId,
    ViewLoadNotifier, ViewLoaded, ViewRootLocator, ViewRootLookup,
};
pub use overlay::{OVERLAY_NAME, OverlayHandle, overlay_element};
pub use overlay_pass::OverlayPass;
pub use render_target::RenderTarget;
pub use snapshot::{DEFAULT_FRAME_DELAY, Snapshot, SnapshotCapturer};
pub use texture::Texture;
pub use ui::{
    Color, Element, ElementId, Length, PickingMode, Position, Rect, Style, ViewRoot,
    ViewRootHandle,
};

// Re-export glam math types for convenience
pub use glam::{UVec2, Vec2};
