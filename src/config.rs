use crate::animation::Easing;
use crate::snapshot::DEFAULT_FRAME_DELAY;
use crate::ui::PickingMode;

/// Default fade-out duration in seconds.
pub const DEFAULT_FADE_DURATION: f32 = 0.5;

/// Configuration for a transition controller.
#[derive(Clone, Debug, PartialEq)]
pub struct TransitionConfig {
    /// Whether the overlay swallows pointer input while it is visible.
    pub picking_mode: PickingMode,
    /// Skip the destination view's background clear for one frame when the
    /// overlay is inserted, so no blank frame shows while it settles.
    pub clear_suppression: bool,
    /// Frames to wait between redirecting the old view and loading the new one.
    pub frame_delay: u32,
    /// Duration of the default fade, in seconds.
    pub fade_duration: f32,
    /// Curve of the default fade.
    pub easing: Easing,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            picking_mode: PickingMode::ClickThrough,
            clear_suppression: true,
            frame_delay: DEFAULT_FRAME_DELAY,
            fade_duration: DEFAULT_FADE_DURATION,
            easing: Easing::Linear,
        }
    }
}

impl TransitionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn picking_mode(mut self, mode: PickingMode) -> Self {
        self.picking_mode = mode;
        self
    }

    pub fn clear_suppression(mut self, enabled: bool) -> Self {
        self.clear_suppression = enabled;
        self
    }

    pub fn frame_delay(mut self, frames: u32) -> Self {
        self.frame_delay = frames;
        self
    }

    pub fn fade_duration(mut self, seconds: f32) -> Self {
        self.fade_duration = seconds;
        self
    }

    pub fn easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }
}
