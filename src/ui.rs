//! Minimal retained view tree.
//!
//! A [`ViewRoot`] is the root of whatever a loaded view displays. Transitions only
//! need a handful of layout features from it: absolute positioning, pixel or percent
//! lengths, opacity, a background color or still image, and a picking mode that
//! decides whether an element swallows pointer input.

use crate::host::ImageId;
use glam::{UVec2, Vec2};
use std::cell::RefCell;
use std::rc::Rc;

/// Shared handle to a view root.
///
/// View roots are owned by the host's loader and shared with the transition
/// controller, which appends and later removes its overlay.
pub type ViewRootHandle = Rc<RefCell<ViewRoot>>;

/// A rectangle in screen-space pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether `point` lies inside the rectangle (right and bottom edges excluded).
    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.x
            && point.y >= self.y
            && point.x < self.x + self.width
            && point.y < self.y + self.height
    }
}

/// RGBA color, components in `0.0..=1.0`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const WHITE: Color = Color::rgba(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgba(0.0, 0.0, 0.0, 1.0);
    pub const RED: Color = Color::rgba(1.0, 0.0, 0.0, 1.0);
    pub const BLUE: Color = Color::rgba(0.0, 0.0, 1.0, 1.0);
    pub const TRANSPARENT: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);

    /// Convert to 8-bit RGBA.
    pub fn to_rgba8(self) -> [u8; 4] {
        let q = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }
}

/// A length resolved against the size of the containing view.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Length {
    /// Absolute pixels.
    Px(f32),
    /// Percentage of the container's extent on the same axis.
    Percent(f32),
}

impl Length {
    /// Resolve to pixels against `extent`.
    pub fn resolve(self, extent: f32) -> f32 {
        match self {
            Length::Px(px) => px,
            Length::Percent(pct) => extent * pct / 100.0,
        }
    }
}

/// How an element is positioned.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Position {
    /// Placed at the container origin unless offsets say otherwise.
    #[default]
    Relative,
    /// Taken out of flow and placed by its offsets, on top of earlier siblings.
    Absolute,
}

/// Whether an element receives pointer input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PickingMode {
    /// The element is hit-tested and blocks whatever is beneath it.
    Blocking,
    /// Pointer input passes through to elements underneath.
    #[default]
    ClickThrough,
}

/// Visual style of an element.
#[derive(Clone, Debug, PartialEq)]
pub struct Style {
    pub position: Position,
    pub left: Option<Length>,
    pub top: Option<Length>,
    pub bottom: Option<Length>,
    pub width: Length,
    pub height: Length,
    opacity: f32,
    pub background_color: Option<Color>,
    pub background_image: Option<ImageId>,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            position: Position::Relative,
            left: None,
            top: None,
            bottom: None,
            width: Length::Percent(100.0),
            height: Length::Percent(100.0),
            opacity: 1.0,
            background_color: None,
            background_image: None,
        }
    }
}

impl Style {
    /// Current opacity in `0.0..=1.0`.
    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    /// Set the opacity. Values outside `0.0..=1.0` are clamped.
    pub fn set_opacity(&mut self, opacity: f32) {
        self.opacity = if opacity.is_nan() {
            0.0
        } else {
            opacity.clamp(0.0, 1.0)
        };
    }
}

/// Identifier of an element within one [`ViewRoot`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(u64);

/// A node in a view root.
#[derive(Clone, Debug)]
pub struct Element {
    pub name: Option<String>,
    pub style: Style,
    pub picking_mode: PickingMode,
}

impl Element {
    /// A blocking, full-size element with no background.
    pub fn new() -> Self {
        Self {
            name: None,
            style: Style::default(),
            picking_mode: PickingMode::Blocking,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn absolute(mut self) -> Self {
        self.style.position = Position::Absolute;
        self
    }

    pub fn at(mut self, left: Length, top: Length) -> Self {
        self.style.left = Some(left);
        self.style.top = Some(top);
        self
    }

    pub fn size(mut self, width: Length, height: Length) -> Self {
        self.style.width = width;
        self.style.height = height;
        self
    }

    pub fn background(mut self, color: Color) -> Self {
        self.style.background_color = Some(color);
        self
    }

    pub fn image(mut self, image: ImageId) -> Self {
        self.style.background_image = Some(image);
        self
    }

    pub fn picking(mut self, mode: PickingMode) -> Self {
        self.picking_mode = mode;
        self
    }

    /// Resolve the element's rectangle inside a container of `viewport` pixels.
    pub fn layout(&self, viewport: UVec2) -> Rect {
        let size = viewport.as_vec2();
        let width = self.style.width.resolve(size.x);
        let height = self.style.height.resolve(size.y);
        let x = self.style.left.map_or(0.0, |l| l.resolve(size.x));
        let y = match (self.style.top, self.style.bottom) {
            (Some(top), _) => top.resolve(size.y),
            (None, Some(bottom)) => size.y - bottom.resolve(size.y) - height,
            (None, None) => 0.0,
        };
        Rect::new(x, y, width, height)
    }
}

impl Default for Element {
    fn default() -> Self {
        Self::new()
    }
}

/// Root node of a displayed element tree.
///
/// Children are drawn in insertion order, so the last appended element is on top.
#[derive(Debug)]
pub struct ViewRoot {
    /// Color the view is cleared to before its elements are drawn.
    pub background: Color,
    children: Vec<(ElementId, Element)>,
    next_id: u64,
    clear_suppressed_frames: u32,
}

impl ViewRoot {
    pub fn new(background: Color) -> Self {
        Self {
            background,
            children: Vec::new(),
            next_id: 0,
            clear_suppressed_frames: 0,
        }
    }

    /// Create a root already wrapped in a shared handle.
    pub fn shared(background: Color) -> ViewRootHandle {
        Rc::new(RefCell::new(Self::new(background)))
    }

    /// Append an element on top of the existing children.
    pub fn add(&mut self, element: Element) -> ElementId {
        let id = ElementId(self.next_id);
        self.next_id += 1;
        self.children.push((id, element));
        id
    }

    /// Remove an element. Returns `false` if it was not attached.
    pub fn remove(&mut self, id: ElementId) -> bool {
        let before = self.children.len();
        self.children.retain(|(child, _)| *child != id);
        self.children.len() != before
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.children.iter().any(|(child, _)| *child == id)
    }

    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.children
            .iter()
            .find(|(child, _)| *child == id)
            .map(|(_, element)| element)
    }

    pub fn get_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.children
            .iter_mut()
            .find(|(child, _)| *child == id)
            .map(|(_, element)| element)
    }

    /// Children in draw order (bottom first).
    pub fn children(&self) -> impl Iterator<Item = (ElementId, &Element)> {
        self.children.iter().map(|(id, element)| (*id, element))
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Topmost blocking element under `point`, if any.
    pub fn pick(&self, point: Vec2, viewport: UVec2) -> Option<ElementId> {
        self.children
            .iter()
            .rev()
            .filter(|(_, element)| element.picking_mode == PickingMode::Blocking)
            .find(|(_, element)| element.layout(viewport).contains(point))
            .map(|(id, _)| *id)
    }

    /// Skip the background clear for the next `frames` presented frames.
    pub fn suppress_clear_for(&mut self, frames: u32) {
        self.clear_suppressed_frames = self.clear_suppressed_frames.max(frames);
    }

    /// Consume one frame of clear suppression. Returns `true` if this frame should
    /// keep the previous contents instead of clearing.
    pub fn take_clear_suppression(&mut self) -> bool {
        if self.clear_suppressed_frames > 0 {
            self.clear_suppressed_frames -= 1;
            true
        } else {
            false
        }
    }
}

impl Default for ViewRoot {
    fn default() -> Self {
        Self::new(Color::BLACK)
    }
}
