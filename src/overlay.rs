//! The snapshot overlay element.

use crate::host::ImageId;
use crate::ui::{Element, ElementId, Length, PickingMode, ViewRoot, ViewRootHandle};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// Name given to overlay elements, visible when inspecting a view tree.
pub const OVERLAY_NAME: &str = "snapfade-overlay";

/// Build the element that shows a still image over an entire view.
pub fn overlay_element(image: ImageId, picking_mode: PickingMode) -> Element {
    Element::new()
        .named(OVERLAY_NAME)
        .absolute()
        .size(Length::Percent(100.0), Length::Percent(100.0))
        .image(image)
        .picking(picking_mode)
}

/// Handle to an overlay attached to a view root.
///
/// The handle holds the root weakly: once the host drops a view, every operation
/// on its overlays is a no-op. Cloning yields another handle to the same element.
#[derive(Clone, Debug)]
pub struct OverlayHandle {
    root: Weak<RefCell<ViewRoot>>,
    element: ElementId,
    image: ImageId,
}

impl OverlayHandle {
    /// Append a new overlay showing `image` to `root`.
    pub fn attach(root: &ViewRootHandle, image: ImageId, picking_mode: PickingMode) -> Self {
        let element = root
            .borrow_mut()
            .add(overlay_element(image, picking_mode));
        Self {
            root: Rc::downgrade(root),
            element,
            image,
        }
    }

    pub fn element(&self) -> ElementId {
        self.element
    }

    /// The still image this overlay displays.
    pub fn image(&self) -> ImageId {
        self.image
    }

    /// The root this overlay was attached to, if it is still alive.
    pub fn root(&self) -> Option<ViewRootHandle> {
        self.root.upgrade()
    }

    /// Whether the overlay is still part of a live view root.
    pub fn is_attached(&self) -> bool {
        self.root
            .upgrade()
            .is_some_and(|root| root.borrow().contains(self.element))
    }

    /// Current opacity, `None` once detached.
    pub fn opacity(&self) -> Option<f32> {
        self.with_element(|element| element.style.opacity())
    }

    pub fn set_opacity(&self, opacity: f32) {
        self.with_element(|element| element.style.set_opacity(opacity));
    }

    /// Current bottom offset, `None` once detached or when unset.
    pub fn bottom(&self) -> Option<Length> {
        self.with_element(|element| element.style.bottom).flatten()
    }

    pub fn set_bottom(&self, bottom: Length) {
        self.with_element(|element| element.style.bottom = Some(bottom));
    }

    pub fn picking_mode(&self) -> Option<PickingMode> {
        self.with_element(|element| element.picking_mode)
    }

    /// Run `f` against the overlay element if it is still attached.
    pub fn with_element<R>(&self, f: impl FnOnce(&mut Element) -> R) -> Option<R> {
        let root = self.root.upgrade()?;
        let mut root = root.borrow_mut();
        root.get_mut(self.element).map(f)
    }

    /// Detach the overlay from its root. Returns `false` if it was already gone.
    pub fn remove(&self) -> bool {
        match self.root.upgrade() {
            Some(root) => root.borrow_mut().remove(self.element),
            None => false,
        }
    }
}
