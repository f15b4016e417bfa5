//! CPU render backend.
//!
//! [`HeadlessBackend`] rasterizes view roots into RGBA pixels without a GPU. It is
//! what tests and offscreen tools use, and it mirrors the behavior a real
//! pipeline shows to a transition:
//!
//! - a redirected view's frame reaches its buffer one frame after it was drawn,
//!   so a buffer holds the view only after two presents;
//! - the screen keeps its previous contents while the presented view is redirected;
//! - every allocation and release is recorded so ownership can be checked.

use crate::error::TransitionError;
use crate::host::{BufferId, ImageId, RenderBackend};
use crate::ui::{Color, ViewRoot, ViewRootHandle};
use glam::UVec2;
use image::{Rgba, RgbaImage};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::rc::{Rc, Weak};

/// Resource lifecycle events recorded by [`HeadlessBackend`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceEvent {
    BufferCreated(BufferId),
    BufferReleased(BufferId),
    ImageCreated(ImageId),
    ImageReleased(ImageId),
}

struct Redirect {
    root: Weak<RefCell<ViewRoot>>,
    buffer: BufferId,
    in_flight: Option<RgbaImage>,
}

pub struct HeadlessBackend {
    viewport: UVec2,
    screen: RgbaImage,
    buffers: HashMap<BufferId, RgbaImage>,
    images: HashMap<ImageId, RgbaImage>,
    redirects: Vec<Redirect>,
    next_handle: u64,
    events: Vec<ResourceEvent>,
}

impl HeadlessBackend {
    pub fn new(viewport: UVec2) -> Self {
        Self {
            viewport,
            screen: RgbaImage::new(viewport.x, viewport.y),
            buffers: HashMap::new(),
            images: HashMap::new(),
            redirects: Vec::new(),
            next_handle: 1,
            events: Vec::new(),
        }
    }

    /// Wrap a new backend for sharing with a controller.
    pub fn shared(viewport: UVec2) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::new(viewport)))
    }

    /// Resize the screen. Existing buffers keep their size.
    pub fn set_viewport(&mut self, viewport: UVec2) {
        self.viewport = viewport;
        self.screen = RgbaImage::new(viewport.x, viewport.y);
    }

    /// Render one frame of `root`.
    ///
    /// If the root is redirected the frame goes to its buffer (one frame late) and
    /// the screen is left untouched. Otherwise it is drawn to the screen, cleared to
    /// the root's background unless clear suppression is active.
    pub fn present(&mut self, root: &ViewRootHandle) {
        let weak = Rc::downgrade(root);
        if let Some(index) = self
            .redirects
            .iter()
            .position(|redirect| redirect.root.ptr_eq(&weak))
        {
            let buffer_id = self.redirects[index].buffer;
            let Some(size) = self.buffers.get(&buffer_id).map(|b| b.dimensions()) else {
                return;
            };
            let mut frame = RgbaImage::new(size.0, size.1);
            rasterize(&root.borrow(), &mut frame, &self.images, true);

            let landed = self.redirects[index].in_flight.replace(frame);
            if let (Some(landed), Some(buffer)) = (landed, self.buffers.get_mut(&buffer_id)) {
                *buffer = landed;
            }
            return;
        }

        let clear = !root.borrow_mut().take_clear_suppression();
        rasterize(&root.borrow(), &mut self.screen, &self.images, clear);
    }

    pub fn screen(&self) -> &RgbaImage {
        &self.screen
    }

    pub fn screen_pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.screen.get_pixel(x, y).0
    }

    pub fn image_pixel(&self, image: ImageId, x: u32, y: u32) -> Option<[u8; 4]> {
        self.images
            .get(&image)
            .and_then(|img| img.get_pixel_checked(x, y))
            .map(|p| p.0)
    }

    pub fn buffer_pixel(&self, buffer: BufferId, x: u32, y: u32) -> Option<[u8; 4]> {
        self.buffers
            .get(&buffer)
            .and_then(|img| img.get_pixel_checked(x, y))
            .map(|p| p.0)
    }

    /// Write a still image to disk. The format follows the file extension.
    pub fn save_image(&self, image: ImageId, path: impl AsRef<Path>) -> Result<(), TransitionError> {
        let img = self
            .images
            .get(&image)
            .ok_or(TransitionError::UnknownImage(image))?;
        img.save(path)?;
        Ok(())
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_images(&self) -> usize {
        self.images.len()
    }

    pub fn images_created(&self) -> usize {
        self.count(|e| matches!(e, ResourceEvent::ImageCreated(_)))
    }

    pub fn images_released(&self) -> usize {
        self.count(|e| matches!(e, ResourceEvent::ImageReleased(_)))
    }

    /// Every allocation and release, in order.
    pub fn events(&self) -> &[ResourceEvent] {
        &self.events
    }

    fn count(&self, pred: impl Fn(&ResourceEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    fn next_raw(&mut self) -> u64 {
        let raw = self.next_handle;
        self.next_handle += 1;
        raw
    }
}

impl RenderBackend for HeadlessBackend {
    fn viewport_size(&self) -> UVec2 {
        self.viewport
    }

    fn create_offscreen_buffer(&mut self, size: UVec2) -> BufferId {
        let id = BufferId::from_raw(self.next_raw());
        self.buffers.insert(id, RgbaImage::new(size.x, size.y));
        self.events.push(ResourceEvent::BufferCreated(id));
        id
    }

    fn buffer_size(&self, buffer: BufferId) -> Option<UVec2> {
        self.buffers
            .get(&buffer)
            .map(|img| UVec2::new(img.width(), img.height()))
    }

    fn redirect(
        &mut self,
        root: &ViewRootHandle,
        buffer: BufferId,
    ) -> Result<(), TransitionError> {
        if !self.buffers.contains_key(&buffer) {
            return Err(TransitionError::UnknownBuffer(buffer));
        }
        let weak = Rc::downgrade(root);
        self.redirects
            .retain(|redirect| redirect.buffer != buffer && !redirect.root.ptr_eq(&weak));
        self.redirects.push(Redirect {
            root: weak,
            buffer,
            in_flight: None,
        });
        Ok(())
    }

    fn end_redirect(&mut self, buffer: BufferId) {
        self.redirects.retain(|redirect| redirect.buffer != buffer);
    }

    fn copy_to_still_image(&mut self, buffer: BufferId) -> Result<ImageId, TransitionError> {
        let pixels = self
            .buffers
            .get(&buffer)
            .cloned()
            .ok_or(TransitionError::UnknownBuffer(buffer))?;
        let id = ImageId::from_raw(self.next_raw());
        self.images.insert(id, pixels);
        self.events.push(ResourceEvent::ImageCreated(id));
        Ok(id)
    }

    fn release_still_image(&mut self, image: ImageId) -> bool {
        if self.images.remove(&image).is_some() {
            self.events.push(ResourceEvent::ImageReleased(image));
            true
        } else {
            false
        }
    }

    fn release_buffer(&mut self, buffer: BufferId) -> bool {
        self.end_redirect(buffer);
        if self.buffers.remove(&buffer).is_some() {
            self.events.push(ResourceEvent::BufferReleased(buffer));
            true
        } else {
            false
        }
    }
}

/// Draw `root` into `target`, optionally clearing to its background first.
fn rasterize(
    root: &ViewRoot,
    target: &mut RgbaImage,
    images: &HashMap<ImageId, RgbaImage>,
    clear: bool,
) {
    if clear {
        let bg = Rgba(root.background.to_rgba8());
        target.pixels_mut().for_each(|p| *p = bg);
    }

    let viewport = UVec2::new(target.width(), target.height());
    for (_, element) in root.children() {
        let style = &element.style;
        let image = style.background_image.and_then(|id| images.get(&id));
        if image.is_none() && style.background_color.is_none() {
            continue;
        }

        let rect = element.layout(viewport);
        if rect.width <= 0.0 || rect.height <= 0.0 {
            continue;
        }
        let x0 = rect.x.max(0.0).floor() as u32;
        let y0 = rect.y.max(0.0).floor() as u32;
        let x1 = (rect.x + rect.width).min(viewport.x as f32).ceil().max(0.0) as u32;
        let y1 = (rect.y + rect.height).min(viewport.y as f32).ceil().max(0.0) as u32;

        for y in y0..y1 {
            for x in x0..x1 {
                let src = match image {
                    Some(img) => {
                        let u = ((x as f32 - rect.x) / rect.width * img.width() as f32) as u32;
                        let v = ((y as f32 - rect.y) / rect.height * img.height() as f32) as u32;
                        match img.get_pixel_checked(u, v) {
                            Some(p) => *p,
                            None => continue,
                        }
                    }
                    None => Rgba(style.background_color.unwrap_or(Color::TRANSPARENT).to_rgba8()),
                };
                let alpha = src.0[3] as f32 / 255.0 * style.opacity();
                let dst = target.get_pixel_mut(x, y);
                for c in 0..3 {
                    let blended = src.0[c] as f32 * alpha + dst.0[c] as f32 * (1.0 - alpha);
                    dst.0[c] = blended.round() as u8;
                }
                let out_alpha = alpha * 255.0 + dst.0[3] as f32 * (1.0 - alpha);
                dst.0[3] = out_alpha.round() as u8;
            }
        }
    }
}
