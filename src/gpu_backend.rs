//! wgpu implementation of [`RenderBackend`].
//!
//! The backend does not draw view content itself. Each frame the host asks
//! [`GpuBackend::target_for`] where a view should render: a redirected view gets
//! its offscreen buffer, any other view gets `None` and renders to the screen as
//! usual. Afterwards [`GpuBackend::draw_overlays`] composites the still images
//! that overlays in the view reference.

use crate::error::TransitionError;
use crate::gpu::GpuContext;
use crate::host::{BufferId, ImageId, RenderBackend};
use crate::overlay_pass::OverlayPass;
use crate::render_target::RenderTarget;
use crate::texture::Texture;
use crate::ui::{ViewRoot, ViewRootHandle};
use glam::UVec2;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

pub struct GpuBackend {
    gpu: GpuContext,
    buffers: HashMap<BufferId, RenderTarget>,
    images: HashMap<ImageId, Texture>,
    redirects: Vec<(Weak<RefCell<ViewRoot>>, BufferId)>,
    overlay_pass: OverlayPass,
    next_handle: u64,
}

impl GpuBackend {
    pub fn new(gpu: GpuContext) -> Self {
        let overlay_pass = OverlayPass::new(&gpu, gpu.config.format);
        Self {
            gpu,
            buffers: HashMap::new(),
            images: HashMap::new(),
            redirects: Vec::new(),
            overlay_pass,
            next_handle: 1,
        }
    }

    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }

    /// Mutable access, e.g. to resize the surface.
    pub fn gpu_mut(&mut self) -> &mut GpuContext {
        &mut self.gpu
    }

    /// The offscreen target `root` must render into this frame, if redirected.
    pub fn target_for(&self, root: &ViewRootHandle) -> Option<&wgpu::TextureView> {
        let weak = Rc::downgrade(root);
        self.redirects
            .iter()
            .find(|(redirected, _)| redirected.ptr_eq(&weak))
            .and_then(|(_, buffer)| self.buffers.get(buffer))
            .map(|target| &target.view)
    }

    /// Whether the screen pass for `root` should clear this frame.
    ///
    /// Consumes one frame of the root's clear suppression.
    pub fn should_clear(&self, root: &ViewRootHandle) -> bool {
        !root.borrow_mut().take_clear_suppression()
    }

    /// Composite every overlay of `root` that shows a still image onto `target`.
    pub fn draw_overlays(
        &self,
        root: &ViewRootHandle,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        target_size: UVec2,
    ) {
        let root = root.borrow();
        for (_, element) in root.children() {
            let Some(image) = element
                .style
                .background_image
                .and_then(|id| self.images.get(&id))
            else {
                continue;
            };
            let rect = element.layout(target_size);
            self.overlay_pass.draw(
                &self.gpu,
                encoder,
                target,
                target_size.as_vec2().to_array(),
                image,
                rect,
                element.style.opacity(),
            );
        }
    }

    /// A live still image.
    pub fn still_image(&self, image: ImageId) -> Option<&Texture> {
        self.images.get(&image)
    }

    fn next_raw(&mut self) -> u64 {
        let raw = self.next_handle;
        self.next_handle += 1;
        raw
    }
}

impl RenderBackend for GpuBackend {
    fn viewport_size(&self) -> UVec2 {
        UVec2::new(self.gpu.width(), self.gpu.height())
    }

    fn create_offscreen_buffer(&mut self, size: UVec2) -> BufferId {
        let id = BufferId::from_raw(self.next_raw());
        let target = RenderTarget::new(&self.gpu, size, "Snapshot Capture");
        target.clear(&self.gpu, wgpu::Color::TRANSPARENT);
        self.buffers.insert(id, target);
        id
    }

    fn buffer_size(&self, buffer: BufferId) -> Option<UVec2> {
        self.buffers.get(&buffer).map(RenderTarget::size)
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
            .retain(|(redirected, target)| *target != buffer && !redirected.ptr_eq(&weak));
        self.redirects.push((weak, buffer));
        Ok(())
    }

    fn end_redirect(&mut self, buffer: BufferId) {
        self.redirects.retain(|(_, target)| *target != buffer);
    }

    fn copy_to_still_image(&mut self, buffer: BufferId) -> Result<ImageId, TransitionError> {
        let source = self
            .buffers
            .get(&buffer)
            .ok_or(TransitionError::UnknownBuffer(buffer))?;
        let texture = Texture::copy_of(&self.gpu, source, "Snapshot Still Image");
        let id = ImageId::from_raw(self.next_raw());
        self.images.insert(id, texture);
        Ok(id)
    }

    fn release_still_image(&mut self, image: ImageId) -> bool {
        self.images.remove(&image).is_some()
    }

    fn release_buffer(&mut self, buffer: BufferId) -> bool {
        self.end_redirect(buffer);
        self.buffers.remove(&buffer).is_some()
    }
}
