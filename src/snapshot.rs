//! Capturing a view into a still image.
//!
//! Capture happens in two steps. [`SnapshotCapturer::capture`] redirects a view's
//! rendering into an offscreen buffer; after the frame delay has elapsed
//! (render pipelines buffer their output), [`SnapshotCapturer::take_snapshot`]
//! copies the buffer into a standalone still image.
//!
//! The capturer owns at most one buffer and one still image at any time. A new
//! still image is only allocated after the previous one was released.

use crate::error::TransitionError;
use crate::host::{BufferId, ImageId, RenderBackend};
use crate::ui::ViewRootHandle;
use glam::UVec2;

/// Frames that must elapse after redirection before the buffer is populated.
pub const DEFAULT_FRAME_DELAY: u32 = 2;

/// An offscreen buffer and the still image derived from it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub buffer: BufferId,
    pub image: ImageId,
    /// Pixel size of both the buffer and the image.
    pub size: UVec2,
}

#[derive(Debug)]
pub struct SnapshotCapturer {
    frame_delay: u32,
    buffer: Option<(BufferId, UVec2)>,
    redirecting: bool,
    frames_elapsed: u32,
    image: Option<ImageId>,
}

impl SnapshotCapturer {
    pub fn new(frame_delay: u32) -> Self {
        Self {
            frame_delay,
            buffer: None,
            redirecting: false,
            frames_elapsed: 0,
            image: None,
        }
    }

    pub fn frame_delay(&self) -> u32 {
        self.frame_delay
    }

    /// The current offscreen buffer, if one is allocated.
    pub fn buffer(&self) -> Option<BufferId> {
        self.buffer.map(|(buffer, _)| buffer)
    }

    /// The still image from the latest capture, if it has not been released.
    pub fn image(&self) -> Option<ImageId> {
        self.image
    }

    pub fn is_capturing(&self) -> bool {
        self.redirecting
    }

    /// Make sure an offscreen buffer of `size` exists, reallocating on resize.
    pub fn ensure_buffer(&mut self, backend: &mut dyn RenderBackend, size: UVec2) -> BufferId {
        match self.buffer {
            Some((buffer, current)) if current == size => buffer,
            stale => {
                if let Some((old, _)) = stale {
                    backend.end_redirect(old);
                    backend.release_buffer(old);
                    log::debug!(target: "snapfade", "offscreen buffer resized to {}x{}", size.x, size.y);
                }
                let buffer = backend.create_offscreen_buffer(size);
                self.buffer = Some((buffer, size));
                buffer
            }
        }
    }

    /// Start redirecting `root` into an offscreen buffer of `resolution` pixels.
    ///
    /// Fails with [`TransitionError::ViewRootNotFound`] when there is no root.
    pub fn capture(
        &mut self,
        backend: &mut dyn RenderBackend,
        root: Option<&ViewRootHandle>,
        resolution: UVec2,
    ) -> Result<BufferId, TransitionError> {
        let root = root.ok_or(TransitionError::ViewRootNotFound)?;
        let buffer = self.ensure_buffer(backend, resolution);
        backend.redirect(root, buffer)?;
        self.redirecting = true;
        self.frames_elapsed = 0;
        Ok(buffer)
    }

    /// Count one frame boundary.
    pub fn frame(&mut self) {
        if self.redirecting {
            self.frames_elapsed = self.frames_elapsed.saturating_add(1);
        }
    }

    /// Frames left before the buffer is guaranteed to hold the view.
    pub fn frames_remaining(&self) -> u32 {
        self.frame_delay.saturating_sub(self.frames_elapsed)
    }

    pub fn is_populated(&self) -> bool {
        self.redirecting && self.frames_remaining() == 0
    }

    /// End redirection and copy the buffer into a new still image.
    ///
    /// The previous still image, if any, is released first.
    pub fn take_snapshot(
        &mut self,
        backend: &mut dyn RenderBackend,
    ) -> Result<Snapshot, TransitionError> {
        let (buffer, size) = match self.buffer {
            Some(buffer) if self.redirecting => buffer,
            _ => {
                return Err(TransitionError::SnapshotNotReady {
                    frames_remaining: self.frame_delay,
                });
            }
        };
        if !self.is_populated() {
            return Err(TransitionError::SnapshotNotReady {
                frames_remaining: self.frames_remaining(),
            });
        }

        backend.end_redirect(buffer);
        self.redirecting = false;
        self.release_image(backend);

        let image = backend.copy_to_still_image(buffer)?;
        self.image = Some(image);
        Ok(Snapshot {
            buffer,
            image,
            size,
        })
    }

    /// Stop redirecting without taking a snapshot. The buffer and any still image
    /// are kept.
    pub fn cancel(&mut self, backend: &mut dyn RenderBackend) {
        if self.redirecting {
            if let Some((buffer, _)) = self.buffer {
                backend.end_redirect(buffer);
            }
        }
        self.redirecting = false;
        self.frames_elapsed = 0;
    }

    /// Release the current still image. Returns `false` if there was none.
    pub fn release_image(&mut self, backend: &mut dyn RenderBackend) -> bool {
        match self.image.take() {
            Some(image) => {
                if !backend.release_still_image(image) {
                    log::warn!(target: "snapfade", "still image {image:?} was already gone");
                }
                true
            }
            None => false,
        }
    }

    /// Stop any capture and free the still image, then the buffer.
    pub fn shutdown(&mut self, backend: &mut dyn RenderBackend) {
        if let Some((buffer, _)) = self.buffer.take() {
            if self.redirecting {
                backend.end_redirect(buffer);
            }
            self.release_image(backend);
            backend.release_buffer(buffer);
        } else {
            self.release_image(backend);
        }
        self.redirecting = false;
        self.frames_elapsed = 0;
    }
}

impl Default for SnapshotCapturer {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_DELAY)
    }
}
