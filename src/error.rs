//! Error type shared by the capture, overlay and backend layers.

use crate::host::{BufferId, ImageId};

/// Errors that can occur while running a scene transition.
#[derive(Debug, thiserror::Error)]
pub enum TransitionError {
    /// No view root could be located. This is a wiring defect in the host:
    /// either nothing has been activated yet or the locator is wrong.
    #[error("no active view root found")]
    ViewRootNotFound,

    /// A capture or load is already in flight on this controller.
    #[error("a scene transition is already capturing or loading")]
    TransitionInProgress,

    /// The controller was shut down and no longer accepts requests.
    #[error("transition controller has been shut down")]
    ControllerShutDown,

    /// The offscreen buffer was read before enough frames elapsed to populate it.
    #[error("snapshot buffer not populated yet ({frames_remaining} frame(s) remaining)")]
    SnapshotNotReady { frames_remaining: u32 },

    /// The backend does not know the given offscreen buffer.
    #[error("unknown offscreen buffer {0:?}")]
    UnknownBuffer(BufferId),

    /// The backend does not know the given still image.
    #[error("unknown still image {0:?}")]
    UnknownImage(ImageId),

    /// GPU initialization failed (no adapter, device or surface).
    #[error("GPU error: {0}")]
    Gpu(String),

    /// Encoding a still image failed.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}
