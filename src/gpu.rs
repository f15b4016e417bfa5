//! Core GPU context and device management.
//!
//! [`GpuContext`] holds the wgpu device, queue and (for windowed hosts) the
//! presentation surface. The [`GpuBackend`](crate::GpuBackend) uses it to create
//! offscreen buffers and still images.
//!
//! # Example
//!
//! ```no_run
//! use snapfade::GpuContext;
//!
//! // No window needed for offscreen capture
//! let gpu = GpuContext::headless(1280, 720).expect("GPU available");
//! println!("{}x{} (aspect: {})", gpu.width(), gpu.height(), gpu.aspect());
//! ```

use crate::error::TransitionError;
use std::sync::Arc;
use winit::window::Window;

/// Format used for offscreen rendering when there is no surface to match.
pub const HEADLESS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// Core GPU context holding wgpu resources.
///
/// All fields are public to allow direct access to wgpu APIs when needed. A
/// headless context has no surface; its `config` still describes the virtual
/// screen size and format that offscreen buffers follow.
pub struct GpuContext {
    /// The surface for presenting rendered frames, `None` when headless.
    pub surface: Option<wgpu::Surface<'static>>,
    /// The logical GPU device for creating resources and pipelines.
    pub device: wgpu::Device,
    /// The command queue for submitting work to the GPU.
    pub queue: wgpu::Queue,
    /// Current surface configuration (format, size, present mode).
    pub config: wgpu::SurfaceConfiguration,
}

impl GpuContext {
    /// Create a new GPU context presenting to a winit window.
    ///
    /// The surface is configured with an sRGB format and Fifo present mode.
    pub fn new(window: Arc<Window>) -> Result<Self, TransitionError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .map_err(|e| TransitionError::Gpu(e.to_string()))?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .map_err(|e| TransitionError::Gpu(e.to_string()))?;

        let (device, queue) = request_device(&adapter)?;

        let surface_caps = surface.get_capabilities(&adapter);
        let (surface_format, alpha_mode) = choose_surface_mode(&surface_caps)?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        Ok(Self {
            surface: Some(surface),
            device,
            queue,
            config,
        })
    }

    /// Create a context without a window, for offscreen rendering.
    pub fn headless(width: u32, height: u32) -> Result<Self, TransitionError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| TransitionError::Gpu(e.to_string()))?;

        let (device, queue) = request_device(&adapter)?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: HEADLESS_FORMAT,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        Ok(Self {
            surface: None,
            device,
            queue,
            config,
        })
    }

    /// Resize to new dimensions.
    ///
    /// Ignores zero-sized dimensions to avoid wgpu validation errors (which can
    /// occur during window minimize).
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            if let Some(surface) = &self.surface {
                surface.configure(&self.device, &self.config);
            }
        }
    }

    /// Returns the current surface width in pixels.
    pub fn width(&self) -> u32 {
        self.config.width
    }

    /// Returns the current surface height in pixels.
    pub fn height(&self) -> u32 {
        self.config.height
    }

    /// Returns the current aspect ratio (width / height).
    pub fn aspect(&self) -> f32 {
        self.config.width as f32 / self.config.height as f32
    }
}

/// Prefer an sRGB format, otherwise the surface's first one.
///
/// Fails when the surface reports no formats or alpha modes, which happens when it
/// is incompatible with the adapter.
fn choose_surface_mode(
    caps: &wgpu::SurfaceCapabilities,
) -> Result<(wgpu::TextureFormat, wgpu::CompositeAlphaMode), TransitionError> {
    let format = caps
        .formats
        .iter()
        .find(|f| f.is_srgb())
        .or_else(|| caps.formats.first())
        .copied()
        .ok_or_else(|| TransitionError::Gpu("surface reports no texture formats".into()))?;
    let alpha_mode = caps
        .alpha_modes
        .first()
        .copied()
        .ok_or_else(|| TransitionError::Gpu("surface reports no alpha modes".into()))?;
    Ok((format, alpha_mode))
}

fn request_device(adapter: &wgpu::Adapter) -> Result<(wgpu::Device, wgpu::Queue), TransitionError> {
    pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("Snapfade Device"),
        required_features: wgpu::Features::empty(),
        required_limits: wgpu::Limits::default(),
        memory_hints: Default::default(),
        trace: Default::default(),
        experimental_features: Default::default(),
    }))
    .map_err(|e| TransitionError::Gpu(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(
        formats: Vec<wgpu::TextureFormat>,
        alpha_modes: Vec<wgpu::CompositeAlphaMode>,
    ) -> wgpu::SurfaceCapabilities {
        wgpu::SurfaceCapabilities {
            formats,
            alpha_modes,
            ..Default::default()
        }
    }

    #[test]
    fn srgb_format_is_preferred() {
        let caps = caps(
            vec![
                wgpu::TextureFormat::Bgra8Unorm,
                wgpu::TextureFormat::Bgra8UnormSrgb,
            ],
            vec![wgpu::CompositeAlphaMode::Opaque],
        );
        let (format, alpha) = choose_surface_mode(&caps).unwrap();
        assert_eq!(format, wgpu::TextureFormat::Bgra8UnormSrgb);
        assert_eq!(alpha, wgpu::CompositeAlphaMode::Opaque);
    }

    #[test]
    fn falls_back_to_first_format() {
        let caps = caps(
            vec![wgpu::TextureFormat::Rgba16Float],
            vec![wgpu::CompositeAlphaMode::Auto],
        );
        let (format, _) = choose_surface_mode(&caps).unwrap();
        assert_eq!(format, wgpu::TextureFormat::Rgba16Float);
    }

    #[test]
    fn empty_capabilities_are_an_error() {
        let no_formats = caps(vec![], vec![wgpu::CompositeAlphaMode::Opaque]);
        assert!(matches!(
            choose_surface_mode(&no_formats),
            Err(TransitionError::Gpu(_))
        ));

        let no_alpha = caps(vec![wgpu::TextureFormat::Bgra8UnormSrgb], vec![]);
        assert!(matches!(
            choose_surface_mode(&no_alpha),
            Err(TransitionError::Gpu(_))
        ));
    }
}
