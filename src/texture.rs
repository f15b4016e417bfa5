use crate::gpu::GpuContext;
use crate::render_target::RenderTarget;

/// A still image on the GPU, ready to be sampled by the overlay pass.
#[derive(Debug)]
pub struct Texture {
    pub(crate) texture: wgpu::Texture,
    pub(crate) view: wgpu::TextureView,
    pub(crate) sampler: wgpu::Sampler,
    pub width: u32,
    pub height: u32,
}

impl Texture {
    /// Copy the current contents of a render target into a new standalone texture.
    ///
    /// The copy happens on the GPU; the result stays valid after the target is
    /// reused or dropped.
    pub fn copy_of(gpu: &GpuContext, source: &RenderTarget, label: &str) -> Self {
        let size = source.size();
        let extent = wgpu::Extent3d {
            width: size.x,
            height: size.y,
            depth_or_array_layers: 1,
        };
        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: source.format(),
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Still Image Copy"),
            });
        encoder.copy_texture_to_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &source.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            extent,
        );
        gpu.queue.submit(std::iter::once(encoder.finish()));

        Self::wrap(gpu, texture, size.x, size.y, label)
    }

    fn wrap(gpu: &GpuContext, texture: wgpu::Texture, width: u32, height: u32, label: &str) -> Self {
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        // Snapshots are shown at screen size, so clamp and filter linearly
        let sampler = gpu.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(&format!("{} Sampler", label)),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            texture,
            view,
            sampler,
            width,
            height,
        }
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.texture.format()
    }
}
