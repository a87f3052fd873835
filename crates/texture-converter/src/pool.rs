use wgpu::util::DeviceExt;

use crate::{
    ConvertError, Dimensions,
    util::{create, extent, padded_bytes_per_row},
};

/// Parameters read by the repack kernel and the resampler. Matches
/// `TextureInfo` in both shaders; padded to the 16 byte uniform alignment.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct TextureInfo {
    pub width: u32,
    pub height: u32,
    _padding: [u32; 2],
}

impl TextureInfo {
    pub fn new(dimensions: Dimensions) -> Self {
        Self {
            width: dimensions.width(),
            height: dimensions.height(),
            _padding: [0; 2],
        }
    }
}

pub(crate) const INTERMEDIATE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Bgra8Unorm;
pub(crate) const OUTPUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R8Uint;

/// The fixed set of GPU resources a converter owns, sized once from its
/// [`Dimensions`].
pub(crate) struct ResourcePool {
    pub intermediate_texture: wgpu::Texture,
    pub intermediate_view: wgpu::TextureView,
    pub output_texture: wgpu::Texture,
    pub output_view: wgpu::TextureView,
    pub staging_buffer: wgpu::Buffer,
    pub staging_row_pitch: u32,
    pub texture_info_buffer: wgpu::Buffer,
}

impl ResourcePool {
    pub fn new(device: &wgpu::Device, dimensions: Dimensions) -> Result<Self, ConvertError> {
        let intermediate_texture = create(device, "intermediate texture", || {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some("Texture Converter Intermediate Texture"),
                size: extent(dimensions.width(), dimensions.height()),
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: INTERMEDIATE_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            })
        })?;

        let output_texture = create(device, "output texture", || {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some("Texture Converter Output Texture"),
                size: extent(dimensions.output_row_bytes(), dimensions.height()),
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: OUTPUT_FORMAT,
                usage: wgpu::TextureUsages::STORAGE_BINDING
                    | wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::COPY_SRC,
                view_formats: &[],
            })
        })?;

        let (intermediate_view, output_view) = create(device, "texture views", || {
            (
                intermediate_texture.create_view(&Default::default()),
                output_texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some("Texture Converter Output Storage View"),
                    format: Some(OUTPUT_FORMAT),
                    dimension: Some(wgpu::TextureViewDimension::D2),
                    mip_level_count: Some(1),
                    ..Default::default()
                }),
            )
        })?;

        // The R8Uint texel is one byte, so the copy row pitch is the output row
        // rounded up to the copy alignment.
        let staging_row_pitch = padded_bytes_per_row(dimensions.output_row_bytes());
        let staging_buffer = create(device, "staging buffer", || {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Texture Converter Staging Buffer"),
                size: staging_row_pitch as u64 * dimensions.height() as u64,
                usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                mapped_at_creation: false,
            })
        })?;

        let texture_info_buffer = create(device, "texture info buffer", || {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Texture Converter Info Buffer"),
                contents: bytemuck::cast_slice(&[TextureInfo::new(dimensions)]),
                usage: wgpu::BufferUsages::UNIFORM,
            })
        })?;

        Ok(Self {
            intermediate_texture,
            intermediate_view,
            output_texture,
            output_view,
            staging_buffer,
            staging_row_pitch,
            texture_info_buffer,
        })
    }
}
