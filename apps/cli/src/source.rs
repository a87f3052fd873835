use std::path::Path;

use anyhow::Context;
use wgpu::util::DeviceExt;

const TEST_CARD_WIDTH: u32 = 1920;
const TEST_CARD_HEIGHT: u32 = 1080;

/// Decodes `path` and uploads it as an `Rgba8Unorm` texture.
pub fn load_image(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    path: &Path,
) -> anyhow::Result<wgpu::Texture> {
    let image = image::open(path)
        .with_context(|| format!("Failed to load image '{}'", path.display()))?
        .to_rgba8();

    tracing::info!(
        width = image.width(),
        height = image.height(),
        "Loaded input image"
    );

    Ok(upload(
        device,
        queue,
        image.width(),
        image.height(),
        wgpu::TextureFormat::Rgba8Unorm,
        image.as_raw(),
    ))
}

/// A BGRA gradient frame at a typical display size.
pub fn test_card(device: &wgpu::Device, queue: &wgpu::Queue) -> wgpu::Texture {
    upload(
        device,
        queue,
        TEST_CARD_WIDTH,
        TEST_CARD_HEIGHT,
        wgpu::TextureFormat::Bgra8Unorm,
        &test_card_pixels(TEST_CARD_WIDTH, TEST_CARD_HEIGHT),
    )
}

fn test_card_pixels(width: u32, height: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            data.push((x * 255 / width) as u8);
            data.push((y * 255 / height) as u8);
            data.push(if (x / 64 + y / 64) % 2 == 0 { 255 } else { 0 });
            data.push(255);
        }
    }
    data
}

fn upload(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    data: &[u8],
) -> wgpu::Texture {
    device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some("Input Frame"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        data,
    )
}
