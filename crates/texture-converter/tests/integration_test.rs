use cap_texture_converter::{
    ConvertError, DeviceOptions, GpuDevice, TextureConverter, create_device, repack_bgra,
};
use pretty_assertions::assert_eq;
use wgpu::util::DeviceExt;

/// Opens a device that can run the converter, or explains why the test is
/// being skipped. With `CAP_TEXCONV_REQUIRE_GPU` set a missing device fails
/// the test instead.
async fn gpu() -> Option<GpuDevice> {
    let reason = match create_device(&DeviceOptions::default()).await {
        Ok(gpu) if gpu.supports_conversion() => return Some(gpu),
        Ok(gpu) => format!(
            "{} cannot write R8Uint storage textures",
            gpu.adapter_info().name
        ),
        Err(e) => e.to_string(),
    };

    if std::env::var_os("CAP_TEXCONV_REQUIRE_GPU").is_some() {
        panic!("GPU required but unavailable: {reason}");
    }

    eprintln!("SKIPPED (no GPU coverage): {reason}");
    None
}

fn bgra_texture(gpu: &GpuDevice, width: u32, height: u32, data: &[u8]) -> wgpu::Texture {
    gpu.device.create_texture_with_data(
        &gpu.queue,
        &wgpu::TextureDescriptor {
            label: Some("Test Input Texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Bgra8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        data,
    )
}

fn solid_bgra(width: u32, height: u32, bgra: [u8; 4]) -> Vec<u8> {
    bgra.repeat((width * height) as usize)
}

fn gradient_bgra(width: u32, height: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            data.push((x % 256) as u8);
            data.push((y % 256) as u8);
            data.push(((x + y) % 256) as u8);
            data.push(255);
        }
    }
    data
}

fn assert_every_triplet_near(bytes: &[u8], expected: [u8; 3], tolerance: u8) {
    for (i, triplet) in bytes.chunks_exact(3).enumerate() {
        for (channel, (&actual, &wanted)) in triplet.iter().zip(expected.iter()).enumerate() {
            assert!(
                actual.abs_diff(wanted) <= tolerance,
                "pixel {i} channel {channel}: got {actual}, expected {wanted}"
            );
        }
    }
}

#[tokio::test]
async fn test_output_sizes() {
    let Some(gpu) = gpu().await else { return };

    let mut converter = TextureConverter::new(&gpu.device, &gpu.queue, 640, 480).unwrap();
    assert_eq!(converter.output_texture().width(), 640 * 3);
    assert_eq!(converter.output_texture().height(), 480);
    assert_eq!(
        converter.output_texture().format(),
        wgpu::TextureFormat::R8Uint
    );
    assert_eq!(converter.intermediate_texture().width(), 640);

    let input = bgra_texture(&gpu, 320, 200, &solid_bgra(320, 200, [0, 0, 0, 255]));
    let mut bytes = Vec::new();
    converter.process_input(&input, &mut bytes).unwrap();
    assert_eq!(bytes.len(), 3 * 640 * 480);
}

#[tokio::test]
async fn test_channel_order() {
    let Some(gpu) = gpu().await else { return };

    let mut converter = TextureConverter::new(&gpu.device, &gpu.queue, 640, 480).unwrap();
    let input = bgra_texture(&gpu, 640, 480, &solid_bgra(640, 480, [10, 20, 30, 255]));

    let mut bytes = Vec::new();
    converter.process_input(&input, &mut bytes).unwrap();

    assert_every_triplet_near(&bytes, [10, 20, 30], 0);
}

#[tokio::test]
async fn test_conversion_is_repeatable() {
    let Some(gpu) = gpu().await else { return };

    let mut converter = TextureConverter::new(&gpu.device, &gpu.queue, 320, 240).unwrap();
    let input = bgra_texture(&gpu, 800, 600, &gradient_bgra(800, 600));

    let mut first = Vec::new();
    converter.process_input(&input, &mut first).unwrap();
    let mut second = Vec::new();
    converter.process_input(&input, &mut second).unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_upscaled_solid_color_has_no_borders() {
    let Some(gpu) = gpu().await else { return };

    let mut converter = TextureConverter::new(&gpu.device, &gpu.queue, 640, 480).unwrap();
    let input = bgra_texture(&gpu, 37, 23, &solid_bgra(37, 23, [200, 100, 50, 255]));

    let mut bytes = Vec::new();
    converter.process_input(&input, &mut bytes).unwrap();

    assert_every_triplet_near(&bytes, [200, 100, 50], 1);
}

#[tokio::test]
async fn test_downscaled_solid_color() {
    let Some(gpu) = gpu().await else { return };

    let mut converter = TextureConverter::new(&gpu.device, &gpu.queue, 640, 480).unwrap();
    let input = bgra_texture(&gpu, 1920, 1080, &solid_bgra(1920, 1080, [90, 180, 45, 255]));

    let mut bytes = Vec::new();
    converter.process_input(&input, &mut bytes).unwrap();

    assert_every_triplet_near(&bytes, [90, 180, 45], 1);
}

#[tokio::test]
async fn test_uneven_size_matches_cpu_repack() {
    let Some(gpu) = gpu().await else { return };

    // 641 * 3 bytes per row is not a multiple of the copy alignment, so the
    // staging rows carry padding that must be stripped.
    let (width, height) = (641, 481);
    let data = gradient_bgra(width, height);

    let mut converter = TextureConverter::new(&gpu.device, &gpu.queue, width, height).unwrap();
    let input = bgra_texture(&gpu, width, height, &data);

    let mut bytes = Vec::new();
    converter.process_input(&input, &mut bytes).unwrap();

    let mut expected = Vec::new();
    repack_bgra(&data, width, height, &mut expected).unwrap();
    assert!(bytes == expected, "GPU output differs from CPU repack");
}

#[tokio::test]
async fn test_host_buffer_is_not_shrunk() {
    let Some(gpu) = gpu().await else { return };

    let mut converter = TextureConverter::new(&gpu.device, &gpu.queue, 16, 16).unwrap();
    let input = bgra_texture(&gpu, 16, 16, &solid_bgra(16, 16, [1, 2, 3, 255]));

    let mut bytes = vec![0xAB; 3 * 16 * 16 + 7];
    converter.process_input(&input, &mut bytes).unwrap();

    assert_eq!(bytes.len(), 3 * 16 * 16 + 7);
    assert_every_triplet_near(&bytes[..3 * 16 * 16], [1, 2, 3], 0);
    assert_eq!(&bytes[3 * 16 * 16..], &[0xAB; 7]);
}

#[tokio::test]
async fn test_rejects_undrawable_input() {
    let Some(gpu) = gpu().await else { return };

    let mut converter = TextureConverter::new(&gpu.device, &gpu.queue, 64, 64).unwrap();
    let input = gpu.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Copy Only Texture"),
        size: wgpu::Extent3d {
            width: 64,
            height: 64,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Bgra8Unorm,
        usage: wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    let mut bytes = Vec::new();
    let result = converter.process_input(&input, &mut bytes);
    assert!(matches!(result, Err(ConvertError::UnsupportedInput(_))));
}

#[tokio::test]
async fn test_device_without_features_is_rejected() {
    let Some(gpu) = gpu().await else { return };

    let (device, queue) = gpu
        .adapter
        .request_device(&wgpu::DeviceDescriptor::default())
        .await
        .unwrap();

    let result = TextureConverter::new(&device, &queue, 640, 480);
    assert!(matches!(result, Err(ConvertError::MissingFeatures(_))));
}

#[tokio::test]
async fn test_invalid_kernel_is_a_creation_error() {
    let Some(gpu) = gpu().await else { return };

    let result =
        TextureConverter::with_kernel(&gpu.device, &gpu.queue, 64, 64, "fn main( {");
    match result {
        Err(ConvertError::ResourceCreation { resource, .. }) => {
            assert_eq!(resource, "repack kernel")
        }
        Err(other) => panic!("Unexpected error type: {other:?}"),
        Ok(_) => panic!("invalid kernel was accepted"),
    }
}

#[tokio::test]
async fn test_zero_dimensions_are_rejected() {
    let Some(gpu) = gpu().await else { return };

    let result = TextureConverter::new(&gpu.device, &gpu.queue, 0, 480);
    assert!(matches!(
        result,
        Err(ConvertError::InvalidDimensions { .. })
    ));
}

#[tokio::test]
async fn test_width_beyond_device_limit() {
    let Some(gpu) = gpu().await else { return };

    let limit = gpu.device.limits().max_texture_dimension_2d;
    let result = TextureConverter::new(&gpu.device, &gpu.queue, limit / 3 + 1, 16);
    assert!(matches!(
        result,
        Err(ConvertError::ExceedsDeviceLimits { .. })
    ));
}

#[tokio::test]
async fn test_device_exposes_adapter_texture_limit() {
    let Some(gpu) = gpu().await else { return };

    let adapter_limit = gpu.adapter.limits().max_texture_dimension_2d;
    assert_eq!(gpu.device.limits().max_texture_dimension_2d, adapter_limit);

    let result = TextureConverter::new(&gpu.device, &gpu.queue, 3840, 2160);
    if adapter_limit >= 3840 * 3 {
        assert!(result.is_ok(), "3840x2160 rejected: {:?}", result.err());
    } else {
        assert!(matches!(
            result,
            Err(ConvertError::ExceedsDeviceLimits { .. })
        ));
    }
}

#[tokio::test]
async fn test_rejects_array_texture() {
    let Some(gpu) = gpu().await else { return };

    let mut converter = TextureConverter::new(&gpu.device, &gpu.queue, 64, 64).unwrap();
    let input = gpu.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Layered Texture"),
        size: wgpu::Extent3d {
            width: 64,
            height: 64,
            depth_or_array_layers: 2,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Bgra8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });

    let mut bytes = Vec::new();
    let result = converter.process_input(&input, &mut bytes);
    assert!(matches!(result, Err(ConvertError::UnsupportedInput(_))));
}
