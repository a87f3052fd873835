use crate::{REQUIRED_FEATURES, pool::OUTPUT_FORMAT};

#[derive(Debug, Clone, Default)]
pub struct DeviceOptions {
    /// Enable backend validation layers and debug labels.
    pub debug: bool,
    /// Skip hardware adapters and go straight to a software one.
    pub force_fallback_adapter: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("No GPU adapter found: {0}")]
    NoAdapter(#[from] wgpu::RequestAdapterError),
    #[error(transparent)]
    RequestDeviceFailed(#[from] wgpu::RequestDeviceError),
}

/// A device and queue together with the adapter they were opened on.
pub struct GpuDevice {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter: wgpu::Adapter,
}

impl GpuDevice {
    pub fn adapter_info(&self) -> wgpu::AdapterInfo {
        self.adapter.get_info()
    }

    /// Whether a converter can be built on this device: the required features
    /// are enabled and the adapter can write `R8Uint` storage textures.
    pub fn supports_conversion(&self) -> bool {
        self.device.features().contains(REQUIRED_FEATURES)
            && self
                .adapter
                .get_texture_format_features(OUTPUT_FORMAT)
                .allowed_usages
                .contains(wgpu::TextureUsages::STORAGE_BINDING)
    }
}

/// Opens a device suitable for [`crate::TextureConverter`]. Prefers a hardware
/// adapter and falls back to a software one when none is available.
pub async fn create_device(options: &DeviceOptions) -> Result<GpuDevice, DeviceError> {
    let flags = if options.debug {
        wgpu::InstanceFlags::debugging()
    } else {
        wgpu::InstanceFlags::from_build_config()
    };

    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        flags,
        ..Default::default()
    });

    let adapter = match request_adapter(&instance, options.force_fallback_adapter).await {
        Ok(adapter) => adapter,
        Err(e) if !options.force_fallback_adapter => {
            tracing::debug!("No hardware adapter ({e}), trying a software adapter");
            request_adapter(&instance, true).await?
        }
        Err(e) => return Err(e.into()),
    };

    let info = adapter.get_info();
    tracing::debug!(
        name = %info.name,
        backend = ?info.backend,
        device_type = ?info.device_type,
        "Selected GPU adapter"
    );

    // The output texture is three times the target width, so take the
    // adapter's full texture size limits.
    let required_features = adapter.features() & REQUIRED_FEATURES;
    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("Texture Converter Device"),
            required_features,
            required_limits: adapter.limits(),
            ..Default::default()
        })
        .await?;

    Ok(GpuDevice {
        device,
        queue,
        adapter,
    })
}

async fn request_adapter(
    instance: &wgpu::Instance,
    force_fallback_adapter: bool,
) -> Result<wgpu::Adapter, wgpu::RequestAdapterError> {
    instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter,
            compatible_surface: None,
        })
        .await
}
