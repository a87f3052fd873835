//! GPU texture conversion: resample an arbitrary frame into a fixed-size
//! BGRA texture, repack it into three single-byte channels per pixel with a
//! compute kernel and read the result back into host memory.

mod cpu;
mod device;
mod pool;
mod readback;
mod repack;
mod resample;
mod util;

pub use cpu::repack_bgra;
pub use device::{DeviceError, DeviceOptions, GpuDevice, create_device};
pub use readback::copy_rows;
pub use repack::{KERNEL_SOURCE, WORKGROUP_SIZE, dispatch_size};
pub use util::padded_bytes_per_row;

use pool::ResourcePool;
use repack::ChannelRepack;
use resample::Resampler;

/// Features a device must carry so the repack kernel can write `R8Uint`
/// storage texels.
pub const REQUIRED_FEATURES: wgpu::Features =
    wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES;

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("Invalid target dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error(
        "Target {width}x{height} needs a {needed}px wide output texture, device limit is {limit}px"
    )]
    ExceedsDeviceLimits {
        width: u32,
        height: u32,
        needed: u32,
        limit: u32,
    },
    #[error("Device is missing required features: {0:?}")]
    MissingFeatures(wgpu::Features),
    #[error("Failed to create {resource}: {source}")]
    ResourceCreation {
        resource: &'static str,
        #[source]
        source: wgpu::Error,
    },
    #[error("Unsupported input texture: {0}")]
    UnsupportedInput(String),
    #[error("Insufficient input data: expected {expected} bytes, got {actual}")]
    InsufficientData { expected: usize, actual: usize },
    #[error("Output buffer too small: expected {expected} bytes, got {actual}")]
    OutputTooSmall { expected: usize, actual: usize },
    #[error("Row pitch {row_pitch} is shorter than the row length {row_len}")]
    InvalidRowPitch { row_pitch: usize, row_len: usize },
    #[error("{stage} stage failed: {source}")]
    Operation {
        stage: Stage,
        #[source]
        source: wgpu::Error,
    },
    #[error(transparent)]
    Poll(#[from] wgpu::PollError),
    #[error(transparent)]
    BufferMapFailed(#[from] wgpu::BufferAsyncError),
    #[error("Failed to wait for staging buffer mapping")]
    BufferMapWaitingFailed,
}

/// Pipeline stage a [`ConvertError::Operation`] was raised from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resample,
    Repack,
    Transfer,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Resample => write!(f, "Resample"),
            Stage::Repack => write!(f, "Repack"),
            Stage::Transfer => write!(f, "Transfer"),
        }
    }
}

/// Target size of a converter. Fixed for the converter's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimensions {
    width: u32,
    height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Result<Self, ConvertError> {
        if width == 0 || height == 0 || width > u32::MAX / 3 {
            return Err(ConvertError::InvalidDimensions { width, height });
        }

        Ok(Self { width, height })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes in one row of the repacked output.
    pub fn output_row_bytes(&self) -> u32 {
        self.width * 3
    }

    /// Bytes in the whole repacked output, without row padding.
    pub fn output_len(&self) -> usize {
        self.output_row_bytes() as usize * self.height as usize
    }
}

/// Converts frames of any size into tightly packed B, G, R byte triplets at a
/// fixed target size.
///
/// Every GPU resource is allocated in [`TextureConverter::new`] and reused by
/// each [`TextureConverter::process_input`] call. Conversions mutate those
/// resources in place, so calls must be serialized, which `&mut self`
/// enforces.
pub struct TextureConverter {
    device: wgpu::Device,
    queue: wgpu::Queue,
    dimensions: Dimensions,
    pool: ResourcePool,
    resampler: Resampler,
    repack: ChannelRepack,
}

impl TextureConverter {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        width: u32,
        height: u32,
    ) -> Result<Self, ConvertError> {
        Self::with_kernel(device, queue, width, height, KERNEL_SOURCE)
    }

    /// Like [`TextureConverter::new`] but with caller supplied WGSL for the
    /// repack kernel. The kernel must keep the bindings and entry point of
    /// [`KERNEL_SOURCE`].
    pub fn with_kernel(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        width: u32,
        height: u32,
        kernel: &str,
    ) -> Result<Self, ConvertError> {
        let dimensions = Dimensions::new(width, height)?;

        let missing = REQUIRED_FEATURES.difference(device.features());
        if !missing.is_empty() {
            return Err(ConvertError::MissingFeatures(missing));
        }

        let limit = device.limits().max_texture_dimension_2d;
        if dimensions.output_row_bytes() > limit || height > limit {
            return Err(ConvertError::ExceedsDeviceLimits {
                width,
                height,
                needed: dimensions.output_row_bytes(),
                limit,
            });
        }

        // Anything created before a failure is dropped on the way out.
        let pool = ResourcePool::new(device, dimensions)?;
        let resampler = Resampler::new(device)?;
        let repack = ChannelRepack::new(device, &pool, kernel)?;

        tracing::debug!(
            width,
            height,
            staging_row_pitch = pool.staging_row_pitch,
            "Texture converter ready"
        );

        Ok(Self {
            device: device.clone(),
            queue: queue.clone(),
            dimensions,
            pool,
            resampler,
            repack,
        })
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// The `Bgra8Unorm` texture the resampler draws into.
    pub fn intermediate_texture(&self) -> &wgpu::Texture {
        &self.pool.intermediate_texture
    }

    /// The `R8Uint` texture, `3 * width` texels wide, the repack kernel writes.
    pub fn output_texture(&self) -> &wgpu::Texture {
        &self.pool.output_texture
    }

    /// Converts `texture` and writes `3 * width * height` bytes into the front
    /// of `bytes`, growing it if needed. `bytes` is never shrunk.
    ///
    /// On error the contents of `bytes` are unspecified.
    pub fn process_input(
        &mut self,
        texture: &wgpu::Texture,
        bytes: &mut Vec<u8>,
    ) -> Result<(), ConvertError> {
        self.check_input(texture)?;

        tracing::trace!(
            source_width = texture.width(),
            source_height = texture.height(),
            source_format = ?texture.format(),
            "Converting texture"
        );

        self.resampler
            .draw(&self.device, &self.queue, texture, &self.pool)?;
        self.repack
            .dispatch(&self.device, &self.queue, self.dimensions)?;
        readback::read_output(
            &self.device,
            &self.queue,
            &self.pool,
            self.dimensions,
            bytes,
        )
    }

    fn check_input(&self, texture: &wgpu::Texture) -> Result<(), ConvertError> {
        if texture.dimension() != wgpu::TextureDimension::D2 {
            return Err(ConvertError::UnsupportedInput(format!(
                "expected a 2D texture, got {:?}",
                texture.dimension()
            )));
        }

        if texture.sample_count() != 1 {
            return Err(ConvertError::UnsupportedInput(format!(
                "multisampled textures cannot be drawn (sample count {})",
                texture.sample_count()
            )));
        }

        if texture.depth_or_array_layers() != 1 {
            return Err(ConvertError::UnsupportedInput(format!(
                "array textures cannot be drawn ({} layers)",
                texture.depth_or_array_layers()
            )));
        }

        if !texture.usage().contains(wgpu::TextureUsages::TEXTURE_BINDING) {
            return Err(ConvertError::UnsupportedInput(
                "texture was not created with TEXTURE_BINDING usage".to_string(),
            ));
        }

        match texture
            .format()
            .sample_type(None, Some(self.device.features()))
        {
            Some(wgpu::TextureSampleType::Float { .. }) => Ok(()),
            _ => Err(ConvertError::UnsupportedInput(format!(
                "{:?} does not sample as float color",
                texture.format()
            ))),
        }
    }
}
