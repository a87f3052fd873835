use crate::{
    ConvertError, Dimensions, Stage,
    pool::{OUTPUT_FORMAT, ResourcePool},
    util::{ErrorScope, create},
};

/// WGSL source of the channel-repack kernel.
pub const KERNEL_SOURCE: &str = include_str!("shader.wgsl");

/// Edge length of the square tile one workgroup of the kernel covers.
pub const WORKGROUP_SIZE: u32 = 8;

/// Workgroup grid for a target size: one group more than `size / 8` on each
/// axis, using integer division. Threads past the edge are discarded by the
/// kernel.
pub fn dispatch_size(dimensions: Dimensions) -> (u32, u32) {
    (
        dimensions.width() / WORKGROUP_SIZE + 1,
        dimensions.height() / WORKGROUP_SIZE + 1,
    )
}

/// Compute pass reading the intermediate texture and writing B, G, R bytes
/// into the output texture. All bindings are fixed at construction.
pub(crate) struct ChannelRepack {
    pipeline: wgpu::ComputePipeline,
    bind_group: wgpu::BindGroup,
}

impl ChannelRepack {
    pub fn new(
        device: &wgpu::Device,
        pool: &ResourcePool,
        kernel: &str,
    ) -> Result<Self, ConvertError> {
        let (pipeline, bind_group_layout) = create(device, "repack kernel", || {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Channel Repack Kernel"),
                source: wgpu::ShaderSource::Wgsl(std::borrow::Cow::Borrowed(kernel)),
            });

            let bind_group_layout =
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("Channel Repack Bind Group Layout"),
                    entries: &[
                        wgpu::BindGroupLayoutEntry {
                            binding: 0,
                            visibility: wgpu::ShaderStages::COMPUTE,
                            ty: wgpu::BindingType::Texture {
                                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                                view_dimension: wgpu::TextureViewDimension::D2,
                                multisampled: false,
                            },
                            count: None,
                        },
                        wgpu::BindGroupLayoutEntry {
                            binding: 1,
                            visibility: wgpu::ShaderStages::COMPUTE,
                            ty: wgpu::BindingType::Buffer {
                                ty: wgpu::BufferBindingType::Uniform,
                                has_dynamic_offset: false,
                                min_binding_size: None,
                            },
                            count: None,
                        },
                        wgpu::BindGroupLayoutEntry {
                            binding: 2,
                            visibility: wgpu::ShaderStages::COMPUTE,
                            ty: wgpu::BindingType::StorageTexture {
                                access: wgpu::StorageTextureAccess::WriteOnly,
                                format: OUTPUT_FORMAT,
                                view_dimension: wgpu::TextureViewDimension::D2,
                            },
                            count: None,
                        },
                    ],
                });

            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Channel Repack Pipeline Layout"),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });

            let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("Channel Repack Pipeline"),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: Some("main"),
                compilation_options: Default::default(),
                cache: None,
            });

            (pipeline, bind_group_layout)
        })?;

        let bind_group = create(device, "repack bind group", || {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Channel Repack Bind Group"),
                layout: &bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&pool.intermediate_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: pool.texture_info_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::TextureView(&pool.output_view),
                    },
                ],
            })
        })?;

        Ok(Self {
            pipeline,
            bind_group,
        })
    }

    /// Queues the repack dispatch. Does not wait for it to execute.
    pub fn dispatch(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        dimensions: Dimensions,
    ) -> Result<(), ConvertError> {
        let scope = ErrorScope::push(device);
        let (groups_x, groups_y) = dispatch_size(dimensions);

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Channel Repack Encoder"),
        });

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Channel Repack Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.bind_group, &[]);
            pass.dispatch_workgroups(groups_x, groups_y, 1);
        }

        queue.submit(std::iter::once(encoder.finish()));
        tracing::trace!(groups_x, groups_y, "Dispatched channel repack");

        match scope.pop() {
            Some(source) => Err(ConvertError::Operation {
                stage: Stage::Repack,
                source,
            }),
            None => Ok(()),
        }
    }
}
