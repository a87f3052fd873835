use wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

use crate::ConvertError;

/// Row pitch of a texture-to-buffer copy for rows of `row_bytes` bytes.
pub fn padded_bytes_per_row(row_bytes: u32) -> u32 {
    let align = COPY_BYTES_PER_ROW_ALIGNMENT;
    let padding = (align - (row_bytes % align)) % align;
    row_bytes + padding
}

/// Captures validation and out-of-memory errors raised on `device` while it is
/// open. Both scopes are popped on drop if [`ErrorScope::pop`] was not called.
pub(crate) struct ErrorScope<'a> {
    device: &'a wgpu::Device,
    open: bool,
}

impl<'a> ErrorScope<'a> {
    pub fn push(device: &'a wgpu::Device) -> Self {
        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        Self { device, open: true }
    }

    pub fn pop(mut self) -> Option<wgpu::Error> {
        self.open = false;
        self.pop_both()
    }

    fn pop_both(&self) -> Option<wgpu::Error> {
        let validation = futures::executor::block_on(self.device.pop_error_scope());
        let out_of_memory = futures::executor::block_on(self.device.pop_error_scope());
        validation.or(out_of_memory)
    }
}

impl Drop for ErrorScope<'_> {
    fn drop(&mut self) {
        if self.open {
            self.pop_both();
        }
    }
}

/// Runs `f` inside an [`ErrorScope`], turning anything it raised into a
/// [`ConvertError::ResourceCreation`] for `resource`.
pub(crate) fn create<T>(
    device: &wgpu::Device,
    resource: &'static str,
    f: impl FnOnce() -> T,
) -> Result<T, ConvertError> {
    let scope = ErrorScope::push(device);
    let value = f();
    match scope.pop() {
        Some(source) => Err(ConvertError::ResourceCreation { resource, source }),
        None => Ok(value),
    }
}

pub(crate) fn extent(width: u32, height: u32) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    }
}
