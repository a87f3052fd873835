use crate::{
    ConvertError, Dimensions, Stage,
    pool::ResourcePool,
    util::{ErrorScope, extent},
};

/// Copies `rows` rows of `row_len` bytes out of `src`, whose rows start every
/// `row_pitch` bytes, into the front of `dst` with no gaps between rows.
///
/// `src` only needs `row_len` bytes after the start of its last row.
pub fn copy_rows(
    src: &[u8],
    row_pitch: usize,
    row_len: usize,
    rows: usize,
    dst: &mut [u8],
) -> Result<(), ConvertError> {
    if row_len == 0 || rows == 0 {
        return Ok(());
    }

    if row_pitch < row_len {
        return Err(ConvertError::InvalidRowPitch { row_pitch, row_len });
    }

    let needed = row_pitch * (rows - 1) + row_len;
    if src.len() < needed {
        return Err(ConvertError::InsufficientData {
            expected: needed,
            actual: src.len(),
        });
    }

    if dst.len() < row_len * rows {
        return Err(ConvertError::OutputTooSmall {
            expected: row_len * rows,
            actual: dst.len(),
        });
    }

    for (dst_row, src_row) in dst
        .chunks_exact_mut(row_len)
        .zip(src.chunks(row_pitch))
        .take(rows)
    {
        dst_row.copy_from_slice(&src_row[..row_len]);
    }

    Ok(())
}

/// Unmaps the staging buffer when dropped.
struct StagingMap<'a> {
    buffer: &'a wgpu::Buffer,
    armed: bool,
}

impl Drop for StagingMap<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.buffer.unmap();
        }
    }
}

/// Copies the output texture into the staging buffer, waits for it and strips
/// the row padding into `bytes`.
pub(crate) fn read_output(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    pool: &ResourcePool,
    dimensions: Dimensions,
    bytes: &mut Vec<u8>,
) -> Result<(), ConvertError> {
    let scope = ErrorScope::push(device);

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Texture Converter Readback Encoder"),
    });

    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture: &pool.output_texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &pool.staging_buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(pool.staging_row_pitch),
                rows_per_image: Some(dimensions.height()),
            },
        },
        extent(dimensions.output_row_bytes(), dimensions.height()),
    );

    queue.submit(std::iter::once(encoder.finish()));

    if let Some(source) = scope.pop() {
        return Err(ConvertError::Operation {
            stage: Stage::Transfer,
            source,
        });
    }

    let len = dimensions.output_len();
    if bytes.len() < len {
        bytes.resize(len, 0);
    }

    let slice = pool.staging_buffer.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        // The receiver only goes away if we already bailed out.
        let _ = tx.send(result);
    });

    let mut map = StagingMap {
        buffer: &pool.staging_buffer,
        armed: true,
    };

    device.poll(wgpu::PollType::Wait)?;

    match rx.recv() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            // A failed map leaves the buffer unmapped.
            map.armed = false;
            return Err(e.into());
        }
        Err(_) => return Err(ConvertError::BufferMapWaitingFailed),
    }

    {
        let data = slice.get_mapped_range();
        copy_rows(
            &data,
            pool.staging_row_pitch as usize,
            dimensions.output_row_bytes() as usize,
            dimensions.height() as usize,
            &mut bytes[..len],
        )?;
    }

    drop(map);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn strips_row_padding() {
        let row_len = 9;
        let row_pitch = 256;
        let rows = 3;

        let mut src = vec![0xEE; row_pitch * rows];
        for row in 0..rows {
            for i in 0..row_len {
                src[row * row_pitch + i] = (row * row_len + i) as u8;
            }
        }

        let mut dst = vec![0; row_len * rows];
        copy_rows(&src, row_pitch, row_len, rows, &mut dst).unwrap();

        assert_eq!(dst, (0..27).collect::<Vec<u8>>());
    }

    #[test]
    fn tight_rows_copy_through() {
        let src: Vec<u8> = (0..12).collect();
        let mut dst = vec![0; 12];
        copy_rows(&src, 6, 6, 2, &mut dst).unwrap();
        assert_eq!(dst, src);
    }

    #[test]
    fn last_row_may_end_at_its_length() {
        // A staging buffer only needs `row_len` bytes after the last row start.
        let mut src = vec![1, 2, 3, 0, 0, 0, 0, 0];
        src.extend_from_slice(&[4, 5, 6]);
        let mut dst = vec![0; 6];
        copy_rows(&src, 8, 3, 2, &mut dst).unwrap();
        assert_eq!(dst, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn leaves_bytes_past_output_untouched() {
        let src = vec![7; 512];
        let mut dst = vec![9; 10];
        copy_rows(&src, 256, 4, 2, &mut dst).unwrap();
        assert_eq!(dst, vec![7, 7, 7, 7, 7, 7, 7, 7, 9, 9]);
    }

    #[test]
    fn short_destination_is_rejected() {
        let src = vec![7; 512];
        let mut dst = vec![0; 5];
        let result = copy_rows(&src, 256, 3, 2, &mut dst);
        assert!(matches!(
            result,
            Err(ConvertError::OutputTooSmall {
                expected: 6,
                actual: 5
            })
        ));
        assert_eq!(dst, vec![0; 5]);
    }

    #[test]
    fn short_source_is_rejected() {
        let src = vec![7; 258];
        let mut dst = vec![0; 6];
        let result = copy_rows(&src, 256, 3, 2, &mut dst);
        assert!(matches!(
            result,
            Err(ConvertError::InsufficientData {
                expected: 259,
                actual: 258
            })
        ));
    }

    #[test]
    fn pitch_shorter_than_row_is_rejected() {
        let src = vec![7; 64];
        let mut dst = vec![0; 64];
        assert!(matches!(
            copy_rows(&src, 4, 8, 2, &mut dst),
            Err(ConvertError::InvalidRowPitch {
                row_pitch: 4,
                row_len: 8
            })
        ));
    }
}
