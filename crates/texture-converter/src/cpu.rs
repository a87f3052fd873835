use crate::{ConvertError, Dimensions};

/// CPU version of the repack kernel for frames already in host memory at the
/// target size: tightly packed BGRA in, B, G, R triplets out. `out` is grown
/// like [`crate::TextureConverter::process_input`] grows it.
pub fn repack_bgra(
    bgra: &[u8],
    width: u32,
    height: u32,
    out: &mut Vec<u8>,
) -> Result<(), ConvertError> {
    let dimensions = Dimensions::new(width, height)?;
    let pixels = width as usize * height as usize;

    let expected = pixels * 4;
    if bgra.len() < expected {
        return Err(ConvertError::InsufficientData {
            expected,
            actual: bgra.len(),
        });
    }

    let len = dimensions.output_len();
    if out.len() < len {
        out.resize(len, 0);
    }

    for (dst, src) in out[..len]
        .chunks_exact_mut(3)
        .zip(bgra[..expected].chunks_exact(4))
    {
        dst.copy_from_slice(&src[..3]);
    }

    Ok(())
}
