//! Chroma matte pixel kernel
//!
//! The avatar service renders the character over a solid green background.
//! This pass keys that background out in place: pure chroma pixels become
//! fully transparent, green-dominated edge pixels get their spill folded back
//! into red/blue with a softened alpha, everything else passes through
//! untouched.

use crate::error::{Error, Result};

/// Bytes per RGBA sample.
pub const RGBA_BYTES_PER_PIXEL: usize = 4;

/// Expected buffer length for a width x height RGBA frame.
pub fn rgba_buffer_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * RGBA_BYTES_PER_PIXEL
}

/// Apply the chroma matte to an RGBA buffer in place.
///
/// One linear pass, no per-pixel allocation. The buffer length must match
/// the stated dimensions exactly.
pub fn matte_frame(data: &mut [u8], width: u32, height: u32) -> Result<()> {
    let expected = rgba_buffer_len(width, height);
    if data.len() != expected {
        return Err(Error::InvalidFrame(format!(
            "RGBA buffer is {} bytes, expected {} for {}x{}",
            data.len(),
            expected,
            width,
            height
        )));
    }

    for pixel in data.chunks_exact_mut(RGBA_BYTES_PER_PIXEL) {
        matte_pixel(pixel);
    }

    Ok(())
}

/// Matte rule for a single RGBA sample.
///
/// Channel arithmetic runs in f32 and write-back rounds and clamps to
/// [0, 255]; the alpha keeps its explicit floor at 0.
#[inline]
fn matte_pixel(pixel: &mut [u8]) {
    let r = pixel[0] as i32;
    let g = pixel[1] as i32;
    let b = pixel[2] as i32;

    if g - 150 > r + b {
        // Pure chroma background
        pixel[3] = 0;
    } else if 2 * g > r + b {
        // Green spill at the character edge: push the excess back into
        // red/blue and soften the alpha in proportion
        let adjustment = (g as f32 - (r + b) as f32 / 2.0) / 3.0;
        pixel[0] = clamp_channel(r as f32 + adjustment);
        pixel[1] = clamp_channel(g as f32 - adjustment * 2.0);
        pixel[2] = clamp_channel(b as f32 + adjustment);
        pixel[3] = clamp_channel((255.0 - adjustment * 4.0).max(0.0));
    }
}

#[inline]
fn clamp_channel(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
