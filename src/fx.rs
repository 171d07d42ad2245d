use crate::foundation::error::{LoopforgeError, LoopforgeResult};
use serde::{Deserialize, Serialize};

/// Largest accepted box-blur radius.
pub const MAX_BLUR_RADIUS: u32 = 256;

/// One raster operation applied to a decoded frame before it is encoded as
/// a still.
///
/// Operations travel inside the worker message contract and are applied in
/// list order.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RasterOp {
    /// Box blur with a uniform kernel of side `2 * radius + 1`, applied
    /// per axis with clamp-to-edge sampling.
    Blur {
        /// Kernel radius in pixels.
        radius: u32,
    },
    /// Saturation scale around BT.601 luma.
    Saturate {
        /// 0 produces grayscale, 1 is identity, >1 oversaturates.
        factor: f32,
    },
    /// Source-over composite of a constant color across the whole frame.
    Overlay {
        /// Straight-alpha RGBA overlay color.
        color: [u8; 4],
    },
}

impl RasterOp {
    /// Validate operation parameters at job construction time.
    pub(crate) fn validate(&self) -> LoopforgeResult<()> {
        match *self {
            Self::Blur { radius } => {
                if radius > MAX_BLUR_RADIUS {
                    return Err(LoopforgeError::invalid_job(format!(
                        "blur radius must be <= {MAX_BLUR_RADIUS}, got {radius}"
                    )));
                }
            }
            Self::Saturate { factor } => {
                if !factor.is_finite() || factor < 0.0 {
                    return Err(LoopforgeError::invalid_job(
                        "saturate factor must be finite and >= 0",
                    ));
                }
            }
            Self::Overlay { .. } => {}
        }
        Ok(())
    }
}

/// Apply `ops` in order to a straight-alpha RGBA8 bitmap.
pub(crate) fn apply_ops(
    bitmap: &mut Vec<u8>,
    width: u32,
    height: u32,
    ops: &[RasterOp],
) -> LoopforgeResult<()> {
    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(4))
        .ok_or_else(|| LoopforgeError::invalid_job("bitmap size overflow"))?;
    if bitmap.len() != expected {
        return Err(LoopforgeError::invalid_job(format!(
            "bitmap length {} does not match {width}x{height} rgba8",
            bitmap.len()
        )));
    }

    for op in ops {
        match *op {
            RasterOp::Blur { radius } => {
                if radius > 0 {
                    *bitmap = box_blur(bitmap, width, height, radius);
                }
            }
            RasterOp::Saturate { factor } => saturate_in_place(bitmap, factor),
            RasterOp::Overlay { color } => overlay_in_place(bitmap, color),
        }
    }
    Ok(())
}

/// Two-pass box blur over all four channels.
fn box_blur(src: &[u8], width: u32, height: u32, radius: u32) -> Vec<u8> {
    let mut tmp = vec![0u8; src.len()];
    let mut out = vec![0u8; src.len()];
    horizontal_pass(src, &mut tmp, width, height, radius);
    vertical_pass(&tmp, &mut out, width, height, radius);
    out
}

fn horizontal_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, radius: u32) {
    let r = radius as i64;
    let w = width as i64;
    let kernel = (2 * r + 1) as u64;
    for y in 0..height as i64 {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for dx in -r..=r {
                let sx = (x + dx).clamp(0, w - 1);
                let idx = ((y * w + sx) as usize) * 4;
                for c in 0..4 {
                    acc[c] += src[idx + c] as u64;
                }
            }
            let out_idx = ((y * w + x) as usize) * 4;
            for c in 0..4 {
                dst[out_idx + c] = ((acc[c] + kernel / 2) / kernel) as u8;
            }
        }
    }
}

fn vertical_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, radius: u32) {
    let r = radius as i64;
    let w = width as i64;
    let h = height as i64;
    let kernel = (2 * r + 1) as u64;
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for dy in -r..=r {
                let sy = (y + dy).clamp(0, h - 1);
                let idx = ((sy * w + x) as usize) * 4;
                for c in 0..4 {
                    acc[c] += src[idx + c] as u64;
                }
            }
            let out_idx = ((y * w + x) as usize) * 4;
            for c in 0..4 {
                dst[out_idx + c] = ((acc[c] + kernel / 2) / kernel) as u8;
            }
        }
    }
}

/// Scale chroma around BT.601 luma. Alpha is untouched.
fn saturate_in_place(bitmap: &mut [u8], factor: f32) {
    for px in bitmap.chunks_exact_mut(4) {
        let r = px[0] as f32;
        let g = px[1] as f32;
        let b = px[2] as f32;
        let luma = 0.2989 * r + 0.587 * g + 0.114 * b;
        px[0] = (luma + (r - luma) * factor).round().clamp(0.0, 255.0) as u8;
        px[1] = (luma + (g - luma) * factor).round().clamp(0.0, 255.0) as u8;
        px[2] = (luma + (b - luma) * factor).round().clamp(0.0, 255.0) as u8;
    }
}

/// Source-over composite: `dst * (1 - a) + src * a` on every channel.
fn overlay_in_place(bitmap: &mut [u8], color: [u8; 4]) {
    let alpha = color[3] as f32 / 255.0;
    if alpha == 0.0 {
        return;
    }
    let inv = 1.0 - alpha;
    for px in bitmap.chunks_exact_mut(4) {
        for c in 0..4 {
            let blended = px[c] as f32 * inv + color[c] as f32 * alpha;
            px[c] = blended.round().clamp(0.0, 255.0) as u8;
        }
    }
}
