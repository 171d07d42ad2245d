pub(crate) mod fetch;
pub(crate) mod gif;

use crate::codec::CodecDriver;
use crate::foundation::error::{LoopforgeError, LoopforgeResult};
use crate::model::job::{AnimationSource, RenderJob};

/// One decoded straight-alpha RGBA8 frame.
///
/// Dimensions are carried per frame because video sources are scaled to the
/// derived output size at extraction time, while GIF and frame-sequence
/// sources stay at their native canvas size.
#[derive(Clone, Debug)]
pub(crate) struct DecodedFrame {
    /// 0-based position in decode order.
    pub(crate) index: u32,
    /// Time until the next frame, in milliseconds.
    pub(crate) delay_ms: u32,
    /// Frame starts a new dependency chain (first frame, or a disposal
    /// boundary in the container).
    pub(crate) is_key_frame: bool,
    /// Bitmap width in pixels.
    pub(crate) width: u32,
    /// Bitmap height in pixels.
    pub(crate) height: u32,
    /// Row-major RGBA8, `4 * width * height` bytes.
    pub(crate) bitmap: Vec<u8>,
}

/// Decode a job's source into ordered frames.
///
/// Dispatch is exhaustive over the source kinds; HTTP and parse failures
/// surface as `download-failed` / `decode-failed`.
pub(crate) fn decode_source(
    job: &RenderJob,
    http: &reqwest::blocking::Client,
    codec: &CodecDriver,
) -> LoopforgeResult<Vec<DecodedFrame>> {
    match &job.source {
        AnimationSource::Gif { uri } | AnimationSource::Apng { uri } => {
            let bytes = fetch::fetch_source_bytes(http, uri)?;
            gif::decode_gif_frames(&bytes)
        }
        AnimationSource::FrameSequence { frames, delay_ms } => {
            decode_frame_sequence(job, frames, *delay_ms)
        }
        AnimationSource::Video { uri } => {
            let bytes = fetch::fetch_source_bytes(http, uri)?;
            decode_video(job, codec, &bytes)
        }
    }
}

fn decode_frame_sequence(
    job: &RenderJob,
    frames: &[Vec<u8>],
    delay_ms: u32,
) -> LoopforgeResult<Vec<DecodedFrame>> {
    let width = job.metadata.width;
    let height = job.metadata.height;
    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(4))
        .ok_or_else(|| LoopforgeError::decode_failed("frame size overflow"))?;

    frames
        .iter()
        .enumerate()
        .map(|(i, bitmap)| {
            if bitmap.len() != expected {
                return Err(LoopforgeError::decode_failed(format!(
                    "frame {i} has {} bytes, expected {expected} for {width}x{height} rgba8",
                    bitmap.len()
                )));
            }
            Ok(DecodedFrame {
                index: i as u32,
                delay_ms,
                is_key_frame: i == 0,
                width,
                height,
                bitmap: bitmap.clone(),
            })
        })
        .collect()
}

/// Video sources are exploded to numbered PNGs by the codec driver, then
/// parsed back to RGBA. The driver may stop short of `frame_count`; the
/// produced prefix is used as-is.
fn decode_video(
    job: &RenderJob,
    codec: &CodecDriver,
    input: &[u8],
) -> LoopforgeResult<Vec<DecodedFrame>> {
    let pngs = codec.extract_frames(job, input)?;
    let delay_ms = (1_000 / job.metadata.frame_rate).max(1);

    let mut frames = Vec::with_capacity(pngs.len());
    for (i, png) in pngs.iter().enumerate() {
        let image = image::load_from_memory(png).map_err(|e| {
            LoopforgeError::decode_failed(format!("extracted frame {i} png parse failed: {e}"))
        })?;
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        frames.push(DecodedFrame {
            index: i as u32,
            delay_ms,
            is_key_frame: i == 0,
            width,
            height,
            bitmap: rgba.into_raw(),
        });
    }
    Ok(frames)
}
