use std::io::Cursor;

use crate::foundation::error::{LoopforgeError, LoopforgeResult};
use crate::source::DecodedFrame;

/// Smallest inter-frame delay emitted for container-decoded frames.
const MIN_CONTAINER_DELAY_MS: u32 = 10;

/// Decode a GIF (or GIF-compatible APNG payload) into full-canvas RGBA
/// frames.
///
/// Each emitted bitmap is a snapshot of the logical screen after the
/// frame's patch is composited; `Background` disposal clears the patch
/// region afterwards.
pub(crate) fn decode_gif_frames(bytes: &[u8]) -> LoopforgeResult<Vec<DecodedFrame>> {
    let mut options = gif::DecodeOptions::new();
    options.set_color_output(gif::ColorOutput::RGBA);
    let mut decoder = options
        .read_info(Cursor::new(bytes))
        .map_err(|e| LoopforgeError::decode_failed(format!("gif header parse failed: {e}")))?;

    let canvas_w = decoder.width() as u32;
    let canvas_h = decoder.height() as u32;
    if canvas_w == 0 || canvas_h == 0 {
        return Err(LoopforgeError::decode_failed(
            "gif reports a zero-sized canvas",
        ));
    }

    let mut canvas = vec![0u8; canvas_w as usize * canvas_h as usize * 4];
    let mut frames = Vec::new();
    let mut index: u32 = 0;

    loop {
        let frame = match decoder.read_next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                return Err(LoopforgeError::decode_failed(format!(
                    "gif frame {index} decompress failed: {e}"
                )));
            }
        };

        let patch = PatchRect {
            left: frame.left as u32,
            top: frame.top as u32,
            width: frame.width as u32,
            height: frame.height as u32,
        };
        blit_patch(&mut canvas, canvas_w, canvas_h, &patch, &frame.buffer);

        let delay_ms = (frame.delay as u32 * 10).max(MIN_CONTAINER_DELAY_MS);
        let is_key_frame = index == 0 || frame.dispose == gif::DisposalMethod::Background;
        frames.push(DecodedFrame {
            index,
            delay_ms,
            is_key_frame,
            width: canvas_w,
            height: canvas_h,
            bitmap: canvas.clone(),
        });

        if frame.dispose == gif::DisposalMethod::Background {
            clear_patch(&mut canvas, canvas_w, canvas_h, &patch);
        }
        index += 1;
    }

    if frames.is_empty() {
        return Err(LoopforgeError::decode_failed("gif contains no frames"));
    }
    Ok(frames)
}

struct PatchRect {
    left: u32,
    top: u32,
    width: u32,
    height: u32,
}

/// Source-over blit of an RGBA patch; GIF pixels are either fully opaque
/// or fully transparent, so transparent source pixels are skipped.
fn blit_patch(canvas: &mut [u8], canvas_w: u32, canvas_h: u32, patch: &PatchRect, rgba: &[u8]) {
    for py in 0..patch.height {
        let cy = patch.top + py;
        if cy >= canvas_h {
            break;
        }
        for px in 0..patch.width {
            let cx = patch.left + px;
            if cx >= canvas_w {
                break;
            }
            let src = (py as usize * patch.width as usize + px as usize) * 4;
            if src + 4 > rgba.len() || rgba[src + 3] == 0 {
                continue;
            }
            let dst = (cy as usize * canvas_w as usize + cx as usize) * 4;
            canvas[dst..dst + 4].copy_from_slice(&rgba[src..src + 4]);
        }
    }
}

fn clear_patch(canvas: &mut [u8], canvas_w: u32, canvas_h: u32, patch: &PatchRect) {
    for py in 0..patch.height {
        let cy = patch.top + py;
        if cy >= canvas_h {
            break;
        }
        for px in 0..patch.width {
            let cx = patch.left + px;
            if cx >= canvas_w {
                break;
            }
            let dst = (cy as usize * canvas_w as usize + cx as usize) * 4;
            canvas[dst..dst + 4].fill(0);
        }
    }
}

/// Build an in-memory GIF fixture: a full red frame, then a 1x1 green
/// patch at (1,1) with `Background` disposal.
#[cfg(test)]
pub(crate) fn two_frame_fixture() -> Vec<u8> {
    let mut bytes = Vec::new();
    {
        let mut encoder = gif::Encoder::new(&mut bytes, 2, 2, &[]).unwrap();
        encoder.set_repeat(gif::Repeat::Infinite).unwrap();

        let mut red = [255u8, 0, 0, 255].repeat(4);
        let mut frame = gif::Frame::from_rgba(2, 2, &mut red);
        frame.delay = 5; // centiseconds
        encoder.write_frame(&frame).unwrap();

        let mut green = vec![0u8, 255, 0, 255];
        let mut frame = gif::Frame::from_rgba(1, 1, &mut green);
        frame.top = 1;
        frame.left = 1;
        frame.delay = 0;
        frame.dispose = gif::DisposalMethod::Background;
        encoder.write_frame(&frame).unwrap();
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_full_canvas_snapshots() {
        let frames = decode_gif_frames(&two_frame_fixture()).unwrap();
        assert_eq!(frames.len(), 2);

        let first = &frames[0];
        assert_eq!((first.width, first.height), (2, 2));
        assert_eq!(first.bitmap.len(), 16);
        assert_eq!(&first.bitmap[..4], &[255, 0, 0, 255]);

        // Second frame keeps the red canvas with a green pixel at (1,1).
        let second = &frames[1];
        assert_eq!(&second.bitmap[..4], &[255, 0, 0, 255]);
        assert_eq!(&second.bitmap[12..16], &[0, 255, 0, 255]);
    }

    #[test]
    fn delays_are_scaled_and_floored() {
        let frames = decode_gif_frames(&two_frame_fixture()).unwrap();
        assert_eq!(frames[0].delay_ms, 50);
        assert_eq!(frames[1].delay_ms, MIN_CONTAINER_DELAY_MS);
    }

    #[test]
    fn key_frames_follow_disposal_and_first_frame() {
        let frames = decode_gif_frames(&two_frame_fixture()).unwrap();
        assert!(frames[0].is_key_frame, "first frame is always a key frame");
        assert!(frames[1].is_key_frame, "background disposal marks a key frame");
    }

    #[test]
    fn garbage_bytes_fail_with_decode_error() {
        let err = decode_gif_frames(b"definitely not a gif").unwrap_err();
        assert_eq!(err.code(), "animated-renderer.decode-failed");
    }
}
