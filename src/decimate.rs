use crate::model::job::DecimationSpec;
use crate::source::DecodedFrame;

/// Collapse near-duplicate adjacent frames under a minimum inter-frame
/// interval.
///
/// Temporal order is preserved, and the first and last input frames always
/// survive so the loop point stays intact.
pub(crate) fn decimate(frames: Vec<DecodedFrame>, policy: &DecimationSpec) -> Vec<DecodedFrame> {
    if !policy.enabled || frames.is_empty() {
        return frames;
    }

    let total = frames.len();
    let mut selected: Vec<DecodedFrame> = Vec::with_capacity(total);
    for (i, frame) in frames.into_iter().enumerate() {
        let Some(last_kept) = selected.last() else {
            selected.push(frame);
            continue;
        };

        let sim = similarity(&last_kept.bitmap, &frame.bitmap);
        let drop = frame.delay_ms < policy.min_interval_ms && sim > policy.similarity_threshold;
        if !drop || i + 1 == total {
            selected.push(frame);
        }
    }
    selected
}

/// Per-channel similarity of two RGBA bitmaps, alpha ignored.
///
/// `1 - sum(|dr| + |dg| + |db|) / (pixels * 765)`, clamped to `[0, 1]`;
/// buffers of different lengths compare as 0.
pub(crate) fn similarity(a: &[u8], b: &[u8]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }
    let pixels = a.len() / 4;
    if pixels == 0 {
        return 1.0;
    }

    let mut sum_diff: u64 = 0;
    for (pa, pb) in a.chunks_exact(4).zip(b.chunks_exact(4)) {
        sum_diff += pa[0].abs_diff(pb[0]) as u64;
        sum_diff += pa[1].abs_diff(pb[1]) as u64;
        sum_diff += pa[2].abs_diff(pb[2]) as u64;
    }

    let max_diff = (pixels as u64) * 765;
    (1.0 - sum_diff as f64 / max_diff as f64).clamp(0.0, 1.0)
}
