use crate::model::job::Container;

/// Wall-clock accounting for one render.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RenderMetrics {
    /// Source acquisition + frame decode time (download time alone on the
    /// fast path).
    pub decode_time_ms: u64,
    /// Time spent fanning frames across the worker pool (0 on the fast
    /// path).
    pub render_time_ms: u64,
    /// Codec invocation time.
    pub encode_time_ms: u64,
    /// Total wall clock for the render call.
    pub total_time_ms: u64,
    /// Exact length of the encoded clip in bytes.
    pub output_size_bytes: u64,
    /// `render_time_ms / processed frame count`, 0 when nothing was
    /// processed.
    pub average_frame_processing_ms: f64,
}

/// The encoded clip and its descriptive facts.
#[derive(Clone, Debug)]
pub struct EncodedClip {
    /// Encoded video bytes.
    pub video: Vec<u8>,
    /// Container the bytes are muxed into.
    pub container: Container,
    /// MIME type matching the container.
    pub mime_type: &'static str,
    /// Clip duration in milliseconds.
    pub duration_ms: u64,
    /// Effective output frame rate.
    pub frame_rate: u32,
    /// Optional poster still (format per the job's poster spec).
    pub poster_frame: Option<Vec<u8>>,
}

/// Value returned by [`Renderer::render`](crate::Renderer::render); also
/// the unit stored in the render cache.
#[derive(Clone, Debug)]
pub struct RenderOutcome {
    /// `true` when served from the cache without re-rendering.
    pub from_cache: bool,
    /// Timing and size accounting.
    pub metrics: RenderMetrics,
    /// The encoded clip.
    pub result: EncodedClip,
}
