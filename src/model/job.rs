use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::foundation::error::{LoopforgeError, LoopforgeResult};
use crate::fx::RasterOp;

/// Widest accepted configured output.
pub const MAX_CONFIGURED_WIDTH: u32 = 1280;
/// Tallest accepted configured output.
pub const MAX_CONFIGURED_HEIGHT: u32 = 720;

/// Where the animation comes from.
///
/// URIs are fetched over HTTP(S); anything else is treated as a local file
/// path. Frame sequences carry raw straight-alpha RGBA8 bitmaps directly.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnimationSource {
    /// An animated GIF addressed by URI.
    Gif {
        /// Source location.
        uri: String,
    },
    /// An animated PNG addressed by URI.
    Apng {
        /// Source location.
        uri: String,
    },
    /// A short video addressed by URI.
    Video {
        /// Source location.
        uri: String,
    },
    /// Pre-decoded RGBA8 frames with a uniform inter-frame delay.
    FrameSequence {
        /// Straight-alpha RGBA8 bitmaps, one per frame.
        frames: Vec<Vec<u8>>,
        /// Uniform per-frame delay in milliseconds.
        delay_ms: u32,
    },
}

impl AnimationSource {
    /// `true` for the [`AnimationSource::FrameSequence`] variant.
    pub fn is_frame_sequence(&self) -> bool {
        matches!(self, Self::FrameSequence { .. })
    }
}

/// Caller-probed facts about the source animation.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SourceMetadata {
    /// Source width in pixels.
    pub width: u32,
    /// Source height in pixels.
    pub height: u32,
    /// Number of frames the source is expected to contain.
    pub frame_count: u32,
    /// Nominal source frame rate, 1..=60.
    pub frame_rate: u32,
    /// Total source duration in milliseconds.
    pub duration_ms: u64,
    /// Whether the source carries an alpha channel.
    pub has_alpha: bool,
}

/// Output container format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Container {
    /// ISO BMFF, h264/h265 payloads.
    Mp4,
    /// Matroska-derived, VP8/VP9 payloads.
    Webm,
}

impl Container {
    /// MIME type for the encoded clip.
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Mp4 => "video/mp4",
            Self::Webm => "video/webm",
        }
    }

    /// Output file extension.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Webm => "webm",
        }
    }
}

/// Video codec selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoCodec {
    /// AVC via libx264.
    H264,
    /// HEVC via libx265.
    H265,
    /// VP9 via libvpx-vp9.
    Vp9,
}

/// Target and ceiling bitrates in kbit/s.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitrateSpec {
    /// Average target.
    pub target_kbps: u32,
    /// Hard ceiling; must be >= target.
    pub max_kbps: u32,
}

impl Default for BitrateSpec {
    fn default() -> Self {
        Self {
            target_kbps: 2_500,
            max_kbps: 4_000,
        }
    }
}

/// Near-duplicate frame collapsing policy.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecimationSpec {
    /// Master switch.
    pub enabled: bool,
    /// Frames closer together than this can be dropped, 8..=200 ms.
    pub min_interval_ms: u32,
    /// Similarity above which an adjacent frame counts as a duplicate,
    /// 0..=1.
    pub similarity_threshold: f64,
}

impl Default for DecimationSpec {
    fn default() -> Self {
        Self {
            enabled: false,
            min_interval_ms: 33,
            similarity_threshold: 0.95,
        }
    }
}

/// Everything about the encoded output.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RenderConfiguration {
    /// Configured output width, 1..=1280.
    pub width: u32,
    /// Configured output height, 1..=720.
    pub height: u32,
    /// Output container.
    pub container: Container,
    /// Output codec.
    pub codec: VideoCodec,
    /// Output frame rate, 1..=60.
    pub frame_rate: u32,
    /// Bitrate envelope.
    pub bitrate: BitrateSpec,
    /// Preserve alpha in the output (WebM only).
    pub enable_alpha: bool,
    /// Mark the clip as endlessly looping.
    pub looping: bool,
    /// Frame decimation policy for the quality path.
    pub decimation: DecimationSpec,
}

impl Default for RenderConfiguration {
    fn default() -> Self {
        Self {
            width: 720,
            height: 720,
            container: Container::Mp4,
            codec: VideoCodec::H264,
            frame_rate: 30,
            bitrate: BitrateSpec::default(),
            enable_alpha: false,
            looping: false,
            decimation: DecimationSpec::default(),
        }
    }
}

/// Which pipeline the orchestrator should prefer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineMode {
    /// Single codec transcode when the source/profile permit it.
    Fast,
    /// Full decode / decimate / per-frame process / encode.
    Quality,
}

/// Poster still image format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PosterFormat {
    /// Lossless PNG.
    Png,
    /// Lossy WebP.
    Webp,
}

impl PosterFormat {
    /// Poster file extension.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Webp => "webp",
        }
    }
}

/// Poster extraction policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PosterSpec {
    /// Whether to produce a poster still at all.
    pub produce: bool,
    /// Format of the extracted poster.
    pub format: PosterFormat,
}

impl Default for PosterSpec {
    fn default() -> Self {
        Self {
            produce: false,
            format: PosterFormat::Png,
        }
    }
}

/// Advisory time budget, recorded with the outcome but never enforced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceBudget {
    /// Advisory wall-clock ceiling in milliseconds (0 = unset).
    pub max_render_ms: u64,
}

/// Per-job rendering options.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RenderOptions {
    /// Output configuration.
    pub configuration: RenderConfiguration,
    /// Preferred pipeline.
    pub pipeline: PipelineMode,
    /// Poster extraction policy.
    pub poster: PosterSpec,
    /// Advisory time budget.
    pub performance_budget: PerformanceBudget,
    /// Caller-opaque fingerprint; present => the outcome is cached.
    pub cache_key: Option<String>,
    /// Raster operations applied to every frame on the quality path.
    #[serde(default)]
    pub operations: Vec<RasterOp>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            configuration: RenderConfiguration::default(),
            pipeline: PipelineMode::Quality,
            poster: PosterSpec::default(),
            performance_budget: PerformanceBudget::default(),
            cache_key: None,
            operations: Vec::new(),
        }
    }
}

/// A fully validated render request, consumed once by
/// [`Renderer::render`](crate::Renderer::render).
#[derive(Clone, Debug)]
pub struct RenderJob {
    /// Unique id; scopes every codec workspace file this job touches.
    pub id: String,
    /// Animation input.
    pub source: AnimationSource,
    /// Caller-probed source facts.
    pub metadata: SourceMetadata,
    /// Rendering options.
    pub options: RenderOptions,
    /// Construction timestamp.
    pub created_at: SystemTime,
}

static JOB_SEQ: AtomicU64 = AtomicU64::new(0);

impl RenderJob {
    /// Build a job with a generated id, validating all invariants.
    pub fn new(
        source: AnimationSource,
        metadata: SourceMetadata,
        options: RenderOptions,
    ) -> LoopforgeResult<Self> {
        let seq = JOB_SEQ.fetch_add(1, Ordering::Relaxed);
        let id = format!("job-{}-{seq}", std::process::id());
        Self::with_id(id, source, metadata, options)
    }

    /// Build a job with a caller-supplied id.
    ///
    /// The id must be non-empty and restricted to `[A-Za-z0-9._-]` so it is
    /// safe to embed in codec workspace file names.
    pub fn with_id(
        id: impl Into<String>,
        source: AnimationSource,
        metadata: SourceMetadata,
        options: RenderOptions,
    ) -> LoopforgeResult<Self> {
        let id = id.into();
        validate_id(&id)?;
        validate_metadata(&metadata)?;
        validate_source(&source)?;
        validate_options(&options)?;
        Ok(Self {
            id,
            source,
            metadata,
            options,
            created_at: SystemTime::now(),
        })
    }
}

fn validate_id(id: &str) -> LoopforgeResult<()> {
    if id.is_empty() {
        return Err(LoopforgeError::invalid_job("job id must be non-empty"));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(LoopforgeError::invalid_job(format!(
            "job id '{id}' contains characters outside [A-Za-z0-9._-]"
        )));
    }
    Ok(())
}

fn validate_metadata(meta: &SourceMetadata) -> LoopforgeResult<()> {
    if meta.width == 0 || meta.height == 0 {
        return Err(LoopforgeError::invalid_job(
            "source dimensions must be positive",
        ));
    }
    if meta.frame_count == 0 {
        return Err(LoopforgeError::invalid_job(
            "source frame count must be positive",
        ));
    }
    if !(1..=60).contains(&meta.frame_rate) {
        return Err(LoopforgeError::invalid_job(format!(
            "source frame rate must be in 1..=60, got {}",
            meta.frame_rate
        )));
    }
    if meta.duration_ms == 0 {
        return Err(LoopforgeError::invalid_job(
            "source duration must be positive",
        ));
    }
    Ok(())
}

fn validate_source(source: &AnimationSource) -> LoopforgeResult<()> {
    match source {
        AnimationSource::Gif { uri }
        | AnimationSource::Apng { uri }
        | AnimationSource::Video { uri } => {
            if uri.trim().is_empty() {
                return Err(LoopforgeError::invalid_job("source uri must be non-empty"));
            }
        }
        AnimationSource::FrameSequence { frames, delay_ms } => {
            if frames.is_empty() {
                return Err(LoopforgeError::invalid_job(
                    "frame sequence must contain at least one frame",
                ));
            }
            if *delay_ms == 0 {
                return Err(LoopforgeError::invalid_job(
                    "frame sequence delay must be positive",
                ));
            }
        }
    }
    Ok(())
}

fn validate_options(options: &RenderOptions) -> LoopforgeResult<()> {
    let cfg = &options.configuration;
    if cfg.width == 0 || cfg.width > MAX_CONFIGURED_WIDTH {
        return Err(LoopforgeError::invalid_job(format!(
            "configured width must be in 1..={MAX_CONFIGURED_WIDTH}, got {}",
            cfg.width
        )));
    }
    if cfg.height == 0 || cfg.height > MAX_CONFIGURED_HEIGHT {
        return Err(LoopforgeError::invalid_job(format!(
            "configured height must be in 1..={MAX_CONFIGURED_HEIGHT}, got {}",
            cfg.height
        )));
    }
    if !(1..=60).contains(&cfg.frame_rate) {
        return Err(LoopforgeError::invalid_job(format!(
            "configured frame rate must be in 1..=60, got {}",
            cfg.frame_rate
        )));
    }
    if cfg.bitrate.target_kbps == 0 {
        return Err(LoopforgeError::invalid_job(
            "target bitrate must be positive",
        ));
    }
    if cfg.bitrate.target_kbps > cfg.bitrate.max_kbps {
        return Err(LoopforgeError::invalid_job(format!(
            "target bitrate {} exceeds max {}",
            cfg.bitrate.target_kbps, cfg.bitrate.max_kbps
        )));
    }
    if cfg.enable_alpha && cfg.container != Container::Webm {
        return Err(LoopforgeError::invalid_job(
            "alpha output requires the webm container",
        ));
    }
    if cfg.decimation.enabled {
        if !(8..=200).contains(&cfg.decimation.min_interval_ms) {
            return Err(LoopforgeError::invalid_job(format!(
                "decimation min interval must be in 8..=200 ms, got {}",
                cfg.decimation.min_interval_ms
            )));
        }
        if !(0.0..=1.0).contains(&cfg.decimation.similarity_threshold) {
            return Err(LoopforgeError::invalid_job(
                "decimation similarity threshold must be in 0..=1",
            ));
        }
    }
    for op in &options.operations {
        op.validate()?;
    }
    Ok(())
}
