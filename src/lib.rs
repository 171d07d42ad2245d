//! Loopforge turns animated inputs (GIFs, APNGs, raw frame sequences, and
//! short videos) into compact looping MP4/WebM clips with optional poster
//! stills, per-render metrics, and an in-memory outcome cache.
//!
//! The public API is job-oriented:
//!
//! - Describe the input with an [`AnimationSource`] and its
//!   [`SourceMetadata`]
//! - Pick output and pipeline behavior through [`RenderOptions`]
//! - Validate everything into a [`RenderJob`]
//! - Feed jobs to a long-lived [`Renderer`] and receive [`RenderOutcome`]s
//!
//! Encoding is delegated to an `ffmpeg` runtime behind a serialized driver;
//! per-frame raster work fans out across a fixed pool of worker threads.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod cache;
mod codec;
mod decimate;
mod foundation;
mod fx;
mod model;
mod pool;
mod renderer;
mod source;

pub use crate::codec::ffmpeg_available;
pub use crate::foundation::error::{LoopforgeError, LoopforgeResult};
pub use crate::fx::{MAX_BLUR_RADIUS, RasterOp};
pub use crate::model::job::{
    AnimationSource, BitrateSpec, Container, DecimationSpec, MAX_CONFIGURED_HEIGHT,
    MAX_CONFIGURED_WIDTH, PerformanceBudget, PipelineMode, PosterFormat, PosterSpec,
    RenderConfiguration, RenderJob, RenderOptions, SourceMetadata, VideoCodec,
};
pub use crate::model::outcome::{EncodedClip, RenderMetrics, RenderOutcome};
pub use crate::renderer::{Renderer, RendererOpts};
