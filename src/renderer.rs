use std::time::{Duration, Instant};

use smallvec::SmallVec;

use crate::cache::RenderCache;
use crate::codec::CodecDriver;
use crate::decimate::decimate;
use crate::foundation::error::{LoopforgeError, LoopforgeResult};
use crate::fx::RasterOp;
use crate::model::job::{AnimationSource, Container, PipelineMode, RenderJob, VideoCodec};
use crate::model::outcome::{EncodedClip, RenderMetrics, RenderOutcome};
use crate::pool::{FrameTask, PendingFrame, ProcessedFrame, WorkerPool, default_pool_size};
use crate::source::decode_source;
use crate::source::fetch::fetch_source_bytes;

/// Process-lifetime renderer configuration.
#[derive(Clone, Debug)]
pub struct RendererOpts {
    /// Raster worker count; `None` uses `max(2, cpus / 2)`.
    pub pool_size: Option<usize>,
    /// Outcome cache capacity in entries.
    pub cache_capacity: usize,
    /// Outcome cache per-entry time to live.
    pub cache_ttl: Duration,
}

impl Default for RendererOpts {
    fn default() -> Self {
        Self {
            pool_size: None,
            cache_capacity: 32,
            cache_ttl: Duration::from_secs(15 * 60),
        }
    }
}

/// The render orchestrator and public entrypoint.
///
/// One instance owns the codec driver, the raster worker pool, and the
/// outcome cache for its lifetime. `render` is safe to call from multiple
/// threads; codec runs serialize behind the driver.
pub struct Renderer {
    codec: CodecDriver,
    pool: WorkerPool,
    cache: RenderCache,
    http: reqwest::blocking::Client,
}

impl Renderer {
    /// Build a renderer with default options.
    pub fn new() -> LoopforgeResult<Self> {
        Self::with_opts(RendererOpts::default())
    }

    /// Build a renderer with explicit options.
    pub fn with_opts(opts: RendererOpts) -> LoopforgeResult<Self> {
        let pool = WorkerPool::new(opts.pool_size.unwrap_or_else(default_pool_size))?;
        Ok(Self {
            codec: CodecDriver::new(),
            pool,
            cache: RenderCache::new(opts.cache_capacity, opts.cache_ttl),
            http: reqwest::blocking::Client::new(),
        })
    }

    /// Render one job to an encoded looping clip.
    ///
    /// Returns a cached outcome untouched (except `from_cache`) when the
    /// job carries a fingerprint with a live entry. Failures never write
    /// the cache.
    #[tracing::instrument(skip(self, job), fields(job_id = %job.id))]
    pub fn render(&self, job: &RenderJob) -> LoopforgeResult<RenderOutcome> {
        let started = Instant::now();

        if let Some(key) = job.options.cache_key.as_deref()
            && let Some(hit) = self.cache.get(key)
        {
            return Ok(hit);
        }

        self.codec.init()?;

        let outcome = if fast_path_applies(job) {
            self.render_fast(job, started)?
        } else {
            self.render_quality(job, started)?
        };

        if let Some(key) = job.options.cache_key.as_deref() {
            self.cache.store(key, outcome.clone());
        }
        tracing::info!(
            total_ms = outcome.metrics.total_time_ms,
            output_bytes = outcome.metrics.output_size_bytes,
            "render complete"
        );
        Ok(outcome)
    }

    /// Stop the worker pool. In-flight submissions fail with
    /// `pool-shutdown`.
    pub fn shutdown(mut self) {
        self.pool.shutdown();
    }

    /// Single codec transcode from the fetched container to the final clip.
    fn render_fast(&self, job: &RenderJob, started: Instant) -> LoopforgeResult<RenderOutcome> {
        let uri = match &job.source {
            AnimationSource::Gif { uri }
            | AnimationSource::Apng { uri }
            | AnimationSource::Video { uri } => uri,
            AnimationSource::FrameSequence { .. } => {
                return Err(LoopforgeError::unsupported_source(
                    "fast path cannot consume a frame sequence",
                ));
            }
        };

        let fetch_started = Instant::now();
        let input = fetch_source_bytes(&self.http, uri)?;
        let download_ms = elapsed_ms(fetch_started);

        let encode_started = Instant::now();
        let (video, poster_frame) = self.codec.transcode(job, &input)?;
        let encode_time_ms = elapsed_ms(encode_started);

        let cfg = &job.options.configuration;
        Ok(RenderOutcome {
            from_cache: false,
            metrics: RenderMetrics {
                decode_time_ms: download_ms,
                render_time_ms: 0,
                encode_time_ms,
                total_time_ms: elapsed_ms(started),
                output_size_bytes: video.len() as u64,
                average_frame_processing_ms: 0.0,
            },
            result: EncodedClip {
                container: cfg.container,
                mime_type: cfg.container.mime_type(),
                duration_ms: job.metadata.duration_ms,
                frame_rate: cfg.frame_rate.min(crate::codec::args::FAST_PATH_FPS_CAP),
                poster_frame,
                video,
            },
        })
    }

    /// Decode, decimate, fan frames across the pool, then encode the
    /// assembled stills.
    fn render_quality(&self, job: &RenderJob, started: Instant) -> LoopforgeResult<RenderOutcome> {
        let decode_started = Instant::now();
        let frames = decode_source(job, &self.http, &self.codec)?;
        let decode_time_ms = elapsed_ms(decode_started);

        let selected = decimate(frames, &job.options.configuration.decimation);

        let render_started = Instant::now();
        let operations: SmallVec<[RasterOp; 4]> =
            job.options.operations.iter().copied().collect();
        let mut pending: Vec<PendingFrame> = Vec::with_capacity(selected.len());
        for (rank, frame) in selected.into_iter().enumerate() {
            let task = FrameTask {
                frame_index: rank as u32,
                width: frame.width,
                height: frame.height,
                bitmap: frame.bitmap,
                operations: operations.clone(),
            };
            pending.push(self.pool.submit(task, frame.delay_ms)?);
        }
        let mut processed = pending
            .into_iter()
            .map(PendingFrame::wait)
            .collect::<LoopforgeResult<Vec<ProcessedFrame>>>()?;
        // Assemble in frame order regardless of worker completion order.
        processed.sort_by_key(|f| f.index);
        let render_time_ms = elapsed_ms(render_started);

        let encode_started = Instant::now();
        let video = self.codec.encode_frames(job, &processed)?;
        let encode_time_ms = elapsed_ms(encode_started);

        let poster_frame = if job.options.poster.produce {
            processed.first().map(|f| f.png.clone())
        } else {
            None
        };
        let duration_ms: u64 = processed.iter().map(|f| f.delay_ms as u64).sum();
        let average_frame_processing_ms = if processed.is_empty() {
            0.0
        } else {
            render_time_ms as f64 / processed.len() as f64
        };

        let cfg = &job.options.configuration;
        Ok(RenderOutcome {
            from_cache: false,
            metrics: RenderMetrics {
                decode_time_ms,
                render_time_ms,
                encode_time_ms,
                total_time_ms: elapsed_ms(started),
                output_size_bytes: video.len() as u64,
                average_frame_processing_ms,
            },
            result: EncodedClip {
                container: cfg.container,
                mime_type: cfg.container.mime_type(),
                duration_ms,
                frame_rate: cfg.frame_rate,
                poster_frame,
                video,
            },
        })
    }
}

/// The fast path applies only to container sources headed for plain
/// h264/mp4 without alpha.
fn fast_path_applies(job: &RenderJob) -> bool {
    let cfg = &job.options.configuration;
    job.options.pipeline == PipelineMode::Fast
        && !job.source.is_frame_sequence()
        && cfg.container == Container::Mp4
        && cfg.codec == VideoCodec::H264
        && !cfg.enable_alpha
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}
