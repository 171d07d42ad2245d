use crate::model::job::{Container, RenderJob, VideoCodec};

/// Output edge cap enforced by dimension derivation.
const MAX_OUTPUT_EDGE: u32 = 720;
/// Fast-path frame-rate ceiling.
pub(crate) const FAST_PATH_FPS_CAP: u32 = 30;

/// Derived encode dimensions: aspect-preserving, capped at 720x720, both
/// even and at least 2 (chroma subsampling requirement).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct OutputDims {
    pub(crate) width: u32,
    pub(crate) height: u32,
}

/// Derive encode dimensions from the configured size and the source aspect
/// ratio.
pub(crate) fn derive_dimensions(
    configured_w: u32,
    configured_h: u32,
    source_w: u32,
    source_h: u32,
) -> OutputDims {
    let aspect = if configured_w > 0 && configured_h > 0 {
        configured_w as f64 / configured_h as f64
    } else if source_w > 0 && source_h > 0 {
        source_w as f64 / source_h as f64
    } else {
        1.0
    };

    let mut width = configured_w.min(MAX_OUTPUT_EDGE);
    let mut height = (width as f64 / aspect).round() as u32;
    if height > MAX_OUTPUT_EDGE {
        height = configured_h.min(MAX_OUTPUT_EDGE);
        width = (height as f64 * aspect).round() as u32;
    }
    width = width.min(configured_w);
    height = configured_h.min(height);

    OutputDims {
        width: make_even(width),
        height: make_even(height),
    }
}

/// Round down to the nearest even integer, never below 2.
fn make_even(v: u32) -> u32 {
    ((v / 2) * 2).max(2)
}

pub(crate) fn input_name(job: &RenderJob) -> String {
    format!("input-{}", job.id)
}

pub(crate) fn output_name(job: &RenderJob) -> String {
    format!(
        "output-{}.{}",
        job.id,
        job.options.configuration.container.extension()
    )
}

pub(crate) fn poster_name(job: &RenderJob) -> String {
    format!("poster-{}.{}", job.id, job.options.poster.format.extension())
}

/// Rank-named PNG consumed by the quality-path encode pattern.
pub(crate) fn encode_frame_name(rank: usize) -> String {
    format!("frame-{rank:05}.png")
}

/// Job-scoped PNG produced by the video decode run (1-based, matching the
/// `%05d` output pattern).
pub(crate) fn decode_frame_name(job: &RenderJob, n: u32) -> String {
    format!("frame-{}-{n:05}.png", job.id)
}

fn scale_filter(dims: OutputDims) -> String {
    format!("scale={}:{}:flags=lanczos", dims.width, dims.height)
}

fn mp4_encoder(codec: VideoCodec) -> &'static str {
    match codec {
        VideoCodec::H265 => "libx265",
        VideoCodec::H264 | VideoCodec::Vp9 => "libx264",
    }
}

fn webm_encoder(codec: VideoCodec) -> &'static str {
    match codec {
        VideoCodec::Vp9 => "libvpx-vp9",
        VideoCodec::H264 | VideoCodec::H265 => "libvpx",
    }
}

/// Argument vector for the single-transcode fast path.
pub(crate) fn fast_args(job: &RenderJob, dims: OutputDims) -> Vec<String> {
    let cfg = &job.options.configuration;
    let fps = cfg.frame_rate.min(FAST_PATH_FPS_CAP);
    let bitrate = cfg.bitrate;

    let mut argv: Vec<String> = Vec::new();
    argv.extend(["-i".into(), input_name(job), "-an".into(), "-sn".into()]);
    argv.extend(["-vf".into(), format!("fps={fps},{}", scale_filter(dims))]);
    argv.extend(["-c:v".into(), mp4_encoder(cfg.codec).into()]);
    argv.extend([
        "-preset".into(),
        "veryfast".into(),
        "-tune".into(),
        "zerolatency".into(),
        "-profile:v".into(),
        "high".into(),
    ]);
    argv.extend(["-pix_fmt".into(), "yuv420p".into()]);
    argv.extend([
        "-b:v".into(),
        format!("{}k", bitrate.target_kbps),
        "-maxrate".into(),
        format!("{}k", bitrate.max_kbps),
        "-bufsize".into(),
        format!("{}k", 2 * bitrate.max_kbps),
    ]);
    argv.extend(["-movflags".into(), "faststart".into()]);
    argv.push(output_name(job));
    argv
}

/// Argument vector for the quality-path encode over rank-named PNGs.
pub(crate) fn quality_args(job: &RenderJob, dims: OutputDims) -> Vec<String> {
    let cfg = &job.options.configuration;
    let bitrate = cfg.bitrate;

    let mut argv: Vec<String> = Vec::new();
    argv.extend([
        "-framerate".into(),
        cfg.frame_rate.to_string(),
        "-i".into(),
        "frame-%05d.png".into(),
    ]);

    match cfg.container {
        Container::Mp4 => {
            argv.extend(["-c:v".into(), mp4_encoder(cfg.codec).into()]);
            argv.extend([
                "-preset".into(),
                "veryfast".into(),
                "-tune".into(),
                "zerolatency".into(),
            ]);
        }
        Container::Webm => {
            argv.extend(["-c:v".into(), webm_encoder(cfg.codec).into()]);
            argv.extend([
                "-deadline".into(),
                "realtime".into(),
                "-cpu-used".into(),
                "5".into(),
            ]);
        }
    }

    let pix_fmt = if cfg.container == Container::Webm && cfg.enable_alpha {
        "yuva420p"
    } else {
        "yuv420p"
    };
    argv.extend(["-pix_fmt".into(), pix_fmt.into()]);
    argv.extend([
        "-b:v".into(),
        format!("{}k", bitrate.target_kbps),
        "-maxrate".into(),
        format!("{}k", bitrate.max_kbps),
    ]);
    argv.extend(["-vf".into(), scale_filter(dims)]);
    // movflags is a mov/mp4 muxer option; matroska rejects it outright.
    if cfg.container == Container::Mp4 {
        argv.extend(["-movflags".into(), "faststart".into()]);
    }
    if cfg.looping {
        argv.extend(["-loop".into(), "0".into()]);
    }
    argv.push(output_name(job));
    argv
}

/// Argument vector exploding a video input into job-scoped PNG frames.
pub(crate) fn extract_args(job: &RenderJob, dims: OutputDims) -> Vec<String> {
    vec![
        "-i".into(),
        input_name(job),
        "-vf".into(),
        scale_filter(dims),
        "-vsync".into(),
        "0".into(),
        format!("frame-{}-%05d.png", job.id),
    ]
}

/// Argument vector pulling a single poster still out of the encoded output.
pub(crate) fn poster_args(job: &RenderJob) -> Vec<String> {
    vec![
        "-i".into(),
        output_name(job),
        "-frames:v".into(),
        "1".into(),
        poster_name(job),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::job::{
        AnimationSource, PipelineMode, RenderOptions, SourceMetadata,
    };

    fn job(mutate: impl FnOnce(&mut RenderOptions)) -> RenderJob {
        let mut options = RenderOptions::default();
        mutate(&mut options);
        RenderJob::with_id(
            "t1",
            AnimationSource::Gif {
                uri: "https://example.com/a.gif".to_owned(),
            },
            SourceMetadata {
                width: 320,
                height: 240,
                frame_count: 10,
                frame_rate: 30,
                duration_ms: 1_000,
                has_alpha: false,
            },
            options,
        )
        .unwrap()
    }

    #[test]
    fn dimensions_cap_at_720_and_stay_even() {
        let d = derive_dimensions(1280, 720, 320, 240);
        assert_eq!(d, OutputDims { width: 720, height: 404 });

        let d = derive_dimensions(720, 720, 320, 240);
        assert_eq!(d, OutputDims { width: 720, height: 720 });

        let d = derive_dimensions(99, 99, 320, 240);
        assert_eq!(d, OutputDims { width: 98, height: 98 });
    }

    #[test]
    fn dimensions_never_fall_below_two() {
        let d = derive_dimensions(1, 1, 320, 240);
        assert_eq!(d, OutputDims { width: 2, height: 2 });
    }

    #[test]
    fn dimensions_never_exceed_configured_size() {
        let d = derive_dimensions(100, 50, 320, 240);
        assert!(d.width <= 100 && d.height <= 50);
        assert!(d.width % 2 == 0 && d.height % 2 == 0);
    }

    #[test]
    fn fast_args_cap_fps_and_double_bufsize() {
        let job = job(|o| {
            o.pipeline = PipelineMode::Fast;
            o.configuration.frame_rate = 60;
        });
        let argv = fast_args(&job, derive_dimensions(720, 720, 320, 240));
        let joined = argv.join(" ");
        assert!(joined.contains("fps=30,scale=720:720:flags=lanczos"));
        assert!(joined.contains("-c:v libx264"));
        assert!(joined.contains("-bufsize 8000k"), "{joined}");
        assert!(joined.ends_with("output-t1.mp4"));
    }

    #[test]
    fn quality_args_select_alpha_pixel_format_for_webm() {
        let job = job(|o| {
            o.configuration.container = Container::Webm;
            o.configuration.codec = VideoCodec::Vp9;
            o.configuration.enable_alpha = true;
        });
        let argv = quality_args(&job, derive_dimensions(720, 720, 4, 4));
        let joined = argv.join(" ");
        assert!(joined.contains("-c:v libvpx-vp9"));
        assert!(joined.contains("-pix_fmt yuva420p"));
        assert!(joined.contains("-deadline realtime -cpu-used 5"));
        assert!(
            !joined.contains("-movflags"),
            "matroska has no movflags option"
        );
        assert!(joined.ends_with("output-t1.webm"));
    }

    #[test]
    fn quality_args_for_mp4_use_x264_speed_flags() {
        let job = job(|o| o.configuration.looping = false);
        let argv = quality_args(&job, derive_dimensions(720, 720, 4, 4));
        let joined = argv.join(" ");
        assert!(joined.contains("-preset veryfast -tune zerolatency"));
        assert!(joined.contains("-pix_fmt yuv420p"));
        assert!(!joined.contains("-loop"), "looping disabled drops the flag");
    }

    #[test]
    fn looping_adds_loop_flag() {
        let job = job(|o| o.configuration.looping = true);
        let joined = quality_args(&job, derive_dimensions(720, 720, 4, 4)).join(" ");
        assert!(joined.contains("-loop 0"));
    }

    #[test]
    fn workspace_names_are_job_scoped() {
        let job = job(|_| {});
        assert_eq!(input_name(&job), "input-t1");
        assert_eq!(output_name(&job), "output-t1.mp4");
        assert_eq!(poster_name(&job), "poster-t1.png");
        assert_eq!(encode_frame_name(7), "frame-00007.png");
        assert_eq!(decode_frame_name(&job, 1), "frame-t1-00001.png");
    }
}
