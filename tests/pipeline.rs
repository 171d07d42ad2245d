use std::time::Duration;

use loopforge::{
    AnimationSource, Container, DecimationSpec, PipelineMode, PosterSpec, RenderJob,
    RenderOptions, Renderer, RendererOpts, SourceMetadata, VideoCodec, ffmpeg_available,
};

fn solid_frame(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let mut out = Vec::with_capacity((width * height * 4) as usize);
    for _ in 0..width * height {
        out.extend_from_slice(&rgba);
    }
    out
}

fn sequence_metadata(frame_count: u32, delay_ms: u32) -> SourceMetadata {
    SourceMetadata {
        width: 4,
        height: 4,
        frame_count,
        frame_rate: 30,
        duration_ms: (frame_count * delay_ms).max(1) as u64,
        has_alpha: true,
    }
}

fn small_output(options: &mut RenderOptions) {
    options.configuration.width = 64;
    options.configuration.height = 64;
}

/// red, green, green, blue at 5 ms apart: the duplicate green sits below
/// the decimation interval.
fn four_frame_source() -> AnimationSource {
    AnimationSource::FrameSequence {
        frames: vec![
            solid_frame(4, 4, [255, 0, 0, 255]),
            solid_frame(4, 4, [0, 255, 0, 255]),
            solid_frame(4, 4, [0, 255, 0, 255]),
            solid_frame(4, 4, [0, 0, 255, 255]),
        ],
        delay_ms: 5,
    }
}

#[test]
fn quality_path_vp9_alpha_with_decimation() {
    if !ffmpeg_available() {
        return;
    }

    let mut options = RenderOptions::default();
    small_output(&mut options);
    options.configuration.container = Container::Webm;
    options.configuration.codec = VideoCodec::Vp9;
    options.configuration.enable_alpha = true;
    options.configuration.frame_rate = 24;
    options.configuration.decimation = DecimationSpec {
        enabled: true,
        min_interval_ms: 10,
        similarity_threshold: 0.9,
    };

    let job = RenderJob::new(four_frame_source(), sequence_metadata(4, 5), options).unwrap();
    let renderer = Renderer::new().unwrap();
    let outcome = renderer.render(&job).unwrap();

    assert!(!outcome.from_cache);
    assert_eq!(outcome.result.container, Container::Webm);
    assert_eq!(outcome.result.mime_type, "video/webm");
    assert_eq!(outcome.result.frame_rate, 24);
    assert_eq!(
        outcome.metrics.output_size_bytes,
        outcome.result.video.len() as u64
    );
    assert!(!outcome.result.video.is_empty());

    // The duplicate green frame is decimated: three frames survive, so the
    // clip spans 15 ms and the per-frame average divides by 3.
    assert_eq!(outcome.result.duration_ms, 15);
    let expected_avg = outcome.metrics.render_time_ms as f64 / 3.0;
    assert!(
        (outcome.metrics.average_frame_processing_ms - expected_avg).abs() < 1e-9,
        "avg {} != render {} / 3",
        outcome.metrics.average_frame_processing_ms,
        outcome.metrics.render_time_ms
    );
}

#[test]
fn quality_path_round_trips_identical_frames_without_decimation() {
    if !ffmpeg_available() {
        return;
    }

    let frames = vec![solid_frame(4, 4, [10, 200, 40, 255]); 3];
    let mut options = RenderOptions::default();
    small_output(&mut options);
    options.configuration.container = Container::Webm;
    options.configuration.codec = VideoCodec::Vp9;
    options.configuration.enable_alpha = true;
    options.configuration.frame_rate = 12;

    let job = RenderJob::new(
        AnimationSource::FrameSequence {
            frames,
            delay_ms: 40,
        },
        sequence_metadata(3, 40),
        options,
    )
    .unwrap();
    let renderer = Renderer::new().unwrap();
    let outcome = renderer.render(&job).unwrap();

    assert_eq!(outcome.result.frame_rate, 12);
    assert!(outcome.result.duration_ms >= 3 * 40);
    assert!(!outcome.result.video.is_empty());
}

#[test]
fn cached_outcome_is_byte_identical() {
    if !ffmpeg_available() {
        return;
    }

    let mut options = RenderOptions::default();
    small_output(&mut options);
    options.cache_key = Some("pipeline-cache-key".to_owned());

    let job = RenderJob::new(four_frame_source(), sequence_metadata(4, 5), options).unwrap();
    let renderer = Renderer::new().unwrap();

    let first = renderer.render(&job).unwrap();
    assert!(!first.from_cache);

    let second = renderer.render(&job).unwrap();
    assert!(second.from_cache);
    assert_eq!(first.result.video, second.result.video);
    assert_eq!(
        first.metrics.output_size_bytes,
        second.metrics.output_size_bytes
    );
}

#[test]
fn absent_cache_key_never_reuses_outcomes() {
    if !ffmpeg_available() {
        return;
    }

    let mut options = RenderOptions::default();
    small_output(&mut options);

    let job = RenderJob::new(four_frame_source(), sequence_metadata(4, 5), options).unwrap();
    let renderer = Renderer::new().unwrap();

    assert!(!renderer.render(&job).unwrap().from_cache);
    assert!(!renderer.render(&job).unwrap().from_cache);
}

#[test]
fn cache_ttl_expiry_forces_rerender() {
    if !ffmpeg_available() {
        return;
    }

    let mut options = RenderOptions::default();
    small_output(&mut options);
    options.cache_key = Some("ttl-key".to_owned());

    let job = RenderJob::new(four_frame_source(), sequence_metadata(4, 5), options).unwrap();
    let renderer = Renderer::with_opts(RendererOpts {
        cache_ttl: Duration::from_millis(50),
        ..RendererOpts::default()
    })
    .unwrap();

    assert!(!renderer.render(&job).unwrap().from_cache);
    assert!(renderer.render(&job).unwrap().from_cache);

    std::thread::sleep(Duration::from_millis(120));
    assert!(
        !renderer.render(&job).unwrap().from_cache,
        "expired entry must miss and re-render"
    );
}

fn write_gif_fixture() -> std::path::PathBuf {
    let path = std::env::temp_dir().join(format!(
        "loopforge_pipeline_{}_{}.gif",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0)
    ));

    let mut bytes = Vec::new();
    {
        let mut encoder = gif::Encoder::new(&mut bytes, 8, 8, &[]).unwrap();
        encoder.set_repeat(gif::Repeat::Infinite).unwrap();
        for fill in [[255u8, 0, 0, 255], [0, 0, 255, 255]] {
            let mut rgba = fill.repeat(64);
            let mut frame = gif::Frame::from_rgba(8, 8, &mut rgba);
            frame.delay = 10; // centiseconds
            encoder.write_frame(&frame).unwrap();
        }
    }
    std::fs::write(&path, bytes).unwrap();
    path
}

#[test]
fn fast_path_gif_caps_frame_rate_and_skips_raster_work() {
    if !ffmpeg_available() {
        return;
    }

    let path = write_gif_fixture();
    let mut options = RenderOptions::default();
    small_output(&mut options);
    options.pipeline = PipelineMode::Fast;
    options.configuration.frame_rate = 60;
    options.poster = PosterSpec {
        produce: true,
        ..PosterSpec::default()
    };
    options.cache_key = Some("fast-gif".to_owned());

    let job = RenderJob::new(
        AnimationSource::Gif {
            uri: path.to_string_lossy().into_owned(),
        },
        SourceMetadata {
            width: 8,
            height: 8,
            frame_count: 2,
            frame_rate: 10,
            duration_ms: 200,
            has_alpha: false,
        },
        options,
    )
    .unwrap();
    let renderer = Renderer::new().unwrap();

    let outcome = renderer.render(&job).unwrap();
    assert!(!outcome.from_cache);
    assert_eq!(outcome.metrics.render_time_ms, 0);
    assert_eq!(outcome.metrics.average_frame_processing_ms, 0.0);
    assert_eq!(outcome.result.frame_rate, 30, "fast path caps at 30 fps");
    assert_eq!(outcome.result.mime_type, "video/mp4");
    assert!(
        outcome.result.poster_frame.is_some(),
        "poster extraction from the fresh output should succeed"
    );

    let again = renderer.render(&job).unwrap();
    assert!(again.from_cache);
    assert_eq!(outcome.result.video, again.result.video);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn fast_pipeline_request_for_frame_sequence_falls_back_to_quality() {
    if !ffmpeg_available() {
        return;
    }

    let mut options = RenderOptions::default();
    small_output(&mut options);
    options.pipeline = PipelineMode::Fast;
    options.configuration.frame_rate = 60;

    let job = RenderJob::new(four_frame_source(), sequence_metadata(4, 5), options).unwrap();
    let renderer = Renderer::new().unwrap();
    let outcome = renderer.render(&job).unwrap();

    // The quality path keeps the configured rate; the fast path would have
    // capped it to 30.
    assert_eq!(outcome.result.frame_rate, 60);
    assert_eq!(outcome.result.duration_ms, 20, "all four frames survive");
}
