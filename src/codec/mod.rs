pub(crate) mod args;

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::{Mutex, MutexGuard};

use anyhow::Context as _;

use crate::foundation::error::{LoopforgeError, LoopforgeResult};
use crate::model::job::RenderJob;
use crate::pool::ProcessedFrame;

use args::OutputDims;

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn ffmpeg_available() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Driver around the codec runtime and its scratch filesystem.
///
/// The runtime is lazily initialized; afterwards a private temp directory
/// acts as the codec's file surface. Every operation holds one mutex for
/// its whole write → run → read → unlink span, which serializes codec runs
/// and keeps rank-named encode files from interleaving across concurrent
/// renders.
pub(crate) struct CodecDriver {
    state: Mutex<Option<Workspace>>,
}

impl CodecDriver {
    /// An uninitialized driver. [`CodecDriver::init`] must run before any
    /// operation.
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(None),
        }
    }

    /// Idempotently create the workspace and verify the codec binary is
    /// invocable.
    pub(crate) fn init(&self) -> LoopforgeResult<()> {
        let mut state = self.lock();
        if state.is_some() {
            return Ok(());
        }
        if !ffmpeg_available() {
            return Err(LoopforgeError::codec_run_failed(
                "ffmpeg was not found on PATH",
            ));
        }

        let root = std::env::temp_dir().join(format!(
            "loopforge-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0)
        ));
        std::fs::create_dir_all(&root)
            .with_context(|| format!("failed to create codec workspace '{}'", root.display()))?;
        tracing::debug!(root = %root.display(), "codec workspace initialized");
        *state = Some(Workspace { root });
        Ok(())
    }

    /// Fast path: one transcode from a fetched container to the final mp4,
    /// plus an optional poster still pulled from the fresh output.
    ///
    /// Poster failures are non-fatal; the clip ships without one.
    pub(crate) fn transcode(
        &self,
        job: &RenderJob,
        input: &[u8],
    ) -> LoopforgeResult<(Vec<u8>, Option<Vec<u8>>)> {
        if job.source.is_frame_sequence() {
            return Err(LoopforgeError::unsupported_source(
                "fast transcode requires a container source, not a frame sequence",
            ));
        }

        let state = self.lock();
        let ws = required(&state)?;
        let dims = derive_job_dims(job);
        let input_name = args::input_name(job);
        let output_name = args::output_name(job);

        ws.write(&input_name, input)?;
        let run = ws.run(&args::fast_args(job, dims));
        if let Err(e) = run {
            ws.unlink(&input_name);
            return Err(e);
        }
        let video = match ws.read(&output_name) {
            Ok(video) => video,
            Err(e) => {
                ws.unlink(&input_name);
                return Err(e);
            }
        };

        let poster = if job.options.poster.produce {
            extract_poster(ws, job)
        } else {
            None
        };

        ws.unlink(&input_name);
        ws.unlink(&output_name);
        Ok((video, poster))
    }

    /// Quality path: write processed stills by rank, encode, read the
    /// output back.
    pub(crate) fn encode_frames(
        &self,
        job: &RenderJob,
        frames: &[ProcessedFrame],
    ) -> LoopforgeResult<Vec<u8>> {
        let state = self.lock();
        let ws = required(&state)?;
        let dims = derive_job_dims(job);
        let output_name = args::output_name(job);

        let mut written: Vec<String> = Vec::with_capacity(frames.len());
        let mut write_all = || -> LoopforgeResult<()> {
            for (rank, frame) in frames.iter().enumerate() {
                let name = args::encode_frame_name(rank);
                ws.write(&name, &frame.png)?;
                written.push(name);
            }
            ws.run(&args::quality_args(job, dims))
        };

        let result = write_all().and_then(|()| ws.read(&output_name));
        for name in &written {
            ws.unlink(name);
        }
        ws.unlink(&output_name);
        result
    }

    /// Explode a video input into job-scoped PNG frames.
    ///
    /// Reads stop at the first missing frame; the produced prefix is
    /// returned. All intermediates are unlinked best-effort.
    pub(crate) fn extract_frames(
        &self,
        job: &RenderJob,
        input: &[u8],
    ) -> LoopforgeResult<Vec<Vec<u8>>> {
        let state = self.lock();
        let ws = required(&state)?;
        let dims = derive_job_dims(job);
        let input_name = args::input_name(job);

        ws.write(&input_name, input)?;
        let run = ws.run(&args::extract_args(job, dims));
        if let Err(e) = run {
            ws.unlink(&input_name);
            return Err(e);
        }

        let mut pngs = Vec::new();
        for n in 1..=job.metadata.frame_count {
            let name = args::decode_frame_name(job, n);
            match ws.read(&name) {
                Ok(bytes) => pngs.push(bytes),
                Err(_) => break,
            }
        }

        ws.unlink(&input_name);
        // Sweep every produced frame, including any past frame_count that
        // -vsync 0 dumped out.
        let mut n = 1u32;
        loop {
            let name = args::decode_frame_name(job, n);
            if !ws.exists(&name) {
                break;
            }
            ws.unlink(&name);
            n += 1;
        }

        if pngs.is_empty() {
            return Err(LoopforgeError::decode_failed(
                "codec produced no frames for the video source",
            ));
        }
        Ok(pngs)
    }

    fn lock(&self) -> MutexGuard<'_, Option<Workspace>> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn required<'a>(
    state: &'a MutexGuard<'_, Option<Workspace>>,
) -> LoopforgeResult<&'a Workspace> {
    state.as_ref().ok_or_else(|| {
        LoopforgeError::codec_not_initialized("codec operation before driver init")
    })
}

fn derive_job_dims(job: &RenderJob) -> OutputDims {
    let cfg = &job.options.configuration;
    args::derive_dimensions(cfg.width, cfg.height, job.metadata.width, job.metadata.height)
}

fn extract_poster(ws: &Workspace, job: &RenderJob) -> Option<Vec<u8>> {
    let poster_name = args::poster_name(job);
    match ws.run(&args::poster_args(job)) {
        Ok(()) => {
            let poster = ws.read(&poster_name).ok();
            ws.unlink(&poster_name);
            if poster.is_none() {
                tracing::warn!("poster file missing after extraction run");
            }
            poster
        }
        Err(e) => {
            tracing::warn!(error = %e, "poster extraction failed, continuing without poster");
            None
        }
    }
}

/// Scratch directory acting as the codec runtime's file surface.
struct Workspace {
    root: PathBuf,
}

impl Workspace {
    fn write(&self, name: &str, bytes: &[u8]) -> LoopforgeResult<()> {
        std::fs::write(self.root.join(name), bytes)
            .with_context(|| format!("codec workspace write of '{name}' failed"))?;
        Ok(())
    }

    fn read(&self, name: &str) -> LoopforgeResult<Vec<u8>> {
        let bytes = std::fs::read(self.root.join(name))
            .with_context(|| format!("codec workspace read of '{name}' failed"))?;
        Ok(bytes)
    }

    fn exists(&self, name: &str) -> bool {
        self.root.join(name).exists()
    }

    /// Best-effort removal; failures are logged, never fatal.
    fn unlink(&self, name: &str) {
        if let Err(e) = std::fs::remove_file(self.root.join(name)) {
            tracing::debug!(name, error = %e, "codec workspace unlink failed");
        }
    }

    fn run(&self, argv: &[String]) -> LoopforgeResult<()> {
        let output = Command::new("ffmpeg")
            .args(["-y", "-loglevel", "error"])
            .args(argv)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                LoopforgeError::codec_run_failed(format!("failed to invoke ffmpeg: {e}"))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(LoopforgeError::codec_run_failed(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.root) {
            tracing::debug!(root = %self.root.display(), error = %e, "codec workspace cleanup failed");
        }
    }
}
