/// Convenience alias used across the crate.
pub type LoopforgeResult<T> = Result<T, LoopforgeError>;

/// Error taxonomy surfaced by [`Renderer::render`](crate::Renderer::render)
/// and by job construction.
///
/// Every variant maps to a stable wire code (see [`LoopforgeError::code`])
/// so callers can branch on failures without string matching.
#[derive(thiserror::Error, Debug)]
pub enum LoopforgeError {
    /// Source bytes could not be fetched (non-2xx status, transport
    /// failure, or an unreadable local path).
    #[error("download failed: {0}")]
    DownloadFailed(String),

    /// An image container could not be parsed into frames.
    #[error("decode failed: {0}")]
    DecodeFailed(String),

    /// The source kind cannot be handled by the requested operation.
    #[error("unsupported source: {0}")]
    UnsupportedSource(String),

    /// A codec operation was attempted before the driver was initialized.
    #[error("codec not initialized: {0}")]
    CodecNotInitialized(String),

    /// The codec runtime exited non-zero or could not be invoked.
    #[error("codec run failed: {0}")]
    CodecRunFailed(String),

    /// A task was submitted to (or left pending on) a terminated worker
    /// pool.
    #[error("worker pool shut down: {0}")]
    PoolShutdown(String),

    /// The job failed construction-time validation.
    #[error("invalid job: {0}")]
    InvalidJob(String),

    /// Anything without a dedicated taxonomy kind.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LoopforgeError {
    /// Build a [`LoopforgeError::DownloadFailed`].
    pub fn download_failed(msg: impl Into<String>) -> Self {
        Self::DownloadFailed(msg.into())
    }

    /// Build a [`LoopforgeError::DecodeFailed`].
    pub fn decode_failed(msg: impl Into<String>) -> Self {
        Self::DecodeFailed(msg.into())
    }

    /// Build a [`LoopforgeError::UnsupportedSource`].
    pub fn unsupported_source(msg: impl Into<String>) -> Self {
        Self::UnsupportedSource(msg.into())
    }

    /// Build a [`LoopforgeError::CodecNotInitialized`].
    pub fn codec_not_initialized(msg: impl Into<String>) -> Self {
        Self::CodecNotInitialized(msg.into())
    }

    /// Build a [`LoopforgeError::CodecRunFailed`].
    pub fn codec_run_failed(msg: impl Into<String>) -> Self {
        Self::CodecRunFailed(msg.into())
    }

    /// Build a [`LoopforgeError::PoolShutdown`].
    pub fn pool_shutdown(msg: impl Into<String>) -> Self {
        Self::PoolShutdown(msg.into())
    }

    /// Build a [`LoopforgeError::InvalidJob`].
    pub fn invalid_job(msg: impl Into<String>) -> Self {
        Self::InvalidJob(msg.into())
    }

    /// Stable wire code for this error kind.
    ///
    /// Codes are part of the public contract and never change for an
    /// existing variant.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DownloadFailed(_) => "animated-renderer.download-failed",
            Self::DecodeFailed(_) => "animated-renderer.decode-failed",
            Self::UnsupportedSource(_) => "animated-renderer.unsupported-source",
            Self::CodecNotInitialized(_) => "animated-renderer.codec-not-initialized",
            Self::CodecRunFailed(_) => "animated-renderer.codec-run-failed",
            Self::PoolShutdown(_) => "animated-renderer.pool-shutdown",
            Self::InvalidJob(_) => "animated-renderer.invalid-job",
            Self::Other(_) => "animated-renderer.internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable_and_prefixed() {
        let cases = [
            LoopforgeError::download_failed("x"),
            LoopforgeError::decode_failed("x"),
            LoopforgeError::unsupported_source("x"),
            LoopforgeError::codec_not_initialized("x"),
            LoopforgeError::codec_run_failed("x"),
            LoopforgeError::pool_shutdown("x"),
            LoopforgeError::invalid_job("x"),
            LoopforgeError::Other(anyhow::anyhow!("x")),
        ];
        for err in cases {
            assert!(err.code().starts_with("animated-renderer."), "{err}");
        }
    }

    #[test]
    fn code_distinguishes_variants() {
        assert_eq!(
            LoopforgeError::invalid_job("x").code(),
            "animated-renderer.invalid-job"
        );
        assert_ne!(
            LoopforgeError::download_failed("x").code(),
            LoopforgeError::decode_failed("x").code()
        );
    }
}
