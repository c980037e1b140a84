pub type PeekResult<T> = Result<T, PeekError>;

/// Failure taxonomy for the render pipeline.
///
/// `Geometry`, `Sampling` and `Compositing` are recoverable per lens: the
/// orchestrator logs them and omits the affected lens. `Fatal` aborts the
/// whole frame; the caller keeps whatever it rendered last.
#[derive(thiserror::Error, Debug)]
pub enum PeekError {
    #[error("geometry error: {0}")]
    Geometry(String),

    #[error("sampling error: {0}")]
    Sampling(String),

    #[error("compositing error: {0}")]
    Compositing(String),

    #[error("fatal frame error: {0}")]
    Fatal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PeekError {
    pub fn geometry(msg: impl Into<String>) -> Self {
        Self::Geometry(msg.into())
    }

    pub fn sampling(msg: impl Into<String>) -> Self {
        Self::Sampling(msg.into())
    }

    pub fn compositing(msg: impl Into<String>) -> Self {
        Self::Compositing(msg.into())
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }

    /// Whether the orchestrator may degrade by omitting a lens instead of
    /// discarding the frame.
    pub fn is_lens_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Geometry(_) | Self::Sampling(_) | Self::Compositing(_)
        )
    }
}
