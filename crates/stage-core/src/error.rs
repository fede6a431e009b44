/// Result alias carrying [`StageError`].
pub type Result<T> = std::result::Result<T, StageError>;

/// Errors raised by the stage engine and its GPU backend.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// No adapter/device could be acquired for the canvas or window.
    #[error("gpu context unavailable: {0}")]
    GpuUnavailable(String),
    /// A program failed to compile or link. `log` carries the diagnostic text.
    #[error("shader `{label}` failed to compile:\n{log}")]
    ShaderCompile { label: String, log: String },
    #[error("gpu allocation failed for `{label}`: {reason}")]
    ResourceAllocation { label: String, reason: String },
    /// Presentation surface errors (lost, outdated, timeout).
    #[error("surface error: {0}")]
    Surface(String),
    #[error("theme `{theme}` failed to initialise: {reason}")]
    ThemeInit { theme: String, reason: String },
    /// Returned by calls that arrive after `dispose()`.
    #[error("engine has been disposed")]
    Disposed,
}

impl StageError {
    pub fn allocation(label: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ResourceAllocation {
            label: label.into(),
            reason: reason.into(),
        }
    }

    pub fn theme_init(theme: impl Into<String>, err: &StageError) -> Self {
        Self::ThemeInit {
            theme: theme.into(),
            reason: err.to_string(),
        }
    }
}
