/// Result alias that carries the custom [`TunnelError`] type.
pub type Result<T> = std::result::Result<T, TunnelError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum TunnelError {
    /// Free-form failure used where no more specific variant applies.
    #[error("{0}")]
    Message(String),
    /// Input supplied by a collaborator failed validation.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// A GPU program was rejected during validation or pipeline creation.
    /// Only the feature owning the program is disabled.
    #[error("shader `{label}` failed to compile: {message}")]
    ShaderCompilation { label: String, message: String },
    /// No GPU adapter compatible with the surface could be found.
    #[error("no suitable GPU adapter found")]
    NoAdapter,
    #[error("device request failed: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    #[error("surface creation failed: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),
    /// The next surface texture could not be acquired.
    #[error("surface frame unavailable: {0}")]
    Frame(#[from] wgpu::SurfaceError),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    #[error("spectrum analysis failed: {0}")]
    Fft(#[from] realfft::FftError),
}

impl TunnelError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn invalid<T: Into<String>>(msg: T) -> Self {
        Self::InvalidInput(msg.into())
    }
}

impl From<&str> for TunnelError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for TunnelError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
