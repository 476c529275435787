/// Result alias that carries the custom [`VisualiserError`] type.
pub type Result<T> = std::result::Result<T, VisualiserError>;

/// Common error type for the core crate.
///
/// Every failure is scoped to the current media session, waveform or
/// recording. None of them leave the engine in a state that prevents a retry.
#[derive(Debug, thiserror::Error)]
pub enum VisualiserError {
    /// The source audio could not be opened or decoded.
    #[error("failed to load media `{source_name}`: {reason}")]
    MediaLoad { source_name: String, reason: String },
    /// Recording was requested without a capture surface or audio graph.
    #[error("recording unavailable: {0}")]
    RecordingUnavailable(&'static str),
    /// A recording session is already live.
    #[error("a recording is already in progress")]
    RecordingInProgress,
    /// The requested encoding profile is not supported by the encoder.
    /// Negotiation recovers from this by falling back to the default profile.
    #[error("encoding profile `{0}` is not supported")]
    EncodingUnsupported(String),
    /// Finalize was reached without a single captured chunk.
    #[error("recording finished without capturing any data")]
    EmptyCapture,
    /// The active waveform has no parameter with this name.
    #[error("unknown parameter `{0}`")]
    UnknownParameter(String),
    /// A parameter value does not match the schema type.
    #[error("parameter `{name}` expects a {expected} value")]
    InvalidParameter {
        name: String,
        expected: &'static str,
    },
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("{0}")]
    Message(String),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("wav decoding failed: {0}")]
    Wav(#[from] hound::Error),
    #[error("fft failed: {0}")]
    Fft(#[from] realfft::FftError),
}

impl VisualiserError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub(crate) fn media_load(source_name: impl Into<String>, reason: impl ToString) -> Self {
        Self::MediaLoad {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    /// Short human readable category used when reporting the error.
    pub fn classification(&self) -> &'static str {
        match self {
            Self::MediaLoad { .. } | Self::Wav(_) => "media load failure",
            Self::RecordingUnavailable(_) | Self::RecordingInProgress => "recording unavailable",
            Self::EncodingUnsupported(_) => "encoding unsupported",
            Self::EmptyCapture => "empty capture",
            Self::UnknownParameter(_) | Self::InvalidParameter { .. } => "configuration error",
            Self::InvalidInput(_) | Self::Fft(_) => "analysis error",
            Self::Message(_) => "error",
            Self::Io(_) | Self::Image(_) => "output error",
        }
    }
}

impl From<&str> for VisualiserError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for VisualiserError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
