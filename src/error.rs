use std::path::PathBuf;

use thiserror::Error;

/// Everything that can make a render, mix or asset load fail.
///
/// Rendering has no partial-success mode: a call either returns a complete
/// buffer or one of these.
#[derive(Error, Debug)]
pub enum SynthError {
    /// Pitch token that does not resolve in the pitch table after the
    /// octave has been defaulted.
    #[error("Unknown pitch '{0}'")]
    UnknownPitch(String),

    /// Zero, non-finite or malformed duration code.
    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    /// Render configuration rejected before any rendering work starts.
    #[error("Invalid render configuration: {0}")]
    InvalidConfig(String),

    /// Mixer inputs recorded at different sample rates.
    #[error("Sample rate mismatch: {left} Hz vs {right} Hz")]
    RateMismatchError { left: u32, right: u32 },

    /// Mixer input with an unexpected channel layout.
    #[error("Expected {expected} channel(s), found {found}")]
    ChannelMismatch { expected: u16, found: u16 },

    /// The score produced nothing but silence, so there is no peak to
    /// normalize against.
    #[error("Render produced an all-silent buffer")]
    EmptyRenderError,

    /// The sample library (or one file in it) is not present locally.
    #[error("Sample asset missing: {}", path.display())]
    SampleAssetMissing { path: PathBuf },

    #[error("Audio codec error: {0}")]
    Audio(#[from] hound::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SynthError>;
