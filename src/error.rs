use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, SocialImageError>;

/// Failures surfaced by the compositing core.
///
/// Nothing here is retried internally; callers decide whether to skip an
/// element, substitute an asset, or abort the batch.
#[derive(thiserror::Error, Debug)]
pub enum SocialImageError {
    #[error("template not found: {}: {source}", path.display())]
    TemplateNotFound {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("image load error: {}: {source}", path.display())]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("font load error: {}: {reason}", path.display())]
    FontLoad { path: PathBuf, reason: String },

    #[error("invalid element spec: {0}")]
    InvalidElementSpec(String),

    #[error("output error: {}: {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("encode error: {0}")]
    Encode(#[source] image::ImageError),
}

impl SocialImageError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidElementSpec(msg.into())
    }

    pub fn font_load(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::FontLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True for failures a caller can fix by substituting another source image.
    pub fn is_image_load(&self) -> bool {
        matches!(self, Self::ImageLoad { .. })
    }
}
