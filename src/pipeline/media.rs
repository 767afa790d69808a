//! Accepted upload media types.
//!
//! The declared type string of a selected file is checked against a fixed set.
//! `image/jpg` is accepted as an alias and normalized to `image/jpeg` before it
//! is sent anywhere, because the captioning service only knows the latter.

use thiserror::Error;

/// Raised at file-selection time; never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Unsupported file type: {0}. Use JPEG, PNG, WebP, GIF, or HEIC.")]
    UnsupportedType(String),
}

/// An image format the pipeline can upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Jpeg,
    Png,
    Webp,
    Gif,
    Heic,
}

impl MediaType {
    /// Declared type strings accepted by [`MediaType::from_declared`].
    pub const ACCEPTED: [&'static str; 6] = [
        "image/jpeg",
        "image/jpg",
        "image/png",
        "image/webp",
        "image/gif",
        "image/heic",
    ];

    /// Parse a declared type string.  Matching is exact, as browsers report it.
    ///
    /// ```
    /// use caption_board::pipeline::MediaType;
    ///
    /// assert_eq!(MediaType::from_declared("image/jpg").unwrap().as_mime(), "image/jpeg");
    /// assert!(MediaType::from_declared("application/pdf").is_err());
    /// ```
    pub fn from_declared(declared: &str) -> Result<Self, ValidationError> {
        match declared {
            "image/jpeg" | "image/jpg" => Ok(MediaType::Jpeg),
            "image/png" => Ok(MediaType::Png),
            "image/webp" => Ok(MediaType::Webp),
            "image/gif" => Ok(MediaType::Gif),
            "image/heic" => Ok(MediaType::Heic),
            other => Err(ValidationError::UnsupportedType(other.to_string())),
        }
    }

    /// Canonical MIME string sent to the service and the storage host.
    pub fn as_mime(&self) -> &'static str {
        match self {
            MediaType::Jpeg => "image/jpeg",
            MediaType::Png => "image/png",
            MediaType::Webp => "image/webp",
            MediaType::Gif => "image/gif",
            MediaType::Heic => "image/heic",
        }
    }

    /// Declared type a local file gets from its extension, the way a browser
    /// file picker would report it.  Unknown extensions map to
    /// `application/octet-stream`, which is then rejected by validation.
    pub fn declared_for_extension(ext: &str) -> &'static str {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "jpe" => "image/jpeg",
            "png" => "image/png",
            "webp" => "image/webp",
            "gif" => "image/gif",
            "heic" => "image/heic",
            _ => "application/octet-stream",
        }
    }
}
