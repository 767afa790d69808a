//! The selected image and its local preview.

use std::path::Path;
use std::sync::Arc;

use base64::Engine as _;

use super::media::MediaType;

/// A file handle as the pipeline sees it: name, declared type and bytes.
///
/// Cloning is cheap; the bytes are shared.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFile {
    name: String,
    declared_type: String,
    bytes: Arc<Vec<u8>>,
}

impl ImageFile {
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            bytes: Arc::new(bytes),
        }
    }

    /// Read a file from disk, deriving its declared type from the extension.
    pub async fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(name, MediaType::declared_for_extension(&ext), bytes))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type string exactly as declared; may be an alias such as `image/jpg`.
    pub fn declared_type(&self) -> &str {
        &self.declared_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Encode the image as a `data:` URL suitable for an `<img>` preview.
///
/// Uses the declared type verbatim, as a file reader would.
pub fn preview_data_url(file: &ImageFile) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(file.bytes());
    format!("data:{};base64,{encoded}", file.declared_type())
}
