//! Binary image artifacts exchanged with the model.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// MIME type of every generated artifact.
pub const PNG: &str = "image/png";

/// Errors from reading or decoding images.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Not an image: {0}")]
    Unsupported(String),

    #[error("Invalid base64 image data: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Raw image bytes plus their MIME type.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageData {
    mime_type: String,
    bytes: Vec<u8>,
}

impl ImageData {
    /// Wrap raw bytes, rejecting non-image MIME types.
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Result<Self, ImageError> {
        let mime_type = mime_type.into();
        if !mime_type.starts_with("image/") {
            return Err(ImageError::Unsupported(mime_type));
        }
        Ok(Self { mime_type, bytes })
    }

    /// Wrap PNG bytes.
    pub fn png(bytes: Vec<u8>) -> Self {
        Self {
            mime_type: PNG.to_string(),
            bytes,
        }
    }

    /// Decode an inline base64 payload as returned by the API.
    pub fn from_base64(mime_type: impl Into<String>, data: &str) -> Result<Self, ImageError> {
        let bytes = STANDARD.decode(data.trim())?;
        Self::new(mime_type, bytes)
    }

    /// Read an image file, inferring the MIME type from its magic bytes.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ImageError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let mime_type = sniff_mime_type(&bytes)
            .ok_or_else(|| ImageError::Unsupported(path.display().to_string()))?;
        Ok(Self {
            mime_type: mime_type.to_string(),
            bytes,
        })
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
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

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    /// `data:<mime>;base64,<payload>` form for embedding.
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }

    /// The request part carrying this image inline.
    pub fn to_part(&self) -> gemini::Part {
        gemini::Part::inline_data(self.mime_type.clone(), self.to_base64())
    }
}

// Image payloads are large; keep them out of debug output.
impl fmt::Debug for ImageData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageData")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Identify common image formats by their leading bytes.
pub fn sniff_mime_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    #[test]
    fn test_rejects_non_image_mime() {
        assert!(matches!(
            ImageData::new("text/plain", vec![1, 2, 3]),
            Err(ImageError::Unsupported(_))
        ));
    }

    #[test]
    fn test_base64_and_data_uri() {
        let image = ImageData::png(b"hello".to_vec());
        assert_eq!(image.to_base64(), "aGVsbG8=");
        assert_eq!(image.to_data_uri(), "data:image/png;base64,aGVsbG8=");

        let decoded = ImageData::from_base64("image/png", "aGVsbG8=").unwrap();
        assert_eq!(decoded, image);
    }

    #[test]
    fn test_invalid_base64() {
        assert!(matches!(
            ImageData::from_base64("image/png", "%%%"),
            Err(ImageError::Decode(_))
        ));
    }

    #[test]
    fn test_sniff() {
        assert_eq!(sniff_mime_type(PNG_HEADER), Some("image/png"));
        assert_eq!(sniff_mime_type(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("image/jpeg"));
        assert_eq!(sniff_mime_type(b"GIF89a...."), Some("image/gif"));
        assert_eq!(sniff_mime_type(b"RIFF\0\0\0\0WEBPVP8 "), Some("image/webp"));
        assert_eq!(sniff_mime_type(b"%PDF-1.7"), None);
    }

    #[test]
    fn test_debug_hides_payload() {
        let image = ImageData::png(vec![0; 4096]);
        let debug = format!("{image:?}");
        assert!(debug.contains("4096"));
        assert!(debug.len() < 100);
    }

    #[tokio::test]
    async fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("ref.png");
        tokio::fs::write(&png, PNG_HEADER).await.unwrap();
        let image = ImageData::from_path(&png).await.unwrap();
        assert_eq!(image.mime_type(), "image/png");
        assert_eq!(image.bytes(), PNG_HEADER);

        let text = dir.path().join("notes.txt");
        tokio::fs::write(&text, b"not an image").await.unwrap();
        assert!(matches!(
            ImageData::from_path(&text).await,
            Err(ImageError::Unsupported(_))
        ));
    }
}
