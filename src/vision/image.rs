//! Still images handed over by the capture source.

use std::path::Path;

use base64::{engine::general_purpose, Engine as _};

use super::extractor::ExtractionError;

/// Encoded still image plus its MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl CapturedImage {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    /// Read an image file; the MIME type follows the file extension.
    ///
    /// # Errors
    ///
    /// [`ExtractionError::UnsupportedImage`] for an unknown extension,
    /// [`ExtractionError::EmptyImage`] for an empty file and
    /// [`ExtractionError::Io`] when the file cannot be read.
    pub fn from_path(path: &Path) -> Result<Self, ExtractionError> {
        let mime_type = mime_for_path(path)
            .ok_or_else(|| ExtractionError::UnsupportedImage(path.display().to_string()))?;

        let bytes = std::fs::read(path)?;
        if bytes.is_empty() {
            return Err(ExtractionError::EmptyImage);
        }

        log::debug!(
            "vision: loaded {} ({} bytes, {mime_type})",
            path.display(),
            bytes.len()
        );
        Ok(Self::new(bytes, mime_type))
    }

    /// Standard base64 of the image bytes, as sent inline to the provider.
    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(&self.bytes)
    }
}

/// MIME type for a file extension the provider accepts, case-insensitive.
pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn mime_from_extension() {
        assert_eq!(mime_for_path(Path::new("a/label.JPG")), Some("image/jpeg"));
        assert_eq!(mime_for_path(Path::new("sign.png")), Some("image/png"));
        assert_eq!(mime_for_path(Path::new("x.webp")), Some("image/webp"));
        assert_eq!(mime_for_path(Path::new("notes.txt")), None);
        assert_eq!(mime_for_path(Path::new("no_extension")), None);
    }

    #[test]
    fn from_path_reads_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("menu.png");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(&[0x89, b'P', b'N', b'G'])
            .unwrap();

        let image = CapturedImage::from_path(&path).unwrap();

        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.bytes.len(), 4);
        assert_eq!(image.to_base64(), "iVBORw==");
    }

    #[test]
    fn from_path_rejects_unknown_extension() {
        let err = CapturedImage::from_path(Path::new("scan.bmp")).unwrap_err();
        assert!(matches!(err, ExtractionError::UnsupportedImage(_)));
    }

    #[test]
    fn from_path_rejects_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.jpg");
        std::fs::File::create(&path).unwrap();

        assert!(matches!(
            CapturedImage::from_path(&path),
            Err(ExtractionError::EmptyImage)
        ));
    }

    #[test]
    fn from_path_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = CapturedImage::from_path(&dir.path().join("gone.jpeg")).unwrap_err();
        assert!(matches!(err, ExtractionError::Io(_)));
    }
}
