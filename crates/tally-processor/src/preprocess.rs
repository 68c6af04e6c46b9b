//! Content preparation before a provider call
//!
//! Reads the file, rejects what cannot be processed, pulls embedded text out
//! of PDFs and normalizes images. Decoding work runs on the blocking pool.

use crate::ProcessorConfig;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{GenericImageView, ImageFormat};
use std::io::Cursor;
use std::path::Path;
use tally_domain::{DocumentKind, ExtractionError};
use tracing::{debug, warn};

/// Magic bytes every PDF starts with
const PDF_MAGIC: &[u8] = b"%PDF-";

/// Content ready to be put into an extraction request
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    /// Kind of the content
    pub kind: DocumentKind,
    /// Bytes to send (normalized image or raw PDF)
    pub content: Vec<u8>,
    /// MIME type of `content`
    pub mime_type: String,
    /// Embedded PDF text, when there is enough of it
    pub text: Option<String>,
}

/// Read and prepare a document
///
/// Every error returned here is `Unprocessable`.
pub async fn prepare(
    path: &Path,
    kind: DocumentKind,
    config: &ProcessorConfig,
) -> Result<PreparedDocument, ExtractionError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ExtractionError::unprocessable(format!("Cannot read file: {}", e)))?;

    if bytes.is_empty() {
        return Err(ExtractionError::unprocessable("File is empty"));
    }
    if bytes.len() as u64 > config.max_file_bytes {
        return Err(ExtractionError::unprocessable(format!(
            "File is {} bytes, limit is {}",
            bytes.len(),
            config.max_file_bytes
        )));
    }

    match kind {
        DocumentKind::Pdf => prepare_pdf(path, bytes, config.min_pdf_text_chars).await,
        DocumentKind::Image => {
            let format = output_format(path);
            let max_dimension = config.max_image_dimension;
            let quality = config.jpeg_quality;
            let content = tokio::task::spawn_blocking(move || {
                normalize_image(&bytes, format, max_dimension, quality)
            })
            .await
            .map_err(|e| ExtractionError::unprocessable(format!("Image task failed: {}", e)))??;

            Ok(PreparedDocument {
                kind,
                content,
                mime_type: kind.mime_type(path).to_string(),
                text: None,
            })
        }
    }
}

async fn prepare_pdf(
    path: &Path,
    bytes: Vec<u8>,
    min_text_chars: usize,
) -> Result<PreparedDocument, ExtractionError> {
    if !bytes.starts_with(PDF_MAGIC) {
        return Err(ExtractionError::unprocessable("Missing PDF header"));
    }

    let (bytes, text) = tokio::task::spawn_blocking(move || {
        let text = extract_pdf_text(&bytes);
        (bytes, text)
    })
    .await
    .map_err(|e| ExtractionError::unprocessable(format!("PDF task failed: {}", e)))?;

    let text = match text {
        Ok(text) if text.trim().chars().count() >= min_text_chars => Some(text.trim().to_string()),
        Ok(_) => {
            debug!(path = %path.display(), "PDF has little embedded text, attaching the file");
            None
        }
        Err(e) => {
            warn!(path = %path.display(), "PDF text extraction failed, attaching the file: {}", e);
            None
        }
    };

    Ok(PreparedDocument {
        kind: DocumentKind::Pdf,
        content: bytes,
        mime_type: DocumentKind::Pdf.mime_type(path).to_string(),
        text,
    })
}

/// Pull embedded text out of a PDF
///
/// `pdf_extract` can panic on unusual fonts; a panic is reported as an error.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String, String> {
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem(bytes)
    })) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err("PDF parser panicked".to_string()),
    }
}

/// Encoding used for a normalized image, chosen by extension
fn output_format(path: &Path) -> ImageFormat {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .as_deref()
    {
        Some("png") => ImageFormat::Png,
        _ => ImageFormat::Jpeg,
    }
}

/// Decode, downscale, convert to RGB8 and re-encode an image
pub fn normalize_image(
    bytes: &[u8],
    format: ImageFormat,
    max_dimension: u32,
    quality: u8,
) -> Result<Vec<u8>, ExtractionError> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| ExtractionError::unprocessable(format!("Cannot decode image: {}", e)))?;

    let (width, height) = img.dimensions();
    let img = if width > max_dimension || height > max_dimension {
        debug!(width, height, max_dimension, "Downscaling image");
        img.resize(max_dimension, max_dimension, FilterType::Lanczos3)
    } else {
        img
    };

    let rgb = img.to_rgb8();
    let mut buffer = Vec::new();
    match format {
        ImageFormat::Png => rgb
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .map_err(|e| ExtractionError::unprocessable(format!("Cannot encode PNG: {}", e)))?,
        _ => JpegEncoder::new_with_quality(&mut buffer, quality)
            .encode_image(&rgb)
            .map_err(|e| ExtractionError::unprocessable(format!("Cannot encode JPEG: {}", e)))?,
    }
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};
    use tally_domain::ErrorKind;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([200, 30, 30, 128]));
        let mut buffer = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    #[test]
    fn test_small_image_keeps_size_and_drops_alpha() {
        let out = normalize_image(&png_bytes(40, 30), ImageFormat::Png, 4096, 90).unwrap();
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!(decoded.dimensions(), (40, 30));
        assert!(!decoded.color().has_alpha());
    }

    #[test]
    fn test_large_image_is_downscaled_keeping_aspect() {
        let out = normalize_image(&png_bytes(200, 50), ImageFormat::Jpeg, 64, 90).unwrap();
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!(decoded.dimensions(), (64, 16));
    }

    #[test]
    fn test_jpeg_output_is_jpeg() {
        let jpeg = {
            let img = RgbImage::from_pixel(8, 8, Rgb([1, 2, 3]));
            let mut buffer = Vec::new();
            DynamicImage::ImageRgb8(img)
                .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Jpeg)
                .unwrap();
            buffer
        };
        let out = normalize_image(&jpeg, ImageFormat::Jpeg, 4096, 80).unwrap();
        assert_eq!(&out[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_garbage_is_unprocessable() {
        let err = normalize_image(b"definitely not an image", ImageFormat::Png, 4096, 90)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unprocessable);
    }

    #[test]
    fn test_output_format_by_extension() {
        assert_eq!(output_format(Path::new("a.PNG")), ImageFormat::Png);
        assert_eq!(output_format(Path::new("a.jpeg")), ImageFormat::Jpeg);
        assert_eq!(output_format(Path::new("a.jpg")), ImageFormat::Jpeg);
    }

    #[test]
    fn test_broken_pdf_text_is_an_error_not_a_panic() {
        assert!(extract_pdf_text(b"%PDF-1.4\nthis is not a real pdf").is_err());
    }

    #[tokio::test]
    async fn test_prepare_rejects_empty_and_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.jpg");
        std::fs::write(&empty, b"").unwrap();

        let config = ProcessorConfig::default();
        let err = prepare(&empty, DocumentKind::Image, &config).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unprocessable);
        assert!(err.message.contains("empty"));

        let missing = dir.path().join("missing.pdf");
        let err = prepare(&missing, DocumentKind::Pdf, &config).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unprocessable);
    }

    #[tokio::test]
    async fn test_prepare_rejects_pdf_without_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.pdf");
        std::fs::write(&path, b"<html>not a pdf</html>").unwrap();

        let err = prepare(&path, DocumentKind::Pdf, &ProcessorConfig::default())
            .await
            .unwrap_err();
        assert!(err.message.contains("PDF header"));
    }

    #[tokio::test]
    async fn test_prepare_rejects_oversized_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.png");
        std::fs::write(&path, png_bytes(10, 10)).unwrap();

        let config = ProcessorConfig {
            max_file_bytes: 8,
            ..ProcessorConfig::default()
        };
        let err = prepare(&path, DocumentKind::Image, &config).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unprocessable);
    }
}
