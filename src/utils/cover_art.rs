//! Cover art fetching and normalization
//!
//! Art is requested at a square pixel size and embedded as JPEG:
//! - JPEG responses are kept byte-for-byte
//! - Other formats are decoded, fitted to the requested size and re-encoded
//! - An empty response means "no art" rather than an error

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use reqwest::{Client, StatusCode};
use std::io::Cursor;
use thiserror::Error;
use tracing::debug;

/// Largest square size the service will render
pub const MAX_ART_SIZE: u32 = 800;

/// JPEG quality used when re-encoding non-JPEG art
const JPEG_QUALITY: u8 = 90;

/// Cover image ready to embed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverArt {
    /// JPEG bytes
    pub data: Vec<u8>,
    /// Pixel width, 0 when unknown
    pub width: u32,
    /// Pixel height, 0 when unknown
    pub height: u32,
}

#[derive(Debug, Error)]
pub enum CoverArtError {
    #[error("failed to fetch cover art: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("cover art request returned status {0}")]
    Status(StatusCode),

    #[error("failed to convert cover art to JPEG: {0}")]
    Image(#[from] image::ImageError),

    #[error("cover art worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Clamp a requested art size to what the service supports
pub fn clamp_art_size(size: u32) -> u32 {
    size.clamp(1, MAX_ART_SIZE)
}

/// Fetch cover art with a single GET request
///
/// Any non-success status or transport failure is an error. No retries.
pub async fn fetch_cover_art(
    http: &Client,
    url: &str,
    size: u32,
) -> Result<Option<CoverArt>, CoverArtError> {
    debug!("Fetching cover art: {}", url);

    let response = http.get(url).send().await?;
    if !response.status().is_success() {
        return Err(CoverArtError::Status(response.status()));
    }

    let body = response.bytes().await?;
    if body.is_empty() {
        debug!("Cover art response was empty");
        return Ok(None);
    }

    let cover = tokio::task::spawn_blocking(move || prepare_cover(body, size)).await??;
    Ok(Some(cover))
}

/// Whether the bytes start with a JPEG SOI marker
pub fn is_jpeg(data: &[u8]) -> bool {
    data.starts_with(&[0xFF, 0xD8, 0xFF])
}

/// Normalize fetched bytes into embeddable JPEG art
pub fn prepare_cover(data: Bytes, size: u32) -> Result<CoverArt, CoverArtError> {
    if is_jpeg(&data) {
        let (width, height) = ImageReader::new(Cursor::new(&data[..]))
            .with_guessed_format()
            .ok()
            .and_then(|reader| reader.into_dimensions().ok())
            .unwrap_or((0, 0));
        return Ok(CoverArt {
            data: data.to_vec(),
            width,
            height,
        });
    }

    let img = ImageReader::new(Cursor::new(&data[..]))
        .with_guessed_format()
        .map_err(image::ImageError::IoError)?
        .decode()?;
    // JPEG has no alpha channel
    let rgb = resize_to_fit(img, size).to_rgb8();

    let mut output = Vec::new();
    JpegEncoder::new_with_quality(&mut output, JPEG_QUALITY).encode_image(&rgb)?;

    debug!(
        "Re-encoded cover art: {}x{} -> {} bytes",
        rgb.width(),
        rgb.height(),
        output.len()
    );
    Ok(CoverArt {
        data: output,
        width: rgb.width(),
        height: rgb.height(),
    })
}

/// Resize image to fit within `max` while maintaining aspect ratio
fn resize_to_fit(img: DynamicImage, max: u32) -> DynamicImage {
    let (width, height) = (img.width(), img.height());

    if width <= max && height <= max {
        return img;
    }

    let (new_width, new_height) = if width > height {
        let ratio = max as f64 / width as f64;
        (max, ((height as f64 * ratio) as u32).max(1))
    } else {
        let ratio = max as f64 / height as f64;
        (((width as f64 * ratio) as u32).max(1), max)
    };

    debug!(
        "Resizing cover art: {}x{} -> {}x{}",
        width, height, new_width, new_height
    );

    img.resize(new_width, new_height, FilterType::Lanczos3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageFormat;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn encode(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, format).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_resize_small_image() {
        let img = DynamicImage::new_rgb8(100, 100);
        let resized = resize_to_fit(img, 300);
        assert_eq!(resized.width(), 100);
        assert_eq!(resized.height(), 100);
    }

    #[test]
    fn test_resize_large_image() {
        let img = DynamicImage::new_rgb8(1500, 1000);
        let resized = resize_to_fit(img, 300);
        assert_eq!(resized.width(), 300);
        assert!(resized.height() <= 300);
    }

    #[test]
    fn test_resize_thin_image_keeps_a_pixel() {
        let resized = resize_to_fit(DynamicImage::new_rgb8(1000, 1), 300);
        assert_eq!((resized.width(), resized.height()), (300, 1));

        let resized = resize_to_fit(DynamicImage::new_rgb8(1, 1000), 300);
        assert_eq!((resized.width(), resized.height()), (1, 300));
    }

    #[test]
    fn test_thin_png_still_encodes() {
        let png = encode(&DynamicImage::new_rgb8(2000, 2), ImageFormat::Png);
        let cover = prepare_cover(Bytes::from(png), 800).unwrap();
        assert!(is_jpeg(&cover.data));
        assert_eq!((cover.width, cover.height), (800, 1));
    }

    #[test]
    fn test_clamp_art_size() {
        assert_eq!(clamp_art_size(500), 500);
        assert_eq!(clamp_art_size(5000), MAX_ART_SIZE);
        assert_eq!(clamp_art_size(0), 1);
    }

    #[test]
    fn test_jpeg_passes_through() {
        let jpeg = encode(&DynamicImage::new_rgb8(64, 48), ImageFormat::Jpeg);
        let cover = prepare_cover(Bytes::from(jpeg.clone()), 800).unwrap();
        assert_eq!(cover.data, jpeg);
        assert_eq!((cover.width, cover.height), (64, 48));
    }

    #[test]
    fn test_png_is_reencoded_as_jpeg() {
        let png = encode(&DynamicImage::new_rgba8(1000, 500), ImageFormat::Png);
        let cover = prepare_cover(Bytes::from(png), 200).unwrap();
        assert!(is_jpeg(&cover.data));
        assert_eq!(cover.width, 200);
        assert_eq!(cover.height, 100);
    }

    #[tokio::test]
    async fn test_fetch_error_status_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cover"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = fetch_cover_art(&Client::new(), &format!("{}/cover", server.uri()), 500).await;
        assert!(matches!(result, Err(CoverArtError::Status(StatusCode::NOT_FOUND))));
    }

    #[tokio::test]
    async fn test_fetch_empty_body_is_no_art() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cover"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let result = fetch_cover_art(&Client::new(), &format!("{}/cover", server.uri()), 500).await;
        assert!(result.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fetch_returns_jpeg() {
        let server = MockServer::start().await;
        let jpeg = encode(&DynamicImage::new_rgb8(32, 32), ImageFormat::Jpeg);
        Mock::given(method("GET"))
            .and(path("/cover"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(jpeg.clone()))
            .expect(1)
            .mount(&server)
            .await;

        let cover = fetch_cover_art(&Client::new(), &format!("{}/cover", server.uri()), 500)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cover.data, jpeg);
    }
}
