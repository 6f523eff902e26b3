use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use thiserror::Error;
use tracing::{debug, info};

const JPEG_QUALITY: u8 = 85;

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("Camera request failed: {0}")]
    RequestError(String),
    #[error("Camera returned HTTP {0}")]
    StatusError(u16),
    #[error("Failed to decode frame: {0}")]
    DecodeError(String),
}

/// One captured frame: decoded pixels for recognition and JPEG bytes for
/// the preview stream.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: DynamicImage,
    pub jpeg: Vec<u8>,
}

impl Frame {
    pub fn from_encoded(bytes: Vec<u8>) -> Result<Self, CameraError> {
        let image =
            image::load_from_memory(&bytes).map_err(|e| CameraError::DecodeError(e.to_string()))?;

        let jpeg = if matches!(image::guess_format(&bytes), Ok(ImageFormat::Jpeg)) {
            bytes
        } else {
            let mut out = Cursor::new(Vec::new());
            DynamicImage::ImageRgb8(image.to_rgb8())
                .write_to(&mut out, image::ImageOutputFormat::Jpeg(JPEG_QUALITY))
                .map_err(|e| CameraError::DecodeError(e.to_string()))?;
            out.into_inner()
        };

        Ok(Self { image, jpeg })
    }
}

#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn capture(&self) -> Result<Frame, CameraError>;
}

/// Camera exposing a still-image HTTP endpoint; each request is one frame.
pub struct SnapshotCamera {
    http: reqwest::Client,
    url: String,
}

impl SnapshotCamera {
    pub fn new(url: String, timeout: Duration) -> Result<Self, CameraError> {
        info!("Using snapshot camera at {}", url);
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CameraError::RequestError(e.to_string()))?;
        Ok(Self { http, url })
    }
}

#[async_trait]
impl FrameSource for SnapshotCamera {
    async fn capture(&self) -> Result<Frame, CameraError> {
        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| CameraError::RequestError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CameraError::StatusError(response.status().as_u16()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| CameraError::RequestError(e.to_string()))?;
        debug!("Captured {} byte frame", bytes.len());

        Frame::from_encoded(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(format: image::ImageOutputFormat) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        DynamicImage::new_rgb8(8, 6).write_to(&mut out, format).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_jpeg_frames_are_passed_through() {
        let jpeg = encoded(image::ImageOutputFormat::Jpeg(80));
        let frame = Frame::from_encoded(jpeg.clone()).unwrap();
        assert_eq!(frame.jpeg, jpeg);
        assert_eq!(frame.image.width(), 8);
    }

    #[test]
    fn test_other_formats_are_reencoded() {
        let frame = Frame::from_encoded(encoded(image::ImageOutputFormat::Png)).unwrap();
        assert_eq!(&frame.jpeg[..2], &[0xFF, 0xD8]);
        assert_eq!(frame.image.height(), 6);
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(matches!(
            Frame::from_encoded(b"definitely not an image".to_vec()),
            Err(CameraError::DecodeError(_))
        ));
    }

    #[tokio::test]
    async fn test_snapshot_camera() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/snapshot.png")
            .with_status(200)
            .with_header("content-type", "image/png")
            .with_body(encoded(image::ImageOutputFormat::Png))
            .create_async()
            .await;
        server
            .mock("GET", "/offline.jpg")
            .with_status(503)
            .create_async()
            .await;

        let camera =
            SnapshotCamera::new(format!("{}/snapshot.png", server.url()), Duration::from_secs(2))
                .unwrap();
        let frame = camera.capture().await.unwrap();
        assert_eq!(frame.image.width(), 8);

        let offline =
            SnapshotCamera::new(format!("{}/offline.jpg", server.url()), Duration::from_secs(2))
                .unwrap();
        assert!(matches!(
            offline.capture().await,
            Err(CameraError::StatusError(503))
        ));
    }
}
