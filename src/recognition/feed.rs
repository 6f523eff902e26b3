//! Live preview stream with periodic diversion of frames to the sampler.

use std::sync::Arc;
use std::time::Duration;

use actix_web::web::Bytes;
use futures::Stream;
use image::DynamicImage;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::sampler::Sampler;
use crate::camera::{CameraError, FrameSource};

pub const MULTIPART_BOUNDARY: &str = "frame";

#[derive(Debug, Clone, Copy)]
pub struct FeedSettings {
    pub frame_interval: Duration,
    pub sample_interval: Duration,
}

/// Hand-off to the background sampler. Holds at most one frame, so a slow
/// recognizer makes ticks get skipped instead of stalling the preview.
#[derive(Debug, Clone)]
pub struct SampleQueue {
    tx: mpsc::Sender<DynamicImage>,
}

impl SampleQueue {
    pub fn bounded() -> (Self, mpsc::Receiver<DynamicImage>) {
        let (tx, rx) = mpsc::channel(1);
        (Self { tx }, rx)
    }

    /// Queue a frame for sampling. Returns false when the tick was dropped.
    pub fn offer(&self, frame: DynamicImage) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("Sampler busy, skipping recognition tick");
                false
            }
            Err(TrySendError::Closed(_)) => {
                warn!("Sampler worker is gone, skipping recognition tick");
                false
            }
        }
    }
}

/// Start the background worker that runs the sampler on queued frames.
pub fn spawn_sampler(sampler: Arc<Sampler>) -> SampleQueue {
    let (queue, mut rx) = SampleQueue::bounded();

    tokio::spawn(async move {
        info!("Sampler worker started");
        while let Some(frame) = rx.recv().await {
            sampler.sample(&frame).await;
        }
        info!("Sampler worker stopped");
    });

    queue
}

/// Multipart body part carrying one JPEG frame.
pub fn multipart_part(jpeg: &[u8]) -> Bytes {
    let header = format!(
        "--{}\r\nContent-Type: image/jpeg\r\n\r\n",
        MULTIPART_BOUNDARY
    );
    let mut part = Vec::with_capacity(header.len() + jpeg.len() + 2);
    part.extend_from_slice(header.as_bytes());
    part.extend_from_slice(jpeg);
    part.extend_from_slice(b"\r\n");
    Bytes::from(part)
}

/// Endless preview stream. Ends at the first capture failure; a frame is
/// offered to the sampler whenever `sample_interval` has passed since the
/// previous offer.
pub fn frame_stream(
    source: Arc<dyn FrameSource>,
    queue: SampleQueue,
    settings: FeedSettings,
) -> impl Stream<Item = Result<Bytes, CameraError>> {
    async_stream::stream! {
        let mut ticker = tokio::time::interval(settings.frame_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_sample = Instant::now();

        loop {
            ticker.tick().await;

            let frame = match source.capture().await {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("Video feed stopped: {}", e);
                    break;
                }
            };

            if last_sample.elapsed() >= settings.sample_interval {
                queue.offer(frame.image.clone());
                last_sample = Instant::now();
            }

            yield Ok::<Bytes, CameraError>(multipart_part(&frame.jpeg));
        }
    }
}
