//! Camera-driven access decisions.
//!
//! [`sampler::Sampler`] turns a frame into a decision and publishes it as the
//! current [`RecognitionSnapshot`]; [`feed`] streams the preview and diverts
//! frames to the sampler on a fixed cadence.

pub mod feed;
pub mod sampler;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionStatus {
    /// Nothing sampled yet.
    Idle,
    Allowed,
    Denied,
    Unrecognized,
    Error,
}

/// Latest decision as seen by polling clients. Always replaced whole.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecognitionSnapshot {
    pub plate: Option<String>,
    pub status: RecognitionStatus,
    pub at: Option<DateTime<Utc>>,
}

impl Default for RecognitionSnapshot {
    fn default() -> Self {
        Self {
            plate: None,
            status: RecognitionStatus::Idle,
            at: None,
        }
    }
}

/// Process-wide holder of the latest snapshot.
#[derive(Debug, Clone)]
pub struct RecognitionState {
    tx: Arc<watch::Sender<Arc<RecognitionSnapshot>>>,
}

impl RecognitionState {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Arc::new(RecognitionSnapshot::default()));
        Self { tx: Arc::new(tx) }
    }

    pub fn publish(&self, snapshot: RecognitionSnapshot) {
        self.tx.send_replace(Arc::new(snapshot));
    }

    pub fn current(&self) -> Arc<RecognitionSnapshot> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<RecognitionSnapshot>> {
        self.tx.subscribe()
    }
}

impl Default for RecognitionState {
    fn default() -> Self {
        Self::new()
    }
}
