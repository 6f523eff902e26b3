use std::path::Path;
use std::sync::Arc;

use alpr::{AlprError, PlateRecognizer, PlateZone, SelectionPolicy};
use chrono::Utc;
use image::DynamicImage;
use serde::Serialize;
use sqlx::SqlitePool;
use telegram::{AccessStatus, DetectionEvent, NotificationService};
use tracing::{debug, info, warn};

use super::{RecognitionSnapshot, RecognitionState, RecognitionStatus};
use crate::db::cars::{self, Car};
use crate::db::logs;

/// Outcome of recognizing one image and checking it against the whitelist.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccessDecision {
    pub plate: Option<String>,
    pub confidence: Option<f32>,
    pub status: RecognitionStatus,
    pub car: Option<Car>,
    /// Failure description when `status` is `Error`.
    pub detail: Option<String>,
}

impl AccessDecision {
    fn unrecognized() -> Self {
        Self {
            plate: None,
            confidence: None,
            status: RecognitionStatus::Unrecognized,
            car: None,
            detail: None,
        }
    }

    fn error(detail: String) -> Self {
        Self {
            plate: None,
            confidence: None,
            status: RecognitionStatus::Error,
            car: None,
            detail: Some(detail),
        }
    }

    pub fn matched(&self) -> bool {
        self.status == RecognitionStatus::Allowed
    }

    pub fn snapshot(&self) -> RecognitionSnapshot {
        RecognitionSnapshot {
            plate: self.plate.clone(),
            status: self.status,
            at: Some(Utc::now()),
        }
    }
}

pub struct Sampler {
    pool: SqlitePool,
    recognizer: Arc<dyn PlateRecognizer>,
    policy: SelectionPolicy,
    notifier: Arc<NotificationService>,
    state: RecognitionState,
}

impl Sampler {
    pub fn new(
        pool: SqlitePool,
        recognizer: Arc<dyn PlateRecognizer>,
        policy: SelectionPolicy,
        notifier: Arc<NotificationService>,
        state: RecognitionState,
    ) -> Self {
        Self {
            pool,
            recognizer,
            policy,
            notifier,
            state,
        }
    }

    pub fn state(&self) -> &RecognitionState {
        &self.state
    }

    /// One recognition tick: decide, publish the snapshot, alert on denial.
    pub async fn sample(&self, frame: &DynamicImage) -> AccessDecision {
        let recognized = alpr::recognize_frame(self.recognizer.as_ref(), frame).await;
        let decision = self.decide(recognized).await;
        self.state.publish(decision.snapshot());

        if decision.status == RecognitionStatus::Denied {
            self.alert(&decision).await;
        }
        decision
    }

    /// Recognize a stored image without touching the shared state.
    pub async fn check_file(&self, path: &Path) -> AccessDecision {
        let recognized = self.recognizer.recognize(path).await;
        self.decide(recognized).await
    }

    async fn decide(&self, recognized: Result<Vec<PlateZone>, AlprError>) -> AccessDecision {
        let zones = match recognized {
            Ok(zones) => zones,
            Err(e) => {
                warn!("Plate recognition failed: {}", e);
                return AccessDecision::error(e.to_string());
            }
        };

        let Some(candidate) = self.policy.select(&zones) else {
            debug!("No plate candidate in {} zones", zones.len());
            return AccessDecision::unrecognized();
        };
        let plate = candidate.plate.clone();

        let car = match cars::find_by_plate(&self.pool, &plate).await {
            Ok(car) => car,
            Err(e) => {
                warn!("Whitelist lookup for {} failed: {}", plate, e);
                return AccessDecision::error(e.to_string());
            }
        };

        let status = match &car {
            Some(car) => {
                if let Err(e) = logs::append(&self.pool, &plate, Utc::now()).await {
                    warn!("Failed to log access for {}: {}", plate, e);
                    return AccessDecision::error(e.to_string());
                }
                info!("Access allowed: {} (room {})", plate, car.room);
                RecognitionStatus::Allowed
            }
            None => {
                info!("Access denied: {} is not whitelisted", plate);
                RecognitionStatus::Denied
            }
        };

        AccessDecision {
            plate: Some(plate),
            confidence: Some(candidate.confidence),
            status,
            car,
            detail: None,
        }
    }

    async fn alert(&self, decision: &AccessDecision) {
        if !self.notifier.is_enabled() {
            return;
        }
        let Some(plate) = &decision.plate else {
            return;
        };

        let event = DetectionEvent {
            timestamp: Utc::now(),
            plate_number: plate.clone(),
            confidence: decision.confidence.unwrap_or_default(),
            access_status: AccessStatus::Denied,
        };
        // Failures are already logged by the notifier
        let _ = self.notifier.send_alert(&event).await;
    }
}
