//! Camera page, live feed, decision polling and single-image checks.

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::{page, require_login, views, AppState, HandlerFailure};
use crate::db::cars::Car;
use crate::recognition::feed::{frame_stream, MULTIPART_BOUNDARY};
use crate::recognition::sampler::AccessDecision;
use crate::recognition::RecognitionStatus;

#[derive(Debug, Serialize)]
struct UploadOutcome {
    plate: Option<String>,
    status: Option<RecognitionStatus>,
    car: Option<Car>,
    message: String,
}

impl From<AccessDecision> for UploadOutcome {
    fn from(decision: AccessDecision) -> Self {
        let message = match decision.status {
            RecognitionStatus::Allowed => "Access allowed".to_string(),
            RecognitionStatus::Denied => "Car not found in the whitelist".to_string(),
            RecognitionStatus::Unrecognized | RecognitionStatus::Idle => {
                "Plate not recognized".to_string()
            }
            RecognitionStatus::Error => HandlerFailure::Recognition(
                decision.detail.clone().unwrap_or_default(),
            )
            .to_string(),
        };

        Self {
            plate: decision.plate,
            status: Some(decision.status),
            car: decision.car,
            message,
        }
    }
}

impl From<HandlerFailure> for UploadOutcome {
    fn from(failure: HandlerFailure) -> Self {
        Self {
            plate: None,
            status: None,
            car: None,
            message: failure.to_string(),
        }
    }
}

pub(super) async fn upload_form(state: web::Data<AppState>, req: HttpRequest) -> HttpResponse {
    if let Err(redirect) = require_login(&state, &req) {
        return redirect;
    }
    page(&state, &req, "Check image", &views::upload())
}

pub(super) async fn upload(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Bytes,
) -> HttpResponse {
    if state.sessions.user_id(&req).is_none() {
        return HttpResponse::Unauthorized()
            .json(UploadOutcome::from(HandlerFailure::Auth("Please log in".into())));
    }

    match check_upload(&state, &body).await {
        Ok(decision) => HttpResponse::Ok().json(UploadOutcome::from(decision)),
        Err(failure) => HttpResponse::BadRequest().json(UploadOutcome::from(failure)),
    }
}

async fn check_upload(state: &AppState, body: &[u8]) -> Result<AccessDecision, HandlerFailure> {
    if body.is_empty() {
        return Err(HandlerFailure::Validation("No file selected".into()));
    }

    let format = image::guess_format(body)
        .map_err(|_| HandlerFailure::Validation("Unsupported image format".into()))?;
    let extension = format.extensions_str().first().copied().unwrap_or("img");

    tokio::fs::create_dir_all(&state.upload_dir)
        .await
        .map_err(|e| HandlerFailure::Storage(e.to_string()))?;
    let path = state.upload_dir.join(upload_file_name(extension));
    tokio::fs::write(&path, body)
        .await
        .map_err(|e| HandlerFailure::Storage(e.to_string()))?;
    info!("Saved uploaded image to {:?}", path);

    Ok(state.sampler.check_file(&path).await)
}

fn upload_file_name(extension: &str) -> String {
    format!(
        "upload_{}_{}.{}",
        Utc::now().format("%Y%m%d_%H%M%S%.3f"),
        Uuid::new_v4().simple(),
        extension
    )
}

pub(super) async fn camera(state: web::Data<AppState>, req: HttpRequest) -> HttpResponse {
    if let Err(redirect) = require_login(&state, &req) {
        return redirect;
    }
    page(&state, &req, "Camera", &views::camera())
}

pub(super) async fn video_feed(state: web::Data<AppState>) -> HttpResponse {
    info!("Video feed client connected");
    let stream = frame_stream(
        state.camera.clone(),
        state.sample_queue.clone(),
        state.feed,
    );

    HttpResponse::Ok()
        .content_type(format!(
            "multipart/x-mixed-replace; boundary={}",
            MULTIPART_BOUNDARY
        ))
        .streaming(stream)
}

pub(super) async fn get_plate(state: web::Data<AppState>) -> HttpResponse {
    let snapshot = state.sampler.state().current();
    HttpResponse::Ok().json(snapshot.as_ref())
}
