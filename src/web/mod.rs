//! HTTP interface for operators plus the camera preview endpoints.
//!
//! Handlers never surface raw errors: each failure is a [`HandlerFailure`]
//! that becomes a redirect carrying a flash message (or a JSON outcome for
//! the upload endpoint).

mod auth;
mod cars;
mod import;
mod recognition;
pub mod session;
pub mod views;

use std::path::PathBuf;
use std::sync::Arc;

use actix_web::http::header::{self, ContentType};
use actix_web::{web, HttpRequest, HttpResponse};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::warn;

use crate::camera::FrameSource;
use crate::db::StoreError;
use crate::import::ImportError;
use crate::recognition::feed::{FeedSettings, SampleQueue};
use crate::recognition::sampler::Sampler;
use crate::staging::{StagingError, StagingFile};
use session::SessionStore;

/// Largest accepted image upload.
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

pub struct AppState {
    pub pool: SqlitePool,
    pub sessions: SessionStore,
    pub sampler: Arc<Sampler>,
    pub sample_queue: SampleQueue,
    pub camera: Arc<dyn FrameSource>,
    pub staging: StagingFile,
    pub feed: FeedSettings,
    pub upload_dir: PathBuf,
}

#[derive(Debug, Error)]
pub enum HandlerFailure {
    #[error("{0}")]
    Validation(String),
    #[error("Error while processing the image: {0}")]
    Recognition(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("{0}")]
    Auth(String),
}

impl From<StoreError> for HandlerFailure {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(e) => HandlerFailure::Storage(e.to_string()),
            other => HandlerFailure::Validation(other.to_string()),
        }
    }
}

impl From<StagingError> for HandlerFailure {
    fn from(err: StagingError) -> Self {
        match err {
            StagingError::Missing(_) => HandlerFailure::Validation(err.to_string()),
            other => HandlerFailure::Storage(other.to_string()),
        }
    }
}

impl From<ImportError> for HandlerFailure {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Staging(e) => e.into(),
            ImportError::Store(e) => e.into(),
        }
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::PayloadConfig::new(MAX_UPLOAD_BYTES))
        .route("/", web::get().to(index))
        .service(
            web::resource("/register")
                .route(web::get().to(auth::register_form))
                .route(web::post().to(auth::register)),
        )
        .service(
            web::resource("/login")
                .route(web::get().to(auth::login_form))
                .route(web::post().to(auth::login)),
        )
        .route("/logout", web::get().to(auth::logout))
        .service(
            web::resource("/upload")
                .route(web::get().to(recognition::upload_form))
                .route(web::post().to(recognition::upload)),
        )
        .route("/camera", web::get().to(recognition::camera))
        .route("/video_feed", web::get().to(recognition::video_feed))
        .route("/get_plate", web::get().to(recognition::get_plate))
        .service(
            web::resource("/add_car")
                .route(web::get().to(cars::add_car_form))
                .route(web::post().to(cars::add_car)),
        )
        .service(
            web::resource("/edit_car/{id}")
                .route(web::get().to(cars::edit_car_form))
                .route(web::post().to(cars::edit_car)),
        )
        .route("/delete_car/{id}", web::post().to(cars::delete_car))
        .route("/whitelist", web::get().to(cars::whitelist))
        .route("/logs", web::get().to(cars::access_log))
        .service(
            web::resource("/upload_json")
                .route(web::get().to(import::pending))
                .route(web::post().to(import::commit)),
        );
}

async fn index(state: web::Data<AppState>, req: HttpRequest) -> HttpResponse {
    page(&state, &req, "Access control", &views::index())
}

/// Render a full page, draining the session's flash messages into it.
fn page(state: &AppState, req: &HttpRequest, title: &str, body: &str) -> HttpResponse {
    let logged_in = state.sessions.user_id(req).is_some();
    let flashes = state.sessions.take_flashes(req);
    HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(views::layout(title, logged_in, &flashes, body))
}

fn redirect_with_flash(
    state: &AppState,
    req: &HttpRequest,
    location: &str,
    message: &str,
) -> HttpResponse {
    let mut response = HttpResponse::SeeOther();
    response.insert_header((header::LOCATION, location));
    if let Some(cookie) = state.sessions.push_flash(req, message) {
        response.cookie(cookie);
    }
    response.finish()
}

fn fail(state: &AppState, req: &HttpRequest, location: &str, failure: HandlerFailure) -> HttpResponse {
    if matches!(failure, HandlerFailure::Storage(_)) {
        warn!("{} {}: {}", req.method(), req.path(), failure);
    }
    redirect_with_flash(state, req, location, &failure.to_string())
}

/// Operator id for the request, or the redirect to the login page.
fn require_login(state: &AppState, req: &HttpRequest) -> Result<i64, HttpResponse> {
    state.sessions.user_id(req).ok_or_else(|| {
        fail(
            state,
            req,
            "/login",
            HandlerFailure::Auth("Please log in".into()),
        )
    })
}
