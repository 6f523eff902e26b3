use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use tracing::info;

use super::{fail, page, redirect_with_flash, views, AppState, HandlerFailure};
use crate::auth::{hash_password, verify_password};
use crate::db::users;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    fn validate(&self) -> Result<(), HandlerFailure> {
        if self.username.trim().is_empty() || self.password.is_empty() {
            return Err(HandlerFailure::Validation(
                "Username and password are required".into(),
            ));
        }
        Ok(())
    }
}

pub(super) async fn register_form(state: web::Data<AppState>, req: HttpRequest) -> HttpResponse {
    page(&state, &req, "Register", &views::credentials_form("/register", "Register"))
}

pub(super) async fn register(
    state: web::Data<AppState>,
    req: HttpRequest,
    form: web::Form<Credentials>,
) -> HttpResponse {
    match create_user(&state, &form).await {
        Ok(()) => redirect_with_flash(
            &state,
            &req,
            "/login",
            "Registration complete, you can log in now",
        ),
        Err(failure) => fail(&state, &req, "/register", failure),
    }
}

async fn create_user(state: &AppState, form: &Credentials) -> Result<(), HandlerFailure> {
    form.validate()?;
    let password = form.password.clone();
    let password_hash = web::block(move || hash_password(&password))
        .await
        .map_err(|e| HandlerFailure::Storage(e.to_string()))?;
    let user = users::create(&state.pool, form.username.trim(), &password_hash).await?;
    info!("Registered operator {}", user.username);
    Ok(())
}

pub(super) async fn login_form(state: web::Data<AppState>, req: HttpRequest) -> HttpResponse {
    page(&state, &req, "Log in", &views::credentials_form("/login", "Log in"))
}

pub(super) async fn login(
    state: web::Data<AppState>,
    req: HttpRequest,
    form: web::Form<Credentials>,
) -> HttpResponse {
    match authenticate(&state, &form).await {
        Ok(user_id) => {
            let cookie = state.sessions.login(&req, user_id, "Logged in");
            HttpResponse::SeeOther()
                .insert_header((header::LOCATION, "/"))
                .cookie(cookie)
                .finish()
        }
        Err(failure) => fail(&state, &req, "/login", failure),
    }
}

async fn authenticate(state: &AppState, form: &Credentials) -> Result<i64, HandlerFailure> {
    let rejected = || HandlerFailure::Auth("Invalid username or password".into());

    form.validate().map_err(|_| rejected())?;
    let user = users::find_by_username(&state.pool, form.username.trim())
        .await?
        .ok_or_else(rejected)?;

    let password = form.password.clone();
    let stored = user.password_hash.clone();
    let verified = web::block(move || verify_password(&password, &stored))
        .await
        .map_err(|e| HandlerFailure::Storage(e.to_string()))?;
    if !verified {
        return Err(rejected());
    }
    info!("Operator {} logged in", user.username);
    Ok(user.id)
}

pub(super) async fn logout(state: web::Data<AppState>, req: HttpRequest) -> HttpResponse {
    state.sessions.logout(&req);
    redirect_with_flash(&state, &req, "/", "Logged out")
}
