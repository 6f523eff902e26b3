//! Whitelist management and the access log page.

use actix_web::{web, HttpRequest, HttpResponse};

use super::{fail, page, redirect_with_flash, require_login, views, AppState, HandlerFailure};
use crate::db::cars::{self, NewCar};
use crate::db::logs;

fn validate(car: &NewCar) -> Result<(), HandlerFailure> {
    if car.plates.trim().is_empty() {
        return Err(HandlerFailure::Validation("Plate number is required".into()));
    }
    Ok(())
}

pub(super) async fn add_car_form(state: web::Data<AppState>, req: HttpRequest) -> HttpResponse {
    if let Err(redirect) = require_login(&state, &req) {
        return redirect;
    }
    page(
        &state,
        &req,
        "Add car",
        &views::car_form("/add_car", "Add", &NewCar::default()),
    )
}

pub(super) async fn add_car(
    state: web::Data<AppState>,
    req: HttpRequest,
    form: web::Form<NewCar>,
) -> HttpResponse {
    if let Err(redirect) = require_login(&state, &req) {
        return redirect;
    }

    let created = async {
        validate(&form)?;
        Ok::<_, HandlerFailure>(cars::create(&state.pool, &form).await?)
    };
    match created.await {
        Ok(_) => redirect_with_flash(&state, &req, "/", "Car added to the whitelist"),
        Err(failure) => fail(&state, &req, "/add_car", failure),
    }
}

pub(super) async fn whitelist(state: web::Data<AppState>, req: HttpRequest) -> HttpResponse {
    if let Err(redirect) = require_login(&state, &req) {
        return redirect;
    }

    match cars::list_all(&state.pool).await {
        Ok(all) => page(&state, &req, "Whitelist", &views::whitelist(&all)),
        Err(e) => fail(&state, &req, "/", e.into()),
    }
}

pub(super) async fn edit_car_form(
    state: web::Data<AppState>,
    req: HttpRequest,
    id: web::Path<i64>,
) -> HttpResponse {
    if let Err(redirect) = require_login(&state, &req) {
        return redirect;
    }

    let id = id.into_inner();
    match cars::get(&state.pool, id).await {
        Ok(car) => {
            let values = NewCar {
                plates: car.plates,
                fio: car.fio,
                room: car.room,
                phone: car.phone,
            };
            let action = format!("/edit_car/{}", id);
            page(&state, &req, "Edit car", &views::car_form(&action, "Save", &values))
        }
        Err(e) => fail(&state, &req, "/whitelist", e.into()),
    }
}

pub(super) async fn edit_car(
    state: web::Data<AppState>,
    req: HttpRequest,
    id: web::Path<i64>,
    form: web::Form<NewCar>,
) -> HttpResponse {
    if let Err(redirect) = require_login(&state, &req) {
        return redirect;
    }

    let id = id.into_inner();
    let updated = async {
        validate(&form)?;
        Ok::<_, HandlerFailure>(cars::update(&state.pool, id, &form).await?)
    };
    match updated.await {
        Ok(_) => redirect_with_flash(&state, &req, "/whitelist", "Car details updated"),
        Err(failure) => fail(&state, &req, &format!("/edit_car/{}", id), failure),
    }
}

pub(super) async fn delete_car(
    state: web::Data<AppState>,
    req: HttpRequest,
    id: web::Path<i64>,
) -> HttpResponse {
    if let Err(redirect) = require_login(&state, &req) {
        return redirect;
    }

    match cars::delete(&state.pool, id.into_inner()).await {
        Ok(()) => redirect_with_flash(&state, &req, "/whitelist", "Car removed"),
        Err(e) => fail(&state, &req, "/whitelist", e.into()),
    }
}

pub(super) async fn access_log(state: web::Data<AppState>, req: HttpRequest) -> HttpResponse {
    if let Err(redirect) = require_login(&state, &req) {
        return redirect;
    }

    match logs::list_recent(&state.pool).await {
        Ok(entries) => page(&state, &req, "Access log", &views::access_log(&entries)),
        Err(e) => fail(&state, &req, "/", e.into()),
    }
}
