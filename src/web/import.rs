//! Reviewing bot registration requests and merging them into the whitelist.

use actix_web::{web, HttpRequest, HttpResponse};
use uuid::Uuid;

use super::{fail, page, redirect_with_flash, require_login, views, AppState, HandlerFailure};
use crate::import::{self, ImportReport};

const SELECTED_FIELD: &str = "selected";

pub(super) async fn pending(state: web::Data<AppState>, req: HttpRequest) -> HttpResponse {
    if let Err(redirect) = require_login(&state, &req) {
        return redirect;
    }

    match import::pending(&state.pool, &state.staging).await {
        Ok(entries) => page(&state, &req, "Registration requests", &views::import(&entries)),
        Err(e) => fail(&state, &req, "/", e.into()),
    }
}

pub(super) async fn commit(
    state: web::Data<AppState>,
    req: HttpRequest,
    form: web::Form<Vec<(String, String)>>,
) -> HttpResponse {
    if let Err(redirect) = require_login(&state, &req) {
        return redirect;
    }

    let committed = async {
        let selected = selected_ids(&form)?;
        if selected.is_empty() {
            return Err(HandlerFailure::Validation("Nothing selected".into()));
        }
        Ok(import::commit(&state.pool, &state.staging, &selected).await?)
    };

    match committed.await {
        Ok(report) => redirect_with_flash(&state, &req, "/upload_json", &summary(&report)),
        Err(failure) => fail(&state, &req, "/upload_json", failure),
    }
}

fn selected_ids(fields: &[(String, String)]) -> Result<Vec<Uuid>, HandlerFailure> {
    fields
        .iter()
        .filter(|(name, _)| name == SELECTED_FIELD)
        .map(|(_, value)| {
            Uuid::parse_str(value)
                .map_err(|_| HandlerFailure::Validation(format!("Invalid request id: {}", value)))
        })
        .collect()
}

fn summary(report: &ImportReport) -> String {
    let mut parts = vec![format!("Added {} request(s) to the whitelist", report.added.len())];
    if !report.skipped.is_empty() {
        parts.push(format!("already whitelisted: {}", report.skipped.join(", ")));
    }
    if !report.missing.is_empty() {
        parts.push(format!("{} request(s) no longer exist", report.missing.len()));
    }
    parts.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selected_ids() {
        let id = Uuid::new_v4();
        let fields = vec![
            ("selected".to_string(), id.to_string()),
            ("other".to_string(), "ignored".to_string()),
        ];
        assert_eq!(selected_ids(&fields).unwrap(), vec![id]);

        let bad = vec![("selected".to_string(), "0".to_string())];
        assert!(matches!(selected_ids(&bad), Err(HandlerFailure::Validation(_))));
    }

    #[test]
    fn test_summary() {
        let report = ImportReport {
            added: vec!["AB1234CD".into()],
            skipped: vec!["XY9999ZZ".into()],
            missing: vec![],
        };
        assert_eq!(
            summary(&report),
            "Added 1 request(s) to the whitelist; already whitelisted: XY9999ZZ"
        );
    }
}
