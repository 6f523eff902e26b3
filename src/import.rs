//! Promoting staged registration requests into the whitelist.
//!
//! Listing and committing are separate steps; both address entries by their
//! staging id and both check the whitelist, so an entry merged in between is
//! skipped rather than duplicated.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::{cars, StoreError};
use crate::staging::{PendingSubmission, StagingError, StagingFile};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error(transparent)]
    Staging(#[from] StagingError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// Plates inserted into the whitelist.
    pub added: Vec<String>,
    /// Plates already present when the commit ran.
    pub skipped: Vec<String>,
    /// Selected ids no longer in the staging file.
    pub missing: Vec<Uuid>,
}

/// Staged entries whose plate is not yet whitelisted, in file order.
pub async fn pending(
    pool: &SqlitePool,
    staging: &StagingFile,
) -> Result<Vec<PendingSubmission>, ImportError> {
    let mut result = Vec::new();
    for entry in staging.load().await? {
        if cars::find_by_plate(pool, &entry.plates).await?.is_none() {
            result.push(entry);
        }
    }
    Ok(result)
}

/// Insert the selected staged entries in a single transaction.
pub async fn commit(
    pool: &SqlitePool,
    staging: &StagingFile,
    selected: &[Uuid],
) -> Result<ImportReport, ImportError> {
    let entries: HashMap<Uuid, PendingSubmission> = staging
        .load()
        .await?
        .into_iter()
        .map(|entry| (entry.id, entry))
        .collect();

    let mut report = ImportReport::default();
    let mut seen = HashSet::new();
    let mut tx = pool.begin().await.map_err(StoreError::from)?;

    for id in selected.iter().filter(|id| seen.insert(**id)) {
        let Some(entry) = entries.get(id) else {
            warn!("Staged entry {} vanished before import", id);
            report.missing.push(*id);
            continue;
        };

        if cars::find_by_plate(&mut *tx, &entry.plates).await?.is_some() {
            report.skipped.push(entry.plates.clone());
            continue;
        }

        match cars::insert(&mut *tx, &entry.to_new_car()).await {
            Ok(car) => report.added.push(car.plates),
            Err(StoreError::DuplicatePlate(plate)) => report.skipped.push(plate),
            Err(e) => return Err(e.into()),
        }
    }

    tx.commit().await.map_err(StoreError::from)?;
    info!(
        "Import finished: {} added, {} skipped, {} missing",
        report.added.len(),
        report.skipped.len(),
        report.missing.len()
    );
    Ok(report)
}
