//! Registration requests waiting for operator review, kept as a JSON array
//! shared by the bot (writer) and the web interface (reader).

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::cars::NewCar;

const LEGACY_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6f1d_2c7a_94e3_4b58_a0c2_5d81_e6f4_3b9a);

#[derive(Debug, Error)]
pub enum StagingError {
    #[error("Staging file {0} not found")]
    Missing(PathBuf),
    #[error("IO error on staging file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed staging file: {0}")]
    Format(#[from] serde_json::Error),
    #[error("Staging write task failed: {0}")]
    Task(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSubmission {
    pub id: Uuid,
    pub plates: String,
    pub fio: String,
    pub room: String,
    pub phone: String,
}

impl PendingSubmission {
    pub fn new(plates: String, fio: String, room: String, phone: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            plates,
            fio,
            room,
            phone,
        }
    }

    pub fn to_new_car(&self) -> NewCar {
        NewCar {
            plates: self.plates.clone(),
            fio: self.fio.clone(),
            room: self.room.clone(),
            phone: self.phone.clone(),
        }
    }
}

/// On-disk form; files written before ids existed have none.
#[derive(Debug, Deserialize)]
struct StoredSubmission {
    #[serde(default)]
    id: Option<Uuid>,
    plates: String,
    fio: String,
    room: String,
    phone: String,
}

impl StoredSubmission {
    /// Entries without an id get one derived from their position and
    /// contents. The file is append-only, so the id is the same on every
    /// read and is written out with the next append.
    fn into_submission(self, position: usize) -> PendingSubmission {
        let id = self.id.unwrap_or_else(|| {
            let key = format!(
                "{}\n{}\n{}\n{}\n{}",
                position, self.plates, self.fio, self.room, self.phone
            );
            Uuid::new_v5(&LEGACY_ID_NAMESPACE, key.as_bytes())
        });

        PendingSubmission {
            id,
            plates: self.plates,
            fio: self.fio,
            room: self.room,
            phone: self.phone,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StagingFile {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl StagingFile {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> bool {
        tokio::fs::try_exists(&self.path).await.unwrap_or(false)
    }

    /// Read every staged submission in file order. Never writes the file.
    pub async fn load(&self) -> Result<Vec<PendingSubmission>, StagingError> {
        let _guard = self.write_lock.lock().await;
        self.load_unlocked().await
    }

    pub async fn append(&self, submission: PendingSubmission) -> Result<(), StagingError> {
        let _guard = self.write_lock.lock().await;

        let mut entries = match self.load_unlocked().await {
            Ok(entries) => entries,
            Err(StagingError::Missing(_)) => Vec::new(),
            Err(e) => return Err(e),
        };

        info!("Staging registration request for {}", submission.plates);
        entries.push(submission);
        self.save(entries).await
    }

    async fn load_unlocked(&self) -> Result<Vec<PendingSubmission>, StagingError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StagingError::Missing(self.path.clone()))
            }
            Err(e) => return Err(e.into()),
        };

        let stored: Vec<StoredSubmission> = serde_json::from_slice(&raw)?;
        let entries: Vec<PendingSubmission> = stored
            .into_iter()
            .enumerate()
            .map(|(position, s)| s.into_submission(position))
            .collect();

        debug!("Loaded {} staged entries from {:?}", entries.len(), self.path);
        Ok(entries)
    }

    /// Replace the file atomically: write a sibling temp file, then rename.
    async fn save(&self, entries: Vec<PendingSubmission>) -> Result<(), StagingError> {
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || -> Result<(), StagingError> {
            let dir = match path.parent() {
                Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
                _ => PathBuf::from("."),
            };

            let mut file = tempfile::NamedTempFile::new_in(&dir)?;
            serde_json::to_writer_pretty(&mut file, &entries)?;
            file.write_all(b"\n")?;
            file.as_file().sync_all()?;
            file.persist(&path).map_err(|e| StagingError::Io(e.error))?;
            Ok(())
        })
        .await
        .map_err(|e| StagingError::Task(e.to_string()))?
    }
}
