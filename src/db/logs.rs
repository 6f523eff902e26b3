//! Append-only access log.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Executor, Sqlite, SqlitePool};

use super::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct AccessLogEntry {
    pub id: i64,
    pub plates: String,
    pub date: DateTime<Utc>,
}

pub async fn append<'e, E>(executor: E, plate: &str, date: DateTime<Utc>) -> Result<AccessLogEntry>
where
    E: Executor<'e, Database = Sqlite>,
{
    Ok(sqlx::query_as::<_, AccessLogEntry>(
        "INSERT INTO logs (plates, date) VALUES (?, ?) RETURNING id, plates, date",
    )
    .bind(plate)
    .bind(date)
    .fetch_one(executor)
    .await?)
}

/// Every entry, newest first.
pub async fn list_recent(pool: &SqlitePool) -> Result<Vec<AccessLogEntry>> {
    Ok(sqlx::query_as::<_, AccessLogEntry>(
        "SELECT id, plates, date FROM logs ORDER BY date DESC, id DESC",
    )
    .fetch_all(pool)
    .await?)
}

pub async fn count_for_plate(pool: &SqlitePool, plate: &str) -> Result<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM logs WHERE plates = ?")
        .bind(plate)
        .fetch_one(pool)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use chrono::Duration;

    #[tokio::test]
    async fn test_append_and_list_newest_first() {
        let pool = test_pool().await;
        let now = Utc::now();

        append(&pool, "AB1234CD", now - Duration::minutes(5)).await.unwrap();
        let latest = append(&pool, "XY9999ZZ", now).await.unwrap();
        assert_eq!(latest.plates, "XY9999ZZ");

        let entries = list_recent(&pool).await.unwrap();
        let plates: Vec<&str> = entries.iter().map(|e| e.plates.as_str()).collect();
        assert_eq!(plates, vec!["XY9999ZZ", "AB1234CD"]);
        assert_eq!(count_for_plate(&pool, "AB1234CD").await.unwrap(), 1);
        assert_eq!(count_for_plate(&pool, "NOPE").await.unwrap(), 0);
    }
}
