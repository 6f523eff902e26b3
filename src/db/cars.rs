//! Whitelist entries. Plates are unique; lookups are exact string matches.

use serde::{Deserialize, Serialize};
use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::info;

use super::{is_unique_violation, Result, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Car {
    pub id: i64,
    pub plates: String,
    pub fio: String,
    pub room: String,
    pub phone: String,
}

/// Field values for creating or editing a whitelist entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewCar {
    pub plates: String,
    pub fio: String,
    pub room: String,
    pub phone: String,
}

pub async fn create(pool: &SqlitePool, car: &NewCar) -> Result<Car> {
    let mut tx = pool.begin().await?;
    let created = insert(&mut *tx, car).await?;
    tx.commit().await?;

    info!("Added {} to the whitelist", created.plates);
    Ok(created)
}

/// Insert without opening a transaction, for callers that manage their own.
pub async fn insert<'e, E>(executor: E, car: &NewCar) -> Result<Car>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, Car>(
        "INSERT INTO cars (plates, fio, room, phone) VALUES (?, ?, ?, ?) \
         RETURNING id, plates, fio, room, phone",
    )
    .bind(&car.plates)
    .bind(&car.fio)
    .bind(&car.room)
    .bind(&car.phone)
    .fetch_one(executor)
    .await
    .map_err(|e| duplicate_or(e, &car.plates))
}

pub async fn list_all(pool: &SqlitePool) -> Result<Vec<Car>> {
    Ok(
        sqlx::query_as::<_, Car>("SELECT id, plates, fio, room, phone FROM cars ORDER BY id")
            .fetch_all(pool)
            .await?,
    )
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<Car> {
    sqlx::query_as::<_, Car>("SELECT id, plates, fio, room, phone FROM cars WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("Car #{}", id)))
}

pub async fn find_by_plate<'e, E>(executor: E, plate: &str) -> Result<Option<Car>>
where
    E: Executor<'e, Database = Sqlite>,
{
    Ok(
        sqlx::query_as::<_, Car>("SELECT id, plates, fio, room, phone FROM cars WHERE plates = ?")
            .bind(plate)
            .fetch_optional(executor)
            .await?,
    )
}

pub async fn update(pool: &SqlitePool, id: i64, car: &NewCar) -> Result<Car> {
    let mut tx = pool.begin().await?;

    let updated = sqlx::query_as::<_, Car>(
        "UPDATE cars SET plates = ?, fio = ?, room = ?, phone = ? WHERE id = ? \
         RETURNING id, plates, fio, room, phone",
    )
    .bind(&car.plates)
    .bind(&car.fio)
    .bind(&car.room)
    .bind(&car.phone)
    .bind(id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(|e| duplicate_or(e, &car.plates))?
    .ok_or_else(|| StoreError::NotFound(format!("Car #{}", id)))?;

    tx.commit().await?;
    info!("Updated whitelist entry #{} ({})", id, updated.plates);
    Ok(updated)
}

pub async fn delete(pool: &SqlitePool, id: i64) -> Result<()> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query("DELETE FROM cars WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(format!("Car #{}", id)));
    }

    tx.commit().await?;
    info!("Removed whitelist entry #{}", id);
    Ok(())
}

fn duplicate_or(err: sqlx::Error, plate: &str) -> StoreError {
    if is_unique_violation(&err) {
        StoreError::DuplicatePlate(plate.to_string())
    } else {
        StoreError::Database(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn car(plates: &str) -> NewCar {
        NewCar {
            plates: plates.into(),
            fio: "Ivanov".into(),
            room: "12".into(),
            phone: "555-0100".into(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_plate_rejected() {
        let pool = test_pool().await;
        create(&pool, &car("AB1234CD")).await.unwrap();

        let err = create(&pool, &car("AB1234CD")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicatePlate(ref p) if p == "AB1234CD"));

        let all = list_all(&pool).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_find_by_plate_is_exact() {
        let pool = test_pool().await;
        create(&pool, &car("AB1234CD")).await.unwrap();

        assert!(find_by_plate(&pool, "AB1234CD").await.unwrap().is_some());
        assert!(find_by_plate(&pool, "ab1234cd").await.unwrap().is_none());
        assert!(find_by_plate(&pool, "AB1234CD ").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let pool = test_pool().await;
        let first = create(&pool, &car("AB1234CD")).await.unwrap();
        let second = create(&pool, &car("XY9999ZZ")).await.unwrap();

        let edited = NewCar {
            room: "14".into(),
            ..car("AB1234CE")
        };
        let updated = update(&pool, first.id, &edited).await.unwrap();
        assert_eq!(updated.plates, "AB1234CE");
        assert_eq!(get(&pool, first.id).await.unwrap().room, "14");

        // Renaming onto an existing plate leaves the row untouched
        let err = update(&pool, first.id, &car("XY9999ZZ")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicatePlate(_)));
        assert_eq!(get(&pool, first.id).await.unwrap().plates, "AB1234CE");

        delete(&pool, second.id).await.unwrap();
        assert!(matches!(
            get(&pool, second.id).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            delete(&pool, second.id).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            update(&pool, 999, &car("QQ0000QQ")).await,
            Err(StoreError::NotFound(_))
        ));
    }
}
