use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::{Date, Time};

use crate::error::AppError;

/// Bookable time slot. `available` is owned by the reservation workflow:
/// nothing else flips it once the slot exists.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Slot {
    pub id: i64,
    pub date: Date,
    pub start_time: Time,
    pub end_time: Time,
    pub available: bool,
}

pub async fn list_available(db: &PgPool) -> anyhow::Result<Vec<Slot>> {
    let slots = sqlx::query_as::<_, Slot>(
        r#"
        SELECT id, date, start_time, end_time, available
        FROM slots
        WHERE available = TRUE
        ORDER BY date, start_time
        "#,
    )
    .fetch_all(db)
    .await?;
    Ok(slots)
}

pub async fn create(db: &PgPool, date: Date, start_time: Time, end_time: Time) -> anyhow::Result<Slot> {
    let slot = sqlx::query_as::<_, Slot>(
        r#"
        INSERT INTO slots (date, start_time, end_time)
        VALUES ($1, $2, $3)
        RETURNING id, date, start_time, end_time, available
        "#,
    )
    .bind(date)
    .bind(start_time)
    .bind(end_time)
    .fetch_one(db)
    .await?;
    Ok(slot)
}

/// Removal is RESTRICTed while a reservation still references the slot; the
/// foreign key violation surfaces as a validation error.
pub async fn delete(db: &PgPool, id: i64) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM slots WHERE id = $1")
        .bind(id)
        .execute(db)
        .await;
    match result {
        Ok(done) if done.rows_affected() == 0 => Err(AppError::not_found("Slot not found")),
        Ok(_) => Ok(()),
        Err(e) => match e.as_database_error() {
            Some(db_err) if db_err.is_foreign_key_violation() => Err(AppError::validation(
                "Slot still has a reservation and cannot be deleted",
            )),
            _ => Err(e.into()),
        },
    }
}
