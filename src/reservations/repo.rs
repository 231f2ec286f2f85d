use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::{Date, OffsetDateTime, Time};

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Reservation {
    pub id: i64,
    pub user_id: i64,
    pub slot_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A caller's reservation joined with its slot.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ReservationWithSlot {
    pub id: i64,
    pub slot_id: i64,
    pub date: Date,
    pub start_time: Time,
    pub end_time: Time,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Admin projection: reservation joined with slot and owning user.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ReservationDetails {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub slot_id: i64,
    pub date: Date,
    pub start_time: Time,
    pub end_time: Time,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Books a slot for a user. The slot row is locked for the duration of the
/// transaction, so the availability check and the flag flip are one atomic
/// check-and-set; the unique index on `reservations.slot_id` backstops it.
/// Under concurrent creates against one slot, exactly one caller wins.
pub async fn create(db: &PgPool, user_id: i64, slot_id: i64) -> Result<Reservation, AppError> {
    let mut tx = db.begin().await?;

    let available =
        sqlx::query_scalar::<_, bool>("SELECT available FROM slots WHERE id = $1 FOR UPDATE")
            .bind(slot_id)
            .fetch_optional(&mut *tx)
            .await?;
    if available != Some(true) {
        return Err(AppError::validation("The selected slot is not available"));
    }

    sqlx::query("UPDATE slots SET available = FALSE WHERE id = $1")
        .bind(slot_id)
        .execute(&mut *tx)
        .await?;

    let reservation = sqlx::query_as::<_, Reservation>(
        r#"
        INSERT INTO reservations (user_id, slot_id)
        VALUES ($1, $2)
        RETURNING id, user_id, slot_id, created_at
        "#,
    )
    .bind(user_id)
    .bind(slot_id)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| match e.as_database_error() {
        Some(db_err) if db_err.is_unique_violation() => {
            AppError::validation("The selected slot is not available")
        }
        _ => AppError::from(e),
    })?;

    tx.commit().await?;
    Ok(reservation)
}

/// Cancels the caller's reservation and releases its slot. Ownership lives in
/// the delete predicate: a foreign reservation id behaves exactly like a
/// missing one.
pub async fn cancel(db: &PgPool, id: i64, user_id: i64) -> Result<(), AppError> {
    let mut tx = db.begin().await?;

    let slot_id = sqlx::query_scalar::<_, i64>(
        "DELETE FROM reservations WHERE id = $1 AND user_id = $2 RETURNING slot_id",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?;
    let Some(slot_id) = slot_id else {
        return Err(AppError::not_found("Reservation not found"));
    };

    sqlx::query("UPDATE slots SET available = TRUE WHERE id = $1")
        .bind(slot_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

/// Moves the caller's reservation to another slot: free the old slot, occupy
/// the new one, repoint the row, all in one transaction. A failure anywhere
/// rolls the whole move back, so neither slot is left half-flipped.
pub async fn change_slot(
    db: &PgPool,
    id: i64,
    user_id: i64,
    new_slot_id: i64,
) -> Result<Reservation, AppError> {
    let mut tx = db.begin().await?;

    let current = sqlx::query_as::<_, Reservation>(
        r#"
        SELECT id, user_id, slot_id, created_at
        FROM reservations
        WHERE id = $1 AND user_id = $2
        FOR UPDATE
        "#,
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?;
    let Some(current) = current else {
        return Err(AppError::not_found("Reservation not found"));
    };

    // Both slot rows are locked in ascending id order so two concurrent
    // moves swapping a pair of slots cannot deadlock each other.
    let mut slot_ids = [current.slot_id, new_slot_id];
    slot_ids.sort_unstable();
    let mut new_available = None;
    for slot_id in slot_ids {
        let available =
            sqlx::query_scalar::<_, bool>("SELECT available FROM slots WHERE id = $1 FOR UPDATE")
                .bind(slot_id)
                .fetch_optional(&mut *tx)
                .await?;
        if slot_id == new_slot_id {
            new_available = available;
        }
    }
    if new_available != Some(true) {
        return Err(AppError::validation("The new slot is not available"));
    }

    sqlx::query("UPDATE slots SET available = TRUE WHERE id = $1")
        .bind(current.slot_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE slots SET available = FALSE WHERE id = $1")
        .bind(new_slot_id)
        .execute(&mut *tx)
        .await?;

    let updated = sqlx::query_as::<_, Reservation>(
        r#"
        UPDATE reservations SET slot_id = $2
        WHERE id = $1
        RETURNING id, user_id, slot_id, created_at
        "#,
    )
    .bind(id)
    .bind(new_slot_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(updated)
}

/// Same restore-then-delete as `cancel`, without the ownership predicate.
pub async fn admin_delete(db: &PgPool, id: i64) -> Result<(), AppError> {
    let mut tx = db.begin().await?;

    let slot_id = sqlx::query_scalar::<_, i64>(
        "DELETE FROM reservations WHERE id = $1 RETURNING slot_id",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?;
    let Some(slot_id) = slot_id else {
        return Err(AppError::not_found("Reservation not found"));
    };

    sqlx::query("UPDATE slots SET available = TRUE WHERE id = $1")
        .bind(slot_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

pub async fn list_for_user(db: &PgPool, user_id: i64) -> anyhow::Result<Vec<ReservationWithSlot>> {
    let rows = sqlx::query_as::<_, ReservationWithSlot>(
        r#"
        SELECT r.id, r.slot_id, s.date, s.start_time, s.end_time, r.created_at
        FROM reservations r
        JOIN slots s ON s.id = r.slot_id
        WHERE r.user_id = $1
        ORDER BY s.date, s.start_time
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn list_all(db: &PgPool) -> anyhow::Result<Vec<ReservationDetails>> {
    let rows = sqlx::query_as::<_, ReservationDetails>(
        r#"
        SELECT r.id, r.user_id, u.username, u.email,
               r.slot_id, s.date, s.start_time, s.end_time, r.created_at
        FROM reservations r
        JOIN slots s ON s.id = r.slot_id
        JOIN users u ON u.id = r.user_id
        ORDER BY s.date, s.start_time
        "#,
    )
    .fetch_all(db)
    .await?;
    Ok(rows)
}


#[cfg(test)]
mod db_tests {
    use super::*;
    use crate::slots;
    use crate::users::repo::{Role, User};
    use time::macros::{date, time};

    async fn seed_user(pool: &PgPool, email: &str) -> User {
        User::create(pool, "tester", email, "$argon2id$test", Role::Client)
            .await
            .expect("seed user")
    }

    async fn seed_slot(pool: &PgPool) -> slots::repo::Slot {
        slots::repo::create(pool, date!(2025 - 01 - 01), time!(09:00), time!(10:00))
            .await
            .expect("seed slot")
    }

    async fn slot_available(pool: &PgPool, id: i64) -> bool {
        sqlx::query_scalar("SELECT available FROM slots WHERE id = $1")
            .bind(id)
            .fetch_one(pool)
            .await
            .expect("slot exists")
    }

    async fn count_for_slot(pool: &PgPool, slot_id: i64) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM reservations WHERE slot_id = $1")
            .bind(slot_id)
            .fetch_one(pool)
            .await
            .expect("count reservations")
    }

    #[sqlx::test]
    async fn create_books_slot_and_inserts_one_row(pool: PgPool) {
        let user = seed_user(&pool, "a@x.com").await;
        let slot = seed_slot(&pool).await;

        let reservation = create(&pool, user.id, slot.id).await.expect("create");
        assert_eq!(reservation.user_id, user.id);
        assert_eq!(reservation.slot_id, slot.id);
        assert!(!slot_available(&pool, slot.id).await);
        assert_eq!(count_for_slot(&pool, slot.id).await, 1);
    }

    #[sqlx::test]
    async fn create_rejects_unavailable_or_missing_slot(pool: PgPool) {
        let a = seed_user(&pool, "a@x.com").await;
        let b = seed_user(&pool, "b@x.com").await;
        let slot = seed_slot(&pool).await;

        create(&pool, a.id, slot.id).await.expect("first create");
        let err = create(&pool, b.id, slot.id).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = create(&pool, b.id, slot.id + 1000).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        assert_eq!(count_for_slot(&pool, slot.id).await, 1);
    }

    #[sqlx::test]
    async fn cancel_restores_slot_and_enforces_ownership(pool: PgPool) {
        let owner = seed_user(&pool, "owner@x.com").await;
        let other = seed_user(&pool, "other@x.com").await;
        let slot = seed_slot(&pool).await;
        let reservation = create(&pool, owner.id, slot.id).await.expect("create");

        // A foreign reservation id behaves exactly like a missing one.
        let err = cancel(&pool, reservation.id, other.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(!slot_available(&pool, slot.id).await);
        assert_eq!(count_for_slot(&pool, slot.id).await, 1);

        cancel(&pool, reservation.id, owner.id).await.expect("cancel");
        assert!(slot_available(&pool, slot.id).await);
        assert_eq!(count_for_slot(&pool, slot.id).await, 0);
    }

    #[sqlx::test]
    async fn change_slot_moves_reservation(pool: PgPool) {
        let user = seed_user(&pool, "a@x.com").await;
        let first = seed_slot(&pool).await;
        let second = seed_slot(&pool).await;
        let reservation = create(&pool, user.id, first.id).await.expect("create");

        let moved = change_slot(&pool, reservation.id, user.id, second.id)
            .await
            .expect("move");
        assert_eq!(moved.slot_id, second.id);
        assert!(slot_available(&pool, first.id).await);
        assert!(!slot_available(&pool, second.id).await);
    }

    #[sqlx::test]
    async fn change_slot_to_unavailable_target_leaves_state_unchanged(pool: PgPool) {
        let a = seed_user(&pool, "a@x.com").await;
        let b = seed_user(&pool, "b@x.com").await;
        let first = seed_slot(&pool).await;
        let second = seed_slot(&pool).await;
        let reservation = create(&pool, a.id, first.id).await.expect("create a");
        create(&pool, b.id, second.id).await.expect("create b");

        let err = change_slot(&pool, reservation.id, a.id, second.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(!slot_available(&pool, first.id).await);
        assert!(!slot_available(&pool, second.id).await);
        let rows = list_for_user(&pool, a.id).await.expect("list");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].slot_id, first.id);
    }

    #[sqlx::test]
    async fn admin_delete_restores_slot(pool: PgPool) {
        let user = seed_user(&pool, "a@x.com").await;
        let slot = seed_slot(&pool).await;
        let reservation = create(&pool, user.id, slot.id).await.expect("create");

        admin_delete(&pool, reservation.id).await.expect("admin delete");
        assert!(slot_available(&pool, slot.id).await);
        assert_eq!(count_for_slot(&pool, slot.id).await, 0);

        let err = admin_delete(&pool, reservation.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[sqlx::test]
    async fn concurrent_creates_have_single_winner(pool: PgPool) {
        let a = seed_user(&pool, "a@x.com").await;
        let b = seed_user(&pool, "b@x.com").await;
        let slot = seed_slot(&pool).await;

        let (ra, rb) = tokio::join!(create(&pool, a.id, slot.id), create(&pool, b.id, slot.id));
        assert!(ra.is_ok() ^ rb.is_ok(), "exactly one create wins");
        for result in [ra, rb] {
            if let Err(err) = result {
                assert!(matches!(err, AppError::Validation(_)));
            }
        }
        assert!(!slot_available(&pool, slot.id).await);
        assert_eq!(count_for_slot(&pool, slot.id).await, 1);
    }

    #[sqlx::test]
    async fn concurrent_swap_moves_fail_cleanly(pool: PgPool) {
        let a = seed_user(&pool, "a@x.com").await;
        let b = seed_user(&pool, "b@x.com").await;
        let first = seed_slot(&pool).await;
        let second = seed_slot(&pool).await;
        let res_a = create(&pool, a.id, first.id).await.expect("create a");
        let res_b = create(&pool, b.id, second.id).await.expect("create b");

        // Opposite-direction moves contend on the same pair of slot rows;
        // with ordered locking the loser gets a validation error, never a
        // store-level failure.
        let (ma, mb) = tokio::join!(
            change_slot(&pool, res_a.id, a.id, second.id),
            change_slot(&pool, res_b.id, b.id, first.id),
        );
        for result in [ma, mb] {
            if let Err(err) = result {
                assert!(matches!(err, AppError::Validation(_)), "unexpected: {err:?}");
            }
        }
        assert_eq!(
            count_for_slot(&pool, first.id).await + count_for_slot(&pool, second.id).await,
            2
        );
    }
}
