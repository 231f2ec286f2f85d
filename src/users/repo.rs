use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Client,
    /// Legacy unrestricted role for admin-created accounts; cannot book.
    User,
}

/// User record in the database.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    #[serde(skip_serializing)]
    pub reset_token: Option<String>,
    #[serde(skip_serializing)]
    pub reset_token_expires: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl User {
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, role,
                   reset_token, reset_token_expires, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: i64) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, role,
                   reset_token, reset_token_expires, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn create(
        db: &PgPool,
        username: &str,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING id, username, email, password_hash, role,
                      reset_token, reset_token_expires, created_at
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(role)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    pub async fn list(db: &PgPool) -> anyhow::Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, role,
                   reset_token, reset_token_expires, created_at
            FROM users
            ORDER BY id
            "#,
        )
        .fetch_all(db)
        .await?;
        Ok(users)
    }

    /// Admin-only profile update; the only path that changes a role. Moving
    /// the account onto an email another user already owns trips the unique
    /// constraint and is reported as a validation error, not a store failure.
    pub async fn update_profile(
        db: &PgPool,
        id: i64,
        username: &str,
        email: &str,
        role: Role,
    ) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET username = $2, email = $3, role = $4
            WHERE id = $1
            RETURNING id, username, email, password_hash, role,
                      reset_token, reset_token_expires, created_at
            "#,
        )
        .bind(id)
        .bind(username)
        .bind(email)
        .bind(role)
        .fetch_optional(db)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db_err) if db_err.is_unique_violation() => {
                AppError::validation("Email already registered")
            }
            _ => AppError::from(e),
        })?;
        Ok(user)
    }

    /// Deletes a user together with their reservations. Each reserved slot is
    /// released first so no slot stays marked occupied by a removed account.
    /// Returns false when no such user exists.
    pub async fn delete_cascading(db: &PgPool, id: i64) -> anyhow::Result<bool> {
        let mut tx = db.begin().await?;

        let existing =
            sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        if existing.is_none() {
            return Ok(false);
        }

        sqlx::query(
            r#"
            UPDATE slots SET available = TRUE
            WHERE id IN (SELECT slot_id FROM reservations WHERE user_id = $1)
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM reservations WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    pub async fn set_reset_token(
        db: &PgPool,
        id: i64,
        token: &str,
        expires: OffsetDateTime,
    ) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET reset_token = $2, reset_token_expires = $3 WHERE id = $1")
            .bind(id)
            .bind(token)
            .bind(expires)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Single guarded update: the token only matches while unexpired, and a
    /// successful reset clears it so it cannot be replayed.
    pub async fn reset_password(
        db: &PgPool,
        email: &str,
        token: &str,
        password_hash: &str,
    ) -> anyhow::Result<bool> {
        let updated = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE users
            SET password_hash = $3, reset_token = NULL, reset_token_expires = NULL
            WHERE email = $1 AND reset_token = $2 AND reset_token_expires > now()
            RETURNING id
            "#,
        )
        .bind(email)
        .bind(token)
        .bind(password_hash)
        .fetch_optional(db)
        .await?;
        Ok(updated.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        assert_eq!(serde_json::to_string(&Role::Client).unwrap(), "\"client\"");
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
    }

    #[test]
    fn role_deserializes_lowercase() {
        let role: Role = serde_json::from_str("\"client\"").unwrap();
        assert_eq!(role, Role::Client);
    }

    #[test]
    fn user_serialization_hides_secrets() {
        let user = User {
            id: 1,
            username: "alice".into(),
            email: "alice@example.com".into(),
            password_hash: "$argon2id$secret".into(),
            role: Role::Client,
            reset_token: Some("deadbeef".into()),
            reset_token_expires: Some(OffsetDateTime::now_utc()),
            created_at: OffsetDateTime::now_utc(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(json.contains("alice@example.com"));
        assert!(!json.contains("argon2"));
        assert!(!json.contains("deadbeef"));
    }
}

#[cfg(test)]
mod db_tests {
    use super::*;
    use crate::reservations;
    use crate::slots;
    use time::macros::{date, time};
    use time::Duration;

    async fn seed_user(pool: &PgPool, email: &str) -> User {
        User::create(pool, "tester", email, "$argon2id$test", Role::Client)
            .await
            .expect("seed user")
    }

    #[sqlx::test]
    async fn reset_token_is_single_use(pool: PgPool) {
        let user = seed_user(&pool, "reset@x.com").await;
        let expires = OffsetDateTime::now_utc() + Duration::hours(1);
        User::set_reset_token(&pool, user.id, "tok123", expires)
            .await
            .expect("set token");

        let wrong = User::reset_password(&pool, "reset@x.com", "wrong", "$argon2id$new")
            .await
            .expect("query");
        assert!(!wrong);

        let first = User::reset_password(&pool, "reset@x.com", "tok123", "$argon2id$new")
            .await
            .expect("query");
        assert!(first);

        // The token was cleared on success; replaying it matches nothing.
        let replay = User::reset_password(&pool, "reset@x.com", "tok123", "$argon2id$other")
            .await
            .expect("query");
        assert!(!replay);

        let fresh = User::find_by_email(&pool, "reset@x.com")
            .await
            .expect("query")
            .expect("user exists");
        assert_eq!(fresh.password_hash, "$argon2id$new");
        assert!(fresh.reset_token.is_none());
        assert!(fresh.reset_token_expires.is_none());
    }

    #[sqlx::test]
    async fn expired_reset_token_is_rejected(pool: PgPool) {
        let user = seed_user(&pool, "late@x.com").await;
        let expires = OffsetDateTime::now_utc() - Duration::minutes(1);
        User::set_reset_token(&pool, user.id, "tok123", expires)
            .await
            .expect("set token");

        let updated = User::reset_password(&pool, "late@x.com", "tok123", "$argon2id$new")
            .await
            .expect("query");
        assert!(!updated);
    }

    #[sqlx::test]
    async fn update_profile_rejects_taken_email(pool: PgPool) {
        seed_user(&pool, "a@x.com").await;
        let b = seed_user(&pool, "b@x.com").await;

        let err = User::update_profile(&pool, b.id, "tester", "a@x.com", Role::Client)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let fresh = User::find_by_id(&pool, b.id)
            .await
            .expect("query")
            .expect("user exists");
        assert_eq!(fresh.email, "b@x.com");
    }

    #[sqlx::test]
    async fn delete_cascading_releases_reserved_slots(pool: PgPool) {
        let user = seed_user(&pool, "a@x.com").await;
        let slot = slots::repo::create(&pool, date!(2025 - 01 - 01), time!(09:00), time!(10:00))
            .await
            .expect("seed slot");
        reservations::repo::create(&pool, user.id, slot.id)
            .await
            .expect("reserve");

        assert!(User::delete_cascading(&pool, user.id).await.expect("delete"));

        let available: bool = sqlx::query_scalar("SELECT available FROM slots WHERE id = $1")
            .bind(slot.id)
            .fetch_one(&pool)
            .await
            .expect("slot exists");
        assert!(available);
        assert!(User::find_by_id(&pool, user.id)
            .await
            .expect("query")
            .is_none());

        assert!(!User::delete_cascading(&pool, user.id).await.expect("query"));
    }
}
