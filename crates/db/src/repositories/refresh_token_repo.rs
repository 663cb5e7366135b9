//! Repository for the `refresh_tokens` table.

use crou_core::types::DbId;
use sqlx::PgPool;

use crate::models::refresh_token::{CreateRefreshToken, RefreshToken};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, user_id, token_hash, expires_at, is_revoked, replaced_by_id, \
                       user_agent, ip_address, created_at, updated_at";

/// Provides storage and rotation for refresh tokens.
pub struct RefreshTokenRepo;

impl RefreshTokenRepo {
    pub async fn create(
        pool: &PgPool,
        input: &CreateRefreshToken,
    ) -> Result<RefreshToken, sqlx::Error> {
        let query = format!(
            "INSERT INTO refresh_tokens (user_id, token_hash, expires_at, user_agent, ip_address)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, RefreshToken>(&query)
            .bind(input.user_id)
            .bind(&input.token_hash)
            .bind(input.expires_at)
            .bind(&input.user_agent)
            .bind(&input.ip_address)
            .fetch_one(pool)
            .await
    }

    /// Find a usable token by hash: not revoked and not expired.
    pub async fn find_active_by_hash(
        pool: &PgPool,
        hash: &str,
    ) -> Result<Option<RefreshToken>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM refresh_tokens
             WHERE token_hash = $1
               AND is_revoked = false
               AND expires_at > NOW()"
        );
        sqlx::query_as::<_, RefreshToken>(&query)
            .bind(hash)
            .fetch_optional(pool)
            .await
    }

    /// Exchange the token hashed as `old_hash` for `replacement`.
    ///
    /// The old token is revoked with a conditional update, so of two
    /// concurrent rotations of the same token exactly one gets `Some`.
    /// Returns the revoked token and the new one.
    pub async fn rotate(
        pool: &PgPool,
        old_hash: &str,
        replacement: &CreateRefreshToken,
    ) -> Result<Option<(RefreshToken, RefreshToken)>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let revoke = format!(
            "UPDATE refresh_tokens SET is_revoked = true
             WHERE token_hash = $1 AND is_revoked = false AND expires_at > NOW()
             RETURNING {COLUMNS}"
        );
        let Some(old) = sqlx::query_as::<_, RefreshToken>(&revoke)
            .bind(old_hash)
            .fetch_optional(&mut *tx)
            .await?
        else {
            tx.rollback().await?;
            return Ok(None);
        };

        let insert = format!(
            "INSERT INTO refresh_tokens (user_id, token_hash, expires_at, user_agent, ip_address)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        let new = sqlx::query_as::<_, RefreshToken>(&insert)
            .bind(old.user_id)
            .bind(&replacement.token_hash)
            .bind(replacement.expires_at)
            .bind(&replacement.user_agent)
            .bind(&replacement.ip_address)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query("UPDATE refresh_tokens SET replaced_by_id = $2 WHERE id = $1")
            .bind(old.id)
            .bind(new.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some((old, new)))
    }

    /// Revoke all active tokens for a user. Returns the count of revoked tokens.
    pub async fn revoke_all_for_user(pool: &PgPool, user_id: DbId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET is_revoked = true
             WHERE user_id = $1 AND is_revoked = false",
        )
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete tokens past their expiry, revoked or not. Revoked tokens are
    /// kept until then so the rotation chain stays inspectable.
    /// Returns the count of deleted rows.
    pub async fn cleanup_expired(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < NOW()")
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
