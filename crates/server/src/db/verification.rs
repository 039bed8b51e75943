//! Verification token repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use gamelink_core::{LinkToken, UserId};

use super::users::write_link;
use super::{RepositoryError, conflict_on_unique};
use crate::models::{
    DiscordIdentity, GameLink, NewVerificationToken, TokenState, VerificationToken,
};
use crate::store::{CompleteLinkOutcome, TokenRejection, VerificationStore};

/// Internal row type for `PostgreSQL` verification token queries.
#[derive(Debug, sqlx::FromRow)]
struct TokenRow {
    token: String,
    discord_id: String,
    discord_username: String,
    expires_at: DateTime<Utc>,
    used: bool,
    used_by: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<TokenRow> for VerificationToken {
    type Error = RepositoryError;

    fn try_from(row: TokenRow) -> Result<Self, Self::Error> {
        let token = LinkToken::parse(&row.token).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid token in database: {e}"))
        })?;

        Ok(Self {
            token,
            discord: DiscordIdentity {
                discord_id: row.discord_id,
                discord_username: row.discord_username,
            },
            expires_at: row.expires_at,
            used: row.used,
            used_by: row.used_by.map(UserId::new),
            created_at: row.created_at,
        })
    }
}

async fn fetch_token(
    conn: &mut PgConnection,
    token: &LinkToken,
) -> Result<Option<VerificationToken>, RepositoryError> {
    let row = sqlx::query_as::<_, TokenRow>(
        r"
        SELECT token, discord_id, discord_username, expires_at, used, used_by, created_at
        FROM gamelink.verification_token
        WHERE token = $1
        ",
    )
    .bind(token.as_str())
    .fetch_optional(conn)
    .await?;

    row.map(TryInto::try_into).transpose()
}

/// Repository for verification token database operations.
#[derive(Clone)]
pub struct PgVerificationRepository {
    pool: PgPool,
}

impl PgVerificationRepository {
    /// Create a new verification token repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VerificationStore for PgVerificationRepository {
    async fn create(
        &self,
        token: &NewVerificationToken,
    ) -> Result<VerificationToken, RepositoryError> {
        let row = sqlx::query_as::<_, TokenRow>(
            r"
            INSERT INTO gamelink.verification_token
                (token, discord_id, discord_username, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING token, discord_id, discord_username, expires_at, used, used_by, created_at
            ",
        )
        .bind(token.token.as_str())
        .bind(&token.discord.discord_id)
        .bind(&token.discord.discord_username)
        .bind(token.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "verification token already exists"))?;

        row.try_into()
    }

    async fn get(&self, token: &LinkToken) -> Result<Option<VerificationToken>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch_token(&mut conn, token).await
    }

    async fn complete_link(
        &self,
        token: &LinkToken,
        user: UserId,
        link: &GameLink,
    ) -> Result<CompleteLinkOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if !lock_user(&mut *tx, user).await? {
            tx.rollback().await?;
            return Err(RepositoryError::NotFound);
        }

        let consumed = sqlx::query(
            r"
            UPDATE gamelink.verification_token
            SET used = TRUE, used_by = $2, used_at = NOW()
            WHERE token = $1 AND NOT used AND expires_at > NOW()
            ",
        )
        .bind(token.as_str())
        .bind(user.as_uuid())
        .execute(&mut *tx)
        .await?
        .rows_affected()
            == 1;

        if !consumed {
            let rejection = match fetch_token(&mut *tx, token).await? {
                None => TokenRejection::Missing,
                Some(t) if t.used => TokenRejection::Unusable(TokenState::Used),
                Some(_) => TokenRejection::Unusable(TokenState::Expired),
            };
            tx.rollback().await?;
            return Ok(CompleteLinkOutcome::TokenRejected(rejection));
        }

        if !write_link(&mut *tx, user, link).await? {
            tx.rollback().await?;
            return Ok(CompleteLinkOutcome::AlreadyLinked);
        }

        tx.commit().await?;
        Ok(CompleteLinkOutcome::Linked)
    }
}

/// Share-lock the user row so it outlives the transaction. Returns `false` if
/// there is no such user.
async fn lock_user(conn: &mut PgConnection, id: UserId) -> Result<bool, RepositoryError> {
    let row: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM gamelink.users WHERE id = $1 FOR SHARE")
            .bind(id.as_uuid())
            .fetch_optional(conn)
            .await?;
    Ok(row.is_some())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_row_converts() {
        let user = Uuid::new_v4();
        let row = TokenRow {
            token: "abc123".to_string(),
            discord_id: "42".to_string(),
            discord_username: "player".to_string(),
            expires_at: Utc::now(),
            used: true,
            used_by: Some(user),
            created_at: Utc::now(),
        };
        let token = VerificationToken::try_from(row).unwrap();
        assert_eq!(token.token.as_str(), "abc123");
        assert_eq!(token.used_by, Some(UserId::new(user)));
    }

    #[test]
    fn test_invalid_token_is_corruption() {
        let row = TokenRow {
            token: "has space".to_string(),
            discord_id: "42".to_string(),
            discord_username: "player".to_string(),
            expires_at: Utc::now(),
            used: false,
            used_by: None,
            created_at: Utc::now(),
        };
        assert!(matches!(
            VerificationToken::try_from(row),
            Err(RepositoryError::DataCorruption(_))
        ));
    }
}
