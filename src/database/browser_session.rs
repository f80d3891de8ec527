use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::browser_session::{BrowserSession, BrowserSessionFilter, BrowserSessionKey, BrowserSessionRequest};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

#[async_trait::async_trait]
pub trait BrowserSessionRepository: Send + Sync {
    /// Short backend name reported by the health endpoint.
    fn backend_name(&self) -> &'static str;
    async fn health_check(&self) -> Result<(), AppError>;

    async fn list_browser_sessions(&self, filter: &BrowserSessionFilter) -> Result<Vec<BrowserSession>, AppError>;
    /// Fails with `Conflict` when a browser session id matches more than one record.
    async fn get_browser_session(&self, key: &BrowserSessionKey) -> Result<Option<BrowserSession>, AppError>;
    async fn create_browser_session(&self, request: &BrowserSessionRequest) -> Result<BrowserSession, AppError>;
    async fn update_browser_session(&self, key: &BrowserSessionKey, request: &BrowserSessionRequest) -> Result<Option<BrowserSession>, AppError>;
    async fn delete_browser_session(&self, key: &BrowserSessionKey) -> Result<bool, AppError>;
}

pub(crate) fn ambiguous_key(key: &BrowserSessionKey) -> AppError {
    AppError::Conflict(format!("More than one browser session matches {}", key))
}

/// Picks the single match out of at most two candidate rows.
pub(crate) fn single_match<T>(key: &BrowserSessionKey, mut rows: Vec<T>) -> Result<Option<T>, AppError> {
    match rows.len() {
        0 => Ok(None),
        1 => Ok(rows.pop()),
        _ => Err(ambiguous_key(key)),
    }
}

const SELECT_COLUMNS: &str = "SELECT id, email, browser_session_id, session_status, created_at FROM browser_session";

impl PostgresRepository {
    /// Resolves `key` to a primary key and locks the row for the rest of `tx`.
    async fn lock_browser_session_id(&self, tx: &mut Transaction<'_, Postgres>, key: &BrowserSessionKey) -> Result<Option<Uuid>, AppError> {
        #[derive(sqlx::FromRow)]
        struct IdRow {
            id: Uuid,
        }

        let rows = match key {
            BrowserSessionKey::Id(id) => {
                sqlx::query_as::<_, IdRow>("SELECT id FROM browser_session WHERE id = $1 FOR UPDATE")
                    .bind(id)
                    .fetch_all(&mut **tx)
                    .await?
            }
            BrowserSessionKey::BrowserSessionId(value) => {
                sqlx::query_as::<_, IdRow>("SELECT id FROM browser_session WHERE browser_session_id = $1 LIMIT 2 FOR UPDATE")
                    .bind(value)
                    .fetch_all(&mut **tx)
                    .await?
            }
        };

        Ok(single_match(key, rows)?.map(|row| row.id))
    }
}

#[async_trait::async_trait]
impl BrowserSessionRepository for PostgresRepository {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn list_browser_sessions(&self, filter: &BrowserSessionFilter) -> Result<Vec<BrowserSession>, AppError> {
        let query = format!(
            r#"
            {}
            WHERE ($1::text IS NULL OR browser_session_id = $1)
              AND ($2::text IS NULL OR email = $2)
            ORDER BY created_at DESC
            "#,
            SELECT_COLUMNS
        );

        let sessions = sqlx::query_as::<_, BrowserSession>(&query)
            .bind(filter.browser_session_id.as_deref())
            .bind(filter.email.as_deref())
            .fetch_all(&self.pool)
            .await?;

        Ok(sessions)
    }

    async fn get_browser_session(&self, key: &BrowserSessionKey) -> Result<Option<BrowserSession>, AppError> {
        let rows = match key {
            BrowserSessionKey::Id(id) => {
                sqlx::query_as::<_, BrowserSession>(&format!("{} WHERE id = $1", SELECT_COLUMNS))
                    .bind(id)
                    .fetch_all(&self.pool)
                    .await?
            }
            BrowserSessionKey::BrowserSessionId(value) => {
                sqlx::query_as::<_, BrowserSession>(&format!("{} WHERE browser_session_id = $1 LIMIT 2", SELECT_COLUMNS))
                    .bind(value)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        single_match(key, rows)
    }

    async fn create_browser_session(&self, request: &BrowserSessionRequest) -> Result<BrowserSession, AppError> {
        let session = sqlx::query_as::<_, BrowserSession>(
            r#"
            INSERT INTO browser_session (email, browser_session_id, session_status)
            VALUES ($1, $2, $3)
            RETURNING id, email, browser_session_id, session_status, created_at
            "#,
        )
        .bind(request.email_value())
        .bind(request.browser_session_id_value())
        .bind(request.session_status_value())
        .fetch_one(&self.pool)
        .await?;

        Ok(session)
    }

    async fn update_browser_session(&self, key: &BrowserSessionKey, request: &BrowserSessionRequest) -> Result<Option<BrowserSession>, AppError> {
        let mut tx = self.pool.begin().await?;

        let Some(id) = self.lock_browser_session_id(&mut tx, key).await? else {
            return Ok(None);
        };

        // created_at is never part of the SET list
        let session = sqlx::query_as::<_, BrowserSession>(
            r#"
            UPDATE browser_session
            SET email = COALESCE($2, email),
                browser_session_id = CASE WHEN $3 THEN $4 ELSE browser_session_id END,
                session_status = CASE WHEN $5 THEN $6 ELSE session_status END
            WHERE id = $1
            RETURNING id, email, browser_session_id, session_status, created_at
            "#,
        )
        .bind(id)
        .bind(request.email.as_ref().and_then(|e| e.as_deref()))
        .bind(request.browser_session_id.is_some())
        .bind(request.browser_session_id_value())
        .bind(request.session_status.is_some())
        .bind(request.session_status_value())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(session))
    }

    async fn delete_browser_session(&self, key: &BrowserSessionKey) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let Some(id) = self.lock_browser_session_id(&mut tx, key).await? else {
            return Ok(false);
        };

        sqlx::query("DELETE FROM browser_session WHERE id = $1").bind(id).execute(&mut *tx).await?;

        tx.commit().await?;
        Ok(true)
    }
}
