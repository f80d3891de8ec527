//! In-memory browser session storage.

use crate::database::browser_session::{BrowserSessionRepository, single_match};
use crate::error::app_error::AppError;
use crate::models::browser_session::{BrowserSession, BrowserSessionFilter, BrowserSessionKey, BrowserSessionRequest};
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Keeps every record in a vector behind an async lock.
///
/// Useful for local development and for exercising the HTTP layer in tests.
/// Data is lost on restart.
#[derive(Default)]
pub struct InMemoryRepository {
    sessions: RwLock<Vec<BrowserSession>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Positions of the records matching `key`, capped at two.
fn matching_positions(sessions: &[BrowserSession], key: &BrowserSessionKey) -> Vec<usize> {
    sessions
        .iter()
        .enumerate()
        .filter(|(_, s)| key.matches(s))
        .map(|(i, _)| i)
        .take(2)
        .collect()
}

#[async_trait::async_trait]
impl BrowserSessionRepository for InMemoryRepository {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn list_browser_sessions(&self, filter: &BrowserSessionFilter) -> Result<Vec<BrowserSession>, AppError> {
        let sessions = self.sessions.read().await;

        let mut result: Vec<BrowserSession> = sessions.iter().filter(|s| filter.matches(s)).cloned().collect();

        // Sort by created_at descending
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(result)
    }

    async fn get_browser_session(&self, key: &BrowserSessionKey) -> Result<Option<BrowserSession>, AppError> {
        let sessions = self.sessions.read().await;
        let matches: Vec<&BrowserSession> = sessions.iter().filter(|s| key.matches(s)).take(2).collect();
        Ok(single_match(key, matches)?.cloned())
    }

    async fn create_browser_session(&self, request: &BrowserSessionRequest) -> Result<BrowserSession, AppError> {
        let session = BrowserSession {
            id: Uuid::new_v4(),
            email: request.email_value().to_string(),
            browser_session_id: request.browser_session_id_value().map(str::to_string),
            session_status: request.session_status_value().map(str::to_string),
            created_at: Utc::now().date_naive(),
        };

        self.sessions.write().await.push(session.clone());

        Ok(session)
    }

    async fn update_browser_session(&self, key: &BrowserSessionKey, request: &BrowserSessionRequest) -> Result<Option<BrowserSession>, AppError> {
        let mut sessions = self.sessions.write().await;

        let Some(position) = single_match(key, matching_positions(&sessions, key))? else {
            return Ok(None);
        };

        let session = &mut sessions[position];
        request.apply_to(session);

        Ok(Some(session.clone()))
    }

    async fn delete_browser_session(&self, key: &BrowserSessionKey) -> Result<bool, AppError> {
        let mut sessions = self.sessions.write().await;

        let Some(position) = single_match(key, matching_positions(&sessions, key))? else {
            return Ok(false);
        };

        sessions.remove(position);
        Ok(true)
    }
}
