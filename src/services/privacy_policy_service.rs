//! Privacy policy document: a single current row.

use crate::{
    errors::{ShopError, ShopResult},
    models::privacy_policy::PrivacyPolicy,
};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{info, instrument};

pub struct PrivacyPolicyService {
    db: SqlitePool,
}

impl PrivacyPolicyService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    async fn latest(&self) -> ShopResult<Option<PrivacyPolicy>> {
        Ok(sqlx::query_as::<_, PrivacyPolicy>(
            "SELECT id, content, updated_at FROM privacy_policy
             ORDER BY updated_at DESC, id DESC LIMIT 1",
        )
        .fetch_optional(&self.db)
        .await?)
    }

    pub async fn get(&self) -> ShopResult<PrivacyPolicy> {
        self.latest()
            .await?
            .ok_or_else(|| ShopError::NotFound("Privacy policy not found".into()))
    }

    /// Create the policy, or replace the content of the current one.
    #[instrument(skip(self, content), fields(len = content.len()))]
    pub async fn save(&self, content: &str) -> ShopResult<PrivacyPolicy> {
        if content.trim().is_empty() {
            return Err(ShopError::validation(
                "content: must be a non-empty string",
            ));
        }
        let today = Utc::now().date_naive();

        let saved = match self.latest().await? {
            Some(current) => {
                sqlx::query_as::<_, PrivacyPolicy>(
                    "UPDATE privacy_policy SET content = ?, updated_at = ?
                     WHERE id = ? RETURNING id, content, updated_at",
                )
                .bind(content)
                .bind(today)
                .bind(current.id)
                .fetch_one(&self.db)
                .await?
            }
            None => {
                sqlx::query_as::<_, PrivacyPolicy>(
                    "INSERT INTO privacy_policy (content, updated_at)
                     VALUES (?, ?) RETURNING id, content, updated_at",
                )
                .bind(content)
                .bind(today)
                .fetch_one(&self.db)
                .await?
            }
        };
        info!(id = saved.id, "privacy policy saved");
        Ok(saved)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> ShopResult<PrivacyPolicy> {
        sqlx::query_as::<_, PrivacyPolicy>(
            "DELETE FROM privacy_policy WHERE id = ? RETURNING id, content, updated_at",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| ShopError::NotFound(format!("Privacy policy `{id}` not found")))
    }
}
