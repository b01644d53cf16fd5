// src/db/integration_repo.rs

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::integration::{CrmProvider, DataMapping, Integration, SyncLog, SyncStatus},
};

#[derive(Clone, Default)]
pub struct IntegrationRepository;

impl IntegrationRepository {
    pub fn new() -> Self {
        Self
    }

    // =========================================================================
    //  INTEGRAÇÕES
    // =========================================================================

    pub async fn create<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        provider: CrmProvider,
        name: &str,
        settings: &Value,
    ) -> Result<Integration, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let integration = sqlx::query_as::<_, Integration>(
            r#"
            INSERT INTO integrations (user_id, provider, name, settings)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, provider)
            DO UPDATE SET name = EXCLUDED.name, settings = EXCLUDED.settings, updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(provider)
        .bind(name)
        .bind(settings)
        .fetch_one(executor)
        .await?;

        Ok(integration)
    }

    pub async fn list<'e, E>(&self, executor: E, user_id: Uuid) -> Result<Vec<Integration>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let integrations = sqlx::query_as::<_, Integration>(
            "SELECT * FROM integrations WHERE user_id = $1 ORDER BY created_at ASC",
        )
        .bind(user_id)
        .fetch_all(executor)
        .await?;

        Ok(integrations)
    }

    pub async fn find_by_id<'e, E>(&self, executor: E, user_id: Uuid, id: Uuid) -> Result<Option<Integration>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let integration = sqlx::query_as::<_, Integration>(
            "SELECT * FROM integrations WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

        Ok(integration)
    }

    pub async fn set_active<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        id: Uuid,
        is_active: bool,
    ) -> Result<Option<Integration>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let integration = sqlx::query_as::<_, Integration>(
            r#"
            UPDATE integrations SET is_active = $3, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(is_active)
        .fetch_optional(executor)
        .await?;

        Ok(integration)
    }

    pub async fn touch_synced<'e, E>(&self, executor: E, id: Uuid, at: DateTime<Utc>) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE integrations SET last_synced_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(executor)
            .await?;

        Ok(())
    }

    // =========================================================================
    //  MAPEAMENTOS (id local <-> id remoto)
    // =========================================================================

    pub async fn upsert_mapping<'e, E>(
        &self,
        executor: E,
        integration_id: Uuid,
        entity_type: &str,
        local_id: Uuid,
        remote_id: &str,
    ) -> Result<DataMapping, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let mapping = sqlx::query_as::<_, DataMapping>(
            r#"
            INSERT INTO data_mappings (integration_id, entity_type, local_id, remote_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (integration_id, entity_type, local_id)
            DO UPDATE SET remote_id = EXCLUDED.remote_id, updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(integration_id)
        .bind(entity_type)
        .bind(local_id)
        .bind(remote_id)
        .fetch_one(executor)
        .await?;

        Ok(mapping)
    }

    pub async fn list_mappings<'e, E>(
        &self,
        executor: E,
        integration_id: Uuid,
        entity_type: Option<&str>,
    ) -> Result<Vec<DataMapping>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let mappings = sqlx::query_as::<_, DataMapping>(
            r#"
            SELECT * FROM data_mappings
            WHERE integration_id = $1 AND ($2::text IS NULL OR entity_type = $2)
            ORDER BY entity_type, created_at
            "#,
        )
        .bind(integration_id)
        .bind(entity_type)
        .fetch_all(executor)
        .await?;

        Ok(mappings)
    }

    // =========================================================================
    //  LOGS DE SINCRONIZAÇÃO
    // =========================================================================

    pub async fn create_sync_log<'e, E>(
        &self,
        executor: E,
        integration_id: Uuid,
        operation: &str,
        entity_type: &str,
        entity_id: Option<Uuid>,
    ) -> Result<SyncLog, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let log = sqlx::query_as::<_, SyncLog>(
            r#"
            INSERT INTO sync_logs (integration_id, operation, entity_type, entity_id)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(integration_id)
        .bind(operation)
        .bind(entity_type)
        .bind(entity_id)
        .fetch_one(executor)
        .await?;

        Ok(log)
    }

    pub async fn lock_sync_log<'e, E>(
        &self,
        executor: E,
        integration_id: Uuid,
        id: Uuid,
    ) -> Result<Option<SyncLog>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let log = sqlx::query_as::<_, SyncLog>(
            "SELECT * FROM sync_logs WHERE id = $1 AND integration_id = $2 FOR UPDATE",
        )
        .bind(id)
        .bind(integration_id)
        .fetch_optional(executor)
        .await?;

        Ok(log)
    }

    pub async fn update_sync_log<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        status: SyncStatus,
        retry_count: i32,
        next_retry_at: Option<DateTime<Utc>>,
        error_message: Option<&str>,
    ) -> Result<SyncLog, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let log = sqlx::query_as::<_, SyncLog>(
            r#"
            UPDATE sync_logs
            SET status = $2, retry_count = $3, next_retry_at = $4, error_message = $5, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(retry_count)
        .bind(next_retry_at)
        .bind(error_message)
        .fetch_optional(executor)
        .await?;

        log.ok_or(AppError::SyncLogNotFound)
    }

    pub async fn list_sync_logs<'e, E>(
        &self,
        executor: E,
        integration_id: Uuid,
        limit: i64,
    ) -> Result<Vec<SyncLog>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let logs = sqlx::query_as::<_, SyncLog>(
            r#"
            SELECT * FROM sync_logs
            WHERE integration_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(integration_id)
        .bind(limit)
        .fetch_all(executor)
        .await?;

        Ok(logs)
    }

    /// Falhas cujo próximo retry já venceu, em integrações ativas do usuário.
    pub async fn due_retries<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<SyncLog>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let logs = sqlx::query_as::<_, SyncLog>(
            r#"
            SELECT l.* FROM sync_logs l
            JOIN integrations i ON i.id = l.integration_id
            WHERE i.user_id = $1
              AND i.is_active
              AND l.status = 'failed'
              AND l.next_retry_at <= $2
            ORDER BY l.next_retry_at ASC
            "#,
        )
        .bind(user_id)
        .bind(now)
        .fetch_all(executor)
        .await?;

        Ok(logs)
    }
}
