// src/services/sync_service.rs

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use sqlx::{Acquire, Executor, PgConnection, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::IntegrationRepository,
    models::integration::{CrmProvider, DataMapping, Integration, SyncLog, SyncStatus},
};

/// Teto do expoente do backoff (2^16 min ~ 45 dias).
const MAX_BACKOFF_EXPONENT: i32 = 16;

/// Próxima tentativa: `now + 2^retry_count` minutos.
pub fn next_retry_at(now: DateTime<Utc>, retry_count: i32) -> DateTime<Utc> {
    let exponent = retry_count.clamp(0, MAX_BACKOFF_EXPONENT) as u32;
    now + Duration::minutes(2_i64.pow(exponent))
}

/// Resultado de uma falha: novo contador, status e agenda.
pub fn schedule_failure(
    retry_count: i32,
    max_retries: i32,
    now: DateTime<Utc>,
) -> (i32, SyncStatus, Option<DateTime<Utc>>) {
    let retries = retry_count + 1;
    if retries >= max_retries {
        (retries, SyncStatus::Abandoned, None)
    } else {
        (retries, SyncStatus::Failed, Some(next_retry_at(now, retries)))
    }
}

#[derive(Clone)]
pub struct SyncService {
    repo: IntegrationRepository,
    max_retries: i32,
}

impl SyncService {
    pub fn new(repo: IntegrationRepository, max_retries: i32) -> Self {
        Self { repo, max_retries }
    }

    async fn active_integration(
        &self,
        conn: &mut PgConnection,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Integration, AppError> {
        let integration = self
            .repo
            .find_by_id(conn, user_id, id)
            .await?
            .ok_or(AppError::IntegrationNotFound)?;
        if !integration.is_active {
            return Err(AppError::IntegrationInactive);
        }
        Ok(integration)
    }

    // --- INTEGRAÇÕES ---

    pub async fn create_integration<'e, E>(
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
        let integration = self.repo.create(executor, user_id, provider, name, settings).await?;
        tracing::info!(user_id = %user_id, integration_id = %integration.id, provider = ?provider, "Integração configurada");
        Ok(integration)
    }

    pub async fn list_integrations<'e, E>(&self, executor: E, user_id: Uuid) -> Result<Vec<Integration>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo.list(executor, user_id).await
    }

    pub async fn get_integration<'e, E>(&self, executor: E, user_id: Uuid, id: Uuid) -> Result<Integration, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo
            .find_by_id(executor, user_id, id)
            .await?
            .ok_or(AppError::IntegrationNotFound)
    }

    pub async fn set_active<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        id: Uuid,
        is_active: bool,
    ) -> Result<Integration, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo
            .set_active(executor, user_id, id, is_active)
            .await?
            .ok_or(AppError::IntegrationNotFound)
    }

    // --- MAPEAMENTOS ---

    pub async fn upsert_mapping<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        integration_id: Uuid,
        entity_type: &str,
        local_id: Uuid,
        remote_id: &str,
    ) -> Result<DataMapping, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres, Connection = &'e mut PgConnection>,
    {
        let mut conn = executor.acquire().await?;
        self.active_integration(&mut *conn, user_id, integration_id).await?;

        self.repo
            .upsert_mapping(&mut *conn, integration_id, entity_type, local_id, remote_id)
            .await
    }

    pub async fn list_mappings<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        integration_id: Uuid,
        entity_type: Option<&str>,
    ) -> Result<Vec<DataMapping>, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres, Connection = &'e mut PgConnection>,
    {
        let mut conn = executor.acquire().await?;
        self.repo
            .find_by_id(&mut *conn, user_id, integration_id)
            .await?
            .ok_or(AppError::IntegrationNotFound)?;

        self.repo.list_mappings(&mut *conn, integration_id, entity_type).await
    }

    // --- LOGS DE SINCRONIZAÇÃO ---

    /// Abre um log `pending` para uma tentativa de sincronização.
    pub async fn record_attempt<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        integration_id: Uuid,
        operation: &str,
        entity_type: &str,
        entity_id: Option<Uuid>,
    ) -> Result<SyncLog, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres, Connection = &'e mut PgConnection>,
    {
        let mut conn = executor.acquire().await?;
        self.active_integration(&mut *conn, user_id, integration_id).await?;

        self.repo
            .create_sync_log(&mut *conn, integration_id, operation, entity_type, entity_id)
            .await
    }

    pub async fn complete<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        integration_id: Uuid,
        log_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<SyncLog, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        self.get_integration(&mut *tx, user_id, integration_id).await?;
        let current = self
            .repo
            .lock_sync_log(&mut *tx, integration_id, log_id)
            .await?
            .ok_or(AppError::SyncLogNotFound)?;

        let log = self
            .repo
            .update_sync_log(&mut *tx, log_id, SyncStatus::Success, current.retry_count, None, None)
            .await?;
        self.repo.touch_synced(&mut *tx, integration_id, now).await?;

        tx.commit().await?;
        Ok(log)
    }

    /// Registra a falha e agenda o retry com backoff exponencial. Passado o
    /// limite de tentativas, o log é abandonado.
    pub async fn fail<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        integration_id: Uuid,
        log_id: Uuid,
        error_message: &str,
        now: DateTime<Utc>,
    ) -> Result<SyncLog, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        self.get_integration(&mut *tx, user_id, integration_id).await?;
        let current = self
            .repo
            .lock_sync_log(&mut *tx, integration_id, log_id)
            .await?
            .ok_or(AppError::SyncLogNotFound)?;

        let (retries, status, next_retry) = schedule_failure(current.retry_count, self.max_retries, now);
        let log = self
            .repo
            .update_sync_log(&mut *tx, log_id, status, retries, next_retry, Some(error_message))
            .await?;

        tx.commit().await?;

        tracing::warn!(
            integration_id = %integration_id,
            sync_log_id = %log_id,
            retry_count = retries,
            status = ?status,
            "Falha de sincronização"
        );
        Ok(log)
    }

    pub async fn list_sync_logs<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        integration_id: Uuid,
        limit: i64,
    ) -> Result<Vec<SyncLog>, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres, Connection = &'e mut PgConnection>,
    {
        let mut conn = executor.acquire().await?;
        self.get_integration(&mut *conn, user_id, integration_id).await?;

        self.repo.list_sync_logs(&mut *conn, integration_id, limit).await
    }

    pub async fn due_retries<'e, E>(&self, executor: E, user_id: Uuid, now: DateTime<Utc>) -> Result<Vec<SyncLog>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo.due_retries(executor, user_id, now).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn backoff_doubles_each_retry() {
        assert_eq!(next_retry_at(now(), 0), now() + Duration::minutes(1));
        assert_eq!(next_retry_at(now(), 1), now() + Duration::minutes(2));
        assert_eq!(next_retry_at(now(), 3), now() + Duration::minutes(8));
        assert_eq!(next_retry_at(now(), 10), now() + Duration::minutes(1024));
    }

    #[test]
    fn backoff_is_capped() {
        assert_eq!(next_retry_at(now(), 40), next_retry_at(now(), MAX_BACKOFF_EXPONENT));
        assert_eq!(next_retry_at(now(), -1), now() + Duration::minutes(1));
    }

    #[test]
    fn failures_schedule_until_abandoned() {
        let (retries, status, next) = schedule_failure(0, 3, now());
        assert_eq!(retries, 1);
        assert_eq!(status, SyncStatus::Failed);
        assert_eq!(next, Some(now() + Duration::minutes(2)));

        let (retries, status, next) = schedule_failure(2, 3, now());
        assert_eq!(retries, 3);
        assert_eq!(status, SyncStatus::Abandoned);
        assert_eq!(next, None);
    }
}
