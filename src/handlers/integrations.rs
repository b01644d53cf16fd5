// src/handlers/integrations.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{
        db_utils::begin_user_tx,
        error::{ApiError, AppError},
        response::ApiResponse,
    },
    config::AppState,
    middleware::{i18n::Locale, user::UserContext},
    models::integration::{CrmProvider, DataMapping, Integration, SyncLog},
};

fn default_settings() -> Value {
    Value::Object(Default::default())
}

fn default_log_limit() -> i64 {
    50
}

// ---
// Payloads
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct IntegrationPayload {
    pub provider: CrmProvider,

    #[validate(length(min = 1, max = 100, message = "required"))]
    #[schema(example = "HubSpot principal")]
    pub name: String,

    #[serde(default = "default_settings")]
    #[schema(value_type = Object)]
    pub settings: Value,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivePayload {
    pub is_active: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MappingPayload {
    #[validate(length(min = 1, max = 50, message = "required"))]
    #[schema(example = "client")]
    pub entity_type: String,

    pub local_id: Uuid,

    #[validate(length(min = 1, max = 255, message = "required"))]
    #[schema(example = "hs-4521")]
    pub remote_id: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncAttemptPayload {
    #[validate(length(min = 1, max = 50, message = "required"))]
    #[schema(example = "push")]
    pub operation: String,

    #[validate(length(min = 1, max = 50, message = "required"))]
    #[schema(example = "invoice")]
    pub entity_type: String,

    pub entity_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncFailurePayload {
    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "HTTP 503 do provedor")]
    pub error_message: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct MappingQuery {
    pub entity_type: Option<String>,
}

#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SyncLogQuery {
    #[validate(range(min = 1, max = 500, message = "out_of_range"))]
    #[serde(default = "default_log_limit")]
    #[param(default = 50, minimum = 1, maximum = 500)]
    pub limit: i64,
}

// =============================================================================
//  INTEGRAÇÕES
// =============================================================================

// GET /api/integrations
#[utoipa::path(
    get,
    path = "/api/integrations",
    tag = "Integrations",
    responses(
        (status = 200, description = "Integrações do usuário", body = Vec<Integration>)
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "Dono dos dados")
    )
)]
pub async fn list_integrations(
    State(app_state): State<AppState>,
    locale: Locale,
    user: UserContext,
) -> Result<impl IntoResponse, ApiError> {
    let result: Result<_, AppError> = async {
        let mut tx = begin_user_tx(&app_state, &user).await?;
        let integrations = app_state.sync_service.list_integrations(&mut *tx, user.0).await?;
        tx.commit().await?;
        Ok(integrations)
    }
    .await;

    let integrations = result.map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(integrations))))
}

// POST /api/integrations
#[utoipa::path(
    post,
    path = "/api/integrations",
    tag = "Integrations",
    request_body = IntegrationPayload,
    responses(
        (status = 201, description = "Integração criada (ou reconfigurada)", body = Integration),
        (status = 400, description = "Dados inválidos")
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "Dono dos dados")
    )
)]
pub async fn create_integration(
    State(app_state): State<AppState>,
    locale: Locale,
    user: UserContext,
    Json(payload): Json<IntegrationPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let result: Result<_, AppError> = async {
        let mut tx = begin_user_tx(&app_state, &user).await?;
        let integration = app_state
            .sync_service
            .create_integration(
                &mut *tx,
                user.0,
                payload.provider,
                payload.name.trim(),
                &payload.settings,
            )
            .await?;
        tx.commit().await?;
        Ok(integration)
    }
    .await;

    let integration = result.map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(integration))))
}

// GET /api/integrations/{id}
#[utoipa::path(
    get,
    path = "/api/integrations/{id}",
    tag = "Integrations",
    responses(
        (status = 200, description = "Integração", body = Integration),
        (status = 404, description = "Integração não encontrada")
    ),
    params(
        ("id" = Uuid, Path, description = "ID da integração"),
        ("x-user-id" = Uuid, Header, description = "Dono dos dados")
    )
)]
pub async fn get_integration(
    State(app_state): State<AppState>,
    locale: Locale,
    user: UserContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let result: Result<_, AppError> = async {
        let mut tx = begin_user_tx(&app_state, &user).await?;
        let integration = app_state.sync_service.get_integration(&mut *tx, user.0, id).await?;
        tx.commit().await?;
        Ok(integration)
    }
    .await;

    let integration = result.map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(integration))))
}

// PUT /api/integrations/{id}/active
#[utoipa::path(
    put,
    path = "/api/integrations/{id}/active",
    tag = "Integrations",
    request_body = ActivePayload,
    responses(
        (status = 200, description = "Integração ativada/desativada", body = Integration),
        (status = 404, description = "Integração não encontrada")
    ),
    params(
        ("id" = Uuid, Path, description = "ID da integração"),
        ("x-user-id" = Uuid, Header, description = "Dono dos dados")
    )
)]
pub async fn set_integration_active(
    State(app_state): State<AppState>,
    locale: Locale,
    user: UserContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<ActivePayload>,
) -> Result<impl IntoResponse, ApiError> {
    let result: Result<_, AppError> = async {
        let mut tx = begin_user_tx(&app_state, &user).await?;
        let integration = app_state
            .sync_service
            .set_active(&mut *tx, user.0, id, payload.is_active)
            .await?;
        tx.commit().await?;
        Ok(integration)
    }
    .await;

    let integration = result.map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(integration))))
}

// =============================================================================
//  MAPEAMENTOS
// =============================================================================

// GET /api/integrations/{id}/mappings
#[utoipa::path(
    get,
    path = "/api/integrations/{id}/mappings",
    tag = "Integrations",
    params(
        ("id" = Uuid, Path, description = "ID da integração"),
        MappingQuery,
        ("x-user-id" = Uuid, Header, description = "Dono dos dados")
    ),
    responses(
        (status = 200, description = "IDs locais e remotos", body = Vec<DataMapping>),
        (status = 404, description = "Integração não encontrada")
    )
)]
pub async fn list_mappings(
    State(app_state): State<AppState>,
    locale: Locale,
    user: UserContext,
    Path(id): Path<Uuid>,
    Query(query): Query<MappingQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let result: Result<_, AppError> = async {
        let mut tx = begin_user_tx(&app_state, &user).await?;
        let mappings = app_state
            .sync_service
            .list_mappings(&mut *tx, user.0, id, query.entity_type.as_deref())
            .await?;
        tx.commit().await?;
        Ok(mappings)
    }
    .await;

    let mappings = result.map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(mappings))))
}

// PUT /api/integrations/{id}/mappings
#[utoipa::path(
    put,
    path = "/api/integrations/{id}/mappings",
    tag = "Integrations",
    request_body = MappingPayload,
    responses(
        (status = 200, description = "Mapeamento gravado", body = DataMapping),
        (status = 403, description = "Integração desativada"),
        (status = 404, description = "Integração não encontrada")
    ),
    params(
        ("id" = Uuid, Path, description = "ID da integração"),
        ("x-user-id" = Uuid, Header, description = "Dono dos dados")
    )
)]
pub async fn upsert_mapping(
    State(app_state): State<AppState>,
    locale: Locale,
    user: UserContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<MappingPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let result: Result<_, AppError> = async {
        let mut tx = begin_user_tx(&app_state, &user).await?;
        let mapping = app_state
            .sync_service
            .upsert_mapping(
                &mut *tx,
                user.0,
                id,
                payload.entity_type.trim(),
                payload.local_id,
                payload.remote_id.trim(),
            )
            .await?;
        tx.commit().await?;
        Ok(mapping)
    }
    .await;

    let mapping = result.map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(mapping))))
}

// =============================================================================
//  LOGS DE SINCRONIZAÇÃO
// =============================================================================

// GET /api/integrations/{id}/sync-logs
#[utoipa::path(
    get,
    path = "/api/integrations/{id}/sync-logs",
    tag = "Integrations",
    params(
        ("id" = Uuid, Path, description = "ID da integração"),
        SyncLogQuery,
        ("x-user-id" = Uuid, Header, description = "Dono dos dados")
    ),
    responses(
        (status = 200, description = "Logs mais recentes primeiro", body = Vec<SyncLog>),
        (status = 404, description = "Integração não encontrada")
    )
)]
pub async fn list_sync_logs(
    State(app_state): State<AppState>,
    locale: Locale,
    user: UserContext,
    Path(id): Path<Uuid>,
    Query(query): Query<SyncLogQuery>,
) -> Result<impl IntoResponse, ApiError> {
    query
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let result: Result<_, AppError> = async {
        let mut tx = begin_user_tx(&app_state, &user).await?;
        let logs = app_state
            .sync_service
            .list_sync_logs(&mut *tx, user.0, id, query.limit)
            .await?;
        tx.commit().await?;
        Ok(logs)
    }
    .await;

    let logs = result.map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(logs))))
}

// POST /api/integrations/{id}/sync-logs
#[utoipa::path(
    post,
    path = "/api/integrations/{id}/sync-logs",
    tag = "Integrations",
    request_body = SyncAttemptPayload,
    responses(
        (status = 201, description = "Tentativa registrada como pendente", body = SyncLog),
        (status = 403, description = "Integração desativada"),
        (status = 404, description = "Integração não encontrada")
    ),
    params(
        ("id" = Uuid, Path, description = "ID da integração"),
        ("x-user-id" = Uuid, Header, description = "Dono dos dados")
    )
)]
pub async fn record_sync_attempt(
    State(app_state): State<AppState>,
    locale: Locale,
    user: UserContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<SyncAttemptPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let result: Result<_, AppError> = async {
        let mut tx = begin_user_tx(&app_state, &user).await?;
        let log = app_state
            .sync_service
            .record_attempt(
                &mut *tx,
                user.0,
                id,
                payload.operation.trim(),
                payload.entity_type.trim(),
                payload.entity_id,
            )
            .await?;
        tx.commit().await?;
        Ok(log)
    }
    .await;

    let log = result.map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(log))))
}

// POST /api/integrations/{id}/sync-logs/{log_id}/complete
#[utoipa::path(
    post,
    path = "/api/integrations/{id}/sync-logs/{log_id}/complete",
    tag = "Integrations",
    responses(
        (status = 200, description = "Sincronização concluída", body = SyncLog),
        (status = 404, description = "Integração ou log não encontrado")
    ),
    params(
        ("id" = Uuid, Path, description = "ID da integração"),
        ("log_id" = Uuid, Path, description = "ID do log"),
        ("x-user-id" = Uuid, Header, description = "Dono dos dados")
    )
)]
pub async fn complete_sync(
    State(app_state): State<AppState>,
    locale: Locale,
    user: UserContext,
    Path((id, log_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let result: Result<_, AppError> = async {
        let mut tx = begin_user_tx(&app_state, &user).await?;
        let log = app_state
            .sync_service
            .complete(&mut *tx, user.0, id, log_id, Utc::now())
            .await?;
        tx.commit().await?;
        Ok(log)
    }
    .await;

    let log = result.map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(log))))
}

// POST /api/integrations/{id}/sync-logs/{log_id}/fail
#[utoipa::path(
    post,
    path = "/api/integrations/{id}/sync-logs/{log_id}/fail",
    tag = "Integrations",
    request_body = SyncFailurePayload,
    responses(
        (status = 200, description = "Falha registrada; nova tentativa agendada ou abandonada", body = SyncLog),
        (status = 404, description = "Integração ou log não encontrado")
    ),
    params(
        ("id" = Uuid, Path, description = "ID da integração"),
        ("log_id" = Uuid, Path, description = "ID do log"),
        ("x-user-id" = Uuid, Header, description = "Dono dos dados")
    )
)]
pub async fn fail_sync(
    State(app_state): State<AppState>,
    locale: Locale,
    user: UserContext,
    Path((id, log_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<SyncFailurePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let result: Result<_, AppError> = async {
        let mut tx = begin_user_tx(&app_state, &user).await?;
        let log = app_state
            .sync_service
            .fail(&mut *tx, user.0, id, log_id, &payload.error_message, Utc::now())
            .await?;
        tx.commit().await?;
        Ok(log)
    }
    .await;

    let log = result.map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(log))))
}

// GET /api/integrations/sync-logs/due
#[utoipa::path(
    get,
    path = "/api/integrations/sync-logs/due",
    tag = "Integrations",
    responses(
        (status = 200, description = "Logs prontos para nova tentativa", body = Vec<SyncLog>)
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "Dono dos dados")
    )
)]
pub async fn list_due_retries(
    State(app_state): State<AppState>,
    locale: Locale,
    user: UserContext,
) -> Result<impl IntoResponse, ApiError> {
    let result: Result<_, AppError> = async {
        let mut tx = begin_user_tx(&app_state, &user).await?;
        let logs = app_state.sync_service.due_retries(&mut *tx, user.0, Utc::now()).await?;
        tx.commit().await?;
        Ok(logs)
    }
    .await;

    let logs = result.map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(logs))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn settings_default_to_empty_object() {
        let p: IntegrationPayload =
            serde_json::from_value(json!({ "provider": "hubspot", "name": "CRM" })).unwrap();
        assert_eq!(p.settings, json!({}));
        assert!(p.validate().is_ok());
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let p = serde_json::from_value::<IntegrationPayload>(json!({ "provider": "zoho", "name": "CRM" }));
        assert!(p.is_err());
    }

    #[test]
    fn log_limit_is_bounded() {
        let q: SyncLogQuery = serde_json::from_value(json!({})).unwrap();
        assert_eq!(q.limit, 50);
        let q: SyncLogQuery = serde_json::from_value(json!({ "limit": 1000 })).unwrap();
        assert!(q.validate().is_err());
    }
}
