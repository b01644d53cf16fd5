// src/handlers/clients.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    common::{
        db_utils::begin_user_tx,
        error::{ApiError, AppError},
        response::ApiResponse,
    },
    config::AppState,
    middleware::{i18n::Locale, user::UserContext},
    models::client::{Client, ClientFields},
    services::client_service::{is_valid_siren, is_valid_siret, is_valid_vat_number, siret_matches_siren},
};

// ---
// Validações customizadas (identificadores franceses)
// ---
fn validate_siren(value: &str) -> Result<(), ValidationError> {
    if is_valid_siren(value.trim()) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_siren"))
    }
}

fn validate_siret(value: &str) -> Result<(), ValidationError> {
    if is_valid_siret(value.trim()) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_siret"))
    }
}

fn validate_vat(value: &str) -> Result<(), ValidationError> {
    if is_valid_vat_number(value) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_vat_number"))
    }
}

fn validate_identifiers(payload: &ClientPayload) -> Result<(), ValidationError> {
    if let (Some(siret), Some(siren)) = (&payload.siret, &payload.siren) {
        if !siret_matches_siren(siret.trim(), siren.trim()) {
            return Err(ValidationError::new("siret_siren_mismatch"));
        }
    }
    Ok(())
}

/// Campo opcional vazio conta como ausente.
fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ---
// Payload: Create/Update Client
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_identifiers"))]
pub struct ClientPayload {
    #[validate(length(min = 1, max = 200, message = "required"))]
    #[schema(example = "Marie Dupont")]
    pub name: String,

    #[schema(example = "Dupont Conseil SARL")]
    pub company: Option<String>,

    #[validate(email(message = "invalid_email"))]
    #[schema(example = "marie@dupont-conseil.fr")]
    pub email: Option<String>,

    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,

    #[validate(length(equal = 2, message = "out_of_range"))]
    #[schema(example = "FR")]
    pub country: Option<String>,

    #[validate(custom(function = "validate_siren"))]
    #[schema(example = "732829320")]
    pub siren: Option<String>,

    #[validate(custom(function = "validate_siret"))]
    #[schema(example = "73282932000074")]
    pub siret: Option<String>,

    #[validate(custom(function = "validate_vat"))]
    #[schema(example = "FR44732829320")]
    pub vat_number: Option<String>,

    pub notes: Option<String>,
}

impl From<ClientPayload> for ClientFields {
    fn from(p: ClientPayload) -> Self {
        ClientFields {
            name: p.name.trim().to_string(),
            company: clean(p.company),
            email: clean(p.email),
            phone: clean(p.phone),
            address: clean(p.address),
            city: clean(p.city),
            postal_code: clean(p.postal_code),
            country: clean(p.country).map(|c| c.to_ascii_uppercase()),
            siren: clean(p.siren),
            siret: clean(p.siret),
            vat_number: clean(p.vat_number).map(|v| v.to_ascii_uppercase()),
            notes: clean(p.notes),
        }
    }
}

// GET /api/clients
#[utoipa::path(
    get,
    path = "/api/clients",
    tag = "Clients",
    responses(
        (status = 200, description = "Clientes do usuário", body = Vec<Client>)
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "Dono dos dados")
    )
)]
pub async fn list_clients(
    State(app_state): State<AppState>,
    locale: Locale,
    user: UserContext,
) -> Result<impl IntoResponse, ApiError> {
    let result: Result<_, AppError> = async {
        let mut tx = begin_user_tx(&app_state, &user).await?;
        let clients = app_state.client_service.list(&mut *tx, user.0).await?;
        tx.commit().await?;
        Ok(clients)
    }
    .await;

    let clients = result.map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(clients))))
}

// POST /api/clients
#[utoipa::path(
    post,
    path = "/api/clients",
    tag = "Clients",
    request_body = ClientPayload,
    responses(
        (status = 201, description = "Cliente criado", body = Client),
        (status = 400, description = "Dados inválidos")
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "Dono dos dados")
    )
)]
pub async fn create_client(
    State(app_state): State<AppState>,
    locale: Locale,
    user: UserContext,
    Json(payload): Json<ClientPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let fields = ClientFields::from(payload);

    let result: Result<_, AppError> = async {
        let mut tx = begin_user_tx(&app_state, &user).await?;
        let client = app_state.client_service.create(&mut *tx, user.0, &fields).await?;
        tx.commit().await?;
        Ok(client)
    }
    .await;

    let client = result.map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(client))))
}

// GET /api/clients/{id}
#[utoipa::path(
    get,
    path = "/api/clients/{id}",
    tag = "Clients",
    responses(
        (status = 200, description = "Cliente", body = Client),
        (status = 404, description = "Cliente não encontrado")
    ),
    params(
        ("id" = Uuid, Path, description = "ID do cliente"),
        ("x-user-id" = Uuid, Header, description = "Dono dos dados")
    )
)]
pub async fn get_client(
    State(app_state): State<AppState>,
    locale: Locale,
    user: UserContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let result: Result<_, AppError> = async {
        let mut tx = begin_user_tx(&app_state, &user).await?;
        let client = app_state.client_service.get(&mut *tx, user.0, id).await?;
        tx.commit().await?;
        Ok(client)
    }
    .await;

    let client = result.map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(client))))
}

// PUT /api/clients/{id}
#[utoipa::path(
    put,
    path = "/api/clients/{id}",
    tag = "Clients",
    request_body = ClientPayload,
    responses(
        (status = 200, description = "Cliente atualizado", body = Client),
        (status = 400, description = "Dados inválidos"),
        (status = 404, description = "Cliente não encontrado")
    ),
    params(
        ("id" = Uuid, Path, description = "ID do cliente"),
        ("x-user-id" = Uuid, Header, description = "Dono dos dados")
    )
)]
pub async fn update_client(
    State(app_state): State<AppState>,
    locale: Locale,
    user: UserContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<ClientPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let fields = ClientFields::from(payload);

    let result: Result<_, AppError> = async {
        let mut tx = begin_user_tx(&app_state, &user).await?;
        let client = app_state.client_service.update(&mut *tx, user.0, id, &fields).await?;
        tx.commit().await?;
        Ok(client)
    }
    .await;

    let client = result.map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(client))))
}

// DELETE /api/clients/{id}
#[utoipa::path(
    delete,
    path = "/api/clients/{id}",
    tag = "Clients",
    responses(
        (status = 200, description = "Cliente removido"),
        (status = 404, description = "Cliente não encontrado"),
        (status = 409, description = "Cliente possui faturas")
    ),
    params(
        ("id" = Uuid, Path, description = "ID do cliente"),
        ("x-user-id" = Uuid, Header, description = "Dono dos dados")
    )
)]
pub async fn delete_client(
    State(app_state): State<AppState>,
    locale: Locale,
    user: UserContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let result: Result<_, AppError> = async {
        let mut tx = begin_user_tx(&app_state, &user).await?;
        app_state.client_service.delete(&mut *tx, user.0, id).await?;
        tx.commit().await?;
        Ok(())
    }
    .await;

    result.map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let message = app_state.i18n_store.translate(&locale.0, "client_deleted");
    Ok((StatusCode::OK, Json(ApiResponse::with_message(json!({ "id": id }), message))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> ClientPayload {
        ClientPayload {
            name: "Marie Dupont".to_string(),
            company: Some("  ".to_string()),
            email: Some("marie@dupont-conseil.fr".to_string()),
            phone: None,
            address: None,
            city: None,
            postal_code: None,
            country: Some("fr".to_string()),
            siren: Some("732829320".to_string()),
            siret: Some("73282932000074".to_string()),
            vat_number: Some("fr44732829320".to_string()),
            notes: None,
        }
    }

    #[test]
    fn valid_payload_passes() {
        assert!(payload().validate().is_ok());
    }

    #[test]
    fn bad_identifiers_are_field_errors() {
        let mut p = payload();
        p.siren = Some("123456789".to_string());
        p.vat_number = Some("FR00732829320".to_string());

        let errors = p.validate().unwrap_err();
        let fields = errors.field_errors();
        assert_eq!(fields["siren"][0].code, "invalid_siren");
        assert_eq!(fields["vat_number"][0].code, "invalid_vat_number");
    }

    #[test]
    fn siret_must_belong_to_siren() {
        let mut p = payload();
        p.siret = Some("55210055400013".to_string());
        assert!(p.validate().is_err());
    }

    #[test]
    fn payload_is_normalized() {
        let fields = ClientFields::from(payload());
        assert_eq!(fields.company, None);
        assert_eq!(fields.country.as_deref(), Some("FR"));
        assert_eq!(fields.vat_number.as_deref(), Some("FR44732829320"));
    }
}
