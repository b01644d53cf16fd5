// src/handlers/payments.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{
        db_utils::begin_user_tx,
        error::{ApiError, AppError},
        response::ApiResponse,
    },
    config::AppState,
    handlers::invoices::validate_amount,
    middleware::{i18n::Locale, user::UserContext},
    models::payment::{Payment, PaymentEvent},
};

fn default_method() -> String {
    "bank_transfer".to_string()
}

// ---
// Payloads
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    #[validate(custom(function = "validate_amount"))]
    #[schema(example = "600.00")]
    pub amount: Decimal,

    #[validate(length(min = 1, max = 50, message = "required"))]
    #[serde(default = "default_method")]
    #[schema(example = "bank_transfer")]
    pub method: String,

    #[schema(example = "VIR-2025-0912")]
    pub reference: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SucceedPayload {
    /// Padrão: hoje
    #[schema(value_type = Option<String>, format = Date)]
    pub paid_at: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct FailPayload {
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RefundPayload {
    pub note: Option<String>,
}

// GET /api/invoices/{id}/payments
#[utoipa::path(
    get,
    path = "/api/invoices/{id}/payments",
    tag = "Payments",
    responses(
        (status = 200, description = "Pagamentos da fatura", body = Vec<Payment>),
        (status = 404, description = "Fatura não encontrada")
    ),
    params(
        ("id" = Uuid, Path, description = "ID da fatura"),
        ("x-user-id" = Uuid, Header, description = "Dono dos dados")
    )
)]
pub async fn list_invoice_payments(
    State(app_state): State<AppState>,
    locale: Locale,
    user: UserContext,
    Path(invoice_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let result: Result<_, AppError> = async {
        let mut tx = begin_user_tx(&app_state, &user).await?;
        let payments = app_state
            .payment_service
            .list_for_invoice(&mut *tx, user.0, invoice_id)
            .await?;
        tx.commit().await?;
        Ok(payments)
    }
    .await;

    let payments = result.map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(payments))))
}

// POST /api/invoices/{id}/payments
#[utoipa::path(
    post,
    path = "/api/invoices/{id}/payments",
    tag = "Payments",
    request_body = PaymentPayload,
    responses(
        (status = 201, description = "Pagamento pendente registrado", body = Payment),
        (status = 400, description = "Valor inválido ou acima do saldo"),
        (status = 404, description = "Fatura não encontrada"),
        (status = 409, description = "Fatura não aceita pagamentos")
    ),
    params(
        ("id" = Uuid, Path, description = "ID da fatura"),
        ("x-user-id" = Uuid, Header, description = "Dono dos dados")
    )
)]
pub async fn create_payment(
    State(app_state): State<AppState>,
    locale: Locale,
    user: UserContext,
    Path(invoice_id): Path<Uuid>,
    Json(payload): Json<PaymentPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let reference = payload
        .reference
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty());

    let result: Result<_, AppError> = async {
        let mut tx = begin_user_tx(&app_state, &user).await?;
        let payment = app_state
            .payment_service
            .create(
                &mut *tx,
                user.0,
                invoice_id,
                payload.amount,
                payload.method.trim(),
                reference,
            )
            .await?;
        tx.commit().await?;
        Ok(payment)
    }
    .await;

    let payment = result.map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(payment))))
}

// GET /api/payments/{id}
#[utoipa::path(
    get,
    path = "/api/payments/{id}",
    tag = "Payments",
    responses(
        (status = 200, description = "Pagamento", body = Payment),
        (status = 404, description = "Pagamento não encontrado")
    ),
    params(
        ("id" = Uuid, Path, description = "ID do pagamento"),
        ("x-user-id" = Uuid, Header, description = "Dono dos dados")
    )
)]
pub async fn get_payment(
    State(app_state): State<AppState>,
    locale: Locale,
    user: UserContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let result: Result<_, AppError> = async {
        let mut tx = begin_user_tx(&app_state, &user).await?;
        let payment = app_state.payment_service.get(&mut *tx, user.0, id).await?;
        tx.commit().await?;
        Ok(payment)
    }
    .await;

    let payment = result.map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(payment))))
}

// POST /api/payments/{id}/succeed
#[utoipa::path(
    post,
    path = "/api/payments/{id}/succeed",
    tag = "Payments",
    request_body(content = SucceedPayload, description = "Opcional"),
    responses(
        (status = 200, description = "Pagamento confirmado", body = Payment),
        (status = 404, description = "Pagamento não encontrado"),
        (status = 409, description = "Transição inválida")
    ),
    params(
        ("id" = Uuid, Path, description = "ID do pagamento"),
        ("x-user-id" = Uuid, Header, description = "Dono dos dados")
    )
)]
pub async fn succeed_payment(
    State(app_state): State<AppState>,
    locale: Locale,
    user: UserContext,
    Path(id): Path<Uuid>,
    payload: Option<Json<SucceedPayload>>,
) -> Result<impl IntoResponse, ApiError> {
    let paid_at = payload
        .and_then(|Json(p)| p.paid_at)
        .unwrap_or_else(|| Utc::now().date_naive());

    let result: Result<_, AppError> = async {
        let mut tx = begin_user_tx(&app_state, &user).await?;
        let payment = app_state.payment_service.succeed(&mut *tx, user.0, id, paid_at).await?;
        tx.commit().await?;
        Ok(payment)
    }
    .await;

    let payment = result.map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(payment))))
}

// POST /api/payments/{id}/fail
#[utoipa::path(
    post,
    path = "/api/payments/{id}/fail",
    tag = "Payments",
    request_body(content = FailPayload, description = "Opcional"),
    responses(
        (status = 200, description = "Pagamento recusado", body = Payment),
        (status = 404, description = "Pagamento não encontrado"),
        (status = 409, description = "Transição inválida")
    ),
    params(
        ("id" = Uuid, Path, description = "ID do pagamento"),
        ("x-user-id" = Uuid, Header, description = "Dono dos dados")
    )
)]
pub async fn fail_payment(
    State(app_state): State<AppState>,
    locale: Locale,
    user: UserContext,
    Path(id): Path<Uuid>,
    payload: Option<Json<FailPayload>>,
) -> Result<impl IntoResponse, ApiError> {
    let reason = payload.and_then(|Json(p)| p.reason);

    let result: Result<_, AppError> = async {
        let mut tx = begin_user_tx(&app_state, &user).await?;
        let payment = app_state
            .payment_service
            .fail(&mut *tx, user.0, id, reason.as_deref())
            .await?;
        tx.commit().await?;
        Ok(payment)
    }
    .await;

    let payment = result.map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(payment))))
}

// POST /api/payments/{id}/refund
#[utoipa::path(
    post,
    path = "/api/payments/{id}/refund",
    tag = "Payments",
    request_body(content = RefundPayload, description = "Opcional"),
    responses(
        (status = 200, description = "Pagamento estornado", body = Payment),
        (status = 404, description = "Pagamento não encontrado"),
        (status = 409, description = "Transição inválida")
    ),
    params(
        ("id" = Uuid, Path, description = "ID do pagamento"),
        ("x-user-id" = Uuid, Header, description = "Dono dos dados")
    )
)]
pub async fn refund_payment(
    State(app_state): State<AppState>,
    locale: Locale,
    user: UserContext,
    Path(id): Path<Uuid>,
    payload: Option<Json<RefundPayload>>,
) -> Result<impl IntoResponse, ApiError> {
    let note = payload.and_then(|Json(p)| p.note);

    let result: Result<_, AppError> = async {
        let mut tx = begin_user_tx(&app_state, &user).await?;
        let payment = app_state
            .payment_service
            .refund(&mut *tx, user.0, id, note.as_deref())
            .await?;
        tx.commit().await?;
        Ok(payment)
    }
    .await;

    let payment = result.map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(payment))))
}

// GET /api/payments/{id}/events
#[utoipa::path(
    get,
    path = "/api/payments/{id}/events",
    tag = "Payments",
    responses(
        (status = 200, description = "Histórico do pagamento", body = Vec<PaymentEvent>),
        (status = 404, description = "Pagamento não encontrado")
    ),
    params(
        ("id" = Uuid, Path, description = "ID do pagamento"),
        ("x-user-id" = Uuid, Header, description = "Dono dos dados")
    )
)]
pub async fn list_payment_events(
    State(app_state): State<AppState>,
    locale: Locale,
    user: UserContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let result: Result<_, AppError> = async {
        let mut tx = begin_user_tx(&app_state, &user).await?;
        let events = app_state.payment_service.list_events(&mut *tx, user.0, id).await?;
        tx.commit().await?;
        Ok(events)
    }
    .await;

    let events = result.map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(events))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn method_defaults_to_bank_transfer() {
        let p: PaymentPayload = serde_json::from_value(json!({ "amount": 120.5 })).unwrap();
        assert_eq!(p.method, "bank_transfer");
        assert!(p.validate().is_ok());
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        let p: PaymentPayload = serde_json::from_value(json!({ "amount": 0 })).unwrap();
        let errors = p.validate().unwrap_err();
        assert_eq!(errors.field_errors()["amount"][0].code, "must_be_positive");
    }

    #[test]
    fn sub_cent_amounts_are_rejected() {
        // 0.004 viraria 0.00 na coluna e cairia no CHECK (amount > 0)
        let p: PaymentPayload = serde_json::from_value(json!({ "amount": 0.004 })).unwrap();
        let errors = p.validate().unwrap_err();
        assert_eq!(errors.field_errors()["amount"][0].code, "too_many_decimals");
    }

    #[test]
    fn amounts_beyond_the_column_are_rejected() {
        let p: PaymentPayload = serde_json::from_value(json!({ "amount": 1e15 })).unwrap();
        let errors = p.validate().unwrap_err();
        assert_eq!(errors.field_errors()["amount"][0].code, "amount_too_large");
    }
}
