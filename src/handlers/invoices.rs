// src/handlers/invoices.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
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
    models::invoice::{Invoice, InvoiceDetail, InvoiceFilter, InvoiceStatus, InvoiceSummary},
    services::invoice_service::{InvoiceDraft, LineInput, MAX_MONEY, MAX_QUANTITY},
};

// ---
// Validações customizadas
// ---
fn validate_positive(val: &Decimal) -> Result<(), ValidationError> {
    if *val <= Decimal::ZERO {
        return Err(ValidationError::new("must_be_positive"));
    }
    Ok(())
}

fn validate_not_negative(val: &Decimal) -> Result<(), ValidationError> {
    if val.is_sign_negative() && !val.is_zero() {
        return Err(ValidationError::new("not_negative"));
    }
    Ok(())
}

/// Casas decimais e teto da coluna NUMERIC que vai receber o valor.
fn validate_column(val: &Decimal, places: u32, max: Decimal) -> Result<(), ValidationError> {
    if val.normalize().scale() > places {
        return Err(ValidationError::new("too_many_decimals"));
    }
    if val.abs() > max {
        return Err(ValidationError::new("amount_too_large"));
    }
    Ok(())
}

/// Valor monetário estritamente positivo, em centavos.
pub(crate) fn validate_amount(val: &Decimal) -> Result<(), ValidationError> {
    validate_positive(val)?;
    validate_column(val, 2, MAX_MONEY)
}

fn validate_quantity(val: &Decimal) -> Result<(), ValidationError> {
    validate_positive(val)?;
    validate_column(val, 3, MAX_QUANTITY)
}

fn validate_unit_price(val: &Decimal) -> Result<(), ValidationError> {
    validate_not_negative(val)?;
    validate_column(val, 2, MAX_MONEY)
}

fn validate_tax_rate(val: &Decimal) -> Result<(), ValidationError> {
    if *val < Decimal::ZERO || *val > Decimal::ONE_HUNDRED {
        return Err(ValidationError::new("invalid_tax_rate"));
    }
    Ok(())
}

fn validate_currency(val: &str) -> Result<(), ValidationError> {
    let val = val.trim();
    if val.len() == 3 && val.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_currency"))
    }
}

fn validate_dates(payload: &InvoicePayload) -> Result<(), ValidationError> {
    if payload.due_date < payload.issue_date {
        return Err(ValidationError::new("due_before_issue"));
    }
    Ok(())
}

// ---
// Payloads
// ---
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceLinePayload {
    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "Consultoria - setembro")]
    pub description: String,

    #[validate(custom(function = "validate_quantity"))]
    #[schema(example = "10")]
    pub quantity: Decimal,

    #[validate(custom(function = "validate_unit_price"))]
    #[schema(example = "100.00")]
    pub unit_price: Decimal,

    // Sem taxa informada, linha isenta
    #[validate(custom(function = "validate_tax_rate"))]
    #[serde(default)]
    #[schema(example = "20")]
    pub tax_rate: Decimal,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_dates"))]
pub struct InvoicePayload {
    pub client_id: Uuid,

    #[schema(value_type = String, format = Date, example = "2025-09-01")]
    pub issue_date: NaiveDate,

    #[schema(value_type = String, format = Date, example = "2025-10-01")]
    pub due_date: NaiveDate,

    #[validate(custom(function = "validate_currency"))]
    #[schema(example = "EUR")]
    pub currency: Option<String>,

    pub notes: Option<String>,

    #[validate(length(min = 1, message = "items_required"), nested)]
    pub items: Vec<InvoiceLinePayload>,
}

impl From<InvoicePayload> for InvoiceDraft {
    fn from(p: InvoicePayload) -> Self {
        InvoiceDraft {
            client_id: p.client_id,
            issue_date: p.issue_date,
            due_date: p.due_date,
            currency: p.currency,
            notes: p.notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            lines: p
                .items
                .into_iter()
                .map(|l| LineInput {
                    description: l.description,
                    quantity: l.quantity,
                    unit_price: l.unit_price,
                    tax_rate: l.tax_rate,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarkPaidPayload {
    /// Padrão: hoje
    #[schema(value_type = Option<String>, format = Date, example = "2025-09-20")]
    pub paid_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReconcilePayload {
    /// Padrão: hoje
    #[schema(value_type = Option<String>, format = Date)]
    pub as_of: Option<NaiveDate>,
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

// =============================================================================
//  CRUD
// =============================================================================

// GET /api/invoices
#[utoipa::path(
    get,
    path = "/api/invoices",
    tag = "Invoices",
    params(
        InvoiceFilter,
        ("x-user-id" = Uuid, Header, description = "Dono dos dados")
    ),
    responses(
        (status = 200, description = "Faturas com status de exibição", body = Vec<InvoiceSummary>)
    )
)]
pub async fn list_invoices(
    State(app_state): State<AppState>,
    locale: Locale,
    user: UserContext,
    Query(filter): Query<InvoiceFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let result: Result<_, AppError> = async {
        let mut tx = begin_user_tx(&app_state, &user).await?;
        let invoices = app_state
            .invoice_service
            .list(&mut *tx, user.0, &filter, today())
            .await?;
        tx.commit().await?;
        Ok(invoices)
    }
    .await;

    let invoices = result.map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(invoices))))
}

// POST /api/invoices
#[utoipa::path(
    post,
    path = "/api/invoices",
    tag = "Invoices",
    request_body = InvoicePayload,
    responses(
        (status = 201, description = "Rascunho criado", body = InvoiceDetail),
        (status = 400, description = "Dados inválidos"),
        (status = 404, description = "Cliente não encontrado")
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "Dono dos dados")
    )
)]
pub async fn create_invoice(
    State(app_state): State<AppState>,
    locale: Locale,
    user: UserContext,
    Json(payload): Json<InvoicePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let draft = InvoiceDraft::from(payload);

    let result: Result<_, AppError> = async {
        let mut tx = begin_user_tx(&app_state, &user).await?;
        let detail = app_state
            .invoice_service
            .create(&mut *tx, user.0, &draft, today())
            .await?;
        tx.commit().await?;
        Ok(detail)
    }
    .await;

    let detail = result.map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(detail))))
}

// GET /api/invoices/{id}
#[utoipa::path(
    get,
    path = "/api/invoices/{id}",
    tag = "Invoices",
    responses(
        (status = 200, description = "Fatura com linhas e saldo", body = InvoiceDetail),
        (status = 404, description = "Fatura não encontrada")
    ),
    params(
        ("id" = Uuid, Path, description = "ID da fatura"),
        ("x-user-id" = Uuid, Header, description = "Dono dos dados")
    )
)]
pub async fn get_invoice(
    State(app_state): State<AppState>,
    locale: Locale,
    user: UserContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let result: Result<_, AppError> = async {
        let mut tx = begin_user_tx(&app_state, &user).await?;
        let detail = app_state.invoice_service.get(&mut *tx, user.0, id, today()).await?;
        tx.commit().await?;
        Ok(detail)
    }
    .await;

    let detail = result.map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(detail))))
}

// PUT /api/invoices/{id}
#[utoipa::path(
    put,
    path = "/api/invoices/{id}",
    tag = "Invoices",
    request_body = InvoicePayload,
    responses(
        (status = 200, description = "Rascunho atualizado", body = InvoiceDetail),
        (status = 400, description = "Dados inválidos"),
        (status = 404, description = "Fatura não encontrada"),
        (status = 409, description = "Fatura não é rascunho")
    ),
    params(
        ("id" = Uuid, Path, description = "ID da fatura"),
        ("x-user-id" = Uuid, Header, description = "Dono dos dados")
    )
)]
pub async fn update_invoice(
    State(app_state): State<AppState>,
    locale: Locale,
    user: UserContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<InvoicePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let draft = InvoiceDraft::from(payload);

    let result: Result<_, AppError> = async {
        let mut tx = begin_user_tx(&app_state, &user).await?;
        let detail = app_state
            .invoice_service
            .update(&mut *tx, user.0, id, &draft, today())
            .await?;
        tx.commit().await?;
        Ok(detail)
    }
    .await;

    let detail = result.map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(detail))))
}

// DELETE /api/invoices/{id}
#[utoipa::path(
    delete,
    path = "/api/invoices/{id}",
    tag = "Invoices",
    responses(
        (status = 200, description = "Rascunho removido"),
        (status = 404, description = "Fatura não encontrada"),
        (status = 409, description = "Fatura não é rascunho")
    ),
    params(
        ("id" = Uuid, Path, description = "ID da fatura"),
        ("x-user-id" = Uuid, Header, description = "Dono dos dados")
    )
)]
pub async fn delete_invoice(
    State(app_state): State<AppState>,
    locale: Locale,
    user: UserContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let result: Result<_, AppError> = async {
        let mut tx = begin_user_tx(&app_state, &user).await?;
        app_state.invoice_service.delete(&mut *tx, user.0, id).await?;
        tx.commit().await?;
        Ok(())
    }
    .await;

    result.map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let message = app_state.i18n_store.translate(&locale.0, "invoice_deleted");
    Ok((StatusCode::OK, Json(ApiResponse::with_message(json!({ "id": id }), message))))
}

// =============================================================================
//  TRANSIÇÕES
// =============================================================================

async fn apply_transition(
    app_state: &AppState,
    locale: &Locale,
    user: &UserContext,
    id: Uuid,
    target: InvoiceStatus,
    paid_date: Option<NaiveDate>,
) -> Result<Invoice, ApiError> {
    let result: Result<_, AppError> = async {
        let mut tx = begin_user_tx(app_state, user).await?;
        let invoice = app_state
            .invoice_service
            .transition(&mut *tx, user.0, id, target, paid_date, today())
            .await?;
        tx.commit().await?;
        Ok(invoice)
    }
    .await;

    result.map_err(|e| e.to_api_error(locale, &app_state.i18n_store))
}

// POST /api/invoices/{id}/send
#[utoipa::path(
    post,
    path = "/api/invoices/{id}/send",
    tag = "Invoices",
    responses(
        (status = 200, description = "Fatura enviada", body = Invoice),
        (status = 409, description = "Transição inválida")
    ),
    params(
        ("id" = Uuid, Path, description = "ID da fatura"),
        ("x-user-id" = Uuid, Header, description = "Dono dos dados")
    )
)]
pub async fn send_invoice(
    State(app_state): State<AppState>,
    locale: Locale,
    user: UserContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let invoice = apply_transition(&app_state, &locale, &user, id, InvoiceStatus::Sent, None).await?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(invoice))))
}

// POST /api/invoices/{id}/mark-paid
#[utoipa::path(
    post,
    path = "/api/invoices/{id}/mark-paid",
    tag = "Invoices",
    request_body(content = MarkPaidPayload, description = "Opcional"),
    responses(
        (status = 200, description = "Fatura paga", body = Invoice),
        (status = 409, description = "Transição inválida")
    ),
    params(
        ("id" = Uuid, Path, description = "ID da fatura"),
        ("x-user-id" = Uuid, Header, description = "Dono dos dados")
    )
)]
pub async fn mark_invoice_paid(
    State(app_state): State<AppState>,
    locale: Locale,
    user: UserContext,
    Path(id): Path<Uuid>,
    payload: Option<Json<MarkPaidPayload>>,
) -> Result<impl IntoResponse, ApiError> {
    let paid_date = payload.and_then(|Json(p)| p.paid_date);
    let invoice = apply_transition(&app_state, &locale, &user, id, InvoiceStatus::Paid, paid_date).await?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(invoice))))
}

// POST /api/invoices/{id}/cancel
#[utoipa::path(
    post,
    path = "/api/invoices/{id}/cancel",
    tag = "Invoices",
    responses(
        (status = 200, description = "Fatura cancelada", body = Invoice),
        (status = 409, description = "Transição inválida")
    ),
    params(
        ("id" = Uuid, Path, description = "ID da fatura"),
        ("x-user-id" = Uuid, Header, description = "Dono dos dados")
    )
)]
pub async fn cancel_invoice(
    State(app_state): State<AppState>,
    locale: Locale,
    user: UserContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let invoice = apply_transition(&app_state, &locale, &user, id, InvoiceStatus::Cancelled, None).await?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(invoice))))
}

// POST /api/invoices/reconcile-overdue
#[utoipa::path(
    post,
    path = "/api/invoices/reconcile-overdue",
    tag = "Invoices",
    request_body(content = ReconcilePayload, description = "Opcional"),
    responses(
        (status = 200, description = "IDs das faturas marcadas como vencidas", body = Vec<Uuid>)
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "Dono dos dados")
    )
)]
pub async fn reconcile_overdue(
    State(app_state): State<AppState>,
    locale: Locale,
    user: UserContext,
    payload: Option<Json<ReconcilePayload>>,
) -> Result<impl IntoResponse, ApiError> {
    let as_of = payload.and_then(|Json(p)| p.as_of).unwrap_or_else(today);

    let result: Result<_, AppError> = async {
        let mut tx = begin_user_tx(&app_state, &user).await?;
        let ids = app_state
            .invoice_service
            .reconcile_overdue(&mut *tx, Some(user.0), as_of)
            .await?;
        tx.commit().await?;
        Ok(ids)
    }
    .await;

    let ids = result.map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    let message = app_state.i18n_store.translate_with(
        &locale.0,
        "overdue_reconciled",
        &[("count", ids.len().to_string())],
    );
    Ok((StatusCode::OK, Json(ApiResponse::with_message(ids, message))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn payload(body: serde_json::Value) -> InvoicePayload {
        serde_json::from_value(body).unwrap()
    }

    fn valid_body() -> serde_json::Value {
        json!({
            "clientId": Uuid::nil(),
            "issueDate": "2025-09-01",
            "dueDate": "2025-10-01",
            "items": [
                { "description": "Consultoria", "quantity": 10, "unitPrice": 100, "taxRate": 20 }
            ]
        })
    }

    #[test]
    fn valid_invoice_payload() {
        let p = payload(valid_body());
        assert!(p.validate().is_ok());
        // taxa ausente vira zero
        let mut body = valid_body();
        body["items"][0].as_object_mut().unwrap().remove("taxRate");
        assert_eq!(payload(body).items[0].tax_rate, Decimal::ZERO);
    }

    #[test]
    fn due_date_before_issue_is_rejected() {
        let mut body = valid_body();
        body["dueDate"] = json!("2025-08-01");
        assert!(payload(body).validate().is_err());
    }

    #[test]
    fn empty_items_are_rejected() {
        let mut body = valid_body();
        body["items"] = json!([]);
        let errors = payload(body).validate().unwrap_err();
        assert!(errors.field_errors().contains_key("items"));
    }

    #[test]
    fn line_values_are_checked() {
        assert!(validate_quantity(&dec!(0)).is_err());
        assert!(validate_quantity(&dec!(0.5)).is_ok());
        assert!(validate_unit_price(&dec!(-1)).is_err());
        assert!(validate_unit_price(&dec!(0)).is_ok());
        assert!(validate_tax_rate(&dec!(100.01)).is_err());
        assert!(validate_tax_rate(&dec!(5.5)).is_ok());
        assert!(validate_currency("eur").is_ok());
        assert!(validate_currency("EURO").is_err());
    }

    #[test]
    fn sub_cent_unit_prices_are_rejected() {
        let mut body = valid_body();
        body["items"][0]["unitPrice"] = json!(33.335);
        let p = payload(body);
        assert!(p.validate().is_err());
        let errors = p.items[0].validate().unwrap_err();
        assert_eq!(errors.field_errors()["unit_price"][0].code, "too_many_decimals");

        // zeros à direita não contam
        assert!(validate_unit_price(&dec!(33.3300)).is_ok());
    }

    #[test]
    fn quantities_keep_three_decimals() {
        assert!(validate_quantity(&dec!(1.125)).is_ok());
        let err = validate_quantity(&dec!(1.1255)).unwrap_err();
        assert_eq!(err.code, "too_many_decimals");
    }

    #[test]
    fn values_beyond_the_columns_are_rejected() {
        let err = validate_quantity(&Decimal::from(1_000_000_000_i64)).unwrap_err();
        assert_eq!(err.code, "amount_too_large");
        assert!(validate_quantity(&MAX_QUANTITY).is_ok());

        let err = validate_unit_price(&Decimal::from_i128_with_scale(10_i128.pow(20), 0)).unwrap_err();
        assert_eq!(err.code, "amount_too_large");
        assert!(validate_unit_price(&MAX_MONEY).is_ok());

        assert_eq!(validate_amount(&dec!(0.004)).unwrap_err().code, "too_many_decimals");
        assert!(validate_amount(&dec!(0.01)).is_ok());
    }
}
