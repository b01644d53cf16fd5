use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::{
    common::i18n::I18nStore,
    middleware::i18n::Locale,
    models::{invoice::InvoiceStatus, payment::PaymentStatus},
};

// Erros de domínio. Cada variante tem uma chave de tradução (ver `key()`).
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Cabeçalho x-user-id ausente")]
    MissingUserHeader,

    #[error("Cabeçalho x-user-id inválido")]
    InvalidUserHeader,

    #[error("Intervalo de datas inválido")]
    InvalidDateRange,

    #[error("Quantidade de segmentos inválida: {requested} para {days} dias")]
    InvalidBucketCount { requested: u32, days: i64 },

    #[error("Mais de {0} segmentos no relatório")]
    TooManyBuckets(usize),

    #[error("Cliente não encontrado")]
    ClientNotFound,

    #[error("Fatura não encontrada")]
    InvoiceNotFound,

    #[error("Pagamento não encontrado")]
    PaymentNotFound,

    #[error("Integração não encontrada")]
    IntegrationNotFound,

    #[error("Log de sincronização não encontrado")]
    SyncLogNotFound,

    #[error("Integração desativada")]
    IntegrationInactive,

    #[error("Transição de fatura inválida: {from} -> {to}")]
    InvalidStatusTransition { from: InvoiceStatus, to: InvoiceStatus },

    #[error("Transição de pagamento inválida: {} -> {}", from.as_str(), to.as_str())]
    InvalidPaymentTransition { from: PaymentStatus, to: PaymentStatus },

    #[error("Fatura não editável no status {0}")]
    InvoiceNotEditable(InvoiceStatus),

    #[error("Cliente possui faturas")]
    ClientHasInvoices,

    #[error("Número de fatura já existe")]
    DuplicateInvoiceNumber,

    #[error("Pagamento excede o saldo da fatura")]
    PaymentExceedsBalance,

    #[error("Valor fora do intervalo suportado")]
    AmountOutOfRange,

    #[error("Erro de banco de dados: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Erro interno do servidor: {0}")]
    InternalServerError(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_)
            | AppError::MissingUserHeader
            | AppError::InvalidUserHeader
            | AppError::InvalidDateRange
            | AppError::InvalidBucketCount { .. }
            | AppError::TooManyBuckets(_)
            | AppError::PaymentExceedsBalance
            | AppError::AmountOutOfRange => StatusCode::BAD_REQUEST,

            AppError::ClientNotFound
            | AppError::InvoiceNotFound
            | AppError::PaymentNotFound
            | AppError::IntegrationNotFound
            | AppError::SyncLogNotFound => StatusCode::NOT_FOUND,

            AppError::IntegrationInactive => StatusCode::FORBIDDEN,

            AppError::InvalidStatusTransition { .. }
            | AppError::InvalidPaymentTransition { .. }
            | AppError::InvoiceNotEditable(_)
            | AppError::ClientHasInvoices
            | AppError::DuplicateInvoiceNumber => StatusCode::CONFLICT,

            AppError::DatabaseError(_) | AppError::InternalServerError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Chave no catálogo de mensagens.
    pub fn key(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "validation_failed",
            AppError::MissingUserHeader => "missing_user",
            AppError::InvalidUserHeader => "invalid_user",
            AppError::InvalidDateRange => "invalid_date_range",
            AppError::InvalidBucketCount { .. } => "invalid_bucket_count",
            AppError::TooManyBuckets(_) => "too_many_buckets",
            AppError::ClientNotFound => "client_not_found",
            AppError::InvoiceNotFound => "invoice_not_found",
            AppError::PaymentNotFound => "payment_not_found",
            AppError::IntegrationNotFound => "integration_not_found",
            AppError::SyncLogNotFound => "sync_log_not_found",
            AppError::IntegrationInactive => "integration_inactive",
            AppError::InvalidStatusTransition { .. } => "invalid_status_transition",
            AppError::InvalidPaymentTransition { .. } => "invalid_payment_transition",
            AppError::InvoiceNotEditable(_) => "invoice_not_editable",
            AppError::ClientHasInvoices => "client_has_invoices",
            AppError::DuplicateInvoiceNumber => "duplicate_invoice_number",
            AppError::PaymentExceedsBalance => "payment_exceeds_balance",
            AppError::AmountOutOfRange => "amount_out_of_range",
            AppError::DatabaseError(_) | AppError::InternalServerError(_) => "internal_error",
        }
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        match self {
            AppError::InvalidBucketCount { requested, days } => {
                vec![("requested", requested.to_string()), ("days", days.to_string())]
            }
            AppError::TooManyBuckets(max) => vec![("max", max.to_string())],
            AppError::InvalidStatusTransition { from, to } => {
                vec![("from", from.to_string()), ("to", to.to_string())]
            }
            AppError::InvalidPaymentTransition { from, to } => {
                vec![("from", from.as_str().to_string()), ("to", to.as_str().to_string())]
            }
            AppError::InvoiceNotEditable(status) => vec![("status", status.to_string())],
            _ => Vec::new(),
        }
    }

    /// Converte o erro de domínio na resposta HTTP, já traduzida.
    pub fn to_api_error(self, locale: &Locale, store: &I18nStore) -> ApiError {
        let status = self.status();

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            // O detalhe fica no log; o cliente recebe só a mensagem genérica
            tracing::error!(error = ?self, "Erro Interno do Servidor: {}", self);
        }

        let message = store.translate_with(&locale.0, self.key(), &self.params());

        let details = match &self {
            AppError::ValidationError(errors) => {
                let mut fields = serde_json::Map::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<Value> = field_errors
                        .iter()
                        .map(|e| {
                            let code = e.message.as_deref().unwrap_or(e.code.as_ref());
                            Value::String(store.translate(&locale.0, code))
                        })
                        .collect();
                    fields.insert(field.to_string(), Value::Array(messages));
                }
                Some(Value::Object(fields))
            }
            _ => None,
        };

        ApiError {
            status,
            error: message,
            details,
        }
    }
}

/// Resposta de erro já pronta para o cliente.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error: String,
    pub details: Option<Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "success": false,
            "message": self.error,
        });
        if let Some(details) = self.details {
            body["details"] = details;
        }
        (self.status, Json(body)).into_response()
    }
}

/// Detecta violação de chave única do Postgres.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation())
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::{ValidationError, ValidationErrors};

    fn store() -> I18nStore {
        I18nStore::load().unwrap()
    }

    #[test]
    fn statuses_follow_the_error_class() {
        assert_eq!(AppError::InvoiceNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::InvalidDateRange.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::IntegrationInactive.status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::AmountOutOfRange.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::InvoiceNotEditable(InvoiceStatus::Sent).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::InternalServerError(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_errors_hide_details() {
        let api = AppError::InternalServerError(anyhow::anyhow!("senha do banco: hunter2"))
            .to_api_error(&Locale("en".into()), &store());
        assert!(!api.error.contains("hunter2"));
        assert!(api.details.is_none());
    }

    #[test]
    fn messages_are_localized_with_params() {
        let err = AppError::InvalidStatusTransition {
            from: InvoiceStatus::Paid,
            to: InvoiceStatus::Draft,
        };
        let api = err.to_api_error(&Locale("fr".into()), &store());
        assert!(api.error.contains("paid"));
        assert!(api.error.contains("draft"));
        assert_eq!(api.status, StatusCode::CONFLICT);
    }

    #[test]
    fn validation_details_are_per_field() {
        let mut errors = ValidationErrors::new();
        let mut e = ValidationError::new("length");
        e.message = Some("required".into());
        errors.add("name", e);

        let api = AppError::ValidationError(errors).to_api_error(&Locale("en".into()), &store());
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        let details = api.details.unwrap();
        let name = details["name"].as_array().unwrap();
        assert_eq!(name.len(), 1);
        assert_eq!(name[0], "This field is required.");
    }
}
