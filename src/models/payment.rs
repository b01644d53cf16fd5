// src/models/payment.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    Failed,
    Refunded,
}

impl PaymentStatus {
    /// Transições permitidas no ciclo de vida do pagamento.
    pub fn can_transition_to(self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (PaymentStatus::Pending, PaymentStatus::Succeeded)
                | (PaymentStatus::Pending, PaymentStatus::Failed)
                | (PaymentStatus::Succeeded, PaymentStatus::Refunded)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    #[schema(ignore)]
    pub user_id: Uuid,
    pub invoice_id: Uuid,
    #[schema(example = "600.00")]
    pub amount: Decimal,
    #[schema(example = "EUR")]
    pub currency: String,
    #[schema(example = "bank_transfer")]
    pub method: String,
    pub status: PaymentStatus,
    pub reference: Option<String>,
    #[schema(value_type = Option<String>, format = Date)]
    pub paid_at: Option<NaiveDate>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Registro do log de eventos do pagamento. Nunca é alterado depois de inserido.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentEvent {
    pub id: Uuid,
    pub payment_id: Uuid,
    #[schema(example = "succeeded")]
    pub kind: String,
    pub from_status: Option<PaymentStatus>,
    pub to_status: PaymentStatus,
    pub amount: Decimal,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}
