// src/models/invoice.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

// --- Enums (Mapeando o Postgres) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "invoice_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    /// Ordem de exibição usada nos relatórios.
    pub const ALL: [InvoiceStatus; 5] = [
        InvoiceStatus::Draft,
        InvoiceStatus::Sent,
        InvoiceStatus::Paid,
        InvoiceStatus::Overdue,
        InvoiceStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Structs ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: Uuid,

    #[schema(ignore)]
    pub user_id: Uuid,

    pub client_id: Uuid,

    #[schema(example = "INV-2025-0042")]
    pub invoice_number: String,

    /// Status gravado. Pode estar defasado (ver `displayStatus`).
    pub status: InvoiceStatus,

    #[schema(value_type = String, format = Date, example = "2025-09-01")]
    pub issue_date: NaiveDate,
    #[schema(value_type = String, format = Date, example = "2025-10-01")]
    pub due_date: NaiveDate,
    #[schema(value_type = Option<String>, format = Date, example = "2025-09-20")]
    pub paid_date: Option<NaiveDate>,

    #[schema(example = "1000.00")]
    pub subtotal: Decimal,
    #[schema(example = "200.00")]
    pub tax_amount: Decimal,
    #[schema(example = "1200.00")]
    pub total: Option<Decimal>,

    #[schema(example = "EUR")]
    pub currency: String,

    pub notes: Option<String>,
    pub last_reminder_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Total usado em somas: faturas sem valor contam como zero.
    pub fn amount(&self) -> Decimal {
        self.total.unwrap_or(Decimal::ZERO)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceItem {
    pub id: Uuid,
    pub invoice_id: Uuid,
    #[schema(example = 1)]
    pub position: i32,
    #[schema(example = "Consultoria - setembro")]
    pub description: String,
    #[schema(example = "10")]
    pub quantity: Decimal,
    #[schema(example = "100.00")]
    pub unit_price: Decimal,
    #[schema(example = "20.00")]
    pub tax_rate: Decimal,
    #[schema(example = "1000.00")]
    pub amount: Decimal,
}

/// Linha de fatura já calculada, pronta para inserir.
#[derive(Debug, Clone, PartialEq)]
pub struct NewInvoiceItem {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub tax_rate: Decimal,
    pub amount: Decimal,
}

/// Cabeçalho de uma fatura nova (totais já calculados pelo service).
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub client_id: Uuid,
    pub invoice_number: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
    pub currency: String,
    pub notes: Option<String>,
}

/// Fatura como devolvida na listagem: o status exibido é recalculado na leitura.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceSummary {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub display_status: InvoiceStatus,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceDetail {
    #[serde(flatten)]
    pub header: Invoice,
    pub display_status: InvoiceStatus,
    pub client_name: String,
    pub items: Vec<InvoiceItem>,
    #[schema(example = "600.00")]
    pub amount_paid: Decimal,
    #[schema(example = "600.00")]
    pub balance_due: Decimal,
}

/// Filtros da listagem de faturas (query string).
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct InvoiceFilter {
    /// Status gravado
    pub status: Option<InvoiceStatus>,
    pub client_id: Option<Uuid>,
    /// Emitidas a partir de (inclusive)
    pub from: Option<NaiveDate>,
    /// Emitidas antes de (exclusive)
    pub to: Option<NaiveDate>,
}
