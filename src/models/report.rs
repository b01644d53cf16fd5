// src/models/report.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::invoice::InvoiceStatus;
use crate::reports::aggregator::RevenueTotal;

// 1. Resumo de um período
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PeriodSummary {
    #[schema(value_type = String, format = Date)]
    pub start: NaiveDate,
    #[schema(value_type = String, format = Date)]
    pub end: NaiveDate,
    /// Faturas pagas no período (âncora: data de pagamento)
    pub paid: RevenueTotal,
    /// Faturas emitidas no período (âncora: data de emissão)
    pub invoiced: RevenueTotal,
    /// Em aberto na data final do período
    pub outstanding: RevenueTotal,
}

// 2. Dashboard (cards do topo + gráficos)
#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardKpis {
    #[serde(rename = "currentAR")]
    pub current_ar: Decimal,
    #[serde(rename = "overdueAR")]
    pub overdue_ar: Decimal,
    #[serde(rename = "paidThisMonth")]
    pub paid_this_month: Decimal,
    #[serde(rename = "invoicedThisMonth")]
    pub invoiced_this_month: Decimal,
    /// Média de dias entre emissão e pagamento das faturas pagas no mês
    #[serde(rename = "averageDaysToPay")]
    pub average_days_to_pay: Option<Decimal>,
    /// Percentual recebido sobre o emitido no mês
    #[serde(rename = "collectionRate")]
    pub collection_rate: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyDataEntry {
    #[schema(example = "2025-09")]
    pub month: String,
    #[schema(value_type = String, format = Date)]
    pub start: NaiveDate,
    pub invoiced: Decimal,
    pub revenue: Decimal,
    pub invoice_count: i64,
    pub paid_count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusDistributionEntry {
    pub status: InvoiceStatus,
    pub count: i64,
    pub amount: Decimal,
    #[schema(example = "33.33")]
    pub percentage: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    #[schema(value_type = String, format = Date)]
    pub as_of: NaiveDate,
    pub kpis: DashboardKpis,
    pub monthly_data: Vec<MonthlyDataEntry>,
    pub status_distribution: Vec<StatusDistributionEntry>,
}

// 3. Séries temporais
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    #[schema(example = "2025-09")]
    pub label: String,
    #[schema(value_type = String, format = Date)]
    pub start: NaiveDate,
    #[schema(value_type = String, format = Date)]
    pub end: NaiveDate,
    pub revenue: Decimal,
    pub count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ForecastPoint {
    pub label: String,
    #[schema(value_type = String, format = Date)]
    pub start: NaiveDate,
    #[schema(value_type = String, format = Date)]
    pub end: NaiveDate,
    pub expected: Decimal,
    pub count: i64,
}

// 4. Carteira
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AgingBucket {
    #[schema(example = "31-60")]
    pub bucket: String,
    pub count: i64,
    pub amount: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TopClientEntry {
    pub client_id: Uuid,
    pub client_name: String,
    pub revenue: Decimal,
    pub invoice_count: i64,
}
