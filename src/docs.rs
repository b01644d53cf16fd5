// src/docs.rs

use axum::Json;
use utoipa::OpenApi;

use crate::handlers;
use crate::models;
use crate::reports;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Invoicing API",
        description = "Clientes, faturas, pagamentos, relatórios e integrações CRM"
    ),
    paths(
        // --- Clients ---
        handlers::clients::list_clients,
        handlers::clients::create_client,
        handlers::clients::get_client,
        handlers::clients::update_client,
        handlers::clients::delete_client,

        // --- Invoices ---
        handlers::invoices::list_invoices,
        handlers::invoices::create_invoice,
        handlers::invoices::get_invoice,
        handlers::invoices::update_invoice,
        handlers::invoices::delete_invoice,
        handlers::invoices::send_invoice,
        handlers::invoices::mark_invoice_paid,
        handlers::invoices::cancel_invoice,
        handlers::invoices::reconcile_overdue,

        // --- Payments ---
        handlers::payments::list_invoice_payments,
        handlers::payments::create_payment,
        handlers::payments::get_payment,
        handlers::payments::succeed_payment,
        handlers::payments::fail_payment,
        handlers::payments::refund_payment,
        handlers::payments::list_payment_events,

        // --- Reports ---
        handlers::reports::get_summary,
        handlers::reports::get_dashboard,
        handlers::reports::get_revenue_trend,
        handlers::reports::get_status_distribution,
        handlers::reports::get_aging,
        handlers::reports::get_top_clients,
        handlers::reports::get_forecast,

        // --- Integrations ---
        handlers::integrations::list_integrations,
        handlers::integrations::create_integration,
        handlers::integrations::get_integration,
        handlers::integrations::set_integration_active,
        handlers::integrations::list_mappings,
        handlers::integrations::upsert_mapping,
        handlers::integrations::list_sync_logs,
        handlers::integrations::record_sync_attempt,
        handlers::integrations::complete_sync,
        handlers::integrations::fail_sync,
        handlers::integrations::list_due_retries,
    ),
    components(
        schemas(
            // --- Clients ---
            models::client::Client,
            handlers::clients::ClientPayload,

            // --- Invoices ---
            models::invoice::InvoiceStatus,
            models::invoice::Invoice,
            models::invoice::InvoiceItem,
            models::invoice::InvoiceSummary,
            models::invoice::InvoiceDetail,
            handlers::invoices::InvoicePayload,
            handlers::invoices::InvoiceLinePayload,
            handlers::invoices::MarkPaidPayload,
            handlers::invoices::ReconcilePayload,

            // --- Payments ---
            models::payment::PaymentStatus,
            models::payment::Payment,
            models::payment::PaymentEvent,
            handlers::payments::PaymentPayload,
            handlers::payments::SucceedPayload,
            handlers::payments::FailPayload,
            handlers::payments::RefundPayload,

            // --- Reports ---
            reports::Window,
            reports::buckets::Granularity,
            reports::aggregator::RevenueTotal,
            models::report::PeriodSummary,
            models::report::DashboardKpis,
            models::report::MonthlyDataEntry,
            models::report::StatusDistributionEntry,
            models::report::Dashboard,
            models::report::TrendPoint,
            models::report::ForecastPoint,
            models::report::AgingBucket,
            models::report::TopClientEntry,

            // --- Integrations ---
            models::integration::CrmProvider,
            models::integration::SyncStatus,
            models::integration::Integration,
            models::integration::DataMapping,
            models::integration::SyncLog,
            handlers::integrations::IntegrationPayload,
            handlers::integrations::ActivePayload,
            handlers::integrations::MappingPayload,
            handlers::integrations::SyncAttemptPayload,
            handlers::integrations::SyncFailurePayload,
        )
    ),
    tags(
        (name = "Clients", description = "Cadastro de clientes (SIREN/SIRET/TVA)"),
        (name = "Invoices", description = "Faturas e ciclo de vida"),
        (name = "Payments", description = "Pagamentos e histórico de eventos"),
        (name = "Reports", description = "Indicadores, séries e carteira"),
        (name = "Integrations", description = "Conectores CRM e logs de sincronização")
    )
)]
pub struct ApiDoc;

// GET /api/openapi.json
pub async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
