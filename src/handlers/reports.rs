// src/handlers/reports.rs
//
// Todos os relatórios rodam num snapshot somente leitura: as várias consultas
// de um mesmo relatório enxergam o mesmo estado do banco.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use utoipa::IntoParams;
use validator::Validate;

use crate::{
    common::{
        db_utils::begin_user_snapshot,
        error::{ApiError, AppError},
        response::ApiResponse,
    },
    config::AppState,
    middleware::{i18n::Locale, user::UserContext},
    models::report::{
        AgingBucket, Dashboard, ForecastPoint, PeriodSummary, StatusDistributionEntry,
        TopClientEntry, TrendPoint,
    },
    reports::{buckets::Granularity, Window},
};

fn default_months() -> u32 {
    12
}

fn default_limit() -> u32 {
    10
}

fn default_granularity() -> Granularity {
    Granularity::Month
}

fn default_node_count() -> u32 {
    4
}

// ---
// Parâmetros de consulta
// ---
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WindowQuery {
    /// Início (inclusivo)
    #[param(value_type = String, format = Date, example = "2025-01-01")]
    pub start: NaiveDate,
    /// Fim (exclusivo)
    #[param(value_type = String, format = Date, example = "2025-07-01")]
    pub end: NaiveDate,
}

impl WindowQuery {
    fn window(&self) -> Result<Window, AppError> {
        Window::new(self.start, self.end)
    }
}

#[derive(Debug, Deserialize, Validate, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct DashboardQuery {
    /// Padrão: hoje
    #[param(value_type = Option<String>, format = Date)]
    pub as_of: Option<NaiveDate>,
    #[validate(range(min = 1, max = 24, message = "out_of_range"))]
    #[serde(default = "default_months")]
    #[param(default = 12, minimum = 1, maximum = 24)]
    pub months: u32,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TrendQuery {
    #[param(value_type = String, format = Date)]
    pub start: NaiveDate,
    #[param(value_type = String, format = Date)]
    pub end: NaiveDate,
    #[serde(default = "default_granularity")]
    #[param(inline)]
    pub granularity: Granularity,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct DistributionQuery {
    #[param(value_type = String, format = Date)]
    pub start: NaiveDate,
    #[param(value_type = String, format = Date)]
    pub end: NaiveDate,
    /// Data usada para classificar vencidas. Padrão: hoje
    #[param(value_type = Option<String>, format = Date)]
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AgingQuery {
    #[param(value_type = Option<String>, format = Date)]
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TopClientsQuery {
    #[param(value_type = String, format = Date)]
    pub start: NaiveDate,
    #[param(value_type = String, format = Date)]
    pub end: NaiveDate,
    #[validate(range(min = 1, max = 100, message = "out_of_range"))]
    #[serde(default = "default_limit")]
    #[param(default = 10, minimum = 1, maximum = 100)]
    pub limit: u32,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ForecastQuery {
    #[param(value_type = String, format = Date)]
    pub start: NaiveDate,
    #[param(value_type = String, format = Date)]
    pub end: NaiveDate,
    #[serde(default = "default_node_count")]
    #[param(default = 4, minimum = 1)]
    pub node_count: u32,
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

// GET /api/reports/summary
#[utoipa::path(
    get,
    path = "/api/reports/summary",
    tag = "Reports",
    params(
        WindowQuery,
        ("x-user-id" = uuid::Uuid, Header, description = "Dono dos dados")
    ),
    responses(
        (status = 200, description = "Pago, emitido e em aberto no período", body = PeriodSummary),
        (status = 400, description = "Intervalo inválido")
    )
)]
pub async fn get_summary(
    State(app_state): State<AppState>,
    locale: Locale,
    user: UserContext,
    Query(query): Query<WindowQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let result: Result<_, AppError> = async {
        let window = query.window()?;
        let mut tx = begin_user_snapshot(&app_state, &user).await?;
        let summary = app_state.report_service.summary(&mut *tx, user.0, window).await?;
        tx.commit().await?;
        Ok(summary)
    }
    .await;

    let summary = result.map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(summary))))
}

// GET /api/reports/dashboard
#[utoipa::path(
    get,
    path = "/api/reports/dashboard",
    tag = "Reports",
    params(
        DashboardQuery,
        ("x-user-id" = uuid::Uuid, Header, description = "Dono dos dados")
    ),
    responses(
        (status = 200, description = "Indicadores, série mensal e distribuição", body = Dashboard),
        (status = 400, description = "Parâmetros inválidos")
    )
)]
pub async fn get_dashboard(
    State(app_state): State<AppState>,
    locale: Locale,
    user: UserContext,
    Query(query): Query<DashboardQuery>,
) -> Result<impl IntoResponse, ApiError> {
    query
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let as_of = query.as_of.unwrap_or_else(today);

    let result: Result<_, AppError> = async {
        let mut tx = begin_user_snapshot(&app_state, &user).await?;
        let dashboard = app_state
            .report_service
            .dashboard(&mut *tx, user.0, as_of, query.months)
            .await?;
        tx.commit().await?;
        Ok(dashboard)
    }
    .await;

    let dashboard = result.map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(dashboard))))
}

// GET /api/reports/revenue-trend
#[utoipa::path(
    get,
    path = "/api/reports/revenue-trend",
    tag = "Reports",
    params(
        TrendQuery,
        ("x-user-id" = uuid::Uuid, Header, description = "Dono dos dados")
    ),
    responses(
        (status = 200, description = "Receita paga por segmento", body = Vec<TrendPoint>),
        (status = 400, description = "Intervalo inválido ou segmentos demais")
    )
)]
pub async fn get_revenue_trend(
    State(app_state): State<AppState>,
    locale: Locale,
    user: UserContext,
    Query(query): Query<TrendQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let result: Result<_, AppError> = async {
        let window = Window::new(query.start, query.end)?;
        let mut tx = begin_user_snapshot(&app_state, &user).await?;
        let trend = app_state
            .report_service
            .revenue_trend(&mut *tx, user.0, window, query.granularity)
            .await?;
        tx.commit().await?;
        Ok(trend)
    }
    .await;

    let trend = result.map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(trend))))
}

// GET /api/reports/status-distribution
#[utoipa::path(
    get,
    path = "/api/reports/status-distribution",
    tag = "Reports",
    params(
        DistributionQuery,
        ("x-user-id" = uuid::Uuid, Header, description = "Dono dos dados")
    ),
    responses(
        (status = 200, description = "Faturas por status de exibição", body = Vec<StatusDistributionEntry>),
        (status = 400, description = "Intervalo inválido")
    )
)]
pub async fn get_status_distribution(
    State(app_state): State<AppState>,
    locale: Locale,
    user: UserContext,
    Query(query): Query<DistributionQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let as_of = query.as_of.unwrap_or_else(today);

    let result: Result<_, AppError> = async {
        let window = Window::new(query.start, query.end)?;
        let mut tx = begin_user_snapshot(&app_state, &user).await?;
        let distribution = app_state
            .report_service
            .status_distribution(&mut *tx, user.0, window, as_of)
            .await?;
        tx.commit().await?;
        Ok(distribution)
    }
    .await;

    let distribution = result.map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(distribution))))
}

// GET /api/reports/aging
#[utoipa::path(
    get,
    path = "/api/reports/aging",
    tag = "Reports",
    params(
        AgingQuery,
        ("x-user-id" = uuid::Uuid, Header, description = "Dono dos dados")
    ),
    responses(
        (status = 200, description = "Em aberto por faixa de atraso", body = Vec<AgingBucket>)
    )
)]
pub async fn get_aging(
    State(app_state): State<AppState>,
    locale: Locale,
    user: UserContext,
    Query(query): Query<AgingQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let as_of = query.as_of.unwrap_or_else(today);

    let result: Result<_, AppError> = async {
        let mut tx = begin_user_snapshot(&app_state, &user).await?;
        let aging = app_state.report_service.aging(&mut *tx, user.0, as_of).await?;
        tx.commit().await?;
        Ok(aging)
    }
    .await;

    let aging = result.map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(aging))))
}

// GET /api/reports/top-clients
#[utoipa::path(
    get,
    path = "/api/reports/top-clients",
    tag = "Reports",
    params(
        TopClientsQuery,
        ("x-user-id" = uuid::Uuid, Header, description = "Dono dos dados")
    ),
    responses(
        (status = 200, description = "Clientes por receita paga", body = Vec<TopClientEntry>),
        (status = 400, description = "Parâmetros inválidos")
    )
)]
pub async fn get_top_clients(
    State(app_state): State<AppState>,
    locale: Locale,
    user: UserContext,
    Query(query): Query<TopClientsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    query
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let result: Result<_, AppError> = async {
        let window = Window::new(query.start, query.end)?;
        let mut tx = begin_user_snapshot(&app_state, &user).await?;
        let clients = app_state
            .report_service
            .top_clients(&mut *tx, user.0, window, query.limit as usize)
            .await?;
        tx.commit().await?;
        Ok(clients)
    }
    .await;

    let clients = result.map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(clients))))
}

// GET /api/reports/forecast
#[utoipa::path(
    get,
    path = "/api/reports/forecast",
    tag = "Reports",
    params(
        ForecastQuery,
        ("x-user-id" = uuid::Uuid, Header, description = "Dono dos dados")
    ),
    responses(
        (status = 200, description = "Entradas previstas por segmento", body = Vec<ForecastPoint>),
        (status = 400, description = "Intervalo ou quantidade de segmentos inválida")
    )
)]
pub async fn get_forecast(
    State(app_state): State<AppState>,
    locale: Locale,
    user: UserContext,
    Query(query): Query<ForecastQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let result: Result<_, AppError> = async {
        let window = Window::new(query.start, query.end)?;
        let mut tx = begin_user_snapshot(&app_state, &user).await?;
        let forecast = app_state
            .report_service
            .forecast(&mut *tx, user.0, window, query.node_count)
            .await?;
        tx.commit().await?;
        Ok(forecast)
    }
    .await;

    let forecast = result.map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(forecast))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dashboard_months_are_bounded() {
        let q: DashboardQuery = serde_json::from_value(json!({})).unwrap();
        assert_eq!(q.months, 12);
        assert!(q.validate().is_ok());

        let q: DashboardQuery = serde_json::from_value(json!({ "months": 36 })).unwrap();
        assert!(q.validate().is_err());
    }

    #[test]
    fn trend_defaults_to_monthly() {
        let q: TrendQuery =
            serde_json::from_value(json!({ "start": "2025-01-01", "end": "2025-04-01" })).unwrap();
        assert_eq!(q.granularity, Granularity::Month);
    }

    #[test]
    fn inverted_window_is_rejected() {
        let q: WindowQuery =
            serde_json::from_value(json!({ "start": "2025-04-01", "end": "2025-01-01" })).unwrap();
        assert!(matches!(q.window(), Err(AppError::InvalidDateRange)));
    }
}
