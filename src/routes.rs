// src/routes.rs

use axum::{
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};

use crate::{config::AppState, docs, handlers};

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn create_router(app_state: AppState) -> Router {
    let client_routes = Router::new()
        .route(
            "/",
            get(handlers::clients::list_clients).post(handlers::clients::create_client),
        )
        .route(
            "/{id}",
            get(handlers::clients::get_client)
                .put(handlers::clients::update_client)
                .delete(handlers::clients::delete_client),
        );

    let invoice_routes = Router::new()
        .route(
            "/",
            get(handlers::invoices::list_invoices).post(handlers::invoices::create_invoice),
        )
        .route("/reconcile-overdue", post(handlers::invoices::reconcile_overdue))
        .route(
            "/{id}",
            get(handlers::invoices::get_invoice)
                .put(handlers::invoices::update_invoice)
                .delete(handlers::invoices::delete_invoice),
        )
        .route("/{id}/send", post(handlers::invoices::send_invoice))
        .route("/{id}/mark-paid", post(handlers::invoices::mark_invoice_paid))
        .route("/{id}/cancel", post(handlers::invoices::cancel_invoice))
        .route(
            "/{id}/payments",
            get(handlers::payments::list_invoice_payments).post(handlers::payments::create_payment),
        );

    let payment_routes = Router::new()
        .route("/{id}", get(handlers::payments::get_payment))
        .route("/{id}/succeed", post(handlers::payments::succeed_payment))
        .route("/{id}/fail", post(handlers::payments::fail_payment))
        .route("/{id}/refund", post(handlers::payments::refund_payment))
        .route("/{id}/events", get(handlers::payments::list_payment_events));

    let report_routes = Router::new()
        .route("/summary", get(handlers::reports::get_summary))
        .route("/dashboard", get(handlers::reports::get_dashboard))
        .route("/revenue-trend", get(handlers::reports::get_revenue_trend))
        .route("/status-distribution", get(handlers::reports::get_status_distribution))
        .route("/aging", get(handlers::reports::get_aging))
        .route("/top-clients", get(handlers::reports::get_top_clients))
        .route("/forecast", get(handlers::reports::get_forecast));

    let integration_routes = Router::new()
        .route(
            "/",
            get(handlers::integrations::list_integrations)
                .post(handlers::integrations::create_integration),
        )
        .route("/sync-logs/due", get(handlers::integrations::list_due_retries))
        .route("/{id}", get(handlers::integrations::get_integration))
        .route("/{id}/active", put(handlers::integrations::set_integration_active))
        .route(
            "/{id}/mappings",
            get(handlers::integrations::list_mappings).put(handlers::integrations::upsert_mapping),
        )
        .route(
            "/{id}/sync-logs",
            get(handlers::integrations::list_sync_logs)
                .post(handlers::integrations::record_sync_attempt),
        )
        .route(
            "/{id}/sync-logs/{log_id}/complete",
            post(handlers::integrations::complete_sync),
        )
        .route(
            "/{id}/sync-logs/{log_id}/fail",
            post(handlers::integrations::fail_sync),
        );

    // Combina tudo no router principal
    Router::new()
        .route("/api/health", get(health))
        .route("/api/openapi.json", get(docs::openapi))
        .nest("/api/clients", client_routes)
        .nest("/api/invoices", invoice_routes)
        .nest("/api/payments", payment_routes)
        .nest("/api/reports", report_routes)
        .nest("/api/integrations", integration_routes)
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    // Pool preguiçosa: nenhuma conexão é aberta enquanto a requisição
    // falhar antes de tocar o banco.
    fn app() -> Router {
        let config = Config {
            database_url: "postgres://localhost/invoicing_test".to_string(),
            server_addr: "127.0.0.1:0".to_string(),
            db_max_connections: 1,
            reminder_interval_secs: 3600,
            reminder_cooldown_days: 7,
            sync_max_retries: 5,
            default_currency: "EUR".to_string(),
        };
        let pool = PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .unwrap();
        create_router(AppState::from_pool(config, pool).unwrap())
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_check() {
        let response = app()
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn openapi_document_lists_the_routes() {
        let response = app()
            .oneshot(Request::get("/api/openapi.json").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let doc = body_json(response).await;
        assert!(doc["paths"]["/api/invoices/{id}/mark-paid"].is_object());
        assert!(doc["paths"]["/api/reports/forecast"].is_object());
    }

    #[tokio::test]
    async fn missing_user_header_is_a_bad_request() {
        let response = app()
            .oneshot(
                Request::get("/api/clients")
                    .header(header::ACCEPT_LANGUAGE, "fr")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert!(body["message"].as_str().unwrap().contains("x-user-id"));
    }

    #[tokio::test]
    async fn invalid_payload_is_rejected_before_the_database() {
        let body = json!({
            "clientId": uuid::Uuid::nil(),
            "issueDate": "2025-09-10",
            "dueDate": "2025-09-01",
            "items": []
        });
        let response = app()
            .oneshot(
                Request::post("/api/invoices")
                    .header("x-user-id", uuid::Uuid::new_v4().to_string())
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert!(body["details"]["items"].is_array());
    }

    #[tokio::test]
    async fn inverted_report_window_is_rejected() {
        let response = app()
            .oneshot(
                Request::get("/api/reports/summary?start=2025-06-01&end=2025-01-01")
                    .header("x-user-id", uuid::Uuid::new_v4().to_string())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
