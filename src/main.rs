//src/main.rs

use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod middleware;
mod models;
mod reports;
mod routes;
mod services;

use crate::config::{AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG sobrescreve o nível padrão
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let config = Config::from_env()?;
    let app_state = AppState::new(config).await?;

    // Faz o app rodar as migrações do SQLx na inicialização
    sqlx::migrate!()
        .run(&app_state.db_pool)
        .await
        .context("Falha ao rodar as migrações do banco de dados")?;

    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    let interval = Duration::from_secs(app_state.config.reminder_interval_secs.max(1));
    let _reminder_job = app_state.reminder_service.clone().spawn(interval);
    tracing::info!(every_secs = interval.as_secs(), "Job de lembretes agendado");

    let app = routes::create_router(app_state.clone());

    let listener = TcpListener::bind(&app_state.config.server_addr)
        .await
        .with_context(|| format!("Falha ao iniciar o listener TCP em {}", app_state.config.server_addr))?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("Erro no servidor Axum")?;

    Ok(())
}
