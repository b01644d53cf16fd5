// src/config.rs

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{env, str::FromStr, time::Duration};

use crate::{
    common::i18n::I18nStore,
    db::{ClientRepository, IntegrationRepository, InvoiceRepository, PaymentRepository},
    services::{
        client_service::ClientService, invoice_service::InvoiceService,
        payment_service::PaymentService, reminder_service::ReminderService,
        report_service::ReportService, sync_service::SyncService,
    },
};

/// Configuração lida do ambiente (.env incluído).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_addr: String,
    pub db_max_connections: u32,
    pub reminder_interval_secs: u64,
    pub reminder_cooldown_days: i64,
    pub sync_max_retries: i32,
    pub default_currency: String,
}

fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} inválido: '{}'", key, raw)),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").context("DATABASE_URL deve ser definida")?;

        Ok(Self {
            database_url,
            server_addr: env_or("SERVER_ADDR", "0.0.0.0:3000".to_string())?,
            db_max_connections: env_or("DATABASE_MAX_CONNECTIONS", 5)?,
            reminder_interval_secs: env_or("REMINDER_INTERVAL_SECS", 3600)?,
            reminder_cooldown_days: env_or("REMINDER_COOLDOWN_DAYS", 7)?,
            sync_max_retries: env_or("SYNC_MAX_RETRIES", 5)?,
            default_currency: env_or("DEFAULT_CURRENCY", "EUR".to_string())?,
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub config: Config,
    pub i18n_store: I18nStore,
    pub client_service: ClientService,
    pub invoice_service: InvoiceService,
    pub payment_service: PaymentService,
    pub report_service: ReportService,
    pub sync_service: SyncService,
    pub reminder_service: ReminderService,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        // Conecta ao banco de dados, usando '?' para propagar erros
        let db_pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await
            .context("Falha ao conectar ao banco de dados")?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        Self::from_pool(config, db_pool)
    }

    // --- Monta o gráfico de dependências ---
    pub fn from_pool(config: Config, db_pool: PgPool) -> anyhow::Result<Self> {
        let i18n_store = I18nStore::load()?;

        let client_repo = ClientRepository::new();
        let invoice_repo = InvoiceRepository::new();
        let payment_repo = PaymentRepository::new();
        let integration_repo = IntegrationRepository::new();

        let client_service = ClientService::new(client_repo.clone());
        let invoice_service = InvoiceService::new(
            invoice_repo.clone(),
            client_repo.clone(),
            payment_repo.clone(),
            config.default_currency.clone(),
        );
        let payment_service = PaymentService::new(payment_repo, invoice_repo.clone());
        let report_service = ReportService::new(invoice_repo.clone(), client_repo);
        let sync_service = SyncService::new(integration_repo, config.sync_max_retries);
        let reminder_service = ReminderService::new(
            db_pool.clone(),
            invoice_service.clone(),
            invoice_repo,
            config.reminder_cooldown_days,
        );

        Ok(Self {
            db_pool,
            config,
            i18n_store,
            client_service,
            invoice_service,
            payment_service,
            report_service,
            sync_service,
            reminder_service,
        })
    }
}
