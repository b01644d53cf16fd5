// src/models/integration.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "crm_provider", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CrmProvider {
    Hubspot,
    Salesforce,
    Pipedrive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "sync_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Pending,
    Success,
    Failed,
    Abandoned,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Integration {
    pub id: Uuid,
    #[schema(ignore)]
    pub user_id: Uuid,
    pub provider: CrmProvider,
    #[schema(example = "HubSpot principal")]
    pub name: String,
    pub is_active: bool,
    // Configuração livre do conector (JSONB)
    pub settings: Value,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DataMapping {
    pub id: Uuid,
    pub integration_id: Uuid,
    #[schema(example = "client")]
    pub entity_type: String,
    pub local_id: Uuid,
    #[schema(example = "hs-4521")]
    pub remote_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncLog {
    pub id: Uuid,
    pub integration_id: Uuid,
    #[schema(example = "push")]
    pub operation: String,
    #[schema(example = "invoice")]
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub status: SyncStatus,
    pub retry_count: i32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
