// src/models/client.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: Uuid,

    #[schema(ignore)]
    pub user_id: Uuid,

    #[schema(example = "Marie Dupont")]
    pub name: String,
    #[schema(example = "Dupont Conseil SARL")]
    pub company: Option<String>,

    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    #[schema(example = "FR")]
    pub country: String,

    // Identificadores franceses
    #[schema(example = "732829320")]
    pub siren: Option<String>,
    #[schema(example = "73282932000074")]
    pub siret: Option<String>,
    #[schema(example = "FR44732829320")]
    pub vat_number: Option<String>,

    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Dados de cliente validados, usados tanto na criação quanto na edição.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClientFields {
    pub name: String,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub siren: Option<String>,
    pub siret: Option<String>,
    pub vat_number: Option<String>,
    pub notes: Option<String>,
}
