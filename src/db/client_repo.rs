// src/db/client_repo.rs

use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::client::{Client, ClientFields},
};

#[derive(Clone, Default)]
pub struct ClientRepository;

impl ClientRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn find_by_user<'e, E>(&self, executor: E, user_id: Uuid) -> Result<Vec<Client>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let clients = sqlx::query_as::<_, Client>(
            "SELECT * FROM clients WHERE user_id = $1 ORDER BY name ASC",
        )
        .bind(user_id)
        .fetch_all(executor)
        .await?;

        Ok(clients)
    }

    pub async fn find_by_id<'e, E>(&self, executor: E, user_id: Uuid, id: Uuid) -> Result<Option<Client>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let client = sqlx::query_as::<_, Client>(
            "SELECT * FROM clients WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

        Ok(client)
    }

    /// Nomes de exibição (empresa, senão o nome) para os ids pedidos.
    pub async fn display_names<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        ids: &[Uuid],
    ) -> Result<Vec<(Uuid, String)>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, (Uuid, String)>(
            r#"
            SELECT id, COALESCE(NULLIF(company, ''), name)
            FROM clients
            WHERE user_id = $1 AND id = ANY($2)
            "#,
        )
        .bind(user_id)
        .bind(ids)
        .fetch_all(executor)
        .await?;

        Ok(rows)
    }

    pub async fn create<'e, E>(&self, executor: E, user_id: Uuid, input: &ClientFields) -> Result<Client, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let client = sqlx::query_as::<_, Client>(
            r#"
            INSERT INTO clients (
                user_id, name, company, email, phone, address, city, postal_code,
                country, siren, siret, vat_number, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, COALESCE($9, 'FR'), $10, $11, $12, $13)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(&input.name)
        .bind(input.company.as_deref())
        .bind(input.email.as_deref())
        .bind(input.phone.as_deref())
        .bind(input.address.as_deref())
        .bind(input.city.as_deref())
        .bind(input.postal_code.as_deref())
        .bind(input.country.as_deref())
        .bind(input.siren.as_deref())
        .bind(input.siret.as_deref())
        .bind(input.vat_number.as_deref())
        .bind(input.notes.as_deref())
        .fetch_one(executor)
        .await?;

        Ok(client)
    }

    pub async fn update<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        id: Uuid,
        input: &ClientFields,
    ) -> Result<Option<Client>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let client = sqlx::query_as::<_, Client>(
            r#"
            UPDATE clients SET
                name = $3,
                company = $4,
                email = $5,
                phone = $6,
                address = $7,
                city = $8,
                postal_code = $9,
                country = COALESCE($10, country),
                siren = $11,
                siret = $12,
                vat_number = $13,
                notes = $14,
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(&input.name)
        .bind(input.company.as_deref())
        .bind(input.email.as_deref())
        .bind(input.phone.as_deref())
        .bind(input.address.as_deref())
        .bind(input.city.as_deref())
        .bind(input.postal_code.as_deref())
        .bind(input.country.as_deref())
        .bind(input.siren.as_deref())
        .bind(input.siret.as_deref())
        .bind(input.vat_number.as_deref())
        .bind(input.notes.as_deref())
        .fetch_optional(executor)
        .await?;

        Ok(client)
    }

    pub async fn delete<'e, E>(&self, executor: E, user_id: Uuid, id: Uuid) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM clients WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn count_invoices<'e, E>(&self, executor: E, client_id: Uuid) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invoices WHERE client_id = $1")
            .bind(client_id)
            .fetch_one(executor)
            .await?;

        Ok(count)
    }
}
