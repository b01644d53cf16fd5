// src/db/payment_repo.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::payment::{Payment, PaymentEvent, PaymentStatus},
};

#[derive(Clone, Default)]
pub struct PaymentRepository;

impl PaymentRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn create<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        invoice_id: Uuid,
        amount: Decimal,
        currency: &str,
        method: &str,
        reference: Option<&str>,
    ) -> Result<Payment, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (user_id, invoice_id, amount, currency, method, reference)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(invoice_id)
        .bind(amount)
        .bind(currency)
        .bind(method)
        .bind(reference)
        .fetch_one(executor)
        .await?;

        Ok(payment)
    }

    pub async fn find_by_id<'e, E>(&self, executor: E, user_id: Uuid, id: Uuid) -> Result<Option<Payment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let payment = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

        Ok(payment)
    }

    /// Trava o pagamento até o fim da transação.
    pub async fn lock_by_id<'e, E>(&self, executor: E, user_id: Uuid, id: Uuid) -> Result<Option<Payment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let payment = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

        Ok(payment)
    }

    pub async fn find_by_invoice<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Vec<Payment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT * FROM payments
            WHERE invoice_id = $1 AND user_id = $2
            ORDER BY created_at ASC
            "#,
        )
        .bind(invoice_id)
        .bind(user_id)
        .fetch_all(executor)
        .await?;

        Ok(payments)
    }

    pub async fn update_status<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        status: PaymentStatus,
        paid_at: Option<NaiveDate>,
        failure_reason: Option<&str>,
    ) -> Result<Payment, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            UPDATE payments
            SET status = $2,
                paid_at = COALESCE($3, paid_at),
                failure_reason = $4,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(paid_at)
        .bind(failure_reason)
        .fetch_optional(executor)
        .await?;

        payment.ok_or(AppError::PaymentNotFound)
    }

    /// Soma dos pagamentos da fatura nos status pedidos.
    pub async fn total_for_invoice<'e, E>(
        &self,
        executor: E,
        invoice_id: Uuid,
        statuses: &[PaymentStatus],
    ) -> Result<Decimal, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let total: Decimal = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(amount), 0)
            FROM payments
            WHERE invoice_id = $1 AND status = ANY($2)
            "#,
        )
        .bind(invoice_id)
        .bind(statuses)
        .fetch_one(executor)
        .await?;

        Ok(total)
    }

    // --- Log de eventos (somente inserção) ---

    pub async fn append_event<'e, E>(
        &self,
        executor: E,
        payment_id: Uuid,
        kind: &str,
        from_status: Option<PaymentStatus>,
        to_status: PaymentStatus,
        amount: Decimal,
        note: Option<&str>,
    ) -> Result<PaymentEvent, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let event = sqlx::query_as::<_, PaymentEvent>(
            r#"
            INSERT INTO payment_events (payment_id, kind, from_status, to_status, amount, note)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(payment_id)
        .bind(kind)
        .bind(from_status)
        .bind(to_status)
        .bind(amount)
        .bind(note)
        .fetch_one(executor)
        .await?;

        Ok(event)
    }

    pub async fn list_events<'e, E>(&self, executor: E, payment_id: Uuid) -> Result<Vec<PaymentEvent>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let events = sqlx::query_as::<_, PaymentEvent>(
            "SELECT * FROM payment_events WHERE payment_id = $1 ORDER BY created_at ASC",
        )
        .bind(payment_id)
        .fetch_all(executor)
        .await?;

        Ok(events)
    }
}
