// src/db/invoice_repo.rs

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Executor, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    common::error::{is_unique_violation, AppError},
    models::invoice::{Invoice, InvoiceFilter, InvoiceItem, InvoiceStatus, NewInvoice, NewInvoiceItem},
    reports::{aggregator::Anchor, Window},
};

/// Chave do advisory lock da numeração, uma por usuário e ano.
fn numbering_lock_key(user_id: Uuid, year: i32) -> String {
    format!("invoice-number:{}:{}", user_id, year)
}

/// Única implementação de acesso às faturas (Postgres).
#[derive(Clone, Default)]
pub struct InvoiceRepository;

impl InvoiceRepository {
    pub fn new() -> Self {
        Self
    }

    // =========================================================================
    //  LEITURA
    // =========================================================================

    pub async fn find_by_user<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        filter: &InvoiceFilter,
    ) -> Result<Vec<Invoice>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM invoices WHERE user_id = ");
        qb.push_bind(user_id);

        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status);
        }
        if let Some(client_id) = filter.client_id {
            qb.push(" AND client_id = ").push_bind(client_id);
        }
        if let Some(from) = filter.from {
            qb.push(" AND issue_date >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            qb.push(" AND issue_date < ").push_bind(to);
        }
        qb.push(" ORDER BY issue_date DESC, invoice_number DESC");

        let invoices = qb.build_query_as::<Invoice>().fetch_all(executor).await?;
        Ok(invoices)
    }

    pub async fn find_by_id<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Invoice>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let invoice = sqlx::query_as::<_, Invoice>(
            "SELECT * FROM invoices WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

        Ok(invoice)
    }

    /// Mesmo que `find_by_id`, mas trava a linha até o fim da transação.
    pub async fn lock_by_id<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Invoice>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let invoice = sqlx::query_as::<_, Invoice>(
            "SELECT * FROM invoices WHERE id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

        Ok(invoice)
    }

    pub async fn find_items<'e, E>(&self, executor: E, invoice_id: Uuid) -> Result<Vec<InvoiceItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let items = sqlx::query_as::<_, InvoiceItem>(
            "SELECT * FROM invoice_items WHERE invoice_id = $1 ORDER BY position ASC",
        )
        .bind(invoice_id)
        .fetch_all(executor)
        .await?;

        Ok(items)
    }

    /// Faturas cuja data âncora cai em `[start, end)`.
    pub async fn find_by_window<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        window: &Window,
        anchor: Anchor,
    ) -> Result<Vec<Invoice>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        // A coluna vem do enum, nunca do usuário
        let sql = format!(
            "SELECT * FROM invoices WHERE user_id = $1 AND {col} >= $2 AND {col} < $3 ORDER BY {col} ASC",
            col = anchor.column()
        );

        let invoices = sqlx::query_as::<_, Invoice>(&sql)
            .bind(user_id)
            .bind(window.start)
            .bind(window.end)
            .fetch_all(executor)
            .await?;

        Ok(invoices)
    }

    /// Faturas emitidas OU pagas na janela: base dos relatórios que misturam
    /// as duas âncoras canônicas.
    pub async fn find_touching_window<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        window: &Window,
    ) -> Result<Vec<Invoice>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let invoices = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT * FROM invoices
            WHERE user_id = $1
              AND ((issue_date >= $2 AND issue_date < $3)
                OR (paid_date >= $2 AND paid_date < $3))
            ORDER BY issue_date ASC
            "#,
        )
        .bind(user_id)
        .bind(window.start)
        .bind(window.end)
        .fetch_all(executor)
        .await?;

        Ok(invoices)
    }

    /// Faturas em aberto (enviadas ou vencidas) do usuário.
    pub async fn find_outstanding<'e, E>(&self, executor: E, user_id: Uuid) -> Result<Vec<Invoice>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let invoices = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT * FROM invoices
            WHERE user_id = $1 AND status IN ('sent', 'overdue')
            ORDER BY due_date ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(executor)
        .await?;

        Ok(invoices)
    }

    /// Faturas que estavam em aberto em `as_of`: emitidas antes e ainda não
    /// pagas naquela data.
    pub async fn find_open_at<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        as_of: NaiveDate,
    ) -> Result<Vec<Invoice>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let invoices = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT * FROM invoices
            WHERE user_id = $1
              AND issue_date < $2
              AND status IN ('sent', 'overdue', 'paid')
              AND (paid_date IS NULL OR paid_date >= $2)
            "#,
        )
        .bind(user_id)
        .bind(as_of)
        .fetch_all(executor)
        .await?;

        Ok(invoices)
    }

    /// Serializa a numeração do usuário no ano até o fim da transação.
    /// Precisa rodar na mesma transação do `next_sequence` e do insert.
    pub async fn lock_numbering<'e, E>(&self, executor: E, user_id: Uuid, year: i32) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(numbering_lock_key(user_id, year))
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Próximo sequencial de `INV-{year}-NNNN` para o usuário.
    pub async fn next_sequence<'e, E>(&self, executor: E, user_id: Uuid, year: i32) -> Result<i32, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let next: i32 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(MAX(SUBSTRING(invoice_number FROM '(\d+)$')::int), 0) + 1
            FROM invoices
            WHERE user_id = $1 AND invoice_number LIKE $2
            "#,
        )
        .bind(user_id)
        .bind(format!("INV-{}-%", year))
        .fetch_one(executor)
        .await?;

        Ok(next)
    }

    // =========================================================================
    //  ESCRITA
    // =========================================================================

    pub async fn create<'e, E>(&self, executor: E, user_id: Uuid, input: &NewInvoice) -> Result<Invoice, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Invoice>(
            r#"
            INSERT INTO invoices (
                user_id, client_id, invoice_number, issue_date, due_date,
                subtotal, tax_amount, total, currency, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(input.client_id)
        .bind(&input.invoice_number)
        .bind(input.issue_date)
        .bind(input.due_date)
        .bind(input.subtotal)
        .bind(input.tax_amount)
        .bind(input.total)
        .bind(&input.currency)
        .bind(input.notes.as_deref())
        .fetch_one(executor)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                return AppError::DuplicateInvoiceNumber;
            }
            AppError::DatabaseError(e)
        })
    }

    pub async fn insert_items<'e, E>(
        &self,
        executor: E,
        invoice_id: Uuid,
        items: &[NewInvoiceItem],
    ) -> Result<Vec<InvoiceItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::<Postgres>::new(
            "INSERT INTO invoice_items (invoice_id, position, description, quantity, unit_price, tax_rate, amount) ",
        );
        qb.push_values(items.iter().enumerate(), |mut row, (idx, item)| {
            row.push_bind(invoice_id)
                .push_bind(idx as i32 + 1)
                .push_bind(item.description.clone())
                .push_bind(item.quantity)
                .push_bind(item.unit_price)
                .push_bind(item.tax_rate)
                .push_bind(item.amount);
        });
        qb.push(" RETURNING *");

        let inserted = qb.build_query_as::<InvoiceItem>().fetch_all(executor).await?;
        Ok(inserted)
    }

    pub async fn delete_items<'e, E>(&self, executor: E, invoice_id: Uuid) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM invoice_items WHERE invoice_id = $1")
            .bind(invoice_id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }

    /// Regrava o cabeçalho de um rascunho (número e usuário não mudam).
    pub async fn update_header<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        id: Uuid,
        input: &NewInvoice,
    ) -> Result<Invoice, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices SET
                client_id = $3,
                issue_date = $4,
                due_date = $5,
                subtotal = $6,
                tax_amount = $7,
                total = $8,
                currency = $9,
                notes = $10,
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(input.client_id)
        .bind(input.issue_date)
        .bind(input.due_date)
        .bind(input.subtotal)
        .bind(input.tax_amount)
        .bind(input.total)
        .bind(&input.currency)
        .bind(input.notes.as_deref())
        .fetch_optional(executor)
        .await?;

        invoice.ok_or(AppError::InvoiceNotFound)
    }

    pub async fn update_status<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        id: Uuid,
        status: InvoiceStatus,
        paid_date: Option<NaiveDate>,
    ) -> Result<Invoice, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices
            SET status = $3, paid_date = $4, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(status)
        .bind(paid_date)
        .fetch_optional(executor)
        .await?;

        invoice.ok_or(AppError::InvoiceNotFound)
    }

    pub async fn delete<'e, E>(&self, executor: E, user_id: Uuid, id: Uuid) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM invoices WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    //  RECONCILIAÇÃO E LEMBRETES (jobs)
    // =========================================================================

    /// Grava `overdue` nas faturas enviadas com vencimento anterior a `as_of`.
    /// `user_id = None` percorre todos os usuários (job de fundo).
    pub async fn mark_overdue_before<'e, E>(
        &self,
        executor: E,
        user_id: Option<Uuid>,
        as_of: NaiveDate,
    ) -> Result<Vec<Uuid>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE invoices
            SET status = 'overdue', updated_at = NOW()
            WHERE status = 'sent'
              AND due_date < $1
              AND ($2::uuid IS NULL OR user_id = $2)
            RETURNING id
            "#,
        )
        .bind(as_of)
        .bind(user_id)
        .fetch_all(executor)
        .await?;

        Ok(ids)
    }

    pub async fn find_reminder_candidates<'e, E>(
        &self,
        executor: E,
        reminded_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Invoice>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let invoices = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT * FROM invoices
            WHERE status = 'overdue'
              AND (last_reminder_at IS NULL OR last_reminder_at < $1)
            ORDER BY due_date ASC
            LIMIT $2
            "#,
        )
        .bind(reminded_before)
        .bind(limit)
        .fetch_all(executor)
        .await?;

        Ok(invoices)
    }

    pub async fn touch_reminder<'e, E>(&self, executor: E, id: Uuid, at: DateTime<Utc>) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE invoices SET last_reminder_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(executor)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbering_lock_is_scoped_by_user_and_year() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(numbering_lock_key(a, 2025), numbering_lock_key(a, 2025));
        assert_ne!(numbering_lock_key(a, 2025), numbering_lock_key(a, 2026));
        assert_ne!(numbering_lock_key(a, 2025), numbering_lock_key(b, 2025));
    }
}
