// src/services/payment_service.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{Acquire, Executor, PgConnection, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{InvoiceRepository, PaymentRepository},
    models::{
        invoice::{Invoice, InvoiceStatus},
        payment::{Payment, PaymentEvent, PaymentStatus},
    },
};

/// Saldo ainda aceito para novos pagamentos: total menos o que já foi pago
/// ou está pendente.
pub fn remaining_balance(invoice_total: Decimal, committed: Decimal) -> Decimal {
    (invoice_total - committed).max(Decimal::ZERO)
}

/// A fatura fica quitada quando os pagamentos confirmados cobrem o total.
pub fn covers_total(invoice_total: Decimal, succeeded: Decimal) -> bool {
    invoice_total > Decimal::ZERO && succeeded >= invoice_total
}

fn check_transition(from: PaymentStatus, to: PaymentStatus) -> Result<(), AppError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(AppError::InvalidPaymentTransition { from, to })
    }
}

#[derive(Clone)]
pub struct PaymentService {
    repo: PaymentRepository,
    invoice_repo: InvoiceRepository,
}

impl PaymentService {
    pub fn new(repo: PaymentRepository, invoice_repo: InvoiceRepository) -> Self {
        Self { repo, invoice_repo }
    }

    async fn lock_invoice(&self, conn: &mut PgConnection, user_id: Uuid, invoice_id: Uuid) -> Result<Invoice, AppError> {
        self.invoice_repo
            .lock_by_id(conn, user_id, invoice_id)
            .await?
            .ok_or(AppError::InvoiceNotFound)
    }

    async fn lock_payment(&self, conn: &mut PgConnection, user_id: Uuid, id: Uuid) -> Result<Payment, AppError> {
        self.repo
            .lock_by_id(conn, user_id, id)
            .await?
            .ok_or(AppError::PaymentNotFound)
    }

    // --- LEITURA ---

    pub async fn get<'e, E>(&self, executor: E, user_id: Uuid, id: Uuid) -> Result<Payment, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo
            .find_by_id(executor, user_id, id)
            .await?
            .ok_or(AppError::PaymentNotFound)
    }

    pub async fn list_for_invoice<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Vec<Payment>, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres, Connection = &'e mut PgConnection>,
    {
        let mut conn = executor.acquire().await?;
        self.invoice_repo
            .find_by_id(&mut *conn, user_id, invoice_id)
            .await?
            .ok_or(AppError::InvoiceNotFound)?;

        self.repo.find_by_invoice(&mut *conn, user_id, invoice_id).await
    }

    pub async fn list_events<'e, E>(&self, executor: E, user_id: Uuid, id: Uuid) -> Result<Vec<PaymentEvent>, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres, Connection = &'e mut PgConnection>,
    {
        let mut conn = executor.acquire().await?;
        self.repo
            .find_by_id(&mut *conn, user_id, id)
            .await?
            .ok_or(AppError::PaymentNotFound)?;

        self.repo.list_events(&mut *conn, id).await
    }

    // --- CICLO DE VIDA ---

    /// Registra um pagamento `pending` contra uma fatura em aberto.
    pub async fn create<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        invoice_id: Uuid,
        amount: Decimal,
        method: &str,
        reference: Option<&str>,
    ) -> Result<Payment, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let invoice = self.lock_invoice(&mut *tx, user_id, invoice_id).await?;
        match invoice.status {
            InvoiceStatus::Sent | InvoiceStatus::Overdue => {}
            InvoiceStatus::Paid => return Err(AppError::PaymentExceedsBalance),
            other => {
                return Err(AppError::InvalidStatusTransition {
                    from: other,
                    to: InvoiceStatus::Paid,
                })
            }
        }

        let committed = self
            .repo
            .total_for_invoice(&mut *tx, invoice_id, &[PaymentStatus::Pending, PaymentStatus::Succeeded])
            .await?;
        if amount <= Decimal::ZERO || amount > remaining_balance(invoice.amount(), committed) {
            return Err(AppError::PaymentExceedsBalance);
        }

        let payment = self
            .repo
            .create(&mut *tx, user_id, invoice_id, amount, &invoice.currency, method, reference)
            .await?;
        self.repo
            .append_event(&mut *tx, payment.id, "created", None, PaymentStatus::Pending, amount, None)
            .await?;

        tx.commit().await?;

        tracing::info!(
            user_id = %user_id,
            invoice_id = %invoice_id,
            payment_id = %payment.id,
            amount = %amount,
            "Pagamento registrado"
        );
        Ok(payment)
    }

    /// Confirma o pagamento. Se os confirmados cobrirem o total, a fatura
    /// passa a `paid` com `paid_date` igual à data do pagamento.
    pub async fn succeed<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        id: Uuid,
        paid_at: NaiveDate,
    ) -> Result<Payment, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let current = self.lock_payment(&mut *tx, user_id, id).await?;
        check_transition(current.status, PaymentStatus::Succeeded)?;

        // Trava a fatura antes de somar, para dois pagamentos simultâneos
        // não quitarem a mesma fatura duas vezes
        let invoice = self.lock_invoice(&mut *tx, user_id, current.invoice_id).await?;

        let payment = self
            .repo
            .update_status(&mut *tx, id, PaymentStatus::Succeeded, Some(paid_at), None)
            .await?;
        self.repo
            .append_event(
                &mut *tx,
                id,
                "succeeded",
                Some(current.status),
                PaymentStatus::Succeeded,
                payment.amount,
                None,
            )
            .await?;

        let succeeded = self
            .repo
            .total_for_invoice(&mut *tx, invoice.id, &[PaymentStatus::Succeeded])
            .await?;

        let settles = matches!(invoice.status, InvoiceStatus::Sent | InvoiceStatus::Overdue)
            && covers_total(invoice.amount(), succeeded);
        if settles {
            self.invoice_repo
                .update_status(&mut *tx, user_id, invoice.id, InvoiceStatus::Paid, Some(paid_at))
                .await?;
        }

        tx.commit().await?;

        if settles {
            tracing::info!(invoice_id = %invoice.id, paid_date = %paid_at, "Fatura quitada");
        }
        Ok(payment)
    }

    pub async fn fail<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        id: Uuid,
        reason: Option<&str>,
    ) -> Result<Payment, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let current = self.lock_payment(&mut *tx, user_id, id).await?;
        check_transition(current.status, PaymentStatus::Failed)?;

        let payment = self
            .repo
            .update_status(&mut *tx, id, PaymentStatus::Failed, None, reason)
            .await?;
        self.repo
            .append_event(
                &mut *tx,
                id,
                "failed",
                Some(current.status),
                PaymentStatus::Failed,
                payment.amount,
                reason,
            )
            .await?;

        tx.commit().await?;

        tracing::warn!(payment_id = %id, reason = ?reason, "Pagamento recusado");
        Ok(payment)
    }

    /// Estorna um pagamento confirmado. Se a fatura estava quitada e deixa de
    /// estar coberta, volta a `sent` e perde a `paid_date`.
    pub async fn refund<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        id: Uuid,
        note: Option<&str>,
    ) -> Result<Payment, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let current = self.lock_payment(&mut *tx, user_id, id).await?;
        check_transition(current.status, PaymentStatus::Refunded)?;

        let invoice = self.lock_invoice(&mut *tx, user_id, current.invoice_id).await?;

        let payment = self
            .repo
            .update_status(&mut *tx, id, PaymentStatus::Refunded, None, None)
            .await?;
        self.repo
            .append_event(
                &mut *tx,
                id,
                "refunded",
                Some(current.status),
                PaymentStatus::Refunded,
                payment.amount,
                note,
            )
            .await?;

        let succeeded = self
            .repo
            .total_for_invoice(&mut *tx, invoice.id, &[PaymentStatus::Succeeded])
            .await?;

        let reopens = invoice.status == InvoiceStatus::Paid && !covers_total(invoice.amount(), succeeded);
        if reopens {
            self.invoice_repo
                .update_status(&mut *tx, user_id, invoice.id, InvoiceStatus::Sent, None)
                .await?;
        }

        tx.commit().await?;

        tracing::info!(payment_id = %id, invoice_reopened = reopens, "Pagamento estornado");
        Ok(payment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn remaining_balance_never_goes_negative() {
        assert_eq!(remaining_balance(dec!(1200), dec!(0)), dec!(1200));
        assert_eq!(remaining_balance(dec!(1200), dec!(600)), dec!(600));
        assert_eq!(remaining_balance(dec!(1200), dec!(1500)), Decimal::ZERO);
    }

    #[test]
    fn partial_payments_do_not_settle() {
        assert!(!covers_total(dec!(1200), dec!(600)));
        assert!(covers_total(dec!(1200), dec!(1200)));
        assert!(covers_total(dec!(1200), dec!(1200.01)));
        // fatura sem valor nunca é quitada por pagamento
        assert!(!covers_total(Decimal::ZERO, Decimal::ZERO));
    }

    #[test]
    fn payment_transitions() {
        assert!(check_transition(PaymentStatus::Pending, PaymentStatus::Succeeded).is_ok());
        assert!(check_transition(PaymentStatus::Pending, PaymentStatus::Failed).is_ok());
        assert!(check_transition(PaymentStatus::Succeeded, PaymentStatus::Refunded).is_ok());

        let err = check_transition(PaymentStatus::Failed, PaymentStatus::Succeeded).unwrap_err();
        assert!(matches!(
            err,
            AppError::InvalidPaymentTransition {
                from: PaymentStatus::Failed,
                to: PaymentStatus::Succeeded
            }
        ));
        assert!(check_transition(PaymentStatus::Pending, PaymentStatus::Refunded).is_err());
        assert!(check_transition(PaymentStatus::Refunded, PaymentStatus::Succeeded).is_err());
    }
}
