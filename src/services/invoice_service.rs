// src/services/invoice_service.rs

use chrono::{Datelike, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use sqlx::{Acquire, Executor, PgConnection, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{ClientRepository, InvoiceRepository, PaymentRepository},
    models::{
        invoice::{
            Invoice, InvoiceDetail, InvoiceFilter, InvoiceStatus, InvoiceSummary, NewInvoice, NewInvoiceItem,
        },
        payment::PaymentStatus,
    },
    reports::status::classify,
};

// ---
// Cálculo de valores (puro)
// ---

/// Arredonda para centavos, meio para longe do zero.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Linha informada pelo usuário, antes do cálculo.
#[derive(Debug, Clone)]
pub struct LineInput {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub tax_rate: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Totals {
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
}

/// Maior valor monetário que cabe em NUMERIC(14,2).
pub const MAX_MONEY: Decimal = Decimal::from_parts(276_447_231, 23_283, 0, false, 2);

/// Maior quantidade que cabe em NUMERIC(12,3).
pub const MAX_QUANTITY: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 3);

fn capped(value: Option<Decimal>) -> Result<Decimal, AppError> {
    value
        .filter(|v| v.abs() <= MAX_MONEY)
        .ok_or(AppError::AmountOutOfRange)
}

/// Calcula o valor de cada linha e os totais da fatura. Cada imposto é
/// arredondado por linha antes de somar. Qualquer valor que não caiba nas
/// colunas monetárias vira `AmountOutOfRange`.
pub fn price_lines(lines: &[LineInput]) -> Result<(Vec<NewInvoiceItem>, Totals), AppError> {
    let mut totals = Totals::default();
    let mut items = Vec::with_capacity(lines.len());

    for line in lines {
        let amount = capped(line.quantity.checked_mul(line.unit_price).map(round2))?;
        let tax = capped(
            amount
                .checked_mul(line.tax_rate)
                .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED))
                .map(round2),
        )?;
        totals.subtotal = capped(totals.subtotal.checked_add(amount))?;
        totals.tax_amount = capped(totals.tax_amount.checked_add(tax))?;

        items.push(NewInvoiceItem {
            description: line.description.trim().to_string(),
            quantity: line.quantity,
            unit_price: line.unit_price,
            tax_rate: line.tax_rate,
            amount,
        });
    }

    totals.total = capped(totals.subtotal.checked_add(totals.tax_amount))?;
    Ok((items, totals))
}

pub fn format_invoice_number(year: i32, sequence: i32) -> String {
    format!("INV-{}-{:04}", year, sequence)
}

/// Tabela de transições manuais. `paid -> sent` fica de fora: só acontece
/// pelo estorno de um pagamento.
pub fn can_transition(from: InvoiceStatus, to: InvoiceStatus) -> bool {
    use InvoiceStatus::*;
    matches!(
        (from, to),
        (Draft, Sent)
            | (Draft, Cancelled)
            | (Sent, Paid)
            | (Sent, Overdue)
            | (Sent, Cancelled)
            | (Overdue, Paid)
            | (Overdue, Sent)
            | (Overdue, Cancelled)
    )
}

/// Dados de criação/edição de uma fatura, já validados pelo handler.
#[derive(Debug, Clone)]
pub struct InvoiceDraft {
    pub client_id: Uuid,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub currency: Option<String>,
    pub notes: Option<String>,
    pub lines: Vec<LineInput>,
}

#[derive(Clone)]
pub struct InvoiceService {
    repo: InvoiceRepository,
    client_repo: ClientRepository,
    payment_repo: PaymentRepository,
    default_currency: String,
}

impl InvoiceService {
    pub fn new(
        repo: InvoiceRepository,
        client_repo: ClientRepository,
        payment_repo: PaymentRepository,
        default_currency: String,
    ) -> Self {
        Self {
            repo,
            client_repo,
            payment_repo,
            default_currency,
        }
    }

    fn currency_of(&self, draft: &InvoiceDraft) -> String {
        draft
            .currency
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(&self.default_currency)
            .to_ascii_uppercase()
    }

    // --- LEITURA ---

    /// Lista com o status de exibição calculado na leitura. Nada é gravado.
    pub async fn list<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        filter: &InvoiceFilter,
        as_of: NaiveDate,
    ) -> Result<Vec<InvoiceSummary>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let invoices = self.repo.find_by_user(executor, user_id, filter).await?;

        Ok(invoices
            .into_iter()
            .map(|invoice| InvoiceSummary {
                display_status: classify(&invoice, as_of),
                invoice,
            })
            .collect())
    }

    pub async fn get<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        id: Uuid,
        as_of: NaiveDate,
    ) -> Result<InvoiceDetail, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres, Connection = &'e mut PgConnection>,
    {
        let mut conn = executor.acquire().await?;
        let invoice = self
            .repo
            .find_by_id(&mut *conn, user_id, id)
            .await?
            .ok_or(AppError::InvoiceNotFound)?;

        self.detail(&mut *conn, user_id, invoice, as_of).await
    }

    /// Monta a visão completa (linhas, cliente, saldo) de uma fatura já lida.
    async fn detail(
        &self,
        conn: &mut PgConnection,
        user_id: Uuid,
        invoice: Invoice,
        as_of: NaiveDate,
    ) -> Result<InvoiceDetail, AppError> {
        let items = self.repo.find_items(&mut *conn, invoice.id).await?;

        let client = self
            .client_repo
            .find_by_id(&mut *conn, user_id, invoice.client_id)
            .await?
            .ok_or(AppError::ClientNotFound)?;
        let client_name = client
            .company
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(client.name);

        let amount_paid = self
            .payment_repo
            .total_for_invoice(&mut *conn, invoice.id, &[PaymentStatus::Succeeded])
            .await?;
        let balance_due = (invoice.amount() - amount_paid).max(Decimal::ZERO);

        Ok(InvoiceDetail {
            display_status: classify(&invoice, as_of),
            header: invoice,
            client_name,
            items,
            amount_paid,
            balance_due,
        })
    }

    // --- ESCRITA ---

    /// Cria um rascunho numerado `INV-{ano}-NNNN` com as linhas calculadas.
    pub async fn create<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        draft: &InvoiceDraft,
        as_of: NaiveDate,
    ) -> Result<InvoiceDetail, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        self.client_repo
            .find_by_id(&mut *tx, user_id, draft.client_id)
            .await?
            .ok_or(AppError::ClientNotFound)?;

        let (items, totals) = price_lines(&draft.lines)?;

        let year = draft.issue_date.year();
        // Dois creates simultâneos leriam o mesmo MAX()
        self.repo.lock_numbering(&mut *tx, user_id, year).await?;
        let sequence = self.repo.next_sequence(&mut *tx, user_id, year).await?;

        let header = NewInvoice {
            client_id: draft.client_id,
            invoice_number: format_invoice_number(year, sequence),
            issue_date: draft.issue_date,
            due_date: draft.due_date,
            subtotal: totals.subtotal,
            tax_amount: totals.tax_amount,
            total: totals.total,
            currency: self.currency_of(draft),
            notes: draft.notes.clone(),
        };

        let invoice = self.repo.create(&mut *tx, user_id, &header).await?;
        self.repo.insert_items(&mut *tx, invoice.id, &items).await?;

        let detail = self.detail(&mut *tx, user_id, invoice, as_of).await?;
        tx.commit().await?;

        tracing::info!(
            user_id = %user_id,
            invoice_id = %detail.header.id,
            number = %detail.header.invoice_number,
            "Fatura criada"
        );
        Ok(detail)
    }

    /// Regrava cabeçalho e linhas. Só rascunhos podem ser editados.
    pub async fn update<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        id: Uuid,
        draft: &InvoiceDraft,
        as_of: NaiveDate,
    ) -> Result<InvoiceDetail, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let current = self
            .repo
            .lock_by_id(&mut *tx, user_id, id)
            .await?
            .ok_or(AppError::InvoiceNotFound)?;
        if current.status != InvoiceStatus::Draft {
            return Err(AppError::InvoiceNotEditable(current.status));
        }

        self.client_repo
            .find_by_id(&mut *tx, user_id, draft.client_id)
            .await?
            .ok_or(AppError::ClientNotFound)?;

        let (items, totals) = price_lines(&draft.lines)?;
        let header = NewInvoice {
            client_id: draft.client_id,
            invoice_number: current.invoice_number,
            issue_date: draft.issue_date,
            due_date: draft.due_date,
            subtotal: totals.subtotal,
            tax_amount: totals.tax_amount,
            total: totals.total,
            currency: self.currency_of(draft),
            notes: draft.notes.clone(),
        };

        let invoice = self.repo.update_header(&mut *tx, user_id, id, &header).await?;
        self.repo.delete_items(&mut *tx, id).await?;
        self.repo.insert_items(&mut *tx, id, &items).await?;

        let detail = self.detail(&mut *tx, user_id, invoice, as_of).await?;
        tx.commit().await?;
        Ok(detail)
    }

    pub async fn delete<'e, E>(&self, executor: E, user_id: Uuid, id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let current = self
            .repo
            .lock_by_id(&mut *tx, user_id, id)
            .await?
            .ok_or(AppError::InvoiceNotFound)?;
        if current.status != InvoiceStatus::Draft {
            return Err(AppError::InvoiceNotEditable(current.status));
        }

        self.repo.delete(&mut *tx, user_id, id).await?;
        tx.commit().await?;

        tracing::info!(user_id = %user_id, invoice_id = %id, "Rascunho removido");
        Ok(())
    }

    // --- TRANSIÇÕES ---

    /// Aplica uma transição manual. Ao entrar em `paid` grava `paid_date`
    /// (a informada ou `today`); ao sair de `paid` a data é limpa.
    pub async fn transition<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        id: Uuid,
        target: InvoiceStatus,
        paid_date: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<Invoice, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let current = self
            .repo
            .lock_by_id(&mut *tx, user_id, id)
            .await?
            .ok_or(AppError::InvoiceNotFound)?;

        if !can_transition(current.status, target) {
            return Err(AppError::InvalidStatusTransition {
                from: current.status,
                to: target,
            });
        }

        let paid_date = match target {
            InvoiceStatus::Paid => Some(paid_date.unwrap_or(today)),
            _ => None,
        };

        let invoice = self
            .repo
            .update_status(&mut *tx, user_id, id, target, paid_date)
            .await?;
        tx.commit().await?;

        tracing::info!(
            user_id = %user_id,
            invoice_id = %id,
            from = %current.status,
            to = %target,
            "Status da fatura alterado"
        );
        Ok(invoice)
    }

    /// Grava `overdue` nas faturas enviadas e vencidas em `as_of`.
    /// `user_id = None` reconcilia todos os usuários.
    pub async fn reconcile_overdue<'e, E>(
        &self,
        executor: E,
        user_id: Option<Uuid>,
        as_of: NaiveDate,
    ) -> Result<Vec<Uuid>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let ids = self.repo.mark_overdue_before(executor, user_id, as_of).await?;
        if !ids.is_empty() {
            tracing::info!(count = ids.len(), as_of = %as_of, "Faturas marcadas como vencidas");
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn line(quantity: Decimal, unit_price: Decimal, tax_rate: Decimal) -> LineInput {
        LineInput {
            description: " Consultoria ".to_string(),
            quantity,
            unit_price,
            tax_rate,
        }
    }

    #[test]
    fn round2_goes_half_away_from_zero() {
        assert_eq!(round2(dec!(0.125)), dec!(0.13));
        assert_eq!(round2(dec!(0.135)), dec!(0.14));
        assert_eq!(round2(dec!(-0.125)), dec!(-0.13));
        assert_eq!(round2(dec!(10.004)), dec!(10.00));
    }

    #[test]
    fn lines_are_priced_and_summed() {
        let (items, totals) = price_lines(&[
            line(dec!(10), dec!(100), dec!(20)),
            line(dec!(1.5), dec!(0.33), dec!(5.5)),
        ])
        .unwrap();

        assert_eq!(items[0].amount, dec!(1000.00));
        // 1.5 * 0.33 = 0.495 -> 0.50
        assert_eq!(items[1].amount, dec!(0.50));
        assert_eq!(items[0].description, "Consultoria");

        assert_eq!(totals.subtotal, dec!(1000.50));
        // 200.00 + round2(0.50 * 5.5%) = 200.00 + 0.03
        assert_eq!(totals.tax_amount, dec!(200.03));
        assert_eq!(totals.total, dec!(1200.53));
    }

    #[test]
    fn empty_lines_give_zero_totals() {
        let (items, totals) = price_lines(&[]).unwrap();
        assert!(items.is_empty());
        assert_eq!(totals, Totals::default());
    }

    #[test]
    fn money_limits_match_the_columns() {
        assert_eq!(MAX_MONEY, Decimal::new(99_999_999_999_999, 2));
        assert_eq!(MAX_QUANTITY, Decimal::new(999_999_999_999, 3));
    }

    #[test]
    fn huge_lines_are_rejected_instead_of_panicking() {
        // estoura a mantissa de 96 bits
        let huge = Decimal::from_i128_with_scale(10_i128.pow(20), 0);
        let err = price_lines(&[line(huge, huge, dec!(0))]).unwrap_err();
        assert!(matches!(err, AppError::AmountOutOfRange));

        // cabe no Decimal mas não em NUMERIC(14,2)
        let billion = Decimal::from(1_000_000_000_i64);
        let err = price_lines(&[line(billion, billion, dec!(0))]).unwrap_err();
        assert!(matches!(err, AppError::AmountOutOfRange));
    }

    #[test]
    fn totals_are_capped_even_when_each_line_fits() {
        let big = line(dec!(1), Decimal::from(600_000_000_000_i64), dec!(0));
        assert!(price_lines(std::slice::from_ref(&big)).is_ok());
        let err = price_lines(&[big.clone(), big]).unwrap_err();
        assert!(matches!(err, AppError::AmountOutOfRange));

        // a linha cabe, o imposto também, mas a soma não
        let taxed = line(dec!(1), Decimal::from(900_000_000_000_i64), dec!(20));
        assert!(matches!(price_lines(&[taxed]), Err(AppError::AmountOutOfRange)));
    }

    #[test]
    fn invoice_numbers_are_zero_padded() {
        assert_eq!(format_invoice_number(2025, 7), "INV-2025-0007");
        assert_eq!(format_invoice_number(2025, 12345), "INV-2025-12345");
    }

    #[test]
    fn transition_table() {
        use InvoiceStatus::*;

        assert!(can_transition(Draft, Sent));
        assert!(can_transition(Draft, Cancelled));
        assert!(!can_transition(Draft, Paid));

        assert!(can_transition(Sent, Paid));
        assert!(can_transition(Sent, Overdue));
        assert!(can_transition(Overdue, Paid));
        assert!(can_transition(Overdue, Sent));

        // estados finais para transições manuais
        assert!(!can_transition(Paid, Sent));
        assert!(!can_transition(Paid, Cancelled));
        for to in InvoiceStatus::ALL {
            assert!(!can_transition(Cancelled, to));
        }
    }
}
