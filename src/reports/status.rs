// src/reports/status.rs

use chrono::NaiveDate;

use crate::models::invoice::{Invoice, InvoiceStatus};

/// Status de exibição de uma fatura em `as_of`.
///
/// O status gravado pode estar defasado: uma fatura `sent` cujo vencimento já
/// passou é exibida como `overdue`. A função não grava nada; quem persiste o
/// `overdue` é a reconciliação explícita (`InvoiceService::reconcile_overdue`).
pub fn classify(invoice: &Invoice, as_of: NaiveDate) -> InvoiceStatus {
    match invoice.status {
        InvoiceStatus::Sent | InvoiceStatus::Overdue if invoice.due_date < as_of => InvoiceStatus::Overdue,
        stored => stored,
    }
}

/// Em aberto = enviada e ainda não paga.
pub fn is_outstanding(status: InvoiceStatus) -> bool {
    matches!(status, InvoiceStatus::Sent | InvoiceStatus::Overdue)
}

/// Em aberto no fim do dia `as_of`: já emitida e ainda não paga naquela
/// data. Uma fatura paga depois de `as_of` conta como aberta.
pub fn is_open_at(invoice: &Invoice, as_of: NaiveDate) -> bool {
    if invoice.issue_date > as_of {
        return false;
    }
    match invoice.status {
        InvoiceStatus::Sent | InvoiceStatus::Overdue => true,
        InvoiceStatus::Paid => invoice.paid_date.is_some_and(|d| d > as_of),
        InvoiceStatus::Draft | InvoiceStatus::Cancelled => false,
    }
}

pub fn days_past_due(invoice: &Invoice, as_of: NaiveDate) -> i64 {
    (as_of - invoice.due_date).num_days().max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::fixtures::{date, invoice};
    use rust_decimal_macros::dec;

    #[test]
    fn sent_past_due_is_displayed_overdue() {
        let inv = invoice(InvoiceStatus::Sent, date(2025, 8, 1), None, Some(dec!(10)));
        // vence em 2025-08-31
        assert_eq!(classify(&inv, date(2025, 8, 31)), InvoiceStatus::Sent);
        assert_eq!(classify(&inv, date(2025, 9, 1)), InvoiceStatus::Overdue);
    }

    #[test]
    fn paid_draft_and_cancelled_keep_stored_status() {
        let as_of = date(2026, 1, 1);
        for status in [InvoiceStatus::Paid, InvoiceStatus::Draft, InvoiceStatus::Cancelled] {
            let paid = (status == InvoiceStatus::Paid).then(|| date(2025, 8, 3));
            let inv = invoice(status, date(2025, 8, 1), paid, Some(dec!(10)));
            assert_eq!(classify(&inv, as_of), status);
        }
    }

    #[test]
    fn stored_overdue_with_extended_due_date_stays_overdue() {
        let mut inv = invoice(InvoiceStatus::Overdue, date(2025, 8, 1), None, Some(dec!(10)));
        inv.due_date = date(2025, 12, 1);
        assert_eq!(classify(&inv, date(2025, 9, 1)), InvoiceStatus::Overdue);
    }

    #[test]
    fn classify_is_pure() {
        let inv = invoice(InvoiceStatus::Sent, date(2025, 8, 1), None, Some(dec!(10)));
        let before = format!("{:?}", inv);
        let as_of = date(2025, 10, 1);
        let first = classify(&inv, as_of);
        let second = classify(&inv, as_of);
        assert_eq!(first, second);
        assert_eq!(inv.status, InvoiceStatus::Sent);
        assert_eq!(format!("{:?}", inv), before);
    }

    #[test]
    fn open_at_looks_at_the_date_not_the_stored_status() {
        let as_of = date(2025, 9, 30);

        let sent = invoice(InvoiceStatus::Sent, date(2025, 9, 1), None, Some(dec!(10)));
        assert!(is_open_at(&sent, as_of));

        // emitida depois da data de corte
        let later = invoice(InvoiceStatus::Sent, date(2025, 10, 2), None, Some(dec!(10)));
        assert!(!is_open_at(&later, as_of));

        // paga depois da data de corte: ainda devia em 30/09
        let paid_later = invoice(InvoiceStatus::Paid, date(2025, 9, 1), Some(date(2025, 10, 5)), Some(dec!(10)));
        assert!(is_open_at(&paid_later, as_of));

        let paid_on_day = invoice(InvoiceStatus::Paid, date(2025, 9, 1), Some(as_of), Some(dec!(10)));
        assert!(!is_open_at(&paid_on_day, as_of));

        let draft = invoice(InvoiceStatus::Draft, date(2025, 9, 1), None, None);
        assert!(!is_open_at(&draft, as_of));
    }

    #[test]
    fn days_past_due_never_negative() {
        let inv = invoice(InvoiceStatus::Sent, date(2025, 8, 1), None, Some(dec!(10)));
        assert_eq!(days_past_due(&inv, date(2025, 8, 15)), 0);
        assert_eq!(days_past_due(&inv, date(2025, 9, 10)), 10);
    }
}
