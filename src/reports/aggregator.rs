// src/reports/aggregator.rs

use std::iter::Sum;
use std::ops::{Add, AddAssign};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::invoice::{Invoice, InvoiceStatus};
use crate::reports::Window;

/// Data que decide a qual período uma fatura pertence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum Anchor {
    IssueDate,
    PaidDate,
}

impl Anchor {
    /// Âncora fixa por status. Todo relatório que fala de "pagas no período"
    /// passa por aqui, então pagas são sempre contadas pela data de pagamento.
    pub fn canonical_for(status: InvoiceStatus) -> Self {
        match status {
            InvoiceStatus::Paid => Anchor::PaidDate,
            _ => Anchor::IssueDate,
        }
    }

    pub fn date_of(self, invoice: &Invoice) -> Option<NaiveDate> {
        match self {
            Anchor::IssueDate => Some(invoice.issue_date),
            Anchor::PaidDate => invoice.paid_date,
        }
    }

    /// Coluna SQL equivalente, para os filtros do repositório.
    pub fn column(self) -> &'static str {
        match self {
            Anchor::IssueDate => "issue_date",
            Anchor::PaidDate => "paid_date",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct RevenueTotal {
    pub count: i64,
    #[schema(example = "4250.00")]
    pub total: Decimal,
}

impl RevenueTotal {
    pub fn push(&mut self, invoice: &Invoice) {
        self.count += 1;
        self.total += invoice.amount();
    }
}

impl Add for RevenueTotal {
    type Output = RevenueTotal;

    fn add(self, rhs: Self) -> Self::Output {
        RevenueTotal {
            count: self.count + rhs.count,
            total: self.total + rhs.total,
        }
    }
}

impl AddAssign for RevenueTotal {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sum for RevenueTotal {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(RevenueTotal::default(), Add::add)
    }
}

pub fn matches(invoice: &Invoice, window: &Window, anchor: Anchor, statuses: &[InvoiceStatus]) -> bool {
    statuses.contains(&invoice.status)
        && anchor
            .date_of(invoice)
            .is_some_and(|date| window.contains(date))
}

pub fn aggregate<'a, I>(
    invoices: I,
    window: &Window,
    anchor: Anchor,
    statuses: &[InvoiceStatus],
) -> RevenueTotal
where
    I: IntoIterator<Item = &'a Invoice>,
{
    let mut acc = RevenueTotal::default();
    for invoice in invoices {
        if matches(invoice, window, anchor, statuses) {
            acc.push(invoice);
        }
    }
    acc
}

/// "Pagas no período", sempre com a âncora canônica.
pub fn paid_in<'a, I>(invoices: I, window: &Window) -> RevenueTotal
where
    I: IntoIterator<Item = &'a Invoice>,
{
    aggregate(
        invoices,
        window,
        Anchor::canonical_for(InvoiceStatus::Paid),
        &[InvoiceStatus::Paid],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::fixtures::{date, invoice};
    use rust_decimal_macros::dec;

    fn september() -> Window {
        Window::new(date(2025, 9, 1), date(2025, 10, 1)).unwrap()
    }

    #[test]
    fn empty_set_is_zero() {
        let none: Vec<Invoice> = Vec::new();
        let total = aggregate(&none, &september(), Anchor::PaidDate, &[InvoiceStatus::Paid]);
        assert_eq!(total, RevenueTotal { count: 0, total: Decimal::ZERO });
    }

    #[test]
    fn null_total_counts_as_zero() {
        let invoices = vec![
            invoice(InvoiceStatus::Paid, date(2025, 9, 2), Some(date(2025, 9, 3)), None),
            invoice(InvoiceStatus::Paid, date(2025, 9, 2), Some(date(2025, 9, 4)), Some(dec!(10.50))),
        ];
        let total = paid_in(&invoices, &september());
        assert_eq!(total.count, 2);
        assert_eq!(total.total, dec!(10.50));
    }

    #[test]
    fn paid_anchor_excludes_invoices_without_paid_date() {
        // Linha legada: status pago sem data de pagamento
        let invoices = vec![invoice(InvoiceStatus::Paid, date(2025, 9, 2), None, Some(dec!(100)))];
        assert_eq!(paid_in(&invoices, &september()).count, 0);
        let by_issue = aggregate(&invoices, &september(), Anchor::IssueDate, &[InvoiceStatus::Paid]);
        assert_eq!(by_issue.count, 1);
    }

    #[test]
    fn end_of_window_is_exclusive() {
        let invoices = vec![invoice(InvoiceStatus::Paid, date(2025, 9, 15), Some(date(2025, 10, 1)), Some(dec!(1)))];
        assert_eq!(paid_in(&invoices, &september()).count, 0);
    }

    #[test]
    fn status_filter_is_applied() {
        let invoices = vec![
            invoice(InvoiceStatus::Sent, date(2025, 9, 5), None, Some(dec!(40))),
            invoice(InvoiceStatus::Overdue, date(2025, 9, 6), None, Some(dec!(60))),
            invoice(InvoiceStatus::Draft, date(2025, 9, 7), None, Some(dec!(99))),
        ];
        let open = aggregate(
            &invoices,
            &september(),
            Anchor::IssueDate,
            &[InvoiceStatus::Sent, InvoiceStatus::Overdue],
        );
        assert_eq!(open, RevenueTotal { count: 2, total: dec!(100) });
    }

    #[test]
    fn aggregation_is_additive_over_sub_windows() {
        let invoices: Vec<_> = (0..60)
            .map(|i| {
                let issued = date(2025, 8, 1) + chrono::Duration::days(i);
                let paid = issued + chrono::Duration::days(i % 17);
                invoice(InvoiceStatus::Paid, issued, Some(paid), Some(Decimal::new(1999 + i * 37, 2)))
            })
            .collect();

        let union = Window::new(date(2025, 8, 1), date(2025, 11, 1)).unwrap();
        let cuts = [date(2025, 8, 1), date(2025, 8, 19), date(2025, 9, 1), date(2025, 9, 30), date(2025, 11, 1)];

        for anchor in [Anchor::IssueDate, Anchor::PaidDate] {
            let whole = aggregate(&invoices, &union, anchor, &[InvoiceStatus::Paid]);
            let parts: RevenueTotal = cuts
                .windows(2)
                .map(|w| {
                    let sub = Window::new(w[0], w[1]).unwrap();
                    aggregate(&invoices, &sub, anchor, &[InvoiceStatus::Paid])
                })
                .sum();
            assert_eq!(whole, parts, "anchor {:?}", anchor);
        }
    }

    #[test]
    fn decimal_sums_do_not_drift() {
        let invoices: Vec<_> = (0..10_000)
            .map(|_| invoice(InvoiceStatus::Paid, date(2025, 9, 1), Some(date(2025, 9, 2)), Some(dec!(0.10))))
            .collect();
        assert_eq!(paid_in(&invoices, &september()).total, dec!(1000.00));
    }

    /// 10 faturas emitidas em agosto (3 pagas em agosto) e 15 em setembro
    /// (5 pagas em setembro). Pagas em setembro = 5, nunca as 15 emitidas.
    #[test]
    fn paid_in_september_uses_payment_date() {
        let mut invoices = Vec::new();
        for i in 0..10 {
            let issued = date(2025, 8, 1 + i);
            if i < 3 {
                invoices.push(invoice(InvoiceStatus::Paid, issued, Some(date(2025, 8, 20 + i)), Some(dec!(100))));
            } else if i % 2 == 0 {
                invoices.push(invoice(InvoiceStatus::Sent, issued, None, Some(dec!(100))));
            } else {
                invoices.push(invoice(InvoiceStatus::Overdue, issued, None, Some(dec!(100))));
            }
        }
        for i in 0..15 {
            let issued = date(2025, 9, 1 + i);
            if i < 5 {
                invoices.push(invoice(InvoiceStatus::Paid, issued, Some(date(2025, 9, 16 + i)), Some(dec!(250))));
            } else {
                invoices.push(invoice(InvoiceStatus::Sent, issued, None, Some(dec!(250))));
            }
        }

        let paid = paid_in(&invoices, &september());
        assert_eq!(paid, RevenueTotal { count: 5, total: dec!(1250) });

        let issued_in_september = aggregate(
            &invoices,
            &september(),
            Anchor::IssueDate,
            &InvoiceStatus::ALL,
        );
        assert_eq!(issued_in_september.count, 15);
    }

    #[test]
    fn switching_anchor_changes_totals_for_net_30_invoices() {
        // Emitidas em agosto, pagas em setembro
        let invoices = vec![
            invoice(InvoiceStatus::Paid, date(2025, 8, 10), Some(date(2025, 9, 9)), Some(dec!(500))),
            invoice(InvoiceStatus::Paid, date(2025, 8, 25), Some(date(2025, 9, 24)), Some(dec!(700))),
            invoice(InvoiceStatus::Paid, date(2025, 9, 3), Some(date(2025, 10, 3)), Some(dec!(300))),
        ];
        let by_paid = aggregate(&invoices, &september(), Anchor::PaidDate, &[InvoiceStatus::Paid]);
        let by_issue = aggregate(&invoices, &september(), Anchor::IssueDate, &[InvoiceStatus::Paid]);
        assert_eq!(by_paid, RevenueTotal { count: 2, total: dec!(1200) });
        assert_eq!(by_issue, RevenueTotal { count: 1, total: dec!(300) });
        assert_ne!(by_paid, by_issue);
    }

    #[test]
    fn canonical_anchor_is_pinned_per_status() {
        assert_eq!(Anchor::canonical_for(InvoiceStatus::Paid), Anchor::PaidDate);
        for status in [InvoiceStatus::Draft, InvoiceStatus::Sent, InvoiceStatus::Overdue, InvoiceStatus::Cancelled] {
            assert_eq!(Anchor::canonical_for(status), Anchor::IssueDate);
        }
    }
}
