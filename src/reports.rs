// src/reports.rs
//
// Núcleo puro dos relatórios: nenhuma função aqui toca o banco.
// Os services buscam as linhas e delegam a agregação para cá.

pub mod aggregator;
pub mod buckets;
pub mod status;

use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;

use crate::common::error::AppError;

/// Janela de relatório semiaberta: `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct Window {
    #[schema(value_type = String, format = Date)]
    pub start: NaiveDate,
    #[schema(value_type = String, format = Date)]
    pub end: NaiveDate,
}

impl Window {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, AppError> {
        if start >= end {
            return Err(AppError::InvalidDateRange);
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use crate::models::invoice::{Invoice, InvoiceStatus};

    pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    pub fn invoice(
        status: InvoiceStatus,
        issue_date: NaiveDate,
        paid_date: Option<NaiveDate>,
        total: Option<Decimal>,
    ) -> Invoice {
        let created = Utc.from_utc_datetime(&issue_date.and_hms_opt(9, 0, 0).unwrap());
        Invoice {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            client_id: Uuid::nil(),
            invoice_number: "INV-TEST".to_string(),
            status,
            issue_date,
            due_date: issue_date + chrono::Duration::days(30),
            paid_date,
            subtotal: total.unwrap_or_default(),
            tax_amount: Decimal::ZERO,
            total,
            currency: "EUR".to_string(),
            notes: None,
            last_reminder_at: None,
            created_at: created,
            updated_at: created,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::date;
    use super::*;

    #[test]
    fn window_rejects_empty_and_inverted_ranges() {
        assert!(Window::new(date(2025, 9, 1), date(2025, 9, 1)).is_err());
        assert!(Window::new(date(2025, 9, 2), date(2025, 9, 1)).is_err());
    }

    #[test]
    fn window_is_half_open() {
        let w = Window::new(date(2025, 9, 1), date(2025, 10, 1)).unwrap();
        assert!(w.contains(date(2025, 9, 1)));
        assert!(w.contains(date(2025, 9, 30)));
        assert!(!w.contains(date(2025, 10, 1)));
        assert_eq!(w.days(), 30);
    }
}
