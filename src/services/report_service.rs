// src/services/report_service.rs
//
// Os relatórios leem as linhas uma vez e calculam tudo em memória com o
// núcleo de `crate::reports`. Todas as âncoras são as canônicas.

use std::collections::HashMap;

use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::Decimal;
use sqlx::{Acquire, Executor, PgConnection, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{ClientRepository, InvoiceRepository},
    models::{
        invoice::{Invoice, InvoiceStatus},
        report::{
            AgingBucket, Dashboard, DashboardKpis, ForecastPoint, MonthlyDataEntry, PeriodSummary,
            StatusDistributionEntry, TopClientEntry, TrendPoint,
        },
    },
    reports::{
        aggregator::{aggregate, paid_in, Anchor, RevenueTotal},
        buckets::{by_granularity, locate, split_even, Bucket, Granularity},
        status::{classify, days_past_due, is_open_at},
        Window,
    },
    services::invoice_service::round2,
};

/// Status que contam como "faturado" (emitidas e não canceladas).
const INVOICED: [InvoiceStatus; 3] = [InvoiceStatus::Sent, InvoiceStatus::Paid, InvoiceStatus::Overdue];

pub const AGING_LABELS: [&str; 5] = ["current", "1-30", "31-60", "61-90", "90+"];

// =============================================================================
//  CÁLCULOS PUROS
// =============================================================================

/// Janela do mês civil que contém `date`.
pub fn month_window(date: NaiveDate) -> Result<Window, AppError> {
    let start = date.with_day(1).ok_or(AppError::InvalidDateRange)?;
    let end = start
        .checked_add_months(Months::new(1))
        .ok_or(AppError::InvalidDateRange)?;
    Window::new(start, end)
}

/// Percentuais com duas casas que somam exatamente 100 (maior resto).
/// Com total zero, todos são zero.
pub fn largest_remainder_percentages(counts: &[i64]) -> Vec<Decimal> {
    const SCALE: i64 = 10_000; // 100,00% em centésimos

    let total: i64 = counts.iter().sum();
    if total <= 0 {
        return vec![Decimal::ZERO; counts.len()];
    }

    let mut units: Vec<i64> = counts.iter().map(|c| c * SCALE / total).collect();
    let mut leftover = SCALE - units.iter().sum::<i64>();

    let mut order: Vec<usize> = (0..counts.len()).collect();
    // maior resto primeiro; empate fica com o índice menor
    order.sort_by_key(|&i| std::cmp::Reverse(counts[i] * SCALE % total));
    for i in order {
        if leftover == 0 {
            break;
        }
        if counts[i] > 0 {
            units[i] += 1;
            leftover -= 1;
        }
    }

    units.into_iter().map(|u| Decimal::new(u, 2)).collect()
}

/// Distribuição por status na janela. A fatia `paid` usa a data de
/// pagamento; as demais usam a emissão e o status de exibição em `as_of`.
pub fn status_distribution_of<'a, I>(invoices: I, window: &Window, as_of: NaiveDate) -> Vec<StatusDistributionEntry>
where
    I: IntoIterator<Item = &'a Invoice>,
{
    let mut slices: HashMap<InvoiceStatus, RevenueTotal> = HashMap::new();

    for invoice in invoices {
        let anchor = Anchor::canonical_for(invoice.status);
        let in_window = anchor.date_of(invoice).is_some_and(|d| window.contains(d));
        if in_window {
            slices.entry(classify(invoice, as_of)).or_default().push(invoice);
        }
    }

    let counts: Vec<i64> = InvoiceStatus::ALL
        .iter()
        .map(|s| slices.get(s).map_or(0, |t| t.count))
        .collect();
    let percentages = largest_remainder_percentages(&counts);

    InvoiceStatus::ALL
        .iter()
        .zip(percentages)
        .map(|(status, percentage)| {
            let slice = slices.get(status).copied().unwrap_or_default();
            StatusDistributionEntry {
                status: *status,
                count: slice.count,
                amount: slice.total,
                percentage,
            }
        })
        .collect()
}

fn aging_index(days_overdue: i64) -> usize {
    match days_overdue {
        d if d <= 0 => 0,
        1..=30 => 1,
        31..=60 => 2,
        61..=90 => 3,
        _ => 4,
    }
}

/// Carteira em aberto por dias de atraso em `as_of`. Só entram as faturas
/// abertas naquela data.
pub fn aging_of<'a, I>(invoices: I, as_of: NaiveDate) -> Vec<AgingBucket>
where
    I: IntoIterator<Item = &'a Invoice>,
{
    let mut totals = [RevenueTotal::default(); 5];
    for invoice in invoices.into_iter().filter(|i| is_open_at(i, as_of)) {
        totals[aging_index(days_past_due(invoice, as_of))].push(invoice);
    }

    AGING_LABELS
        .iter()
        .zip(totals)
        .map(|(label, t)| AgingBucket {
            bucket: label.to_string(),
            count: t.count,
            amount: t.total,
        })
        .collect()
}

/// Contas a receber em `as_of`: (total em aberto, parte já vencida).
pub fn receivables_at<'a, I>(invoices: I, as_of: NaiveDate) -> (Decimal, Decimal)
where
    I: IntoIterator<Item = &'a Invoice>,
{
    invoices
        .into_iter()
        .filter(|i| is_open_at(i, as_of))
        .fold((Decimal::ZERO, Decimal::ZERO), |(open, overdue), i| {
            let late = if i.due_date < as_of { i.amount() } else { Decimal::ZERO };
            (open + i.amount(), overdue + late)
        })
}

/// Dia seguinte a `as_of`: limite exclusivo das consultas "aberta em".
fn day_after(as_of: NaiveDate) -> Result<NaiveDate, AppError> {
    as_of.succ_opt().ok_or(AppError::InvalidDateRange)
}

/// Receita (pagas, pela data de pagamento) em cada bucket.
pub fn trend_of<'a, I>(buckets: &[Bucket], invoices: I) -> Vec<TrendPoint>
where
    I: IntoIterator<Item = &'a Invoice>,
{
    let mut totals = vec![RevenueTotal::default(); buckets.len()];
    for invoice in invoices {
        if invoice.status != InvoiceStatus::Paid {
            continue;
        }
        if let Some(idx) = invoice.paid_date.and_then(|d| locate(buckets, d)) {
            totals[idx].push(invoice);
        }
    }

    buckets
        .iter()
        .zip(totals)
        .map(|(b, t)| TrendPoint {
            label: b.label.clone(),
            start: b.start,
            end: b.end,
            revenue: t.total,
            count: t.count,
        })
        .collect()
}

/// Entradas esperadas por vencimento. O que já venceu antes da janela entra
/// no primeiro segmento; o que vence depois dela fica de fora.
pub fn forecast_of<'a, I>(buckets: &[Bucket], invoices: I) -> Vec<ForecastPoint>
where
    I: IntoIterator<Item = &'a Invoice>,
{
    let mut totals = vec![RevenueTotal::default(); buckets.len()];
    let first_start = buckets.first().map(|b| b.start);

    for invoice in invoices {
        let idx = match first_start {
            Some(start) if invoice.due_date < start => Some(0),
            _ => locate(buckets, invoice.due_date),
        };
        if let Some(idx) = idx {
            totals[idx].push(invoice);
        }
    }

    buckets
        .iter()
        .zip(totals)
        .map(|(b, t)| ForecastPoint {
            label: b.label.clone(),
            start: b.start,
            end: b.end,
            expected: t.total,
            count: t.count,
        })
        .collect()
}

/// Receita paga por cliente, da maior para a menor.
pub fn revenue_by_client<'a, I>(invoices: I, window: &Window) -> Vec<(Uuid, RevenueTotal)>
where
    I: IntoIterator<Item = &'a Invoice>,
{
    let mut by_client: HashMap<Uuid, RevenueTotal> = HashMap::new();
    for invoice in invoices {
        let paid = invoice.status == InvoiceStatus::Paid
            && invoice.paid_date.is_some_and(|d| window.contains(d));
        if paid {
            by_client.entry(invoice.client_id).or_default().push(invoice);
        }
    }

    let mut ranked: Vec<(Uuid, RevenueTotal)> = by_client.into_iter().collect();
    ranked.sort_by(|a, b| b.1.total.cmp(&a.1.total).then(a.0.cmp(&b.0)));
    ranked
}

/// Média de dias entre emissão e pagamento das pagas na janela.
pub fn average_days_to_pay<'a, I>(invoices: I, window: &Window) -> Option<Decimal>
where
    I: IntoIterator<Item = &'a Invoice>,
{
    let days: Vec<i64> = invoices
        .into_iter()
        .filter(|i| i.status == InvoiceStatus::Paid)
        .filter_map(|i| i.paid_date.filter(|d| window.contains(*d)).map(|d| (d - i.issue_date).num_days()))
        .collect();

    if days.is_empty() {
        return None;
    }
    let sum: i64 = days.iter().sum();
    Some(round2(Decimal::from(sum) / Decimal::from(days.len() as i64)))
}

/// Recebido sobre faturado, em percentual com duas casas.
pub fn collection_rate(paid: Decimal, invoiced: Decimal) -> Decimal {
    if invoiced.is_zero() {
        return Decimal::ZERO;
    }
    round2(paid / invoiced * Decimal::ONE_HUNDRED)
}

// =============================================================================
//  SERVICE
// =============================================================================

#[derive(Clone)]
pub struct ReportService {
    invoice_repo: InvoiceRepository,
    client_repo: ClientRepository,
}

impl ReportService {
    pub fn new(invoice_repo: InvoiceRepository, client_repo: ClientRepository) -> Self {
        Self {
            invoice_repo,
            client_repo,
        }
    }

    /// Pagas, faturadas e em aberto no fim do período.
    pub async fn summary<'e, E>(&self, executor: E, user_id: Uuid, window: Window) -> Result<PeriodSummary, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres, Connection = &'e mut PgConnection>,
    {
        let mut conn = executor.acquire().await?;

        let touching = self
            .invoice_repo
            .find_touching_window(&mut *conn, user_id, &window)
            .await?;
        let open = self.invoice_repo.find_open_at(&mut *conn, user_id, window.end).await?;

        let mut outstanding = RevenueTotal::default();
        for invoice in &open {
            outstanding.push(invoice);
        }

        Ok(PeriodSummary {
            start: window.start,
            end: window.end,
            paid: paid_in(&touching, &window),
            invoiced: aggregate(&touching, &window, Anchor::IssueDate, &INVOICED),
            outstanding,
        })
    }

    pub async fn dashboard<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        as_of: NaiveDate,
        months: u32,
    ) -> Result<Dashboard, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres, Connection = &'e mut PgConnection>,
    {
        let mut conn = executor.acquire().await?;

        let current_month = month_window(as_of)?;
        let history_start = current_month
            .start
            .checked_sub_months(Months::new(months.saturating_sub(1)))
            .ok_or(AppError::InvalidDateRange)?;
        let history = Window::new(history_start, current_month.end)?;

        let touching = self
            .invoice_repo
            .find_touching_window(&mut *conn, user_id, &history)
            .await?;
        let open = self
            .invoice_repo
            .find_open_at(&mut *conn, user_id, day_after(as_of)?)
            .await?;

        // Cards
        let (current_ar, overdue_ar) = receivables_at(&open, as_of);
        let paid_this_month = paid_in(&touching, &current_month).total;
        let invoiced_this_month = aggregate(&touching, &current_month, Anchor::IssueDate, &INVOICED).total;

        let kpis = DashboardKpis {
            current_ar,
            overdue_ar,
            paid_this_month,
            invoiced_this_month,
            average_days_to_pay: average_days_to_pay(&touching, &current_month),
            collection_rate: collection_rate(paid_this_month, invoiced_this_month),
        };

        // Série mensal
        let monthly_data = by_granularity(&history, Granularity::Month)?
            .into_iter()
            .map(|bucket| {
                let w = bucket.window();
                let invoiced = aggregate(&touching, &w, Anchor::IssueDate, &INVOICED);
                let paid = paid_in(&touching, &w);
                MonthlyDataEntry {
                    month: bucket.label,
                    start: bucket.start,
                    invoiced: invoiced.total,
                    revenue: paid.total,
                    invoice_count: invoiced.count,
                    paid_count: paid.count,
                }
            })
            .collect();

        Ok(Dashboard {
            as_of,
            kpis,
            monthly_data,
            status_distribution: status_distribution_of(&touching, &current_month, as_of),
        })
    }

    pub async fn revenue_trend<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        window: Window,
        granularity: Granularity,
    ) -> Result<Vec<TrendPoint>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        // Valida os buckets antes de ir ao banco
        let buckets = by_granularity(&window, granularity)?;
        let paid = self
            .invoice_repo
            .find_by_window(executor, user_id, &window, Anchor::canonical_for(InvoiceStatus::Paid))
            .await?;

        Ok(trend_of(&buckets, &paid))
    }

    pub async fn status_distribution<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        window: Window,
        as_of: NaiveDate,
    ) -> Result<Vec<StatusDistributionEntry>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let touching = self
            .invoice_repo
            .find_touching_window(executor, user_id, &window)
            .await?;

        Ok(status_distribution_of(&touching, &window, as_of))
    }

    pub async fn aging<'e, E>(&self, executor: E, user_id: Uuid, as_of: NaiveDate) -> Result<Vec<AgingBucket>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let open = self
            .invoice_repo
            .find_open_at(executor, user_id, day_after(as_of)?)
            .await?;
        Ok(aging_of(&open, as_of))
    }

    pub async fn top_clients<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        window: Window,
        limit: usize,
    ) -> Result<Vec<TopClientEntry>, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres, Connection = &'e mut PgConnection>,
    {
        let mut conn = executor.acquire().await?;

        let paid = self
            .invoice_repo
            .find_by_window(&mut *conn, user_id, &window, Anchor::canonical_for(InvoiceStatus::Paid))
            .await?;

        let mut ranked = revenue_by_client(&paid, &window);
        ranked.truncate(limit);

        let ids: Vec<Uuid> = ranked.iter().map(|(id, _)| *id).collect();
        let names: HashMap<Uuid, String> = self
            .client_repo
            .display_names(&mut *conn, user_id, &ids)
            .await?
            .into_iter()
            .collect();

        Ok(ranked
            .into_iter()
            .map(|(client_id, t)| TopClientEntry {
                client_id,
                client_name: names.get(&client_id).cloned().unwrap_or_default(),
                revenue: t.total,
                invoice_count: t.count,
            })
            .collect())
    }

    pub async fn forecast<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        window: Window,
        node_count: u32,
    ) -> Result<Vec<ForecastPoint>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let buckets = split_even(&window, node_count)?;
        let outstanding = self.invoice_repo.find_outstanding(executor, user_id).await?;

        Ok(forecast_of(&buckets, &outstanding))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::fixtures::{date, invoice};
    use rust_decimal_macros::dec;

    fn window(start: NaiveDate, end: NaiveDate) -> Window {
        Window::new(start, end).unwrap()
    }

    fn due_on(status: InvoiceStatus, due: NaiveDate, total: Decimal) -> Invoice {
        let mut inv = invoice(status, due - chrono::Duration::days(30), None, Some(total));
        inv.due_date = due;
        inv
    }

    #[test]
    fn percentages_sum_to_exactly_100() {
        let p = largest_remainder_percentages(&[1, 1, 1]);
        assert_eq!(p, vec![dec!(33.34), dec!(33.33), dec!(33.33)]);
        assert_eq!(p.iter().copied().sum::<Decimal>(), dec!(100));

        let p = largest_remainder_percentages(&[2, 0, 1, 0, 4]);
        assert_eq!(p.iter().copied().sum::<Decimal>(), dec!(100));
        assert_eq!(p[1], Decimal::ZERO);
        assert_eq!(p[3], Decimal::ZERO);
    }

    #[test]
    fn percentages_of_nothing_are_zero() {
        assert_eq!(largest_remainder_percentages(&[0, 0]), vec![Decimal::ZERO, Decimal::ZERO]);
        assert!(largest_remainder_percentages(&[]).is_empty());
    }

    #[test]
    fn distribution_counts_paid_by_paid_date() {
        let september = window(date(2025, 9, 1), date(2025, 10, 1));
        let invoices = vec![
            // emitida em agosto, paga em setembro: entra como paga
            invoice(InvoiceStatus::Paid, date(2025, 8, 20), Some(date(2025, 9, 5)), Some(dec!(100))),
            // emitida em setembro, paga em outubro: fora da fatia paga
            invoice(InvoiceStatus::Paid, date(2025, 9, 20), Some(date(2025, 10, 2)), Some(dec!(999))),
            invoice(InvoiceStatus::Sent, date(2025, 9, 10), None, Some(dec!(50))),
            invoice(InvoiceStatus::Draft, date(2025, 9, 11), None, None),
        ];

        let dist = status_distribution_of(&invoices, &september, date(2025, 9, 30));
        let by = |s: InvoiceStatus| dist.iter().find(|e| e.status == s).unwrap();

        assert_eq!(dist.len(), InvoiceStatus::ALL.len());
        assert_eq!(by(InvoiceStatus::Paid).count, 1);
        assert_eq!(by(InvoiceStatus::Paid).amount, dec!(100));
        assert_eq!(by(InvoiceStatus::Sent).count, 1);
        assert_eq!(by(InvoiceStatus::Draft).count, 1);
        assert_eq!(dist.iter().map(|e| e.percentage).sum::<Decimal>(), dec!(100));
    }

    #[test]
    fn distribution_uses_display_status() {
        let september = window(date(2025, 9, 1), date(2025, 10, 1));
        // vence em 2025-10-02: vencida só quando vista depois disso
        let invoices = vec![invoice(InvoiceStatus::Sent, date(2025, 9, 2), None, Some(dec!(10)))];

        let before = status_distribution_of(&invoices, &september, date(2025, 9, 30));
        let after = status_distribution_of(&invoices, &september, date(2025, 10, 15));

        let count = |d: &[StatusDistributionEntry], s| d.iter().find(|e| e.status == s).unwrap().count;
        assert_eq!(count(&before, InvoiceStatus::Sent), 1);
        assert_eq!(count(&after, InvoiceStatus::Overdue), 1);
        assert_eq!(count(&after, InvoiceStatus::Sent), 0);
    }

    #[test]
    fn aging_buckets_by_days_past_due() {
        let as_of = date(2025, 10, 1);
        let invoices = vec![
            due_on(InvoiceStatus::Sent, date(2025, 10, 1), dec!(1)),  // 0 dias
            due_on(InvoiceStatus::Sent, date(2025, 9, 30), dec!(2)),  // 1
            due_on(InvoiceStatus::Overdue, date(2025, 9, 1), dec!(4)), // 30
            due_on(InvoiceStatus::Overdue, date(2025, 8, 31), dec!(8)), // 31
            due_on(InvoiceStatus::Overdue, date(2025, 7, 3), dec!(16)), // 90
            due_on(InvoiceStatus::Overdue, date(2025, 7, 2), dec!(32)), // 91
        ];

        let aging = aging_of(&invoices, as_of);
        let amounts: Vec<Decimal> = aging.iter().map(|b| b.amount).collect();
        assert_eq!(aging.iter().map(|b| b.bucket.as_str()).collect::<Vec<_>>(), AGING_LABELS);
        assert_eq!(amounts, vec![dec!(1), dec!(6), dec!(8), dec!(16), dec!(32)]);
    }

    #[test]
    fn aging_is_taken_at_the_requested_date() {
        let as_of = date(2025, 9, 30);
        let invoices = vec![
            due_on(InvoiceStatus::Sent, date(2025, 9, 20), dec!(5)),
            // emitida depois de as_of: ainda não existia
            invoice(InvoiceStatus::Sent, date(2025, 10, 3), None, Some(dec!(70))),
            // paga depois de as_of: estava em aberto e vencida
            {
                let mut paid = due_on(InvoiceStatus::Paid, date(2025, 8, 20), dec!(200));
                paid.paid_date = Some(date(2025, 10, 10));
                paid
            },
        ];

        let aging = aging_of(&invoices, as_of);
        assert_eq!(aging.iter().map(|b| b.count).sum::<i64>(), 2);
        assert_eq!(aging[1].amount, dec!(5)); // 10 dias
        assert_eq!(aging[2].amount, dec!(200)); // 41 dias
    }

    #[test]
    fn receivables_are_taken_at_the_requested_date() {
        let as_of = date(2025, 9, 30);
        let mut paid_later = due_on(InvoiceStatus::Paid, date(2025, 9, 10), dec!(300));
        paid_later.paid_date = Some(date(2025, 10, 2));
        let invoices = vec![
            due_on(InvoiceStatus::Sent, date(2025, 10, 15), dec!(40)),
            paid_later,
            // emitida depois de as_of
            invoice(InvoiceStatus::Sent, date(2025, 10, 1), None, Some(dec!(1000))),
            // já paga em as_of
            invoice(InvoiceStatus::Paid, date(2025, 9, 1), Some(date(2025, 9, 15)), Some(dec!(80))),
        ];

        let (current, overdue) = receivables_at(&invoices, as_of);
        assert_eq!(current, dec!(340));
        assert_eq!(overdue, dec!(300));
    }

    #[test]
    fn trend_places_paid_invoices_by_paid_date() {
        let q3 = window(date(2025, 7, 1), date(2025, 10, 1));
        let buckets = by_granularity(&q3, Granularity::Month).unwrap();
        let invoices = vec![
            invoice(InvoiceStatus::Paid, date(2025, 6, 20), Some(date(2025, 7, 2)), Some(dec!(100))),
            invoice(InvoiceStatus::Paid, date(2025, 8, 1), Some(date(2025, 9, 30)), Some(dec!(250))),
            invoice(InvoiceStatus::Paid, date(2025, 9, 1), Some(date(2025, 9, 3)), None),
        ];

        let trend = trend_of(&buckets, &invoices);
        assert_eq!(trend.len(), 3);
        assert_eq!(trend[0].revenue, dec!(100));
        assert_eq!(trend[1].revenue, Decimal::ZERO);
        assert_eq!(trend[2].revenue, dec!(250));
        assert_eq!(trend[2].count, 2);
    }

    #[test]
    fn forecast_puts_past_due_in_first_segment() {
        let w = window(date(2025, 10, 1), date(2025, 10, 31));
        let buckets = split_even(&w, 3).unwrap();
        let invoices = vec![
            due_on(InvoiceStatus::Overdue, date(2025, 9, 15), dec!(10)),
            due_on(InvoiceStatus::Sent, date(2025, 10, 5), dec!(20)),
            due_on(InvoiceStatus::Sent, date(2025, 10, 30), dec!(40)),
            // depois da janela: fora da previsão
            due_on(InvoiceStatus::Sent, date(2025, 11, 15), dec!(80)),
        ];

        let points = forecast_of(&buckets, &invoices);
        assert_eq!(points[0].expected, dec!(30));
        assert_eq!(points[0].count, 2);
        assert_eq!(points[1].expected, Decimal::ZERO);
        assert_eq!(points[2].expected, dec!(40));
    }

    #[test]
    fn clients_ranked_by_paid_revenue() {
        let september = window(date(2025, 9, 1), date(2025, 10, 1));
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut invoices = vec![
            invoice(InvoiceStatus::Paid, date(2025, 8, 1), Some(date(2025, 9, 2)), Some(dec!(100))),
            invoice(InvoiceStatus::Paid, date(2025, 8, 1), Some(date(2025, 9, 3)), Some(dec!(100))),
            invoice(InvoiceStatus::Paid, date(2025, 8, 1), Some(date(2025, 9, 4)), Some(dec!(150))),
        ];
        invoices[0].client_id = a;
        invoices[1].client_id = a;
        invoices[2].client_id = b;

        let ranked = revenue_by_client(&invoices, &september);
        assert_eq!(ranked[0].0, a);
        assert_eq!(ranked[0].1, RevenueTotal { count: 2, total: dec!(200) });
        assert_eq!(ranked[1].0, b);
    }

    #[test]
    fn dashboard_helpers() {
        let september = window(date(2025, 9, 1), date(2025, 10, 1));
        let invoices = vec![
            invoice(InvoiceStatus::Paid, date(2025, 9, 1), Some(date(2025, 9, 11)), Some(dec!(10))),
            invoice(InvoiceStatus::Paid, date(2025, 8, 1), Some(date(2025, 9, 1)), Some(dec!(10))),
        ];
        // (10 + 31) / 2
        assert_eq!(average_days_to_pay(&invoices, &september), Some(dec!(20.5)));
        assert_eq!(average_days_to_pay(&invoices[..0], &september), None);

        assert_eq!(collection_rate(dec!(50), dec!(200)), dec!(25));
        assert_eq!(collection_rate(dec!(1), dec!(3)), dec!(33.33));
        assert_eq!(collection_rate(dec!(50), Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn month_window_covers_the_calendar_month() {
        let w = month_window(date(2024, 2, 17)).unwrap();
        assert_eq!(w.start, date(2024, 2, 1));
        assert_eq!(w.end, date(2024, 3, 1));
        assert_eq!(w.days(), 29);
    }
}
