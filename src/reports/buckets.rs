// src/reports/buckets.rs

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{common::error::AppError, reports::Window};

/// Limite de pontos por gráfico.
pub const MAX_BUCKETS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Bucket {
    pub label: String,
    #[schema(value_type = String, format = Date)]
    pub start: NaiveDate,
    #[schema(value_type = String, format = Date)]
    pub end: NaiveDate,
}

impl Bucket {
    pub fn window(&self) -> Window {
        Window { start: self.start, end: self.end }
    }
}

fn first_of_month(year: i32, month0: u32) -> Option<NaiveDate> {
    // month0 pode passar de 11: normaliza para o ano seguinte
    let year = year + (month0 / 12) as i32;
    NaiveDate::from_ymd_opt(year, month0 % 12 + 1, 1)
}

/// Próxima fronteira de calendário estritamente depois de `date`.
fn next_boundary(date: NaiveDate, granularity: Granularity) -> Option<NaiveDate> {
    match granularity {
        Granularity::Day => date.succ_opt(),
        Granularity::Week => {
            let to_monday = 7 - i64::from(date.weekday().num_days_from_monday());
            date.checked_add_signed(Duration::days(to_monday))
        }
        Granularity::Month => first_of_month(date.year(), date.month0() + 1),
        Granularity::Quarter => first_of_month(date.year(), (date.month0() / 3) * 3 + 3),
        Granularity::Year => NaiveDate::from_ymd_opt(date.year() + 1, 1, 1),
    }
}

fn label(date: NaiveDate, granularity: Granularity) -> String {
    match granularity {
        Granularity::Day => date.format("%Y-%m-%d").to_string(),
        Granularity::Week => {
            let iso = date.iso_week();
            format!("{}-W{:02}", iso.year(), iso.week())
        }
        Granularity::Month => date.format("%Y-%m").to_string(),
        Granularity::Quarter => format!("{}-Q{}", date.year(), date.month0() / 3 + 1),
        Granularity::Year => date.format("%Y").to_string(),
    }
}

/// Divide a janela por fronteiras de calendário. O primeiro bucket começa em
/// `window.start` e o último termina em `window.end`, mesmo que parciais.
pub fn by_granularity(window: &Window, granularity: Granularity) -> Result<Vec<Bucket>, AppError> {
    let mut buckets = Vec::new();
    let mut cursor = window.start;

    while cursor < window.end {
        if buckets.len() == MAX_BUCKETS {
            return Err(AppError::TooManyBuckets(MAX_BUCKETS));
        }
        let next = next_boundary(cursor, granularity).ok_or(AppError::InvalidDateRange)?;
        let end = next.min(window.end);
        buckets.push(Bucket {
            label: label(cursor, granularity),
            start: cursor,
            end,
        });
        cursor = end;
    }

    Ok(buckets)
}

/// Divide a janela em `node_count` segmentos de largura igual (diferença
/// máxima de um dia entre eles).
pub fn split_even(window: &Window, node_count: u32) -> Result<Vec<Bucket>, AppError> {
    let days = window.days();
    let n = i64::from(node_count);

    if n == 0 || n > days {
        return Err(AppError::InvalidBucketCount { requested: node_count, days });
    }
    if node_count as usize > MAX_BUCKETS {
        return Err(AppError::TooManyBuckets(MAX_BUCKETS));
    }

    let base = days / n;
    let remainder = days % n;

    let mut buckets = Vec::with_capacity(node_count as usize);
    let mut cursor = window.start;
    for i in 0..n {
        let width = if i < remainder { base + 1 } else { base };
        let end = (cursor + Duration::days(width)).min(window.end);
        buckets.push(Bucket {
            label: cursor.format("%Y-%m-%d").to_string(),
            start: cursor,
            end,
        });
        cursor = end;
    }

    if let Some(last) = buckets.last_mut() {
        last.end = window.end;
    }

    Ok(buckets)
}

/// Índice do bucket que contém `date`, se houver.
pub fn locate(buckets: &[Bucket], date: NaiveDate) -> Option<usize> {
    let idx = buckets.partition_point(|b| b.end <= date);
    buckets.get(idx).filter(|b| b.start <= date).map(|_| idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::fixtures::date;

    fn assert_partition(window: &Window, buckets: &[Bucket]) {
        assert!(!buckets.is_empty());
        assert_eq!(buckets.first().unwrap().start, window.start);
        assert_eq!(buckets.last().unwrap().end, window.end);
        for pair in buckets.windows(2) {
            assert_eq!(pair[0].end, pair[1].start, "gap or overlap between {:?} and {:?}", pair[0], pair[1]);
        }
        for b in buckets {
            assert!(b.start < b.end, "empty bucket {:?}", b);
        }
    }

    #[test]
    fn months_cover_the_window_with_partial_edges() {
        let w = Window::new(date(2025, 1, 15), date(2025, 4, 10)).unwrap();
        let buckets = by_granularity(&w, Granularity::Month).unwrap();
        assert_partition(&w, &buckets);
        let labels: Vec<_> = buckets.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, ["2025-01", "2025-02", "2025-03", "2025-04"]);
        assert_eq!(buckets[1].start, date(2025, 2, 1));
        assert_eq!(buckets[3].end, date(2025, 4, 10));
    }

    #[test]
    fn quarters_roll_over_the_year() {
        let w = Window::new(date(2024, 11, 1), date(2025, 7, 1)).unwrap();
        let buckets = by_granularity(&w, Granularity::Quarter).unwrap();
        assert_partition(&w, &buckets);
        let labels: Vec<_> = buckets.iter().map(|b| b.label.clone()).collect();
        assert_eq!(labels, ["2024-Q4", "2025-Q1", "2025-Q2"]);
        assert_eq!(buckets[1].start, date(2025, 1, 1));
    }

    #[test]
    fn weeks_start_on_monday() {
        // 2025-09-03 é uma quarta-feira
        let w = Window::new(date(2025, 9, 3), date(2025, 9, 22)).unwrap();
        let buckets = by_granularity(&w, Granularity::Week).unwrap();
        assert_partition(&w, &buckets);
        assert_eq!(buckets[0].end, date(2025, 9, 8));
        assert_eq!(buckets[1].start.weekday(), chrono::Weekday::Mon);
        assert_eq!(buckets[0].label, "2025-W36");
    }

    #[test]
    fn days_and_years() {
        let w = Window::new(date(2025, 2, 27), date(2025, 3, 2)).unwrap();
        let days = by_granularity(&w, Granularity::Day).unwrap();
        assert_partition(&w, &days);
        assert_eq!(days.len(), 3);

        let w = Window::new(date(2023, 6, 1), date(2025, 1, 1)).unwrap();
        let years = by_granularity(&w, Granularity::Year).unwrap();
        assert_partition(&w, &years);
        assert_eq!(years.len(), 2);
    }

    #[test]
    fn too_many_daily_buckets_is_rejected() {
        let w = Window::new(date(2020, 1, 1), date(2025, 1, 1)).unwrap();
        assert!(matches!(
            by_granularity(&w, Granularity::Day),
            Err(AppError::TooManyBuckets(_))
        ));
    }

    #[test]
    fn even_split_has_requested_count_and_covers_window() {
        let w = Window::new(date(2025, 1, 1), date(2025, 4, 1)).unwrap();
        for n in [1u32, 2, 3, 7, 12, 90] {
            let buckets = split_even(&w, n).unwrap();
            assert_eq!(buckets.len(), n as usize);
            assert_partition(&w, &buckets);
            let widths: Vec<i64> = buckets.iter().map(|b| (b.end - b.start).num_days()).collect();
            let min = widths.iter().min().unwrap();
            let max = widths.iter().max().unwrap();
            assert!(max - min <= 1, "uneven widths {:?}", widths);
        }
    }

    #[test]
    fn even_split_rejects_bad_counts() {
        let w = Window::new(date(2025, 1, 1), date(2025, 1, 11)).unwrap();
        assert!(split_even(&w, 0).is_err());
        assert!(split_even(&w, 11).is_err());
        assert_eq!(split_even(&w, 10).unwrap().len(), 10);
    }

    #[test]
    fn locate_finds_the_containing_bucket() {
        let w = Window::new(date(2025, 1, 1), date(2025, 4, 1)).unwrap();
        let buckets = by_granularity(&w, Granularity::Month).unwrap();
        assert_eq!(locate(&buckets, date(2025, 1, 1)), Some(0));
        assert_eq!(locate(&buckets, date(2025, 2, 28)), Some(1));
        assert_eq!(locate(&buckets, date(2025, 3, 31)), Some(2));
        assert_eq!(locate(&buckets, date(2025, 4, 1)), None);
        assert_eq!(locate(&buckets, date(2024, 12, 31)), None);
    }
}
