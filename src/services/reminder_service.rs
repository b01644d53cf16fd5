// src/services/reminder_service.rs
//
// Job de fundo: reconcilia vencidas e enfileira lembretes. O envio do e-mail
// é de outro serviço; aqui só registramos e carimbamos `last_reminder_at`.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use tokio::{task::JoinHandle, time};

use crate::{
    common::error::AppError,
    db::InvoiceRepository,
    services::invoice_service::InvoiceService,
};

/// Máximo de lembretes por rodada.
const BATCH_SIZE: i64 = 100;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReminderRun {
    pub marked_overdue: usize,
    pub reminders_queued: usize,
}

/// Limite do cooldown: faturas lembradas antes disso podem receber outro.
pub fn reminded_before(now: DateTime<Utc>, cooldown_days: i64) -> DateTime<Utc> {
    now - Duration::days(cooldown_days.max(0))
}

#[derive(Clone)]
pub struct ReminderService {
    pool: PgPool,
    invoice_service: InvoiceService,
    invoice_repo: InvoiceRepository,
    cooldown_days: i64,
}

impl ReminderService {
    pub fn new(
        pool: PgPool,
        invoice_service: InvoiceService,
        invoice_repo: InvoiceRepository,
        cooldown_days: i64,
    ) -> Self {
        Self {
            pool,
            invoice_service,
            invoice_repo,
            cooldown_days,
        }
    }

    /// Uma rodada completa do job, para todos os usuários.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<ReminderRun, AppError> {
        let mut tx = self.pool.begin().await?;

        let marked = self
            .invoice_service
            .reconcile_overdue(&mut *tx, None, now.date_naive())
            .await?;

        let candidates = self
            .invoice_repo
            .find_reminder_candidates(&mut *tx, reminded_before(now, self.cooldown_days), BATCH_SIZE)
            .await?;

        for invoice in &candidates {
            tracing::info!(
                user_id = %invoice.user_id,
                invoice_id = %invoice.id,
                number = %invoice.invoice_number,
                due_date = %invoice.due_date,
                amount = %invoice.amount(),
                "reminder queued"
            );
            self.invoice_repo.touch_reminder(&mut *tx, invoice.id, now).await?;
        }

        tx.commit().await?;

        Ok(ReminderRun {
            marked_overdue: marked.len(),
            reminders_queued: candidates.len(),
        })
    }

    /// Roda o job a cada `every`. Erros de uma rodada são logados e a próxima
    /// segue normalmente.
    pub fn spawn(self, every: std::time::Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = time::interval(every);
            interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                match self.run_once(Utc::now()).await {
                    Ok(run) => tracing::debug!(
                        marked_overdue = run.marked_overdue,
                        reminders_queued = run.reminders_queued,
                        "Rodada de lembretes concluída"
                    ),
                    Err(e) => tracing::error!(error = ?e, "Falha na rodada de lembretes"),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn cooldown_cutoff() {
        let now = Utc.with_ymd_and_hms(2025, 9, 10, 8, 0, 0).unwrap();
        assert_eq!(reminded_before(now, 7), Utc.with_ymd_and_hms(2025, 9, 3, 8, 0, 0).unwrap());
        assert_eq!(reminded_before(now, -3), now);
    }
}
