use sqlx::{Postgres, Transaction};

use crate::common::error::AppError;
use crate::config::AppState;
use crate::middleware::user::UserContext;

async fn set_user(tx: &mut Transaction<'static, Postgres>, user: &UserContext) -> Result<(), AppError> {
    sqlx::query("SELECT set_config('app.user_id', $1, true)")
        .bind(user.0.to_string())
        .execute(&mut **tx)
        .await?;
    Ok(())
}

// ---
// Helper RLS: a "chave" do usuário para o banco de dados
// ---
/// Abre uma transação e define `app.user_id`, usado pelas políticas RLS.
/// `set_config(..., true)` vale só até o fim da transação, então a conexão
/// volta limpa para a pool.
pub(crate) async fn begin_user_tx(
    app_state: &AppState,
    user: &UserContext,
) -> Result<Transaction<'static, Postgres>, AppError> {
    // O operador '?' converte sqlx::Error -> AppError::DatabaseError
    let mut tx = app_state.db_pool.begin().await?;
    set_user(&mut tx, user).await?;
    Ok(tx)
}

/// Igual a `begin_user_tx`, mas somente leitura e com um snapshot único:
/// todas as consultas de um relatório enxergam o mesmo estado do banco.
pub(crate) async fn begin_user_snapshot(
    app_state: &AppState,
    user: &UserContext,
) -> Result<Transaction<'static, Postgres>, AppError> {
    let mut tx = app_state.db_pool.begin().await?;

    // Precisa ser o primeiro comando da transação
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
        .execute(&mut *tx)
        .await?;
    set_user(&mut tx, user).await?;

    Ok(tx)
}
