// src/services/client_service.rs

use sqlx::{Acquire, Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::ClientRepository,
    models::client::{Client, ClientFields},
};

// ---
// Identificadores franceses (SIREN / SIRET / TVA intracomunitária)
// ---

fn all_digits(value: &str, len: usize) -> bool {
    value.len() == len && value.bytes().all(|b| b.is_ascii_digit())
}

/// Soma de Luhn: dobra um dígito sim, um não, a partir da direita.
fn luhn_sum(digits: &str) -> u32 {
    digits
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let d = u32::from(b - b'0');
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                d
            }
        })
        .sum()
}

pub fn is_valid_siren(siren: &str) -> bool {
    all_digits(siren, 9) && luhn_sum(siren) % 10 == 0
}

/// SIRET = SIREN + NIC (5 dígitos). Estabelecimentos da La Poste
/// (SIREN 356000000) usam soma simples múltipla de 5 no lugar de Luhn.
pub fn is_valid_siret(siret: &str) -> bool {
    if !all_digits(siret, 14) {
        return false;
    }
    if siret.starts_with("356000000") {
        let sum: u32 = siret.bytes().map(|b| u32::from(b - b'0')).sum();
        return sum % 5 == 0;
    }
    luhn_sum(siret) % 10 == 0
}

/// Chave numérica do número de TVA francês para um SIREN.
pub fn vat_key(siren: &str) -> Option<u32> {
    let n: u64 = siren.parse().ok()?;
    Some(((12 + 3 * (n % 97)) % 97) as u32)
}

/// `FR` + chave de 2 dígitos + SIREN.
pub fn is_valid_vat_number(vat: &str) -> bool {
    let vat = vat.trim().to_ascii_uppercase();
    let Some(rest) = vat.strip_prefix("FR") else {
        return false;
    };
    if rest.len() != 11 || !rest.is_ascii() {
        return false;
    }
    let (key, siren) = rest.split_at(2);
    if !is_valid_siren(siren) {
        return false;
    }
    match (key.parse::<u32>(), vat_key(siren)) {
        (Ok(given), Some(expected)) => all_digits(key, 2) && given == expected,
        _ => false,
    }
}

/// SIRET informado junto com o SIREN precisa começar por ele.
pub fn siret_matches_siren(siret: &str, siren: &str) -> bool {
    siret.starts_with(siren)
}

#[derive(Clone)]
pub struct ClientService {
    repo: ClientRepository,
}

impl ClientService {
    pub fn new(repo: ClientRepository) -> Self {
        Self { repo }
    }

    pub async fn list<'e, E>(&self, executor: E, user_id: Uuid) -> Result<Vec<Client>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo.find_by_user(executor, user_id).await
    }

    pub async fn get<'e, E>(&self, executor: E, user_id: Uuid, id: Uuid) -> Result<Client, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo
            .find_by_id(executor, user_id, id)
            .await?
            .ok_or(AppError::ClientNotFound)
    }

    pub async fn create<'e, E>(&self, executor: E, user_id: Uuid, input: &ClientFields) -> Result<Client, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let client = self.repo.create(executor, user_id, input).await?;
        tracing::info!(user_id = %user_id, client_id = %client.id, "Cliente criado");
        Ok(client)
    }

    pub async fn update<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        id: Uuid,
        input: &ClientFields,
    ) -> Result<Client, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo
            .update(executor, user_id, id, input)
            .await?
            .ok_or(AppError::ClientNotFound)
    }

    /// Remove o cliente. Recusa se houver faturas ligadas a ele.
    pub async fn delete<'e, E>(&self, executor: E, user_id: Uuid, id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        self.repo
            .find_by_id(&mut *tx, user_id, id)
            .await?
            .ok_or(AppError::ClientNotFound)?;

        if self.repo.count_invoices(&mut *tx, id).await? > 0 {
            return Err(AppError::ClientHasInvoices);
        }

        self.repo.delete(&mut *tx, user_id, id).await?;
        tx.commit().await?;

        tracing::info!(user_id = %user_id, client_id = %id, "Cliente removido");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn siren_uses_luhn() {
        assert!(is_valid_siren("732829320"));
        assert!(is_valid_siren("552100554"));
        assert!(!is_valid_siren("123456789"));
        assert!(!is_valid_siren("73282932"));
        assert!(!is_valid_siren("73282932A"));
    }

    #[test]
    fn siret_uses_luhn_with_la_poste_exception() {
        assert!(is_valid_siret("73282932000074"));
        assert!(is_valid_siret("55210055400013"));
        assert!(!is_valid_siret("73282932000075"));
        // La Poste: soma dos dígitos múltipla de 5
        assert!(is_valid_siret("35600000000010"));
        assert!(!is_valid_siret("35600000000011"));
    }

    #[test]
    fn vat_key_is_derived_from_siren() {
        assert_eq!(vat_key("732829320"), Some(44));
        assert_eq!(vat_key("404833048"), Some(83));
        assert!(is_valid_vat_number("FR44732829320"));
        assert!(is_valid_vat_number("fr83404833048"));
        assert!(!is_valid_vat_number("FR45732829320"));
        assert!(!is_valid_vat_number("DE44732829320"));
        assert!(!is_valid_vat_number("FR4473282932"));
    }

    #[test]
    fn siret_must_extend_siren() {
        assert!(siret_matches_siren("73282932000074", "732829320"));
        assert!(!siret_matches_siren("55210055400013", "732829320"));
    }
}
