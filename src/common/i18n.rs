// src/common/i18n.rs

use std::{collections::HashMap, sync::Arc};

use anyhow::Context;

const DEFAULT_LANG: &str = "en";

// Catálogos embutidos no binário
const CATALOGS: [(&str, &str); 3] = [
    ("en", include_str!("../../locales/en.json")),
    ("fr", include_str!("../../locales/fr.json")),
    ("pt", include_str!("../../locales/pt.json")),
];

/// Mensagens traduzidas por idioma e chave.
#[derive(Clone, Debug)]
pub struct I18nStore {
    catalogs: Arc<HashMap<String, HashMap<String, String>>>,
}

impl I18nStore {
    pub fn load() -> anyhow::Result<Self> {
        let mut catalogs = HashMap::new();
        for (lang, raw) in CATALOGS {
            let messages: HashMap<String, String> = serde_json::from_str(raw)
                .with_context(|| format!("Catálogo de mensagens '{}' inválido", lang))?;
            catalogs.insert(lang.to_string(), messages);
        }
        Ok(Self {
            catalogs: Arc::new(catalogs),
        })
    }

    pub fn languages(&self) -> Vec<&str> {
        let mut langs: Vec<&str> = self.catalogs.keys().map(String::as_str).collect();
        langs.sort_unstable();
        langs
    }

    /// Idioma desconhecido cai no inglês; chave desconhecida volta como está.
    pub fn translate(&self, lang: &str, key: &str) -> String {
        self.catalogs
            .get(lang)
            .and_then(|c| c.get(key))
            .or_else(|| self.catalogs.get(DEFAULT_LANG).and_then(|c| c.get(key)))
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }

    pub fn translate_with(&self, lang: &str, key: &str, params: &[(&str, String)]) -> String {
        let mut message = self.translate(lang, key);
        for (name, value) in params {
            message = message.replace(&format!("{{{}}}", name), value);
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_catalogs_have_the_same_keys() {
        let store = I18nStore::load().unwrap();
        let reference: Vec<_> = {
            let mut keys: Vec<_> = store.catalogs[DEFAULT_LANG].keys().collect();
            keys.sort();
            keys
        };
        for lang in store.languages() {
            let mut keys: Vec<_> = store.catalogs[lang].keys().collect();
            keys.sort();
            assert_eq!(keys, reference, "catalog {} is out of sync", lang);
        }
    }

    #[test]
    fn falls_back_to_english_then_to_key() {
        let store = I18nStore::load().unwrap();
        assert_eq!(store.translate("de", "invoice_not_found"), store.translate("en", "invoice_not_found"));
        assert_eq!(store.translate("fr", "no_such_key"), "no_such_key");
    }

    #[test]
    fn substitutes_named_params() {
        let store = I18nStore::load().unwrap();
        let msg = store.translate_with("pt", "too_many_buckets", &[("max", "1000".to_string())]);
        assert!(msg.contains("1000"));
        assert!(!msg.contains("{max}"));
    }
}
