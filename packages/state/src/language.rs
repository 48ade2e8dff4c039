//! Display language.

use std::str::FromStr;
use std::sync::Arc;

use otadash_storage::{keys, Storage};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::UnsupportedLanguage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Ar,
    Fr,
    #[default]
    En,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ltr,
    Rtl,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::Ar, Language::Fr, Language::En];

    pub fn code(self) -> &'static str {
        match self {
            Language::Ar => "ar",
            Language::Fr => "fr",
            Language::En => "en",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Language::Ar => "Arabic",
            Language::Fr => "French",
            Language::En => "English",
        }
    }

    pub fn direction(self) -> Direction {
        match self {
            Language::Ar => Direction::Rtl,
            _ => Direction::Ltr,
        }
    }

    /// Match a locale tag such as `fr`, `fr-CA` or `fr_FR.UTF-8` by its
    /// primary subtag.
    pub fn from_locale(tag: &str) -> Option<Self> {
        let primary = tag.split(['-', '_', '.']).next()?.trim();
        Self::ALL
            .into_iter()
            .find(|lang| lang.code().eq_ignore_ascii_case(primary))
    }
}

impl FromStr for Language {
    type Err = UnsupportedLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_locale(s).ok_or_else(|| UnsupportedLanguage(s.to_string()))
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// The locale of the running process, from the usual environment variables.
pub fn system_locale() -> Option<String> {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|value| !value.is_empty() && value != "C" && value != "POSIX")
}

/// The chosen language, persisted under `user-lang`.
#[derive(Clone)]
pub struct LanguageStore {
    storage: Arc<dyn Storage>,
    current: Arc<RwLock<Language>>,
}

impl LanguageStore {
    /// Stored choice, else the system locale when supported, else English.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self::with_locale(storage, system_locale().as_deref())
    }

    pub fn with_locale(storage: Arc<dyn Storage>, locale: Option<&str>) -> Self {
        let language = stored_language(storage.as_ref())
            .or_else(|| locale.and_then(Language::from_locale))
            .unwrap_or_default();
        Self {
            storage,
            current: Arc::new(RwLock::new(language)),
        }
    }

    pub fn language(&self) -> Language {
        *self.current.read()
    }

    pub fn direction(&self) -> Direction {
        self.language().direction()
    }

    pub fn set_language(&self, language: Language) {
        *self.current.write() = language;
        let write = serde_json::to_string(&language)
            .map_err(otadash_storage::StorageError::from)
            .and_then(|json| self.storage.set(keys::USER_LANGUAGE, &json));
        if let Err(error) = write {
            tracing::warn!(%error, "Failed to persist language");
        }
    }
}

impl std::fmt::Debug for LanguageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanguageStore")
            .field("language", &self.language())
            .finish()
    }
}

/// Accepts both a JSON string and a bare code.
fn stored_language(storage: &dyn Storage) -> Option<Language> {
    let raw = match storage.get(keys::USER_LANGUAGE) {
        Ok(raw) => raw?,
        Err(error) => {
            tracing::warn!(%error, "Failed to read language");
            return None;
        }
    };
    serde_json::from_str::<Language>(&raw)
        .ok()
        .or_else(|| Language::from_locale(&raw))
}
