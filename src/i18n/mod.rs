//! Message catalog for display-ready keys.
//!
//! Translations are loaded once at startup and handed to whoever renders
//! text. Lookups never fail: an unknown key renders as itself.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, warn};


const LOG_TARGET: &str = "serene_player::i18n";

/// Supported interface languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Fr,
    Es,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::En, Language::Fr, Language::Es];

    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Fr => "fr",
            Language::Es => "es",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::ALL
            .into_iter()
            .find(|lang| lang.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CatalogError::UnknownLanguage(s.to_string()))
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("unknown language '{0}' (expected en, fr or es)")]
    UnknownLanguage(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Resolves a message key to display text.
pub trait MessageCatalog: Send + Sync {
    /// Returns the text for `key`, or `key` itself when there is none.
    fn translate(&self, key: &str) -> String;
}

/// Flat key → text table for one language.
#[derive(Debug, Clone)]
pub struct Translations {
    language: Language,
    messages: HashMap<String, String>,
}

impl Translations {
    /// The compiled-in table for `language`.
    pub fn builtin(language: Language) -> Self {
        let table: &[(&str, &str)] = match language {
            Language::En => EN,
            Language::Fr => FR,
            Language::Es => ES,
        };
        Self::from_messages(
            language,
            table.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        )
    }

    pub fn from_messages(language: Language, messages: HashMap<String, String>) -> Self {
        Translations { language, messages }
    }

    /// Reads `<dir>/<code>.json` and layers it over the built-in table.
    pub fn load(dir: &Path, language: Language) -> Result<Self, CatalogError> {
        let path = dir.join(format!("{}.json", language.code()));
        let content = fs::read_to_string(&path).map_err(|source| CatalogError::Io {
            path: path.clone(),
            source,
        })?;
        let overrides: HashMap<String, String> =
            serde_json::from_str(&content).map_err(|source| CatalogError::Parse {
                path: path.clone(),
                source,
            })?;
        debug!(target: LOG_TARGET, "Loaded {} messages from {}.", overrides.len(), path.display());

        let mut translations = Self::builtin(language);
        translations.messages.extend(overrides);
        Ok(translations)
    }

    /// Like [`load`](Self::load), but falls back to the built-in table so a
    /// missing or broken locale file never blocks startup.
    pub fn load_or_builtin(dir: Option<&Path>, language: Language) -> Self {
        let Some(dir) = dir else {
            return Self::builtin(language);
        };
        match Self::load(dir, language) {
            Ok(translations) => {
                info!(target: LOG_TARGET, "Using '{}' translations from {}.", language, dir.display());
                translations
            }
            Err(e) => {
                warn!(target: LOG_TARGET, "{}; using built-in '{}' messages.", e, language);
                Self::builtin(language)
            }
        }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl MessageCatalog for Translations {
    fn translate(&self, key: &str) -> String {
        self.messages
            .get(key)
            .filter(|text| !text.is_empty())
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }
}

const EN: &[(&str, &str)] = &[
    ("player.status.playing", "Playing"),
    ("player.status.paused", "Paused"),
    ("player.status.preparingAudio", "Preparing audio..."),
    ("player.status.playbackUnavailable", "Playback unavailable"),
    ("player.status.finished", "Session complete"),
    ("player.audioErrorTitle", "Audio Error"),
    ("player.audioErrorBody", "The meditation audio could not be loaded."),
    ("player.audioDeviceUnavailable", "No audio output device is available."),
    ("player.speedLabel", "Playback speed"),
    ("player.controlsHint", "[space] play/pause  [+/-] speed  [q] quit"),
    ("player.finishedHint", "[q] quit"),
];

const FR: &[(&str, &str)] = &[
    ("player.status.playing", "Lecture"),
    ("player.status.paused", "En pause"),
    ("player.status.preparingAudio", "Préparation de l'audio..."),
    ("player.status.playbackUnavailable", "Lecture indisponible"),
    ("player.status.finished", "Séance terminée"),
    ("player.audioErrorTitle", "Erreur audio"),
    ("player.audioErrorBody", "L'audio de la méditation n'a pas pu être chargé."),
    ("player.audioDeviceUnavailable", "Aucun périphérique audio disponible."),
    ("player.speedLabel", "Vitesse de lecture"),
    ("player.controlsHint", "[espace] lecture/pause  [+/-] vitesse  [q] quitter"),
    ("player.finishedHint", "[q] quitter"),
];

const ES: &[(&str, &str)] = &[
    ("player.status.playing", "Reproduciendo"),
    ("player.status.paused", "En pausa"),
    ("player.status.preparingAudio", "Preparando audio..."),
    ("player.status.playbackUnavailable", "Reproducción no disponible"),
    ("player.status.finished", "Sesión completada"),
    ("player.audioErrorTitle", "Error de audio"),
    ("player.audioErrorBody", "No se pudo cargar el audio de la meditación."),
    ("player.audioDeviceUnavailable", "No hay ningún dispositivo de audio disponible."),
    ("player.speedLabel", "Velocidad de reproducción"),
    ("player.controlsHint", "[espacio] reproducir/pausa  [+/-] velocidad  [q] salir"),
    ("player.finishedHint", "[q] salir"),
];
