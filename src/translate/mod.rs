//! Translation backends and the caching adapter the rewriter talks to.

mod cache;
mod libre;
mod retry;

use std::sync::Arc;

use anyhow::{Result, bail};
use thiserror::Error;

pub use cache::{
    AdapterStats, DEFAULT_CACHE_CAPACITY, TranslationAdapter, TranslationCache,
    is_numeric_passthrough,
};
pub use libre::{LanguageInfo, LibreTranslate};

use crate::settings::TranslatorSettings;

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{backend} error ({status}): {body}")]
    Status {
        backend: &'static str,
        status: u16,
        body: String,
    },
    #[error("failed to decode response: {0}")]
    Decode(String),
    #[error("backend returned an empty translation")]
    EmptyResponse,
    #[error("{0}")]
    Backend(String),
}

/// A raw, uncached translation function for one language pair.
pub trait TextTranslator: Send + Sync {
    fn translate(&self, text: &str) -> Result<String, TranslateError>;
}

impl<F> TextTranslator for F
where
    F: Fn(&str) -> Result<String, TranslateError> + Send + Sync,
{
    fn translate(&self, text: &str) -> Result<String, TranslateError> {
        self(text)
    }
}

/// Returns its input unchanged; useful for layout checks without a server.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTranslator;

impl TextTranslator for IdentityTranslator {
    fn translate(&self, text: &str) -> Result<String, TranslateError> {
        Ok(text.to_string())
    }
}

pub const BACKEND_LIBRETRANSLATE: &str = "libretranslate";
pub const BACKEND_IDENTITY: &str = "identity";

pub fn build_backend(settings: &TranslatorSettings) -> Result<Arc<dyn TextTranslator>> {
    match settings.backend.trim().to_ascii_lowercase().as_str() {
        BACKEND_LIBRETRANSLATE => Ok(Arc::new(LibreTranslate::new(settings)?)),
        BACKEND_IDENTITY => Ok(Arc::new(IdentityTranslator)),
        other => bail!(
            "unknown translator backend '{}' (expected {} or {})",
            other,
            BACKEND_LIBRETRANSLATE,
            BACKEND_IDENTITY
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_translators() {
        let upper = |text: &str| -> Result<String, TranslateError> { Ok(text.to_uppercase()) };
        assert_eq!(upper.translate("abc").unwrap(), "ABC");
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let settings = TranslatorSettings {
            backend: "deepl".to_string(),
            ..TranslatorSettings::default()
        };
        assert!(build_backend(&settings).is_err());
    }

    #[test]
    fn identity_backend_is_available() {
        let settings = TranslatorSettings {
            backend: "Identity".to_string(),
            ..TranslatorSettings::default()
        };
        let backend = build_backend(&settings).unwrap();
        assert_eq!(backend.translate("same").unwrap(), "same");
    }
}
