use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use super::retry::{
    RATE_LIMIT_BASE_DELAY, RATE_LIMIT_MAX_RETRIES, is_rate_limited, retry_after, wait_with_backoff,
};
use super::{TextTranslator, TranslateError};
use crate::settings::TranslatorSettings;

const BACKEND_NAME: &str = "LibreTranslate";

/// Client for a LibreTranslate (Argos) server.
#[derive(Debug, Clone)]
pub struct LibreTranslate {
    client: Client,
    base_url: String,
    source: String,
    target: String,
    api_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LanguageInfo {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub targets: Vec<String>,
}

#[derive(Deserialize)]
struct TranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: Option<String>,
    error: Option<String>,
}

impl LibreTranslate {
    pub fn new(settings: &TranslatorSettings) -> Result<Self, TranslateError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
            .build()?;
        Ok(Self {
            client,
            base_url: settings.url.trim_end_matches('/').to_string(),
            source: settings.source.clone(),
            target: settings.target.clone(),
            api_key: settings
                .api_key
                .clone()
                .filter(|key| !key.trim().is_empty()),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Languages installed on the server.
    pub fn languages(&self) -> Result<Vec<LanguageInfo>, TranslateError> {
        let url = format!("{}/languages", self.base_url);
        let response = self.client.get(&url).send()?;
        let status = response.status();
        let text = response.text().unwrap_or_default();
        if !status.is_success() {
            return Err(TranslateError::Status {
                backend: BACKEND_NAME,
                status: status.as_u16(),
                body: extract_error(&text).unwrap_or(text),
            });
        }
        serde_json::from_str(&text).map_err(|err| TranslateError::Decode(err.to_string()))
    }

    /// Target codes reachable from the configured source language.
    pub fn targets_for_source(&self) -> Result<Vec<String>, TranslateError> {
        let languages = self.languages()?;
        let mut targets: Vec<String> = languages
            .iter()
            .find(|language| language.code.eq_ignore_ascii_case(&self.source))
            .map(|language| language.targets.clone())
            .unwrap_or_default()
            .into_iter()
            .filter(|code| !code.eq_ignore_ascii_case(&self.source))
            .collect();
        targets.sort();
        targets.dedup();
        Ok(targets)
    }

    fn request_body(&self, text: &str) -> Value {
        let mut body = json!({
            "q": text,
            "source": self.source,
            "target": self.target,
            "format": "text",
        });
        if let (Some(key), Some(map)) = (&self.api_key, body.as_object_mut()) {
            map.insert("api_key".to_string(), Value::String(key.clone()));
        }
        body
    }
}

impl TextTranslator for LibreTranslate {
    fn translate(&self, text: &str) -> Result<String, TranslateError> {
        let url = format!("{}/translate", self.base_url);
        let body = self.request_body(text);

        let mut attempt = 0usize;
        let mut delay = RATE_LIMIT_BASE_DELAY;
        loop {
            attempt += 1;
            let response = self.client.post(&url).json(&body).send()?;
            let status = response.status();
            let retry_after = retry_after(response.headers());
            let text = response.text().unwrap_or_default();
            if status.is_success() {
                return parse_translation(&text);
            }
            if is_rate_limited(status, &text) && attempt < RATE_LIMIT_MAX_RETRIES {
                delay = wait_with_backoff(BACKEND_NAME, attempt, delay, retry_after);
                continue;
            }
            debug!(status = status.as_u16(), "translation request rejected");
            return Err(TranslateError::Status {
                backend: BACKEND_NAME,
                status: status.as_u16(),
                body: extract_error(&text).unwrap_or(text),
            });
        }
    }
}

fn parse_translation(body: &str) -> Result<String, TranslateError> {
    let parsed: TranslateResponse =
        serde_json::from_str(body).map_err(|err| TranslateError::Decode(err.to_string()))?;
    if let Some(error) = parsed.error {
        return Err(TranslateError::Backend(error));
    }
    match parsed.translated_text {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(TranslateError::EmptyResponse),
    }
}

fn extract_error(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("error")
        .and_then(Value::as_str)
        .map(|message| message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_successful_responses() {
        assert_eq!(
            parse_translation(r#"{"translatedText":"Hola mundo"}"#).unwrap(),
            "Hola mundo"
        );
    }

    #[test]
    fn maps_error_payloads() {
        assert!(matches!(
            parse_translation(r#"{"error":"language not supported"}"#),
            Err(TranslateError::Backend(message)) if message == "language not supported"
        ));
        assert!(matches!(
            parse_translation(r#"{"translatedText":""}"#),
            Err(TranslateError::EmptyResponse)
        ));
        assert!(matches!(
            parse_translation("<html>"),
            Err(TranslateError::Decode(_))
        ));
    }

    #[test]
    fn extracts_error_messages() {
        assert_eq!(
            extract_error(r#"{"error":"Invalid API key"}"#).as_deref(),
            Some("Invalid API key")
        );
        assert_eq!(extract_error("plain text"), None);
    }

    #[test]
    fn api_key_is_sent_only_when_configured() {
        let settings = TranslatorSettings::default();
        let client = LibreTranslate::new(&settings).unwrap();
        assert!(client.request_body("x").get("api_key").is_none());

        let settings = TranslatorSettings {
            api_key: Some("secret".to_string()),
            url: "http://localhost:5000/".to_string(),
            ..TranslatorSettings::default()
        };
        let client = LibreTranslate::new(&settings).unwrap();
        assert_eq!(client.base_url, "http://localhost:5000");
        assert_eq!(client.request_body("x")["api_key"], "secret");
    }

    #[test]
    fn language_list_deserializes() {
        let languages: Vec<LanguageInfo> = serde_json::from_str(
            r#"[{"code":"en","name":"English","targets":["es","fr","en"]},{"code":"es","name":"Spanish"}]"#,
        )
        .unwrap();
        assert_eq!(languages[0].targets, vec!["es", "fr", "en"]);
        assert!(languages[1].targets.is_empty());
    }
}
