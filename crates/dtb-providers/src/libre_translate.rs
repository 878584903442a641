//! LibreTranslate (self-hostable, no API key).

use std::{sync::OnceLock, time::Duration};

use async_trait::async_trait;
use dtb_core::{
    config::LibreTranslateConfig,
    countries::Country,
    errors::Error,
    providers::{
        language_not_supported, SupportedLanguage, SupportedLanguages, TranslationProvider,
        TranslationResult,
    },
    Result,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::http;

pub const PROVIDER_NAME: &str = "LibreTranslate";

pub struct LibreTranslateProvider {
    cfg: LibreTranslateConfig,
    http: reqwest::Client,
    languages: OnceLock<SupportedLanguages>,
}

impl LibreTranslateProvider {
    pub fn new(cfg: LibreTranslateConfig, timeout: Duration) -> Result<Self> {
        Ok(Self {
            cfg,
            http: http::build_client(timeout)?,
            languages: OnceLock::new(),
        })
    }

    fn languages(&self) -> Result<&SupportedLanguages> {
        self.languages.get().ok_or_else(|| {
            Error::External(format!("{PROVIDER_NAME}: supported languages not initialized"))
        })
    }

    async fn translate_to(
        &self,
        languages: &SupportedLanguages,
        target: &SupportedLanguage,
        source: Option<&SupportedLanguage>,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<TranslationResult> {
        let url = format!("{}translate", self.cfg.api_url);
        let body = TranslateRequest::new(text, target, source);
        let resp = http::send(cancel, "LibreTranslate translate", || {
            self.http.post(&url).json(&body)
        })
        .await?;
        let raw = resp
            .text()
            .await
            .map_err(|e| Error::External(format!("LibreTranslate translate body error: {e}")))?;

        let parsed = parse_translation(&raw)?;
        let detected_language_code = parsed
            .detected_language
            .map(|d| d.language)
            .or_else(|| source.map(|l| l.code.clone()));
        Ok(TranslationResult {
            provider_name: PROVIDER_NAME.to_string(),
            detected_language_name: detected_language_code
                .as_deref()
                .and_then(|code| languages.name_of(code))
                .map(str::to_string),
            detected_language_code,
            target_language_code: target.code.clone(),
            target_language_name: Some(target.name.clone()),
            translated_text: parsed.translated_text,
        })
    }
}

#[async_trait]
impl TranslationProvider for LibreTranslateProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn initialize_supported_languages(&self, cancel: &CancellationToken) -> Result<()> {
        if self.languages.get().is_some() {
            return Ok(());
        }

        let url = format!("{}languages", self.cfg.api_url);
        let resp = http::send(cancel, "LibreTranslate languages", || self.http.get(&url)).await?;
        let body = resp
            .text()
            .await
            .map_err(|e| Error::External(format!("LibreTranslate languages body error: {e}")))?;

        let languages = parse_languages(&body)?;
        tracing::debug!(count = languages.len(), "LibreTranslate languages loaded");
        let _ = self.languages.set(languages);
        Ok(())
    }

    async fn translate_by_country(
        &self,
        country: &Country,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<TranslationResult> {
        let languages = self.languages()?;
        let target = languages
            .for_country(country)
            .ok_or_else(|| language_not_supported(PROVIDER_NAME, country))?;
        self.translate_to(languages, target, None, text, cancel)
            .await
    }

    async fn translate(
        &self,
        target_code: &str,
        text: &str,
        source_code: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<TranslationResult> {
        let languages = self.languages()?;
        let (target, source) =
            languages.resolve_request(PROVIDER_NAME, target_code, source_code)?;
        self.translate_to(languages, target, source, text, cancel)
            .await
    }
}

#[derive(Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'a str,
}

impl<'a> TranslateRequest<'a> {
    /// Without an explicit source LibreTranslate detects it.
    fn new(
        text: &'a str,
        target: &'a SupportedLanguage,
        source: Option<&'a SupportedLanguage>,
    ) -> Self {
        Self {
            q: text,
            source: source.map_or("auto", |l| l.code.as_str()),
            target: &target.code,
            format: "text",
        }
    }
}

#[derive(Deserialize)]
struct LanguageEntry {
    code: String,
    name: String,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct TranslateResponse {
    detected_language: Option<DetectedLanguage>,
    #[serde(default)]
    translated_text: String,
}

#[derive(Debug, Deserialize, PartialEq)]
struct DetectedLanguage {
    #[serde(default)]
    confidence: f64,
    language: String,
}

fn parse_languages(body: &str) -> Result<SupportedLanguages> {
    let entries: Vec<LanguageEntry> = serde_json::from_str(body)?;
    if entries.is_empty() {
        return Err(Error::External(
            "LibreTranslate languages endpoint returned no language codes".to_string(),
        ));
    }
    Ok(SupportedLanguages::new(entries.into_iter().map(|e| {
        SupportedLanguage {
            code: e.code,
            name: e.name,
        }
    })))
}

fn parse_translation(body: &str) -> Result<TranslateResponse> {
    let mut resp: TranslateResponse = serde_json::from_str(body)?;
    if resp.translated_text.trim().is_empty() {
        return Err(Error::External(
            "LibreTranslate returned no translation".to_string(),
        ));
    }
    if let Some(d) = &resp.detected_language {
        tracing::debug!(
            language = %d.language,
            confidence = d.confidence,
            "LibreTranslate detection"
        );
    }
    resp.detected_language = resp
        .detected_language
        .filter(|d| !d.language.trim().is_empty());
    Ok(resp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_languages() {
        let body = r#"[
            {"code": "en", "name": "English", "targets": ["fr"]},
            {"code": "pt", "name": "Portuguese", "targets": ["en"]}
        ]"#;
        let langs = parse_languages(body).unwrap();
        assert_eq!(langs.len(), 2);
        assert_eq!(langs.name_of("pt"), Some("Portuguese"));
        assert!(matches!(parse_languages("[]"), Err(Error::External(_))));
    }

    #[test]
    fn parses_translation() {
        let body = r#"{
            "detectedLanguage": {"confidence": 90.0, "language": "fr"},
            "translatedText": "Hello"
        }"#;
        let resp = parse_translation(body).unwrap();
        assert_eq!(resp.translated_text, "Hello");
        assert_eq!(resp.detected_language.unwrap().language, "fr");
    }

    #[test]
    fn empty_translation_is_an_error() {
        let body = r#"{"translatedText": ""}"#;
        assert!(matches!(parse_translation(body), Err(Error::External(_))));
        assert!(matches!(parse_translation("<html>"), Err(Error::Json(_))));
    }

    #[test]
    fn blank_detected_language_is_dropped() {
        let body = r#"{"detectedLanguage": {"confidence": 0, "language": ""}, "translatedText": "Hi"}"#;
        assert_eq!(parse_translation(body).unwrap().detected_language, None);
    }

    fn lang(code: &str) -> SupportedLanguage {
        SupportedLanguage {
            code: code.to_string(),
            name: code.to_uppercase(),
        }
    }

    #[test]
    fn request_body_shape() {
        let en = lang("en");
        let body = serde_json::to_value(TranslateRequest::new("Bonjour", &en, None)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"q": "Bonjour", "source": "auto", "target": "en", "format": "text"})
        );
    }

    #[test]
    fn explicit_source_replaces_auto_detection() {
        let (en, fr) = (lang("en"), lang("fr"));
        let body = serde_json::to_value(TranslateRequest::new("Bonjour", &en, Some(&fr))).unwrap();
        assert_eq!(body["source"], "fr");
        assert_eq!(body["target"], "en");
    }
}
