//! Azure Translator (Cognitive Services Translator v3).

use std::{collections::BTreeMap, sync::OnceLock, time::Duration};

use async_trait::async_trait;
use dtb_core::{
    config::AzureTranslatorConfig,
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

pub const PROVIDER_NAME: &str = "Azure Translator";

/// Azure rejects request text of 10,000 characters or more.
pub const TEXT_CHARACTER_LIMIT: usize = 10_000;

const LANGUAGES_URL: &str =
    "https://api.cognitive.microsofttranslator.com/languages?api-version=3.0&scope=translation";

pub struct AzureTranslatorProvider {
    cfg: AzureTranslatorConfig,
    http: reqwest::Client,
    languages: OnceLock<SupportedLanguages>,
}

impl AzureTranslatorProvider {
    pub fn new(cfg: AzureTranslatorConfig, timeout: Duration) -> Result<Self> {
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
}

#[async_trait]
impl TranslationProvider for AzureTranslatorProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn initialize_supported_languages(&self, cancel: &CancellationToken) -> Result<()> {
        if self.languages.get().is_some() {
            return Ok(());
        }

        let resp = http::send(cancel, "Azure Translator languages", || {
            self.http.get(LANGUAGES_URL)
        })
        .await?;
        let body = resp
            .text()
            .await
            .map_err(|e| Error::External(format!("Azure Translator languages body error: {e}")))?;

        let languages = parse_languages(&body)?;
        tracing::debug!(count = languages.len(), "Azure Translator languages loaded");
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

impl AzureTranslatorProvider {
    async fn translate_to(
        &self,
        languages: &SupportedLanguages,
        target: &SupportedLanguage,
        source: Option<&SupportedLanguage>,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<TranslationResult> {
        check_length(text)?;

        let url = format!("{}translate", self.cfg.api_url);
        let query = translate_query(target, source);
        let body = [TranslateRequest { text }];
        let resp = http::send(cancel, "Azure Translator translate", || {
            self.http
                .post(&url)
                .query(&query)
                .header("Ocp-Apim-Subscription-Key", &self.cfg.secret_key)
                .header("Ocp-Apim-Subscription-Region", &self.cfg.region)
                .json(&body)
        })
        .await?;
        let raw = resp
            .text()
            .await
            .map_err(|e| Error::External(format!("Azure Translator translate body error: {e}")))?;

        let parsed = parse_translation(&raw)?;
        // Azure only reports a detected language when it had to detect one.
        let detected_language_code = parsed
            .detected_language_code
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
            translated_text: parsed.text,
        })
    }
}

/// `to` is always set; `from` only for an explicit source, otherwise Azure
/// detects it.
fn translate_query<'a>(
    target: &'a SupportedLanguage,
    source: Option<&'a SupportedLanguage>,
) -> Vec<(&'static str, &'a str)> {
    let mut query = vec![("api-version", "3.0"), ("to", target.code.as_str())];
    if let Some(source) = source {
        query.push(("from", source.code.as_str()));
    }
    query
}

fn check_length(text: &str) -> Result<()> {
    let len = text.chars().count();
    if len >= TEXT_CHARACTER_LIMIT {
        tracing::error!(
            limit = TEXT_CHARACTER_LIMIT,
            len,
            "text exceeds Azure Translator character limit"
        );
        return Err(Error::External(format!(
            "The text can't exceed {TEXT_CHARACTER_LIMIT} characters including spaces. Length: {len}."
        )));
    }
    Ok(())
}

#[derive(Serialize)]
struct TranslateRequest<'a> {
    #[serde(rename = "Text")]
    text: &'a str,
}

#[derive(Deserialize)]
struct LanguagesResponse {
    #[serde(default)]
    translation: BTreeMap<String, LanguageEntry>,
}

#[derive(Deserialize)]
struct LanguageEntry {
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslateResult {
    detected_language: Option<DetectedLanguage>,
    #[serde(default)]
    translations: Vec<Translation>,
}

#[derive(Deserialize)]
struct DetectedLanguage {
    language: String,
}

#[derive(Deserialize)]
struct Translation {
    text: String,
}

#[derive(Debug, PartialEq, Eq)]
struct ParsedTranslation {
    detected_language_code: Option<String>,
    text: String,
}

fn parse_languages(body: &str) -> Result<SupportedLanguages> {
    let resp: LanguagesResponse = serde_json::from_str(body)?;
    if resp.translation.is_empty() {
        return Err(Error::External(
            "Azure Translator languages endpoint returned no language codes".to_string(),
        ));
    }
    Ok(SupportedLanguages::new(resp.translation.into_iter().map(
        |(code, entry)| SupportedLanguage {
            code,
            name: entry.name,
        },
    )))
}

fn parse_translation(body: &str) -> Result<ParsedTranslation> {
    let results: Vec<TranslateResult> = serde_json::from_str(body)?;
    let mut results = results.into_iter();
    let (Some(result), None) = (results.next(), results.next()) else {
        return Err(Error::External(
            "Azure Translator returned an unexpected number of results".to_string(),
        ));
    };
    let Some(translation) = result.translations.into_iter().next() else {
        return Err(Error::External(
            "Azure Translator returned no translation".to_string(),
        ));
    };

    Ok(ParsedTranslation {
        detected_language_code: result
            .detected_language
            .map(|d| d.language)
            .filter(|code| !code.trim().is_empty()),
        text: translation.text,
    })
}
