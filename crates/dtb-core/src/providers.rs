//! Translation provider port and the shared language-capability types.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{countries::Country, errors::Error, Result};

/// Outcome of one successful provider call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranslationResult {
    pub provider_name: String,
    pub detected_language_code: Option<String>,
    pub detected_language_name: Option<String>,
    pub target_language_code: String,
    pub target_language_name: Option<String>,
    pub translated_text: String,
}

impl TranslationResult {
    /// Detected source language for display (name, falling back to code).
    /// `None` when the provider detected nothing.
    pub fn source_display(&self) -> Option<&str> {
        let code = self
            .detected_language_code
            .as_deref()
            .filter(|c| !c.trim().is_empty())?;
        Some(self.detected_language_name.as_deref().unwrap_or(code))
    }

    pub fn target_display(&self) -> &str {
        self.target_language_name
            .as_deref()
            .unwrap_or(&self.target_language_code)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SupportedLanguage {
    pub code: String,
    pub name: String,
}

/// A provider's capability set. Loaded once at startup.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SupportedLanguages {
    languages: Vec<SupportedLanguage>,
}

impl SupportedLanguages {
    pub fn new(languages: impl IntoIterator<Item = SupportedLanguage>) -> Self {
        let mut out: Vec<SupportedLanguage> = Vec::new();
        for lang in languages {
            if !out.iter().any(|l| l.code.eq_ignore_ascii_case(&lang.code)) {
                out.push(lang);
            }
        }
        Self { languages: out }
    }

    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.languages.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SupportedLanguage> {
        self.languages.iter()
    }

    /// First of the country's language codes this provider supports.
    pub fn for_country(&self, country: &Country) -> Option<&SupportedLanguage> {
        country
            .lang_codes
            .iter()
            .find_map(|code| self.find(code))
    }

    /// Display name for a language code (e.g. a detected source language).
    pub fn name_of(&self, code: &str) -> Option<&str> {
        self.find(code).map(|l| l.name.as_str())
    }

    /// Look up a user-supplied language by code or display name.
    pub fn resolve(&self, query: &str) -> Option<&SupportedLanguage> {
        let query = query.trim();
        self.find(query).or_else(|| {
            self.languages
                .iter()
                .find(|l| l.name.eq_ignore_ascii_case(query))
        })
    }

    /// Resolve an explicit translation request's target and optional source.
    pub fn resolve_request(
        &self,
        provider: &str,
        target: &str,
        source: Option<&str>,
    ) -> Result<(&SupportedLanguage, Option<&SupportedLanguage>)> {
        let resolved_target = self.resolve(target).ok_or_else(|| {
            requested_language_not_supported(provider, LanguageRole::Target, target)
        })?;
        let resolved_source = source
            .map(|source| {
                self.resolve(source).ok_or_else(|| {
                    requested_language_not_supported(provider, LanguageRole::Source, source)
                })
            })
            .transpose()?;
        Ok((resolved_target, resolved_source))
    }

    fn find(&self, code: &str) -> Option<&SupportedLanguage> {
        self.languages
            .iter()
            .find(|l| l.code.eq_ignore_ascii_case(code))
    }
}

/// The error a provider raises when none of the country's languages is
/// supported. The message is shown to users as-is.
pub fn language_not_supported(provider: &str, country: &Country) -> Error {
    Error::LanguageNotSupportedForCountry(format!(
        "Target language isn't supported by {provider} for {}.",
        country.name
    ))
}

/// Which side of a translation a requested language is on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LanguageRole {
    Source,
    Target,
}

/// The error a provider raises for an explicitly requested language it doesn't
/// know. The message is shown to users as-is.
pub fn requested_language_not_supported(provider: &str, role: LanguageRole, query: &str) -> Error {
    let role = match role {
        LanguageRole::Source => "Source",
        LanguageRole::Target => "Target",
    };
    Error::LanguageNotSupported(format!(
        "{role} language \"{}\" isn't supported by {provider}.",
        query.trim()
    ))
}

/// Port for a remote translation backend.
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    /// Display name, used in replies and logs.
    fn name(&self) -> &str;

    /// Fetch the provider's supported languages. Called once at startup;
    /// a failure aborts startup.
    async fn initialize_supported_languages(&self, cancel: &CancellationToken) -> Result<()>;

    /// Translate `text` into the first of `country`'s languages this provider
    /// supports.
    ///
    /// Fails with [`Error::LanguageNotSupportedForCountry`] when there is no such
    /// language; any other error is an operational failure.
    async fn translate_by_country(
        &self,
        country: &Country,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<TranslationResult>;

    /// Translate `text` into an explicitly requested language.
    ///
    /// `target_code` and `source_code` are matched against the supported
    /// languages by code or display name. Without a source the provider
    /// detects it. Fails with [`Error::LanguageNotSupported`] when either
    /// language is unknown.
    async fn translate(
        &self,
        target_code: &str,
        text: &str,
        source_code: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<TranslationResult>;
}

/// Providers in priority order. Built once, never mutated.
#[derive(Clone, Default)]
pub struct ProviderList {
    providers: Arc<[Arc<dyn TranslationProvider>]>,
}

impl ProviderList {
    pub fn new(providers: Vec<Arc<dyn TranslationProvider>>) -> Self {
        Self {
            providers: providers.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn TranslationProvider>> {
        self.providers.iter()
    }

    /// Initialize every provider in order, stopping at the first failure.
    pub async fn initialize_all(&self, cancel: &CancellationToken) -> Result<()> {
        for provider in self.iter() {
            provider.initialize_supported_languages(cancel).await.map_err(|e| {
                tracing::error!(
                    provider = provider.name(),
                    error = %e,
                    "failed to initialize supported languages"
                );
                e
            })?;
            tracing::info!(provider = provider.name(), "supported languages initialized");
        }
        Ok(())
    }
}
