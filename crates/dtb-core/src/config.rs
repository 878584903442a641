use std::{env, fs, path::Path, time::Duration};

use crate::{errors::Error, Result};

/// Typed configuration, read from the environment (and `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    pub discord_bot_token: String,
    pub azure_translator: Option<AzureTranslatorConfig>,
    pub libre_translate: Option<LibreTranslateConfig>,
    /// Per-request timeout for provider HTTP calls.
    pub provider_http_timeout: Duration,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AzureTranslatorConfig {
    /// Always ends with `/`.
    pub api_url: String,
    pub secret_key: String,
    pub region: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LibreTranslateConfig {
    /// Always ends with `/`.
    pub api_url: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(env_str)
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).and_then(non_empty);
        let flag = |key: &str| var(key).map(|s| parse_bool(&s)).unwrap_or(false);

        let discord_bot_token = var("DISCORD_BOT_TOKEN").ok_or_else(|| {
            Error::Config("DISCORD_BOT_TOKEN environment variable is required".to_string())
        })?;

        let azure_translator = if flag("AZURE_TRANSLATOR_ENABLED") {
            Some(AzureTranslatorConfig {
                api_url: normalize_url(&required(&var, "AZURE_TRANSLATOR_API_URL")?),
                secret_key: required(&var, "AZURE_TRANSLATOR_SECRET_KEY")?,
                region: required(&var, "AZURE_TRANSLATOR_REGION")?,
            })
        } else {
            None
        };

        let libre_translate = if flag("LIBRE_TRANSLATE_ENABLED") {
            Some(LibreTranslateConfig {
                api_url: normalize_url(&required(&var, "LIBRE_TRANSLATE_API_URL")?),
            })
        } else {
            None
        };

        if azure_translator.is_none() && libre_translate.is_none() {
            return Err(Error::Config(
                "at least one translation provider must be enabled \
                 (AZURE_TRANSLATOR_ENABLED or LIBRE_TRANSLATE_ENABLED)"
                    .to_string(),
            ));
        }

        let timeout_ms = match var("PROVIDER_HTTP_TIMEOUT_MS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                Error::Config(format!("PROVIDER_HTTP_TIMEOUT_MS is not a number: {raw}"))
            })?,
            None => 10_000,
        };

        Ok(Self {
            discord_bot_token,
            azure_translator,
            libre_translate,
            provider_http_timeout: Duration::from_millis(timeout_ms),
        })
    }
}

fn required(var: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    var(key).ok_or_else(|| {
        Error::Config(format!(
            "{key} is required when its translation provider is enabled"
        ))
    })
}

fn normalize_url(url: &str) -> String {
    let url = url.trim();
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
