//! Flag reaction -> translation reply.
//!
//! Providers are tried one at a time in priority order and the first success
//! wins. "Language not supported" is only reported to the user when the last
//! provider says so; transport/parse failures are logged and never shown.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::{
    countries::{find_by_emoji, Country},
    domain::{ReactionInfo, SourceMessage},
    errors::{Error, ValidationError, ValidationFailure},
    events::ReactionAddedEvent,
    formatting::{block_quote, italics, sanitize_text},
    mediator::{Command, CommandHandler, Context, NotificationHandler},
    ports::GatewayPort,
    providers::{ProviderList, TranslationProvider, TranslationResult},
    temp_reply::SendTempReply,
    utils::run_cancellable,
    Result,
};

/// How long a successful translation stays visible.
pub const REPLY_DELETION_DELAY: Duration = Duration::from_secs(20);

pub const NO_DETECTABLE_TRANSLATION: &str =
    "Couldn't detect the source language to translate from or the result is the same.";

#[derive(Clone, Debug)]
pub struct TranslateByCountryFlagEmojiReaction {
    pub country: Country,
    pub message: SourceMessage,
    pub reaction_info: ReactionInfo,
}

impl Command for TranslateByCountryFlagEmojiReaction {
    type Output = TranslationOutcome;
}

/// Pre-conditions checked by the validation behavior.
pub fn validate_command(
    command: &TranslateByCountryFlagEmojiReaction,
) -> std::result::Result<(), ValidationError> {
    let mut failures = Vec::new();
    if command.country.lang_codes.is_empty() {
        failures.push(ValidationFailure {
            field: "country".to_string(),
            message: format!("{} has no language codes", command.country.name),
        });
    }
    if command.reaction_info.emote.is_empty() {
        failures.push(ValidationFailure {
            field: "reaction_info".to_string(),
            message: "reaction emote is required".to_string(),
        });
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { failures })
    }
}

/// Terminal state of one translation request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TranslationOutcome {
    /// The reacted message is the bot's own.
    SkippedSelfMessage,
    /// Nothing left to translate after sanitizing.
    SkippedEmptySource,
    /// Every provider failed operationally (or none is configured).
    SkippedAllProvidersFailed,
    /// The last provider doesn't support the country's language.
    FailedNoProviderSupportsLanguage,
    /// The translation equals the input.
    FailedNoDetectableTranslation,
    Succeeded { provider: String },
}

pub struct TranslateByCountryFlagEmojiReactionHandler {
    gateway: Arc<dyn GatewayPort>,
    providers: ProviderList,
}

impl TranslateByCountryFlagEmojiReactionHandler {
    pub fn new(gateway: Arc<dyn GatewayPort>, providers: ProviderList) -> Self {
        Self { gateway, providers }
    }

    async fn remove_reaction(
        &self,
        command: &TranslateByCountryFlagEmojiReaction,
        ctx: &Context<'_>,
    ) -> Result<()> {
        run_cancellable(
            ctx.cancel(),
            self.gateway
                .remove_reaction(&command.message, &command.reaction_info),
        )
        .await
    }

    async fn reply(
        &self,
        command: &TranslateByCountryFlagEmojiReaction,
        ctx: &Context<'_>,
        text: String,
        deletion_delay: Option<Duration>,
    ) -> Result<()> {
        ctx.send(SendTempReply {
            text,
            reaction_info: Some(command.reaction_info.clone()),
            source_message: command.message.clone(),
            deletion_delay,
        })
        .await?;
        Ok(())
    }

    async fn typing(
        &self,
        command: &TranslateByCountryFlagEmojiReaction,
        ctx: &Context<'_>,
    ) -> Result<()> {
        let channel_id = command.message.reference.channel_id;
        match run_cancellable(ctx.cancel(), self.gateway.trigger_typing(channel_id)).await {
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => {
                tracing::debug!(error = %e, "failed to trigger typing indicator");
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }
}

#[async_trait]
impl CommandHandler<TranslateByCountryFlagEmojiReaction>
    for TranslateByCountryFlagEmojiReactionHandler
{
    async fn handle(
        &self,
        command: &TranslateByCountryFlagEmojiReaction,
        ctx: &Context<'_>,
    ) -> Result<TranslationOutcome> {
        if self.gateway.current_user_id() == Some(command.message.author_id) {
            tracing::info!("translating this bot's messages isn't allowed");
            self.remove_reaction(command, ctx).await?;
            return Ok(TranslationOutcome::SkippedSelfMessage);
        }

        let sanitized = sanitize_text(&command.message.content);
        if sanitized.trim().is_empty() {
            tracing::info!("nothing to translate, the sanitized source message is empty");
            self.remove_reaction(command, ctx).await?;
            return Ok(TranslationOutcome::SkippedEmptySource);
        }

        self.typing(command, ctx).await?;

        let fallback = translate_with_fallback(&self.providers, ctx.cancel(), |provider| {
            provider.translate_by_country(&command.country, &sanitized, ctx.cancel())
        })
        .await?;

        let (provider_name, result) = match fallback {
            Fallback::Translated { provider, result } => (provider, result),
            Fallback::Unsupported(message) => {
                self.reply(command, ctx, message, None).await?;
                return Ok(TranslationOutcome::FailedNoProviderSupportsLanguage);
            }
            Fallback::Exhausted => {
                self.remove_reaction(command, ctx).await?;
                return Ok(TranslationOutcome::SkippedAllProvidersFailed);
            }
        };

        if result.translated_text == sanitized {
            tracing::warn!(
                provider = %provider_name,
                "couldn't detect the source language or it equals the target language"
            );
            self.reply(command, ctx, NO_DETECTABLE_TRANSLATION.to_string(), None)
                .await?;
            return Ok(TranslationOutcome::FailedNoDetectableTranslation);
        }

        let text = reply_text(&provider_name, &result);
        self.reply(command, ctx, text, Some(REPLY_DELETION_DELAY))
            .await?;
        Ok(TranslationOutcome::Succeeded {
            provider: provider_name,
        })
    }
}

#[async_trait]
impl NotificationHandler<ReactionAddedEvent> for TranslateByCountryFlagEmojiReactionHandler {
    async fn handle(&self, event: &ReactionAddedEvent, ctx: &Context<'_>) -> Result<()> {
        // Most reactions aren't translation requests.
        let Some(country) = find_by_emoji(&event.reaction_info.emote) else {
            return Ok(());
        };

        let outcome = ctx
            .send(TranslateByCountryFlagEmojiReaction {
                country,
                message: event.message.clone(),
                reaction_info: event.reaction_info.clone(),
            })
            .await?;
        tracing::debug!(country = country.code, outcome = ?outcome, "translation request finished");
        Ok(())
    }
}

/// Where a provider fallback run ended.
pub(crate) enum Fallback {
    Translated {
        provider: String,
        result: TranslationResult,
    },
    /// The last provider doesn't support the requested language. Carries the
    /// user-facing message.
    Unsupported(String),
    /// Every provider failed operationally (or none is configured).
    Exhausted,
}

/// Try `attempt` against each provider in priority order; the first success
/// wins. Only cancellation is returned as an error.
pub(crate) async fn translate_with_fallback<'a, F>(
    providers: &'a ProviderList,
    cancel: &CancellationToken,
    mut attempt: F,
) -> Result<Fallback>
where
    F: FnMut(&'a dyn TranslationProvider) -> BoxFuture<'a, Result<TranslationResult>>,
{
    let last = providers.len().saturating_sub(1);
    for (index, provider) in providers.iter().enumerate() {
        let error = match run_cancellable(cancel, attempt(provider.as_ref())).await {
            Ok(result) => {
                return Ok(Fallback::Translated {
                    provider: provider.name().to_string(),
                    result,
                })
            }
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) => e,
        };

        match error.unsupported_language_message() {
            Some(message) => {
                tracing::warn!(
                    provider = provider.name(),
                    reason = message,
                    "requested language not supported by provider"
                );
                if index == last {
                    return Ok(Fallback::Unsupported(message.to_string()));
                }
            }
            None => {
                tracing::error!(
                    provider = provider.name(),
                    error = %error,
                    "failed to translate text"
                );
            }
        }
    }
    Ok(Fallback::Exhausted)
}

/// Reply body for a successful translation.
pub fn reply_text(provider_name: &str, result: &TranslationResult) -> String {
    let target = italics(result.target_display());
    let quoted = block_quote(&result.translated_text);
    match result.source_display() {
        Some(source) => format!(
            "Translated message from {} to {target} ({provider_name}):\n{quoted}",
            italics(source)
        ),
        None => format!("Translated message to {target} ({provider_name}):\n{quoted}"),
    }
}
