//! The `/translate` slash command.
//!
//! Registered globally once the gateway is ready. Unlike flag reactions, every
//! invocation gets an answer: the interaction is deferred up front and its
//! response is always filled in, failures included.

use std::sync::Arc;

use async_trait::async_trait;
use validator::Validate;

use crate::{
    domain::{InteractionRef, SlashCommandDefinition, SlashCommandOption},
    errors::Error,
    formatting::{block_quote, italics, sanitize_text},
    mediator::{Command, CommandHandler, Context, Notification, NotificationHandler},
    ports::GatewayPort,
    providers::{ProviderList, TranslationResult},
    translation::{
        translate_with_fallback, Fallback, TranslationOutcome, NO_DETECTABLE_TRANSLATION,
    },
    utils::run_cancellable,
    Result,
};

pub const TRANSLATE_COMMAND_NAME: &str = "translate";
pub const TO_OPTION: &str = "to";
pub const TEXT_OPTION: &str = "text";
pub const FROM_OPTION: &str = "from";

pub const NOTHING_TO_TRANSLATE: &str =
    "Nothing to translate once emotes and formatting are removed.";

pub const TRANSLATION_UNAVAILABLE: &str =
    "Couldn't translate the text right now, please try again later.";

/// The `/translate to:<language> text:<text> [from:<language>]` definition.
pub fn translate_command() -> SlashCommandDefinition {
    SlashCommandDefinition {
        name: TRANSLATE_COMMAND_NAME,
        description: "Translate text into another language",
        options: vec![
            SlashCommandOption {
                name: TO_OPTION,
                description: "Target language code or name, e.g. fr or French",
                required: true,
            },
            SlashCommandOption {
                name: TEXT_OPTION,
                description: "The text to translate",
                required: true,
            },
            SlashCommandOption {
                name: FROM_OPTION,
                description: "Source language code or name; detected when omitted",
                required: false,
            },
        ],
    }
}

/// Register (or replace) the bot's slash commands.
#[derive(Clone, Debug, Default)]
pub struct RegisterSlashCommands;

impl Command for RegisterSlashCommands {
    type Output = ();
}

pub struct RegisterSlashCommandsHandler {
    gateway: Arc<dyn GatewayPort>,
}

impl RegisterSlashCommandsHandler {
    pub fn new(gateway: Arc<dyn GatewayPort>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl CommandHandler<RegisterSlashCommands> for RegisterSlashCommandsHandler {
    async fn handle(&self, _command: &RegisterSlashCommands, ctx: &Context<'_>) -> Result<()> {
        let commands = [translate_command()];
        run_cancellable(ctx.cancel(), self.gateway.register_slash_commands(&commands)).await?;
        tracing::info!(count = commands.len(), "slash commands registered");
        Ok(())
    }
}

/// A user ran one of the bot's slash commands.
#[derive(Clone, Debug)]
pub struct SlashCommandExecuted {
    pub interaction: InteractionRef,
    pub command_name: String,
    /// String options as `(name, value)` pairs.
    pub options: Vec<(String, String)>,
}

impl Notification for SlashCommandExecuted {}

impl SlashCommandExecuted {
    pub fn option(&self, name: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Translate free text into an explicitly named language.
#[derive(Clone, Debug, Validate)]
pub struct TranslateBySlashCommand {
    pub interaction: InteractionRef,
    #[validate(length(min = 1, message = "target language is required"))]
    pub to: String,
    #[validate(length(min = 1, message = "text is required"))]
    pub text: String,
    pub from: Option<String>,
}

impl Command for TranslateBySlashCommand {
    type Output = TranslationOutcome;
}

impl TranslateBySlashCommand {
    /// Read the `/translate` options. Blank values count as missing.
    pub fn from_event(event: &SlashCommandExecuted) -> Self {
        let value = |name| event.option(name).map(str::trim).unwrap_or_default();
        Self {
            interaction: event.interaction.clone(),
            to: value(TO_OPTION).to_string(),
            text: value(TEXT_OPTION).to_string(),
            from: Some(value(FROM_OPTION))
                .filter(|from| !from.is_empty())
                .map(str::to_string),
        }
    }
}

pub struct TranslateBySlashCommandHandler {
    gateway: Arc<dyn GatewayPort>,
    providers: ProviderList,
}

impl TranslateBySlashCommandHandler {
    pub fn new(gateway: Arc<dyn GatewayPort>, providers: ProviderList) -> Self {
        Self { gateway, providers }
    }

    async fn respond(
        &self,
        interaction: &InteractionRef,
        ctx: &Context<'_>,
        text: &str,
    ) -> Result<()> {
        run_cancellable(
            ctx.cancel(),
            self.gateway.edit_interaction_response(interaction, text),
        )
        .await
    }
}

#[async_trait]
impl CommandHandler<TranslateBySlashCommand> for TranslateBySlashCommandHandler {
    async fn handle(
        &self,
        command: &TranslateBySlashCommand,
        ctx: &Context<'_>,
    ) -> Result<TranslationOutcome> {
        let interaction = &command.interaction;
        let sanitized = sanitize_text(&command.text);
        if sanitized.is_empty() {
            self.respond(interaction, ctx, NOTHING_TO_TRANSLATE).await?;
            return Ok(TranslationOutcome::SkippedEmptySource);
        }

        let source = command.from.as_deref();
        let fallback = translate_with_fallback(&self.providers, ctx.cancel(), |provider| {
            provider.translate(&command.to, &sanitized, source, ctx.cancel())
        })
        .await?;

        let (provider_name, result) = match fallback {
            Fallback::Translated { provider, result } => (provider, result),
            Fallback::Unsupported(message) => {
                self.respond(interaction, ctx, &message).await?;
                return Ok(TranslationOutcome::FailedNoProviderSupportsLanguage);
            }
            Fallback::Exhausted => {
                self.respond(interaction, ctx, TRANSLATION_UNAVAILABLE).await?;
                return Ok(TranslationOutcome::SkippedAllProvidersFailed);
            }
        };

        if result.translated_text == sanitized {
            self.respond(interaction, ctx, NO_DETECTABLE_TRANSLATION).await?;
            return Ok(TranslationOutcome::FailedNoDetectableTranslation);
        }

        let text = slash_reply_text(&provider_name, &result, &sanitized);
        self.respond(interaction, ctx, &text).await?;
        Ok(TranslationOutcome::Succeeded {
            provider: provider_name,
        })
    }
}

#[async_trait]
impl NotificationHandler<SlashCommandExecuted> for TranslateBySlashCommandHandler {
    async fn handle(&self, event: &SlashCommandExecuted, ctx: &Context<'_>) -> Result<()> {
        if event.command_name != TRANSLATE_COMMAND_NAME {
            return Ok(());
        }

        run_cancellable(ctx.cancel(), self.gateway.defer_interaction(&event.interaction)).await?;

        match ctx.send(TranslateBySlashCommand::from_event(event)).await {
            Ok(outcome) => {
                tracing::debug!(outcome = ?outcome, "slash translation finished");
                Ok(())
            }
            Err(Error::Validation(invalid)) => {
                tracing::info!(error = %invalid, "rejected /translate invocation");
                let text = format!("Invalid /{TRANSLATE_COMMAND_NAME} request: {invalid}.");
                self.respond(&event.interaction, ctx, &text).await
            }
            Err(e) => Err(e),
        }
    }
}

/// Response body for a successful slash translation. The source text is
/// quoted too since the response doesn't reference a message.
pub fn slash_reply_text(
    provider_name: &str,
    result: &TranslationResult,
    source_text: &str,
) -> String {
    let target = italics(result.target_display());
    let header = match result.source_display() {
        Some(source) => format!(
            "Translated from {} to {target} ({provider_name}):",
            italics(source)
        ),
        None => format!("Translated to {target} ({provider_name}):"),
    };
    format!(
        "{header}\n{}\n\n{}",
        block_quote(source_text),
        block_quote(&result.translated_text)
    )
}
