use std::{future::Future, io, sync::Arc};

use dtb_core::{
    config::Config,
    events::{ReactionAddedEvent, ReadyEvent, ReadyHandler},
    mediator::Mediator,
    ports::GatewayPort,
    providers::{ProviderList, TranslationProvider},
    slash_commands::{
        RegisterSlashCommands, RegisterSlashCommandsHandler, SlashCommandExecuted,
        TranslateBySlashCommand, TranslateBySlashCommandHandler,
    },
    temp_reply::{DeleteTempReply, DeleteTempReplyHandler, SendTempReply, SendTempReplyHandler},
    translation::{
        validate_command, TranslateByCountryFlagEmojiReaction,
        TranslateByCountryFlagEmojiReactionHandler,
    },
};
use dtb_discord::DiscordGateway;
use dtb_providers::{AzureTranslatorProvider, LibreTranslateProvider};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), dtb_core::Error> {
    dtb_core::logging::init("dtb")?;

    let cfg = Arc::new(Config::load()?);
    let shutdown = CancellationToken::new();

    let providers = build_providers(&cfg)?;
    providers.initialize_all(&shutdown).await?;

    let discord = DiscordGateway::new(&cfg.discord_bot_token);
    let bot_id = discord.load_current_user().await?;
    tracing::info!(bot_id = bot_id.0, providers = providers.len(), "dtb started");

    let gateway: Arc<dyn GatewayPort> = Arc::new(discord.clone());
    let translate = Arc::new(TranslateByCountryFlagEmojiReactionHandler::new(
        gateway.clone(),
        providers.clone(),
    ));
    let slash = Arc::new(TranslateBySlashCommandHandler::new(gateway.clone(), providers));
    let mediator = Mediator::builder()
        .command::<TranslateByCountryFlagEmojiReaction, _>(translate.clone())
        .command::<SendTempReply, _>(Arc::new(SendTempReplyHandler::new(
            gateway.clone(),
            shutdown.clone(),
        )))
        .command::<DeleteTempReply, _>(Arc::new(DeleteTempReplyHandler::new(gateway.clone())))
        .command::<RegisterSlashCommands, _>(Arc::new(RegisterSlashCommandsHandler::new(gateway)))
        .command::<TranslateBySlashCommand, _>(slash.clone())
        .notification::<ReactionAddedEvent, _>(translate)
        .notification::<SlashCommandExecuted, _>(slash)
        .notification::<ReadyEvent, _>(Arc::new(ReadyHandler))
        .validator_fn::<TranslateByCountryFlagEmojiReaction, _>(validate_command)
        .validator::<SendTempReply>()
        .validator::<TranslateBySlashCommand>()
        .require_command::<TranslateByCountryFlagEmojiReaction>()
        .require_command::<SendTempReply>()
        .require_command::<DeleteTempReply>()
        .require_command::<RegisterSlashCommands>()
        .require_command::<TranslateBySlashCommand>()
        .build()?;

    tokio::spawn(cancel_on_signal(tokio::signal::ctrl_c(), shutdown.clone()));

    dtb_discord::router::run(cfg, mediator, discord, shutdown)
        .await
        .map_err(|e| dtb_core::Error::External(format!("discord bot failed: {e}")))?;

    Ok(())
}

/// Cancel `stop` once `signal` fires. If the signal can't be listened for, the
/// bot keeps running rather than shutting itself down.
async fn cancel_on_signal(signal: impl Future<Output = io::Result<()>>, stop: CancellationToken) {
    match signal.await {
        Ok(()) => {
            tracing::info!("ctrl-c received, shutting down");
            stop.cancel();
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to listen for ctrl-c, running until killed");
        }
    }
}

/// Enabled providers in priority order.
fn build_providers(cfg: &Config) -> Result<ProviderList, dtb_core::Error> {
    let mut providers: Vec<Arc<dyn TranslationProvider>> = Vec::new();
    if let Some(azure) = &cfg.azure_translator {
        providers.push(Arc::new(AzureTranslatorProvider::new(
            azure.clone(),
            cfg.provider_http_timeout,
        )?));
    }
    if let Some(libre) = &cfg.libre_translate {
        providers.push(Arc::new(LibreTranslateProvider::new(
            libre.clone(),
            cfg.provider_http_timeout,
        )?));
    }
    Ok(ProviderList::new(providers))
}
