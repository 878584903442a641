use std::sync::Arc;

use async_trait::async_trait;
use serenity::{
    client::{Client, Context, EventHandler},
    model::{
        application::{CommandDataOption, CommandDataOptionValue, CommandInteraction, Interaction},
        channel::{Message, Reaction, ReactionType},
        gateway::{GatewayIntents, Ready},
    },
};
use tokio_util::sync::CancellationToken;

use dtb_core::{
    config::Config,
    domain::{
        ChannelId, InteractionRef, MessageId, MessageRef, ReactionInfo, SourceMessage, UserId,
    },
    events::{ReactionAddedEvent, ReadyEvent},
    mediator::Mediator,
    slash_commands::SlashCommandExecuted,
};

use crate::DiscordGateway;

/// Turns serenity gateway events into mediator notifications.
pub struct DiscordEventHandler {
    mediator: Mediator,
    gateway: DiscordGateway,
    shutdown: CancellationToken,
}

impl DiscordEventHandler {
    pub fn new(mediator: Mediator, gateway: DiscordGateway, shutdown: CancellationToken) -> Self {
        Self {
            mediator,
            gateway,
            shutdown,
        }
    }
}

#[async_trait]
impl EventHandler for DiscordEventHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        let user_id = UserId(ready.user.id.get());
        self.gateway.set_current_user(user_id);

        let event = ReadyEvent {
            user_id,
            user_name: ready.user.name.clone(),
            guild_count: ready.guilds.len(),
        };
        if let Err(e) = self.mediator.publish(event, &self.shutdown).await {
            tracing::error!(error = %e, "ready handlers failed");
        }
    }

    async fn reaction_add(&self, ctx: Context, reaction: Reaction) {
        // Custom emotes can't be flags.
        let Some(emote) = unicode_emoji(&reaction.emoji) else {
            return;
        };
        let Some(user_id) = reaction.user_id else {
            return;
        };

        let message = match reaction.message(&ctx).await {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(
                    message_id = reaction.message_id.get(),
                    error = %e,
                    "failed to fetch reacted message"
                );
                return;
            }
        };

        let event = ReactionAddedEvent {
            message: source_message(&message),
            channel_id: ChannelId(reaction.channel_id.get()),
            reaction_info: ReactionInfo {
                emote: emote.to_string(),
                user_id: UserId(user_id.get()),
            },
        };

        let cancel = self.shutdown.child_token();
        if let Err(e) = self.mediator.publish(event, &cancel).await {
            if !e.is_cancelled() {
                tracing::error!(error = %e, "reaction handlers failed");
            }
        }
    }

    async fn interaction_create(&self, _ctx: Context, interaction: Interaction) {
        let Interaction::Command(command) = interaction else {
            return;
        };

        let event = slash_command_event(&command);
        let cancel = self.shutdown.child_token();
        if let Err(e) = self.mediator.publish(event, &cancel).await {
            if !e.is_cancelled() {
                tracing::error!(
                    error = %e,
                    command = %command.data.name,
                    "slash command handlers failed"
                );
            }
        }
    }
}

fn slash_command_event(command: &CommandInteraction) -> SlashCommandExecuted {
    SlashCommandExecuted {
        interaction: InteractionRef {
            id: command.id.get(),
            token: command.token.clone(),
            channel_id: ChannelId(command.channel_id.get()),
            user_id: UserId(command.user.id.get()),
        },
        command_name: command.data.name.clone(),
        options: string_options(&command.data.options),
    }
}

/// Only string options are declared; anything else is dropped.
fn string_options(options: &[CommandDataOption]) -> Vec<(String, String)> {
    options
        .iter()
        .filter_map(|option| match &option.value {
            CommandDataOptionValue::String(value) => Some((option.name.clone(), value.clone())),
            _ => None,
        })
        .collect()
}

fn unicode_emoji(emoji: &ReactionType) -> Option<&str> {
    match emoji {
        ReactionType::Unicode(s) => Some(s.as_str()),
        _ => None,
    }
}

fn source_message(message: &Message) -> SourceMessage {
    SourceMessage {
        reference: MessageRef {
            channel_id: ChannelId(message.channel_id.get()),
            message_id: MessageId(message.id.get()),
        },
        author_id: UserId(message.author.id.get()),
        content: message.content.clone(),
    }
}

pub fn intents() -> GatewayIntents {
    GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::GUILD_MESSAGE_REACTIONS
        | GatewayIntents::MESSAGE_CONTENT
}

/// Connect to the gateway and dispatch events until `shutdown` fires.
pub async fn run(
    cfg: Arc<Config>,
    mediator: Mediator,
    gateway: DiscordGateway,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let handler = DiscordEventHandler::new(mediator, gateway, shutdown.clone());
    let mut client = Client::builder(&cfg.discord_bot_token, intents())
        .event_handler(handler)
        .await?;

    let shard_manager = client.shard_manager.clone();
    let stop = shutdown.clone();
    tokio::spawn(async move {
        stop.cancelled().await;
        tracing::info!("shutting down gateway shards");
        shard_manager.shutdown_all().await;
    });

    tracing::info!("connecting to Discord gateway");
    tokio::select! {
        res = client.start() => res?,
        _ = shutdown.cancelled() => {}
    }
    Ok(())
}
