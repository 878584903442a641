//! Gateway events published on the mediator.

use async_trait::async_trait;

use crate::{
    domain::{ChannelId, ReactionInfo, SourceMessage, UserId},
    mediator::{Context, Notification, NotificationHandler},
    slash_commands::RegisterSlashCommands,
    Result,
};

/// A reaction was added to a message the bot can read.
#[derive(Clone, Debug)]
pub struct ReactionAddedEvent {
    pub message: SourceMessage,
    pub channel_id: ChannelId,
    pub reaction_info: ReactionInfo,
}

impl Notification for ReactionAddedEvent {}

/// The gateway connection is up.
#[derive(Clone, Debug)]
pub struct ReadyEvent {
    pub user_id: UserId,
    pub user_name: String,
    pub guild_count: usize,
}

impl Notification for ReadyEvent {}

/// Logs the connection and (re)registers the slash commands.
pub struct ReadyHandler;

#[async_trait]
impl NotificationHandler<ReadyEvent> for ReadyHandler {
    async fn handle(&self, event: &ReadyEvent, ctx: &Context<'_>) -> Result<()> {
        tracing::info!(
            user_id = event.user_id.0,
            user = %event.user_name,
            guilds = event.guild_count,
            "connected to gateway"
        );
        ctx.send(RegisterSlashCommands).await
    }
}
