//! Discord adapter (serenity).
//!
//! This crate implements the `dtb-core` GatewayPort over the Discord HTTP API
//! and turns gateway events into mediator notifications.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use serenity::{
    builder::{
        Builder, CreateAllowedMentions, CreateCommand, CreateCommandOption,
        CreateInteractionResponse, CreateInteractionResponseMessage, CreateMessage,
        EditInteractionResponse,
    },
    http::Http,
    model::{
        application::{Command, CommandOptionType},
        channel::ReactionType,
        id::{
            ChannelId as DiscordChannelId, InteractionId, MessageId as DiscordMessageId,
            UserId as DiscordUserId,
        },
    },
};

pub mod router;

use dtb_core::{
    domain::{
        ChannelId, InteractionRef, MessageId, MessageRef, ReactionInfo, SlashCommandDefinition,
        SourceMessage, UserId,
    },
    errors::Error,
    ports::GatewayPort,
    Result,
};

#[derive(Clone)]
pub struct DiscordGateway {
    http: Arc<Http>,
    current_user: Arc<OnceLock<UserId>>,
}

impl DiscordGateway {
    pub fn new(token: &str) -> Self {
        Self {
            http: Arc::new(Http::new(token)),
            current_user: Arc::new(OnceLock::new()),
        }
    }

    /// Fetch (and remember) the bot's own user id.
    pub async fn load_current_user(&self) -> Result<UserId> {
        if let Some(id) = self.current_user.get() {
            return Ok(*id);
        }
        let me = self.http.get_current_user().await.map_err(Self::map_err)?;
        let id = UserId(me.id.get());
        self.set_current_user(id);
        Ok(id)
    }

    pub(crate) fn set_current_user(&self, id: UserId) {
        let _ = self.current_user.set(id);
    }

    fn channel(id: ChannelId) -> Result<DiscordChannelId> {
        non_zero(id.0).map(DiscordChannelId::new)
    }

    fn message(id: MessageId) -> Result<DiscordMessageId> {
        non_zero(id.0).map(DiscordMessageId::new)
    }

    fn user(id: UserId) -> Result<DiscordUserId> {
        non_zero(id.0).map(DiscordUserId::new)
    }

    fn interaction(id: u64) -> Result<InteractionId> {
        non_zero(id).map(InteractionId::new)
    }

    fn map_err(e: serenity::Error) -> Error {
        Error::External(format!("discord error: {e}"))
    }
}

fn create_command(definition: &SlashCommandDefinition) -> CreateCommand {
    definition.options.iter().fold(
        CreateCommand::new(definition.name).description(definition.description),
        |command, option| {
            let option = CreateCommandOption::new(
                CommandOptionType::String,
                option.name,
                option.description,
            )
            .required(option.required);
            command.add_option(option)
        },
    )
}

/// Discord snowflakes are never zero; serenity's id constructors panic on it.
fn non_zero(id: u64) -> Result<u64> {
    if id == 0 {
        return Err(Error::External("invalid discord id 0".to_string()));
    }
    Ok(id)
}

#[async_trait]
impl GatewayPort for DiscordGateway {
    fn current_user_id(&self) -> Option<UserId> {
        self.current_user.get().copied()
    }

    async fn remove_reaction(
        &self,
        message: &SourceMessage,
        reaction: &ReactionInfo,
    ) -> Result<()> {
        let channel = Self::channel(message.reference.channel_id)?;
        let message_id = Self::message(message.reference.message_id)?;
        let user = Self::user(reaction.user_id)?;
        channel
            .delete_reaction(
                &self.http,
                message_id,
                Some(user),
                ReactionType::Unicode(reaction.emote.clone()),
            )
            .await
            .map_err(Self::map_err)
    }

    async fn send_reply(&self, message: &SourceMessage, text: &str) -> Result<MessageRef> {
        let channel = Self::channel(message.reference.channel_id)?;
        let reply_to = Self::message(message.reference.message_id)?;
        let builder = CreateMessage::new()
            .content(text)
            .reference_message((channel, reply_to))
            .allowed_mentions(CreateAllowedMentions::new().replied_user(false));

        let http: &Http = &self.http;
        let sent = channel
            .send_message(http, builder)
            .await
            .map_err(Self::map_err)?;

        Ok(MessageRef {
            channel_id: message.reference.channel_id,
            message_id: MessageId(sent.id.get()),
        })
    }

    async fn delete_message(&self, message: MessageRef) -> Result<()> {
        let channel = Self::channel(message.channel_id)?;
        let message_id = Self::message(message.message_id)?;
        channel
            .delete_message(&self.http, message_id)
            .await
            .map_err(Self::map_err)
    }

    async fn trigger_typing(&self, channel_id: ChannelId) -> Result<()> {
        Self::channel(channel_id)?
            .broadcast_typing(&self.http)
            .await
            .map_err(Self::map_err)
    }

    async fn register_slash_commands(&self, commands: &[SlashCommandDefinition]) -> Result<()> {
        let http: &Http = &self.http;
        Command::set_global_commands(http, commands.iter().map(create_command).collect())
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }

    async fn defer_interaction(&self, interaction: &InteractionRef) -> Result<()> {
        let id = Self::interaction(interaction.id)?;
        let http: &Http = &self.http;
        CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new())
            .execute(http, (id, interaction.token.as_str()))
            .await
            .map_err(Self::map_err)
    }

    async fn edit_interaction_response(
        &self,
        interaction: &InteractionRef,
        text: &str,
    ) -> Result<()> {
        let http: &Http = &self.http;
        EditInteractionResponse::new()
            .content(text)
            .allowed_mentions(CreateAllowedMentions::new())
            .execute(http, interaction.token.as_str())
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_ids_are_rejected_instead_of_panicking() {
        assert!(DiscordGateway::channel(ChannelId(0)).is_err());
        assert_eq!(
            DiscordGateway::message(MessageId(42)).unwrap(),
            DiscordMessageId::new(42)
        );
    }

    #[test]
    fn slash_command_definition_is_converted() {
        let command = create_command(&dtb_core::slash_commands::translate_command());
        let json = serde_json::to_value(&command).unwrap();
        assert_eq!(json["name"], "translate");
        let options = json["options"].as_array().unwrap();
        assert_eq!(options.len(), 3);
        assert_eq!(options[0]["name"], "to");
        assert_eq!(options[0]["type"], 3);
        assert_eq!(options[0]["required"], true);
        assert_eq!(options[2]["name"], "from");
    }

    #[test]
    fn zero_interaction_id_is_rejected() {
        assert!(DiscordGateway::interaction(0).is_err());
    }

    #[test]
    fn current_user_is_set_once() {
        let gateway = DiscordGateway::new("token");
        assert_eq!(gateway.current_user_id(), None);
        gateway.set_current_user(UserId(5));
        gateway.set_current_user(UserId(6));
        assert_eq!(gateway.current_user_id(), Some(UserId(5)));
    }
}
