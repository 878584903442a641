use async_trait::async_trait;

use crate::{
    domain::{
        ChannelId, InteractionRef, MessageRef, ReactionInfo, SlashCommandDefinition,
        SourceMessage, UserId,
    },
    Result,
};

/// Hexagonal port for the chat gateway.
///
/// Discord is the only implementation today; the core never talks to the chat
/// service except through this trait.
#[async_trait]
pub trait GatewayPort: Send + Sync {
    /// The bot's own user id, if known.
    fn current_user_id(&self) -> Option<UserId>;

    async fn remove_reaction(&self, message: &SourceMessage, reaction: &ReactionInfo) -> Result<()>;

    /// Post `text` as a reply referencing `message`.
    async fn send_reply(&self, message: &SourceMessage, text: &str) -> Result<MessageRef>;

    async fn delete_message(&self, message: MessageRef) -> Result<()>;

    async fn trigger_typing(&self, channel_id: ChannelId) -> Result<()>;

    /// Replace the bot's global slash commands with `commands`.
    async fn register_slash_commands(&self, commands: &[SlashCommandDefinition]) -> Result<()>;

    /// Acknowledge an interaction so the answer can take longer than the
    /// initial response window.
    async fn defer_interaction(&self, interaction: &InteractionRef) -> Result<()>;

    /// Set the content of a deferred interaction's response.
    async fn edit_interaction_response(&self, interaction: &InteractionRef, text: &str)
        -> Result<()>;
}
