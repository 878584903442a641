/// Chat user id (snowflake).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub u64);

/// Chat channel id (snowflake).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChannelId(pub u64);

/// Chat message id (snowflake).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub u64);

/// A stable reference to a posted message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub channel_id: ChannelId,
    pub message_id: MessageId,
}

/// The user message a reaction was added to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceMessage {
    pub reference: MessageRef,
    pub author_id: UserId,
    pub content: String,
}

/// Which reaction triggered a flow.
///
/// Used to retract the reaction and to correlate a later temp reply.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ReactionInfo {
    /// Unicode emoji (or emote name for custom emotes).
    pub emote: String,
    pub user_id: UserId,
}

/// An application command invocation awaiting a response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InteractionRef {
    pub id: u64,
    /// Response token, valid for 15 minutes.
    pub token: String,
    pub channel_id: ChannelId,
    pub user_id: UserId,
}

/// A string option of a slash command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlashCommandOption {
    pub name: &'static str,
    pub description: &'static str,
    pub required: bool,
}

/// A slash command as registered with the chat service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlashCommandDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub options: Vec<SlashCommandOption>,
}
