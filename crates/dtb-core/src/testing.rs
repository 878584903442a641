//! Hand-written fakes shared by the unit tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{
    countries::Country,
    domain::{
        ChannelId, InteractionRef, MessageId, MessageRef, ReactionInfo, SlashCommandDefinition,
        SourceMessage, UserId,
    },
    errors::Error,
    ports::GatewayPort,
    providers::{ProviderList, TranslationProvider, TranslationResult},
    Result,
};

pub const BOT_ID: UserId = UserId(1);
pub const CHANNEL: ChannelId = ChannelId(100);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GatewayCall {
    RemoveReaction { message: MessageId, emote: String, user: UserId },
    SendReply { to: MessageId, text: String },
    DeleteMessage(MessageRef),
    TriggerTyping(ChannelId),
    RegisterSlashCommands(Vec<&'static str>),
    DeferInteraction(u64),
    EditInteractionResponse { interaction: u64, text: String },
}

#[derive(Default)]
pub struct FakeGateway {
    next_id: Mutex<u64>,
    calls: Mutex<Vec<GatewayCall>>,
    fail_delete: bool,
}

impl FakeGateway {
    pub fn failing_delete() -> Self {
        Self {
            fail_delete: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn replies(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                GatewayCall::SendReply { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn removed_reactions(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, GatewayCall::RemoveReaction { .. }))
            .count()
    }

    pub fn interaction_responses(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                GatewayCall::EditInteractionResponse { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn deleted(&self) -> Vec<MessageRef> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                GatewayCall::DeleteMessage(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: GatewayCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl GatewayPort for FakeGateway {
    fn current_user_id(&self) -> Option<UserId> {
        Some(BOT_ID)
    }

    async fn remove_reaction(
        &self,
        message: &SourceMessage,
        reaction: &ReactionInfo,
    ) -> Result<()> {
        self.record(GatewayCall::RemoveReaction {
            message: message.reference.message_id,
            emote: reaction.emote.clone(),
            user: reaction.user_id,
        });
        Ok(())
    }

    async fn send_reply(&self, message: &SourceMessage, text: &str) -> Result<MessageRef> {
        self.record(GatewayCall::SendReply {
            to: message.reference.message_id,
            text: text.to_string(),
        });
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        Ok(MessageRef {
            channel_id: message.reference.channel_id,
            message_id: MessageId(1000 + *next),
        })
    }

    async fn delete_message(&self, message: MessageRef) -> Result<()> {
        self.record(GatewayCall::DeleteMessage(message));
        if self.fail_delete {
            return Err(Error::External("Unknown Message".to_string()));
        }
        Ok(())
    }

    async fn trigger_typing(&self, channel_id: ChannelId) -> Result<()> {
        self.record(GatewayCall::TriggerTyping(channel_id));
        Ok(())
    }

    async fn register_slash_commands(&self, commands: &[SlashCommandDefinition]) -> Result<()> {
        self.record(GatewayCall::RegisterSlashCommands(
            commands.iter().map(|c| c.name).collect(),
        ));
        Ok(())
    }

    async fn defer_interaction(&self, interaction: &InteractionRef) -> Result<()> {
        self.record(GatewayCall::DeferInteraction(interaction.id));
        Ok(())
    }

    async fn edit_interaction_response(
        &self,
        interaction: &InteractionRef,
        text: &str,
    ) -> Result<()> {
        self.record(GatewayCall::EditInteractionResponse {
            interaction: interaction.id,
            text: text.to_string(),
        });
        Ok(())
    }
}

pub fn message(author: UserId, content: &str) -> SourceMessage {
    SourceMessage {
        reference: MessageRef {
            channel_id: CHANNEL,
            message_id: MessageId(10),
        },
        author_id: author,
        content: content.to_string(),
    }
}

pub fn reaction(emote: &str) -> ReactionInfo {
    ReactionInfo {
        emote: emote.to_string(),
        user_id: UserId(42),
    }
}

pub fn interaction(user: UserId) -> InteractionRef {
    InteractionRef {
        id: 900,
        token: "interaction-token".to_string(),
        channel_id: CHANNEL,
        user_id: user,
    }
}

/// What a [`FakeProvider`] does when asked to translate.
#[derive(Clone)]
pub enum Behavior {
    Translate {
        text: &'static str,
        detected: Option<(&'static str, &'static str)>,
    },
    Unsupported(&'static str),
    Fail,
    Hang,
}

/// Every provider call in order: provider name, text, requested languages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderRequest {
    pub provider: &'static str,
    pub text: String,
    pub target: Option<String>,
    pub source: Option<String>,
}

pub type ProviderLog = Arc<Mutex<Vec<ProviderRequest>>>;

pub struct FakeProvider {
    pub name: &'static str,
    pub behavior: Behavior,
    pub log: ProviderLog,
}

impl FakeProvider {
    async fn respond(
        &self,
        target: (&str, Option<&str>),
        source: Option<&str>,
        unsupported: fn(String) -> Error,
    ) -> Result<TranslationResult> {
        match &self.behavior {
            Behavior::Translate { text, detected } => {
                let (detected_code, detected_name) = match source {
                    Some(code) => (Some(code.to_string()), None),
                    None => (
                        detected.map(|(code, _)| code.to_string()),
                        detected.map(|(_, name)| name.to_string()),
                    ),
                };
                Ok(TranslationResult {
                    provider_name: self.name.to_string(),
                    detected_language_code: detected_code,
                    detected_language_name: detected_name,
                    target_language_code: target.0.to_string(),
                    target_language_name: target.1.map(str::to_string),
                    translated_text: text.to_string(),
                })
            }
            Behavior::Unsupported(message) => Err(unsupported(message.to_string())),
            Behavior::Fail => Err(Error::External("connection refused".to_string())),
            Behavior::Hang => std::future::pending().await,
        }
    }
}

#[async_trait]
impl TranslationProvider for FakeProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn initialize_supported_languages(&self, _cancel: &CancellationToken) -> Result<()> {
        Ok(())
    }

    async fn translate_by_country(
        &self,
        _country: &Country,
        text: &str,
        _cancel: &CancellationToken,
    ) -> Result<TranslationResult> {
        self.log.lock().unwrap().push(ProviderRequest {
            provider: self.name,
            text: text.to_string(),
            target: None,
            source: None,
        });
        self.respond(
            ("en", Some("English")),
            None,
            Error::LanguageNotSupportedForCountry,
        )
        .await
    }

    async fn translate(
        &self,
        target_code: &str,
        text: &str,
        source_code: Option<&str>,
        _cancel: &CancellationToken,
    ) -> Result<TranslationResult> {
        self.log.lock().unwrap().push(ProviderRequest {
            provider: self.name,
            text: text.to_string(),
            target: Some(target_code.to_string()),
            source: source_code.map(str::to_string),
        });
        self.respond((target_code, None), source_code, Error::LanguageNotSupported)
            .await
    }
}

/// Build fake providers sharing one call log.
pub fn fake_providers(providers: Vec<(&'static str, Behavior)>) -> (ProviderList, ProviderLog) {
    let log: ProviderLog = Arc::new(Mutex::new(Vec::new()));
    let providers = providers
        .into_iter()
        .map(|(name, behavior)| {
            Arc::new(FakeProvider {
                name,
                behavior,
                log: log.clone(),
            }) as Arc<dyn TranslationProvider>
        })
        .collect();
    (ProviderList::new(providers), log)
}
